//! Index tags: short literal runs used to bucket filters.
//!
//! A filter is stored under one tag taken from its pattern; a request only
//! visits the buckets for the tags found in its URL plus the empty catch-all
//! tag. Every rule below only ever narrows toward a tag that is guaranteed to
//! appear as a whole run in any URL the filter matches.

use std::ops::Range;

use crate::filter::{is_domain_start, FilterKind, FilterRecord};
use crate::url::{is_separator, scheme_specific_part};

const MIN_TAG_LEN: usize = 3;

/// Stand-in for `\/`, `\.` and `\/(.+?\.)?` in regex patterns.
const REGEX_DELIM: u8 = 0x01;

/// Blank used for characters inside regex groups and classes.
const REGEX_BLANK: u8 = b' ';

#[inline]
fn is_tag_byte(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'%'
}

fn is_forbidden(tag: &[u8]) -> bool {
    tag.contains(&b'*') || matches!(tag, b"http" | b"https" | b"html" | b"jpg" | b"png")
}

/// Maximal runs of tag bytes (plus `*` when `with_star`), at least three
/// long, forbidden words removed.
fn runs(bytes: &[u8], with_star: bool) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = 0;
    for i in 0..=bytes.len() {
        let inside = i < bytes.len() && (is_tag_byte(bytes[i]) || (with_star && bytes[i] == b'*'));
        if inside {
            continue;
        }
        if i - start >= MIN_TAG_LEN && !is_forbidden(&bytes[start..i]) {
            out.push(start..i);
        }
        start = i + 1;
    }
    out
}

// =============================================================================
// URL Side
// =============================================================================

/// Tag spans of a lowercased URL, as byte ranges into it.
///
/// Besides the plain runs this yields, for every domain start of the
/// scheme-specific part, the full label run up to the next separator so
/// bare-domain StartEnd filters can be found under their whole pattern.
pub fn url_tag_spans(url_lowercase: &str) -> Vec<Range<usize>> {
    let bytes = url_lowercase.as_bytes();
    let mut spans = runs(bytes, false);

    let ssp = scheme_specific_part(url_lowercase).as_bytes();
    let offset = bytes.len() - ssp.len();

    let mut push_domain = |p: usize| {
        let end = ssp[p..].iter().position(|&b| is_separator(b)).map_or(ssp.len(), |n| p + n);
        if end > p && ssp[p..end].contains(&b'.') {
            let span = offset + p..offset + end;
            if !spans.contains(&span) {
                spans.push(span);
            }
        }
    };

    for p in 0..ssp.len().min(3) {
        if is_domain_start(ssp, p) {
            push_domain(p);
        }
    }
    for i in 0..ssp.len() {
        if i >= 2 && ssp[i] == b'/' {
            break;
        }
        if ssp[i] == b'.' && i + 1 >= 3 && i + 1 < ssp.len() {
            push_domain(i + 1);
        }
    }

    spans
}

/// Tag candidates of a URL, ending with the catch-all empty tag.
pub fn candidates(url: &str) -> Vec<String> {
    let lower = url.to_ascii_lowercase();
    let mut out: Vec<String> = url_tag_spans(&lower).into_iter().map(|r| lower[r].to_string()).collect();
    out.push(String::new());
    out
}

// =============================================================================
// Filter Side
// =============================================================================

/// Longest candidate run of `text`, or `""`.
pub fn longest(text: &str) -> String {
    let lower = text.to_ascii_lowercase();
    pick_longest(&lower, runs(lower.as_bytes(), true), false, false)
}

fn pick_longest(text: &str, spans: Vec<Range<usize>>, skip_start: bool, skip_end: bool) -> String {
    let mut best: Option<Range<usize>> = None;
    for span in spans {
        if (skip_start && span.start == 0) || (skip_end && span.end == text.len()) {
            continue;
        }
        if best.as_ref().map_or(true, |b| span.len() > b.len()) {
            best = Some(span);
        }
    }
    best.map(|r| text[r].to_string()).unwrap_or_default()
}

/// Pattern that is just a host name: `[a-z0-9.-_%]`, has a dot, no trailing dot.
pub fn is_bare_domain(pattern: &str) -> bool {
    !pattern.is_empty()
        && pattern.contains('.')
        && !pattern.ends_with('.')
        && pattern
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'_' | b'%'))
}

/// Index tag for a filter record.
pub fn best_tag(filter: &FilterRecord) -> String {
    let pattern = filter.pattern().to_ascii_lowercase();
    let spans = || runs(pattern.as_bytes(), true);

    match filter.kind() {
        FilterKind::Regex(_) => regex_tag(&pattern),
        FilterKind::StartEnd if is_bare_domain(&pattern) => pattern,
        FilterKind::StartEnd | FilterKind::Host => pick_longest(&pattern, spans(), false, false),
        FilterKind::Start => pick_longest(&pattern, spans(), false, true),
        FilterKind::End => pick_longest(&pattern, spans(), true, false),
        // anchors are split characters, so only floating edges are excluded
        FilterKind::Contains | FilterKind::ContainsHost | FilterKind::Pattern(_) => {
            pick_longest(&pattern, spans(), true, true)
        }
    }
}

// =============================================================================
// Regex Patterns
// =============================================================================

/// Rewrite the escaped path and dot idioms to [`REGEX_DELIM`], keeping
/// every other escape pair intact.
fn normalize_regex(pattern: &[u8]) -> Vec<u8> {
    const OPTIONAL_SUBDOMAIN: &[u8] = br"(.+?\.)?";

    let mut out = Vec::with_capacity(pattern.len());
    let mut i = 0;
    while i < pattern.len() {
        if pattern[i] != b'\\' || i + 1 >= pattern.len() {
            out.push(pattern[i]);
            i += 1;
            continue;
        }
        match pattern[i + 1] {
            b'/' => {
                out.push(REGEX_DELIM);
                i += 2;
                if pattern[i..].starts_with(OPTIONAL_SUBDOMAIN) {
                    i += OPTIONAL_SUBDOMAIN.len();
                }
            }
            b'.' => {
                out.push(REGEX_DELIM);
                i += 2;
            }
            other => {
                out.push(b'\\');
                out.push(other);
                i += 2;
            }
        }
    }
    out
}

/// Blank out groups and classes. `None` when the expression has a
/// top-level alternation.
fn blank_groups(pattern: &mut [u8]) -> Option<()> {
    let mut depth = 0usize;
    let mut in_class = false;
    let mut i = 0;
    while i < pattern.len() {
        let b = pattern[i];
        let inside = depth > 0 || in_class;

        if b == b'\\' && i + 1 < pattern.len() {
            if inside {
                pattern[i] = REGEX_BLANK;
                pattern[i + 1] = REGEX_BLANK;
            }
            i += 2;
            continue;
        }

        match b {
            b'[' if !in_class => in_class = true,
            b']' if in_class => in_class = false,
            b'(' if !in_class => depth += 1,
            b')' if !in_class && depth > 0 => depth -= 1,
            b'|' if !inside => return None,
            _ if !inside => {
                i += 1;
                continue;
            }
            _ => {}
        }
        pattern[i] = REGEX_BLANK;
        i += 1;
    }
    Some(())
}

fn regex_tag(pattern: &str) -> String {
    let mut text = normalize_regex(pattern.as_bytes());
    if blank_groups(&mut text).is_none() {
        return String::new();
    }

    let mut best: &[u8] = &[];
    for span in runs(&text, true) {
        let bounded_left = span.start > 0 && text[span.start - 1] == REGEX_DELIM;
        let bounded_right = text.get(span.end) == Some(&REGEX_DELIM)
            && !matches!(text.get(span.end + 1), Some(b'?' | b'*' | b'{'));
        if bounded_left && bounded_right && span.len() > best.len() {
            best = &text[span];
        }
    }
    String::from_utf8_lossy(best).into_owned()
}
