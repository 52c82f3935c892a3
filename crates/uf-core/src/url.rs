//! Fast URL slicing utilities for the hot path
//!
//! These functions avoid allocations and work directly on string slices.
//! They never fail: malformed input yields `None` or an empty slice.

// =============================================================================
// Scheme
// =============================================================================

/// Get the position after "://".
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();

    let colon_pos = bytes.iter().position(|&b| b == b':')?;

    if bytes.len() > colon_pos + 2 && bytes[colon_pos + 1] == b'/' && bytes[colon_pos + 2] == b'/' {
        return Some(colon_pos + 3);
    }

    None
}

/// Scheme-specific part: everything after `scheme:`, or the whole string
/// when there is no syntactically valid scheme.
#[inline]
pub fn scheme_specific_part(url: &str) -> &str {
    let bytes = url.as_bytes();
    let colon_pos = match bytes.iter().position(|&b| b == b':') {
        Some(pos) if pos > 0 => pos,
        _ => return url,
    };

    let valid_scheme = bytes[0].is_ascii_alphabetic()
        && bytes[1..colon_pos]
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.');

    if valid_scheme {
        &url[colon_pos + 1..]
    } else {
        url
    }
}

// =============================================================================
// Host Extraction
// =============================================================================

/// Get the start and end positions of the hostname in a URL.
#[inline]
pub fn get_host_position(url: &str) -> Option<(usize, usize)> {
    let scheme_end = get_scheme_end(url)?;
    let bytes = url.as_bytes();

    // Skip userinfo
    let mut host_start = scheme_end;
    for (i, &b) in bytes.iter().enumerate().skip(scheme_end) {
        if b == b'@' {
            host_start = i + 1;
            break;
        }
        if b == b'/' || b == b'?' || b == b'#' {
            break;
        }
    }

    let mut host_end = bytes.len();
    for (i, &b) in bytes.iter().enumerate().skip(host_start) {
        if b == b'/' || b == b'?' || b == b'#' || b == b':' {
            host_end = i;
            break;
        }
    }

    Some((host_start, host_end))
}

/// Fast host extraction without allocations.
/// Returns a slice into the original URL.
#[inline]
pub fn extract_host(url: &str) -> Option<&str> {
    let (host_start, host_end) = get_host_position(url)?;
    Some(&url[host_start..host_end])
}

/// Whether a host is an IPv4 or bracketed IPv6 literal.
pub fn is_ip_literal(host: &str) -> bool {
    if host.starts_with('[') && host.ends_with(']') {
        return true;
    }
    host.parse::<std::net::Ipv4Addr>().is_ok() || host.parse::<std::net::Ipv6Addr>().is_ok()
}

// =============================================================================
// ABP Separator
// =============================================================================

/// Check if a byte is an ABP separator (what `^` matches).
///
/// Everything except letters, digits and `%-._` in the ASCII range.
#[inline]
pub fn is_separator(c: u8) -> bool {
    matches!(c,
        0x00..=0x24 | 0x26..=0x2c | 0x2f | 0x3a..=0x40 | 0x5b..=0x5e | 0x60 | 0x7b..=0x7f)
}

// =============================================================================
// Query Parameter Handling
// =============================================================================

/// Query string without the leading `?` and without the fragment.
#[inline]
pub fn extract_query(url: &str) -> Option<&str> {
    let before_fragment = url.split('#').next().unwrap_or(url);
    let q_pos = before_fragment.find('?')?;
    Some(&before_fragment[q_pos + 1..])
}

/// Remove query parameters whose name satisfies `remove`.
///
/// The URL is rebuilt as base (no query, no fragment), then the kept
/// `name=value` pairs, then the fragment. Returns `None` if nothing was
/// removed.
pub fn remove_query_params<F>(url: &str, mut remove: F) -> Option<String>
where
    F: FnMut(&str) -> bool,
{
    let query = extract_query(url)?;
    let base_end = url.find(['?', '#']).unwrap_or(url.len());
    let base = &url[..base_end];
    let fragment = url.find('#').map(|idx| &url[idx..]).unwrap_or("");

    let mut kept = Vec::new();
    let mut removed = false;

    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        let name = match part.find('=') {
            Some(idx) => &part[..idx],
            None => part,
        };
        if remove(name) {
            removed = true;
            continue;
        }
        kept.push(part);
    }

    if !removed {
        return None;
    }

    let mut out = String::with_capacity(url.len());
    out.push_str(base);
    if !kept.is_empty() {
        out.push('?');
        out.push_str(&kept.join("&"));
    }
    out.push_str(fragment);

    Some(out)
}
