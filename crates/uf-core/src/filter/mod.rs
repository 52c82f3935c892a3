//! Filter records and the matching contract.
//!
//! A [`FilterRecord`] carries the fields every filter shares (content type,
//! party, domains, modify action) and a [`FilterKind`] that owns the
//! pattern matcher. [`FilterRecord::is_match`] rejects cheaply on the shared
//! fields before running the matcher.

mod pattern;
mod regex_filter;

pub use pattern::{PatternMatcher, StartAnchor};
pub use regex_filter::{RegexEngine, RegexMatcher};

use crate::domain_map::DomainMap;
use crate::modify::ModifyAction;
use crate::types::{ContentRequest, ContentType, ThirdParty};
use crate::url::{is_separator, scheme_specific_part};

// =============================================================================
// Filter Type Codes
// =============================================================================

/// Filter type code, as stored in the filter cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FilterType {
    Contains = 1,
    Host = 2,
    ContainsHost = 3,
    Start = 4,
    End = 5,
    StartEnd = 6,
    Regex = 7,
    RegexHost = 8,
    BacktrackingRegex = 9,
    BacktrackingRegexHost = 10,
    Pattern = 11,
    /// Compact StartEnd record for a bare domain (cache only)
    StartEndDomain = 12,
}

impl TryFrom<u8> for FilterType {
    type Error = FilterError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Contains),
            2 => Ok(Self::Host),
            3 => Ok(Self::ContainsHost),
            4 => Ok(Self::Start),
            5 => Ok(Self::End),
            6 => Ok(Self::StartEnd),
            7 => Ok(Self::Regex),
            8 => Ok(Self::RegexHost),
            9 => Ok(Self::BacktrackingRegex),
            10 => Ok(Self::BacktrackingRegexHost),
            11 => Ok(Self::Pattern),
            12 => Ok(Self::StartEndDomain),
            _ => Err(FilterError::UnknownType(value)),
        }
    }
}

impl FilterType {
    pub fn is_regex(self) -> bool {
        matches!(
            self,
            Self::Regex | Self::RegexHost | Self::BacktrackingRegex | Self::BacktrackingRegexHost
        )
    }
}

/// Filter construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("regex {pattern:?} rejected by both engines: {linear}; {backtracking}")]
    InvalidRegex {
        pattern: String,
        linear: String,
        backtracking: String,
    },

    #[error("invalid removeparam regex {0:?}")]
    InvalidParamRegex(String),

    #[error("unknown filter type code: {0}")]
    UnknownType(u8),
}

// =============================================================================
// Filter Kind
// =============================================================================

/// Matcher strategy of a filter record.
#[derive(Debug, Clone)]
pub enum FilterKind {
    /// Substring of the URL
    Contains,
    /// URL host equals the pattern
    Host,
    /// Substring of the URL host
    ContainsHost,
    /// URL prefix
    Start,
    /// URL suffix
    End,
    /// Domain-anchored match on the scheme-specific part
    StartEnd,
    Regex(RegexMatcher),
    Pattern(PatternMatcher),
}

// =============================================================================
// Filter Record
// =============================================================================

/// One compiled rule. Immutable once built.
#[derive(Debug, Clone)]
pub struct FilterRecord {
    pattern: String,
    kind: FilterKind,
    content_type: ContentType,
    ignore_case: bool,
    third_party: ThirdParty,
    domains: Option<DomainMap>,
    modify: Option<ModifyAction>,
}

impl FilterRecord {
    /// Build a filter of the given type.
    ///
    /// Regex types go through the engine fallback chain; the resulting
    /// [`filter_type`](Self::filter_type) reports the engine actually used.
    /// Non-regex patterns are lowercased when `ignore_case` is set, host
    /// patterns always.
    pub fn new(
        filter_type: FilterType,
        pattern: &str,
        content_type: ContentType,
        ignore_case: bool,
        third_party: ThirdParty,
    ) -> Result<Self, FilterError> {
        let kind = match filter_type {
            FilterType::Contains => FilterKind::Contains,
            FilterType::Host => FilterKind::Host,
            FilterType::ContainsHost => FilterKind::ContainsHost,
            FilterType::Start => FilterKind::Start,
            FilterType::End => FilterKind::End,
            FilterType::StartEnd | FilterType::StartEndDomain => FilterKind::StartEnd,
            FilterType::Pattern => FilterKind::Pattern(PatternMatcher::new(pattern, ignore_case)),
            FilterType::Regex
            | FilterType::RegexHost
            | FilterType::BacktrackingRegex
            | FilterType::BacktrackingRegexHost => {
                let engine = RegexEngine::compile(pattern, ignore_case).map_err(|(linear, backtracking)| {
                    FilterError::InvalidRegex {
                        pattern: pattern.to_string(),
                        linear,
                        backtracking,
                    }
                })?;
                let host_only = matches!(filter_type, FilterType::RegexHost | FilterType::BacktrackingRegexHost);
                FilterKind::Regex(RegexMatcher { engine, host_only })
            }
        };

        let fold = match kind {
            FilterKind::Host | FilterKind::ContainsHost => true,
            FilterKind::Regex(_) => false,
            _ => ignore_case,
        };
        let pattern = if fold {
            pattern.to_ascii_lowercase()
        } else {
            pattern.to_string()
        };

        Ok(Self {
            pattern,
            kind,
            content_type,
            ignore_case,
            third_party,
            domains: None,
            modify: None,
        })
    }

    pub fn with_domains(mut self, domains: Option<DomainMap>) -> Self {
        self.domains = domains;
        self
    }

    pub fn with_modify(mut self, modify: Option<ModifyAction>) -> Self {
        self.modify = modify;
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn kind(&self) -> &FilterKind {
        &self.kind
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn third_party(&self) -> ThirdParty {
        self.third_party
    }

    pub fn domains(&self) -> Option<&DomainMap> {
        self.domains.as_ref()
    }

    pub fn modify(&self) -> Option<&ModifyAction> {
        self.modify.as_ref()
    }

    /// Type code of this record.
    pub fn filter_type(&self) -> FilterType {
        match &self.kind {
            FilterKind::Contains => FilterType::Contains,
            FilterKind::Host => FilterType::Host,
            FilterKind::ContainsHost => FilterType::ContainsHost,
            FilterKind::Start => FilterType::Start,
            FilterKind::End => FilterType::End,
            FilterKind::StartEnd => FilterType::StartEnd,
            FilterKind::Pattern(_) => FilterType::Pattern,
            FilterKind::Regex(m) => match (m.engine.is_backtracking(), m.host_only) {
                (false, false) => FilterType::Regex,
                (false, true) => FilterType::RegexHost,
                (true, false) => FilterType::BacktrackingRegex,
                (true, true) => FilterType::BacktrackingRegexHost,
            },
        }
    }

    /// Whether this StartEnd filter can be stored as a compact domain record.
    pub fn is_compact_domain(&self) -> bool {
        matches!(self.kind, FilterKind::StartEnd)
            && !self.ignore_case
            && self.domains.is_none()
            && crate::tag::is_bare_domain(&self.pattern)
    }

    /// Full matching contract: content type, party, domain, then pattern.
    #[inline]
    pub fn is_match(&self, request: &ContentRequest<'_>) -> bool {
        if !self.content_type.intersects(request.content_type) {
            return false;
        }
        if self.third_party != ThirdParty::NoPreference && !self.third_party.accepts(request.party()) {
            return false;
        }
        if let (Some(domains), Some(page_host)) = (&self.domains, request.page_host.as_deref()) {
            if !domains.check(page_host) {
                return false;
            }
        }
        self.check(request)
    }

    /// Pattern check only.
    pub fn check(&self, request: &ContentRequest<'_>) -> bool {
        let url: &str = if self.ignore_case {
            &request.url_lowercase
        } else {
            request.url
        };

        match &self.kind {
            FilterKind::Contains => url.contains(self.pattern.as_str()),
            FilterKind::Host => request.host.is_some_and(|h| h.eq_ignore_ascii_case(&self.pattern)),
            FilterKind::ContainsHost => match request.host_lowercase() {
                Some(host) => host.contains(self.pattern.as_str()),
                None => request.url_lowercase.contains(self.pattern.as_str()),
            },
            FilterKind::Start => url.starts_with(self.pattern.as_str()),
            FilterKind::End => url.ends_with(self.pattern.as_str()),
            FilterKind::StartEnd => start_end_match(scheme_specific_part(url), &self.pattern),
            FilterKind::Pattern(m) => m.is_match(request.url),
            FilterKind::Regex(m) if m.host_only => request.host.is_some_and(|h| m.engine.is_match(h)),
            FilterKind::Regex(m) => m.engine.is_match(request.url),
        }
    }

    /// Hashable identity used for dedupe and badfilter removal.
    pub fn key(&self) -> FilterKey {
        let domains = self.domains.as_ref().map(|map| {
            let mut entries: Vec<(String, bool)> = map.iter().map(|(d, v)| (d.to_string(), v)).collect();
            entries.sort_unstable();
            (map.include(), entries)
        });
        FilterKey {
            filter_type: self.filter_type(),
            pattern: self.pattern.clone(),
            content_type: self.content_type.bits(),
            ignore_case: self.ignore_case,
            third_party: self.third_party,
            domains,
            modify: self.modify.clone(),
        }
    }
}

impl PartialEq for FilterRecord {
    fn eq(&self, other: &Self) -> bool {
        self.filter_type() == other.filter_type()
            && self.pattern == other.pattern
            && self.content_type == other.content_type
            && self.ignore_case == other.ignore_case
            && self.third_party == other.third_party
            && self.modify == other.modify
            && self.domains == other.domains
    }
}

impl Eq for FilterRecord {}

/// Value identity of a [`FilterRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterKey {
    filter_type: FilterType,
    pattern: String,
    content_type: u16,
    ignore_case: bool,
    third_party: ThirdParty,
    domains: Option<(bool, Vec<(String, bool)>)>,
    modify: Option<ModifyAction>,
}

// =============================================================================
// StartEnd
// =============================================================================

/// Whether position `p` of a scheme-specific part starts a domain.
#[inline]
pub(crate) fn is_domain_start(ssp: &[u8], p: usize) -> bool {
    if p == 0 {
        return true;
    }
    if p == 2 && ssp.starts_with(b"//") {
        return true;
    }
    if ssp[p - 1] != b'.' {
        return false;
    }
    ssp.get(2..p - 1).map_or(true, |authority| !authority.contains(&b'/'))
}

/// `pattern` occurs at a domain start of `ssp` and is followed by a
/// separator or the end. Every occurrence is tried.
fn start_end_match(ssp: &str, pattern: &str) -> bool {
    let bytes = ssp.as_bytes();
    ssp.match_indices(pattern).any(|(idx, _)| {
        let end = idx + pattern.len();
        is_domain_start(bytes, idx) && (end == bytes.len() || is_separator(bytes[end]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestParty;

    fn record(ty: FilterType, pattern: &str) -> FilterRecord {
        FilterRecord::new(ty, pattern, ContentType::ALL_NETWORK, true, ThirdParty::NoPreference).unwrap()
    }

    fn req(url: &str) -> ContentRequest<'_> {
        ContentRequest::new(url, Some("page.org"), ContentType::SCRIPT)
    }

    #[test]
    fn test_filter_type_codes() {
        for code in 1..=12u8 {
            assert_eq!(FilterType::try_from(code).map(|t| t as u8), Ok(code));
        }
        assert_eq!(FilterType::try_from(0), Err(FilterError::UnknownType(0)));
        assert_eq!(FilterType::try_from(13), Err(FilterError::UnknownType(13)));
    }

    #[test]
    fn test_contains_and_case() {
        let f = record(FilterType::Contains, "/Ads/");
        assert_eq!(f.pattern(), "/ads/");
        assert!(f.check(&req("https://x.com/ADS/1.js")));

        let f = FilterRecord::new(FilterType::Contains, "/Ads/", ContentType::ALL_NETWORK, false, ThirdParty::NoPreference)
            .unwrap();
        assert!(!f.check(&req("https://x.com/ads/1.js")));
        assert!(f.check(&req("https://x.com/Ads/1.js")));
    }

    #[test]
    fn test_host_kinds() {
        let host = record(FilterType::Host, "Ads.Example.com");
        assert!(host.check(&req("https://ads.example.COM/x")));
        assert!(!host.check(&req("https://x.ads.example.com/x")));

        let contains_host = record(FilterType::ContainsHost, "tracker");
        assert!(contains_host.check(&req("https://cdn.Tracker.io/a.js")));
        assert!(!contains_host.check(&req("https://cdn.io/tracker.js")));
        assert!(contains_host.check(&req("data:tracker")));
    }

    #[test]
    fn test_start_end_kinds() {
        assert!(record(FilterType::Start, "https://ads.").check(&req("https://ads.x.com/")));
        assert!(!record(FilterType::Start, "https://ads.").check(&req("http://ads.x.com/")));
        assert!(record(FilterType::End, ".swf").check(&req("http://x.com/a.swf")));
        assert!(!record(FilterType::End, ".swf").check(&req("http://x.com/a.swf?x")));
    }

    #[test]
    fn test_start_end_domain_anchor() {
        let f = record(FilterType::StartEnd, "example.com");
        assert!(f.check(&req("http://example.com/")));
        assert!(f.check(&req("https://www.example.com:443/a")));
        assert!(f.check(&req("https://example.com")));
        assert!(!f.check(&req("http://notexample.com/")));
        assert!(!f.check(&req("http://example.com.evil.net/")));
        assert!(!f.check(&req("http://other.net/example.com/")));

        // a later occurrence can still satisfy the anchor
        assert!(f.check(&req("http://myexample.com.example.com/")));

        let path = record(FilterType::StartEnd, "example.com/ads");
        assert!(path.check(&req("http://cdn.example.com/ads?x")));
        assert!(!path.check(&req("http://cdn.example.com/adsx")));
    }

    #[test]
    fn test_regex_kinds() {
        let f = record(FilterType::Regex, r"/banner\d+\.gif");
        assert_eq!(f.filter_type(), FilterType::Regex);
        assert!(f.check(&req("https://x.com/BANNER12.gif")));

        let f = record(FilterType::Regex, r"/ad(?!min)");
        assert_eq!(f.filter_type(), FilterType::BacktrackingRegex);
        assert!(f.check(&req("https://x.com/ad/1")));
        assert!(!f.check(&req("https://x.com/admin")));

        let f = record(FilterType::RegexHost, r"^ads?\d*\.");
        assert_eq!(f.filter_type(), FilterType::RegexHost);
        assert!(f.check(&req("https://ads3.example.com/")));
        assert!(!f.check(&req("https://cdn.example.com/ads3.")));

        let err = FilterRecord::new(FilterType::Regex, "(", ContentType::ALL_NETWORK, true, ThirdParty::NoPreference);
        assert!(matches!(err, Err(FilterError::InvalidRegex { .. })));
    }

    #[test]
    fn test_is_match_contract() {
        let f = FilterRecord::new(FilterType::Contains, "/ads/", ContentType::IMAGE, true, ThirdParty::ThirdParty)
            .unwrap()
            .with_domains(Some(DomainMap::single("news.com", true)));

        let ok = ContentRequest::new("https://cdn.net/ads/1.gif", Some("www.news.com"), ContentType::IMAGE);
        assert!(f.is_match(&ok));

        let wrong_type = ContentRequest::new("https://cdn.net/ads/1.gif", Some("www.news.com"), ContentType::SCRIPT);
        assert!(!f.is_match(&wrong_type));

        let wrong_domain = ContentRequest::new("https://cdn.net/ads/1.gif", Some("blog.org"), ContentType::IMAGE);
        assert!(!f.is_match(&wrong_domain));

        let first_party = ok.clone().with_party(RequestParty::FirstParty);
        assert!(!f.is_match(&first_party));

        let no_page = ContentRequest::new("https://cdn.net/ads/1.gif", None, ContentType::IMAGE);
        assert!(f.is_match(&no_page));
    }

    #[test]
    fn test_strict_first_party_rejects_sibling_host() {
        let f = FilterRecord::new(FilterType::Contains, "/x", ContentType::ALL_NETWORK, true, ThirdParty::StrictFirstParty)
            .unwrap();
        let same = ContentRequest::new("https://www.example.com/x", Some("www.example.com"), ContentType::XHR);
        let sibling = ContentRequest::new("https://cdn.example.com/x", Some("www.example.com"), ContentType::XHR);
        assert_eq!(sibling.party(), RequestParty::FirstParty);
        assert!(f.is_match(&same));
        assert!(!f.is_match(&sibling));
    }

    #[test]
    fn test_party_classified_only_when_needed() {
        let any = FilterRecord::new(FilterType::Contains, "/x", ContentType::ALL_NETWORK, true, ThirdParty::NoPreference)
            .unwrap();
        let request = ContentRequest::new("https://cdn.net/x", Some("www.example.com"), ContentType::XHR);
        assert!(any.is_match(&request));
        assert!(!request.party_resolved());

        let third = FilterRecord::new(FilterType::Contains, "/x", ContentType::ALL_NETWORK, true, ThirdParty::ThirdParty)
            .unwrap();
        assert!(third.is_match(&request));
        assert!(request.party_resolved());
    }

    #[test]
    fn test_equality_and_key() {
        let a = record(FilterType::Contains, "/ads/")
            .with_domains(Some(DomainMap::from_entries(true, [("a.com", true), ("b.com", true)])));
        let b = record(FilterType::Contains, "/ADS/")
            .with_domains(Some(DomainMap::from_entries(true, [("b.com", true), ("a.com", true)])));
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());

        let c = b.clone().with_modify(Some(ModifyAction::Csp { parameter: None }));
        assert_ne!(a, c);
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_compact_domain() {
        let f = FilterRecord::new(FilterType::StartEnd, "ads.example.com", ContentType::ALL_NETWORK, false, ThirdParty::NoPreference)
            .unwrap();
        assert!(f.is_compact_domain());
        assert!(!record(FilterType::StartEnd, "ads.example.com").is_compact_domain());
        let f = FilterRecord::new(FilterType::StartEnd, "example.com/x", ContentType::ALL_NETWORK, false, ThirdParty::NoPreference)
            .unwrap();
        assert!(!f.is_compact_domain());
    }
}
