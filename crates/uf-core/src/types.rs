//! Core type definitions for unifilter
//!
//! These types are shared by the filter family, the blocker and the binary
//! cache. Numeric codes match the cache record layout.

use std::borrow::Cow;
use std::cell::OnceCell;
use std::ops::Range;

use crate::psl::classify_party;
use crate::tag;
use crate::url::extract_host;

// =============================================================================
// Content Types (bit mask for type filtering)
// =============================================================================

bitflags::bitflags! {
    /// Resource kind bit mask.
    ///
    /// Stored as a little-endian u16 in the filter cache.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ContentType: u16 {
        const OTHER = 1 << 0;
        const SCRIPT = 1 << 1;
        const IMAGE = 1 << 2;
        const STYLESHEET = 1 << 3;
        const SUBDOCUMENT = 1 << 4;  // iframe/frame
        const DOCUMENT = 1 << 5;     // main document
        const MEDIA = 1 << 6;
        const FONT = 1 << 7;
        const POPUP = 1 << 8;
        const WEBSOCKET = 1 << 9;
        const XHR = 1 << 10;
        const PING = 1 << 11;
        /// Page-level `$elemhide` exception
        const ELEMHIDE = 1 << 12;
        /// Page-level `$generichide` exception
        const GENERICHIDE = 1 << 13;

        /// All network request types
        const ALL_NETWORK = 0x0FFF;
    }
}

impl ContentType {
    /// Parse a browser or filter-option type name.
    pub fn from_type_name(s: &str) -> Option<Self> {
        let ty = match s {
            "other" | "object" | "object-subrequest" => Self::OTHER,
            "script" => Self::SCRIPT,
            "image" => Self::IMAGE,
            "stylesheet" | "css" => Self::STYLESHEET,
            "sub_frame" | "subdocument" | "frame" => Self::SUBDOCUMENT,
            "main_frame" | "document" | "doc" => Self::DOCUMENT,
            "media" => Self::MEDIA,
            "font" => Self::FONT,
            "popup" => Self::POPUP,
            "websocket" => Self::WEBSOCKET,
            "xmlhttprequest" | "xhr" => Self::XHR,
            "ping" | "beacon" => Self::PING,
            "elemhide" | "ehide" => Self::ELEMHIDE,
            "generichide" | "ghide" => Self::GENERICHIDE,
            _ => return None,
        };
        Some(ty)
    }
}

// =============================================================================
// Party Restriction (filter side)
// =============================================================================

/// Party restriction carried by a filter record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i8)]
pub enum ThirdParty {
    #[default]
    NoPreference = -1,
    FirstParty = 0,
    ThirdParty = 1,
    /// Hostname-identical only
    StrictFirstParty = 2,
    /// Anything but hostname-identical
    StrictThirdParty = 3,
}

impl ThirdParty {
    /// Cache byte for this restriction (`0xFF` encodes `NoPreference`).
    #[inline]
    pub fn code(self) -> u8 {
        (self as i8) as u8
    }

    /// Whether a request with the given classification passes this restriction.
    #[inline]
    pub fn accepts(self, party: RequestParty) -> bool {
        match self {
            Self::NoPreference => true,
            Self::FirstParty => party != RequestParty::ThirdParty,
            Self::ThirdParty => party == RequestParty::ThirdParty,
            Self::StrictFirstParty => party == RequestParty::StrictFirstParty,
            Self::StrictThirdParty => party != RequestParty::StrictFirstParty,
        }
    }
}

impl TryFrom<u8> for ThirdParty {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0xFF => Ok(Self::NoPreference),
            0 => Ok(Self::FirstParty),
            1 => Ok(Self::ThirdParty),
            2 => Ok(Self::StrictFirstParty),
            3 => Ok(Self::StrictThirdParty),
            _ => Err(()),
        }
    }
}

// =============================================================================
// Request Party (request side)
// =============================================================================

/// Relationship between a resource's origin and the page's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestParty {
    /// Same registrable domain, different hostname
    FirstParty,
    ThirdParty,
    /// Identical hostname
    StrictFirstParty,
}

// =============================================================================
// Content Request
// =============================================================================

/// Descriptor of one request being matched.
#[derive(Debug, Clone)]
pub struct ContentRequest<'a> {
    /// Absolute request URL
    pub url: &'a str,
    /// ASCII-lowercased URL
    pub url_lowercase: Cow<'a, str>,
    /// Host of the request URL
    pub host: Option<&'a str>,
    /// Lowercased host of the page that triggered the request
    pub page_host: Option<Cow<'a, str>>,
    /// Resource kind
    pub content_type: ContentType,
    party: OnceCell<RequestParty>,
    tag_spans: Vec<Range<usize>>,
}

impl<'a> ContentRequest<'a> {
    /// Build a request, deriving the lowercase URL and host. The party is
    /// classified on first use.
    pub fn new(url: &'a str, page_host: Option<&'a str>, content_type: ContentType) -> Self {
        let host = extract_host(url).filter(|h| !h.is_empty());
        let page_host = page_host.map(lowercase);
        let url_lowercase = lowercase(url);
        let tag_spans = tag::url_tag_spans(&url_lowercase);

        Self {
            url,
            url_lowercase,
            host,
            page_host,
            content_type,
            party: OnceCell::new(),
            tag_spans,
        }
    }

    /// Override the party classification with one precomputed by the caller.
    pub fn with_party(mut self, party: RequestParty) -> Self {
        self.party = OnceCell::from(party);
        self
    }

    /// Party classification of this request relative to its page.
    pub fn party(&self) -> RequestParty {
        *self
            .party
            .get_or_init(|| classify_party(self.host, self.page_host.as_deref()))
    }

    /// Whether the party has been classified or supplied yet.
    pub fn party_resolved(&self) -> bool {
        self.party.get().is_some()
    }

    /// Index tags of this URL, ending with the catch-all empty tag.
    pub fn tags(&self) -> impl Iterator<Item = &str> + '_ {
        self.tag_spans
            .iter()
            .map(move |span| &self.url_lowercase[span.clone()])
            .chain(std::iter::once(""))
    }

    /// Lowercased request host, sliced from `url_lowercase`.
    pub fn host_lowercase(&self) -> Option<&str> {
        self.host.and(extract_host(&self.url_lowercase))
    }

    /// Whether the URL carries a query string.
    pub fn has_query(&self) -> bool {
        crate::url::extract_query(self.url).is_some_and(|q| !q.is_empty())
    }
}

fn lowercase(s: &str) -> Cow<'_, str> {
    if s.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(s.to_ascii_lowercase())
    } else {
        Cow::Borrowed(s)
    }
}

// =============================================================================
// Match Result
// =============================================================================

/// Final decision for a matched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    /// Request goes through unchanged
    Allow,
    /// Request is cancelled
    Block,
    /// Request is answered with a local resource
    Redirect,
    /// Request goes through with a rewritten URL and/or headers
    Modify,
}

/// Rewrites the caller should apply to a request that is let through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyResponse {
    /// URL after removeparam rewriting
    pub url: String,
    /// Request headers to add, as `(name, value)`
    pub add_request_headers: Vec<(String, String)>,
    /// Request header names to remove
    pub remove_request_headers: Vec<String>,
    /// Response headers to add, as `(name, value)`
    pub add_response_headers: Vec<(String, String)>,
    /// Response header names to remove
    pub remove_response_headers: Vec<String>,
    /// Content-Security-Policy directives to inject
    pub csp: Vec<String>,
}

/// Result of matching a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// The final decision for this request
    pub decision: MatchDecision,
    /// Cache prefix of the list whose filter decided (for logging)
    pub list: Option<&'static str>,
    /// Pattern of the deciding filter (for logging)
    pub pattern: Option<String>,
    /// Resource file name if decision is Redirect
    pub redirect_resource: Option<&'static str>,
    /// Rewrites if decision is Modify
    pub modify: Option<ModifyResponse>,
}

impl MatchResult {
    /// Whether the request should be cancelled or answered locally.
    pub fn is_blocked(&self) -> bool {
        matches!(self.decision, MatchDecision::Block | MatchDecision::Redirect)
    }
}

impl Default for MatchResult {
    fn default() -> Self {
        Self {
            decision: MatchDecision::Allow,
            list: None,
            pattern: None,
            redirect_resource: None,
            modify: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_third_party_codes() {
        assert_eq!(ThirdParty::NoPreference.code(), 0xFF);
        assert_eq!(ThirdParty::StrictThirdParty.code(), 3);
        for party in [
            ThirdParty::NoPreference,
            ThirdParty::FirstParty,
            ThirdParty::ThirdParty,
            ThirdParty::StrictFirstParty,
            ThirdParty::StrictThirdParty,
        ] {
            assert_eq!(ThirdParty::try_from(party.code()), Ok(party));
        }
        assert!(ThirdParty::try_from(4).is_err());
    }

    #[test]
    fn test_party_truth_table() {
        use RequestParty as R;

        assert!(ThirdParty::NoPreference.accepts(R::ThirdParty));
        assert!(ThirdParty::FirstParty.accepts(R::FirstParty));
        assert!(ThirdParty::FirstParty.accepts(R::StrictFirstParty));
        assert!(!ThirdParty::FirstParty.accepts(R::ThirdParty));
        assert!(ThirdParty::ThirdParty.accepts(R::ThirdParty));
        assert!(!ThirdParty::ThirdParty.accepts(R::FirstParty));
        assert!(ThirdParty::StrictFirstParty.accepts(R::StrictFirstParty));
        assert!(!ThirdParty::StrictFirstParty.accepts(R::FirstParty));
        assert!(ThirdParty::StrictThirdParty.accepts(R::FirstParty));
        assert!(ThirdParty::StrictThirdParty.accepts(R::ThirdParty));
        assert!(!ThirdParty::StrictThirdParty.accepts(R::StrictFirstParty));
    }

    #[test]
    fn test_content_type_names() {
        assert_eq!(ContentType::from_type_name("script"), Some(ContentType::SCRIPT));
        assert_eq!(ContentType::from_type_name("sub_frame"), Some(ContentType::SUBDOCUMENT));
        assert_eq!(ContentType::from_type_name("xhr"), Some(ContentType::XHR));
        assert_eq!(ContentType::from_type_name("bogus"), None);
        // Flag-name lookup generated by bitflags is a separate table
        assert_eq!(ContentType::from_name("SCRIPT"), Some(ContentType::SCRIPT));
        assert_eq!(ContentType::from_name("script"), None);
        assert!(!ContentType::ALL_NETWORK.contains(ContentType::ELEMHIDE));
    }

    #[test]
    fn test_request_derives_fields() {
        let req = ContentRequest::new(
            "https://CDN.Example.com/Ads.js?x=1",
            Some("WWW.example.com"),
            ContentType::SCRIPT,
        );
        assert_eq!(req.url_lowercase, "https://cdn.example.com/ads.js?x=1");
        assert_eq!(req.host, Some("CDN.Example.com"));
        assert_eq!(req.page_host.as_deref(), Some("www.example.com"));
        assert!(!req.party_resolved());
        assert_eq!(req.party(), RequestParty::FirstParty);
        assert!(req.party_resolved());
        assert!(req.has_query());
        assert_eq!(req.tags().last(), Some(""));
        assert!(req.tags().any(|t| t == "ads"));
    }
}
