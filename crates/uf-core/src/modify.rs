//! Rewrite actions carried by modify, redirect and their exception filters.

use std::fmt;
use std::hash::{Hash, Hasher};

use regex::Regex;

use crate::types::ContentType;

/// Cache prefix characters.
pub mod prefix {
    pub const REDIRECT: char = 'r';
    pub const REMOVEPARAM: char = 'p';
    pub const REMOVEPARAM_REGEX: char = 'x';
    pub const REQUEST_HEADER: char = 'q';
    pub const RESPONSE_HEADER: char = 'a';
    pub const CSP: char = 'c';
}

/// Action family; exceptions without a parameter cancel a whole family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifyKind {
    RemoveParam,
    Redirect,
    Csp,
    RequestHeader,
    ResponseHeader,
}

/// Compiled `$removeparam=/.../` expression, compared by source text.
#[derive(Clone)]
pub struct ParamRegex {
    source: String,
    regex: Regex,
}

impl ParamRegex {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(source)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

impl fmt::Debug for ParamRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.source)
    }
}

impl PartialEq for ParamRegex {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for ParamRegex {}

impl Hash for ParamRegex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

/// Side effect attached to a matching filter. Never applied by the filter
/// itself; the blocker reports it to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModifyAction {
    /// Strip a query parameter (`None` strips all of them)
    RemoveParam { parameter: Option<String>, inverse: bool },
    /// Strip query parameters whose name matches a regex
    RemoveParamRegex { regex: ParamRegex, inverse: bool },
    /// Answer with a local resource, optionally `name:priority`
    Redirect { parameter: Option<String> },
    /// Inject a Content-Security-Policy directive
    Csp { parameter: Option<String> },
    /// Add (`Name: value`) or remove (`name`) a request header
    RequestHeader { header: String, remove: bool },
    /// Add (`Name: value`) or remove (`name`) a response header
    ResponseHeader { header: String, remove: bool },
}

impl ModifyAction {
    /// Removeparam action; `/.../` parameters compile to the regex form.
    pub fn remove_param(parameter: Option<&str>, inverse: bool) -> Result<Self, regex::Error> {
        match parameter {
            Some(p) if p.len() > 1 && p.starts_with('/') && p.ends_with('/') => Ok(Self::RemoveParamRegex {
                regex: ParamRegex::new(&p[1..p.len() - 1])?,
                inverse,
            }),
            Some(p) if !p.is_empty() => Ok(Self::RemoveParam {
                parameter: Some(p.to_string()),
                inverse,
            }),
            _ => Ok(Self::RemoveParam { parameter: None, inverse }),
        }
    }

    pub fn kind(&self) -> ModifyKind {
        match self {
            Self::RemoveParam { .. } | Self::RemoveParamRegex { .. } => ModifyKind::RemoveParam,
            Self::Redirect { .. } => ModifyKind::Redirect,
            Self::Csp { .. } => ModifyKind::Csp,
            Self::RequestHeader { .. } => ModifyKind::RequestHeader,
            Self::ResponseHeader { .. } => ModifyKind::ResponseHeader,
        }
    }

    pub fn prefix(&self) -> char {
        match self {
            Self::RemoveParam { .. } => prefix::REMOVEPARAM,
            Self::RemoveParamRegex { .. } => prefix::REMOVEPARAM_REGEX,
            Self::Redirect { .. } => prefix::REDIRECT,
            Self::Csp { .. } => prefix::CSP,
            Self::RequestHeader { .. } => prefix::REQUEST_HEADER,
            Self::ResponseHeader { .. } => prefix::RESPONSE_HEADER,
        }
    }

    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::RemoveParam { parameter, .. }
            | Self::Redirect { parameter }
            | Self::Csp { parameter } => parameter.as_deref(),
            Self::RemoveParamRegex { regex, .. } => Some(regex.as_str()),
            Self::RequestHeader { header, .. } | Self::ResponseHeader { header, .. } => Some(header),
        }
    }

    /// Inverse flag; for header actions this means "remove".
    pub fn inverse(&self) -> bool {
        match self {
            Self::RemoveParam { inverse, .. } | Self::RemoveParamRegex { inverse, .. } => *inverse,
            Self::RequestHeader { remove, .. } | Self::ResponseHeader { remove, .. } => *remove,
            Self::Redirect { .. } | Self::Csp { .. } => false,
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Self::RemoveParamRegex { .. })
    }

    /// Whether a removeparam action strips the query parameter `name`.
    #[inline]
    pub fn matches_parameter(&self, name: &str) -> bool {
        match self {
            Self::RemoveParam { parameter, inverse } => {
                parameter.as_deref().map_or(true, |p| p == name) ^ inverse
            }
            Self::RemoveParamRegex { regex, inverse } => regex.is_match(name) ^ inverse,
            _ => false,
        }
    }

    /// Redirect target and priority from `name:priority`.
    pub fn redirect_with_priority(&self) -> Option<(&str, i32)> {
        let parameter = match self {
            Self::Redirect { parameter } => parameter.as_deref().unwrap_or(""),
            _ => return None,
        };
        match parameter.rsplit_once(':') {
            Some((name, priority)) => match priority.trim().parse::<i32>() {
                Ok(priority) => Some((name, priority)),
                Err(_) => Some((parameter, 0)),
            },
            None => Some((parameter, 0)),
        }
    }

    /// Serialized form used by the cache: prefix, `'1'`/`'0'` inverse, parameter.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.prefix());
        out.push(if self.inverse() { '1' } else { '0' });
        if let Some(parameter) = self.parameter() {
            out.push_str(parameter);
        }
        out
    }

    /// Parse the cache form; `None` for unknown prefixes or invalid regexes.
    pub fn decode(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let prefix = chars.next()?;
        let inverse = match chars.next()? {
            '1' => true,
            '0' => false,
            _ => return None,
        };
        let rest = chars.as_str();
        let parameter = (!rest.is_empty()).then(|| rest.to_string());

        let action = match prefix {
            prefix::REMOVEPARAM => Self::RemoveParam { parameter, inverse },
            prefix::REMOVEPARAM_REGEX => Self::RemoveParamRegex {
                regex: ParamRegex::new(rest).ok()?,
                inverse,
            },
            prefix::REDIRECT => Self::Redirect { parameter },
            prefix::CSP => Self::Csp { parameter },
            prefix::REQUEST_HEADER => Self::RequestHeader { header: parameter?, remove: inverse },
            prefix::RESPONSE_HEADER => Self::ResponseHeader { header: parameter?, remove: inverse },
            _ => return None,
        };
        Some(action)
    }
}

// =============================================================================
// Redirect Resources
// =============================================================================

pub const RES_EMPTY: &str = "empty";
pub const RES_1X1: &str = "1x1.gif";
pub const RES_2X2: &str = "2x2.png";
pub const RES_3X2: &str = "3x2.png";
pub const RES_32X32: &str = "32x32.png";
pub const RES_NOOP_MP3: &str = "noop-0.1s.mp3";
pub const RES_NOOP_MP4: &str = "noop-1s.mp4";
pub const RES_NOOP_HTML: &str = "noop.html";
pub const RES_NOOP_JS: &str = "noop.js";
pub const RES_NOOP_TXT: &str = "noop.txt";
pub const RES_NOOP_VMAP: &str = "noop-vmap1.0.xml";

/// Resolve a redirect name or alias to a bundled resource file.
///
/// Unknown names resolve to [`RES_EMPTY`].
pub fn resolve_resource(name: &str) -> &'static str {
    match name {
        "" | RES_EMPTY => RES_EMPTY,
        RES_1X1 | "1x1-transparent.gif" => RES_1X1,
        RES_2X2 | "2x2-transparent.png" => RES_2X2,
        RES_3X2 | "3x2-transparent.png" => RES_3X2,
        RES_32X32 | "32x32-transparent.png" => RES_32X32,
        RES_NOOP_MP3 | "noopmp3-0.1s" | "abp-resource:blank-mp3" => RES_NOOP_MP3,
        RES_NOOP_MP4 | "noopmp4-1s" => RES_NOOP_MP4,
        RES_NOOP_HTML | "noopframe" => RES_NOOP_HTML,
        RES_NOOP_JS | "noopjs" | "abp-resource:blank-js" => RES_NOOP_JS,
        RES_NOOP_TXT | "nooptext" => RES_NOOP_TXT,
        RES_NOOP_VMAP | "noopvmap-1." => RES_NOOP_VMAP,
        "addthis_widget.js" | "addthis.com/addthis_widget.js" => "addthis_widget.js",
        "amazon_ads.js" | "amazon-adsystem.com/aax2/amzn_ads.js" => "amazon_ads.js",
        "chartbeat.js" | "static.chartbeat.com/chartbeat.js" => "chartbeat.js",
        "click2load.html" | "aliasURL" | "url" => "click2load.html",
        "doubleclick_instream_ad_status.js" | "doubleclick.net/instream/ad_status.js" => {
            "doubleclick_instream_ad_status.js"
        }
        "google-analytics_analytics.js"
        | "google-analytics.com/analytics.js"
        | "googletagmanager_gtm.js"
        | "googletagmanager.com/gtm.js" => "google-analytics_analytics.js",
        "google-analytics_cx_api.js" | "google-analytics.com/cx/api.js" => "google-analytics_cx_api.js",
        "google-analytics_ga.js" | "google-analytics.com/ga.js" => "google-analytics_ga.js",
        "google-analytics_inpage_linkid.js" | "google-analytics.com/inpage_linkid.js" => {
            "google-analytics_inpage_linkid.js"
        }
        "googlesyndication_adsbygoogle.js" | "googlesyndication.com/adsbygoogle.js" => {
            "googlesyndication_adsbygoogle.js"
        }
        "googletagservices_gpt.js" | "googletagservices.com/gpt.js" => "googletagservices_gpt.js",
        "ligatus_angular-tag.js" | "ligatus.com/*/angular-tag.js" => "ligatus_angular-tag.js",
        "monkeybroker.js" | "d3pkae9owd2lcf.cloudfront.net/mb105.js" => "monkeybroker.js",
        "noeval-silent.js" | "silent-noeval.js" => "noeval-silent.js",
        "nofab.js" | "fuckadblock.js-3.2.0" => "nofab.js",
        "outbrain-widget.js" | "widgets.outbrain.com/outbrain.js" => "outbrain-widget.js",
        "popads.js" | "popads.net.js" => "popads.js",
        "scorecardresearch_beacon.js" | "scorecardresearch.com/beacon.js" => "scorecardresearch_beacon.js",
        "window.open-defuser.js" | "nowoif.js" => "window.open-defuser.js",
        "hd-main.js" => "hd-main.js",
        "mxpnl_mixpanel.js" => "mxpnl_mixpanel.js",
        "noeval.js" => "noeval.js",
        "nobab2.js" => "nobab2.js",
        "popads-dummy.js" => "popads-dummy.js",
        "fingerprint2.js" => "fingerprint2.js",
        "amazon_apstag.js" => "amazon_apstag.js",
        "ampproject_v0.js" => "ampproject_v0.js",
        _ => RES_EMPTY,
    }
}

/// Neutral resource for a request type, used when a redirect names none.
pub fn default_resource(content_type: ContentType) -> &'static str {
    if content_type.intersects(ContentType::IMAGE) {
        RES_1X1
    } else if content_type.intersects(ContentType::SUBDOCUMENT) {
        RES_NOOP_HTML
    } else if content_type.intersects(ContentType::SCRIPT) {
        RES_NOOP_JS
    } else if content_type.intersects(ContentType::MEDIA) {
        RES_NOOP_MP3
    } else {
        RES_EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_param_matching() {
        let plain = ModifyAction::remove_param(Some("utm_source"), false).unwrap();
        assert!(plain.matches_parameter("utm_source"));
        assert!(!plain.matches_parameter("id"));

        let inverse = ModifyAction::remove_param(Some("id"), true).unwrap();
        assert!(inverse.matches_parameter("utm_source"));
        assert!(!inverse.matches_parameter("id"));

        let all = ModifyAction::remove_param(None, false).unwrap();
        assert!(all.matches_parameter("anything"));

        let regex = ModifyAction::remove_param(Some("/^utm_/"), false).unwrap();
        assert!(regex.is_regex());
        assert!(regex.matches_parameter("utm_medium"));
        assert!(!regex.matches_parameter("xutm"));
        assert_eq!(regex.kind(), ModifyKind::RemoveParam);

        assert!(ModifyAction::remove_param(Some("/[/"), false).is_err());
    }

    #[test]
    fn test_redirect_priority() {
        let r = ModifyAction::Redirect { parameter: Some("noopjs:10".into()) };
        assert_eq!(r.redirect_with_priority(), Some(("noopjs", 10)));
        let r = ModifyAction::Redirect { parameter: Some("noop.js".into()) };
        assert_eq!(r.redirect_with_priority(), Some(("noop.js", 0)));
        let r = ModifyAction::Redirect { parameter: Some("abp-resource:blank-js".into()) };
        assert_eq!(r.redirect_with_priority(), Some(("abp-resource:blank-js", 0)));
        assert_eq!(ModifyAction::Csp { parameter: None }.redirect_with_priority(), None);
    }

    #[test]
    fn test_encode_decode() {
        let actions = [
            ModifyAction::remove_param(Some("fbclid"), true).unwrap(),
            ModifyAction::remove_param(Some("/^utm_/"), false).unwrap(),
            ModifyAction::remove_param(None, false).unwrap(),
            ModifyAction::Redirect { parameter: Some("1x1.gif:5".into()) },
            ModifyAction::Csp { parameter: Some("script-src 'none'".into()) },
            ModifyAction::ResponseHeader { header: "set-cookie".into(), remove: true },
        ];
        for action in actions {
            assert_eq!(ModifyAction::decode(&action.encode()), Some(action.clone()));
        }
        assert_eq!(ModifyAction::decode("p1utm").map(|a| a.inverse()), Some(true));
        assert_eq!(ModifyAction::decode("z0x"), None);
        assert_eq!(ModifyAction::decode("q0"), None);
        assert_eq!(ModifyAction::decode("p"), None);
    }

    #[test]
    fn test_resolve_resource() {
        assert_eq!(resolve_resource("noopjs"), RES_NOOP_JS);
        assert_eq!(resolve_resource("1x1-transparent.gif"), RES_1X1);
        assert_eq!(resolve_resource("nowoif.js"), "window.open-defuser.js");
        assert_eq!(resolve_resource("does-not-exist"), RES_EMPTY);
    }

    #[test]
    fn test_default_resource() {
        assert_eq!(default_resource(ContentType::IMAGE), RES_1X1);
        assert_eq!(default_resource(ContentType::SUBDOCUMENT), RES_NOOP_HTML);
        assert_eq!(default_resource(ContentType::SCRIPT), RES_NOOP_JS);
        assert_eq!(default_resource(ContentType::MEDIA), RES_NOOP_MP3);
        assert_eq!(default_resource(ContentType::XHR), RES_EMPTY);
    }
}
