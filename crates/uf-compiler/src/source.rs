//! JSON rule source: already-parsed filter definitions grouped into lists.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use uf_core::{FilterType, ThirdParty};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("invalid rule source: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown list category '{0}'")]
    UnknownCategory(String),
}

/// Top-level rule source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSource {
    pub lists: Vec<ListDef>,
    pub elements: Vec<ElementDef>,
    /// Page-level `$elemhide` / `$generichide` exceptions
    pub element_disable: Vec<RuleDef>,
}

impl RuleSource {
    pub fn from_json(text: &str) -> Result<Self, SourceError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

/// One list of a category, e.g. the deny rules of a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListDef {
    pub category: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub filters: Vec<RuleDef>,
    #[serde(default)]
    pub badfilters: Vec<RuleDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Contains,
    Host,
    ContainsHost,
    Start,
    End,
    StartEnd,
    Pattern,
    Regex,
    RegexHost,
}

impl From<RuleKind> for FilterType {
    fn from(kind: RuleKind) -> Self {
        match kind {
            RuleKind::Contains => FilterType::Contains,
            RuleKind::Host => FilterType::Host,
            RuleKind::ContainsHost => FilterType::ContainsHost,
            RuleKind::Start => FilterType::Start,
            RuleKind::End => FilterType::End,
            RuleKind::StartEnd => FilterType::StartEnd,
            RuleKind::Pattern => FilterType::Pattern,
            RuleKind::Regex => FilterType::Regex,
            RuleKind::RegexHost => FilterType::RegexHost,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyDef {
    #[default]
    NoPreference,
    FirstParty,
    ThirdParty,
    StrictFirstParty,
    StrictThirdParty,
}

impl From<PartyDef> for ThirdParty {
    fn from(party: PartyDef) -> Self {
        match party {
            PartyDef::NoPreference => ThirdParty::NoPreference,
            PartyDef::FirstParty => ThirdParty::FirstParty,
            PartyDef::ThirdParty => ThirdParty::ThirdParty,
            PartyDef::StrictFirstParty => ThirdParty::StrictFirstParty,
            PartyDef::StrictThirdParty => ThirdParty::StrictThirdParty,
        }
    }
}

/// A single network filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDef {
    pub kind: RuleKind,
    pub pattern: String,
    /// Type names; empty means all network types.
    #[serde(default)]
    pub content_type: Vec<String>,
    #[serde(default = "default_true")]
    pub ignore_case: bool,
    #[serde(default)]
    pub third_party: PartyDef,
    #[serde(default)]
    pub domains: Option<DomainDef>,
    #[serde(default)]
    pub modify: Option<ModifyDef>,
}

/// `$domain=` restriction. Entries are applied in key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainDef {
    #[serde(default = "default_true")]
    pub include: bool,
    pub entries: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifyType {
    Removeparam,
    Redirect,
    Csp,
    RequestHeader,
    ResponseHeader,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyDef {
    #[serde(rename = "type")]
    pub kind: ModifyType,
    #[serde(default)]
    pub parameter: Option<String>,
    /// Inverse removeparam, or header removal
    #[serde(default)]
    pub inverse: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKindDef {
    #[default]
    Plain,
    TldRemoved,
}

/// An element-hiding filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDef {
    #[serde(default)]
    pub kind: ElementKindDef,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_true")]
    pub hide: bool,
    /// `~domain##selector` form
    #[serde(default)]
    pub exception: bool,
    pub selector: String,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_source_with_defaults() {
        let source = RuleSource::from_json(
            r#"{
                "lists": [
                    { "category": "deny", "filters": [ { "kind": "pattern", "pattern": "||ads.com^" } ] }
                ],
                "elements": [ { "selector": ".ad" } ]
            }"#,
        )
        .unwrap();

        let rule = &source.lists[0].filters[0];
        assert_eq!(rule.kind, RuleKind::Pattern);
        assert!(rule.ignore_case);
        assert!(rule.content_type.is_empty());
        assert_eq!(rule.third_party, PartyDef::NoPreference);
        assert!(source.lists[0].badfilters.is_empty());

        let element = &source.elements[0];
        assert!(element.hide);
        assert!(!element.exception);
        assert_eq!(element.kind, ElementKindDef::Plain);
        assert!(source.element_disable.is_empty());
    }

    #[test]
    fn parses_domains_and_modify() {
        let rule: RuleDef = serde_json::from_str(
            r#"{
                "kind": "contains",
                "pattern": "",
                "third_party": "strict_third_party",
                "domains": { "include": false, "entries": { "news.com": false } },
                "modify": { "type": "removeparam", "parameter": "utm_source" }
            }"#,
        )
        .unwrap();
        let domains = rule.domains.unwrap();
        assert!(!domains.include);
        assert_eq!(domains.entries.get("news.com"), Some(&false));
        let modify = rule.modify.unwrap();
        assert_eq!(modify.kind, ModifyType::Removeparam);
        assert!(!modify.inverse);
        assert_eq!(ThirdParty::from(rule.third_party), ThirdParty::StrictThirdParty);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(RuleSource::from_json("{"), Err(SourceError::Json(_))));
        assert!(matches!(
            RuleSource::from_json(r#"{"lists":[{"category":"deny","filters":[{"kind":"glob","pattern":"x"}]}]}"#),
            Err(SourceError::Json(_))
        ));
        assert!(matches!(
            RuleSource::from_path(Path::new("/no/such/rules.json")),
            Err(SourceError::Io { .. })
        ));
    }
}
