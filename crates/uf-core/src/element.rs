//! Element-hiding filters, carried for the page layer.
//!
//! Selectors are never interpreted here; the container only answers which
//! filters apply to a page host.

use std::collections::HashMap;

use crate::psl::effective_tld_plus_one;
use crate::tag;

/// How an element filter's domain is compared with the page host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementKind {
    /// Domain suffix of the host (`example.com##...`)
    Plain = 1,
    /// Domain suffix of the host without its public suffix (`example.*##...`)
    TldRemoved = 2,
}

impl TryFrom<u8> for ElementKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Plain),
            2 => Ok(Self::TldRemoved),
            _ => Err(()),
        }
    }
}

/// One element-hiding rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementFilter {
    pub kind: ElementKind,
    /// Lowercased domain; empty for generic filters
    pub domain: String,
    /// `##` hide rule, or `#@#` exception when false
    pub is_hide: bool,
    /// Domain was negated (`~example.com##...`)
    pub is_not: bool,
    pub selector: String,
}

impl ElementFilter {
    pub fn new(kind: ElementKind, domain: &str, is_hide: bool, is_not: bool, selector: &str) -> Self {
        Self {
            kind,
            domain: domain.to_ascii_lowercase(),
            is_hide,
            is_not,
            selector: selector.to_string(),
        }
    }

    pub fn is_generic(&self) -> bool {
        self.domain.is_empty()
    }

    /// Domain test, before negation.
    pub fn is_match(&self, host: &str, tld_removed: Option<&str>) -> bool {
        if self.domain.is_empty() {
            return true;
        }
        let target = match self.kind {
            ElementKind::Plain => host,
            ElementKind::TldRemoved => match tld_removed {
                Some(t) => t,
                None => return false,
            },
        };
        target == self.domain
            || (target.len() > self.domain.len()
                && target.ends_with(self.domain.as_str())
                && target.as_bytes()[target.len() - self.domain.len() - 1] == b'.')
    }

    /// Decision for a page, negation applied.
    fn applies(&self, host: &str, tld_removed: Option<&str>) -> bool {
        self.is_match(host, tld_removed) != self.is_not
    }
}

/// Host with its public suffix cut off: `www.example.co.uk` → `www.example`.
pub fn remove_effective_tld(host: &str) -> Option<String> {
    let etld1 = effective_tld_plus_one(host)?;
    let suffix_len = etld1.len() - etld1.find('.')?;
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host.get(..host.len().checked_sub(suffix_len)?).map(str::to_string)
}

/// Element filters bucketed by the best tag of their domain.
#[derive(Debug, Clone, Default)]
pub struct ElementContainer {
    buckets: HashMap<String, Vec<ElementFilter>>,
    len: usize,
}

impl ElementContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a filter. Negated filters go to the catch-all bucket since
    /// they apply to hosts that do not carry their domain.
    pub fn add(&mut self, filter: ElementFilter) -> bool {
        let key = if filter.is_not {
            String::new()
        } else {
            tag::longest(&filter.domain)
        };
        let bucket = self.buckets.entry(key).or_default();
        if bucket.contains(&filter) {
            return false;
        }
        bucket.push(filter);
        self.len += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementFilter> + '_ {
        self.buckets.values().flatten()
    }

    /// Filters that apply to `host`. Generic filters only when `use_generic`.
    pub fn get(&self, host: &str, use_generic: bool) -> Vec<&ElementFilter> {
        let host = host.to_ascii_lowercase();
        let tld_removed = remove_effective_tld(&host);

        let mut seen: Vec<String> = Vec::new();
        let mut out = Vec::new();
        for key in tag::candidates(&host) {
            if seen.contains(&key) {
                continue;
            }
            let Some(bucket) = self.buckets.get(&key) else {
                seen.push(key);
                continue;
            };
            out.extend(
                bucket
                    .iter()
                    .filter(|f| use_generic || !f.is_generic())
                    .filter(|f| f.applies(&host, tld_removed.as_deref())),
            );
            seen.push(key);
        }
        out
    }

    /// Hide selectors for `host`, minus those with a matching exception.
    pub fn selectors(&self, host: &str, use_generic: bool) -> Vec<&str> {
        let filters = self.get(host, use_generic);
        let mut out: Vec<&str> = Vec::new();
        for f in filters.iter().filter(|f| f.is_hide) {
            let excepted = filters.iter().any(|e| !e.is_hide && e.selector == f.selector);
            if !excepted && !out.contains(&f.selector.as_str()) {
                out.push(&f.selector);
            }
        }
        out
    }
}
