//! Domain restrictions (`$domain=`) attached to filter records.

use crate::psl::{effective_tld_plus_one, walk_host_suffixes};

/// Synthetic label used to validate the tail of a wildcard match.
const WILDCARD_PROBE: &str = "example";

/// Backing shape of a [`DomainMap`].
#[derive(Debug, Clone)]
pub enum DomainEntries {
    /// Exactly one entry; its value is the map's `include` flag
    Single(String),
    /// Entries in insertion order, each with its own include/exclude value
    Array(Vec<(String, bool)>),
}

/// Maps page hosts to an include/exclude decision.
#[derive(Debug, Clone)]
pub struct DomainMap {
    include: bool,
    wildcard: bool,
    entries: DomainEntries,
}

impl DomainMap {
    /// Single-entry map.
    pub fn single(domain: impl Into<String>, include: bool) -> Self {
        let domain = domain.into().to_ascii_lowercase();
        Self {
            include,
            wildcard: domain.contains('*'),
            entries: DomainEntries::Single(domain),
        }
    }

    /// Multi-entry map. A single entry whose value equals `include`
    /// collapses to the single form.
    pub fn from_entries<I, S>(include: bool, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        let mut list: Vec<(String, bool)> = Vec::new();
        for (domain, value) in entries {
            let domain = domain.into().to_ascii_lowercase();
            match list.iter_mut().find(|(d, _)| *d == domain) {
                Some(existing) => existing.1 = value,
                None => list.push((domain, value)),
            }
        }

        if list.len() == 1 && list[0].1 == include {
            if let Some((domain, _)) = list.pop() {
                return Self::single(domain, include);
            }
        }

        let wildcard = list.iter().any(|(d, _)| d.contains('*'));
        Self {
            include,
            wildcard,
            entries: DomainEntries::Array(list),
        }
    }

    pub fn include(&self) -> bool {
        self.include
    }

    pub fn wildcard(&self) -> bool {
        self.wildcard
    }

    pub fn len(&self) -> usize {
        match &self.entries {
            DomainEntries::Single(_) => 1,
            DomainEntries::Array(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        let (single, array) = match &self.entries {
            DomainEntries::Single(d) => (Some((d.as_str(), self.include)), None),
            DomainEntries::Array(list) => (None, Some(list.iter().map(|(d, v)| (d.as_str(), *v)))),
        };
        single.into_iter().chain(array.into_iter().flatten())
    }

    /// Decision for a lowercased page host, `None` when no entry applies.
    pub fn get(&self, domain: &str) -> Option<bool> {
        match &self.entries {
            DomainEntries::Single(entry) => {
                let hit = if self.wildcard {
                    match_wildcard(entry, domain)
                } else {
                    match_suffix(entry, domain)
                };
                hit.then_some(self.include)
            }
            DomainEntries::Array(list) if self.wildcard => list
                .iter()
                .find(|(entry, _)| match_wildcard(entry, domain))
                .map(|(_, value)| *value),
            DomainEntries::Array(list) => walk_host_suffixes(domain).find_map(|suffix| {
                list.iter().find(|(entry, _)| entry == suffix).map(|(_, value)| *value)
            }),
        }
    }

    /// Whether a filter with this restriction applies on `page_host`.
    #[inline]
    pub fn check(&self, page_host: &str) -> bool {
        if self.include {
            self.get(page_host) == Some(true)
        } else {
            self.get(page_host) != Some(false)
        }
    }

    /// Same entries and include flag, ignoring storage order.
    pub fn same_entries(&self, other: &DomainMap) -> bool {
        if self.include != other.include || self.len() != other.len() {
            return false;
        }
        let mut mine: Vec<_> = self.iter().collect();
        let mut theirs: Vec<_> = other.iter().collect();
        mine.sort_unstable();
        theirs.sort_unstable();
        mine == theirs
    }
}

impl PartialEq for DomainMap {
    fn eq(&self, other: &Self) -> bool {
        self.same_entries(other)
    }
}

impl Eq for DomainMap {}

#[inline]
fn match_suffix(entry: &str, domain: &str) -> bool {
    domain == entry
        || (domain.len() > entry.len()
            && domain.ends_with(entry)
            && domain.as_bytes()[domain.len() - entry.len() - 1] == b'.')
}

/// Suffix match, or public-suffix aware match for entries ending in `.*`.
///
/// `example.*` matches a domain whose tail after `example` is a complete
/// public suffix, e.g. `example.com`, `example.co.uk` or `ads.example.de`.
pub fn match_wildcard(entry: &str, domain: &str) -> bool {
    if !entry.contains('*') {
        return match_suffix(entry, domain);
    }

    let prefix = match entry.strip_suffix(".*") {
        Some(prefix) if !prefix.is_empty() && !prefix.contains('*') => prefix,
        _ => return false,
    };

    let label_start = domain.starts_with(prefix)
        || domain.match_indices(prefix).any(|(idx, _)| idx > 0 && domain.as_bytes()[idx - 1] == b'.');
    if !label_start {
        return false;
    }

    let tail = match domain.rfind(prefix) {
        Some(idx) => &domain[idx + prefix.len()..],
        None => return false,
    };
    if !tail.starts_with('.') {
        return false;
    }

    let probe = format!("{WILDCARD_PROBE}{tail}");
    effective_tld_plus_one(&probe).is_some_and(|etld1| etld1 == probe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_suffix_match() {
        let map = DomainMap::single("example.com", true);
        assert_eq!(map.get("example.com"), Some(true));
        assert_eq!(map.get("sub.example.com"), Some(true));
        assert_eq!(map.get("myexample.com"), None);
        assert!(map.check("sub.example.com"));
        assert!(!map.check("myexample.com"));
    }

    #[test]
    fn test_single_exclude() {
        let map = DomainMap::single("example.com", false);
        assert!(!map.check("www.example.com"));
        assert!(map.check("other.org"));
    }

    #[test]
    fn test_array_most_specific_wins() {
        let map = DomainMap::from_entries(true, [("example.com", true), ("ads.example.com", false)]);
        assert!(!map.wildcard());
        assert_eq!(map.get("www.example.com"), Some(true));
        assert_eq!(map.get("x.ads.example.com"), Some(false));
        assert_eq!(map.get("example.org"), None);
        assert!(!map.check("x.ads.example.com"));
    }

    #[test]
    fn test_wildcard_tld() {
        let map = DomainMap::single("example.*", true);
        assert!(map.wildcard());
        assert!(map.check("example.com"));
        assert!(map.check("example.co.uk"));
        assert!(map.check("www.example.de"));
        assert!(!map.check("example.other.com"));
        assert!(!map.check("notexample.com"));
        assert!(!map.check("examplefoo.com"));
    }

    #[test]
    fn test_wildcard_tail_follows_last_occurrence() {
        // The suffix is taken after the last occurrence of the name, so an
        // earlier label that merely starts with it still qualifies the host.
        let map = DomainMap::single("example.*", true);
        assert!(map.check("example.fooexample.com"));
        assert!(map.check("example.example.com"));
        assert!(!map.check("fooexample.example.other.com"));
    }

    #[test]
    fn test_wildcard_array_first_match() {
        let map = DomainMap::from_entries(true, [("example.*", true), ("example.com", false)]);
        assert!(map.wildcard());
        assert_eq!(map.get("example.com"), Some(true));
        assert_eq!(map.get("sub.other.net"), None);
    }

    #[test]
    fn test_malformed_wildcard_never_matches() {
        assert!(!match_wildcard("*.example.com", "a.example.com"));
        assert!(!match_wildcard(".*", "example.com"));
    }

    #[test]
    fn test_single_collapse_and_equality() {
        let a = DomainMap::from_entries(true, [("Example.com", true)]);
        assert!(matches!(a.entries, DomainEntries::Single(_)));
        let b = DomainMap::from_entries(true, [("a.com", true), ("b.com", true)]);
        let c = DomainMap::from_entries(true, [("b.com", true), ("a.com", true)]);
        assert_eq!(b, c);
        assert_ne!(a, b);
    }
}
