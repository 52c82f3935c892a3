use std::collections::HashSet;

use uf_core::{FilterKey, FilterRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
    pub badfilter_rules: usize,
    pub badfiltered_rules: usize,
}

/// Remove filters cancelled by a badfilter of the same category, then drop
/// duplicates keeping the first occurrence.
pub fn optimize_filters(filters: &mut Vec<FilterRecord>, badfilters: &[FilterRecord]) -> OptimizeStats {
    let before = filters.len();
    let badfilter_keys: HashSet<FilterKey> = badfilters.iter().map(FilterRecord::key).collect();

    let mut badfiltered_rules = 0usize;
    if !badfilter_keys.is_empty() {
        filters.retain(|filter| {
            if badfilter_keys.contains(&filter.key()) {
                badfiltered_rules += 1;
                return false;
            }
            true
        });
    }

    let mut seen: HashSet<FilterKey> = HashSet::new();
    let mut deduped = 0usize;
    filters.retain(|filter| {
        if seen.insert(filter.key()) {
            true
        } else {
            deduped += 1;
            false
        }
    });

    OptimizeStats {
        before,
        after: filters.len(),
        deduped,
        badfilter_rules: badfilters.len(),
        badfiltered_rules,
    }
}

#[cfg(test)]
mod tests {
    use uf_core::{ContentType, DomainMap, FilterType, ThirdParty};

    use super::*;

    fn contains(pattern: &str) -> FilterRecord {
        FilterRecord::new(FilterType::Contains, pattern, ContentType::ALL_NETWORK, true, ThirdParty::NoPreference)
            .unwrap()
    }

    #[test]
    fn removes_badfiltered_and_duplicates() {
        let mut filters = vec![contains("/ads/"), contains("/track/"), contains("/ads/"), contains("/pixel/")];
        let stats = optimize_filters(&mut filters, &[contains("/track/")]);

        assert_eq!(stats.before, 4);
        assert_eq!(stats.after, 2);
        assert_eq!(stats.deduped, 1);
        assert_eq!(stats.badfilter_rules, 1);
        assert_eq!(stats.badfiltered_rules, 1);
        let patterns: Vec<_> = filters.iter().map(|f| f.pattern()).collect();
        assert_eq!(patterns, ["/ads/", "/pixel/"]);
    }

    #[test]
    fn badfilter_requires_full_equality() {
        let scoped = contains("/ads/").with_domains(Some(DomainMap::from_entries(true, [("a.com", true), ("b.com", true)])));
        let mut filters = vec![scoped, contains("/ads/")];

        let reordered = contains("/ads/").with_domains(Some(DomainMap::from_entries(true, [("b.com", true), ("a.com", true)])));
        let other_type = FilterRecord::new(FilterType::Contains, "/ads/", ContentType::SCRIPT, true, ThirdParty::NoPreference)
            .unwrap();
        let stats = optimize_filters(&mut filters, &[reordered, other_type]);

        assert_eq!(stats.badfiltered_rules, 1);
        assert_eq!(filters.len(), 1);
        assert!(filters[0].domains().is_none());
    }
}
