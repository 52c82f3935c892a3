//! Tag-indexed filter buckets.

use std::collections::HashMap;

use crate::filter::FilterRecord;
use crate::tag::best_tag;
use crate::types::ContentRequest;

/// Filters bucketed by index tag.
#[derive(Debug, Clone, Default)]
pub struct FilterContainer {
    buckets: HashMap<String, Vec<FilterRecord>>,
    len: usize,
}

impl FilterContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under the filter's best tag. Returns `false` for a duplicate.
    pub fn add(&mut self, filter: FilterRecord) -> bool {
        let tag = best_tag(&filter);
        self.add_with_tag(tag, filter)
    }

    /// Insert under a precomputed tag. Returns `false` for a duplicate.
    pub fn add_with_tag(&mut self, tag: String, filter: FilterRecord) -> bool {
        let bucket = self.buckets.entry(tag).or_default();
        if bucket.contains(&filter) {
            return false;
        }
        bucket.push(filter);
        self.len += 1;
        true
    }

    /// Remove every filter equal to `filter`. Returns the number removed.
    pub fn remove(&mut self, filter: &FilterRecord) -> usize {
        let mut removed = 0;
        self.buckets.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|f| f != filter);
            removed += before - bucket.len();
            !bucket.is_empty()
        });
        self.len -= removed;
        removed
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// `(tag, filter)` pairs, bucket order preserved.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterRecord)> + '_ {
        self.buckets
            .iter()
            .flat_map(|(tag, bucket)| bucket.iter().map(move |f| (tag.as_str(), f)))
    }

    /// First matching filter, visiting the request's tags in order.
    pub fn get(&self, request: &ContentRequest<'_>) -> Option<&FilterRecord> {
        request
            .tags()
            .filter_map(|tag| self.buckets.get(tag))
            .find_map(|bucket| bucket.iter().find(|f| f.is_match(request)))
    }

    /// Every matching filter.
    pub fn get_all(&self, request: &ContentRequest<'_>) -> Vec<&FilterRecord> {
        let mut seen: Vec<&str> = Vec::new();
        let mut out = Vec::new();
        for tag in request.tags() {
            if seen.contains(&tag) {
                continue;
            }
            seen.push(tag);
            if let Some(bucket) = self.buckets.get(tag) {
                out.extend(bucket.iter().filter(|f| f.is_match(request)));
            }
        }
        out
    }
}
