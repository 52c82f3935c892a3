//! Public Suffix List (PSL) utilities for eTLD+1 extraction
//!
//! A list in the standard `.dat` format can be installed at runtime. Until
//! then a small heuristic covering the common two-part suffixes is used.
//! Lookups go through a per-thread cache, so matching threads never contend
//! on a shared lock.
//!
//! # Examples
//!
//! ```
//! use uf_core::psl::effective_tld_plus_one;
//!
//! assert_eq!(effective_tld_plus_one("sub.example.com").as_deref(), Some("example.com"));
//! assert_eq!(effective_tld_plus_one("sub.example.co.uk").as_deref(), Some("example.co.uk"));
//! assert_eq!(effective_tld_plus_one("com"), None);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use arc_swap::ArcSwapOption;
use publicsuffix::{List, Psl};

use crate::types::RequestParty;
use crate::url::is_ip_literal;

/// Default capacity of the eTLD+1 cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

// =============================================================================
// LRU Cache
// =============================================================================

/// Fixed-size cache for eTLD+1 lookups.
///
/// Entries live in two generations. A hit in the older one promotes the
/// entry; when the newer one fills up it becomes the older one and the
/// previous older generation is dropped. Lookups and inserts are O(1).
pub struct LruCache {
    capacity: usize,
    hot: HashMap<String, Option<String>>,
    cold: HashMap<String, Option<String>>,
}

impl LruCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            capacity,
            hot: HashMap::with_capacity(capacity / 2),
            cold: HashMap::new(),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<Option<String>> {
        if let Some(value) = self.hot.get(key) {
            return Some(value.clone());
        }
        let (key, value) = self.cold.remove_entry(key)?;
        self.insert(key, value.clone());
        Some(value)
    }

    pub fn insert(&mut self, key: String, value: Option<String>) {
        self.cold.remove(&key);
        if self.hot.len() >= self.capacity / 2 && !self.hot.contains_key(&key) {
            self.cold = std::mem::take(&mut self.hot);
        }
        self.hot.insert(key, value);
    }

    pub fn clear(&mut self) {
        self.hot.clear();
        self.cold.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.hot.len() + self.cold.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hot.is_empty() && self.cold.is_empty()
    }
}

// =============================================================================
// PSL Rule Sets
// =============================================================================

/// Parsed public suffix rules.
pub struct PublicSuffixList {
    list: List,
    rules: usize,
}

impl PublicSuffixList {
    /// Parse the standard `public_suffix_list.dat` text format.
    pub fn parse(text: &str) -> Result<Self, publicsuffix::Error> {
        let list: List = text.parse()?;
        let rules = text
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .filter(|rule| !rule.starts_with("//"))
            .count();
        Ok(Self { list, rules })
    }

    pub fn rule_count(&self) -> usize {
        self.rules
    }

    /// Registrable domain of a lowercased host, `None` if the host is itself a suffix.
    pub fn etld1(&self, host: &str) -> Option<String> {
        if host.split('.').any(str::is_empty) {
            return None;
        }
        let domain = self.list.domain(host.as_bytes())?;
        std::str::from_utf8(domain.as_bytes()).ok().map(str::to_string)
    }
}

impl fmt::Debug for PublicSuffixList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicSuffixList").field("rules", &self.rules).finish()
    }
}

// =============================================================================
// Global PSL State
// =============================================================================

static PSL: ArcSwapOption<PublicSuffixList> = ArcSwapOption::const_empty();

/// Bumped by every install; thread caches filled under an older list reset.
static PSL_GENERATION: AtomicU64 = AtomicU64::new(0);

/// Requested cache capacity, 0 until an engine asks for one.
static CACHE_CAPACITY: AtomicUsize = AtomicUsize::new(0);

struct ThreadCache {
    generation: u64,
    capacity: usize,
    cache: LruCache,
}

thread_local! {
    static ETLD1_CACHE: RefCell<Option<ThreadCache>> = const { RefCell::new(None) };
}

/// Install a parsed list for all subsequent lookups.
pub fn install(list: PublicSuffixList) {
    log::info!("installing public suffix list with {} rules", list.rule_count());
    PSL.store(Some(std::sync::Arc::new(list)));
    PSL_GENERATION.fetch_add(1, Ordering::AcqRel);
}

/// Check if a list is installed.
pub fn is_installed() -> bool {
    PSL.load().is_some()
}

/// Request a lookup cache of at least `capacity` entries per thread.
///
/// The setting is shared by every engine in the process; the largest
/// request wins. Existing entries are kept until a thread next resizes.
pub fn set_cache_capacity(capacity: usize) {
    CACHE_CAPACITY.fetch_max(capacity, Ordering::Relaxed);
}

/// Current per-thread cache capacity.
pub fn cache_capacity() -> usize {
    match CACHE_CAPACITY.load(Ordering::Relaxed) {
        0 => DEFAULT_CACHE_CAPACITY,
        capacity => capacity,
    }
}

/// Run `f` on this thread's cache. `None` while the thread is shutting down
/// or the cache is already borrowed.
fn with_thread_cache<R>(f: impl FnOnce(&mut LruCache) -> R) -> Option<R> {
    ETLD1_CACHE
        .try_with(|cell| {
            let mut slot = cell.try_borrow_mut().ok()?;
            let generation = PSL_GENERATION.load(Ordering::Acquire);
            let capacity = cache_capacity();
            let stale = slot
                .as_ref()
                .map_or(true, |c| c.generation != generation || c.capacity != capacity);
            if stale {
                *slot = Some(ThreadCache {
                    generation,
                    capacity,
                    cache: LruCache::new(capacity),
                });
            }
            slot.as_mut().map(|c| f(&mut c.cache))
        })
        .ok()
        .flatten()
}

// =============================================================================
// eTLD+1 Extraction
// =============================================================================

/// Common two-part suffixes for the fallback heuristic.
const COMMON_TWO_PART_TLDS: &[&str] = &[
    "co.uk", "co.jp", "co.nz", "co.za", "co.in", "co.kr",
    "com.au", "com.br", "com.cn", "com.mx", "com.tw", "com.hk",
    "net.au", "net.nz",
    "org.uk", "org.au",
    "gov.uk", "gov.au",
    "ac.uk", "ac.jp",
    "ne.jp", "or.jp",
];

/// Get the eTLD+1 (registrable domain) for a hostname.
///
/// Returns `None` for IP literals, empty hosts and hosts that are a public
/// suffix themselves.
pub fn effective_tld_plus_one(host: &str) -> Option<String> {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() || is_ip_literal(&host) {
        return None;
    }

    if let Some(cached) = with_thread_cache(|cache| cache.get(&host)).flatten() {
        return cached;
    }

    let result = compute_etld1(&host);
    with_thread_cache(|cache| cache.insert(host, result.clone()));
    result
}

fn compute_etld1(host: &str) -> Option<String> {
    match PSL.load_full() {
        Some(list) => list.etld1(host),
        None => {
            let labels: Vec<&str> = host.split('.').collect();
            fallback_etld1(&labels)
        }
    }
}

/// Fallback eTLD+1 heuristic.
fn fallback_etld1(labels: &[&str]) -> Option<String> {
    let n = labels.len();
    if n < 2 || labels.iter().any(|l| l.is_empty()) {
        return None;
    }

    let last_two = format!("{}.{}", labels[n - 2], labels[n - 1]);
    if COMMON_TWO_PART_TLDS.contains(&last_two.as_str()) {
        if n == 2 {
            return None;
        }
        return Some(labels[n - 3..].join("."));
    }

    Some(last_two)
}

/// Classify a request relative to the page that issued it.
pub fn classify_party(url_host: Option<&str>, page_host: Option<&str>) -> RequestParty {
    let (host, page_host) = match (url_host, page_host) {
        (Some(h), Some(p)) if !h.is_empty() && !p.is_empty() => (h, p),
        _ => return RequestParty::ThirdParty,
    };

    if host.eq_ignore_ascii_case(page_host) {
        return RequestParty::StrictFirstParty;
    }

    if is_ip_literal(host) || is_ip_literal(page_host) {
        return RequestParty::ThirdParty;
    }

    match (effective_tld_plus_one(host), effective_tld_plus_one(page_host)) {
        (Some(a), Some(b)) if a == b => RequestParty::FirstParty,
        _ => RequestParty::ThirdParty,
    }
}

// =============================================================================
// Host Suffix Walking
// =============================================================================

/// Get the parent domain (strip leftmost label).
pub fn get_parent_domain(host: &str) -> Option<&str> {
    match host.find('.') {
        Some(idx) if idx < host.len() - 1 => Some(&host[idx + 1..]),
        _ => None,
    }
}

/// Iterator over a host and its parents: `a.b.c`, `b.c`, `c`.
pub struct HostSuffixIter<'a> {
    current: Option<&'a str>,
}

impl<'a> Iterator for HostSuffixIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current?;
        self.current = get_parent_domain(result);
        Some(result)
    }
}

/// Walk host suffixes from most specific to least specific.
pub fn walk_host_suffixes(host: &str) -> HostSuffixIter<'_> {
    HostSuffixIter {
        current: (!host.is_empty()).then_some(host),
    }
}
