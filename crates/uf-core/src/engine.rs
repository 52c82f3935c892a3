//! Snapshot Engine
//!
//! Holds the live [`RuleSet`] behind an [`ArcSwap`]. Readers load the current
//! snapshot without locking; a reload builds a complete rule set off the
//! request path and swaps it in as a whole. Each reload takes a
//! [`ReloadTicket`], and only the newest ticket may publish, so a slow build
//! that was superseded is dropped instead of overwriting newer rules.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use arc_swap::{ArcSwap, Guard};
use serde::{Deserialize, Serialize};

use crate::blocker;
use crate::cache::{self, CacheError};
use crate::psl;
use crate::rule_set::RuleSet;
use crate::types::{ContentRequest, MatchResult};

// =============================================================================
// Configuration
// =============================================================================

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory of the binary rule cache, used by [`Engine::open`] and the
    /// `*_configured_cache` methods.
    pub cache_dir: Option<PathBuf>,
    /// Per-thread capacity of the eTLD+1 lookup cache. Shared by every
    /// engine in the process; the largest value applies.
    pub etld1_cache_capacity: usize,
    /// Apply generic (domain-less) element-hiding filters.
    pub generic_element_hiding: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            etld1_cache_capacity: psl::DEFAULT_CACHE_CAPACITY,
            generic_element_hiding: true,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Permission to publish one rebuilt rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadTicket {
    generation: u64,
}

impl ReloadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

pub struct Engine {
    config: EngineConfig,
    current: ArcSwap<RuleSet>,
    generation: AtomicU64,
    publish_lock: Mutex<()>,
}

impl Engine {
    /// Create an engine serving an empty rule set.
    pub fn new(config: EngineConfig) -> Self {
        psl::set_cache_capacity(config.etld1_cache_capacity);
        Self {
            config,
            current: ArcSwap::from_pointee(RuleSet::new()),
            generation: AtomicU64::new(0),
            publish_lock: Mutex::new(()),
        }
    }

    /// Create an engine serving the rule cache in `config.cache_dir`, or an
    /// empty rule set when there is none.
    pub fn open(config: EngineConfig) -> Self {
        let engine = Self::new(config);
        engine.load_configured_cache();
        engine
    }

    /// Create an engine and serve `rules` right away.
    pub fn with_rules(config: EngineConfig, rules: RuleSet) -> Self {
        let engine = Self::new(config);
        engine.current.store(Arc::new(rules));
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The live snapshot. It stays valid while held, even across a publish.
    pub fn current(&self) -> Guard<Arc<RuleSet>> {
        self.current.load()
    }

    /// Generation of the newest ticket handed out.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Start a reload. Any earlier ticket becomes stale.
    pub fn begin_reload(&self) -> ReloadTicket {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        ReloadTicket { generation }
    }

    /// Swap in `rules` unless a newer reload has started since `ticket`.
    pub fn publish(&self, ticket: ReloadTicket, rules: RuleSet) -> bool {
        let _guard = match self.publish_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.generation() != ticket.generation {
            log::debug!(
                "dropping stale rule set (generation {}, newest {})",
                ticket.generation,
                self.generation()
            );
            return false;
        }
        let count = rules.filter_count();
        self.current.store(Arc::new(rules));
        log::info!("published rule set generation {} with {} filters", ticket.generation, count);
        true
    }

    /// Run `build` on a worker thread and publish its result. The handle
    /// yields whether the result was published.
    pub fn reload_in_background<F>(self: &Arc<Self>, build: F) -> JoinHandle<bool>
    where
        F: FnOnce() -> RuleSet + Send + 'static,
    {
        let ticket = self.begin_reload();
        let engine = Arc::clone(self);
        thread::spawn(move || {
            let rules = build();
            engine.publish(ticket, rules)
        })
    }

    /// Decide a request against the live snapshot.
    pub fn decide(&self, request: &ContentRequest<'_>) -> MatchResult {
        blocker::decide(&self.current.load(), request)
    }

    /// Element-hiding selectors for a page.
    pub fn element_selectors(&self, page_url: &str) -> Vec<String> {
        let rules = self.current.load();
        rules
            .element_selectors(page_url, self.config.generic_element_hiding)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Publish the cached rule set in `dir`. Returns false on a cache miss.
    pub fn load_cache(&self, dir: &Path) -> bool {
        let ticket = self.begin_reload();
        match cache::load_rule_set(dir) {
            Some(rules) => self.publish(ticket, rules),
            None => {
                log::info!("no usable rule cache in {}", dir.display());
                false
            }
        }
    }

    /// [`Engine::load_cache`] from `config.cache_dir`. False when unset.
    pub fn load_configured_cache(&self) -> bool {
        match &self.config.cache_dir {
            Some(dir) => self.load_cache(dir),
            None => false,
        }
    }

    /// [`Engine::save_cache`] to `config.cache_dir`. Returns whether a
    /// directory was configured.
    pub fn save_configured_cache(&self) -> Result<bool, CacheError> {
        match &self.config.cache_dir {
            Some(dir) => self.save_cache(dir).map(|()| true),
            None => Ok(false),
        }
    }

    /// Persist the live snapshot to `dir`.
    pub fn save_cache(&self, dir: &Path) -> Result<(), CacheError> {
        let rules = self.current.load_full();
        cache::save_rule_set(dir, &rules).map_err(|e| {
            log::warn!("rule cache write failed: {}", e);
            e
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterRecord, FilterType};
    use crate::rule_set::Category;
    use crate::types::{ContentType, MatchDecision, ThirdParty};
    use std::sync::mpsc;

    fn deny(pattern: &str) -> RuleSet {
        let mut rules = RuleSet::new();
        rules.add(
            Category::Deny,
            FilterRecord::new(FilterType::Contains, pattern, ContentType::ALL_NETWORK, true, ThirdParty::NoPreference)
                .unwrap(),
        );
        rules
    }

    fn decision(engine: &Engine, url: &str) -> MatchDecision {
        engine.decide(&ContentRequest::new(url, Some("page.com"), ContentType::SCRIPT)).decision
    }

    #[test]
    fn test_publish_swaps_snapshot() {
        let engine = Engine::default();
        assert_eq!(decision(&engine, "https://x.com/ads/a.js"), MatchDecision::Allow);

        let held = engine.current();
        let ticket = engine.begin_reload();
        assert!(engine.publish(ticket, deny("/ads/")));
        assert_eq!(decision(&engine, "https://x.com/ads/a.js"), MatchDecision::Block);
        assert_eq!(held.filter_count(), 0);
    }

    #[test]
    fn test_stale_ticket_is_dropped() {
        let engine = Engine::default();
        let old = engine.begin_reload();
        let new = engine.begin_reload();
        assert!(engine.publish(new, deny("/new/")));
        assert!(!engine.publish(old, deny("/old/")));
        assert_eq!(decision(&engine, "https://x.com/new/a.js"), MatchDecision::Block);
        assert_eq!(decision(&engine, "https://x.com/old/a.js"), MatchDecision::Allow);
    }

    #[test]
    fn test_background_reload_superseded() {
        let engine = Arc::new(Engine::default());
        let (release, wait) = mpsc::channel::<()>();
        let slow = engine.reload_in_background(move || {
            let _ = wait.recv();
            deny("/slow/")
        });
        let fast = engine.reload_in_background(|| deny("/fast/"));

        assert!(fast.join().unwrap());
        release.send(()).unwrap();
        assert!(!slow.join().unwrap());
        assert_eq!(decision(&engine, "https://x.com/fast/a.js"), MatchDecision::Block);
        assert_eq!(decision(&engine, "https://x.com/slow/a.js"), MatchDecision::Allow);
    }

    #[test]
    fn test_cache_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("rules");
        let engine = Engine::with_rules(EngineConfig::default(), deny("/ads/"));
        engine.save_cache(&cache).unwrap();

        let fresh = Engine::default();
        assert!(!fresh.load_cache(&dir.path().join("missing")));
        assert!(fresh.load_cache(&cache));
        assert_eq!(decision(&fresh, "https://x.com/ads/a.js"), MatchDecision::Block);
    }

    #[test]
    fn test_configured_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            cache_dir: Some(dir.path().join("rules")),
            ..EngineConfig::default()
        };

        let empty = Engine::open(config.clone());
        assert_eq!(empty.current().filter_count(), 0);

        let engine = Engine::with_rules(config.clone(), deny("/ads/"));
        assert!(engine.save_configured_cache().unwrap());

        let reopened = Engine::open(config);
        assert_eq!(decision(&reopened, "https://x.com/ads/a.js"), MatchDecision::Block);

        let unset = Engine::default();
        assert!(!unset.load_configured_cache());
        assert!(!unset.save_configured_cache().unwrap());
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"generic_element_hiding": false}"#).unwrap();
        assert_eq!(config.etld1_cache_capacity, psl::DEFAULT_CACHE_CAPACITY);
        assert!(!config.generic_element_hiding);
        assert!(config.cache_dir.is_none());
    }
}
