//! Unifilter Core Library
//!
//! This crate provides the matching engine for the unifilter content blocker.
//! It evaluates network requests against Adblock-Plus style filter records
//! and decides whether to allow, block, redirect or modify them.
//!
//! # Architecture
//!
//! Filters are grouped into a [`RuleSet`] by list category (allow, deny,
//! important, modify, redirect and their exceptions). Inside each category a
//! [`FilterContainer`] buckets filters under a tag, a literal substring the
//! filter requires, so a request only visits the buckets named by the tags
//! its URL contains. The rule set is immutable once built; the [`Engine`]
//! publishes whole snapshots and persists them in a binary cache.
//!
//! # Modules
//!
//! - `types`: Request descriptor, content types, party and match results
//! - `url`: Allocation-free URL slicing and query rewriting
//! - `psl`: Public Suffix List for eTLD+1 extraction
//! - `domain_map`: `$domain=` restrictions with wildcard TLD entries
//! - `modify`: Modify actions ($removeparam, $redirect, $csp, headers)
//! - `filter`: Filter records and the pattern/regex matchers
//! - `tag`: Tag extraction for filters and URLs
//! - `container`: Tag-indexed filter buckets
//! - `element`: Element-hiding filters
//! - `rule_set`: Categories and the compiled rule set
//! - `blocker`: The request decision
//! - `cache`: Binary cache reader and writer
//! - `engine`: Snapshot publication and reload

pub mod blocker;
pub mod cache;
pub mod container;
pub mod domain_map;
pub mod element;
pub mod engine;
pub mod filter;
pub mod modify;
pub mod psl;
pub mod rule_set;
pub mod tag;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use container::FilterContainer;
pub use domain_map::DomainMap;
pub use element::{ElementContainer, ElementFilter, ElementKind};
pub use engine::{Engine, EngineConfig, ReloadTicket};
pub use filter::{FilterError, FilterKey, FilterRecord, FilterType};
pub use modify::ModifyAction;
pub use psl::effective_tld_plus_one;
pub use rule_set::{Category, RuleSet};
pub use types::{
    ContentRequest, ContentType, MatchDecision, MatchResult, ModifyResponse, RequestParty, ThirdParty,
};
