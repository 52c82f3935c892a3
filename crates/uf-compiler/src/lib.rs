//! Unifilter Rule Compiler
//!
//! This crate turns a structured JSON rule source into a compiled
//! [`uf_core::RuleSet`], ready to be served or written to the binary cache.

pub mod builder;
pub mod optimizer;
pub mod source;

pub use builder::{build_filter, build_rule_set, BuildError, BuildStats};
pub use optimizer::{optimize_filters, OptimizeStats};
pub use source::{RuleDef, RuleSource, SourceError};
