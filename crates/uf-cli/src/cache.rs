use std::fs;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use uf_compiler::{build_rule_set, RuleSource};
use uf_core::cache::{load_rule_set, save_rule_set};
use uf_core::rule_set::{ELEMENT_DISABLE_PREFIX, ELEMENT_PREFIX};
use uf_core::{Category, RuleSet};

#[derive(Debug, Clone)]
pub struct CompileStats {
    pub lists: usize,
    pub filters: usize,
    pub dropped: usize,
    pub deduped: usize,
    pub badfilter_rules: usize,
    pub badfiltered: usize,
    pub elements: usize,
    pub total_ms: f64,
}

pub fn compile_rule_set(input: &Path, verbose: bool) -> Result<(RuleSet, CompileStats), String> {
    let start = Instant::now();
    let source = RuleSource::from_path(input).map_err(|e| e.to_string())?;

    if verbose {
        for (i, list) in source.lists.iter().enumerate() {
            println!(
                "  [{}] {} ({}) - {} filters, {} badfilters",
                i,
                list.name.as_deref().unwrap_or("unnamed"),
                list.category,
                list.filters.len(),
                list.badfilters.len()
            );
        }
    }

    let (rules, build) = build_rule_set(&source).map_err(|e| e.to_string())?;

    let stats = CompileStats {
        lists: build.lists,
        filters: build.filters,
        dropped: build.dropped,
        deduped: build.deduped,
        badfilter_rules: build.badfilter_rules,
        badfiltered: build.badfiltered,
        elements: build.elements,
        total_ms: start.elapsed().as_secs_f64() * 1000.0,
    };
    Ok((rules, stats))
}

pub fn write_cache(dir: &Path, rules: &RuleSet) -> Result<(), String> {
    save_rule_set(dir, rules).map_err(|e| e.to_string())
}

pub fn read_cache(dir: &Path) -> Result<RuleSet, String> {
    if !dir.is_dir() {
        return Err(format!("'{}' is not a directory", dir.display()));
    }
    load_rule_set(dir).ok_or_else(|| format!("'{}' is missing cache files or is corrupt", dir.display()))
}

/// Summary printed by `info`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    pub path: String,
    pub total_bytes: u64,
    pub filters: usize,
    pub categories: Vec<CategoryInfo>,
    pub elements: usize,
    pub element_disable: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryInfo {
    pub category: String,
    pub file: String,
    pub bytes: u64,
    pub filters: usize,
    pub buckets: usize,
}

pub fn cache_info(dir: &Path, rules: &RuleSet) -> CacheInfo {
    let file_size = |name: &str| fs::metadata(dir.join(name)).map(|m| m.len()).unwrap_or(0);

    let categories: Vec<CategoryInfo> = Category::ALL
        .iter()
        .map(|&category| {
            let container = rules.container(category);
            CategoryInfo {
                category: format!("{:?}", category),
                file: category.prefix().to_string(),
                bytes: file_size(category.prefix()),
                filters: container.len(),
                buckets: container.bucket_count(),
            }
        })
        .collect();

    let total_bytes = categories.iter().map(|c| c.bytes).sum::<u64>()
        + file_size(ELEMENT_PREFIX)
        + file_size(ELEMENT_DISABLE_PREFIX);

    CacheInfo {
        path: dir.display().to_string(),
        total_bytes,
        filters: rules.filter_count(),
        categories,
        elements: rules.elements().len(),
        element_disable: rules.element_disable().len(),
    }
}
