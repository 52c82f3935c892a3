//! Binary Rule Cache
//!
//! A compiled [`RuleSet`] is persisted as a directory with one file per
//! category (named by [`Category::prefix`]), plus `e_` for element-hiding
//! filters and `wp_` for page-level element-hiding exceptions.
//!
//! Reads fail closed: any short or corrupt file turns the whole load into a
//! cache miss. A save stages every part in `<dir>.tmp` and only then swaps
//! the staging directory in, parking the previous cache at `<dir>.old` until
//! the swap completes. The cache directory is replaced as a whole, so it must
//! not hold anything else.

mod format;
mod reader;
mod writer;

pub use format::*;
pub use reader::{decode_elements, decode_filters};
pub use writer::{encode_elements, encode_filters};

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::rule_set::{Category, RuleSet, ELEMENT_DISABLE_PREFIX, ELEMENT_PREFIX};

/// Cache I/O errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache path {0} has no directory name")]
    InvalidPath(PathBuf),

    #[error("failed to create cache directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to remove stale {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },

    #[error("failed to replace {path}: {source}")]
    Rename { path: PathBuf, source: io::Error },
}

/// Persist every part of `rules` as the cache directory `dir`.
///
/// On error the previous cache at `dir`, if any, is left in place.
pub fn save_rule_set(dir: &Path, rules: &RuleSet) -> Result<(), CacheError> {
    write_parts(dir, &encode_parts(rules))?;
    log::info!("saved {} filters to {}", rules.filter_count(), dir.display());
    Ok(())
}

/// Load a rule set saved by [`save_rule_set`]. `None` means a cache miss.
///
/// A save interrupted between its two renames leaves only `<dir>.old`,
/// which is read in that case.
pub fn load_rule_set(dir: &Path) -> Option<RuleSet> {
    if !dir.exists() {
        let backup = sibling(dir, BACKUP_SUFFIX).ok()?;
        if backup.is_dir() {
            log::debug!("reading parked cache {}", backup.display());
            return load_parts(&backup);
        }
    }
    load_parts(dir)
}

fn encode_parts(rules: &RuleSet) -> Vec<(&'static str, Vec<u8>)> {
    let mut parts: Vec<(&'static str, Vec<u8>)> = Category::ALL
        .iter()
        .map(|&category| {
            (
                category.prefix(),
                encode_filters(rules.container(category), category.carries_modify()),
            )
        })
        .collect();
    parts.push((ELEMENT_PREFIX, encode_elements(rules.elements().iter())));
    parts.push((ELEMENT_DISABLE_PREFIX, encode_filters(rules.element_disable(), false)));
    parts
}

fn write_parts(dir: &Path, parts: &[(&str, Vec<u8>)]) -> Result<(), CacheError> {
    let staging = sibling(dir, TEMP_SUFFIX)?;
    let backup = sibling(dir, BACKUP_SUFFIX)?;

    remove_stale(&staging)?;
    fs::create_dir_all(&staging).map_err(|source| CacheError::CreateDir {
        path: staging.clone(),
        source,
    })?;

    if let Err(e) = write_staged(&staging, parts) {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }

    swap_in(&staging, dir, &backup)
}

fn write_staged(staging: &Path, parts: &[(&str, Vec<u8>)]) -> Result<(), CacheError> {
    for (name, bytes) in parts {
        let path = staging.join(name);
        let result = File::create(&path).and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });
        result.map_err(|source| CacheError::Write { path, source })?;
    }

    // Directory handles cannot be synced on every platform
    if let Ok(handle) = File::open(staging) {
        let _ = handle.sync_all();
    }
    Ok(())
}

fn swap_in(staging: &Path, dir: &Path, backup: &Path) -> Result<(), CacheError> {
    let had_previous = dir.exists();

    if had_previous {
        if let Err(e) = remove_stale(backup) {
            let _ = fs::remove_dir_all(staging);
            return Err(e);
        }
        if let Err(source) = fs::rename(dir, backup) {
            let _ = fs::remove_dir_all(staging);
            return Err(CacheError::Rename {
                path: dir.to_path_buf(),
                source,
            });
        }
    }

    if let Err(source) = fs::rename(staging, dir) {
        if had_previous {
            let _ = fs::rename(backup, dir);
        }
        let _ = fs::remove_dir_all(staging);
        return Err(CacheError::Rename {
            path: dir.to_path_buf(),
            source,
        });
    }

    if had_previous {
        if let Err(e) = remove_stale(backup) {
            log::warn!("{}", e);
        }
    }
    Ok(())
}

/// `<dir><suffix>` next to `dir`.
fn sibling(dir: &Path, suffix: &str) -> Result<PathBuf, CacheError> {
    let name = dir
        .file_name()
        .ok_or_else(|| CacheError::InvalidPath(dir.to_path_buf()))?;
    let mut name = name.to_owned();
    name.push(suffix);
    Ok(dir.with_file_name(name))
}

fn remove_stale(path: &Path) -> Result<(), CacheError> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    };
    result.map_err(|source| CacheError::Remove {
        path: path.to_path_buf(),
        source,
    })
}

fn load_parts(dir: &Path) -> Option<RuleSet> {
    let mut rules = RuleSet::new();

    for category in Category::ALL {
        let bytes = read_part(dir, category.prefix())?;
        let Some(container) = decode_filters(&bytes, category.carries_modify()) else {
            log::debug!("corrupt cache file {}", dir.join(category.prefix()).display());
            return None;
        };
        *rules.container_mut(category) = container;
    }

    let bytes = read_part(dir, ELEMENT_PREFIX)?;
    *rules.elements_mut() = decode_elements(&bytes)?;

    let bytes = read_part(dir, ELEMENT_DISABLE_PREFIX)?;
    *rules.element_disable_mut() = decode_filters(&bytes, false)?;

    log::debug!("loaded {} filters from {}", rules.filter_count(), dir.display());
    Some(rules)
}

fn read_part(dir: &Path, name: &str) -> Option<Vec<u8>> {
    let path = dir.join(name);
    match fs::read(&path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            log::debug!("cache miss {}: {}", path.display(), e);
            None
        }
    }
}
