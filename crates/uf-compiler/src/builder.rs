//! Rule Set Builder
//!
//! Turns a [`RuleSource`] into a [`RuleSet`]. Definitions that cannot be
//! built (a regex both engines reject, an unknown type name, a header action
//! without a header) are dropped with a warning; one bad rule never stops
//! the rest of the source from loading.

use std::collections::BTreeMap;

use uf_core::element::{ElementFilter, ElementKind};
use uf_core::{Category, ContentType, DomainMap, FilterError, FilterRecord, ModifyAction, RuleSet};

use crate::optimizer::optimize_filters;
use crate::source::{ElementDef, ElementKindDef, ModifyDef, ModifyType, RuleDef, RuleSource, SourceError};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("unknown content type '{0}'")]
    UnknownContentType(String),

    #[error("{0:?} action requires a parameter")]
    MissingParameter(ModifyType),
}

/// Counters reported after a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub lists: usize,
    pub filters: usize,
    pub dropped: usize,
    pub deduped: usize,
    pub badfilter_rules: usize,
    pub badfiltered: usize,
    pub elements: usize,
    pub element_disable: usize,
}

/// Build a complete rule set. Fails only on structural errors in the source.
pub fn build_rule_set(source: &RuleSource) -> Result<(RuleSet, BuildStats), SourceError> {
    let mut stats = BuildStats {
        lists: source.lists.len(),
        ..BuildStats::default()
    };

    let mut pending: BTreeMap<Category, (Vec<FilterRecord>, Vec<FilterRecord>)> = BTreeMap::new();
    for list in &source.lists {
        let category =
            Category::from_name(&list.category).ok_or_else(|| SourceError::UnknownCategory(list.category.clone()))?;
        let (filters, badfilters) = pending.entry(category).or_default();
        filters.extend(build_filters(&list.filters, &mut stats.dropped));
        badfilters.extend(build_filters(&list.badfilters, &mut stats.dropped));
    }

    let mut rules = RuleSet::new();
    for (category, (mut filters, badfilters)) in pending {
        let optimized = optimize_filters(&mut filters, &badfilters);
        stats.deduped += optimized.deduped;
        stats.badfilter_rules += optimized.badfilter_rules;
        stats.badfiltered += optimized.badfiltered_rules;

        for filter in filters {
            if rules.add(category, filter) {
                stats.filters += 1;
            } else {
                stats.deduped += 1;
            }
        }
        log::debug!("{:?}: {} filters", category, rules.container(category).len());
    }

    for def in &source.element_disable {
        match build_filter(def) {
            Ok(filter) => {
                if rules.element_disable_mut().add(filter) {
                    stats.element_disable += 1;
                }
            }
            Err(e) => {
                log::warn!("dropping element-hiding exception '{}': {}", def.pattern, e);
                stats.dropped += 1;
            }
        }
    }

    for def in &source.elements {
        if rules.add_element(build_element(def)) {
            stats.elements += 1;
        }
    }

    if stats.dropped > 0 {
        log::warn!("dropped {} filters that could not be built", stats.dropped);
    }
    Ok((rules, stats))
}

fn build_filters(defs: &[RuleDef], dropped: &mut usize) -> Vec<FilterRecord> {
    let mut filters = Vec::with_capacity(defs.len());
    for def in defs {
        match build_filter(def) {
            Ok(filter) => filters.push(filter),
            Err(e) => {
                log::warn!("dropping filter '{}': {}", def.pattern, e);
                *dropped += 1;
            }
        }
    }
    filters
}

/// Build one network filter.
pub fn build_filter(def: &RuleDef) -> Result<FilterRecord, BuildError> {
    let content_type = parse_content_type(&def.content_type)?;
    let modify = def.modify.as_ref().map(build_modify).transpose()?;
    let domains = def
        .domains
        .as_ref()
        .filter(|d| !d.entries.is_empty())
        .map(|d| DomainMap::from_entries(d.include, d.entries.iter().map(|(k, v)| (k.as_str(), *v))));

    let filter = FilterRecord::new(
        def.kind.into(),
        &def.pattern,
        content_type,
        def.ignore_case,
        def.third_party.into(),
    )?;
    Ok(filter.with_domains(domains).with_modify(modify))
}

fn parse_content_type(names: &[String]) -> Result<ContentType, BuildError> {
    if names.is_empty() {
        return Ok(ContentType::ALL_NETWORK);
    }
    names.iter().try_fold(ContentType::empty(), |acc, name| {
        ContentType::from_type_name(name)
            .map(|ty| acc | ty)
            .ok_or_else(|| BuildError::UnknownContentType(name.clone()))
    })
}

fn build_modify(def: &ModifyDef) -> Result<ModifyAction, BuildError> {
    let parameter = def.parameter.clone().filter(|p| !p.is_empty());
    let action = match def.kind {
        ModifyType::Removeparam => ModifyAction::remove_param(parameter.as_deref(), def.inverse)
            .map_err(|e| FilterError::InvalidParamRegex(e.to_string()))?,
        ModifyType::Redirect => ModifyAction::Redirect { parameter },
        ModifyType::Csp => ModifyAction::Csp { parameter },
        ModifyType::RequestHeader => ModifyAction::RequestHeader {
            header: parameter.ok_or(BuildError::MissingParameter(def.kind))?,
            remove: def.inverse,
        },
        ModifyType::ResponseHeader => ModifyAction::ResponseHeader {
            header: parameter.ok_or(BuildError::MissingParameter(def.kind))?,
            remove: def.inverse,
        },
    };
    Ok(action)
}

fn build_element(def: &ElementDef) -> ElementFilter {
    let kind = match def.kind {
        ElementKindDef::Plain => ElementKind::Plain,
        ElementKindDef::TldRemoved => ElementKind::TldRemoved,
    };
    ElementFilter::new(kind, &def.domain, def.hide, def.exception, &def.selector)
}
