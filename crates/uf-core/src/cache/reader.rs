//! Cache decoders. Any malformed input yields `None`.

use super::format::*;
use crate::container::FilterContainer;
use crate::domain_map::DomainMap;
use crate::element::{ElementContainer, ElementFilter, ElementKind};
use crate::filter::{FilterRecord, FilterType};
use crate::modify::{prefix, ModifyAction};
use crate::types::{ContentType, ThirdParty};

/// Decode a filter cache. Records whose regex no longer compiles are
/// skipped; everything else malformed rejects the whole file.
pub fn decode_filters(data: &[u8], with_modify: bool) -> Option<FilterContainer> {
    let mut r = ByteReader::new(data);
    r.expect(FILTER_CACHE_HEADER)?;
    let count = r.u32_le()? as usize;

    let mut container = FilterContainer::new();
    let mut skipped = 0usize;
    for _ in 0..count {
        let (tag, filter) = read_filter(&mut r)?;
        let modify = if with_modify {
            let encoded = r.str()?;
            match ModifyAction::decode(encoded) {
                Some(action) => Some(Some(action)),
                None if encoded.starts_with(prefix::REMOVEPARAM_REGEX) => None,
                None => return None,
            }
        } else {
            Some(None)
        };

        match (filter, modify) {
            (Some(filter), Some(modify)) => {
                container.add_with_tag(tag.to_string(), filter.with_modify(modify));
            }
            _ => skipped += 1,
        }
    }

    r.expect(FILTER_CACHE_HEADER)?;
    if r.remaining() != 0 {
        return None;
    }
    if skipped > 0 {
        log::warn!("skipped {} cached filters that no longer compile", skipped);
    }
    Some(container)
}

/// One record; the filter is `None` when its regex fails to compile.
fn read_filter<'a>(r: &mut ByteReader<'a>) -> Option<(&'a str, Option<FilterRecord>)> {
    let filter_type = FilterType::try_from(r.u8()?).ok()?;
    let content_type = ContentType::from_bits_retain(r.u16_le()?);
    let third_party = ThirdParty::try_from(r.u8()?).ok()?;
    let pattern = r.str()?;

    if filter_type == FilterType::StartEndDomain {
        let filter = FilterRecord::new(filter_type, pattern, content_type, false, third_party).ok()?;
        return Some((pattern, Some(filter)));
    }

    let ignore_case = r.bool()?;
    let tag = r.str()?;
    let domains = read_domains(r)?;

    match FilterRecord::new(filter_type, pattern, content_type, ignore_case, third_party) {
        Ok(filter) => Some((tag, Some(filter.with_domains(domains)))),
        Err(e) if filter_type.is_regex() => {
            log::warn!("dropping cached filter: {}", e);
            Some((tag, None))
        }
        Err(_) => None,
    }
}

/// `Some(None)` for no restriction, `None` for malformed data.
fn read_domains(r: &mut ByteReader<'_>) -> Option<Option<DomainMap>> {
    let count = r.varint()?;
    if count == 0 {
        return Some(None);
    }
    let include = r.bool()?;

    if count == 1 {
        let domain = r.str()?;
        let value = r.bool()?;
        if value == include {
            return Some(Some(DomainMap::single(domain, include)));
        }
        return Some(Some(DomainMap::from_entries(include, [(domain, value)])));
    }

    let mut entries = Vec::with_capacity(count.min(r.remaining()));
    for _ in 0..count {
        let domain = r.str()?;
        let value = r.bool()?;
        entries.push((domain, value));
    }
    Some(Some(DomainMap::from_entries(include, entries)))
}

/// Decode an element cache.
pub fn decode_elements(data: &[u8]) -> Option<ElementContainer> {
    let mut r = ByteReader::new(data);
    r.expect(ELEMENT_CACHE_HEADER)?;
    let count = r.u32_le()? as usize;

    let mut container = ElementContainer::new();
    for _ in 0..count {
        let kind = ElementKind::try_from(r.u8()?).ok()?;
        let is_hide = r.bool()?;
        let is_not = r.bool()?;
        let domain = r.str()?;
        let selector = r.str()?;
        container.add(ElementFilter::new(kind, domain, is_hide, is_not, selector));
    }

    r.expect(ELEMENT_CACHE_HEADER)?;
    (r.remaining() == 0).then_some(container)
}
