//! Cache encoders.

use super::format::*;
use crate::container::FilterContainer;
use crate::element::ElementFilter;
use crate::filter::{FilterRecord, FilterType};

/// Encode a filter container. With `with_modify`, each record is followed by
/// its modify action; records without one are skipped.
pub fn encode_filters(container: &FilterContainer, with_modify: bool) -> Vec<u8> {
    let records: Vec<(&str, &FilterRecord)> = container
        .iter()
        .filter(|(_, f)| !with_modify || f.modify().is_some())
        .collect();

    let mut out = Vec::with_capacity(32 * records.len() + 2 * FILTER_CACHE_HEADER.len() + 4);
    out.extend_from_slice(FILTER_CACHE_HEADER);
    write_u32_le(&mut out, records.len() as u32);

    for (tag, filter) in records {
        write_filter(&mut out, tag, filter);
        if with_modify {
            if let Some(modify) = filter.modify() {
                write_str(&mut out, &modify.encode());
            }
        }
    }

    out.extend_from_slice(FILTER_CACHE_HEADER);
    out
}

fn write_filter(out: &mut Vec<u8>, tag: &str, filter: &FilterRecord) {
    let compact = filter.is_compact_domain() && tag == filter.pattern();
    let filter_type = if compact {
        FilterType::StartEndDomain
    } else {
        filter.filter_type()
    };

    write_u8(out, filter_type as u8);
    write_u16_le(out, filter.content_type().bits());
    write_u8(out, filter.third_party().code());
    write_str(out, filter.pattern());
    if compact {
        return;
    }

    write_bool(out, filter.ignore_case());
    write_str(out, tag);

    match filter.domains() {
        None => write_varint(out, 0),
        Some(domains) => {
            write_varint(out, domains.len());
            write_bool(out, domains.include());
            for (domain, value) in domains.iter() {
                write_str(out, domain);
                write_bool(out, value);
            }
        }
    }
}

/// Encode element-hiding filters.
pub fn encode_elements<'a, I>(filters: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a ElementFilter>,
{
    let filters: Vec<&ElementFilter> = filters.into_iter().collect();

    let mut out = Vec::with_capacity(24 * filters.len() + 2 * ELEMENT_CACHE_HEADER.len() + 4);
    out.extend_from_slice(ELEMENT_CACHE_HEADER);
    write_u32_le(&mut out, filters.len() as u32);

    for filter in filters {
        write_u8(&mut out, filter.kind as u8);
        write_bool(&mut out, filter.is_hide);
        write_bool(&mut out, filter.is_not);
        write_str(&mut out, &filter.domain);
        write_str(&mut out, &filter.selector);
    }

    out.extend_from_slice(ELEMENT_CACHE_HEADER);
    out
}
