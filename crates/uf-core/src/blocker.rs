//! Request decision over a rule set.
//!
//! Order: important-allow, important (unless a document-level allow
//! exists), allow, deny, then modify. Blocking decisions consult the
//! redirect lists; allow decisions consult the modify lists.

use crate::filter::FilterRecord;
use crate::modify::{default_resource, resolve_resource, ModifyAction, ModifyKind};
use crate::rule_set::{Category, RuleSet};
use crate::types::{ContentRequest, ContentType, MatchDecision, MatchResult, ModifyResponse};
use crate::url::remove_query_params;

/// Decide what to do with one request.
pub fn decide(rules: &RuleSet, request: &ContentRequest<'_>) -> MatchResult {
    if rules.get(Category::ImportantAllow, request).is_some() {
        return allow_or_modify(rules, request);
    }

    if let Some(important) = rules.get(Category::Important, request) {
        let document_allowed = rules.get(Category::Allow, request).is_some_and(|allow| {
            allow.content_type().contains(ContentType::DOCUMENT)
                && !allow.content_type().contains(ContentType::ALL_NETWORK)
        });
        if document_allowed {
            return MatchResult::default();
        }
        return block_or_redirect(rules, request, Category::Important, important);
    }

    if rules.get(Category::Allow, request).is_some() {
        return allow_or_modify(rules, request);
    }

    if let Some(deny) = rules.get(Category::Deny, request) {
        return block_or_redirect(rules, request, Category::Deny, deny);
    }

    allow_or_modify(rules, request)
}

// =============================================================================
// Block / Redirect
// =============================================================================

fn block_or_redirect(
    rules: &RuleSet,
    request: &ContentRequest<'_>,
    category: Category,
    filter: &FilterRecord,
) -> MatchResult {
    let mut redirects: Vec<&ModifyAction> = rules
        .get_all(Category::Redirect, request)
        .into_iter()
        .filter_map(FilterRecord::modify)
        .collect();
    let exceptions: Vec<&ModifyAction> = rules
        .get_all(Category::RedirectException, request)
        .into_iter()
        .filter_map(FilterRecord::modify)
        .collect();
    remove_exceptions(&mut redirects, &exceptions);

    let target = redirects
        .iter()
        .filter_map(|action| action.redirect_with_priority())
        .max_by_key(|(_, priority)| *priority);

    match target {
        Some((name, _)) => {
            let resource = if name.is_empty() {
                default_resource(request.content_type)
            } else {
                resolve_resource(name)
            };
            log::debug!("redirect {} to {}", request.url, resource);
            MatchResult {
                decision: MatchDecision::Redirect,
                list: Some(category.prefix()),
                pattern: Some(filter.pattern().to_string()),
                redirect_resource: Some(resource),
                modify: None,
            }
        }
        None => MatchResult {
            decision: MatchDecision::Block,
            list: Some(category.prefix()),
            pattern: Some(filter.pattern().to_string()),
            redirect_resource: None,
            modify: None,
        },
    }
}

// =============================================================================
// Allow / Modify
// =============================================================================

fn allow_or_modify(rules: &RuleSet, request: &ContentRequest<'_>) -> MatchResult {
    let modify_filters = rules.get_all(Category::Modify, request);
    if modify_filters.is_empty() {
        return MatchResult::default();
    }

    let mut actions: Vec<&ModifyAction> = modify_filters.into_iter().filter_map(FilterRecord::modify).collect();
    if !request.has_query() {
        actions.retain(|a| a.kind() != ModifyKind::RemoveParam);
    }
    if actions.is_empty() {
        return MatchResult::default();
    }

    let exceptions: Vec<&ModifyAction> = rules
        .get_all(Category::ModifyException, request)
        .into_iter()
        .filter_map(FilterRecord::modify)
        .collect();
    let remaining = remove_exceptions(&mut actions, &exceptions);

    match apply_modifications(request, &actions, &remaining) {
        Some(response) => MatchResult {
            decision: MatchDecision::Modify,
            list: Some(Category::Modify.prefix()),
            modify: Some(response),
            ..MatchResult::default()
        },
        None => MatchResult::default(),
    }
}

/// Drop actions cancelled by exceptions.
///
/// An exception without parameter cancels its whole kind; one with a
/// parameter cancels equal actions, and a header exception without `:`
/// cancels header actions starting with that name. Parameterized
/// removeparam exceptions are returned since they act per query pair.
fn remove_exceptions<'a>(actions: &mut Vec<&'a ModifyAction>, exceptions: &[&'a ModifyAction]) -> Vec<&'a ModifyAction> {
    let mut remaining = Vec::new();
    for &exception in exceptions {
        let kind = exception.kind();
        let parameter = match exception {
            ModifyAction::RemoveParam { parameter: None, .. }
            | ModifyAction::Redirect { parameter: None }
            | ModifyAction::Csp { parameter: None } => None,
            other => other.parameter(),
        };

        let Some(parameter) = parameter else {
            actions.retain(|a| a.kind() != kind);
            continue;
        };

        actions.retain(|a| *a != exception);

        let header_prefix = matches!(kind, ModifyKind::RequestHeader | ModifyKind::ResponseHeader) && !parameter.contains(':');
        if header_prefix {
            actions.retain(|a| {
                !(a.kind() == kind
                    && a.inverse() == exception.inverse()
                    && a.parameter().is_some_and(|p| p.starts_with(parameter)))
            });
        } else if kind == ModifyKind::RemoveParam {
            remaining.push(exception);
        }
    }
    remaining
}

fn apply_modifications(
    request: &ContentRequest<'_>,
    actions: &[&ModifyAction],
    exceptions: &[&ModifyAction],
) -> Option<ModifyResponse> {
    let remove_params: Vec<&ModifyAction> = actions
        .iter()
        .copied()
        .filter(|a| a.kind() == ModifyKind::RemoveParam)
        .collect();

    let new_url = if remove_params.is_empty() {
        None
    } else {
        remove_query_params(request.url, |name| {
            remove_params.iter().any(|a| a.matches_parameter(name))
                && exceptions.iter().all(|e| !e.matches_parameter(name))
        })
    };

    let mut response = ModifyResponse {
        url: new_url.clone().unwrap_or_else(|| request.url.to_string()),
        ..ModifyResponse::default()
    };

    for action in actions {
        match action {
            ModifyAction::Csp { parameter: Some(csp) } => response.csp.push(csp.clone()),
            ModifyAction::RequestHeader { header, remove: true } => {
                response.remove_request_headers.push(header.clone())
            }
            ModifyAction::RequestHeader { header, remove: false } => {
                if let Some(pair) = parse_header(header) {
                    response.add_request_headers.push(pair);
                }
            }
            ModifyAction::ResponseHeader { header, remove: true } => {
                response.remove_response_headers.push(header.clone())
            }
            ModifyAction::ResponseHeader { header, remove: false } => {
                if let Some(pair) = parse_header(header) {
                    response.add_response_headers.push(pair);
                }
            }
            _ => {}
        }
    }

    let changed = new_url.is_some()
        || !response.csp.is_empty()
        || !response.add_request_headers.is_empty()
        || !response.remove_request_headers.is_empty()
        || !response.add_response_headers.is_empty()
        || !response.remove_response_headers.is_empty();
    changed.then_some(response)
}

/// Split `Name: value`.
fn parse_header(header: &str) -> Option<(String, String)> {
    let (name, value) = header.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_map::DomainMap;
    use crate::filter::FilterType;
    use crate::types::ThirdParty;

    fn f(ty: FilterType, pattern: &str) -> FilterRecord {
        FilterRecord::new(ty, pattern, ContentType::ALL_NETWORK, true, ThirdParty::NoPreference).unwrap()
    }

    fn with(ty: FilterType, pattern: &str, action: ModifyAction) -> FilterRecord {
        f(ty, pattern).with_modify(Some(action))
    }

    fn req(url: &str, ty: ContentType) -> ContentRequest<'_> {
        ContentRequest::new(url, Some("www.page.com"), ty)
    }

    #[test]
    fn test_deny_and_allow() {
        let mut rules = RuleSet::new();
        rules.add(Category::Deny, f(FilterType::Pattern, "||ads.net^"));
        rules.add(Category::Allow, f(FilterType::Contains, "/ok/"));

        let r = decide(&rules, &req("https://ads.net/x.js", ContentType::SCRIPT));
        assert_eq!(r.decision, MatchDecision::Block);
        assert_eq!(r.list, Some("b_"));
        assert_eq!(r.pattern.as_deref(), Some("||ads.net^"));
        assert!(r.is_blocked());

        let r = decide(&rules, &req("https://ads.net/ok/x.js", ContentType::SCRIPT));
        assert_eq!(r.decision, MatchDecision::Allow);

        let r = decide(&rules, &req("https://cdn.net/x.js", ContentType::SCRIPT));
        assert_eq!(r, MatchResult::default());
    }

    #[test]
    fn test_important_overrides_allow() {
        let mut rules = RuleSet::new();
        rules.add(Category::Important, f(FilterType::Pattern, "||ads.net^"));
        rules.add(Category::Allow, f(FilterType::Contains, "/ok/"));
        let r = decide(&rules, &req("https://ads.net/ok/x.js", ContentType::SCRIPT));
        assert_eq!(r.decision, MatchDecision::Block);
        assert_eq!(r.list, Some("i_"));

        rules.add(Category::ImportantAllow, f(FilterType::Contains, "/ok/"));
        let r = decide(&rules, &req("https://ads.net/ok/x.js", ContentType::SCRIPT));
        assert_eq!(r.decision, MatchDecision::Allow);
    }

    #[test]
    fn test_document_allow_disables_important() {
        let mut rules = RuleSet::new();
        rules.add(Category::Important, f(FilterType::Pattern, "||ads.net^"));
        let doc_allow = FilterRecord::new(
            FilterType::Pattern,
            "||ads.net^",
            ContentType::DOCUMENT | ContentType::SCRIPT,
            true,
            ThirdParty::NoPreference,
        )
        .unwrap();
        rules.add(Category::Allow, doc_allow);
        let r = decide(&rules, &req("https://ads.net/x.js", ContentType::SCRIPT));
        assert_eq!(r.decision, MatchDecision::Allow);
    }

    #[test]
    fn test_redirect_priority_and_exceptions() {
        let mut rules = RuleSet::new();
        rules.add(Category::Deny, f(FilterType::Pattern, "||ads.net^"));
        rules.add(
            Category::Redirect,
            with(FilterType::Pattern, "||ads.net^", ModifyAction::Redirect { parameter: Some("noopjs".into()) }),
        );
        rules.add(
            Category::Redirect,
            with(FilterType::Contains, "/video/", ModifyAction::Redirect { parameter: Some("noop-1s.mp4:5".into()) }),
        );

        let r = decide(&rules, &req("https://ads.net/x.js", ContentType::SCRIPT));
        assert_eq!(r.decision, MatchDecision::Redirect);
        assert_eq!(r.redirect_resource, Some("noop.js"));

        let r = decide(&rules, &req("https://ads.net/video/x", ContentType::MEDIA));
        assert_eq!(r.redirect_resource, Some("noop-1s.mp4"));

        rules.add(
            Category::RedirectException,
            with(FilterType::Contains, "/video/", ModifyAction::Redirect { parameter: Some("noop-1s.mp4:5".into()) }),
        );
        let r = decide(&rules, &req("https://ads.net/video/x", ContentType::MEDIA));
        assert_eq!(r.redirect_resource, Some("noop.js"));

        rules.add(
            Category::RedirectException,
            with(FilterType::Contains, "/video/", ModifyAction::Redirect { parameter: None }),
        );
        let r = decide(&rules, &req("https://ads.net/video/x", ContentType::MEDIA));
        assert_eq!(r.decision, MatchDecision::Block);
    }

    #[test]
    fn test_redirect_default_resource() {
        let mut rules = RuleSet::new();
        rules.add(Category::Deny, f(FilterType::Contains, "/pixel"));
        rules.add(
            Category::Redirect,
            with(FilterType::Contains, "/pixel", ModifyAction::Redirect { parameter: None }),
        );
        let r = decide(&rules, &req("https://t.net/pixel.gif", ContentType::IMAGE));
        assert_eq!(r.redirect_resource, Some("1x1.gif"));
        let r = decide(&rules, &req("https://t.net/pixel", ContentType::XHR));
        assert_eq!(r.redirect_resource, Some("empty"));
    }

    #[test]
    fn test_removeparam() {
        let mut rules = RuleSet::new();
        rules.add(
            Category::Modify,
            with(FilterType::Contains, "", ModifyAction::remove_param(Some("/^utm_/"), false).unwrap()),
        );
        rules.add(
            Category::Modify,
            with(FilterType::Contains, "", ModifyAction::remove_param(Some("fbclid"), false).unwrap()),
        );

        let r = decide(&rules, &req("https://shop.com/p?utm_source=x&id=3&fbclid=y#top", ContentType::DOCUMENT));
        assert_eq!(r.decision, MatchDecision::Modify);
        assert_eq!(r.modify.map(|m| m.url).as_deref(), Some("https://shop.com/p?id=3#top"));

        let r = decide(&rules, &req("https://shop.com/p", ContentType::DOCUMENT));
        assert_eq!(r.decision, MatchDecision::Allow);

        let r = decide(&rules, &req("https://shop.com/p?id=3", ContentType::DOCUMENT));
        assert_eq!(r.decision, MatchDecision::Allow);
    }

    #[test]
    fn test_removeparam_exceptions() {
        let mut rules = RuleSet::new();
        rules.add(
            Category::Modify,
            with(FilterType::Contains, "", ModifyAction::remove_param(None, false).unwrap()),
        );
        let protect = with(FilterType::Contains, "", ModifyAction::remove_param(Some("id"), false).unwrap())
            .with_domains(Some(DomainMap::single("page.com", true)));
        rules.add(Category::ModifyException, protect);

        let r = decide(&rules, &req("https://shop.com/p?a=1&id=3", ContentType::DOCUMENT));
        assert_eq!(r.modify.map(|m| m.url).as_deref(), Some("https://shop.com/p?id=3"));

        let mut rules = RuleSet::new();
        rules.add(
            Category::Modify,
            with(FilterType::Contains, "", ModifyAction::remove_param(Some("a"), false).unwrap()),
        );
        rules.add(
            Category::ModifyException,
            with(FilterType::Contains, "", ModifyAction::remove_param(None, false).unwrap()),
        );
        let r = decide(&rules, &req("https://shop.com/p?a=1", ContentType::DOCUMENT));
        assert_eq!(r.decision, MatchDecision::Allow);
    }

    #[test]
    fn test_csp_and_headers() {
        let mut rules = RuleSet::new();
        rules.add(
            Category::Modify,
            with(FilterType::Contains, "", ModifyAction::Csp { parameter: Some("script-src 'self'".into()) }),
        );
        rules.add(
            Category::Modify,
            with(FilterType::Contains, "", ModifyAction::ResponseHeader { header: "X-Frame-Options: DENY".into(), remove: false }),
        );
        rules.add(
            Category::Modify,
            with(FilterType::Contains, "", ModifyAction::RequestHeader { header: "referer".into(), remove: true }),
        );

        let r = decide(&rules, &req("https://site.com/", ContentType::DOCUMENT));
        assert_eq!(r.decision, MatchDecision::Modify);
        let m = r.modify.unwrap();
        assert_eq!(m.url, "https://site.com/");
        assert_eq!(m.csp, ["script-src 'self'"]);
        assert_eq!(m.add_response_headers, [("X-Frame-Options".to_string(), "DENY".to_string())]);
        assert_eq!(m.remove_request_headers, ["referer"]);

        rules.add(
            Category::ModifyException,
            with(FilterType::Contains, "", ModifyAction::ResponseHeader { header: "X-Frame".into(), remove: false }),
        );
        rules.add(
            Category::ModifyException,
            with(FilterType::Contains, "", ModifyAction::Csp { parameter: None }),
        );
        let r = decide(&rules, &req("https://site.com/", ContentType::DOCUMENT));
        let m = r.modify.unwrap();
        assert!(m.csp.is_empty());
        assert!(m.add_response_headers.is_empty());
        assert_eq!(m.remove_request_headers, ["referer"]);
    }
}
