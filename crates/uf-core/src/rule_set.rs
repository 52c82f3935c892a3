//! Compiled filters grouped by list category.

use crate::container::FilterContainer;
use crate::element::{ElementContainer, ElementFilter};
use crate::filter::FilterRecord;
use crate::types::{ContentRequest, ContentType};

/// List category of a network filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Allow,
    Deny,
    Modify,
    ModifyException,
    Important,
    ImportantAllow,
    Redirect,
    RedirectException,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Allow,
        Category::Deny,
        Category::Modify,
        Category::ModifyException,
        Category::Important,
        Category::ImportantAllow,
        Category::Redirect,
        Category::RedirectException,
    ];

    /// Cache file prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Allow => "w_",
            Self::Deny => "b_",
            Self::Modify => "m_",
            Self::ModifyException => "me_",
            Self::Important => "i_",
            Self::ImportantAllow => "ia_",
            Self::Redirect => "r_",
            Self::RedirectException => "re_",
        }
    }

    /// Parse a rule-source category name.
    pub fn from_name(name: &str) -> Option<Self> {
        let category = match name {
            "allow" => Self::Allow,
            "deny" | "block" => Self::Deny,
            "modify" => Self::Modify,
            "modify_exception" => Self::ModifyException,
            "important" => Self::Important,
            "important_allow" => Self::ImportantAllow,
            "redirect" => Self::Redirect,
            "redirect_exception" => Self::RedirectException,
            _ => return None,
        };
        Some(category)
    }

    /// Whether filters of this category carry a modify action.
    pub fn carries_modify(self) -> bool {
        matches!(
            self,
            Self::Modify | Self::ModifyException | Self::Redirect | Self::RedirectException
        )
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Cache file prefix of the element-hiding list.
pub const ELEMENT_PREFIX: &str = "e_";

/// Cache file prefix of the page-level element-hiding exceptions.
pub const ELEMENT_DISABLE_PREFIX: &str = "wp_";

/// A complete compiled rule set. Built once, then only read.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    containers: [FilterContainer; 8],
    elements: ElementContainer,
    element_disable: FilterContainer,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn container(&self, category: Category) -> &FilterContainer {
        &self.containers[category.index()]
    }

    pub fn container_mut(&mut self, category: Category) -> &mut FilterContainer {
        &mut self.containers[category.index()]
    }

    pub fn add(&mut self, category: Category, filter: FilterRecord) -> bool {
        self.container_mut(category).add(filter)
    }

    /// First matching filter of a category.
    pub fn get(&self, category: Category, request: &ContentRequest<'_>) -> Option<&FilterRecord> {
        self.container(category).get(request)
    }

    pub fn get_all(&self, category: Category, request: &ContentRequest<'_>) -> Vec<&FilterRecord> {
        self.container(category).get_all(request)
    }

    pub fn elements(&self) -> &ElementContainer {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut ElementContainer {
        &mut self.elements
    }

    pub fn add_element(&mut self, filter: ElementFilter) -> bool {
        self.elements.add(filter)
    }

    pub fn element_disable(&self) -> &FilterContainer {
        &self.element_disable
    }

    pub fn element_disable_mut(&mut self) -> &mut FilterContainer {
        &mut self.element_disable
    }

    /// Network filters across all categories.
    pub fn filter_count(&self) -> usize {
        self.containers.iter().map(FilterContainer::len).sum()
    }

    /// Hide selectors for a page, honoring `$elemhide` and `$generichide`
    /// page exceptions.
    pub fn element_selectors(&self, page_url: &str, generic_enabled: bool) -> Vec<&str> {
        let page = ContentRequest::new(page_url, None, ContentType::ELEMHIDE);
        let Some(host) = page.host_lowercase() else {
            return Vec::new();
        };
        let host = host.to_string();
        let page = ContentRequest::new(page_url, Some(host.as_str()), ContentType::ELEMHIDE);
        if self.element_disable.get(&page).is_some() {
            return Vec::new();
        }

        let page = ContentRequest::new(page_url, Some(host.as_str()), ContentType::GENERICHIDE);
        let use_generic = generic_enabled && self.element_disable.get(&page).is_none();
        self.elements.selectors(&host, use_generic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKind;
    use crate::filter::FilterType;
    use crate::types::ThirdParty;

    #[test]
    fn test_category_prefixes_unique() {
        let mut prefixes: Vec<_> = Category::ALL.iter().map(|c| c.prefix()).collect();
        prefixes.push(ELEMENT_PREFIX);
        prefixes.push(ELEMENT_DISABLE_PREFIX);
        let count = prefixes.len();
        prefixes.sort_unstable();
        prefixes.dedup();
        assert_eq!(prefixes.len(), count);
        for (i, c) in Category::ALL.iter().enumerate() {
            assert_eq!(c.index(), i);
        }
        assert_eq!(Category::from_name("block"), Some(Category::Deny));
        assert!(Category::Redirect.carries_modify());
        assert!(!Category::Important.carries_modify());
    }

    #[test]
    fn test_element_selectors_with_page_exceptions() {
        let mut rules = RuleSet::new();
        rules.add_element(ElementFilter::new(ElementKind::Plain, "", true, false, ".ad"));
        rules.add_element(ElementFilter::new(ElementKind::Plain, "news.com", true, false, "#promo"));

        let ghide = FilterRecord::new(FilterType::StartEnd, "news.com", ContentType::GENERICHIDE, true, ThirdParty::NoPreference)
            .unwrap();
        rules.element_disable_mut().add(ghide);
        let ehide = FilterRecord::new(FilterType::StartEnd, "clean.org", ContentType::ELEMHIDE, true, ThirdParty::NoPreference)
            .unwrap();
        rules.element_disable_mut().add(ehide);

        assert_eq!(rules.element_selectors("https://www.news.com/", true), ["#promo"]);
        assert!(rules.element_selectors("https://clean.org/", true).is_empty());
        assert_eq!(rules.element_selectors("https://other.net/", true), [".ad"]);
        assert!(rules.element_selectors("https://other.net/", false).is_empty());
    }
}
