//! Compiled CSS selectors and tree queries.

use selectors::context::{MatchingContext, SelectorCaches};
use selectors::matching::{MatchingForInvalidation, MatchingMode, NeedsSelectorFlags};
use selectors::parser::{ParseRelative, Selector as CssSelector, SelectorList};

use super::arena::{ArenaDom, NodeId};
use super::element_ref::{ElementRef, EpubSelectors};

/// A parsed selector list (`nav, ol > li`).
#[derive(Debug, Clone)]
pub struct Selector {
    selectors: Vec<CssSelector<EpubSelectors>>,
}

impl Selector {
    /// Parse a selector list. Returns `None` if the text is not a valid
    /// selector for this document model (undeclared namespace prefixes
    /// included).
    pub fn parse(text: &str) -> Option<Self> {
        let mut input = cssparser::ParserInput::new(text);
        let mut parser = cssparser::Parser::new(&mut input);
        let list = SelectorList::parse(&EpubSelectors, &mut parser, ParseRelative::No).ok()?;
        Some(Self {
            selectors: list.slice().to_vec(),
        })
    }

    /// Check whether `id` matches any selector in the list.
    pub fn matches(&self, dom: &ArenaDom, id: NodeId) -> bool {
        let mut caches = SelectorCaches::default();
        self.matches_with_caches(dom, id, &mut caches)
    }

    fn matches_with_caches(&self, dom: &ArenaDom, id: NodeId, caches: &mut SelectorCaches) -> bool {
        if !dom.is_element(id) {
            return false;
        }
        let elem = ElementRef::new(dom, id);
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            caches,
            selectors::context::QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            MatchingForInvalidation::No,
        );
        self.selectors.iter().any(|selector| {
            selectors::matching::matches_selector(selector, 0, None, &elem, &mut context)
        })
    }

    /// All matching descendants of `scope`, in document order.
    pub fn select(&self, dom: &ArenaDom, scope: NodeId) -> Vec<NodeId> {
        let mut caches = SelectorCaches::default();
        dom.descendants(scope)
            .filter(|&id| self.matches_with_caches(dom, id, &mut caches))
            .collect()
    }

    /// First matching descendant of `scope`.
    pub fn select_first(&self, dom: &ArenaDom, scope: NodeId) -> Option<NodeId> {
        let mut caches = SelectorCaches::default();
        dom.descendants(scope)
            .find(|&id| self.matches_with_caches(dom, id, &mut caches))
    }

    /// Matching element children of `parent`.
    pub fn select_children(&self, dom: &ArenaDom, parent: NodeId) -> Vec<NodeId> {
        let mut caches = SelectorCaches::default();
        dom.element_children(parent)
            .filter(|&id| self.matches_with_caches(dom, id, &mut caches))
            .collect()
    }
}

/// Parse `text` and return every match under `scope`.
///
/// An invalid selector matches nothing.
pub fn select(dom: &ArenaDom, scope: NodeId, text: &str) -> Vec<NodeId> {
    match Selector::parse(text) {
        Some(selector) => selector.select(dom, scope),
        None => {
            log::debug!("Ignoring invalid selector '{}'", text);
            Vec::new()
        }
    }
}

/// Parse `text` and return the first match under `scope`.
pub fn select_first(dom: &ArenaDom, scope: NodeId, text: &str) -> Option<NodeId> {
    Selector::parse(text)?.select_first(dom, scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    #[test]
    fn test_select_document_order() {
        let dom = parse_html("<ol><li>a<ol><li>b</li></ol></li><li>c</li></ol>");
        let items = select(&dom, dom.document(), "li");
        let texts: Vec<_> = items.iter().map(|&id| dom.text_content(id)).collect();
        assert_eq!(texts, vec!["ab", "b", "c"]);
    }

    #[test]
    fn test_select_children_only() {
        let dom = parse_html("<ol id='top'><li>a<ol><li>b</li></ol></li><li>c</li></ol>");
        let top = select_first(&dom, dom.document(), "#top").unwrap();
        let li = Selector::parse("li").unwrap();
        assert_eq!(li.select_children(&dom, top).len(), 2);
    }

    #[test]
    fn test_selector_list_and_invalid() {
        let dom = parse_html("<h1>a</h1><h2>b</h2><p>c</p>");
        assert_eq!(select(&dom, dom.document(), "h1, h2").len(), 2);
        assert!(select(&dom, dom.document(), "h1[").is_empty());
        assert!(Selector::parse("ns|p").is_none());
    }
}
