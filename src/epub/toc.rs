//! Table of contents from an EPUB3 nav document or an EPUB2 NCX.
//!
//! Both sources end up as one nav-shaped tree: an NCX is rewritten into
//! `<nav epub:type="toc"><ul>...</ul></nav>` markup and parsed like a nav
//! document. Everything downstream (nested items, the flat list, the
//! anchor index) reads that one tree.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use serde::Serialize;

use super::EPub;
use super::package::NCX_MEDIA_TYPE;
use crate::document::{Dialect, ParsedDocument, query_namespaced};
use crate::dom::{self, ArenaDom, NodeId, Selector};
use crate::io::ResourceResolver;
use crate::path::{decode, dirname, is_external, normalize, split_fragment};
use crate::util::escape_xml;

/// Where the navigation tree came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TocSource {
    Nav,
    Ncx,
}

/// A node of the navigation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavItem {
    /// Fragment of the href, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The href as written in the navigation document.
    pub href: String,
    /// Absolute, percent-decoded chapter path without fragment.
    pub path: String,
    pub label: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subitems: Vec<NavItem>,
}

impl NavItem {
    /// Number of nodes in this subtree, this one included.
    pub fn count(&self) -> usize {
        1 + self.subitems.iter().map(NavItem::count).sum::<usize>()
    }
}

/// A [`NavItem`] in pre-order with its depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatNavItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub href: String,
    pub path: String,
    pub label: String,
    /// Number of ancestors; top-level items are 0.
    pub level: usize,
    /// Href of the immediate parent; `None` at level 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_href: Option<String>,
}

#[derive(Debug)]
struct NavDocument {
    html: String,
    tree: ArenaDom,
    /// Directory hrefs in the document are relative to.
    base: String,
    /// Path of the document itself, for same-document links.
    path: String,
    source: TocSource,
}

/// The package's table of contents.
///
/// Nested items, the flat list and the anchor index are each computed on
/// first use.
#[derive(Debug, Default)]
pub struct TableOfContents {
    document: Option<NavDocument>,
    nav_items: OnceLock<Vec<NavItem>>,
    flat_nav_items: OnceLock<Vec<FlatNavItem>>,
    anchor_links: OnceLock<HashMap<String, HashSet<String>>>,
}

impl TableOfContents {
    /// Use the EPUB3 nav document, else the NCX, else nothing.
    pub fn from_epub<R: ResourceResolver>(epub: &EPub<R>) -> Self {
        if let Some(nav) = Self::nav(epub) {
            log::debug!("Using nav document {} as table of contents", nav.path());
            return Self::from_document(nav, TocSource::Nav);
        }

        if let Some(ncx) = Self::ncx(epub) {
            log::debug!("Using NCX {} as table of contents", ncx.path());
            let html = ncx_to_html(&ncx);
            let path = ncx.path();
            return Self::with_document(NavDocument {
                tree: dom::parse(&html, Dialect::Html),
                html,
                base: ncx.base().to_string(),
                path,
                source: TocSource::Ncx,
            });
        }

        log::debug!("Package has neither a nav document nor an NCX");
        Self::default()
    }

    /// Build from nav markup that lives at the absolute `path`.
    pub fn from_markup(markup: &str, path: &str, dialect: Dialect) -> Self {
        Self::with_document(NavDocument {
            html: markup.to_string(),
            tree: dom::parse(markup, dialect),
            base: dirname(path).to_string(),
            path: path.to_string(),
            source: TocSource::Nav,
        })
    }

    fn from_document<R: ResourceResolver>(doc: ParsedDocument<R>, source: TocSource) -> Self {
        let base = doc.base().to_string();
        let path = doc.path();
        let html = doc.content().to_string();
        Self::with_document(NavDocument {
            html,
            tree: doc.into_tree(),
            base,
            path,
            source,
        })
    }

    fn with_document(document: NavDocument) -> Self {
        Self {
            document: Some(document),
            ..Self::default()
        }
    }

    /// The manifest item with the `nav` property, loaded.
    pub fn nav<R: ResourceResolver>(epub: &EPub<R>) -> Option<ParsedDocument<R>> {
        let item = epub
            .manifest()
            .into_iter()
            .find(|item| item.has_property("nav"))?;
        epub.read_dom_file(&item.path, None).ok()?
    }

    /// The NCX, found by media type or by the spine's `toc` attribute.
    pub fn ncx<R: ResourceResolver>(epub: &EPub<R>) -> Option<ParsedDocument<R>> {
        let by_media_type = epub
            .manifest()
            .into_iter()
            .find(|item| item.media_type.eq_ignore_ascii_case(NCX_MEDIA_TYPE));

        let item = match by_media_type {
            Some(item) => item,
            None => {
                let opf = epub.opf();
                let spine = opf.query_first("spine")?;
                let toc_id = opf.tree().get_plain_attr(spine, "toc")?;
                epub.manifest_by_id().get(toc_id)?.clone()
            }
        };
        epub.read_dom_file(&item.path, Some(Dialect::Xml)).ok()?
    }

    /// Which source the tree came from, if any.
    pub fn source(&self) -> Option<TocSource> {
        self.document.as_ref().map(|d| d.source)
    }

    /// Markup of the navigation document: the nav document as stored, or
    /// the markup synthesized from the NCX.
    pub fn html(&self) -> Option<&str> {
        self.document.as_ref().map(|d| d.html.as_str())
    }

    /// The top-level navigation items.
    pub fn nav_items(&self) -> &[NavItem] {
        self.nav_items.get_or_init(|| {
            let Some(doc) = &self.document else {
                return Vec::new();
            };
            let Some(nav) = toc_nav(&doc.tree) else {
                return Vec::new();
            };
            let lists = Selector::parse("ol, ul").and_then(|s| s.select_first(&doc.tree, nav));
            match lists {
                Some(list) => parse_list(doc, list),
                None => Vec::new(),
            }
        })
    }

    /// Pre-order flattening of [`nav_items`](Self::nav_items).
    pub fn flat_nav_items(&self) -> &[FlatNavItem] {
        self.flat_nav_items.get_or_init(|| {
            let mut flat = Vec::new();
            flatten(self.nav_items(), 0, None, &mut flat);
            flat
        })
    }

    /// Fragment ids the table of contents links to, by absolute chapter path.
    pub fn anchor_links(&self) -> &HashMap<String, HashSet<String>> {
        self.anchor_links.get_or_init(|| {
            let mut anchors: HashMap<String, HashSet<String>> = HashMap::new();
            let Some(doc) = &self.document else {
                return anchors;
            };
            let Some(nav) = toc_nav(&doc.tree) else {
                return anchors;
            };

            for link in dom::select(&doc.tree, nav, "a[href]") {
                let Some(href) = doc.tree.get_plain_attr(link, "href") else {
                    continue;
                };
                let (path, fragment) = split_href(href);
                let Some(fragment) = fragment else {
                    continue;
                };
                if path.is_empty() || is_external(&path) {
                    continue;
                }
                let mut resolved = normalize(&doc.base, &path);
                if !resolved.starts_with('/') {
                    resolved.insert(0, '/');
                }
                anchors
                    .entry(resolved)
                    .or_default()
                    .insert(fragment);
            }
            anchors
        })
    }
}

/// Rewrite an NCX `navMap` as nav markup.
///
/// Only direct `navPoint` children are read at each level. Hrefs are
/// resolved against the NCX's directory, so the result is independent of
/// where it is parsed.
pub fn ncx_to_html<R: ResourceResolver>(ncx: &ParsedDocument<R>) -> String {
    let tree = ncx.tree();
    let mut html = String::from(r#"<nav epub:type="toc"><ul>"#);
    if let Some(nav_map) = dom::select_first(tree, tree.document(), "navMap") {
        write_nav_points(ncx, nav_map, &mut html);
    }
    html.push_str("</ul></nav>");
    html
}

fn write_nav_points<R: ResourceResolver>(ncx: &ParsedDocument<R>, parent: NodeId, html: &mut String) {
    let tree = ncx.tree();
    let Some(nav_point) = Selector::parse("navPoint") else {
        return;
    };

    for point in nav_point.select_children(tree, parent) {
        let label = tree
            .element_children(point)
            .find(|&c| tree.is_tag(c, "navLabel"))
            .and_then(|label| tree.element_children(label).find(|&c| tree.is_tag(c, "text")))
            .map(|text| tree.text_content(text).trim().to_string())
            .unwrap_or_default();
        let src = tree
            .element_children(point)
            .find(|&c| tree.is_tag(c, "content"))
            .and_then(|content| tree.get_plain_attr(content, "src"));

        html.push_str("<li>");
        match src {
            Some(src) => {
                let href = ncx.resolve_href(src);
                html.push_str(&format!(
                    r#"<a href="{}">{}</a>"#,
                    escape_xml(&href),
                    escape_xml(&label)
                ));
            }
            None => html.push_str(&format!("<span>{}</span>", escape_xml(&label))),
        }

        if !nav_point.select_children(tree, point).is_empty() {
            html.push_str("<ul>");
            write_nav_points(ncx, point, html);
            html.push_str("</ul>");
        }
        html.push_str("</li>");
    }
}

fn toc_nav(tree: &ArenaDom) -> Option<NodeId> {
    query_namespaced(tree, tree.document(), "nav", r#"type~="toc""#, Some("epub"))
        .into_iter()
        .next()
}

/// Items of one `ol`/`ul`, reading only its direct `li` children.
///
/// An `li` without a link (a bare heading) contributes its nested items
/// to the current level.
fn parse_list(doc: &NavDocument, list: NodeId) -> Vec<NavItem> {
    let tree = &doc.tree;
    let mut items = Vec::new();

    for li in tree.element_children(list).filter(|&c| tree.is_tag(c, "li")) {
        let subitems = tree
            .element_children(li)
            .find(|&c| tree.is_any_tag(c, &["ol", "ul"]))
            .map(|nested| parse_list(doc, nested))
            .unwrap_or_default();

        let link = tree
            .element_children(li)
            .find(|&c| tree.is_tag(c, "a") && tree.get_plain_attr(c, "href").is_some());
        let Some(link) = link else {
            items.extend(subitems);
            continue;
        };

        let href = tree.get_plain_attr(link, "href").unwrap_or_default();
        let (path, fragment) = split_href(href);
        let path = if path.is_empty() {
            doc.path.clone()
        } else {
            normalize(&doc.base, &path)
        };

        items.push(NavItem {
            id: fragment,
            href: href.to_string(),
            path,
            label: collapse_whitespace(&tree.text_content(link)),
            subitems,
        });
    }
    items
}

fn flatten(items: &[NavItem], level: usize, parent_href: Option<&str>, out: &mut Vec<FlatNavItem>) {
    for item in items {
        out.push(FlatNavItem {
            id: item.id.clone(),
            href: item.href.clone(),
            path: item.path.clone(),
            label: item.label.clone(),
            level,
            parent_href: parent_href.map(String::from),
        });
        flatten(&item.subitems, level + 1, Some(&item.href), out);
    }
}

/// Split on `#` first, then percent-decode each part, so an encoded `%23`
/// stays in the path.
fn split_href(href: &str) -> (String, Option<String>) {
    let (path, fragment) = split_fragment(href);
    (decode(path), fragment.map(decode))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NAV: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
  <nav epub:type="landmarks"><ol><li><a href="text/cover.xhtml#c">Cover</a></li></ol></nav>
  <nav epub:type="toc" id="toc">
    <h1>Contents</h1>
    <ol>
      <li><a href="text/ch1.xhtml">Chapter
          One</a>
        <ol>
          <li><a href="text/ch1.xhtml#s1">Section 1.1</a></li>
          <li><a href="text/ch1.xhtml#s2">Section 1.2</a>
            <ol><li><a href="text/ch1.xhtml#s2a">Deep</a></li></ol>
          </li>
        </ol>
      </li>
      <li><span>Part II</span>
        <ol><li><a href="text/part%202.xhtml#p2">Chapter Two</a></li></ol>
      </li>
      <li><a href="#toc">Back</a></li>
    </ol>
  </nav>
</body>
</html>"##;

    fn sample() -> TableOfContents {
        TableOfContents::from_markup(NAV, "/OEBPS/nav.xhtml", Dialect::Xhtml)
    }

    #[test]
    fn test_nav_items_are_scoped_per_level() {
        let toc = sample();
        let items = toc.nav_items();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].label, "Chapter One");
        assert_eq!(items[0].path, "/OEBPS/text/ch1.xhtml");
        assert_eq!(items[0].id, None);
        assert_eq!(items[0].subitems.len(), 2);
        assert_eq!(items[0].subitems[1].subitems[0].id.as_deref(), Some("s2a"));

        // Unlinked heading lifts its children
        assert_eq!(items[1].label, "Chapter Two");
        assert_eq!(items[1].path, "/OEBPS/text/part 2.xhtml");
        assert_eq!(items[1].href, "text/part%202.xhtml#p2");

        assert_eq!(items[2].path, "/OEBPS/nav.xhtml");
    }

    #[test]
    fn test_encoded_hash_stays_in_path() {
        let nav = r#"<nav epub:type="toc"><ol><li><a href="a%23b.xhtml#x">Odd</a></li></ol></nav>"#;
        let toc = TableOfContents::from_markup(nav, "/OEBPS/nav.xhtml", Dialect::Html);

        let item = &toc.nav_items()[0];
        assert_eq!(item.path, "/OEBPS/a#b.xhtml");
        assert_eq!(item.id.as_deref(), Some("x"));
        assert!(toc.anchor_links()["/OEBPS/a#b.xhtml"].contains("x"));
    }

    #[test]
    fn test_flat_nav_items_levels_and_parents() {
        let toc = sample();
        let flat = toc.flat_nav_items();
        let summary: Vec<_> = flat
            .iter()
            .map(|f| (f.label.as_str(), f.level, f.parent_href.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Chapter One", 0, None),
                ("Section 1.1", 1, Some("text/ch1.xhtml")),
                ("Section 1.2", 1, Some("text/ch1.xhtml")),
                ("Deep", 2, Some("text/ch1.xhtml#s2")),
                ("Chapter Two", 0, None),
                ("Back", 0, None),
            ]
        );
    }

    #[test]
    fn test_anchor_links_only_from_toc_nav() {
        let toc = sample();
        let anchors = toc.anchor_links();

        let ch1 = &anchors["/OEBPS/text/ch1.xhtml"];
        assert_eq!(ch1.len(), 3);
        assert!(ch1.contains("s1") && ch1.contains("s2") && ch1.contains("s2a"));
        assert!(anchors["/OEBPS/text/part 2.xhtml"].contains("p2"));
        assert!(!anchors.contains_key("/OEBPS/text/cover.xhtml"));
        // "#toc" has no file component
        assert_eq!(anchors.len(), 2);
    }

    #[test]
    fn test_html_parsed_nav_matches_xml_parsed_nav() {
        let html = TableOfContents::from_markup(NAV, "/OEBPS/nav.xhtml", Dialect::Html);
        assert_eq!(html.nav_items(), sample().nav_items());
    }

    #[test]
    fn test_empty_toc() {
        let toc = TableOfContents::default();
        assert!(toc.html().is_none());
        assert!(toc.nav_items().is_empty());
        assert!(toc.flat_nav_items().is_empty());
        assert!(toc.anchor_links().is_empty());
    }

    #[test]
    fn test_memoized_views() {
        let toc = sample();
        assert!(std::ptr::eq(toc.anchor_links(), toc.anchor_links()));
        assert!(std::ptr::eq(toc.flat_nav_items(), toc.flat_nav_items()));
    }

    #[derive(Debug, Clone)]
    struct Tree(Vec<Tree>);

    fn tree_strategy() -> impl Strategy<Value = Vec<Tree>> {
        let leaf = Just(Tree(Vec::new()));
        let node = leaf.prop_recursive(4, 32, 4, |inner| {
            prop::collection::vec(inner, 0..4).prop_map(Tree)
        });
        prop::collection::vec(node, 0..5)
    }

    fn render(trees: &[Tree], counter: &mut usize, out: &mut String) {
        out.push_str("<ol>");
        for tree in trees {
            *counter += 1;
            out.push_str(&format!(r##"<li><a href="c.xhtml#n{0}">N{0}</a>"##, counter));
            if !tree.0.is_empty() {
                render(&tree.0, counter, out);
            }
            out.push_str("</li>");
        }
        out.push_str("</ol>");
    }

    proptest! {
        #[test]
        fn prop_flattening_preserves_shape(trees in tree_strategy()) {
            let mut counter = 0;
            let mut markup = String::from(r#"<nav epub:type="toc">"#);
            render(&trees, &mut counter, &mut markup);
            markup.push_str("</nav>");

            let toc = TableOfContents::from_markup(&markup, "/nav.xhtml", Dialect::Html);
            let total: usize = toc.nav_items().iter().map(NavItem::count).sum();
            let flat = toc.flat_nav_items();
            prop_assert_eq!(flat.len(), total);
            prop_assert_eq!(flat.len(), counter);

            for (i, item) in flat.iter().enumerate() {
                match &item.parent_href {
                    None => prop_assert_eq!(item.level, 0),
                    Some(parent) => {
                        let parent_index = flat[..i]
                            .iter()
                            .rposition(|p| &p.href == parent)
                            .expect("parent precedes child");
                        prop_assert_eq!(flat[parent_index].level + 1, item.level);
                    }
                }
            }
        }
    }
}
