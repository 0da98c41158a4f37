//! Document trees for package files and chapters.
//!
//! Both parsers produce the same [`ArenaDom`]: html5ever for tolerant HTML,
//! quick-xml for strict XML. [`parse`] is the single entry point and picks
//! the parser from the [`Dialect`].

mod arena;
mod element_ref;
mod select;
mod tree_sink;
mod xml;

pub use arena::{ArenaDom, Attribute, Node, NodeData, NodeId, PARSE_ERROR_TAG};
pub use element_ref::{ElementRef, EpubSelectors};
pub use select::{Selector, select, select_first};
pub use tree_sink::ArenaSink;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use serde::Serialize;

use crate::util::strip_elements;

/// Markup dialect a document is parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Strict, namespace-aware XML (OPF, NCX, container.xml).
    Xml,
    /// Tolerant HTML5 parsing.
    Html,
    /// XHTML: parsed as strict XML, queried as markup.
    Xhtml,
}

impl Dialect {
    /// Check whether this dialect goes through the strict XML parser.
    pub fn is_strict(self) -> bool {
        matches!(self, Dialect::Xml | Dialect::Xhtml)
    }
}

/// Parse `content` in the given dialect.
///
/// `<style>` and `<script>` blocks are removed first. For the strict
/// dialects `&nbsp;` becomes a plain space, since XML only knows the five
/// predefined entities. Strict parsing never fails outright: malformed
/// input leaves a [`PARSE_ERROR_TAG`] element in the tree.
pub fn parse(content: &str, dialect: Dialect) -> ArenaDom {
    let content = strip_elements(content, &["style", "script"]);
    if dialect.is_strict() {
        xml::parse_xml(&content.replace("&nbsp;", " "), dialect)
    } else {
        parse_html(&content)
    }
}

/// Parse an HTML string into an ArenaDom.
pub fn parse_html(html: &str) -> ArenaDom {
    parse_document(ArenaSink::new(), ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes())
        .into_dom()
}

/// Parse an XML string into an ArenaDom.
pub fn parse_xml(content: &str) -> ArenaDom {
    xml::parse_xml(content, Dialect::Xml)
}
