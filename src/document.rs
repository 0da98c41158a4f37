//! Package files loaded through a resolver and parsed into a tree.

use crate::dom::{self, ArenaDom, NodeId, Selector};
use crate::io::ResourceResolver;
use crate::markdown::{ConvertOptions, content_to_markdown};
use crate::path::{basename, dirname, extension, normalize, split_fragment};
use crate::util::{decode_text, extract_xml_encoding};

pub use crate::dom::Dialect;

/// Media types that select a parser dialect.
pub mod media_type {
    pub const XHTML: &str = "application/xhtml+xml";
    pub const HTML: &str = "text/html";
    pub const XML: &str = "application/xml";
    pub const TEXT_XML: &str = "text/xml";
    pub const OPF: &str = "application/oebps-package+xml";
    pub const NCX: &str = "application/x-dtbncx+xml";
    pub const SVG: &str = "image/svg+xml";
}

impl Dialect {
    /// Dialect for a manifest media type, if it names a markup format.
    ///
    /// Parameters such as `; charset=utf-8` are ignored.
    pub fn from_media_type(media_type: &str) -> Option<Dialect> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or(media_type)
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            media_type::XHTML => Some(Dialect::Xhtml),
            media_type::HTML => Some(Dialect::Html),
            media_type::XML
            | media_type::TEXT_XML
            | media_type::OPF
            | media_type::NCX
            | media_type::SVG => Some(Dialect::Xml),
            _ => None,
        }
    }

    /// Dialect sniffed from a file extension. Unknown extensions are XHTML.
    pub fn from_extension(path: &str) -> Dialect {
        match extension(path).as_deref() {
            Some("html" | "htm") => Dialect::Html,
            Some("xml" | "opf" | "ncx") => Dialect::Xml,
            _ => Dialect::Xhtml,
        }
    }
}

/// A package file read through a resolver and parsed in one dialect.
///
/// The resolver is rebased onto the document's directory, so hrefs found
/// inside the document resolve with [`ParsedDocument::resolve_href`].
#[derive(Debug)]
pub struct ParsedDocument<R: ResourceResolver> {
    base: String,
    name: String,
    content: String,
    tree: ArenaDom,
    resolver: R,
    dialect: Dialect,
}

impl<R: ResourceResolver> ParsedDocument<R> {
    /// Read `href` through `resolver` and parse it.
    ///
    /// Returns `None` if the resolver has no bytes for `href`. Without an
    /// explicit `dialect` the file extension decides.
    pub fn load(href: &str, resolver: &R, dialect: Option<Dialect>) -> Option<Self> {
        let resolved = resolver.resolve_href(href);
        let (path, _) = split_fragment(&resolved);
        let bytes = resolver.read_bytes(path)?;
        let content = decode_text(&bytes, extract_xml_encoding(&bytes)).into_owned();
        let dialect = dialect.unwrap_or_else(|| Dialect::from_extension(path));
        Some(Self::from_content(path, content, resolver, dialect))
    }

    /// Like [`load`](Self::load), choosing the dialect from a media type
    /// and falling back to the extension when it names no markup format.
    pub fn load_with_media_type(href: &str, resolver: &R, media_type: Option<&str>) -> Option<Self> {
        let dialect = media_type.and_then(Dialect::from_media_type);
        Self::load(href, resolver, dialect)
    }

    /// Parse markup that did not come from the store, as if it lived at
    /// the absolute `path`.
    pub(crate) fn from_content(path: &str, content: String, resolver: &R, dialect: Dialect) -> Self {
        let base = dirname(path).to_string();
        let tree = dom::parse(&content, dialect);
        Self {
            name: basename(path).to_string(),
            resolver: resolver.rebase(&base),
            base,
            content,
            tree,
            dialect,
        }
    }

    /// Parse the same content again in another dialect.
    pub fn reparse(self, dialect: Dialect) -> Self {
        let tree = dom::parse(&self.content, dialect);
        Self {
            tree,
            dialect,
            ..self
        }
    }

    /// Directory containing this document.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// File name of this document.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute package path of this document.
    pub fn path(&self) -> String {
        normalize(&self.base, &self.name)
    }

    /// Decoded source text.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn tree(&self) -> &ArenaDom {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ArenaDom {
        &mut self.tree
    }

    pub fn into_tree(self) -> ArenaDom {
        self.tree
    }

    /// Convert this document to Markdown, consuming its tree.
    ///
    /// Relative links resolve against the document's own directory unless
    /// `options` names another base.
    pub fn into_markdown(self, options: &ConvertOptions) -> String {
        if options.base_path.is_some() {
            return content_to_markdown(self.tree, options);
        }
        let options = options.clone().with_base_path(self.base);
        content_to_markdown(self.tree, &options)
    }

    /// Resolver rebased onto this document's directory.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Check whether strict parsing left a parse-error marker.
    pub fn has_parse_error(&self) -> bool {
        self.tree.has_parse_error()
    }

    /// Resolve an href found in this document to an absolute path.
    pub fn resolve_href(&self, href: &str) -> String {
        self.resolver.resolve_href(href)
    }

    /// All elements matching a CSS selector, in document order.
    pub fn query(&self, selector: &str) -> Vec<NodeId> {
        dom::select(&self.tree, self.tree.document(), selector)
    }

    /// First element matching a CSS selector.
    pub fn query_first(&self, selector: &str) -> Option<NodeId> {
        dom::select_first(&self.tree, self.tree.document(), selector)
    }

    /// [`query_namespaced`] over the whole document.
    pub fn query_namespaced(&self, tag: &str, attr_expr: &str, ns_prefix: Option<&str>) -> Vec<NodeId> {
        query_namespaced(&self.tree, self.tree.document(), tag, attr_expr, ns_prefix)
    }
}

/// Find `tag[attr_expr]` elements whether or not the tree knows namespaces.
///
/// The same markup parses to `epub:type` as a plain attribute name under
/// HTML and to `type` in the OPS namespace under XML. The candidates are
/// tried in order and the first one with matches wins:
///
/// 1. `tag[prefix\:attr_expr]`, the prefixed name as written
/// 2. `tag[*|attr_expr]`, any namespace
/// 3. `tag[attr_expr]`
///
/// `attr_expr` is the inside of an attribute selector, e.g. `type~="toc"`.
pub fn query_namespaced(
    dom: &ArenaDom,
    scope: NodeId,
    tag: &str,
    attr_expr: &str,
    ns_prefix: Option<&str>,
) -> Vec<NodeId> {
    let mut candidates = Vec::with_capacity(3);
    if let Some(prefix) = ns_prefix {
        candidates.push(format!("{tag}[{prefix}\\:{attr_expr}]"));
    }
    candidates.push(format!("{tag}[*|{attr_expr}]"));
    candidates.push(format!("{tag}[{attr_expr}]"));

    for candidate in &candidates {
        let Some(selector) = Selector::parse(candidate) else {
            continue;
        };
        let found = selector.select(dom, scope);
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}
