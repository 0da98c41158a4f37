//! Chapter markup to Markdown.
//!
//! Conversion runs in two phases over an owned [`ArenaDom`]:
//!
//! 1. [`transform`] passes clean the tree up in place (drop metadata and
//!    hidden navigation, rewrite SVG covers, hoist anchor ids into marker
//!    divs, flatten headings, absolutize paths).
//! 2. The [`rules`] converter walks the cleaned tree and emits Markdown.
//!
//! Neither phase can fail. Whatever the parser recovered is converted.

mod escape;
mod rules;
pub mod transform;

use std::collections::HashSet;

use crate::dom::{self, ArenaDom};

pub use escape::{
    calculate_fence_length, calculate_inline_code_ticks, escape_markdown, escape_markdown_inline,
};

/// Attribute carried by the anchor marker divs.
pub const ANCHOR_IDS_ATTR: &str = "data-anchor-ids";

/// Tag used for images in the Markdown output.
pub const IMAGE_TAG: &str = "epub-img";

/// Options for a single conversion.
///
/// ```
/// use epubmark::ConvertOptions;
///
/// let options = ConvertOptions::default()
///     .with_preserve_ids(true)
///     .with_keep_ids(["intro", "ch1"])
///     .with_base_path("/OEBPS/text");
/// assert!(options.keeps("intro"));
/// assert!(!options.keeps("footer"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Hoist element ids into `<div data-anchor-ids>` markers.
    pub preserve_ids: bool,
    /// Ids worth keeping. `None` keeps every id.
    pub keep_ids: Option<HashSet<String>>,
    /// Directory relative hrefs and srcs are resolved against.
    pub base_path: Option<String>,
}

impl ConvertOptions {
    pub fn with_preserve_ids(mut self, preserve_ids: bool) -> Self {
        self.preserve_ids = preserve_ids;
        self
    }

    pub fn with_keep_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keep_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Check whether `id` passes the keep filter.
    pub fn keeps(&self, id: &str) -> bool {
        self.keep_ids.as_ref().is_none_or(|ids| ids.contains(id))
    }

    /// Check whether `id` was explicitly listed in the keep set.
    pub(crate) fn explicitly_keeps(&self, id: &str) -> bool {
        self.keep_ids.as_ref().is_some_and(|ids| ids.contains(id))
    }
}

/// Convert a parsed document to Markdown, consuming the tree.
pub fn content_to_markdown(mut dom: ArenaDom, options: &ConvertOptions) -> String {
    transform::apply(&mut dom, options);
    rules::Converter::new(&dom, options).convert()
}

/// Parse `html` tolerantly and convert it to Markdown.
///
/// ```
/// use epubmark::{ConvertOptions, html_to_markdown};
///
/// let md = html_to_markdown("<h1>Title</h1><p>Some <em>text</em>.</p>", &ConvertOptions::default());
/// assert_eq!(md, "# Title\n\nSome _text_.");
/// ```
pub fn html_to_markdown(html: &str, options: &ConvertOptions) -> String {
    content_to_markdown(dom::parse_html(html), options)
}
