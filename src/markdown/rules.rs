//! Rule-based tree to Markdown conversion.
//!
//! Each element is converted bottom-up: its children are converted and
//! joined first, then the element's rule wraps that content. Block rules
//! surround their output with newlines and [`join`] collapses the
//! newlines between siblings to at most one blank line.

use crate::dom::{ArenaDom, NodeData, NodeId};
use crate::util::escape_xml;

use super::escape::{
    calculate_fence_length, calculate_inline_code_ticks, escape_markdown, escape_markdown_inline,
};
use super::transform::is_marker;
use super::{ANCHOR_IDS_ATTR, ConvertOptions, IMAGE_TAG};

/// Elements that render as nothing at all.
const METADATA_TAGS: &[&str] = &["head", "title", "meta", "style", "script", "link"];

/// Elements that start a new block.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "audio", "blockquote", "body", "canvas", "center", "dd", "dir",
    "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "frameset", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hgroup", "hr", "html", "isindex", "li", "main",
    "menu", "nav", "noframes", "noscript", "ol", "output", "p", "pre", "section", "table",
    "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

pub(crate) struct Converter<'a> {
    dom: &'a ArenaDom,
    options: &'a ConvertOptions,
}

impl<'a> Converter<'a> {
    pub(crate) fn new(dom: &'a ArenaDom, options: &'a ConvertOptions) -> Self {
        Self { dom, options }
    }

    /// Convert the whole document.
    pub(crate) fn convert(&self) -> String {
        postprocess(&self.children(self.dom.document()))
    }

    fn children(&self, parent: NodeId) -> String {
        let mut output = String::new();
        for child in self.dom.children(parent) {
            let replacement = match self.dom.get(child).map(|n| &n.data) {
                Some(NodeData::Text(text)) => self.text(child, text),
                Some(NodeData::Element { .. }) => self.element(child),
                _ => continue,
            };
            join(&mut output, &replacement);
        }
        output
    }

    fn element(&self, id: NodeId) -> String {
        let dom = self.dom;
        let tag = dom
            .element_name(id)
            .map(|n| n.as_ref().to_ascii_lowercase())
            .unwrap_or_default();

        if is_marker(dom, id) {
            let ids = dom.get_plain_attr(id, ANCHOR_IDS_ATTR).unwrap_or("");
            return format!(
                "\n\n<div {ANCHOR_IDS_ATTR}=\"{}\">\u{200B}</div>\n\n",
                escape_xml(ids)
            );
        }
        if METADATA_TAGS.contains(&tag.as_str()) {
            return String::new();
        }

        let keep_span = dom
            .element_id(id)
            .filter(|v| self.options.explicitly_keeps(v))
            .map(|v| format!("<span id=\"{}\"></span>", escape_xml(v)));

        let replacement = match tag.as_str() {
            "img" => self.image(id),
            "pre" => self.code_block(id),
            "code" => inline_code(&collapse_whitespace(&dom.text_content(id))),
            "br" => "\\\n".to_string(),
            "hr" => "\n\n---\n\n".to_string(),
            "li" => {
                let mut content = self.children(id);
                if let Some(span) = &keep_span {
                    content.insert_str(0, span);
                }
                return self.list_item(id, &content);
            }
            _ => {
                let content = self.children(id);
                self.container(id, &tag, &content)
            }
        };

        match keep_span {
            Some(span) => {
                let lead = replacement.len() - replacement.trim_start_matches('\n').len();
                format!("{}{span}{}", &replacement[..lead], &replacement[lead..])
            }
            None => replacement,
        }
    }

    fn container(&self, id: NodeId, tag: &str, content: &str) -> String {
        match tag {
            "p" => format!("\n\n{}\n\n", content.trim()),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let text = content.trim().replace('\n', " ");
                if text.is_empty() {
                    return String::new();
                }
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                format!("\n\n{} {text}\n\n", "#".repeat(level))
            }
            "blockquote" => {
                let quoted: Vec<String> = content
                    .trim()
                    .lines()
                    .map(|line| if line.is_empty() { ">".to_string() } else { format!("> {line}") })
                    .collect();
                format!("\n\n{}\n\n", quoted.join("\n"))
            }
            "ul" | "ol" => {
                let parent = self.dom.parent(id);
                let nested = self.dom.is_tag(parent, "li")
                    && self.dom.element_children(parent).last() == Some(id);
                if nested {
                    format!("\n{content}")
                } else {
                    format!("\n\n{content}\n\n")
                }
            }
            "a" => match self.dom.get_plain_attr(id, "href") {
                Some(href) if !href.is_empty() => {
                    let title = self
                        .dom
                        .get_plain_attr(id, "title")
                        .map(|t| format!(" \"{}\"", t.replace('"', "\\\"")))
                        .unwrap_or_default();
                    format!("[{content}]({}{title})", escape_href(href))
                }
                _ => content.to_string(),
            },
            "em" | "i" => delimit(content, "_"),
            "strong" | "b" => delimit(content, "**"),
            _ if BLOCK_TAGS.contains(&tag) => format!("\n\n{content}\n\n"),
            _ => content.to_string(),
        }
    }

    fn list_item(&self, id: NodeId, content: &str) -> String {
        let dom = self.dom;
        let parent = dom.parent(id);
        let prefix = if dom.is_tag(parent, "ol") {
            let start = dom
                .get_plain_attr(parent, "start")
                .and_then(|s| s.trim().parse::<usize>().ok())
                .unwrap_or(1);
            let index = dom
                .element_children(parent)
                .filter(|&c| dom.is_tag(c, "li"))
                .position(|c| c == id)
                .unwrap_or(0);
            format!("{}. ", start + index)
        } else {
            "- ".to_string()
        };

        let body = content.trim_start_matches('\n').trim_start();
        let trimmed = body.trim_end_matches('\n');
        let body = if trimmed.len() < body.len() {
            format!("{trimmed}\n")
        } else {
            trimmed.to_string()
        };

        let indent = " ".repeat(prefix.len());
        let mut item = prefix;
        for (i, line) in body.split('\n').enumerate() {
            if i > 0 {
                item.push('\n');
                if !line.is_empty() {
                    item.push_str(&indent);
                }
            }
            item.push_str(line);
        }

        if has_next_element(dom, id) && !item.ends_with('\n') {
            item.push('\n');
        }
        item
    }

    fn image(&self, id: NodeId) -> String {
        let Some(src) = self.dom.get_plain_attr(id, "src").filter(|s| !s.is_empty()) else {
            return String::new();
        };
        match self.dom.get_plain_attr(id, "alt") {
            Some(alt) => format!(
                "<{IMAGE_TAG} src=\"{}\" alt=\"{}\"></{IMAGE_TAG}>",
                escape_xml(src),
                escape_xml(alt)
            ),
            None => format!("<{IMAGE_TAG} src=\"{}\"></{IMAGE_TAG}>", escape_xml(src)),
        }
    }

    fn code_block(&self, id: NodeId) -> String {
        let dom = self.dom;
        let language = dom
            .element_children(id)
            .find(|&c| dom.is_tag(c, "code"))
            .and_then(|code| dom.get_plain_attr(code, "class"))
            .and_then(|class| {
                class
                    .split_ascii_whitespace()
                    .find_map(|c| c.strip_prefix("language-"))
            })
            .unwrap_or("");

        let text = dom.text_content(id);
        let code = text.strip_suffix('\n').unwrap_or(&text);
        let fence = "`".repeat(calculate_fence_length(code, '`'));
        format!("\n\n{fence}{language}\n{code}\n{fence}\n\n")
    }

    fn text(&self, id: NodeId, raw: &str) -> String {
        let dom = self.dom;
        let collapsed = collapse_whitespace(raw);

        let prev = dom.prev_sibling(id);
        let next = dom.next_sibling(id);
        let parent_block = self.is_block(dom.parent(id));
        let at_start = (prev.is_none() && parent_block) || self.is_block(prev);
        let at_end = (next.is_none() && parent_block) || self.is_block(next);

        if collapsed.trim().is_empty() {
            return if at_start || at_end {
                String::new()
            } else {
                collapsed
            };
        }

        let mut text = collapsed.as_str();
        if at_start {
            text = text.trim_start();
        }
        if at_end {
            text = text.trim_end();
        }
        // Inline text only opens a line after a block or a hard break
        if at_start || dom.is_tag(prev, "br") {
            escape_markdown(text)
        } else {
            escape_markdown_inline(text)
        }
    }

    /// Block elements, plus any non-element parent such as the document.
    fn is_block(&self, id: NodeId) -> bool {
        if id.is_none() {
            return false;
        }
        match self.dom.element_name(id) {
            Some(name) => {
                let tag = name.as_ref().to_ascii_lowercase();
                BLOCK_TAGS.contains(&tag.as_str())
            }
            None => self
                .dom
                .get(id)
                .is_some_and(|n| matches!(n.data, NodeData::Document)),
        }
    }
}

fn has_next_element(dom: &ArenaDom, id: NodeId) -> bool {
    let mut current = dom.next_sibling(id);
    while current.is_some() {
        if dom.is_element(current) {
            return true;
        }
        current = dom.next_sibling(current);
    }
    false
}

/// Append `replacement`, keeping at most one blank line between the two.
fn join(output: &mut String, replacement: &str) {
    let head_len = output.trim_end_matches('\n').len();
    let trailing = output.len() - head_len;
    let tail = replacement.trim_start_matches('\n');
    let leading = replacement.len() - tail.len();
    let separator = trailing.max(leading).min(2);

    output.truncate(head_len);
    output.extend(std::iter::repeat_n('\n', separator));
    if separator == 0 && output.ends_with(' ') {
        output.push_str(tail.trim_start_matches(' '));
    } else {
        output.push_str(tail);
    }
}

/// Collapse runs of whitespace into a single space.
fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                result.push(' ');
            }
            in_space = true;
        } else {
            result.push(c);
            in_space = false;
        }
    }
    result
}

/// Wrap `content` in `delimiter`, keeping flanking whitespace outside.
fn delimit(content: &str, delimiter: &str) -> String {
    let inner = content.trim();
    if inner.is_empty() {
        return content.to_string();
    }
    let lead = &content[..content.len() - content.trim_start().len()];
    let trail = &content[content.trim_end().len()..];
    format!("{lead}{delimiter}{inner}{delimiter}{trail}")
}

fn inline_code(code: &str) -> String {
    if code.is_empty() {
        return String::new();
    }
    let ticks = "`".repeat(calculate_inline_code_ticks(code));
    let pad = if code.starts_with('`') || code.ends_with('`') { " " } else { "" };
    format!("{ticks}{pad}{code}{pad}{ticks}")
}

fn escape_href(href: &str) -> String {
    href.replace(' ', "%20")
        .replace('(', "%28")
        .replace(')', "%29")
}

/// Trim trailing spaces outside fenced code, then trim the whole output.
fn postprocess(markdown: &str) -> String {
    let mut result = String::with_capacity(markdown.len());
    let mut fence: Option<&str> = None;

    for (i, line) in markdown.split('\n').enumerate() {
        if i > 0 {
            result.push('\n');
        }
        let marker = line.trim_start();
        let run = marker.len() - marker.trim_start_matches('`').len();
        match fence {
            Some(open) if run >= open.len() && marker.trim_start_matches('`').trim().is_empty() => {
                fence = None;
                result.push_str(line);
                continue;
            }
            Some(_) => {
                result.push_str(line);
                continue;
            }
            None if run >= 3 => fence = Some(&marker[..run]),
            None => {}
        }
        result.push_str(line.trim_end_matches([' ', '\t']));
    }

    result.trim().to_string()
}
