//! Pass 1: drop non-content elements.

use crate::dom::{ArenaDom, NodeId};

use super::collect_elements;

const NON_CONTENT_TAGS: &[&str] = &["meta", "script", "style"];
const HEAD_METADATA_ATTRS: &[&str] = &["name", "property", "itemprop"];

/// Remove metadata, scripts, styles, stylesheet links and hidden `<nav>`s.
///
/// Page lists and landmarks are usually shipped as `<nav hidden>` and
/// would otherwise leak into chapter text.
pub fn remove_metadata(dom: &mut ArenaDom) {
    let doomed = collect_elements(dom, dom.document(), |dom, id| {
        dom.is_any_tag(id, NON_CONTENT_TAGS)
            || is_stylesheet_link(dom, id)
            || is_head_metadata(dom, id)
            || is_hidden_nav(dom, id)
    });
    for id in doomed {
        dom.detach(id);
    }
}

fn is_stylesheet_link(dom: &ArenaDom, id: NodeId) -> bool {
    dom.is_tag(id, "link")
        && dom.get_plain_attr(id, "rel").is_some_and(|rel| {
            rel.split_ascii_whitespace()
                .any(|r| r.eq_ignore_ascii_case("stylesheet"))
        })
}

fn is_head_metadata(dom: &ArenaDom, id: NodeId) -> bool {
    HEAD_METADATA_ATTRS
        .iter()
        .any(|attr| dom.get_plain_attr(id, attr).is_some())
        && in_head(dom, id)
}

fn in_head(dom: &ArenaDom, id: NodeId) -> bool {
    let mut current = dom.parent(id);
    while current.is_some() {
        if dom.is_tag(current, "head") {
            return true;
        }
        current = dom.parent(current);
    }
    false
}

fn is_hidden_nav(dom: &ArenaDom, id: NodeId) -> bool {
    dom.is_tag(id, "nav")
        && (dom.get_plain_attr(id, "hidden").is_some()
            || dom.get_plain_attr(id, "aria-hidden") == Some("true"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    #[test]
    fn test_removes_head_noise() {
        let mut dom = parse_html(
            r#"<html><head>
<title>Kept</title>
<meta name="author" content="x">
<link rel="stylesheet" href="a.css">
<link rel="next" href="b.xhtml">
<script>var x;</script>
<span property="dcterms:modified">2020</span>
</head><body><p itemprop="text">Body</p></body></html>"#,
        );
        remove_metadata(&mut dom);

        assert!(dom.find_by_tag("meta").is_none());
        assert!(dom.find_by_tag("script").is_none());
        assert!(dom.find_by_tag("title").is_some());
        let links = crate::dom::select(&dom, dom.document(), "link");
        assert_eq!(links.len(), 1);
        assert_eq!(dom.get_attr(links[0], "rel"), Some("next"));
        // itemprop outside <head> is content
        assert!(dom.find_by_tag("p").is_some());
    }

    #[test]
    fn test_removes_hidden_nav_only() {
        let mut dom = parse_html(
            r#"<nav hidden="">pages</nav><nav aria-hidden="true">landmarks</nav><nav aria-hidden="false">toc</nav>"#,
        );
        remove_metadata(&mut dom);
        let navs = crate::dom::select(&dom, dom.document(), "nav");
        assert_eq!(navs.len(), 1);
        assert_eq!(dom.text_content(navs[0]), "toc");
    }
}
