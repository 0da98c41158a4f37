//! Pass 5: absolutize link and image paths.

use crate::dom::ArenaDom;
use crate::path;

use super::collect_elements;

/// Rewrite relative `href`/`src` values against `base_path`.
///
/// Absolute paths, bare fragments and anything with a URL scheme
/// (`https:`, `data:`, `blob:`, `mailto:`) are left alone. Images without
/// an `alt` get the file name of their original `src`.
pub fn normalize_paths(dom: &mut ArenaDom, base_path: Option<&str>) {
    let elements = collect_elements(dom, dom.document(), |dom, id| {
        dom.get_plain_attr(id, "href").is_some() || dom.get_plain_attr(id, "src").is_some()
    });

    for id in elements {
        if dom.is_tag(id, "img")
            && dom.get_plain_attr(id, "alt").is_none()
            && let Some(src) = dom.get_plain_attr(id, "src")
        {
            let alt = path::basename(src).to_string();
            dom.set_attr(id, "alt", &alt);
        }

        let Some(base) = base_path else {
            continue;
        };
        for attr in ["href", "src"] {
            if let Some(value) = dom.get_plain_attr(id, attr)
                && is_relative(value)
            {
                let resolved = path::normalize(base, value);
                dom.set_attr(id, attr, &resolved);
            }
        }
    }
}

fn is_relative(value: &str) -> bool {
    !(value.is_empty()
        || value.starts_with('/')
        || value.starts_with('#')
        || path::is_external(value)
        || has_scheme(value))
}

/// `data:`, `mailto:` and friends: a scheme before any `/`, `?` or `#`.
fn has_scheme(value: &str) -> bool {
    let Some(pos) = value.find(':') else {
        return false;
    };
    let scheme = &value[..pos];
    scheme.len() > 1
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse_html, select};

    fn attr_values(dom: &ArenaDom, selector: &str, attr: &str) -> Vec<String> {
        select(dom, dom.document(), selector)
            .into_iter()
            .filter_map(|id| dom.get_attr(id, attr).map(String::from))
            .collect()
    }

    #[test]
    fn test_relative_paths_resolved() {
        let mut dom = parse_html(
            r#"<a href="ch2.xhtml#s1">a</a><a href="../notes.xhtml">b</a><img src="../img/x%20y.png">"#,
        );
        normalize_paths(&mut dom, Some("/OEBPS/text"));
        assert_eq!(
            attr_values(&dom, "a", "href"),
            vec!["/OEBPS/text/ch2.xhtml#s1", "/OEBPS/notes.xhtml"]
        );
        assert_eq!(attr_values(&dom, "img", "src"), vec!["/OEBPS/img/x%20y.png"]);
        assert_eq!(attr_values(&dom, "img", "alt"), vec!["x%20y.png"]);
    }

    #[test]
    fn test_special_values_untouched() {
        let html = r##"<a href="#note">1</a><a href="https://example.com/">2</a>
<a href="mailto:a@b.c">3</a><a href="/abs.xhtml">4</a>
<img src="data:image/png;base64,AAAA" alt=""><img src="blob:xyz" alt="kept">"##;
        let mut dom = parse_html(html);
        normalize_paths(&mut dom, Some("/OEBPS"));
        assert_eq!(
            attr_values(&dom, "a", "href"),
            vec!["#note", "https://example.com/", "mailto:a@b.c", "/abs.xhtml"]
        );
        assert_eq!(
            attr_values(&dom, "img", "src"),
            vec!["data:image/png;base64,AAAA", "blob:xyz"]
        );
        assert_eq!(attr_values(&dom, "img", "alt"), vec!["", "kept"]);
    }

    #[test]
    fn test_without_base_only_alts_change() {
        let mut dom = parse_html(r#"<img src="images/cover.jpg">"#);
        normalize_paths(&mut dom, None);
        assert_eq!(attr_values(&dom, "img", "src"), vec!["images/cover.jpg"]);
        assert_eq!(attr_values(&dom, "img", "alt"), vec!["cover.jpg"]);
    }
}
