//! Href resolution inside an EPUB package.
//!
//! Every path handed out by this crate is absolute with respect to the
//! package root and uses `/` as its separator, e.g. `/OEBPS/text/ch01.xhtml`.
//! Hrefs found in documents are resolved against the directory of the
//! document that contains them.

use percent_encoding::percent_decode_str;

/// Resolve `href` against `base`, returning a canonical absolute path.
///
/// Hrefs are classified in this order:
/// - already absolute (`/...`): returned unchanged
/// - fragment only (`#...`): returned unchanged
/// - external (`scheme://...`): returned unchanged
/// - anything else: joined onto `base`, with `.` and `..` collapsed
///
/// Excess `..` segments stop at the root. A trailing `#fragment` is split
/// off before resolution and re-appended afterwards.
///
/// ```
/// use epubmark::path::normalize;
///
/// assert_eq!(normalize("/OEBPS/text", "../images/a.png"), "/OEBPS/images/a.png");
/// assert_eq!(normalize("/OEBPS", "ch1.xhtml#s2"), "/OEBPS/ch1.xhtml#s2");
/// assert_eq!(normalize("/OEBPS", "../../../a.png"), "/a.png");
/// assert_eq!(normalize("/OEBPS", "https://example.com/x"), "https://example.com/x");
/// ```
pub fn normalize(base: &str, href: &str) -> String {
    if href.starts_with('/') || href.starts_with('#') || is_external(href) {
        return href.to_string();
    }

    let (path, fragment) = split_fragment(href);

    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(path.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut resolved = String::with_capacity(href.len() + base.len() + 1);
    resolved.push('/');
    resolved.push_str(&segments.join("/"));
    if let Some(fragment) = fragment {
        resolved.push('#');
        resolved.push_str(fragment);
    }
    resolved
}

/// Check whether an href carries a URL scheme followed by `://`.
pub fn is_external(href: &str) -> bool {
    let Some(pos) = href.find("://") else {
        return false;
    };
    let scheme = &href[..pos];
    !scheme.is_empty()
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Split `path#fragment` into its path and optional fragment.
///
/// An empty fragment (`ch1.xhtml#`) is reported as `None`.
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((path, fragment)) if !fragment.is_empty() => (path, Some(fragment)),
        Some((path, _)) => (path, None),
        None => (href, None),
    }
}

/// Percent-decode an href. Invalid UTF-8 sequences are replaced lossily.
pub fn decode(href: &str) -> String {
    percent_decode_str(href).decode_utf8_lossy().into_owned()
}

/// Directory portion of an absolute path (`/OEBPS/a.xhtml` -> `/OEBPS`).
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(pos) => &path[..pos],
    }
}

/// Final segment of a path, ignoring any fragment.
pub fn basename(path: &str) -> &str {
    let (path, _) = split_fragment(path);
    path.rsplit('/').next().unwrap_or(path)
}

/// File extension of a path, lowercased, without the dot.
pub fn extension(path: &str) -> Option<String> {
    let name = basename(path);
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}
