//! Manifest and spine entries of the package document.

use serde::Serialize;

/// Media type of the package document.
pub const OPF_MEDIA_TYPE: &str = "application/oebps-package+xml";
/// Media type of an EPUB2 navigation control file.
pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";
/// Media types that can appear as chapters.
pub const CHAPTER_MEDIA_TYPES: [&str; 2] = ["application/xhtml+xml", "text/html"];

/// One `<manifest><item>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItem {
    pub id: String,
    /// The href as written in the OPF.
    pub href: String,
    /// Absolute, percent-decoded package path.
    pub path: String,
    pub media_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<String>,
}

impl ManifestItem {
    /// Check whether the space-separated `properties` list contains `property`.
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|p| p.split_ascii_whitespace().any(|x| x == property))
    }

    /// Check whether this item is XHTML or HTML content.
    pub fn is_chapter(&self) -> bool {
        let essence = self.media_type.split(';').next().unwrap_or("").trim();
        CHAPTER_MEDIA_TYPES
            .iter()
            .any(|t| t.eq_ignore_ascii_case(essence))
    }
}

/// One `<spine><itemref>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpineItem {
    pub idref: String,
    /// False only when the OPF says `linear="no"`.
    pub linear: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(media_type: &str, properties: Option<&str>) -> ManifestItem {
        ManifestItem {
            id: "x".into(),
            href: "x".into(),
            path: "/x".into(),
            media_type: media_type.into(),
            properties: properties.map(String::from),
        }
    }

    #[test]
    fn test_has_property() {
        let nav = item("application/xhtml+xml", Some("nav scripted"));
        assert!(nav.has_property("nav"));
        assert!(nav.has_property("scripted"));
        assert!(!nav.has_property("svg"));
        assert!(!item("text/css", None).has_property("nav"));
    }

    #[test]
    fn test_is_chapter() {
        assert!(item("application/xhtml+xml", None).is_chapter());
        assert!(item("Text/HTML; charset=utf-8", None).is_chapter());
        assert!(!item("image/jpeg", None).is_chapter());
    }

    #[test]
    fn test_serialize_uses_camel_case() {
        let json = serde_json::to_value(item("text/css", None)).unwrap();
        assert_eq!(json["mediaType"], "text/css");
        assert!(json.get("properties").is_none());
    }
}
