//! Dublin Core metadata and its `<meta refines>` graph.
//!
//! Each `dc:*` element of the OPF `<metadata>` block becomes one
//! [`DcProperty`]. EPUB3 `<meta property=".." refines="#id">` elements
//! attach secondary values (role, file-as, display-seq) to the property
//! carrying that id. A refinement whose target is unknown is dropped.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::dom::{self, ArenaDom, NodeId};
use crate::error::{Error, Result};

const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";

/// One Dublin Core element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DcProperty {
    /// Local name, lowercased, without the `dc:` prefix.
    pub name: String,
    pub value: String,
    /// Every attribute of the element, keyed by qualified name.
    pub attributes: BTreeMap<String, String>,
    /// Refinement values by property, in declaration order.
    pub refinements: BTreeMap<String, Vec<String>>,
}

impl DcProperty {
    /// First refinement value for `property`.
    pub fn refinement(&self, property: &str) -> Option<&str> {
        self.refinements
            .get(property)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// A `<meta property>` element before it is attached to its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaProperty {
    pub property: String,
    pub value: String,
    pub id: Option<String>,
    pub refines: Option<String>,
    pub scheme: Option<String>,
}

/// The parsed `<metadata>` block.
///
/// Properties are stored once and indexed by name (in insertion order)
/// and by `#id`, so both lookups hand out the same [`DcProperty`].
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    properties: Vec<DcProperty>,
    names: Vec<String>,
    by_name: HashMap<String, Vec<usize>>,
    by_id: HashMap<String, usize>,
}

impl Metadata {
    /// Parse the `<metadata>` element of an OPF document.
    ///
    /// Fails only if there is no `<package>` root or it has no
    /// `<metadata>` child.
    pub fn from_xml(opf: &str) -> Result<Self> {
        let dom = dom::parse(opf, dom::Dialect::Xml);
        let package = dom
            .element_children(dom.document())
            .find(|&id| dom.is_tag(id, "package"))
            .ok_or(Error::MissingPackageElement)?;
        let metadata = dom
            .element_children(package)
            .find(|&id| dom.is_tag(id, "metadata"))
            .ok_or(Error::MissingMetadataElement)?;
        Ok(Self::from_dom(&dom, metadata))
    }

    /// Build from a `<metadata>` element. Only direct children are read.
    pub fn from_dom(dom: &ArenaDom, metadata: NodeId) -> Self {
        let mut result = Self::default();

        for child in dom.element_children(metadata) {
            if is_dublin_core(dom, child) {
                let Some(local) = dom.element_name(child) else {
                    continue;
                };
                let attributes = dom
                    .attrs(child)
                    .iter()
                    .map(|a| (a.qualified_name(), a.value.clone()))
                    .collect();
                result.add_dc(
                    local.to_string().to_ascii_lowercase(),
                    dom.text_content(child).trim().to_string(),
                    attributes,
                );
            } else if dom.is_tag(child, "meta") {
                // Legacy <meta name=".." content=".."> has no property
                let Some(property) = dom.get_plain_attr(child, "property") else {
                    continue;
                };
                result.add_meta(MetaProperty {
                    property: property.to_string(),
                    value: dom.text_content(child).trim().to_string(),
                    id: dom.get_plain_attr(child, "id").map(String::from),
                    refines: dom.get_plain_attr(child, "refines").map(String::from),
                    scheme: dom.get_plain_attr(child, "scheme").map(String::from),
                });
            }
        }

        result
    }

    /// Register a Dublin Core property. It is reachable by id only if
    /// `attributes` carries an `id`.
    pub fn add_dc(&mut self, name: String, value: String, attributes: BTreeMap<String, String>) {
        let index = self.properties.len();
        if let Some(id) = attributes.get("id") {
            self.by_id.insert(format!("#{}", id), index);
        }
        match self.by_name.get_mut(&name) {
            Some(indices) => indices.push(index),
            None => {
                self.names.push(name.clone());
                self.by_name.insert(name.clone(), vec![index]);
            }
        }
        self.properties.push(DcProperty {
            name,
            value,
            attributes,
            refinements: BTreeMap::new(),
        });
    }

    /// Attach a refinement to the property its `refines` names.
    ///
    /// Returns false, changing nothing, when `refines` is absent or names
    /// no registered id.
    pub fn add_meta(&mut self, meta: MetaProperty) -> bool {
        let Some(refines) = meta.refines.as_deref() else {
            log::debug!("Dropping <meta property=\"{}\"> without refines", meta.property);
            return false;
        };
        let Some(&index) = self.by_id.get(&id_key(refines)) else {
            log::debug!(
                "Dropping <meta property=\"{}\">: refines unknown id {}",
                meta.property,
                refines
            );
            return false;
        };
        self.properties[index]
            .refinements
            .entry(meta.property)
            .or_default()
            .push(meta.value);
        true
    }

    /// First value for `key`, or an empty string.
    ///
    /// `key` is case-insensitive and may carry a `dc:` prefix.
    pub fn get(&self, key: &str) -> &str {
        self.get_properties(key)
            .next()
            .map(|p| p.value.as_str())
            .unwrap_or("")
    }

    /// Every value for `key`, in document order.
    pub fn get_values(&self, key: &str) -> Vec<&str> {
        self.get_properties(key).map(|p| p.value.as_str()).collect()
    }

    /// Every property for `key`, in document order.
    pub fn get_properties(&self, key: &str) -> impl Iterator<Item = &DcProperty> {
        self.by_name
            .get(&name_key(key))
            .into_iter()
            .flatten()
            .map(|&i| &self.properties[i])
    }

    /// Property carrying `id`, given with or without the leading `#`.
    pub fn get_by_id(&self, id: &str) -> Option<&DcProperty> {
        self.by_id.get(&id_key(id)).map(|&i| &self.properties[i])
    }

    /// Property names in first-seen order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// `{ name: first value }` for every name, in first-seen order.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .names()
            .map(|name| (name.to_string(), Value::String(self.get(name).to_string())))
            .collect();
        Value::Object(map)
    }

    /// `{ name: [{ value, attributes, refinements }] }` for every name.
    ///
    /// Names keep first-seen order; attribute and refinement keys are
    /// sorted.
    pub fn to_json_full(&self) -> Value {
        let map: Map<String, Value> = self
            .names()
            .map(|name| {
                let entries = self
                    .get_properties(name)
                    .map(|p| {
                        json!({
                            "value": p.value,
                            "attributes": p.attributes,
                            "refinements": p.refinements,
                        })
                    })
                    .collect();
                (name.to_string(), Value::Array(entries))
            })
            .collect();
        Value::Object(map)
    }
}

fn is_dublin_core(dom: &ArenaDom, id: NodeId) -> bool {
    dom.element_qual_name(id).is_some_and(|name| {
        name.ns.as_ref() == DC_NAMESPACE
            || name
                .prefix
                .as_ref()
                .is_some_and(|p| (&**p).eq_ignore_ascii_case("dc"))
    })
}

fn name_key(key: &str) -> String {
    let lower = key.to_ascii_lowercase();
    match lower.strip_prefix("dc:") {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

fn id_key(id: &str) -> String {
    if id.starts_with('#') {
        id.to_string()
    } else {
        format!("#{}", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPF: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:identifier id="uid">urn:uuid:1234</dc:identifier>
    <dc:title id="t1">  Moby-Dick  </dc:title>
    <dc:Title>Or, The Whale</dc:Title>
    <dc:creator id="c1" opf:role="aut">Herman Melville</dc:creator>
    <dc:language>en</dc:language>
    <meta refines="#c1" property="role" scheme="marc:relators">aut</meta>
    <meta refines="c1" property="file-as">Melville, Herman</meta>
    <meta refines="#c1" property="role">edt</meta>
    <meta refines="#unknown" property="ghost">boo</meta>
    <meta property="dcterms:modified">2020-01-01T00:00:00Z</meta>
    <meta name="cover" content="cover-img"/>
  </metadata>
</package>"##;

    #[test]
    fn test_parse_dc_properties() {
        let metadata = Metadata::from_xml(OPF).unwrap();

        assert_eq!(metadata.get("title"), "Moby-Dick");
        assert_eq!(metadata.get("DC:TITLE"), "Moby-Dick");
        assert_eq!(metadata.get_values("title"), vec!["Moby-Dick", "Or, The Whale"]);
        assert_eq!(metadata.get("publisher"), "");

        let creator = metadata.get_properties("creator").next().unwrap();
        assert_eq!(creator.attributes.get("opf:role").map(String::as_str), Some("aut"));
        assert_eq!(creator.attributes.get("id").map(String::as_str), Some("c1"));
        assert_eq!(
            metadata.names().collect::<Vec<_>>(),
            vec!["identifier", "title", "creator", "language"]
        );
    }

    #[test]
    fn test_refinements_accumulate_in_order() {
        let metadata = Metadata::from_xml(OPF).unwrap();
        let creator = metadata.get_by_id("c1").unwrap();

        assert_eq!(
            creator.refinements.get("role"),
            Some(&vec!["aut".to_string(), "edt".to_string()])
        );
        assert_eq!(creator.refinement("file-as"), Some("Melville, Herman"));
    }

    #[test]
    fn test_get_by_id_with_or_without_hash_is_identical() {
        let metadata = Metadata::from_xml(OPF).unwrap();
        let a = metadata.get_by_id("t1").unwrap();
        let b = metadata.get_by_id("#t1").unwrap();
        assert!(std::ptr::eq(a, b));
        assert!(metadata.get_by_id("#missing").is_none());
    }

    #[test]
    fn test_unknown_refines_is_dropped() {
        let metadata = Metadata::from_xml(OPF).unwrap();
        for name in metadata.names() {
            for property in metadata.get_properties(name) {
                assert!(!property.refinements.contains_key("ghost"));
                assert!(!property.refinements.contains_key("dcterms:modified"));
            }
        }
    }

    #[test]
    fn test_add_meta_reports_result() {
        let mut metadata = Metadata::default();
        let mut attributes = BTreeMap::new();
        attributes.insert("id".to_string(), "x".to_string());
        metadata.add_dc("title".into(), "T".into(), attributes);

        let meta = |refines: Option<&str>| MetaProperty {
            property: "title-type".into(),
            value: "main".into(),
            id: None,
            refines: refines.map(String::from),
            scheme: None,
        };
        assert!(metadata.add_meta(meta(Some("#x"))));
        assert!(!metadata.add_meta(meta(Some("#y"))));
        assert!(!metadata.add_meta(meta(None)));
        assert_eq!(metadata.get_by_id("x").unwrap().refinements["title-type"], vec!["main"]);
    }

    #[test]
    fn test_json_views() {
        let metadata = Metadata::from_xml(OPF).unwrap();

        let flat = metadata.to_json();
        assert_eq!(flat["title"], "Moby-Dick");
        assert_eq!(flat["language"], "en");

        let full = metadata.to_json_full();
        assert_eq!(full["title"].as_array().unwrap().len(), 2);
        assert_eq!(full["creator"][0]["refinements"]["role"][1], "edt");
        assert_eq!(full["creator"][0]["attributes"]["opf:role"], "aut");
    }

    #[test]
    fn test_json_keys_follow_document_order() {
        let metadata = Metadata::from_xml(OPF).unwrap();
        let expected = vec!["identifier", "title", "creator", "language"];

        let flat = metadata.to_json();
        let keys: Vec<_> = flat.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, expected);

        let full = metadata.to_json_full();
        let keys: Vec<_> = full.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_missing_elements_are_distinct_errors() {
        assert!(matches!(
            Metadata::from_xml("<container/>"),
            Err(Error::MissingPackageElement)
        ));
        assert!(matches!(
            Metadata::from_xml("<package><manifest/></package>"),
            Err(Error::MissingMetadataElement)
        ));
    }
}
