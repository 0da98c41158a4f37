//! Strict XML parsing into the arena DOM.
//!
//! quick-xml does the tokenizing; namespace prefixes are resolved here
//! against the `xmlns` declarations in scope. Malformed input does not
//! produce an error value: whatever was built before the failure is kept
//! and a `<parsererror>` element carrying the message is appended to the
//! document, the same shape a browser's DOMParser produces.

use html5ever::{LocalName, Namespace, Prefix, QualName, ns};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::Dialect;
use super::arena::{ArenaDom, Attribute, NodeId, PARSE_ERROR_TAG};
use crate::util::resolve_entity;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";
const PARSE_ERROR_NS: &str = "http://www.mozilla.org/newlayout/xml/parsererror.xml";

/// Parse `content` as XML. Never fails; see the module docs.
pub fn parse_xml(content: &str, dialect: Dialect) -> ArenaDom {
    let mut builder = XmlBuilder::new(dialect);
    if let Err(message) = builder.run(content) {
        builder.mark_error(&message);
    }
    builder.dom
}

struct XmlBuilder {
    dom: ArenaDom,
    /// Open elements; the document root sits at the bottom.
    open: Vec<NodeId>,
    /// Namespace declarations, one frame per open element.
    scopes: Vec<Vec<(String, String)>>,
}

impl XmlBuilder {
    fn new(dialect: Dialect) -> Self {
        let dom = ArenaDom::new(dialect);
        let document = dom.document();
        Self {
            dom,
            open: vec![document],
            scopes: Vec::new(),
        }
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or(self.dom.document())
    }

    fn run(&mut self, content: &str) -> Result<(), String> {
        let mut reader = Reader::from_str(content);

        loop {
            let event = reader
                .read_event()
                .map_err(|e| format!("{} at byte {}", e, reader.buffer_position()))?;

            match event {
                Event::Start(e) => {
                    let id = self.open_element(&e)?;
                    self.open.push(id);
                }
                Event::Empty(e) => {
                    self.open_element(&e)?;
                    self.scopes.pop();
                }
                Event::End(_) => {
                    if self.open.len() <= 1 {
                        return Err("unexpected closing tag".to_string());
                    }
                    self.open.pop();
                    self.scopes.pop();
                }
                Event::Text(e) => {
                    let text = String::from_utf8_lossy(e.as_ref());
                    let parent = self.current();
                    self.dom.append_text(parent, &text);
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(e.as_ref());
                    let parent = self.current();
                    self.dom.append_text(parent, &text);
                }
                Event::GeneralRef(e) => {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    let resolved = resolve_entity(&entity)
                        .ok_or_else(|| format!("undefined entity &{};", entity))?;
                    let parent = self.current();
                    self.dom.append_text(parent, &resolved);
                }
                Event::Comment(e) => {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    let comment = self.dom.create_comment(text);
                    let parent = self.current();
                    self.dom.append(parent, comment);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if self.open.len() > 1 {
            let unclosed = self.dom.tag_name(self.current()).unwrap_or_default();
            return Err(format!("unclosed element <{}>", unclosed));
        }
        Ok(())
    }

    /// Create and attach an element, pushing its namespace frame.
    fn open_element(&mut self, e: &BytesStart<'_>) -> Result<NodeId, String> {
        let raw_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();

        let mut raw_attrs = Vec::new();
        let mut frame = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let raw_value = String::from_utf8_lossy(&attr.value);
            let value = quick_xml::escape::unescape(&raw_value)
                .map(|v| v.into_owned())
                .map_err(|e| format!("attribute {}: {}", key, e))?;

            if key == "xmlns" {
                frame.push((String::new(), value.clone()));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                frame.push((prefix.to_string(), value.clone()));
            }
            raw_attrs.push((key, value));
        }
        self.scopes.push(frame);

        let name = self.element_name(&raw_name);
        let attrs = raw_attrs
            .into_iter()
            .map(|(key, value)| Attribute {
                name: self.attribute_name(&key),
                value,
            })
            .collect();

        let id = self.dom.create_element(name, attrs);
        let parent = self.current();
        self.dom.append(parent, id);
        Ok(id)
    }

    fn lookup(&self, prefix: &str) -> Option<&str> {
        match prefix {
            "xml" => return Some(XML_NS),
            "xmlns" => return Some(XMLNS_NS),
            _ => {}
        }
        self.scopes
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    fn element_name(&self, raw: &str) -> QualName {
        let (prefix, local) = split_qname(raw);
        let ns = self.lookup(prefix.unwrap_or("")).unwrap_or("");
        QualName::new(prefix.map(Prefix::from), Namespace::from(ns), LocalName::from(local))
    }

    fn attribute_name(&self, raw: &str) -> QualName {
        if raw == "xmlns" {
            return QualName::new(None, Namespace::from(XMLNS_NS), LocalName::from("xmlns"));
        }
        match split_qname(raw) {
            (Some(prefix), local) => {
                let ns = self.lookup(prefix).unwrap_or("");
                QualName::new(Some(Prefix::from(prefix)), Namespace::from(ns), LocalName::from(local))
            }
            // Unprefixed attributes are in no namespace
            (None, local) => QualName::new(None, ns!(), LocalName::from(local)),
        }
    }

    fn mark_error(&mut self, message: &str) {
        log::debug!("XML parse error: {}", message);
        let name = QualName::new(
            None,
            Namespace::from(PARSE_ERROR_NS),
            LocalName::from(PARSE_ERROR_TAG),
        );
        let marker = self.dom.create_element(name, Vec::new());
        let document = self.dom.document();
        self.dom.append(document, marker);
        self.dom.append_text(marker, message);
    }
}

fn split_qname(raw: &str) -> (Option<&str>, &str) {
    match raw.split_once(':') {
        Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => (Some(prefix), local),
        _ => (None, raw),
    }
}
