//! Pass 3: hoist element ids into anchor marker divs.
//!
//! Markdown has nowhere to put an `id`, so ids on block containers (and
//! anything inside them) move to an invisible marker placed right before
//! the container:
//!
//! ```html
//! <div data-anchor-ids="ch1 note3">&#8203;</div>
//! <h1>Chapter One <a>3</a></h1>
//! ```
//!
//! A container whose previous element is already a marker adds its ids to
//! that marker instead of creating a second one.

use crate::dom::{ArenaDom, NodeId};
use crate::markdown::{ANCHOR_IDS_ATTR, ConvertOptions};

use super::collect_elements;

const ZERO_WIDTH_SPACE: &str = "\u{200B}";
const BLOCK_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "p"];

/// Move ids that pass the keep filter off containers into marker divs.
pub fn hoist_anchor_ids(dom: &mut ArenaDom, options: &ConvertOptions) {
    let containers = collect_elements(dom, dom.document(), is_anchor_container);

    for container in containers {
        let ids = take_ids(dom, container, options);
        if ids.is_empty() {
            continue;
        }

        let prev = previous_element(dom, container);
        if prev.is_some() && is_marker(dom, prev) {
            let merged = match dom.get_plain_attr(prev, ANCHOR_IDS_ATTR) {
                Some(existing) if !existing.is_empty() => format!("{existing} {}", ids.join(" ")),
                _ => ids.join(" "),
            };
            dom.set_attr(prev, ANCHOR_IDS_ATTR, &merged);
        } else {
            let marker = dom.create_html_element("div", &[(ANCHOR_IDS_ATTR, &ids.join(" "))]);
            dom.append_text(marker, ZERO_WIDTH_SPACE);
            dom.insert_before(container, marker);
        }
    }
}

/// Check whether `id` is an anchor marker div.
pub fn is_marker(dom: &ArenaDom, id: NodeId) -> bool {
    dom.is_tag(id, "div") && dom.get_plain_attr(id, ANCHOR_IDS_ATTR).is_some()
}

/// Headings, paragraphs, and divs too fine-grained to hold a paragraph.
fn is_anchor_container(dom: &ArenaDom, id: NodeId) -> bool {
    if dom.is_any_tag(id, BLOCK_TAGS) {
        return true;
    }
    dom.is_tag(id, "div")
        && !is_marker(dom, id)
        && !dom.descendants(id).any(|d| dom.is_tag(d, "p"))
}

/// Strip and return the kept ids of `container` and its descendants.
fn take_ids(dom: &mut ArenaDom, container: NodeId, options: &ConvertOptions) -> Vec<String> {
    let carriers: Vec<NodeId> = std::iter::once(container)
        .chain(dom.descendants(container))
        .filter(|&id| dom.element_id(id).is_some_and(|v| options.keeps(v)))
        .collect();

    carriers
        .into_iter()
        .filter_map(|id| dom.remove_attr(id, "id"))
        .filter(|v| !v.is_empty())
        .collect()
}

/// Previous element sibling, stepping over whitespace-only text.
fn previous_element(dom: &ArenaDom, id: NodeId) -> NodeId {
    let mut current = dom.prev_sibling(id);
    while current.is_some() {
        if dom.is_element(current) {
            return current;
        }
        match dom.text(current) {
            Some(text) if text.trim().is_empty() => current = dom.prev_sibling(current),
            _ => return NodeId::NONE,
        }
    }
    NodeId::NONE
}
