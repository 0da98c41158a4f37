//! Pass 2: SVG cover wrappers.
//!
//! Many EPUBs wrap the cover in `<svg><image xlink:href="cover.jpg"/></svg>`
//! to get aspect-preserving scaling. Markdown can't carry that, so the
//! image is pulled out as a plain `<img>` and the SVG dropped.

use crate::dom::{ArenaDom, NodeId};

use super::collect_elements;

/// Alt text given to images recovered from an SVG wrapper.
pub const SVG_IMAGE_ALT: &str = "_[SVG cover image not supported]_";

/// Replace each outermost `<svg>` by an `<img>` for its first `<image>`.
///
/// The `<svg>` is removed even when it holds no image.
pub fn replace_svg_images(dom: &mut ArenaDom) {
    let svgs = collect_elements(dom, dom.document(), |dom, id| {
        is_svg(dom, id) && !has_svg_ancestor(dom, id)
    });

    for svg in svgs {
        let href = dom
            .descendants(svg)
            .filter(|&id| dom.is_any_tag(id, &["image", "svg:image"]))
            .find_map(|id| {
                dom.get_attr(id, "href")
                    .or_else(|| dom.get_attr(id, "xlink:href"))
                    .map(str::to_string)
            });

        if let Some(href) = href {
            let img = dom.create_html_element("img", &[("src", &href), ("alt", SVG_IMAGE_ALT)]);
            dom.insert_before(svg, img);
        }
        dom.detach(svg);
    }
}

// The HTML parser keeps a written `svg:` prefix in the local name
fn is_svg(dom: &ArenaDom, id: NodeId) -> bool {
    dom.is_any_tag(id, &["svg", "svg:svg"])
}

fn has_svg_ancestor(dom: &ArenaDom, id: NodeId) -> bool {
    let mut current = dom.parent(id);
    while current.is_some() {
        if is_svg(dom, current) {
            return true;
        }
        current = dom.parent(current);
    }
    false
}
