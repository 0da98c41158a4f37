//! DOM clean-up passes run before Markdown conversion.
//!
//! ## Pipeline Order
//!
//! Later passes assume the earlier ones already ran:
//!
//! 1. **Cleanup** - Drop metadata, scripts, styles and hidden navigation
//! 2. **SVG** - Replace SVG-wrapped cover images with `<img>`
//! 3. **Anchors** - Hoist ids into `<div data-anchor-ids>` markers (opt-in)
//! 4. **Headings** - Move images out of headings
//! 5. **Paths** - Absolutize hrefs and srcs, synthesize missing alts

mod anchors;
mod cleanup;
mod headings;
mod paths;
mod svg;

use crate::dom::{ArenaDom, NodeId};

use super::ConvertOptions;

pub use anchors::{hoist_anchor_ids, is_marker};
pub use cleanup::remove_metadata;
pub use headings::flatten_headings;
pub use paths::normalize_paths;
pub use svg::replace_svg_images;

/// Run every pass on `dom` in pipeline order.
pub fn apply(dom: &mut ArenaDom, options: &ConvertOptions) {
    remove_metadata(dom);
    replace_svg_images(dom);
    if options.preserve_ids {
        hoist_anchor_ids(dom, options);
    }
    flatten_headings(dom);
    normalize_paths(dom, options.base_path.as_deref());
}

/// Attached element descendants of `root` matching `predicate`, in document order.
///
/// The list is collected up front so passes can detach nodes while iterating.
fn collect_elements<F>(dom: &ArenaDom, root: NodeId, predicate: F) -> Vec<NodeId>
where
    F: Fn(&ArenaDom, NodeId) -> bool,
{
    dom.descendants(root)
        .filter(|&id| dom.is_element(id) && predicate(dom, id))
        .collect()
}
