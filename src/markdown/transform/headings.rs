//! Pass 4: move images out of headings.

use crate::dom::ArenaDom;

use super::collect_elements;

const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// Pull images out of `h1`..`h6` into a paragraph right after the heading.
///
/// The heading keeps only its trimmed text. `# Title ![](x.png)` style
/// output breaks most Markdown renderers.
pub fn flatten_headings(dom: &mut ArenaDom) {
    let headings = collect_elements(dom, dom.document(), |dom, id| {
        dom.is_any_tag(id, HEADING_TAGS) && dom.descendants(id).any(|d| dom.is_tag(d, "img"))
    });

    for heading in headings {
        let images: Vec<_> = dom
            .descendants(heading)
            .filter(|&d| dom.is_tag(d, "img"))
            .collect();
        for &img in &images {
            dom.detach(img);
        }

        let text = dom.text_content(heading);
        dom.clear_children(heading);
        dom.append_text(heading, text.trim());

        let block = dom.create_html_element("p", &[]);
        for img in images {
            dom.append(block, img);
        }
        dom.insert_after(heading, block);
    }
}
