//! Re-emission of a cleaned container as a flat run of paragraph-level blocks.

use dom_query::{NodeRef, Selection};
use rp_core::html::escape_text;
use rp_core::noise::is_noise_line;

use crate::dom::{contains_image, has_descendant_tag, has_tag, rendered_text, tag_of};

pub const BLOCK_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "section", "blockquote", "pre", "ul", "ol", "li",
];

/// Blocks emitted whole even when they nest other blocks.
const ATOMIC_TAGS: &[&str] = &["pre", "blockquote"];

/// Flatten `root` into paragraph-level markup.
///
/// Returns `None` when the container has no block structure at all, leaving the
/// caller to fall back to the container's inner markup.
pub fn emit_blocks(root: &NodeRef) -> Option<String> {
    if !has_descendant_tag(root, BLOCK_TAGS) {
        return None;
    }
    let mut out = Vec::new();
    walk(root, &mut out);
    Some(out.join("\n"))
}

fn walk(node: &NodeRef, out: &mut Vec<String>) {
    let mut run = InlineRun::default();

    for child in node.children() {
        if child.is_text() {
            run.push_text(&child.text());
            continue;
        }
        if !child.is_element() {
            continue;
        }

        let is_block = has_tag(&child, BLOCK_TAGS);
        let nests_blocks = has_descendant_tag(&child, BLOCK_TAGS);

        if is_block && (!nests_blocks || has_tag(&child, ATOMIC_TAGS)) {
            run.flush(out);
            if let Some(block) = emit_block(&child) {
                out.push(block);
            }
        } else if nests_blocks {
            run.flush(out);
            walk(&child, out);
        } else {
            run.push_element(&child);
        }
    }

    run.flush(out);
}

fn emit_block(node: &NodeRef) -> Option<String> {
    let text = rendered_text(node);
    let has_image = contains_image(node);
    let text = text.trim();

    if !has_image && (text.is_empty() || is_noise_line(text)) {
        return None;
    }

    let tag = tag_of(node)?;
    let inner = Selection::from(*node).inner_html();
    let inner = inner.trim();

    Some(match tag.as_str() {
        "li" => format!("<p>• {}</p>", inner),
        "section" => format!("<p>{}</p>", inner),
        _ => format!("<{tag}>{inner}</{tag}>", tag = tag, inner = inner),
    })
}

/// Loose inline content between blocks.
#[derive(Default)]
struct InlineRun {
    html: String,
    text: String,
    has_image: bool,
}

impl InlineRun {
    fn push_text(&mut self, text: &str) {
        self.html.push_str(&escape_text(text));
        self.text.push_str(text);
    }

    fn push_element(&mut self, node: &NodeRef) {
        self.html.push_str(&Selection::from(*node).html());
        self.text.push_str(&rendered_text(node));
        self.has_image |= contains_image(node);
    }

    fn flush(&mut self, out: &mut Vec<String>) {
        let run = std::mem::take(self);
        let text = run.text.trim();
        let html = run.html.trim();
        if html.is_empty() {
            return;
        }
        if run.has_image || (!text.is_empty() && !is_noise_line(text)) {
            out.push(format!("<p>{}</p>", html));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{fragment_document, fragment_root};

    fn emit(html: &str) -> Option<String> {
        let doc = fragment_document(html);
        let root = fragment_root(&doc);
        let node = root.nodes()[0];
        emit_blocks(&node)
    }

    #[test]
    fn test_nested_containers_are_flattened() {
        let out = emit("<div><section><p>One</p><p>Two</p></section><h2>Head</h2></div>").unwrap();
        assert_eq!(out, "<p>One</p>\n<p>Two</p>\n<h2>Head</h2>");
    }

    #[test]
    fn test_loose_text_becomes_paragraph() {
        let out = emit("<div>Loose <b>bold</b> text<p>Para</p>tail</div>").unwrap();
        assert_eq!(out, "<p>Loose <b>bold</b> text</p>\n<p>Para</p>\n<p>tail</p>");
    }

    #[test]
    fn test_list_items_and_atomic_blocks() {
        let out = emit("<ul><li>first</li><li>second</li></ul><blockquote><p>quoted</p></blockquote>").unwrap();
        assert_eq!(
            out,
            "<p>• first</p>\n<p>• second</p>\n<blockquote><p>quoted</p></blockquote>"
        );
    }

    #[test]
    fn test_empty_and_noise_blocks_skipped_unless_imaged() {
        let out = emit(r#"<p> </p><p>继续观看</p><p><img src="a.png"></p><p>Body</p>"#).unwrap();
        assert_eq!(out, "<p><img src=\"a.png\"></p>\n<p>Body</p>");
    }

    #[test]
    fn test_no_blocks_returns_none() {
        assert!(emit("<span>just inline</span>").is_none());
    }
}
