//! Canonical rich-text form shared by every destination editor.
//!
//! `normalize` is idempotent: every output is a parser serialization, and each
//! rewrite leaves markup it would not touch again.

use std::collections::BTreeSet;

use dom_query::{NodeRef, Selection};
use lazy_static::lazy_static;
use regex::Regex;

use rp_core::html::{escape_text, to_paragraph_html};

use crate::dom::{canonical_html, fragment_document, fragment_root, has_ancestor_tag, has_descendant_tag, has_tag, rendered_text, source_text_of, tag_of};

lazy_static! {
    static ref BLOCK_MARKUP: Regex = Regex::new(r"(?i)<(p|h[1-6]|ul|ol|li|blockquote|pre|img)\b").unwrap();
    static ref BLANK_RUNS: Regex = Regex::new(r"\n{3,}").unwrap();
}

const DROPPED: &str = "script, style, noscript, iframe, object, embed, video, audio, form, input, button, textarea, select";

const ALLOWED_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "blockquote", "pre", "code", "a",
    "strong", "b", "em", "i", "u", "s", "br", "img", "span",
];

const BLOCK_TAGS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "blockquote", "pre"];

/// Layout containers that become a paragraph when they hold no other block.
const CONTAINER_TAGS: &[&str] = &[
    "div", "section", "article", "header", "footer", "main", "aside", "figure", "figcaption",
    "center", "address", "details", "summary", "table", "thead", "tbody", "tfoot", "tr", "td",
    "th", "caption", "dl", "dt", "dd",
];

const MEDIA_TAGS: &[&str] = &["img", "video", "iframe"];

const STYLE_DENYLIST: &[&str] = &["font-size", "line-height", "font-family", "font", "margin", "padding"];

/// Normalize arbitrary markup into the shared editor form.
pub fn normalize(html: &str) -> String {
    let html = html.trim();
    if html.is_empty() {
        return String::new();
    }

    let doc = fragment_document(html);
    let root = fragment_root(&doc);
    root.select(DROPPED).remove();

    let text = source_text_of(&root);
    if !BLOCK_MARKUP.is_match(&root.inner_html()) {
        return paragraphs(&text);
    }

    promote_leaf_containers(&root);
    unwrap_disallowed(&root);
    scrub_attributes(&root);
    wrap_loose_inline(&root);
    mark_empty_paragraphs(&root);
    collapse_empty_runs(&root);

    let serialized = root.inner_html();
    let out = BLANK_RUNS.replace_all(serialized.trim(), "\n\n").to_string();
    if out.is_empty() {
        return paragraphs(&text);
    }
    out
}

/// Plain text as canonical paragraph markup.
pub fn paragraphs(text: &str) -> String {
    let html = to_paragraph_html(text);
    if html.is_empty() {
        return html;
    }
    canonical_html(&html)
}

fn element_nodes<'a>(root: &Selection<'a>, selector: &str) -> Vec<NodeRef<'a>> {
    root.select(selector).nodes().to_vec()
}

/// Turn innermost layout containers into paragraphs so unwrapping them does
/// not run neighbouring text together.
fn promote_leaf_containers(root: &Selection) {
    let selector = CONTAINER_TAGS.join(", ");
    for node in element_nodes(root, &selector) {
        let holds_blocks = has_descendant_tag(&node, BLOCK_TAGS) || has_descendant_tag(&node, CONTAINER_TAGS);
        if holds_blocks || has_ancestor_tag(&node, &["p"]) {
            continue;
        }
        let has_content = has_descendant_tag(&node, MEDIA_TAGS) || !rendered_text(&node).is_empty();
        if has_content {
            Selection::from(node).rename("p");
        }
    }
}

fn unwrap_disallowed(root: &Selection) {
    let names: BTreeSet<String> = element_nodes(root, "*")
        .iter()
        .filter_map(tag_of)
        .filter(|tag| !ALLOWED_TAGS.contains(&tag.as_str()))
        .collect();
    if names.is_empty() {
        return;
    }
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    root.strip_elements(&names);
}

fn scrub_attributes(root: &Selection) {
    for node in element_nodes(root, "*") {
        let tag = tag_of(&node).unwrap_or_default();
        let el = Selection::from(node);
        let attrs: Vec<(String, String)> = node
            .attrs()
            .iter()
            .map(|a| (a.name.local.to_string(), a.value.to_string()))
            .collect();

        for (name, value) in attrs {
            if name == "style" {
                let cleaned = clean_style(&value);
                if cleaned.is_empty() {
                    el.remove_attr("style");
                } else if cleaned != value {
                    el.set_attr("style", &cleaned);
                }
                continue;
            }
            let keep = match tag.as_str() {
                "a" => (name == "href" && !is_script_url(&value)) || name == "title",
                "img" => matches!(name.as_str(), "src" | "alt" | "width" | "height" | "data-original-src"),
                _ => false,
            };
            if !keep {
                el.remove_attr(&name);
            }
        }
    }
}

fn is_script_url(value: &str) -> bool {
    value.trim_start().to_ascii_lowercase().starts_with("javascript:")
}

/// Drop typographic-scale declarations from an inline style.
pub fn clean_style(style: &str) -> String {
    style
        .split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.trim();
            if prop.is_empty() || value.is_empty() || is_denied(&prop) {
                return None;
            }
            Some(format!("{}: {}", prop, value))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn is_denied(prop: &str) -> bool {
    STYLE_DENYLIST.contains(&prop)
        || prop.starts_with("margin-")
        || prop.starts_with("padding-")
}

/// Wrap text and inline elements sitting directly under the root into paragraphs.
fn wrap_loose_inline(root: &Selection) {
    let Some(root_node) = root.nodes().first().copied() else {
        return;
    };

    let mut groups: Vec<Vec<NodeRef>> = Vec::new();
    let mut current: Vec<NodeRef> = Vec::new();
    for child in root_node.children() {
        let inline = child.is_text()
            || (child.is_element()
                && !has_tag(&child, BLOCK_TAGS)
                && !has_descendant_tag(&child, BLOCK_TAGS));
        if inline {
            current.push(child);
        } else if !current.is_empty() {
            groups.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    for group in groups {
        let html: String = group
            .iter()
            .map(|node| {
                if node.is_text() {
                    escape_text(&node.text())
                } else if node.is_element() {
                    Selection::from(*node).html().to_string()
                } else {
                    String::new()
                }
            })
            .collect();
        let html = html.trim();
        if html.is_empty() {
            continue;
        }

        let mut nodes = group.into_iter();
        if let Some(first) = nodes.next() {
            Selection::from(first).replace_with_html(format!("<p>{}</p>", html).as_str());
        }
        for node in nodes {
            Selection::from(node).remove();
        }
    }
}

fn is_empty_paragraph(node: &NodeRef) -> bool {
    has_tag(node, &["p"])
        && !has_descendant_tag(node, MEDIA_TAGS)
        && node.text().replace('\u{a0}', " ").trim().is_empty()
}

fn mark_empty_paragraphs(root: &Selection) {
    for node in element_nodes(root, "p") {
        if is_empty_paragraph(&node) && Selection::from(node).inner_html().to_string() != "<br>" {
            Selection::from(node).set_html("<br>");
        }
    }
}

fn collapse_empty_runs(root: &Selection) {
    for node in element_nodes(root, "p") {
        if !is_empty_paragraph(&node) {
            continue;
        }
        let mut sibling = node.prev_sibling();
        while let Some(prev) = sibling {
            if prev.is_text() && prev.text().trim().is_empty() {
                sibling = prev.prev_sibling();
                continue;
            }
            break;
        }
        if sibling.is_some_and(|prev| is_empty_paragraph(&prev)) {
            Selection::from(node).remove();
        }
    }
}
