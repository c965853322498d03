//! Helpers over `dom_query` shared by the extractor, cleaner and normalizer.

use dom_query::{Document, NodeRef, Selection};
use rp_core::{Error, Result};

/// Tags that start a new line in the rendered text projection.
const LINE_TAGS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "main", "aside", "blockquote", "pre",
    "ul", "ol", "li", "h1", "h2", "h3", "h4", "h5", "h6", "figure", "figcaption", "table", "tr",
    "dl", "dt", "dd",
];

/// Paragraph-level tags that separate text with a blank line.
const PARAGRAPH_TAGS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre"];

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Parse a markup fragment. The fragment lives inside `<body>`.
pub fn fragment_document(html: &str) -> Document {
    Document::from(format!(
        "<html><head></head><body>{}</body></html>",
        html
    ))
}

/// Root selection of a fragment document.
pub fn fragment_root(doc: &Document) -> Selection<'_> {
    doc.select("body")
}

/// Re-serialize markup through the parser.
pub fn canonical_html(html: &str) -> String {
    let doc = fragment_document(html);
    let html = fragment_root(&doc).inner_html().to_string();
    html
}

/// Reject a selector `dom_query` would choke on.
pub fn validate_selector(selector: &str) -> Result<()> {
    scraper::Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| Error::Extraction(format!("Invalid selector {}: {}", selector, e)))
}

/// Select with a selector that came from configuration, failing instead of panicking.
pub fn checked_select<'a>(scope: &Selection<'a>, selector: &str) -> Result<Selection<'a>> {
    validate_selector(selector)?;
    Ok(scope.select(selector))
}

/// Lowercase tag name of an element node.
pub fn tag_of(node: &NodeRef) -> Option<String> {
    if !node.is_element() {
        return None;
    }
    node.node_name().map(|name| name.to_ascii_lowercase())
}

pub fn has_tag(node: &NodeRef, tags: &[&str]) -> bool {
    tag_of(node).is_some_and(|tag| tags.contains(&tag.as_str()))
}

pub fn has_descendant_tag(node: &NodeRef, tags: &[&str]) -> bool {
    node.descendants().into_iter().any(|d| has_tag(&d, tags))
}

pub fn has_ancestor_tag(node: &NodeRef, tags: &[&str]) -> bool {
    node.ancestors(None).into_iter().any(|a| has_tag(&a, tags))
}

pub fn contains_image(node: &NodeRef) -> bool {
    has_tag(node, &["img"]) || has_descendant_tag(node, &["img"])
}

/// Text of the node's direct text children only.
pub fn own_text(node: &NodeRef) -> String {
    node.children()
        .into_iter()
        .filter(|child| child.is_text())
        .map(|child| child.text().to_string())
        .collect::<Vec<_>>()
        .join("")
}

/// Text as a browser would lay it out: block boundaries become line breaks,
/// `<br>` becomes `\n`, scripts and styles contribute nothing.
pub fn rendered_text(node: &NodeRef) -> String {
    render_with_images(node, &mut |_| None)
}

/// Like [`rendered_text`] but keeps line breaks written in text nodes, the way
/// `textContent` would. Used when markup is really plain text.
pub fn source_text_of(sel: &Selection) -> String {
    let mut out = String::new();
    for node in sel.nodes() {
        render_into(node, &mut out, &mut |_| None, true);
        break_line(&mut out, false);
    }
    finish_text(&out)
}

/// Like [`rendered_text`], asking `on_image` for a placeholder for every `<img>`.
pub fn render_with_images(
    node: &NodeRef,
    on_image: &mut dyn FnMut(&NodeRef) -> Option<String>,
) -> String {
    let mut out = String::new();
    render_into(node, &mut out, on_image, false);
    finish_text(&out)
}

pub fn rendered_text_of(sel: &Selection) -> String {
    sel.nodes()
        .iter()
        .map(rendered_text)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_into(
    node: &NodeRef,
    out: &mut String,
    on_image: &mut dyn FnMut(&NodeRef) -> Option<String>,
    verbatim: bool,
) {
    if node.is_text() {
        let text = node.text();
        if verbatim || has_ancestor_tag(node, &["pre"]) {
            out.push_str(&text);
        } else {
            push_inline(out, &text);
        }
        return;
    }

    let tag = tag_of(node);
    match tag.as_deref() {
        Some(t) if SKIPPED_TAGS.contains(&t) => return,
        Some("br") => {
            out.push('\n');
            return;
        }
        Some("img") => {
            if let Some(placeholder) = on_image(node) {
                out.push_str(&placeholder);
            }
            return;
        }
        _ => {}
    }

    let is_paragraph = tag.as_deref().is_some_and(|t| PARAGRAPH_TAGS.contains(&t));
    let is_line = is_paragraph || tag.as_deref().is_some_and(|t| LINE_TAGS.contains(&t));

    if is_line {
        break_line(out, is_paragraph);
    }
    for child in node.children() {
        render_into(&child, out, on_image, verbatim);
    }
    if is_line {
        break_line(out, is_paragraph);
    }
}

fn push_inline(out: &mut String, text: &str) {
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() && ch != '\u{a0}' {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() && !out.ends_with([' ', '\n']) {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }
    if pending_space && !out.is_empty() && !out.ends_with([' ', '\n']) {
        out.push(' ');
    }
}

fn break_line(out: &mut String, blank: bool) {
    while out.ends_with(' ') {
        out.pop();
    }
    if out.is_empty() {
        return;
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    if blank && !out.ends_with("\n\n") {
        out.push('\n');
    }
}

fn finish_text(raw: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in raw.lines() {
        let line = line.trim_end().trim_start_matches(' ');
        if line.trim().is_empty() {
            if lines.last().is_some_and(|last| !last.is_empty()) {
                lines.push("");
            }
            continue;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_text(html: &str) -> String {
        let doc = fragment_document(html);
        rendered_text_of(&fragment_root(&doc))
    }

    #[test]
    fn test_rendered_text_blocks_and_breaks() {
        assert_eq!(root_text("<p>Hello</p><p>World</p>"), "Hello\n\nWorld");
        assert_eq!(root_text("<div>a<br>b</div><div>c</div>"), "a\nb\nc");
        assert_eq!(root_text("<span>one</span>   <b>two</b>"), "one two");
    }

    #[test]
    fn test_rendered_text_skips_scripts() {
        assert_eq!(root_text("<p>x<script>var a = 1;</script></p><style>p{}</style>"), "x");
    }

    #[test]
    fn test_source_text_keeps_written_breaks() {
        let doc = fragment_document("first\nsecond\n\n<b>third</b>");
        assert_eq!(source_text_of(&fragment_root(&doc)), "first\nsecond\n\nthird");
        assert_eq!(root_text("first\nsecond"), "first second");
    }

    #[test]
    fn test_render_with_images() {
        let doc = fragment_document(r#"<p>before</p><img src="a.png"><p>after</p>"#);
        let root = fragment_root(&doc);
        let node = root.nodes()[0];
        let text = render_with_images(&node, &mut |img| {
            Selection::from(*img).attr("src").map(|src| format!("\n[{}]\n", src))
        });
        assert_eq!(text, "before\n\n[a.png]\n\nafter");
    }

    #[test]
    fn test_own_text() {
        let doc = fragment_document("<div>top <span>inner</span> tail</div>");
        let div = doc.select("div");
        assert_eq!(own_text(&div.nodes()[0]).trim(), "top  tail");
    }

    #[test]
    fn test_checked_select_rejects_bad_selector() {
        let doc = fragment_document("<p>x</p>");
        let root = fragment_root(&doc);
        assert!(checked_select(&root, "p[").is_err());
        assert_eq!(checked_select(&root, "p").unwrap().nodes().len(), 1);
    }

    #[test]
    fn test_canonical_html_is_stable() {
        let once = canonical_html("<p>a<br>b");
        assert_eq!(once, "<p>a<br>b</p>");
        assert_eq!(canonical_html(&once), once);
    }
}
