//! String-level HTML helpers shared by the extractor, the normalizer and the fillers.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::unique_in_order;

lazy_static! {
    static ref TAG: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref PARAGRAPH_BREAK: Regex = Regex::new(r"\n{2,}").unwrap();
    static ref WECHAT_CDN: Regex =
        Regex::new(r#"(?i)https?://[^"'()\s<>]*?(?:mmbiz\.qpic\.cn|qpic\.cn)[^"'()\s<>]*"#).unwrap();
}

/// Remove tags and collapse whitespace. Entities are left as they are.
pub fn strip_html(html: &str) -> String {
    let text = TAG.replace_all(html, " ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Escape for text content: `&`, `<`, `>`.
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape for attribute values.
pub fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

/// Turn plain text into `<p>` blocks: blank lines split paragraphs, single newlines become `<br>`.
pub fn to_paragraph_html(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    PARAGRAPH_BREAK
        .split(&normalized)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| format!("<p>{}</p>", escape_text(block).replace('\n', "<br>")))
        .collect()
}

/// Undo the one entity that routinely leaks into copied image URLs.
pub fn decode_amp(url: &str) -> String {
    url.replace("&amp;", "&")
}

/// Canonical form of an image URL as found in markup.
pub fn normalize_image_url(raw: &str) -> String {
    let url = decode_amp(raw.trim());
    if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("https://{rest}")
    } else {
        url
    }
}

/// Scan serialized markup for WeChat CDN image URLs.
pub fn collect_cdn_image_urls(html: &str) -> Vec<String> {
    collect_image_urls_matching(html, &WECHAT_CDN)
}

/// Scan serialized markup for URLs matching a CDN pattern.
pub fn collect_image_urls_matching(html: &str, pattern: &Regex) -> Vec<String> {
    unique_in_order(pattern.find_iter(html).map(|m| decode_amp(m.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<p>Hello</p>\n<p>  World </p>"), "Hello World");
        assert_eq!(strip_html("<p><br></p>"), "");
    }

    #[test]
    fn test_to_paragraph_html() {
        assert_eq!(
            to_paragraph_html("first line\nsecond <b>\n\n\n third "),
            "<p>first line<br>second &lt;b&gt;</p><p>third</p>"
        );
        assert_eq!(to_paragraph_html("  \n\n "), "");
    }

    #[test]
    fn test_normalize_image_url() {
        assert_eq!(normalize_image_url("//cdn/a.jpg"), "https://cdn/a.jpg");
        assert_eq!(normalize_image_url("http://cdn/a.jpg?x=1&amp;y=2"), "https://cdn/a.jpg?x=1&y=2");
        assert_eq!(normalize_image_url("data:image/png;base64,AA"), "data:image/png;base64,AA");
    }

    #[test]
    fn test_collect_cdn_image_urls() {
        let html = r#"<div style="background:url(https://mmbiz.qpic.cn/a/640?wx_fmt=png&amp;from=appmsg)"></div>
            <img src="https://mmbiz.qpic.cn/a/640?wx_fmt=png&amp;from=appmsg">
            <img src="https://example.com/b.jpg">"#;
        assert_eq!(
            collect_cdn_image_urls(html),
            vec!["https://mmbiz.qpic.cn/a/640?wx_fmt=png&from=appmsg"]
        );
    }
}
