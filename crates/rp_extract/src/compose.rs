//! Builds the sync payload from the current editor state.

use dom_query::{NodeRef, Selection};
use rp_core::html::collect_cdn_image_urls;
use rp_core::{unique_in_order, PublishMode, SyncContent};

use crate::dom::{fragment_document, fragment_root, render_with_images, rendered_text_of};
use crate::normalize::normalize;

/// Placeholder marking where image `index` (1-based) sits in the text.
pub fn image_placeholder(index: usize) -> String {
    format!("[图片{}]", index)
}

pub fn build_sync_content(title: &str, body_html: &str, cover: &str, mode: PublishMode) -> SyncContent {
    let body = normalize(body_html);
    let doc = fragment_document(&body);
    let root = fragment_root(&doc);

    let text = rendered_text_of(&root);

    let from_images = root
        .select("img")
        .nodes()
        .iter()
        .filter_map(image_source)
        .collect::<Vec<_>>();
    let image_urls = unique_in_order(from_images.into_iter().chain(collect_cdn_image_urls(&body)));

    let text_with_images = match root.nodes().first() {
        Some(node) => render_with_images(node, &mut |img| {
            let url = image_source(img)?;
            let index = image_urls.iter().position(|u| *u == url)?;
            Some(format!("\n{}\n", image_placeholder(index + 1)))
        }),
        None => String::new(),
    };

    SyncContent {
        title: title.trim().to_string(),
        body,
        text,
        text_with_images,
        image_urls,
        publish_mode: mode,
        cover: cover.trim().to_string(),
    }
}

/// Real (non-embedded) addresses of the body's images, for link-list fallbacks.
pub fn original_image_urls(body_html: &str) -> Vec<String> {
    let doc = fragment_document(body_html);
    let urls = doc
        .select("img")
        .nodes()
        .iter()
        .filter_map(image_source)
        .filter(|url| !url.starts_with("data:"))
        .collect::<Vec<_>>();
    unique_in_order(urls)
}

/// The recoverable original address when there is one, else whatever `src` holds.
fn image_source(node: &NodeRef) -> Option<String> {
    let img = Selection::from(*node);
    let attr = |name: &str| {
        img.attr(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    attr("data-original-src")
        .filter(|v| !v.starts_with("data:"))
        .or_else(|| attr("src"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_image_reuses_placeholder() {
        let body = r#"<p>Intro</p><p><img src="https://cdn/a.png"></p><p>Middle</p>
            <p><img src="data:image/png;base64,AAAA" data-original-src="https://cdn/b.png"></p>
            <p>Again</p><p><img src="https://cdn/a.png"></p>"#;
        let content = build_sync_content(" Title ", body, "", PublishMode::LongArticle);

        assert_eq!(content.title, "Title");
        assert_eq!(
            content.image_urls,
            vec!["https://cdn/a.png".to_string(), "https://cdn/b.png".to_string()]
        );
        assert_eq!(
            content.text_with_images,
            "Intro\n\n[图片1]\n\nMiddle\n\n[图片2]\n\nAgain\n\n[图片1]"
        );
        assert_eq!(content.text, "Intro\n\nMiddle\n\nAgain");
        assert_eq!(content.publish_mode, PublishMode::LongArticle);
    }

    #[test]
    fn test_embedded_only_image_is_listed() {
        let content = build_sync_content("t", r#"<p><img src="data:image/png;base64,AAAA"></p>"#, "", PublishMode::Upload);
        assert_eq!(content.image_urls, vec!["data:image/png;base64,AAAA".to_string()]);
        assert_eq!(content.text_with_images, "[图片1]");
        assert!(original_image_urls(&content.body).is_empty());
    }

    #[test]
    fn test_original_image_urls() {
        let body = r#"<p><img src="data:image/png;base64,AAAA" data-original-src="https://cdn/b.png"><img src="https://cdn/c.png"></p>"#;
        assert_eq!(
            original_image_urls(body),
            vec!["https://cdn/b.png".to_string(), "https://cdn/c.png".to_string()]
        );
    }
}
