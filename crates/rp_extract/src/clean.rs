//! Scrubbing of a cloned content container before block emission.

use dom_query::{NodeRef, Selection};
use rp_core::html::normalize_image_url;
use rp_core::noise::{collapse_whitespace, contains_control_words, filter_noise_text, NOISE_ELEMENT_MAX_CHARS};
use rp_core::{unique_in_order, Result};

use crate::dom::{checked_select, contains_image, has_tag, rendered_text};
use crate::profile::SourceProfile;

/// Attributes a lazy-loading page may keep the real image address in, best first.
const IMAGE_SOURCE_ATTRS: &[&str] = &["data-src", "data-original", "data-original-src", "src"];

const NOISE_CANDIDATES: &str = "p, span, div, section, li, a, button, strong, em";

/// Paragraph-like tags only lose their content when every line is chrome.
const PROSE_TAGS: &[&str] = &["p", "li", "section"];

const SCRIPTING: &[&str] = &["script", "style", "noscript", "template"];

/// Run every cleaning pass over `root` and return the image URLs found, in document order.
pub fn clean_container(root: &Selection, profile: &dyn SourceProfile) -> Result<Vec<String>> {
    let image_urls = normalize_images(root);

    remove_matching(root, profile.video_selectors())?;
    remove_matching(root, SCRIPTING)?;
    remove_matching(root, profile.tracking_selectors())?;
    remove_matching(root, profile.hidden_selectors())?;
    let removed = remove_noise_elements(root);
    if removed > 0 {
        tracing::debug!("Removed {} noise elements", removed);
    }

    Ok(image_urls)
}

/// Point every `<img>` at its real address. Images with no address are dropped.
pub fn normalize_images(root: &Selection) -> Vec<String> {
    let images: Vec<NodeRef> = root.select("img").nodes().to_vec();
    let mut urls = Vec::new();

    for node in images {
        let img = Selection::from(node);
        let source = IMAGE_SOURCE_ATTRS.iter().find_map(|attr| {
            img.attr(attr)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        });

        let Some(source) = source else {
            img.remove();
            continue;
        };

        let url = normalize_image_url(&source);
        img.set_attr("src", &url);
        img.remove_attr("data-src");
        img.remove_attr("data-original");
        if url.starts_with("data:") {
            continue;
        }
        img.set_attr("data-original-src", &url);
        urls.push(url);
    }

    unique_in_order(urls)
}

fn remove_matching(root: &Selection, selectors: &[&str]) -> Result<()> {
    for selector in selectors {
        checked_select(root, selector)?.remove();
    }
    Ok(())
}

/// Remove elements whose text is player or follow-button chrome. Returns how many went.
pub fn remove_noise_elements(root: &Selection) -> usize {
    let candidates: Vec<NodeRef> = root.select(NOISE_CANDIDATES).nodes().to_vec();
    let mut removed = 0;

    for node in candidates {
        if contains_image(&node) || !is_chrome(&node) {
            continue;
        }
        Selection::from(node).remove();
        removed += 1;
    }

    removed
}

fn is_chrome(node: &NodeRef) -> bool {
    let text = rendered_text(node);
    if text.trim().is_empty() {
        return false;
    }
    if filter_noise_text(&text).is_empty() {
        return true;
    }
    if has_tag(node, PROSE_TAGS) {
        return false;
    }
    let flat = collapse_whitespace(&text);
    flat.chars().count() <= NOISE_ELEMENT_MAX_CHARS && contains_control_words(&flat)
}
