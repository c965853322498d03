//! Article extraction over a rendered page snapshot.
//!
//! Everything here works on an owned HTML string, so the same code serves a
//! live browser tab, a plain HTTP fetch or a saved page. Extraction never
//! fails: a page the profile does not understand still yields its visible
//! text, flagged as [`ExtractionQuality::Fallback`].

use dom_query::{Document, Selection};
use scraper::Html;
use serde::Serialize;
use tracing::{debug, warn};

use rp_core::html::{collect_image_urls_matching, escape_text, normalize_image_url, strip_html, to_paragraph_html};
use rp_core::noise::filter_noise_text;
use rp_core::{Article, Error, Result};

use crate::blocks::emit_blocks;
use crate::clean::clean_container;
use crate::config::ExtractConfig;
use crate::dom::{contains_image, fragment_document, fragment_root, rendered_text, rendered_text_of, validate_selector};
use crate::normalize::normalize;
use crate::profile::{utils::resolve_field, Field, SourceProfile, FALLBACK_CONTAINERS};

/// Below this many visible characters, content and text are considered missing.
const MIN_VISIBLE_CHARS: usize = 10;

const TITLE_FALLBACK: &[Field] = &[
    Field::attr("meta[property=\"og:title\"]", "content"),
    Field::text("title"),
];

const DESCRIPTION: &[Field] = &[
    Field::attr("meta[property=\"og:description\"]", "content"),
    Field::attr("meta[name=\"description\"]", "content"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtractionQuality {
    /// The profile's content container was found and cleaned.
    Structured,
    /// The page structure was not recognised; the result is best effort.
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub article: Article,
    pub quality: ExtractionQuality,
}

/// Extract an article from a rendered page.
pub fn extract_article(
    html: &str,
    url: &str,
    profile: &dyn SourceProfile,
    config: &ExtractConfig,
) -> Extraction {
    match try_extract(html, url, profile, config) {
        Ok(extraction) => extraction,
        Err(e) => {
            warn!("Structured extraction failed for {}: {}", url, e);
            Extraction {
                article: visible_text_fallback(html, url, config.text_cap, &e),
                quality: ExtractionQuality::Fallback,
            }
        }
    }
}

fn try_extract(
    html: &str,
    url: &str,
    profile: &dyn SourceProfile,
    config: &ExtractConfig,
) -> Result<Extraction> {
    let meta = Html::parse_document(html);

    let mut article = Article {
        url: url.to_string(),
        ..Default::default()
    };
    article.title = match resolve_field(&meta, profile.title_fields())? {
        Some(title) => title,
        None => resolve_field(&meta, TITLE_FALLBACK)?.unwrap_or_default(),
    };
    article.author = resolve_field(&meta, profile.author_fields())?.unwrap_or_default();
    article.publish_time = resolve_field(&meta, profile.publish_time_fields())?.unwrap_or_default();
    article.cover = resolve_field(&meta, profile.cover_fields())?
        .map(|cover| normalize_image_url(&cover))
        .unwrap_or_default();

    let page = Document::from(html);
    let (container_html, quality) = locate_container(&page, profile)?;
    debug!("Content container for {} located ({:?})", url, quality);

    // Work on a copy so the page itself is never touched.
    let clone = fragment_document(&container_html);
    let root = fragment_root(&clone);
    let root_node = root
        .nodes()
        .first()
        .copied()
        .ok_or_else(|| Error::Extraction("Empty content container".to_string()))?;

    let mut image_urls = clean_container(&root, profile)?;

    let mut content = emit_blocks(&root_node).unwrap_or_else(|| root.inner_html().trim().to_string());
    let mut text = filter_noise_text(&rendered_text(&root_node));
    if quality == ExtractionQuality::Fallback {
        text = truncate_chars(&text, config.text_cap);
    }

    if image_urls.is_empty() {
        if let Some(pattern) = profile.image_url_pattern() {
            image_urls = collect_image_urls_matching(&root.inner_html(), pattern);
        }
    }

    let content_has_image = content.contains("<img");
    if visible_chars(&content) < MIN_VISIBLE_CHARS && !content_has_image && !text.is_empty() {
        content = to_paragraph_html(&text);
    }
    if text.chars().count() < MIN_VISIBLE_CHARS {
        if let Some(description) = resolve_field(&meta, DESCRIPTION)? {
            let description = filter_noise_text(&description);
            if !description.is_empty() {
                text = description;
                if visible_chars(&content) == 0 && !content_has_image {
                    content = to_paragraph_html(&text);
                }
            }
        }
    }

    article.content = normalize(&content);
    article.text_content = text;
    article.set_image_urls(image_urls);

    Ok(Extraction { article, quality })
}

/// Inner markup of the first profile container that holds something, else of
/// the first generic container present.
fn locate_container(page: &Document, profile: &dyn SourceProfile) -> Result<(String, ExtractionQuality)> {
    for selector in profile.content_selectors() {
        validate_selector(selector)?;
        let found = page.select(selector);
        let hit = found
            .nodes()
            .iter()
            .find(|node| contains_image(node) || !rendered_text(node).is_empty());
        if let Some(node) = hit {
            return Ok((Selection::from(*node).inner_html().to_string(), ExtractionQuality::Structured));
        }
    }

    for selector in FALLBACK_CONTAINERS {
        let found = page.select(selector);
        if let Some(node) = found.nodes().first() {
            return Ok((Selection::from(*node).inner_html().to_string(), ExtractionQuality::Fallback));
        }
    }

    Err(Error::Extraction("No content container found".to_string()))
}

/// Whole-page visible text, wrapped as paragraphs.
fn visible_text_fallback(html: &str, url: &str, cap: usize, error: &Error) -> Article {
    let page = Document::from(html);
    let text = filter_noise_text(&rendered_text_of(&page.select("body")));
    let text = truncate_chars(&text, cap);

    let content = if text.is_empty() {
        format!("<p>提取失败: {}</p>", escape_text(&error.to_string()))
    } else {
        normalize(&to_paragraph_html(&text))
    };

    let meta = Html::parse_document(html);
    let title = resolve_field(&meta, TITLE_FALLBACK).ok().flatten().unwrap_or_default();

    Article {
        url: url.to_string(),
        title,
        content,
        text_content: text,
        ..Default::default()
    }
}

fn visible_chars(html: &str) -> usize {
    strip_html(html).chars().filter(|c| !c.is_whitespace()).count()
}

fn truncate_chars(text: &str, cap: usize) -> String {
    match text.char_indices().nth(cap) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
