//! Out-of-page image fetching and inlining.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::future::join_all;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use reqwest::header::{CONTENT_TYPE, REFERER};
use tracing::{debug, info, warn};

use rp_core::html::{decode_amp, escape_attr};
use rp_core::{unique_in_order, Article, Result};

use crate::config::ExtractConfig;

lazy_static! {
    static ref IMG_TAG: Regex = Regex::new(r"(?i)<img\b[^>]*>").unwrap();
    static ref SOURCE_ATTR: Regex =
        Regex::new(r#"(?i)\s(src|data-src|data-original-src|data-img-src)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
    static ref SRC_ATTR: Regex = Regex::new(r#"(?i)(\s)src\s*=\s*(?:"[^"]*"|'[^']*')"#).unwrap();
    static ref ORIGINAL_ATTR: Regex = Regex::new(r"(?i)\sdata-original-src\s*=").unwrap();
    static ref LAZY_ATTRS: Regex =
        Regex::new(r#"(?i)\s+data-(?:src|img-src)\s*=\s*(?:"[^"]*"|'[^']*')"#).unwrap();
}

/// Protocol and encoding variants of an image URL, in the order they are tried.
pub fn candidate_urls(url: &str) -> Vec<String> {
    let raw = url.trim().to_string();
    let decoded = decode_amp(&raw);
    let mut candidates = vec![raw, decoded.clone()];
    if let Some(rest) = decoded.strip_prefix("//") {
        candidates.push(format!("https://{}", rest));
    }
    if let Some(rest) = decoded.strip_prefix("http://") {
        candidates.push(format!("https://{}", rest));
    }
    unique_in_order(candidates)
}

/// MIME type guessed from a URL's path extension.
pub fn guess_mime(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else if path.ends_with(".svg") {
        "image/svg+xml"
    } else {
        "image/jpeg"
    }
}

/// Fetches article images and embeds them as `data:` URIs.
pub struct ImageResolver {
    client: reqwest::Client,
    referer: Option<String>,
    batch_size: usize,
}

impl ImageResolver {
    pub fn new(config: &ExtractConfig) -> Result<Self> {
        Ok(Self {
            client: config.http_client()?,
            referer: None,
            batch_size: config.batch_size.max(1),
        })
    }

    pub fn with_referer(mut self, referer: Option<&str>) -> Self {
        self.referer = referer.map(str::to_string);
        self
    }

    /// Embed every image that can be fetched. Unfetchable URLs are recorded on
    /// the article; their `<img>` tags keep pointing at the original address.
    pub async fn hydrate(&self, mut article: Article) -> Article {
        let urls = article.image_urls.clone();
        if urls.is_empty() {
            article.set_unresolved(Vec::new());
            return article;
        }

        let mut resolved: HashMap<String, String> = HashMap::new();
        let mut unresolved = Vec::new();

        for batch in urls.chunks(self.batch_size) {
            let results = join_all(batch.iter().map(|url| self.resolve_one(url))).await;
            for (url, result) in batch.iter().zip(results) {
                match result {
                    Some(data) => {
                        for candidate in candidate_urls(url) {
                            resolved.entry(candidate).or_insert_with(|| data.clone());
                        }
                    }
                    None => unresolved.push(url.clone()),
                }
            }
        }

        info!(
            "Resolved {}/{} images for {}",
            urls.len() - unresolved.len(),
            urls.len(),
            article.url
        );

        if !resolved.is_empty() {
            article.content = replace_image_sources(&article.content, &resolved);
            if let Some(cover) = lookup(&resolved, &article.cover) {
                article.cover = cover.to_string();
            }
        }
        article.set_unresolved(unresolved);
        article
    }

    async fn resolve_one(&self, url: &str) -> Option<String> {
        for candidate in candidate_urls(url) {
            match self.fetch(&candidate).await {
                Ok(Some(data)) => return Some(data),
                Ok(None) => debug!("Image variant rejected: {}", candidate),
                Err(e) => debug!("Image variant failed: {}: {}", candidate, e),
            }
        }
        warn!("Could not fetch image {}", url);
        None
    }

    async fn fetch(&self, url: &str) -> Result<Option<String>> {
        if url.starts_with("data:") {
            return Ok(Some(url.to_string()));
        }

        let mut request = self.client.get(url);
        if let Some(referer) = &self.referer {
            request = request.header(REFERER, referer);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            debug!("HTTP {} for {}", response.status(), url);
            return Ok(None);
        }

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| guess_mime(url).to_string());
        if !mime.starts_with("image/") {
            return Ok(None);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("data:{};base64,{}", mime, STANDARD.encode(&bytes))))
    }
}

fn lookup<'a>(resolved: &'a HashMap<String, String>, url: &str) -> Option<&'a str> {
    if url.is_empty() {
        return None;
    }
    candidate_urls(url)
        .iter()
        .find_map(|c| resolved.get(c).map(String::as_str))
}

/// Point every `<img>` whose source resolves at its embedded data.
pub fn replace_image_sources(html: &str, resolved: &HashMap<String, String>) -> String {
    IMG_TAG
        .replace_all(html, |caps: &Captures| rewrite_tag(&caps[0], resolved))
        .into_owned()
}

fn rewrite_tag(tag: &str, resolved: &HashMap<String, String>) -> String {
    let sources: Vec<String> = SOURCE_ATTR
        .captures_iter(tag)
        .filter_map(|c| c.get(2).or_else(|| c.get(3)).map(|m| m.as_str().to_string()))
        .filter(|v| !v.trim().is_empty())
        .collect();

    let Some(data) = sources.iter().find_map(|s| lookup(resolved, s)) else {
        return tag.to_string();
    };
    let original = sources
        .iter()
        .find(|s| !s.starts_with("data:"))
        .map(|s| decode_amp(s));

    let mut out = LAZY_ATTRS.replace_all(tag, "").into_owned();
    out = if SRC_ATTR.is_match(&out) {
        SRC_ATTR
            .replace(&out, |c: &Captures| format!("{}src=\"{}\"", &c[1], data))
            .into_owned()
    } else {
        out.replacen("<img", &format!("<img src=\"{}\"", data), 1)
            .replacen("<IMG", &format!("<IMG src=\"{}\"", data), 1)
    };
    if let Some(original) = original {
        if !ORIGINAL_ATTR.is_match(&out) {
            let attr = format!(" data-original-src=\"{}\"", escape_attr(&original));
            out = match out.strip_suffix("/>") {
                Some(head) => format!("{}{} />", head.trim_end(), attr),
                None => match out.strip_suffix('>') {
                    Some(head) => format!("{}{}>", head, attr),
                    None => out,
                },
            };
        }
    }
    out
}
