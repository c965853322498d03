use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// How long a pending handoff stays consumable.
pub const PENDING_TTL: Duration = Duration::from_secs(5 * 60);

/// Extracted unit of content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub author: String,
    pub publish_time: String,
    pub cover: String,
    pub content: String,
    pub text_content: String,
    pub image_urls: Vec<String>,
    pub unresolved_image_urls: Vec<String>,
    pub image_count: usize,
    pub resolved_image_count: usize,
}

impl Article {
    /// Replace the image list, keeping first-seen order and dropping repeats.
    pub fn set_image_urls<I>(&mut self, urls: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.image_urls = unique_in_order(urls);
        let known: HashSet<&str> = self.image_urls.iter().map(String::as_str).collect();
        self.unresolved_image_urls.retain(|u| known.contains(u.as_str()));
        self.recount();
    }

    /// Record the URLs that could not be fetched. Anything not in `image_urls` is ignored.
    pub fn set_unresolved<I>(&mut self, urls: I)
    where
        I: IntoIterator<Item = String>,
    {
        let known: HashSet<&str> = self.image_urls.iter().map(String::as_str).collect();
        let unresolved = unique_in_order(urls)
            .into_iter()
            .filter(|u| known.contains(u.as_str()))
            .collect();
        self.unresolved_image_urls = unresolved;
        self.recount();
    }

    fn recount(&mut self) {
        self.image_count = self.image_urls.len();
        self.resolved_image_count = self.image_count - self.unresolved_image_urls.len();
    }
}

/// Dedupe while preserving first-seen order.
pub fn unique_in_order<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| !item.is_empty() && seen.insert(item.clone()))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PublishMode {
    /// Image-and-note composer: files go through the upload input.
    #[default]
    Upload,
    /// Long-form composer with inline images.
    LongArticle,
}

/// Payload handed to a filler or the automation driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncContent {
    pub title: String,
    pub body: String,
    pub text: String,
    pub text_with_images: String,
    pub image_urls: Vec<String>,
    pub publish_mode: PublishMode,
    pub cover: String,
}

impl SyncContent {
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.body.trim().is_empty() && self.text.trim().is_empty()
    }
}

/// Short-lived handoff record between the sync trigger and a composer tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingContent {
    pub platform: String,
    pub content: SyncContent,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl PendingContent {
    pub fn new(platform: impl Into<String>, content: SyncContent) -> Self {
        Self {
            platform: platform.into(),
            content,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn is_fresh_at(&self, now_millis: i64) -> bool {
        now_millis - self.timestamp < PENDING_TTL.as_millis() as i64
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now().timestamp_millis())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDetails {
    pub title_filled: bool,
    pub content_filled: bool,
    pub images_uploaded: bool,
    pub image_count: usize,
    pub images_inserted: usize,
    pub duplicate_uploads_blocked: usize,
}

/// Outcome of an automation run. Partial fills still report `success`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub success: bool,
    pub message: String,
    pub details: SyncDetails,
}

impl SyncReport {
    pub fn failed(message: impl Into<String>, details: SyncDetails) -> Self {
        Self {
            success: false,
            message: message.into(),
            details,
        }
    }
}
