//! Fills a composer's title and body on any supported platform.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use rp_core::html::{strip_html, to_paragraph_html};
use rp_core::{poll_until, Error, PendingStore, PlatformConfig, Result, SyncContent};
use rp_extract::original_image_urls;

use crate::config::FillConfig;
use crate::page::{BodyChannel, ComposerPage, ElementHandle};

/// Where a platform's title input and body editor are found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillerProfile {
    pub platform: &'static str,
    pub title_selectors: &'static [&'static str],
    pub editor_selectors: &'static [&'static str],
}

static PROFILES: &[FillerProfile] = &[
    FillerProfile {
        platform: "xiaohongshu",
        title_selectors: &[
            r#"input[placeholder*="标题"]"#,
            r#"textarea[placeholder*="标题"]"#,
            r#"input[placeholder*="请输入标题"]"#,
            ".title-input input",
            ".c-input__inner",
            r#"[data-testid*="title"] input"#,
            r#"[class*="title"] input"#,
        ],
        editor_selectors: &[
            r#"[contenteditable="true"][role="textbox"]"#,
            r#"[contenteditable="true"]"#,
            ".ql-editor",
            r#".DraftEditor-root [contenteditable="true"]"#,
            ".editor-content",
            ".draft-editor",
            r#"textarea[placeholder*="正文"]"#,
        ],
    },
    FillerProfile {
        platform: "zhihu",
        title_selectors: &[
            r#"input[placeholder*="标题"]"#,
            r#"textarea[placeholder*="标题"]"#,
            ".TitleInput input",
            r#"input[class*="title"]"#,
        ],
        editor_selectors: &[".public-DraftEditor-content", r#"[contenteditable="true"]"#],
    },
    FillerProfile {
        platform: "jianshu",
        title_selectors: &[r#"input[placeholder*="标题"]"#, ".title-input input", r#"input[name="title"]"#],
        editor_selectors: &[r#"[contenteditable="true"]"#, ".ql-editor", ".draft-editor", ".editor-content"],
    },
    FillerProfile {
        platform: "toutiao",
        title_selectors: &[
            r#"input[placeholder*="标题"]"#,
            r#"input[placeholder*="请输入标题"]"#,
            ".title-input input",
        ],
        editor_selectors: &[
            r#"[contenteditable="true"]"#,
            ".ql-editor",
            ".editor-content",
            ".mega-editor-content",
        ],
    },
    FillerProfile {
        platform: "bilibili",
        title_selectors: &[r#"input[placeholder*="标题"]"#, ".title-input input", r#"input[name="title"]"#],
        editor_selectors: &[
            r#"[contenteditable="true"]"#,
            ".ql-editor",
            ".editor-content",
            ".braft-editor-content",
        ],
    },
];

impl FillerProfile {
    pub fn for_platform(id: &str) -> Option<&'static FillerProfile> {
        PROFILES.iter().find(|p| p.platform.eq_ignore_ascii_case(id.trim()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillOutcome {
    pub title_filled: bool,
    pub body_filled: bool,
    pub channel: Option<BodyChannel>,
    /// Images were lost on the way in and a link list was appended instead.
    pub image_links_appended: bool,
}

/// Text for link-list fallbacks: `\n\n图片链接：\n1. url…`.
pub fn image_link_list(urls: &[String]) -> String {
    let lines = urls
        .iter()
        .enumerate()
        .map(|(i, url)| format!("{}. {}", i + 1, url))
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n\n图片链接：\n{}", lines)
}

#[derive(Debug, Clone, Default)]
pub struct PlatformFiller {
    config: FillConfig,
}

impl PlatformFiller {
    pub fn new(config: FillConfig) -> Self {
        Self { config }
    }

    /// Fill and report in the page. Errors are also shown to the user there.
    pub async fn fill<P>(&self, page: &P, platform: &PlatformConfig, content: &SyncContent) -> Result<FillOutcome>
    where
        P: ComposerPage + ?Sized,
    {
        let result = self.fill_inner(page, platform, content).await;
        let (message, is_error) = match &result {
            Ok(_) => (format!("内容已自动填充到{}，请检查并发布", platform.name), false),
            Err(e) => (format!("自动填充失败：{}", e), true),
        };
        if let Err(e) = page.notify(&message, is_error).await {
            debug!("Notification failed: {}", e);
        }
        result
    }

    async fn fill_inner<P>(&self, page: &P, platform: &PlatformConfig, content: &SyncContent) -> Result<FillOutcome>
    where
        P: ComposerPage + ?Sized,
    {
        let profile =
            FillerProfile::for_platform(platform.id).ok_or_else(|| Error::UnsupportedPlatform(platform.id.to_string()))?;
        let text = plain_text(content);
        if platform.exceeds_limit(&text) {
            warn!(
                "⚠️ {} characters exceed the {} limit of {:?}",
                text.chars().count(),
                platform.name,
                platform.character_limit
            );
        }

        info!("🚀 Filling {} (text {} chars)", platform.name, text.chars().count());
        let mut outcome = FillOutcome::default();

        let title_selectors = profile.title_selectors;
        let title = poll_until(self.config.poll, move |_| async move {
            page.find_title(title_selectors).await.ok().flatten()
        })
        .await;
        match title {
            Some(title) => outcome.title_filled = self.fill_title(page, &title, &content.title).await,
            None => warn!("⚠️ No title input on {}", platform.name),
        }

        let editor_selectors = profile.editor_selectors;
        let editor = poll_until(self.config.poll, move |_| async move {
            page.find_editor(editor_selectors).await.ok().flatten()
        })
        .await
        .ok_or_else(|| Error::ElementNotFound(format!("editor on {}", platform.name)))?;

        if text.is_empty() && content.body.trim().is_empty() {
            warn!("⚠️ Nothing to put in the body");
            return Ok(outcome);
        }

        let html = if content.body.trim().is_empty() {
            to_paragraph_html(&text)
        } else {
            content.body.clone()
        };
        outcome.channel = self.fill_body(page, &editor, &html, &text).await?;
        outcome.body_filled = outcome.channel.is_some();

        let urls = original_image_urls(&content.body);
        if !urls.is_empty() && page.image_snapshots(&editor).await?.is_empty() {
            info!("Editor dropped {} images, appending their links", urls.len());
            outcome.image_links_appended = page.paste_text(&editor, &image_link_list(&urls)).await?;
        }

        info!(
            "✅ {} filled (title: {}, body: {:?})",
            platform.name, outcome.title_filled, outcome.channel
        );
        Ok(outcome)
    }

    async fn fill_title<P>(&self, page: &P, title: &ElementHandle, value: &str) -> bool
    where
        P: ComposerPage + ?Sized,
    {
        match page.set_native_value(title, value.trim()).await {
            Ok(true) => true,
            Ok(false) => {
                warn!("⚠️ Title input refused the value");
                false
            }
            Err(e) => {
                warn!("⚠️ Title fill failed: {}", e);
                false
            }
        }
    }

    /// Try each channel until the editor shows the text.
    async fn fill_body<P>(&self, page: &P, editor: &ElementHandle, html: &str, text: &str) -> Result<Option<BodyChannel>>
    where
        P: ComposerPage + ?Sized,
    {
        let floor = self.config.verify_floor.min(text.chars().count());
        page.prepare_editor(editor).await?;

        for channel in BodyChannel::ORDER {
            page.clear_editor(editor).await?;
            let taken = match page.fill_body(editor, channel, html, text).await {
                Ok(taken) => taken,
                Err(e) => {
                    debug!("{:?} failed: {}", channel, e);
                    false
                }
            };
            if !taken {
                debug!("{:?} not accepted", channel);
                continue;
            }

            let shown = page.editor_text(editor).await?.trim().chars().count();
            if shown >= floor {
                return Ok(Some(channel));
            }
            debug!("{:?} left {} of {} chars in the editor", channel, shown, floor);
        }

        warn!("❌ No body channel got the text into the editor");
        Ok(None)
    }
}

fn plain_text(content: &SyncContent) -> String {
    let text = if content.text.trim().is_empty() {
        strip_html(&content.body)
    } else {
        content.text.clone()
    };
    text.replace('\u{a0}', " ").replace("\r\n", "\n").trim().to_string()
}

/// Picks up the pending handoff record for one platform and fills it once.
pub struct PendingConsumer {
    store: Arc<dyn PendingStore>,
    filler: PlatformFiller,
    platform: &'static PlatformConfig,
    last_handled: Mutex<i64>,
}

impl PendingConsumer {
    pub fn new(store: Arc<dyn PendingStore>, filler: PlatformFiller, platform: &'static PlatformConfig) -> Self {
        Self {
            store,
            filler,
            platform,
            last_handled: Mutex::new(0),
        }
    }

    pub async fn consume<P>(&self, page: &P) -> Result<Option<FillOutcome>>
    where
        P: ComposerPage + ?Sized,
    {
        self.consume_at(page, chrono::Utc::now().timestamp_millis()).await
    }

    /// Fill from the pending record if it is fresh at `now_millis` and not yet handled.
    pub async fn consume_at<P>(&self, page: &P, now_millis: i64) -> Result<Option<FillOutcome>>
    where
        P: ComposerPage + ?Sized,
    {
        let Some(pending) = self.store.get().await? else {
            return Ok(None);
        };
        if !pending.platform.eq_ignore_ascii_case(self.platform.id) {
            debug!("Pending content is for {}, not {}", pending.platform, self.platform.id);
            return Ok(None);
        }
        if !pending.is_fresh_at(now_millis) {
            debug!("Pending content from {} has expired", pending.timestamp);
            return Ok(None);
        }
        {
            let mut last = self.last_handled.lock();
            if pending.timestamp <= *last {
                return Ok(None);
            }
            *last = pending.timestamp;
        }

        info!("📥 Consuming pending content {}", pending.timestamp);
        let outcome = self.filler.fill(page, self.platform, &pending.content).await;

        if self.store.remove_if(pending.timestamp).await? {
            debug!("Pending content {} removed", pending.timestamp);
        }
        outcome.map(Some)
    }
}
