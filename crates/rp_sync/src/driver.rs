//! End-to-end automation of the xiaohongshu composer, images included.
//!
//! Every page step is best effort: failures are logged and recorded in the
//! report, and the run carries on so the user can finish by hand. Only a
//! missed login or an unreachable page ends the run early.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use rp_core::html::strip_html;
use rp_core::{poll_until, Error, PlatformConfig, PublishMode, Result, SyncContent, SyncDetails, SyncReport};

use crate::config::DriverConfig;
use crate::convergence::{converge, settle};
use crate::dedup_guard::UploadDedupGuard;
use crate::download::{DownloadSet, ImageDownloader};
use crate::ladder::InsertionLadder;
use crate::page::{ComposerPage, ElementHandle};
use crate::segments::{parse_segments, truncate_text, Segment};

pub const CREATOR_HOST: &str = "creator.xiaohongshu.com";

const TITLE_SELECTORS: &[&str] = &[
    r#"input[placeholder*="标题"]"#,
    r#"textarea[placeholder*="标题"]"#,
    ".title-input input",
    r#"input[class*="title"]"#,
    "textarea.d-text",
];

const ARTICLE_EDITOR_SELECTORS: &[&str] = &[
    ".tiptap.ProseMirror",
    r#".ProseMirror[contenteditable="true"]"#,
    r#"[contenteditable="true"][role="textbox"]"#,
    r#"[contenteditable="true"]"#,
    ".ql-editor",
    ".draft-editor",
];

const NOTE_EDITOR_SELECTORS: &[&str] = &[
    r#"[contenteditable="true"][role="textbox"]"#,
    r#"[contenteditable="true"]"#,
    ".ql-editor",
    ".draft-editor",
];

pub(crate) const LOGIN_MARKERS: &str =
    r#".login, [class*="login"], [class*="Login"], .signin, [class*="signin"]"#;
const CREATOR_TAB: &str = ".creator-tab";
pub(crate) const FILE_INPUT: &str = r#"input[type="file"]"#;

/// Phases of one run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Connect,
    LoginCheck,
    LoginWait,
    ModeSelect,
    ClearEditor,
    FillSegmented,
    Converge,
    Done,
}

pub struct AutomationDriver {
    config: DriverConfig,
    downloader: ImageDownloader,
}

impl AutomationDriver {
    pub fn new(config: DriverConfig) -> Result<Self> {
        let downloader = ImageDownloader::new(&config)?;
        Ok(Self { config, downloader })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Download every image of `content` to local files.
    pub async fn prepare(&self, content: &SyncContent) -> Result<DownloadSet> {
        info!("📥 Downloading {} images", content.image_urls.len());
        let downloads = self.downloader.download_all(&content.image_urls).await?;
        info!(
            "Downloaded {}/{} images",
            downloads.downloaded_count(),
            downloads.requested_count()
        );
        Ok(downloads)
    }

    /// Download, then drive `page`. The download directory is gone when this returns.
    pub async fn run<P>(&self, page: &P, content: &SyncContent) -> SyncReport
    where
        P: ComposerPage + ?Sized,
    {
        let downloads = match self.prepare(content).await {
            Ok(downloads) => downloads,
            Err(e) => return SyncReport::failed(e.to_string(), SyncDetails::default()),
        };
        let report = self.drive(page, content, &downloads).await;
        if let Err(e) = downloads.close() {
            debug!("Could not remove image downloads: {}", e);
        }
        report
    }

    pub async fn drive<P>(&self, page: &P, content: &SyncContent, downloads: &DownloadSet) -> SyncReport
    where
        P: ComposerPage + ?Sized,
    {
        let mut details = SyncDetails {
            image_count: downloads.downloaded_count(),
            ..Default::default()
        };

        let result = self.drive_inner(page, content, downloads, &mut details).await;
        if let Err(e) = page.bring_to_front().await {
            debug!("bring_to_front failed: {}", e);
        }

        match result {
            Ok(()) => {
                info!(
                    "✅ Composer filled (title: {}, body: {}, images: {}/{})",
                    details.title_filled, details.content_filled, details.images_inserted, details.image_count
                );
                SyncReport {
                    success: true,
                    message: "内容已填充，请在浏览器中检查并发布".to_string(),
                    details,
                }
            }
            Err(e) => {
                error!("❌ Sync failed: {}", e);
                SyncReport::failed(e.to_string(), details)
            }
        }
    }

    async fn drive_inner<P>(
        &self,
        page: &P,
        content: &SyncContent,
        downloads: &DownloadSet,
        details: &mut SyncDetails,
    ) -> Result<()>
    where
        P: ComposerPage + ?Sized,
    {
        let platform = PlatformConfig::require(rp_core::platform::XIAOHONGSHU)?;
        self.enter(DriverState::Connect);
        self.open_composer(page, platform).await;
        tokio::time::sleep(self.config.delays.after_navigation).await;

        self.enter(DriverState::LoginCheck);
        if self.needs_login(page).await? {
            self.enter(DriverState::LoginWait);
            warn!("🔐 Login required, please log in in the browser window");
            best_effort("bring_to_front", page.bring_to_front().await);
            self.wait_for_login(page).await?;
            info!("✅ Logged in");
            self.open_composer(page, platform).await;
            tokio::time::sleep(self.config.delays.after_login).await;
        }

        self.enter(DriverState::ModeSelect);
        match content.publish_mode {
            PublishMode::LongArticle => self.long_article(page, content, downloads, details).await?,
            PublishMode::Upload => self.upload_note(page, content, downloads, details).await?,
        }

        self.enter(DriverState::Done);
        Ok(())
    }

    fn enter(&self, state: DriverState) {
        debug!("Driver state: {:?}", state);
    }

    async fn open_composer<P>(&self, page: &P, platform: &PlatformConfig)
    where
        P: ComposerPage + ?Sized,
    {
        info!("🌐 Opening {}", platform.composer_url);
        if let Err(e) = page.navigate(platform.composer_url).await {
            warn!("⚠️ Navigation warning: {}", e);
        }
    }

    async fn needs_login<P>(&self, page: &P) -> Result<bool>
    where
        P: ComposerPage + ?Sized,
    {
        let url = page.current_url().await?;
        let mut needs = is_login_url(&url);
        if page.count_matching(LOGIN_MARKERS).await? > 0 {
            needs = true;
        }
        if page.find_title(TITLE_SELECTORS).await?.is_some() {
            needs = false;
        }
        Ok(needs)
    }

    async fn wait_for_login<P>(&self, page: &P) -> Result<()>
    where
        P: ComposerPage + ?Sized,
    {
        let policy = self.config.login;
        let logged_in = poll_until(policy, move |attempt| async move {
            if attempt > 0 && attempt % 5 == 0 {
                info!("⏳ Waiting for login... ({:?})", policy.interval * attempt);
            }
            let url = page.current_url().await.ok()?;
            if is_login_url(&url) {
                return None;
            }
            page.find_title(TITLE_SELECTORS).await.ok().flatten().map(|_| ())
        })
        .await;
        logged_in.ok_or(Error::LoginTimeout(policy.timeout))
    }

    async fn fill_title<P>(&self, page: &P, title: &str) -> bool
    where
        P: ComposerPage + ?Sized,
    {
        let input = match page.find_title(TITLE_SELECTORS).await {
            Ok(Some(input)) => input,
            Ok(None) => {
                warn!("⚠️ Title input not found");
                return false;
            }
            Err(e) => {
                warn!("⚠️ Title lookup failed: {}", e);
                return false;
            }
        };
        match page.set_native_value(&input, title.trim()).await {
            Ok(true) => {
                info!("✅ Title filled");
                true
            }
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

    async fn find_editor<P>(&self, page: &P, selectors: &[&str]) -> Option<ElementHandle>
    where
        P: ComposerPage + ?Sized,
    {
        match page.find_editor(selectors).await {
            Ok(Some(editor)) => Some(editor),
            Ok(None) => {
                warn!("⚠️ Body editor not found");
                None
            }
            Err(e) => {
                warn!("⚠️ Body editor lookup failed: {}", e);
                None
            }
        }
    }

    async fn long_article<P>(
        &self,
        page: &P,
        content: &SyncContent,
        downloads: &DownloadSet,
        details: &mut SyncDetails,
    ) -> Result<()>
    where
        P: ComposerPage + ?Sized,
    {
        let delays = &self.config.delays;
        if best_effort("long article tab", page.click_with_text(CREATOR_TAB, "写长文", None).await) {
            tokio::time::sleep(delays.after_tab).await;
        } else {
            warn!("⚠️ Long article tab not found");
        }
        if best_effort("new creation", page.click_with_text("button", "新的创作", None).await) {
            tokio::time::sleep(delays.after_create).await;
        }

        details.title_filled = self.fill_title(page, &content.title).await;

        let source = if content.text_with_images.trim().is_empty() {
            plain_text(content)
        } else {
            content.text_with_images.clone()
        };
        let segments = parse_segments(&truncate_text(&source, self.config.text_cap), content.image_urls.len());
        let target = segments
            .iter()
            .filter(|s| matches!(s, Segment::Image(i) if downloads.get(*i).is_some()))
            .count();
        info!("🧩 {} segments, {} images to insert", segments.len(), target);

        let Some(editor) = self.find_editor(page, ARTICLE_EDITOR_SELECTORS).await else {
            return Ok(());
        };

        let guard = Arc::new(UploadDedupGuard::new(self.config.upload_window));
        best_effort("upload guard", page.install_upload_guard(guard.clone()).await);

        let filled = self
            .fill_segments(page, &editor, &segments, downloads, target, details)
            .await;

        best_effort("upload guard removal", page.remove_upload_guard().await);
        details.duplicate_uploads_blocked = guard.blocked_count();
        if details.duplicate_uploads_blocked > 0 {
            info!("🛡️ {} duplicate uploads blocked", details.duplicate_uploads_blocked);
        }

        match filled {
            Ok(()) => {
                details.content_filled = true;
                details.images_uploaded = details.images_inserted > 0;
            }
            Err(e) => warn!("⚠️ Body fill failed: {}", e),
        }
        Ok(())
    }

    async fn fill_segments<P>(
        &self,
        page: &P,
        editor: &ElementHandle,
        segments: &[Segment],
        downloads: &DownloadSet,
        target: usize,
        details: &mut SyncDetails,
    ) -> Result<()>
    where
        P: ComposerPage + ?Sized,
    {
        let config = &self.config;
        let ladder = InsertionLadder::new(config.paste_lock);

        self.enter(DriverState::ClearEditor);
        page.prepare_editor(editor).await?;
        page.clear_editor(editor).await?;

        self.enter(DriverState::FillSegmented);
        let mut expected = 0;
        for segment in segments {
            match segment {
                Segment::Text(text) => {
                    if !page.paste_text(editor, text).await? {
                        warn!("⚠️ Text segment was not accepted");
                    }
                    tokio::time::sleep(config.delays.after_text).await;
                }
                Segment::Image(index) => {
                    let Some(image) = downloads.get(*index) else {
                        debug!("Image {} was not downloaded, skipping", index + 1);
                        continue;
                    };
                    expected += 1;
                    if ladder.insert(page, editor, image).await.is_some() {
                        details.images_inserted += 1;
                    }
                    tokio::time::sleep(config.delays.after_image).await;

                    let removed = converge(page, editor, expected, config.convergence_passes, config.convergence_gap).await?;
                    if removed > 0 {
                        info!("🧹 Removed {} duplicate images after image {}", removed, index + 1);
                    }
                }
            }
        }

        self.enter(DriverState::Converge);
        let removed = settle(page, editor, target, config.settle_iterations, config.convergence_gap).await?;
        if removed > 0 {
            info!("🧹 Final settle removed {} images (target {})", removed, target);
        }
        Ok(())
    }

    async fn upload_note<P>(
        &self,
        page: &P,
        content: &SyncContent,
        downloads: &DownloadSet,
        details: &mut SyncDetails,
    ) -> Result<()>
    where
        P: ComposerPage + ?Sized,
    {
        let delays = &self.config.delays;
        if best_effort("upload tab", page.click_with_text(CREATOR_TAB, "上传图文", Some("视频")).await) {
            tokio::time::sleep(delays.after_create).await;
        } else {
            warn!("⚠️ Image note tab not found");
        }

        if downloads.downloaded_count() > 0 {
            tokio::time::sleep(delays.after_tab).await;
            if best_effort("file input lookup", page.count_matching(FILE_INPUT).await) > 0 {
                let files = downloads.paths();
                match page.upload_files(FILE_INPUT, &files).await {
                    Ok(()) => {
                        info!("📤 Uploaded {} images", files.len());
                        details.images_uploaded = true;
                        details.images_inserted = files.len();
                        tokio::time::sleep(delays.after_upload).await;
                    }
                    Err(e) => warn!("⚠️ Image upload failed: {}", e),
                }
            } else {
                warn!("⚠️ No image upload input found");
            }
        }

        details.title_filled = self.fill_title(page, &content.title).await;

        let Some(editor) = self.find_editor(page, NOTE_EDITOR_SELECTORS).await else {
            return Ok(());
        };
        let text = truncate_text(&plain_text(content), self.config.text_cap);
        let typed = async {
            page.prepare_editor(&editor).await?;
            page.clear_editor(&editor).await?;
            page.type_text(&editor, &text).await
        };
        match typed.await {
            Ok(()) => details.content_filled = true,
            Err(e) => warn!("⚠️ Body fill failed: {}", e),
        }
        Ok(())
    }
}

fn is_login_url(url: &str) -> bool {
    url.contains("login") || url.contains("signin") || !url.contains(CREATOR_HOST)
}

fn plain_text(content: &SyncContent) -> String {
    if content.text.trim().is_empty() {
        strip_html(&content.body)
    } else {
        content.text.trim().to_string()
    }
}

fn best_effort<T: Default>(what: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        warn!("⚠️ {} failed: {}", what, e);
        T::default()
    })
}
