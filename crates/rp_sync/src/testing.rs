//! Scripted in-memory composer used to drive the filler and the driver without a browser.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use rp_core::Result;

use crate::convergence::ImageSnapshot;
use crate::dedup_guard::UploadDedupGuard;
use crate::download::LocalImage;
use crate::ladder::{InsertOutcome, InsertStrategy};
use crate::page::{BodyChannel, ComposerPage, ElementHandle};

pub(crate) const LOGIN_URL: &str = "https://creator.xiaohongshu.com/login";
const HOME_URL: &str = "https://creator.xiaohongshu.com/new/home";

pub(crate) fn local_image(index: usize) -> LocalImage {
    LocalImage {
        index,
        path: PathBuf::from(format!("/tmp/image_{:03}.jpg", index + 1)),
        mime: "image/jpeg".to_string(),
        sha256: format!("sha-{}", index),
        size: 4,
    }
}

/// Layout an inserted image takes in the fake editor; distinct per image index.
pub(crate) fn inserted_snapshot(index: usize) -> ImageSnapshot {
    ImageSnapshot {
        width: 600 + index as u32,
        height: 400,
        style_width: "100%".to_string(),
        style_min_height: String::new(),
        src: format!("data:image/jpeg;base64,{}", index),
    }
}

#[derive(Default)]
struct State {
    url: String,
    logged_in: bool,
    /// `current_url` calls left before a pending login completes.
    login_countdown: Option<usize>,
    markers: HashMap<String, usize>,
    title_present: bool,
    editor_present: bool,
    title_refused: bool,
    title_value: String,
    editor_text: String,
    images: Vec<ImageSnapshot>,
    snapshot_calls: usize,
    readd: Option<(usize, ImageSnapshot)>,
    failing: HashSet<InsertStrategy>,
    duplicates_per_insert: usize,
    views: Vec<String>,
    refused_channels: HashSet<BodyChannel>,
    silent_channels: HashSet<BodyChannel>,
    strip_pasted_images: bool,
    tabs: Vec<String>,
    notifications: Vec<(String, bool)>,
    clicks: Vec<String>,
    uploads: Vec<Vec<PathBuf>>,
    navigations: Vec<String>,
    guard: Option<Arc<UploadDedupGuard>>,
    guard_removed: bool,
    events: Vec<String>,
}

pub(crate) struct FakeEditor {
    state: Mutex<State>,
}

impl FakeEditor {
    /// A logged-in composer with a title input and an empty editor.
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                url: "https://creator.xiaohongshu.com/publish/publish".to_string(),
                logged_in: true,
                title_present: true,
                editor_present: true,
                ..Default::default()
            }),
        }
    }

    /// A session that lands on the login page and finishes logging in after
    /// `checks` URL reads. `None` never logs in.
    pub(crate) fn logged_out(checks: Option<usize>) -> Self {
        let editor = Self::new();
        {
            let mut state = editor.state.lock();
            state.url = LOGIN_URL.to_string();
            state.logged_in = false;
            state.title_present = false;
            state.login_countdown = checks;
        }
        editor
    }

    pub(crate) fn editor_handle(&self) -> ElementHandle {
        ElementHandle("editor".to_string())
    }

    pub(crate) fn push_images(&self, images: &[ImageSnapshot]) {
        self.state.lock().images.extend_from_slice(images);
    }

    pub(crate) fn image_signatures(&self) -> Vec<String> {
        self.state.lock().images.iter().map(ImageSnapshot::signature).collect()
    }

    /// After the `after`-th snapshot read, the page adds another copy of `image`.
    pub(crate) fn readd_after_snapshots(&self, after: usize, image: ImageSnapshot) {
        self.state.lock().readd = Some((after, image));
    }

    pub(crate) fn fail_strategies(&self, strategies: &[InsertStrategy]) {
        self.state.lock().failing.extend(strategies.iter().copied());
    }

    /// Every successful insertion is followed by `copies` uploads of the page's own.
    pub(crate) fn duplicate_inserts(&self, copies: usize) {
        self.state.lock().duplicates_per_insert = copies;
    }

    pub(crate) fn expose_view(&self, expression: &str) {
        self.state.lock().views.push(expression.to_string());
    }

    pub(crate) fn refuse_channel(&self, channel: BodyChannel) {
        self.state.lock().refused_channels.insert(channel);
    }

    /// The channel reports success but nothing lands in the editor.
    pub(crate) fn silent_channel(&self, channel: BodyChannel) {
        self.state.lock().silent_channels.insert(channel);
    }

    pub(crate) fn strip_pasted_images(&self) {
        self.state.lock().strip_pasted_images = true;
    }

    pub(crate) fn without_title(&self) {
        self.state.lock().title_present = false;
    }

    pub(crate) fn without_editor(&self) {
        self.state.lock().editor_present = false;
    }

    pub(crate) fn refuse_title(&self) {
        self.state.lock().title_refused = true;
    }

    pub(crate) fn set_marker(&self, selector: &str, count: usize) {
        self.state.lock().markers.insert(selector.to_string(), count);
    }

    pub(crate) fn add_tab(&self, text: &str) {
        self.state.lock().tabs.push(text.to_string());
    }

    pub(crate) fn title_value(&self) -> String {
        self.state.lock().title_value.clone()
    }

    pub(crate) fn editor_content(&self) -> String {
        self.state.lock().editor_text.clone()
    }

    pub(crate) fn notifications(&self) -> Vec<(String, bool)> {
        self.state.lock().notifications.clone()
    }

    pub(crate) fn clicks(&self) -> Vec<String> {
        self.state.lock().clicks.clone()
    }

    pub(crate) fn uploads(&self) -> Vec<Vec<PathBuf>> {
        self.state.lock().uploads.clone()
    }

    pub(crate) fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }

    pub(crate) fn guard_installed(&self) -> bool {
        self.state.lock().guard.is_some()
    }

    pub(crate) fn guard_removed(&self) -> bool {
        self.state.lock().guard_removed
    }

    /// Ordered record of text runs (`text:…`) and image insertions (`image:N`).
    pub(crate) fn events(&self) -> Vec<String> {
        self.state.lock().events.clone()
    }
}

fn html_image_count(html: &str) -> usize {
    html.matches("<img").count()
}

#[async_trait]
impl ComposerPage for FakeEditor {
    async fn current_url(&self) -> Result<String> {
        let mut state = self.state.lock();
        if let Some(left) = state.login_countdown {
            if left == 0 {
                state.login_countdown = None;
                state.logged_in = true;
                state.title_present = true;
                state.url = HOME_URL.to_string();
            } else {
                state.login_countdown = Some(left - 1);
            }
        }
        Ok(state.url.clone())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.navigations.push(url.to_string());
        state.url = if state.logged_in {
            url.to_string()
        } else {
            LOGIN_URL.to_string()
        };
        Ok(())
    }

    async fn bring_to_front(&self) -> Result<()> {
        self.state.lock().events.push("front".to_string());
        Ok(())
    }

    async fn count_matching(&self, selector: &str) -> Result<usize> {
        let state = self.state.lock();
        Ok(state.markers.get(selector).copied().unwrap_or(0))
    }

    async fn find_title(&self, _selectors: &[&str]) -> Result<Option<ElementHandle>> {
        let state = self.state.lock();
        Ok(state.title_present.then(|| ElementHandle("title".to_string())))
    }

    async fn find_editor(&self, _selectors: &[&str]) -> Result<Option<ElementHandle>> {
        let state = self.state.lock();
        Ok(state.editor_present.then(|| ElementHandle("editor".to_string())))
    }

    async fn set_native_value(&self, _element: &ElementHandle, value: &str) -> Result<bool> {
        let mut state = self.state.lock();
        if state.title_refused {
            return Ok(false);
        }
        state.title_value = value.to_string();
        Ok(true)
    }

    async fn prepare_editor(&self, _editor: &ElementHandle) -> Result<()> {
        Ok(())
    }

    async fn clear_editor(&self, _editor: &ElementHandle) -> Result<()> {
        let mut state = self.state.lock();
        state.editor_text.clear();
        state.images.clear();
        Ok(())
    }

    async fn fill_body(&self, _editor: &ElementHandle, channel: BodyChannel, html: &str, text: &str) -> Result<bool> {
        let mut state = self.state.lock();
        if state.refused_channels.contains(&channel) {
            return Ok(false);
        }
        if state.silent_channels.contains(&channel) {
            return Ok(true);
        }
        state.editor_text = text.to_string();
        let rich = matches!(channel, BodyChannel::Paste | BodyChannel::InsertHtml);
        if rich && !state.strip_pasted_images {
            let count = html_image_count(html);
            let start = state.images.len();
            state.images.extend((start..start + count).map(inserted_snapshot));
        }
        Ok(true)
    }

    async fn paste_text(&self, _editor: &ElementHandle, text: &str) -> Result<bool> {
        let mut state = self.state.lock();
        state.editor_text.push_str(text);
        state.events.push(format!("text:{}", text));
        Ok(true)
    }

    async fn type_text(&self, _editor: &ElementHandle, text: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.editor_text.push_str(text);
        state.events.push(format!("typed:{}", text));
        Ok(())
    }

    async fn editor_text(&self, _editor: &ElementHandle) -> Result<String> {
        Ok(self.state.lock().editor_text.clone())
    }

    async fn image_snapshots(&self, _editor: &ElementHandle) -> Result<Vec<ImageSnapshot>> {
        let mut state = self.state.lock();
        let snapshots = state.images.clone();
        state.snapshot_calls += 1;
        if let Some((after, image)) = state.readd.clone() {
            if state.snapshot_calls == after {
                state.images.push(image);
                state.readd = None;
            }
        }
        Ok(snapshots)
    }

    async fn remove_images(&self, _editor: &ElementHandle, positions: &[usize]) -> Result<usize> {
        let mut state = self.state.lock();
        let mut positions = positions.to_vec();
        positions.sort_unstable_by(|a, b| b.cmp(a));
        positions.dedup();
        let mut removed = 0;
        for position in positions {
            if position < state.images.len() {
                state.images.remove(position);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn probe_view(&self, expression: &str) -> Result<bool> {
        Ok(self.state.lock().views.iter().any(|v| v == expression))
    }

    async fn insert_image(
        &self,
        _editor: &ElementHandle,
        strategy: InsertStrategy,
        image: &LocalImage,
        view_expression: Option<&str>,
    ) -> Result<InsertOutcome> {
        let mut state = self.state.lock();
        if state.failing.contains(&strategy) {
            return Ok(InsertOutcome::Failed("scripted failure".to_string()));
        }
        if strategy == InsertStrategy::EditorTransaction && view_expression.is_none() {
            return Ok(InsertOutcome::Skipped("no editor view".to_string()));
        }

        let snapshot = inserted_snapshot(image.index);
        for copy in 0..state.duplicates_per_insert {
            let mut duplicate = snapshot.clone();
            duplicate.src = format!("blob:upload-{}-{}", image.index, copy);
            state.images.push(duplicate);
        }
        state.images.push(snapshot);
        state.events.push(format!("image:{}", image.index));
        Ok(InsertOutcome::Inserted)
    }

    async fn click_with_text(&self, _selector: &str, text: &str, exclude: Option<&str>) -> Result<bool> {
        let mut state = self.state.lock();
        let hit = state
            .tabs
            .iter()
            .find(|tab| tab.contains(text) && !exclude.map(|e| tab.contains(e)).unwrap_or(false))
            .cloned();
        Ok(match hit {
            Some(tab) => {
                state.clicks.push(tab);
                true
            }
            None => false,
        })
    }

    async fn upload_files(&self, _selector: &str, files: &[PathBuf]) -> Result<()> {
        self.state.lock().uploads.push(files.to_vec());
        Ok(())
    }

    async fn notify(&self, message: &str, is_error: bool) -> Result<()> {
        self.state.lock().notifications.push((message.to_string(), is_error));
        Ok(())
    }

    async fn install_upload_guard(&self, guard: Arc<UploadDedupGuard>) -> Result<()> {
        self.state.lock().guard = Some(guard);
        Ok(())
    }

    async fn remove_upload_guard(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.guard = None;
        state.guard_removed = true;
        Ok(())
    }
}
