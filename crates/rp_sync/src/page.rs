//! The operations the filler and the driver need from a composer page.
//!
//! Every DOM step reports success or failure as a value; an `Err` means the
//! page could not be reached at all.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use rp_core::Result;
use serde::{Deserialize, Serialize};

use crate::convergence::ImageSnapshot;
use crate::dedup_guard::UploadDedupGuard;
use crate::download::LocalImage;
use crate::ladder::{InsertOutcome, InsertStrategy};

/// A page element located by one of the finders, valid until the page navigates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Ways of putting content into a rich editor, in the order the filler tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyChannel {
    /// Synthetic paste carrying both HTML and plain text.
    Paste,
    /// `execCommand("insertHTML")`.
    InsertHtml,
    /// `execCommand("insertText")`.
    InsertText,
    /// Overwrite the editor's own text.
    InnerText,
}

impl BodyChannel {
    pub const ORDER: [BodyChannel; 4] = [
        BodyChannel::Paste,
        BodyChannel::InsertHtml,
        BodyChannel::InsertText,
        BodyChannel::InnerText,
    ];
}

#[async_trait]
pub trait ComposerPage: Send + Sync {
    async fn current_url(&self) -> Result<String>;

    async fn navigate(&self, url: &str) -> Result<()>;

    async fn bring_to_front(&self) -> Result<()>;

    /// Number of elements matching `selector` anywhere in the page.
    async fn count_matching(&self, selector: &str) -> Result<usize>;

    /// First visible title-like input among `selectors`.
    async fn find_title(&self, selectors: &[&str]) -> Result<Option<ElementHandle>>;

    /// Best-scoring visible editor among `selectors`.
    async fn find_editor(&self, selectors: &[&str]) -> Result<Option<ElementHandle>>;

    /// Set an input's value through the framework-visible setter and fire input events.
    async fn set_native_value(&self, element: &ElementHandle, value: &str) -> Result<bool>;

    /// Click and focus the editor, hide oversized images and ready it for input.
    async fn prepare_editor(&self, editor: &ElementHandle) -> Result<()>;

    /// Empty the editor, leaving the structure a fresh editor would have.
    async fn clear_editor(&self, editor: &ElementHandle) -> Result<()>;

    /// Put body content in through one channel. Returns whether the channel took it.
    async fn fill_body(&self, editor: &ElementHandle, channel: BodyChannel, html: &str, text: &str) -> Result<bool>;

    /// Paste a plain-text run at the end of the editor.
    async fn paste_text(&self, editor: &ElementHandle, text: &str) -> Result<bool>;

    /// Type text at the caret through the browser's input pipeline.
    async fn type_text(&self, editor: &ElementHandle, text: &str) -> Result<()>;

    async fn editor_text(&self, editor: &ElementHandle) -> Result<String>;

    async fn image_snapshots(&self, editor: &ElementHandle) -> Result<Vec<ImageSnapshot>>;

    /// Remove the editor's images at the given positions. Returns how many went.
    async fn remove_images(&self, editor: &ElementHandle, positions: &[usize]) -> Result<usize>;

    /// Whether the page exposes a structured-editor view through `expression`.
    async fn probe_view(&self, expression: &str) -> Result<bool>;

    async fn insert_image(
        &self,
        editor: &ElementHandle,
        strategy: InsertStrategy,
        image: &LocalImage,
        view_expression: Option<&str>,
    ) -> Result<InsertOutcome>;

    /// Click the first element matching `selector` whose text contains `text`
    /// and not `exclude`.
    async fn click_with_text(&self, selector: &str, text: &str, exclude: Option<&str>) -> Result<bool>;

    async fn upload_files(&self, selector: &str, files: &[PathBuf]) -> Result<()>;

    /// Show a transient message in the page.
    async fn notify(&self, message: &str, is_error: bool) -> Result<()>;

    /// Start refusing duplicate upload requests for the rest of the session.
    async fn install_upload_guard(&self, guard: Arc<UploadDedupGuard>) -> Result<()>;

    async fn remove_upload_guard(&self) -> Result<()>;
}
