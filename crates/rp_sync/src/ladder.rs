//! Ordered image insertion strategies; the first that takes wins.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dedup_guard::{Clock, SystemClock};
use crate::download::LocalImage;
use crate::page::{ComposerPage, ElementHandle};
use crate::probe::discover_view;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InsertStrategy {
    /// Append a decoded image node straight into the editor subtree.
    DirectNode,
    /// Insert an image node through the editor view's transaction API.
    EditorTransaction,
    /// Append raw `<img>` markup.
    RawHtml,
    /// Synthetic drag-and-drop of a file.
    DragDrop,
    /// Synthetic paste of a file.
    ClipboardPaste,
}

impl InsertStrategy {
    pub const LADDER: [InsertStrategy; 5] = [
        InsertStrategy::DirectNode,
        InsertStrategy::EditorTransaction,
        InsertStrategy::RawHtml,
        InsertStrategy::DragDrop,
        InsertStrategy::ClipboardPaste,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InsertStrategy::DirectNode => "direct-node",
            InsertStrategy::EditorTransaction => "editor-transaction",
            InsertStrategy::RawHtml => "raw-html",
            InsertStrategy::DragDrop => "drag-drop",
            InsertStrategy::ClipboardPaste => "clipboard-paste",
        }
    }
}

impl std::fmt::Display for InsertStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "camelCase")]
pub enum InsertOutcome {
    Inserted,
    Failed(String),
    /// The rung declined to run.
    Skipped(String),
}

/// Refuses clipboard pastes that come too quickly or repeat an image.
pub struct PasteLock {
    window: Duration,
    clock: Arc<dyn Clock>,
    locked_until: Option<Instant>,
    pasted: HashSet<String>,
}

impl PasteLock {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            clock,
            locked_until: None,
            pasted: HashSet::new(),
        }
    }

    /// Take the lock for one paste of the image with content hash `hash`.
    pub fn acquire(&mut self, hash: &str) -> std::result::Result<(), &'static str> {
        let now = self.clock.now();
        if self.locked_until.map(|until| until > now).unwrap_or(false) {
            return Err("paste-locked");
        }
        if self.pasted.contains(hash) {
            return Err("duplicate-image");
        }
        self.locked_until = Some(now + self.window);
        self.pasted.insert(hash.to_string());
        Ok(())
    }

    /// Time left until the lock opens again.
    pub fn remaining(&self) -> Duration {
        self.locked_until
            .map(|until| until.saturating_duration_since(self.clock.now()))
            .unwrap_or_default()
    }
}

pub struct InsertionLadder {
    paste_lock: Mutex<PasteLock>,
    retry_gap: Duration,
}

impl InsertionLadder {
    pub fn new(paste_window: Duration) -> Self {
        Self::with_clock(paste_window, Arc::new(SystemClock))
    }

    pub fn with_clock(paste_window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            paste_lock: Mutex::new(PasteLock::new(paste_window, clock)),
            retry_gap: Duration::from_millis(300),
        }
    }

    /// Try every rung in order. Returns the strategy that inserted the image,
    /// or `None` when all of them failed.
    pub async fn insert<P>(&self, page: &P, editor: &ElementHandle, image: &LocalImage) -> Option<InsertStrategy>
    where
        P: ComposerPage + ?Sized,
    {
        for strategy in InsertStrategy::LADDER {
            let outcome = match strategy {
                InsertStrategy::EditorTransaction => match discover_view(page, editor).await {
                    Some(probe) => self.attempt(page, editor, strategy, image, Some(&probe.expression)).await,
                    None => InsertOutcome::Skipped("no editor view".to_string()),
                },
                InsertStrategy::ClipboardPaste => self.paste(page, editor, image).await,
                _ => self.attempt(page, editor, strategy, image, None).await,
            };

            match outcome {
                InsertOutcome::Inserted => {
                    info!("🖼️ Image {} inserted via {}", image.index + 1, strategy);
                    return Some(strategy);
                }
                InsertOutcome::Failed(reason) => {
                    debug!("Image {}: {} failed: {}", image.index + 1, strategy, reason)
                }
                InsertOutcome::Skipped(reason) => {
                    debug!("Image {}: {} skipped: {}", image.index + 1, strategy, reason)
                }
            }
        }

        warn!("❌ Every insertion strategy failed for image {}", image.index + 1);
        None
    }

    async fn attempt<P>(
        &self,
        page: &P,
        editor: &ElementHandle,
        strategy: InsertStrategy,
        image: &LocalImage,
        view: Option<&str>,
    ) -> InsertOutcome
    where
        P: ComposerPage + ?Sized,
    {
        match page.insert_image(editor, strategy, image, view).await {
            Ok(outcome) => outcome,
            Err(e) => InsertOutcome::Failed(e.to_string()),
        }
    }

    async fn paste<P>(&self, page: &P, editor: &ElementHandle, image: &LocalImage) -> InsertOutcome
    where
        P: ComposerPage + ?Sized,
    {
        let mut acquired = self.paste_lock.lock().acquire(&image.sha256);
        if acquired == Err("paste-locked") {
            tokio::time::sleep(self.retry_gap).await;
            acquired = self.paste_lock.lock().acquire(&image.sha256);
        }
        match acquired {
            Ok(()) => self.attempt(page, editor, InsertStrategy::ClipboardPaste, image, None).await,
            Err(reason) => InsertOutcome::Skipped(reason.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup_guard::tests::ManualClock;
    use crate::testing::{local_image, FakeEditor};

    #[test]
    fn test_paste_lock() {
        let clock = Arc::new(ManualClock::new());
        let mut lock = PasteLock::new(Duration::from_secs(3), clock.clone());

        assert_eq!(lock.acquire("aaa"), Ok(()));
        assert_eq!(lock.acquire("bbb"), Err("paste-locked"));
        clock.advance(Duration::from_secs(3));
        assert_eq!(lock.remaining(), Duration::ZERO);
        assert_eq!(lock.acquire("aaa"), Err("duplicate-image"));
        assert_eq!(lock.acquire("bbb"), Ok(()));
    }

    #[tokio::test]
    async fn test_first_rung_wins() {
        let editor = FakeEditor::new();
        let handle = editor.editor_handle();
        let ladder = InsertionLadder::new(Duration::from_secs(3));

        let used = ladder.insert(&editor, &handle, &local_image(0)).await;
        assert_eq!(used, Some(InsertStrategy::DirectNode));
        assert_eq!(editor.image_signatures().len(), 1);
    }

    #[tokio::test]
    async fn test_falls_through_failed_rungs() {
        let editor = FakeEditor::new();
        let handle = editor.editor_handle();
        editor.fail_strategies(&[InsertStrategy::DirectNode, InsertStrategy::RawHtml]);
        let ladder = InsertionLadder::new(Duration::from_secs(3));

        // No view exposed, so the transaction rung is skipped as well.
        let used = ladder.insert(&editor, &handle, &local_image(0)).await;
        assert_eq!(used, Some(InsertStrategy::DragDrop));

        editor.expose_view("window.tiptap?.view");
        let used = ladder.insert(&editor, &handle, &local_image(1)).await;
        assert_eq!(used, Some(InsertStrategy::EditorTransaction));
    }

    #[tokio::test]
    async fn test_paste_rung_refuses_repeats() {
        let editor = FakeEditor::new();
        let handle = editor.editor_handle();
        editor.fail_strategies(&[
            InsertStrategy::DirectNode,
            InsertStrategy::RawHtml,
            InsertStrategy::DragDrop,
        ]);
        let ladder = InsertionLadder::new(Duration::ZERO);

        let image = local_image(0);
        assert_eq!(ladder.insert(&editor, &handle, &image).await, Some(InsertStrategy::ClipboardPaste));
        assert_eq!(ladder.insert(&editor, &handle, &image).await, None);
        assert_eq!(editor.image_signatures().len(), 1);
    }
}
