//! Reconciles the editor's images against the number that should be there.
//!
//! The destination editor may still be swapping a just-inserted image for its
//! own uploaded copy, so duplicates are told apart by layout rather than by
//! source URL.

use std::collections::HashSet;
use std::time::Duration;

use rp_core::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::page::{ComposerPage, ElementHandle};

/// Layout facts about one editor image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageSnapshot {
    pub width: u32,
    pub height: u32,
    pub style_width: String,
    pub style_min_height: String,
    pub src: String,
}

impl ImageSnapshot {
    /// `{width}x{height}_{styleWidth}_{styleMinHeight}`, with `0` for missing style values.
    pub fn signature(&self) -> String {
        fn or_zero(value: &str) -> &str {
            let value = value.trim();
            if value.is_empty() {
                "0"
            } else {
                value
            }
        }
        format!(
            "{}x{}_{}_{}",
            self.width,
            self.height,
            or_zero(&self.style_width),
            or_zero(&self.style_min_height)
        )
    }

    /// An image that has not been laid out yet says nothing about its identity.
    pub fn has_layout(&self) -> bool {
        self.signature() != "0x0_0_0"
    }

    fn identity(&self, position: usize) -> String {
        if self.has_layout() {
            self.signature()
        } else if !self.src.is_empty() {
            format!("src:{}", self.src)
        } else {
            format!("position:{}", position)
        }
    }
}

/// Positions to remove so that no identity repeats and at most `expected` remain.
///
/// Later copies of an identity go first, then surplus images from the end.
pub fn plan_removals(snapshots: &[ImageSnapshot], expected: usize) -> Vec<usize> {
    let mut seen = HashSet::new();
    let mut removals = Vec::new();
    let mut kept = Vec::new();

    for (position, snapshot) in snapshots.iter().enumerate() {
        if seen.insert(snapshot.identity(position)) {
            kept.push(position);
        } else {
            removals.push(position);
        }
    }
    if kept.len() > expected {
        removals.extend_from_slice(&kept[expected..]);
    }

    removals.sort_unstable();
    removals
}

/// Run `passes` reconciliation passes `gap` apart. Returns the number of images removed.
pub async fn converge<P>(page: &P, editor: &ElementHandle, expected: usize, passes: u32, gap: Duration) -> Result<usize>
where
    P: ComposerPage + ?Sized,
{
    let mut removed = 0;
    for pass in 0..passes {
        let snapshots = page.image_snapshots(editor).await?;
        let plan = plan_removals(&snapshots, expected);
        if !plan.is_empty() {
            debug!(
                "Convergence pass {}: {} images, expected {}, removing {:?}",
                pass + 1,
                snapshots.len(),
                expected,
                plan
            );
            removed += page.remove_images(editor, &plan).await?;
        }
        if pass + 1 < passes && !gap.is_zero() {
            tokio::time::sleep(gap).await;
        }
    }
    Ok(removed)
}

/// Final reconciliation: stop once the count matches `target` or a pass removes nothing.
pub async fn settle<P>(page: &P, editor: &ElementHandle, target: usize, iterations: u32, gap: Duration) -> Result<usize>
where
    P: ComposerPage + ?Sized,
{
    let mut removed = 0;
    for _ in 0..iterations {
        let snapshots = page.image_snapshots(editor).await?;
        if snapshots.len() == target {
            break;
        }
        let plan = plan_removals(&snapshots, target);
        if plan.is_empty() {
            break;
        }
        removed += page.remove_images(editor, &plan).await?;
        if !gap.is_zero() {
            tokio::time::sleep(gap).await;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEditor;

    fn snap(width: u32, height: u32) -> ImageSnapshot {
        ImageSnapshot {
            width,
            height,
            style_width: "100%".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_signature() {
        assert_eq!(snap(640, 480).signature(), "640x480_100%_0");
        assert!(!ImageSnapshot::default().has_layout());
    }

    #[test]
    fn test_plan_removes_duplicates_then_surplus() {
        let snapshots = vec![snap(1, 1), snap(2, 2), snap(1, 1), snap(3, 3), snap(4, 4)];
        assert_eq!(plan_removals(&snapshots, 3), vec![2, 4]);
        assert_eq!(plan_removals(&snapshots, 10), vec![2]);
        assert_eq!(plan_removals(&snapshots, 0), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_unlaid_images_compare_by_source() {
        let a = ImageSnapshot {
            src: "blob:a".to_string(),
            ..Default::default()
        };
        let blank = ImageSnapshot::default();
        let snapshots = vec![a.clone(), a, blank.clone(), blank];
        assert_eq!(plan_removals(&snapshots, 10), vec![1]);
    }

    #[tokio::test]
    async fn test_converge_restores_expected_count() {
        let editor = FakeEditor::new();
        let handle = editor.editor_handle();
        editor.push_images(&[snap(10, 10), snap(20, 20), snap(20, 20), snap(20, 20)]);

        let removed = converge(&editor, &handle, 2, 3, Duration::ZERO).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(editor.image_signatures(), vec!["10x10_100%_0", "20x20_100%_0"]);
    }

    #[tokio::test]
    async fn test_converge_catches_late_duplicates() {
        let editor = FakeEditor::new();
        let handle = editor.editor_handle();
        editor.push_images(&[snap(10, 10)]);
        // The page's own pipeline re-adds a copy after the first pass looks.
        editor.readd_after_snapshots(1, snap(10, 10));

        converge(&editor, &handle, 1, 3, Duration::ZERO).await.unwrap();
        assert_eq!(editor.image_signatures().len(), 1);
    }

    #[tokio::test]
    async fn test_settle_stops_at_target() {
        let editor = FakeEditor::new();
        let handle = editor.editor_handle();
        editor.push_images(&[snap(1, 1), snap(2, 2), snap(3, 3)]);

        assert_eq!(settle(&editor, &handle, 3, 3, Duration::ZERO).await.unwrap(), 0);
        assert_eq!(settle(&editor, &handle, 2, 3, Duration::ZERO).await.unwrap(), 1);
        assert_eq!(editor.image_signatures().len(), 2);
    }
}
