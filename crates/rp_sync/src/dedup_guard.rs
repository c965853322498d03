//! Refuses the composer's second upload request when it follows the first too closely.
//!
//! The guard itself is plain state with an injectable clock. [`InterceptionSession`]
//! wires it to a browser tab through the Fetch domain and is torn down with
//! the sync session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use rp_browser::{PageSession, RequestPattern, RequestPaused, SessionHandle};
use rp_core::{Error, Result};

/// URL fragments that mark the composer's upload endpoints.
const UPLOAD_MARKERS: &[&str] = &["spectrum", "upload", "image"];

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadCategory {
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// A duplicate upload was suppressed. This is the guard working, not a failure.
    Blocked,
}

pub struct UploadDedupGuard {
    window: Duration,
    clock: Arc<dyn Clock>,
    last_seen: Mutex<HashMap<UploadCategory, Instant>>,
    blocked: AtomicUsize,
}

impl UploadDedupGuard {
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, Arc::new(SystemClock))
    }

    pub fn with_clock(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            clock,
            last_seen: Mutex::new(HashMap::new()),
            blocked: AtomicUsize::new(0),
        }
    }

    /// Only state-changing requests to upload-looking URLs are guarded.
    pub fn classify(url: &str, method: &str) -> Option<UploadCategory> {
        if matches!(method.to_ascii_uppercase().as_str(), "GET" | "HEAD" | "OPTIONS") {
            return None;
        }
        let url = url.to_ascii_lowercase();
        UPLOAD_MARKERS
            .iter()
            .any(|marker| url.contains(marker))
            .then_some(UploadCategory::Image)
    }

    pub fn check(&self, url: &str, method: &str) -> GuardDecision {
        let Some(category) = Self::classify(url, method) else {
            return GuardDecision::Allow;
        };

        let now = self.clock.now();
        let mut last_seen = self.last_seen.lock();
        if let Some(previous) = last_seen.get(&category) {
            if now.saturating_duration_since(*previous) < self.window {
                self.blocked.fetch_add(1, Ordering::Relaxed);
                return GuardDecision::Blocked;
            }
        }
        last_seen.insert(category, now);
        GuardDecision::Allow
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.load(Ordering::Relaxed)
    }
}

/// A guard attached to a live tab.
pub struct InterceptionSession {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

impl InterceptionSession {
    pub async fn install(page: &PageSession, guard: Arc<UploadDedupGuard>) -> Result<Self> {
        let mut events = page
            .take_events()
            .ok_or_else(|| Error::Browser("Page events are already being consumed".to_string()))?;

        let patterns = [
            RequestPattern {
                url_pattern: "*".to_string(),
                resource_type: Some("XHR".to_string()),
            },
            RequestPattern {
                url_pattern: "*".to_string(),
                resource_type: Some("Fetch".to_string()),
            },
        ];
        page.call("Fetch.enable", Some(json!({ "patterns": patterns })))
            .await?;

        let handle = page.handle();
        let task_handle = handle.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if event.method.as_deref() != Some("Fetch.requestPaused") {
                    continue;
                }
                let Some(params) = event.params else {
                    continue;
                };
                let paused: RequestPaused = match serde_json::from_value(params) {
                    Ok(paused) => paused,
                    Err(e) => {
                        warn!("Unreadable paused request: {}", e);
                        continue;
                    }
                };

                let result = match guard.check(&paused.request.url, &paused.request.method) {
                    GuardDecision::Allow => {
                        task_handle
                            .call(
                                "Fetch.continueRequest",
                                Some(json!({ "requestId": paused.request_id })),
                            )
                            .await
                    }
                    GuardDecision::Blocked => {
                        info!("🛡️ Blocked duplicate upload: {}", paused.request.url);
                        task_handle
                            .call(
                                "Fetch.failRequest",
                                Some(json!({
                                    "requestId": paused.request_id,
                                    "errorReason": "BlockedByClient"
                                })),
                            )
                            .await
                    }
                };
                if let Err(e) = result {
                    debug!("Could not release request {}: {}", paused.request_id, e);
                }
            }
        });

        Ok(Self { handle, task })
    }

    pub async fn uninstall(self) {
        self.task.abort();
        if let Err(e) = self.handle.call("Fetch.disable", None).await {
            debug!("Fetch.disable failed: {}", e);
        }
    }
}
