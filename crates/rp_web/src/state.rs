use std::sync::Arc;

use rp_core::PendingStore;
use rp_extract::ArticleSource;
use rp_storage::MemoryPendingStore;
use rp_sync::SyncRunner;

pub struct AppState {
    pub runner: Arc<dyn SyncRunner>,
    pub extractor: Arc<dyn ArticleSource>,
    pub pending: Arc<dyn PendingStore>,
}

impl AppState {
    pub fn new(runner: Arc<dyn SyncRunner>, extractor: Arc<dyn ArticleSource>) -> Self {
        Self {
            runner,
            extractor,
            pending: Arc::new(MemoryPendingStore::new()),
        }
    }

    pub fn with_pending_store(mut self, pending: Arc<dyn PendingStore>) -> Self {
        self.pending = pending;
        self
    }
}
