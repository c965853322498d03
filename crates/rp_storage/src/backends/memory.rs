use std::sync::Arc;

use async_trait::async_trait;
use rp_core::{PendingContent, PendingStore, Result};
use tokio::sync::RwLock;
use tracing::debug;

/// Process-local store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryPendingStore {
    slot: Arc<RwLock<Option<PendingContent>>>,
}

impl MemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PendingStore for MemoryPendingStore {
    async fn put(&self, pending: PendingContent) -> Result<()> {
        debug!("Pending content stored for {} at {}", pending.platform, pending.timestamp);
        *self.slot.write().await = Some(pending);
        Ok(())
    }

    async fn get(&self) -> Result<Option<PendingContent>> {
        Ok(self.slot.read().await.clone())
    }

    async fn remove_if(&self, timestamp: i64) -> Result<bool> {
        let mut slot = self.slot.write().await;
        match slot.as_ref() {
            Some(pending) if pending.timestamp == timestamp => {
                *slot = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
