use async_trait::async_trait;

use crate::types::PendingContent;
use crate::Result;

/// Holder of the single short-lived pending handoff record.
#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Store a record, replacing whatever was pending
    async fn put(&self, pending: PendingContent) -> Result<()>;

    /// Current record, if any
    async fn get(&self) -> Result<Option<PendingContent>>;

    /// Remove the record only if it still carries `timestamp`.
    /// Returns whether something was removed.
    async fn remove_if(&self, timestamp: i64) -> Result<bool>;
}
