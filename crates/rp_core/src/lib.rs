pub mod error;
pub mod html;
pub mod noise;
pub mod platform;
pub mod poll;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use platform::PlatformConfig;
pub use poll::{poll_until, PollPolicy};
pub use storage::PendingStore;
pub use types::{
    unique_in_order, Article, PendingContent, PublishMode, SyncContent, SyncDetails, SyncReport,
};
