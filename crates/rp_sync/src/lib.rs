//! Pushing extracted articles into platform composers.
//!
//! [`PlatformFiller`] fills title and body of any supported composer.
//! [`AutomationDriver`] goes further for xiaohongshu: it downloads every image,
//! interleaves text and images in the long-article editor and cleans up the
//! duplicates the editor produces on its own. Both work against the
//! [`ComposerPage`] trait; [`CdpComposerPage`] implements it over a DevTools tab.

pub mod cdp_page;
pub mod cli;
pub mod config;
pub mod convergence;
pub mod dedup_guard;
pub mod download;
pub mod driver;
pub mod filler;
pub mod ladder;
pub mod page;
pub mod probe;
pub mod runner;
pub mod segments;

#[cfg(test)]
mod testing;

pub use cdp_page::CdpComposerPage;
pub use cli::{handle_fill, handle_platforms, handle_sync, FillArgs, SyncArgs};
pub use config::{DriverConfig, DriverDelays, FillConfig};
pub use driver::AutomationDriver;
pub use filler::{FillOutcome, PendingConsumer, PlatformFiller};
pub use page::ComposerPage;
pub use runner::{CdpSyncRunner, SyncRunner};
