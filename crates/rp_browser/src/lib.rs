//! Chrome DevTools Protocol client.
//!
//! Connects to a Chrome instance started with `--remote-debugging-port` over the
//! browser WebSocket and multiplexes flattened page sessions on it.
//!
//! ```rust,ignore
//! let client = CdpClient::connect("http://127.0.0.1:9222").await?;
//! let page = client.new_page().await?;
//! page.navigate("https://example.com").await?;
//! let html = page.outer_html().await?;
//! client.close_page(&page).await?;
//! ```

mod client;
mod error;
mod protocol;
mod session;

pub use client::CdpClient;
pub use error::CdpError;
pub use protocol::*;
pub use session::{PageSession, SessionHandle};

/// Default debugging endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:9222";
