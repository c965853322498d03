use std::time::Duration;

use rp_core::PollPolicy;
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// How long to wait for client-side rendering to fill the content container.
    pub readiness: PollPolicy,
    /// Cap on plain text taken from a page when structured extraction fails.
    pub text_cap: usize,
    /// Images fetched concurrently per batch by the resolver.
    pub batch_size: usize,
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Embed images as data URIs after extraction.
    pub resolve_images: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            readiness: PollPolicy::from_millis(300, 12_000),
            text_cap: 12_000,
            batch_size: 4,
            request_timeout: Duration::from_secs(20),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            resolve_images: true,
        }
    }
}

impl ExtractConfig {
    pub(crate) fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(self.request_timeout)
            .build()
    }
}
