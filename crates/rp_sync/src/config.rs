use std::time::Duration;

use rp_core::PollPolicy;
use serde::{Deserialize, Serialize};

use rp_browser::DEFAULT_ENDPOINT;

/// Pauses the driver takes to let the composer react.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverDelays {
    pub after_navigation: Duration,
    pub after_login: Duration,
    pub after_tab: Duration,
    pub after_create: Duration,
    pub after_upload: Duration,
    pub after_text: Duration,
    pub after_image: Duration,
}

impl Default for DriverDelays {
    fn default() -> Self {
        Self {
            after_navigation: Duration::from_secs(5),
            after_login: Duration::from_secs(3),
            after_tab: Duration::from_secs(2),
            after_create: Duration::from_secs(3),
            after_upload: Duration::from_secs(5),
            after_text: Duration::from_millis(120),
            after_image: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    pub cdp_endpoint: String,
    pub login: PollPolicy,
    /// Text longer than this is cut and marked with `...`.
    pub text_cap: usize,
    pub convergence_passes: u32,
    pub convergence_gap: Duration,
    pub settle_iterations: u32,
    /// A second upload request inside this window is refused.
    pub upload_window: Duration,
    /// Clipboard-paste insertions inside this window are refused.
    pub paste_lock: Duration,
    pub download_batch: usize,
    pub max_redirects: usize,
    pub download_timeout: Duration,
    pub user_agent: String,
    pub referer: Option<String>,
    pub delays: DriverDelays,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            cdp_endpoint: DEFAULT_ENDPOINT.to_string(),
            login: PollPolicy::from_millis(3_000, 180_000),
            text_cap: 5_000,
            convergence_passes: 3,
            convergence_gap: Duration::from_millis(300),
            settle_iterations: 3,
            upload_window: Duration::from_millis(2_000),
            paste_lock: Duration::from_secs(3),
            download_batch: 3,
            max_redirects: 5,
            download_timeout: Duration::from_secs(30),
            user_agent: rp_extract::config::DEFAULT_USER_AGENT.to_string(),
            referer: Some("https://mp.weixin.qq.com/".to_string()),
            delays: DriverDelays::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillConfig {
    pub poll: PollPolicy,
    /// The editor must show at least this many characters (or the whole text
    /// when shorter) before a fill counts as done.
    pub verify_floor: usize,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            poll: PollPolicy::from_millis(250, 25_000),
            verify_floor: 20,
        }
    }
}

#[cfg(test)]
impl DriverConfig {
    /// No waiting at all, for driving fakes.
    pub(crate) fn immediate() -> Self {
        Self {
            login: PollPolicy::from_millis(1, 5),
            convergence_gap: Duration::ZERO,
            delays: DriverDelays {
                after_navigation: Duration::ZERO,
                after_login: Duration::ZERO,
                after_tab: Duration::ZERO,
                after_create: Duration::ZERO,
                after_upload: Duration::ZERO,
                after_text: Duration::ZERO,
                after_image: Duration::ZERO,
            },
            ..Default::default()
        }
    }
}
