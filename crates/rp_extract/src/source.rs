//! Where rendered page markup comes from.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use rp_browser::{CdpClient, PageSession};
use rp_core::{poll_until, Error, PollPolicy, Result};

use crate::config::ExtractConfig;
use crate::profile::SourceProfile;

const READINESS_JS: &str = include_str!("js/readiness.js");

/// Content counts as rendered once it holds more than this much text.
const READY_TEXT_CHARS: usize = 20;

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Rendered markup of the page at `url`.
    async fn fetch(&self, url: &str, profile: &dyn SourceProfile) -> Result<String>;
}

/// Renders pages in a fresh tab of a debuggable browser.
pub struct BrowserSource {
    endpoint: String,
    readiness: PollPolicy,
}

impl BrowserSource {
    pub fn new(endpoint: impl Into<String>, config: &ExtractConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            readiness: config.readiness,
        }
    }

    async fn render(&self, page: &PageSession, url: &str, profile: &dyn SourceProfile) -> Result<String> {
        page.navigate(url).await?;

        let args = json!({
            "selectors": profile.content_selectors(),
            "minText": READY_TEXT_CHARS,
        });
        let ready = poll_until(self.readiness, |attempt| {
            let args = args.clone();
            async move {
                match page.call_function(READINESS_JS, &args).await {
                    Ok(Value::Bool(true)) => Some(()),
                    Ok(_) => None,
                    Err(e) => {
                        debug!("Readiness probe {} failed: {}", attempt, e);
                        None
                    }
                }
            }
        })
        .await;

        if ready.is_none() {
            // Extract whatever did render.
            warn!("{} ({})", Error::ExtractionTimeout(self.readiness.timeout), url);
        }

        Ok(page.outer_html().await?)
    }
}

#[async_trait]
impl PageSource for BrowserSource {
    async fn fetch(&self, url: &str, profile: &dyn SourceProfile) -> Result<String> {
        let client = CdpClient::connect(&self.endpoint).await?;
        let page = client.new_page().await?;

        let result = self.render(&page, url, profile).await;

        if let Err(e) = client.close_page(&page).await {
            warn!("Failed to close extraction tab: {}", e);
        }
        result
    }
}

/// Plain HTTP fetch for pages that render server-side.
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(config: &ExtractConfig) -> Result<Self> {
        Ok(Self {
            client: config.http_client()?,
        })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch(&self, url: &str, _profile: &dyn SourceProfile) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Extraction(format!("HTTP {} fetching {}", status, url)));
        }
        Ok(response.text().await?)
    }
}
