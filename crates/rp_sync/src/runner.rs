//! Entry points that connect to the browser and run a sync for one platform.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use rp_browser::{CdpClient, PageSession};
use rp_core::{PendingContent, PendingStore, PlatformConfig, Result, SyncContent, SyncDetails, SyncReport};

use crate::cdp_page::CdpComposerPage;
use crate::config::{DriverConfig, FillConfig};
use crate::driver::{AutomationDriver, CREATOR_HOST};
use crate::filler::{FillOutcome, PendingConsumer, PlatformFiller};

/// Runs one sync end to end. Never fails: problems end up in the report.
#[async_trait]
pub trait SyncRunner: Send + Sync {
    async fn run(&self, platform: &str, content: SyncContent) -> SyncReport;
}

/// Drives a Chrome instance reachable over the DevTools protocol.
#[derive(Clone, Default)]
pub struct CdpSyncRunner {
    driver: DriverConfig,
    fill: FillConfig,
    pending: Option<Arc<dyn PendingStore>>,
}

impl CdpSyncRunner {
    pub fn new(driver: DriverConfig, fill: FillConfig) -> Self {
        Self {
            driver,
            fill,
            pending: None,
        }
    }

    /// Hand content to form fills through `store` instead of passing it directly.
    pub fn with_pending_store(mut self, store: Arc<dyn PendingStore>) -> Self {
        self.pending = Some(store);
        self
    }

    pub fn driver_config(&self) -> &DriverConfig {
        &self.driver
    }

    async fn automate(&self, content: &SyncContent) -> Result<SyncReport> {
        let driver = AutomationDriver::new(self.driver.clone())?;
        let downloads = driver.prepare(content).await?;

        let result = async {
            let client = CdpClient::connect(&self.driver.cdp_endpoint).await?;
            let session = client.find_or_new_page(CREATOR_HOST).await?;
            let page = CdpComposerPage::new(session);
            let report = driver.drive(&page, content, &downloads).await;
            client.detach(page.session()).await;
            Ok::<_, rp_core::Error>(report)
        }
        .await;

        if let Err(e) = downloads.close() {
            debug!("Could not remove image downloads: {}", e);
        }
        result
    }

    /// Run the form filler only, whatever the platform supports.
    pub async fn fill(&self, platform: &'static PlatformConfig, content: &SyncContent) -> Result<SyncReport> {
        if let Some(store) = &self.pending {
            store.put(PendingContent::new(platform.id, content.clone())).await?;
        }

        let client = CdpClient::connect(&self.driver.cdp_endpoint).await?;
        let session = open_composer(&client, platform).await?;
        let page = CdpComposerPage::new(session);
        let filler = PlatformFiller::new(self.fill.clone());
        let result = match &self.pending {
            Some(store) => PendingConsumer::new(store.clone(), filler, platform)
                .consume(&page)
                .await
                .map(|outcome| outcome.unwrap_or_default()),
            None => filler.fill(&page, platform, content).await,
        };
        client.detach(page.session()).await;
        Ok(fill_report(platform, result?))
    }
}

#[async_trait]
impl SyncRunner for CdpSyncRunner {
    async fn run(&self, platform: &str, content: SyncContent) -> SyncReport {
        let platform = match PlatformConfig::require(platform) {
            Ok(platform) => platform,
            Err(e) => return SyncReport::failed(e.to_string(), SyncDetails::default()),
        };
        info!("🚀 Syncing \"{}\" to {}", content.title, platform.name);

        let result = if platform.supports_automation() {
            self.automate(&content).await
        } else {
            self.fill(platform, &content).await
        };
        result.unwrap_or_else(|e| {
            warn!("❌ Sync to {} failed: {}", platform.name, e);
            SyncReport::failed(e.to_string(), SyncDetails::default())
        })
    }
}

async fn open_composer(client: &CdpClient, platform: &PlatformConfig) -> Result<PageSession> {
    let host = platform
        .composer_url
        .split('/')
        .nth(2)
        .unwrap_or(platform.composer_url);
    let session = client.find_or_new_page(host).await?;
    info!("🌐 Opening {}", platform.composer_url);
    session.navigate(platform.composer_url).await?;
    session.bring_to_front().await?;
    Ok(session)
}

/// Summarize a filler run in the report shape the driver uses.
pub fn fill_report(platform: &PlatformConfig, outcome: FillOutcome) -> SyncReport {
    let message = if outcome.body_filled {
        format!("内容已自动填充到{}，请检查并发布", platform.name)
    } else {
        format!("{}编辑器未能确认内容，请手动检查", platform.name)
    };
    SyncReport {
        success: outcome.body_filled,
        message,
        details: SyncDetails {
            title_filled: outcome.title_filled,
            content_filled: outcome.body_filled,
            ..Default::default()
        },
    }
}
