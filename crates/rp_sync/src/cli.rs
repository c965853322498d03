use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use rp_core::{Error, PlatformConfig, PublishMode, Result, SyncContent};

use crate::config::{DriverConfig, FillConfig};
use crate::runner::{CdpSyncRunner, SyncRunner};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Upload,
    LongArticle,
}

impl From<ModeArg> for PublishMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Upload => PublishMode::Upload,
            ModeArg::LongArticle => PublishMode::LongArticle,
        }
    }
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Destination platform id (see `platforms`)
    pub platform: String,

    /// JSON file holding the content to publish
    pub content: PathBuf,

    /// Publishing mode; defaults to the one in the content file
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
}

#[derive(Args, Debug)]
pub struct FillArgs {
    /// Destination platform id (see `platforms`)
    pub platform: String,

    /// JSON file holding the content to publish
    pub content: PathBuf,
}

pub fn read_content(path: &Path) -> Result<SyncContent> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&raw)?)
}

pub async fn handle_sync(args: SyncArgs, config: DriverConfig) -> Result<()> {
    let mut content = read_content(&args.content)?;
    if let Some(mode) = args.mode {
        content.publish_mode = mode.into();
    }

    let runner = CdpSyncRunner::new(config, FillConfig::default());
    let report = runner.run(&args.platform, content).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.success {
        Ok(())
    } else {
        Err(Error::Browser(report.message))
    }
}

pub async fn handle_fill(args: FillArgs, config: DriverConfig) -> Result<()> {
    let platform = PlatformConfig::require(&args.platform)?;
    let content = read_content(&args.content)?;

    let runner = CdpSyncRunner::new(config, FillConfig::default());
    let report = runner.fill(platform, &content).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn handle_platforms() {
    for platform in PlatformConfig::all() {
        let limit = platform
            .character_limit
            .map(|n| format!("{} chars", n))
            .unwrap_or_else(|| "no limit".to_string());
        let mode = if platform.supports_automation() {
            "automated"
        } else {
            "form fill"
        };
        println!("{:<12} {:<10} {:<10} {}", platform.id, platform.name, mode, limit);
        println!("             {}", platform.composer_url);
    }
}
