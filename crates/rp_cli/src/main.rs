use std::sync::Arc;

use clap::Parser;
use rp_core::PendingStore;
use rp_extract::{ArticleSource, ExtractArgs, ExtractConfig, Extractor, NormalizeArgs};
use rp_extract::source::{BrowserSource, HttpSource, PageSource};
use rp_storage::MemoryPendingStore;
use rp_sync::{CdpSyncRunner, DriverConfig, FillArgs, FillConfig, SyncArgs, SyncRunner};
use rp_web::{AppState, ServerConfig};
use tracing::{info, Level};

mod duration;

use duration::HumanDuration;

#[derive(Parser, Debug)]
#[command(name = "repost", author, version, about = "Repost articles into platform composers", long_about = None)]
pub struct Cli {
    /// DevTools endpoint of a Chrome started with --remote-debugging-port
    #[arg(long, global = true, default_value = rp_browser::DEFAULT_ENDPOINT)]
    cdp: String,

    /// Log debug output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// How long to wait for a manual login (e.g. 3m, 90s)
    #[arg(long, global = true, default_value = "3m")]
    login_timeout: HumanDuration,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the HTTP sync service
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Extract over plain HTTP instead of the browser
        #[arg(long)]
        http: bool,
    },
    /// Extract one article
    Extract(ExtractArgs),
    /// Normalize HTML for rich-text editors
    Normalize(NormalizeArgs),
    /// Sync content to a platform, driving the composer end to end
    Sync(SyncArgs),
    /// Open a platform composer and fill it
    Fill(FillArgs),
    /// List supported platforms
    Platforms,
}

impl Cli {
    fn driver_config(&self) -> DriverConfig {
        let mut config = DriverConfig {
            cdp_endpoint: self.cdp.clone(),
            ..Default::default()
        };
        config.login.timeout = self.login_timeout.0;
        config
    }
}

async fn serve(
    cdp: String,
    driver: DriverConfig,
    host: Option<String>,
    port: Option<u16>,
    http: bool,
) -> anyhow::Result<()> {
    let defaults = ServerConfig::default();
    let server = ServerConfig {
        host: host.unwrap_or(defaults.host),
        port: port.unwrap_or(defaults.port),
    };

    let extract_config = ExtractConfig::default();
    let source: Arc<dyn PageSource> = if http {
        Arc::new(HttpSource::new(&extract_config)?)
    } else {
        Arc::new(BrowserSource::new(cdp.clone(), &extract_config))
    };
    let extractor: Arc<dyn ArticleSource> = Arc::new(Extractor::new(source, extract_config));

    let pending: Arc<dyn PendingStore> = Arc::new(MemoryPendingStore::new());
    let runner: Arc<dyn SyncRunner> = Arc::new(
        CdpSyncRunner::new(driver, FillConfig::default()).with_pending_store(pending.clone()),
    );

    info!("🔌 Browser endpoint: {}", cdp);
    let state = AppState::new(runner, extractor).with_pending_store(pending);
    rp_web::serve(server, state).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let logger = rp_extract::logging::init_logging(level).with_prefix("[repost]".to_string());
    logger.debug(&format!("Browser endpoint {}", cli.cdp));

    let driver = cli.driver_config();
    match cli.command {
        Commands::Serve { host, port, http } => serve(cli.cdp, driver, host, port, http).await?,
        Commands::Extract(args) => rp_extract::handle_extract(args, &cli.cdp).await?,
        Commands::Normalize(args) => rp_extract::handle_normalize(args)?,
        Commands::Sync(args) => rp_sync::handle_sync(args, driver).await?,
        Commands::Fill(args) => rp_sync::handle_fill(args, driver).await?,
        Commands::Platforms => rp_sync::handle_platforms(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_sync() {
        let cli = Cli::try_parse_from([
            "repost",
            "--login-timeout",
            "90s",
            "sync",
            "xiaohongshu",
            "content.json",
            "--mode",
            "long-article",
        ])
        .unwrap();
        assert_eq!(cli.driver_config().login.timeout, Duration::from_secs(90));
        match cli.command {
            Commands::Sync(args) => {
                assert_eq!(args.platform, "xiaohongshu");
                assert_eq!(args.mode, Some(rp_sync::cli::ModeArg::LongArticle));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["repost", "platforms"]).unwrap();
        assert_eq!(cli.cdp, rp_browser::DEFAULT_ENDPOINT);
        assert_eq!(cli.driver_config().login.timeout, Duration::from_secs(180));
        assert!(!cli.verbose);
    }
}
