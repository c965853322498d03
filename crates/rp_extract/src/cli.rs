use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use rp_core::{Error, Result};

use crate::config::ExtractConfig;
use crate::extractor::ExtractionQuality;
use crate::normalize::normalize;
use crate::pipeline::Extractor;
use crate::source::{BrowserSource, HttpSource, PageSource};

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Article URL
    pub url: String,

    /// Fetch over plain HTTP instead of rendering in the browser
    #[arg(long)]
    pub http: bool,

    /// Keep images pointing at their source instead of embedding them
    #[arg(long)]
    pub no_images: bool,

    /// Print the article as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// HTML file to normalize; reads stdin when omitted
    pub file: Option<PathBuf>,
}

pub async fn handle_extract(args: ExtractArgs, cdp_endpoint: &str) -> Result<()> {
    let config = ExtractConfig {
        resolve_images: !args.no_images,
        ..Default::default()
    };
    let source: Arc<dyn PageSource> = if args.http {
        Arc::new(HttpSource::new(&config)?)
    } else {
        Arc::new(BrowserSource::new(cdp_endpoint, &config))
    };

    let extraction = Extractor::new(source, config).extract_url(&args.url).await?;
    let article = extraction.article;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&article)?);
        return Ok(());
    }

    let emoji = match extraction.quality {
        ExtractionQuality::Structured => "📰",
        ExtractionQuality::Fallback => "⚠️",
    };
    println!("{} {}", emoji, article.title);
    if !article.author.is_empty() || !article.publish_time.is_empty() {
        println!("   {} {}", article.author, article.publish_time);
    }
    println!(
        "🖼️  {} images, {} embedded",
        article.image_count, article.resolved_image_count
    );
    for url in &article.unresolved_image_urls {
        println!("   ❌ {}", url);
    }
    println!();
    println!("{}", article.text_content);
    Ok(())
}

pub fn handle_normalize(args: NormalizeArgs) -> Result<()> {
    let html = match args.file {
        Some(path) => std::fs::read_to_string(&path)
            .map_err(|e| Error::Extraction(format!("Failed to read {}: {}", path.display(), e)))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    println!("{}", normalize(&html));
    Ok(())
}
