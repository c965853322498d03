use std::sync::Arc;

use async_trait::async_trait;
use rp_core::{Article, Result};

use crate::config::ExtractConfig;
use crate::extractor::{extract_article, Extraction, ExtractionQuality};
use crate::logging::Logger;
use crate::profile::{utils, ProfileRegistry};
use crate::resolver::ImageResolver;
use crate::source::PageSource;

/// Anything that can turn a URL into an article.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn extract(&self, url: &str) -> Result<Article>;
}

/// Fetch, extract and inline images for one URL at a time.
pub struct Extractor {
    source: Arc<dyn PageSource>,
    profiles: ProfileRegistry,
    config: ExtractConfig,
    logger: Logger,
}

impl Extractor {
    pub fn new(source: Arc<dyn PageSource>, config: ExtractConfig) -> Self {
        Self {
            source,
            profiles: ProfileRegistry::default(),
            config,
            logger: Logger::new().with_prefix("[extract]".to_string()),
        }
    }

    pub fn with_profiles(mut self, profiles: ProfileRegistry) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    /// Extract the article at `url`. Only fetching the page can fail.
    pub async fn extract_url(&self, url: &str) -> Result<Extraction> {
        utils::parse_url(url)?;
        let profile = self.profiles.for_url(url);
        let logger = self.logger.clone().with_prefix(format!("[{}]", profile.name()));

        logger.info(&format!("Extracting {}", url));
        let html = self.source.fetch(url, profile).await?;

        let mut extraction = extract_article(&html, url, profile, &self.config);
        if extraction.quality == ExtractionQuality::Fallback {
            logger.warn("Page structure not recognised, keeping visible text only");
        }

        if self.config.resolve_images && !extraction.article.image_urls.is_empty() {
            let resolver = ImageResolver::new(&self.config)?.with_referer(profile.referer());
            extraction.article = resolver.hydrate(extraction.article).await;

            let unresolved = &extraction.article.unresolved_image_urls;
            if !unresolved.is_empty() {
                logger.warn(&format!(
                    "{} images could not be embedded and still point at their source",
                    unresolved.len()
                ));
            }
        }

        logger.info(&format!(
            "Extracted \"{}\" ({} chars, {} images)",
            extraction.article.title,
            extraction.article.text_content.chars().count(),
            extraction.article.image_count
        ));
        Ok(extraction)
    }
}

#[async_trait]
impl ArticleSource for Extractor {
    async fn extract(&self, url: &str) -> Result<Article> {
        Ok(self.extract_url(url).await?.article)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::SourceProfile;
    use rp_core::Error;

    struct StaticSource(&'static str);

    #[async_trait]
    impl PageSource for StaticSource {
        async fn fetch(&self, _url: &str, _profile: &dyn SourceProfile) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl PageSource for FailingSource {
        async fn fetch(&self, url: &str, _profile: &dyn SourceProfile) -> Result<String> {
            Err(Error::Extraction(format!("cannot reach {}", url)))
        }
    }

    fn config() -> ExtractConfig {
        ExtractConfig {
            resolve_images: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_extract_url() {
        let page = r#"<html><body><h1 id="activity-name">Headline</h1>
            <div id="js_content"><p>Paragraph with enough text.</p>
            <p><img data-src="https://mmbiz.qpic.cn/x.jpg"></p></div></body></html>"#;
        let extractor = Extractor::new(Arc::new(StaticSource(page)), config());

        let extraction = extractor.extract_url("https://mp.weixin.qq.com/s/abc").await.unwrap();
        assert_eq!(extraction.quality, ExtractionQuality::Structured);
        assert_eq!(extraction.article.title, "Headline");
        assert_eq!(extraction.article.image_urls, vec!["https://mmbiz.qpic.cn/x.jpg".to_string()]);
        assert!(extraction.article.unresolved_image_urls.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_and_bad_url() {
        let extractor = Extractor::new(Arc::new(FailingSource), config());
        let err = extractor.extract("https://example.com/a").await.unwrap_err();
        assert!(err.to_string().contains("cannot reach"));

        let err = extractor.extract("not a url").await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
