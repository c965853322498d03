//! Fetches every image to a local file before the composer is touched.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::future::join_all;
use reqwest::header::{CONTENT_TYPE, REFERER};
use reqwest::redirect::Policy;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tracing::{info, warn};

use rp_core::{Error, Result};
use rp_extract::resolver::guess_mime;

use crate::config::DriverConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImage {
    /// Zero-based position in the content's image list.
    pub index: usize,
    pub path: PathBuf,
    pub mime: String,
    pub sha256: String,
    pub size: usize,
}

impl LocalImage {
    pub fn data_url(&self) -> Result<String> {
        let bytes = std::fs::read(&self.path)?;
        Ok(format!("data:{};base64,{}", self.mime, STANDARD.encode(bytes)))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("image_{:03}", self.index + 1))
    }
}

/// Downloaded images, positionally aligned with the requested URLs.
///
/// The backing directory is removed when the set is dropped.
pub struct DownloadSet {
    dir: TempDir,
    images: Vec<Option<LocalImage>>,
}

impl DownloadSet {
    pub fn get(&self, index: usize) -> Option<&LocalImage> {
        self.images.get(index).and_then(Option::as_ref)
    }

    pub fn available(&self) -> impl Iterator<Item = &LocalImage> {
        self.images.iter().flatten()
    }

    pub fn downloaded_count(&self) -> usize {
        self.available().count()
    }

    pub fn requested_count(&self) -> usize {
        self.images.len()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.available().map(|image| image.path.clone()).collect()
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn close(self) -> Result<()> {
        self.dir.close()?;
        Ok(())
    }
}

pub struct ImageDownloader {
    client: reqwest::Client,
    referer: Option<String>,
    batch_size: usize,
}

impl ImageDownloader {
    pub fn new(config: &DriverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(Policy::limited(config.max_redirects))
            .timeout(config.download_timeout)
            .build()?;

        Ok(Self {
            client,
            referer: config.referer.clone(),
            batch_size: config.download_batch.max(1),
        })
    }

    /// Download `urls` in batches. A failed image leaves a gap and never stops its siblings.
    pub async fn download_all(&self, urls: &[String]) -> Result<DownloadSet> {
        let dir = tempfile::Builder::new().prefix("repost-images-").tempdir()?;
        let mut images = Vec::with_capacity(urls.len());

        for (batch_index, batch) in urls.chunks(self.batch_size).enumerate() {
            let offset = batch_index * self.batch_size;
            let results = join_all(
                batch
                    .iter()
                    .enumerate()
                    .map(|(i, url)| self.download_one(offset + i, url, dir.path())),
            )
            .await;

            for (i, result) in results.into_iter().enumerate() {
                let index = offset + i;
                match result {
                    Ok(image) => {
                        info!("✅ Downloaded image {}/{} ({} bytes)", index + 1, urls.len(), image.size);
                        images.push(Some(image));
                    }
                    Err(e) => {
                        warn!("❌ Image {}/{} failed: {}", index + 1, urls.len(), e);
                        images.push(None);
                    }
                }
            }
        }

        Ok(DownloadSet { dir, images })
    }

    async fn download_one(&self, index: usize, url: &str, dir: &Path) -> Result<LocalImage> {
        let (mime, bytes) = if url.starts_with("data:") {
            decode_data_url(url)?
        } else {
            self.fetch(url).await?
        };
        if bytes.is_empty() {
            return Err(Error::Image(format!("empty image body from {}", url)));
        }

        let path = dir.join(format!("image_{:03}.{}", index + 1, extension_for(&mime)));
        tokio::fs::write(&path, &bytes).await?;

        Ok(LocalImage {
            index,
            path,
            sha256: format!("{:x}", Sha256::digest(&bytes)),
            size: bytes.len(),
            mime,
        })
    }

    async fn fetch(&self, url: &str) -> Result<(String, Vec<u8>)> {
        let mut request = self.client.get(url);
        if let Some(referer) = &self.referer {
            request = request.header(REFERER, referer);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Image(format!("HTTP {} for {}", status, url)));
        }

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty());
        let mime = match declared {
            Some(mime) if mime.starts_with("image/") => mime,
            None => guess_mime(url).to_string(),
            Some(mime) if mime == "application/octet-stream" => guess_mime(url).to_string(),
            Some(other) => return Err(Error::Image(format!("{} is {}, not an image", url, other))),
        };

        Ok((mime, response.bytes().await?.to_vec()))
    }
}

/// Split a `data:{mime};base64,{payload}` URI.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| Error::Image("not a data URI".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::Image("data URI without payload".to_string()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| Error::Image("only base64 data URIs are supported".to_string()))?;
    if !mime.starts_with("image/") {
        return Err(Error::Image(format!("data URI holds {}, not an image", mime)));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::Image(format!("bad base64 payload: {}", e)))?;
    Ok((mime.to_ascii_lowercase(), bytes))
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader() -> ImageDownloader {
        ImageDownloader::new(&DriverConfig::default()).unwrap()
    }

    #[test]
    fn test_decode_data_url() {
        let (mime, bytes) = decode_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"hello");

        assert!(decode_data_url("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(decode_data_url("data:image/png,raw").is_err());
        assert!(decode_data_url("https://a/b.png").is_err());
    }

    #[tokio::test]
    async fn test_partial_failures_keep_positions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.png"))
            .and(header("referer", "https://mp.weixin.qq.com/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"png-bytes".to_vec()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page.html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html></html>"),
            )
            .mount(&server)
            .await;

        let urls = vec![
            format!("{}/a.png", server.uri()),
            format!("{}/gone.jpg", server.uri()),
            "data:image/gif;base64,R0lG".to_string(),
            format!("{}/page.html", server.uri()),
        ];
        let set = downloader().download_all(&urls).await.unwrap();

        assert_eq!(set.requested_count(), 4);
        assert_eq!(set.downloaded_count(), 2);
        assert!(set.get(1).is_none());
        assert!(set.get(3).is_none());

        let first = set.get(0).unwrap();
        assert_eq!(first.mime, "image/png");
        assert_eq!(first.size, 9);
        assert!(first.path.ends_with("image_001.png"));
        assert_eq!(std::fs::read(&first.path).unwrap(), b"png-bytes");
        assert_eq!(first.sha256, format!("{:x}", Sha256::digest(b"png-bytes")));

        let embedded = set.get(2).unwrap();
        assert!(embedded.path.ends_with("image_003.gif"));
        assert_eq!(embedded.data_url().unwrap(), "data:image/gif;base64,R0lG");

        let dir = set.dir().to_path_buf();
        set.close().unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old.jpg"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", format!("{}/new.jpg", server.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
            .mount(&server)
            .await;

        let set = downloader()
            .download_all(&[format!("{}/old.jpg", server.uri())])
            .await
            .unwrap();
        let image = set.get(0).unwrap();
        assert_eq!(image.mime, "image/jpeg");
        assert!(image.path.ends_with("image_001.jpg"));
    }
}
