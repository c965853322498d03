use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Content did not render within {0:?}")]
    ExtractionTimeout(std::time::Duration),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Login required for {0}")]
    LoginRequired(String),

    #[error("Login not completed within {0:?}")]
    LoginTimeout(std::time::Duration),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error came from waiting on something that never showed up.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::ExtractionTimeout(_) | Error::LoginTimeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_unsupported_platform_message() {
        let err = Error::UnsupportedPlatform("weibo".to_string());
        assert_eq!(err.to_string(), "Unsupported platform: weibo");
    }

    #[test]
    fn test_timeout_classification() {
        assert!(Error::LoginTimeout(Duration::from_secs(180)).is_timeout());
        assert!(Error::Timeout("editor".into()).is_timeout());
        assert!(!Error::ElementNotFound("h1".into()).is_timeout());
    }
}
