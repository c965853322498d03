//! Article extraction, image inlining and editor normalization.

pub mod blocks;
pub mod clean;
pub mod cli;
pub mod compose;
pub mod config;
pub mod dom;
pub mod extractor;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod profile;
pub mod resolver;
pub mod source;

pub use cli::{handle_extract, handle_normalize, ExtractArgs, NormalizeArgs};
pub use compose::{build_sync_content, image_placeholder, original_image_urls};
pub use config::ExtractConfig;
pub use extractor::{extract_article, Extraction, ExtractionQuality};
pub use normalize::normalize;
pub use pipeline::{ArticleSource, Extractor};
pub use profile::{ProfileRegistry, SourceProfile};
pub use resolver::ImageResolver;
pub use source::{BrowserSource, HttpSource, PageSource};

pub mod prelude {
    pub use super::profile::SourceProfile;
    pub use super::source::PageSource;
    pub use rp_core::{Article, Error, Result};
}
