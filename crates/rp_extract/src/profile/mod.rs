//! Per-site selector profiles.
//!
//! A profile knows where a platform keeps an article's metadata and body and
//! which markup on that platform is chrome rather than content.

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use rp_core::{Error, Result};

pub mod generic;
pub mod wechat;

pub use generic::GenericProfile;
pub use wechat::WechatProfile;

/// A metadata source: the first element matching `selector`, read from
/// `attr` when given, otherwise from its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub selector: &'static str,
    pub attr: Option<&'static str>,
}

impl Field {
    pub const fn text(selector: &'static str) -> Self {
        Self {
            selector,
            attr: None,
        }
    }

    pub const fn attr(selector: &'static str, attr: &'static str) -> Self {
        Self {
            selector,
            attr: Some(attr),
        }
    }
}

/// Containers that hold the article body when no profile selector matches.
pub const FALLBACK_CONTAINERS: &[&str] = &["article", "main", "body"];

pub trait SourceProfile: Send + Sync {
    /// Returns the name of the source
    fn name(&self) -> &str;

    /// Returns true if this profile understands pages at the given URL
    fn can_handle(&self, url: &str) -> bool;

    fn title_fields(&self) -> &[Field];
    fn author_fields(&self) -> &[Field];
    fn publish_time_fields(&self) -> &[Field];
    fn cover_fields(&self) -> &[Field];

    /// Candidate body containers, best first.
    fn content_selectors(&self) -> &[&'static str];

    /// Embedded players and their wrappers.
    fn video_selectors(&self) -> &[&'static str] {
        &["video", "iframe"]
    }

    /// Elements the page hides from readers.
    fn hidden_selectors(&self) -> &[&'static str] {
        &[
            "[style*=\"display:none\"]",
            "[style*=\"display: none\"]",
            "[style*=\"visibility:hidden\"]",
            "[style*=\"visibility: hidden\"]",
            "[hidden]",
        ]
    }

    /// Promotion cards and tracking widgets.
    fn tracking_selectors(&self) -> &[&'static str] {
        &[]
    }

    /// Image URLs worth recovering from raw markup when no `<img>` survived.
    fn image_url_pattern(&self) -> Option<&Regex> {
        None
    }

    /// Referer sent when fetching this source's images out of page.
    fn referer(&self) -> Option<&str> {
        None
    }

    /// Returns a list of CLI shorthand names for this profile
    fn cli_names(&self) -> Vec<&str> {
        vec![]
    }
}

/// Picks the profile for a URL, falling back to the generic one.
pub struct ProfileRegistry {
    profiles: Vec<Box<dyn SourceProfile>>,
    fallback: GenericProfile,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self {
            profiles: vec![Box::new(WechatProfile::new())],
            fallback: GenericProfile::new(),
        }
    }
}

impl ProfileRegistry {
    pub fn empty() -> Self {
        Self {
            profiles: Vec::new(),
            fallback: GenericProfile::new(),
        }
    }

    pub fn add_profile(&mut self, profile: Box<dyn SourceProfile>) {
        self.profiles.push(profile);
    }

    pub fn for_url(&self, url: &str) -> &dyn SourceProfile {
        self.profiles
            .iter()
            .find(|p| p.can_handle(url))
            .map(|p| p.as_ref())
            .unwrap_or(&self.fallback)
    }

    /// Look a profile up by name or CLI shorthand.
    pub fn by_name(&self, name: &str) -> Option<&dyn SourceProfile> {
        let name = name.trim().to_ascii_lowercase();
        if self.fallback.cli_names().contains(&name.as_str()) {
            return Some(&self.fallback as &dyn SourceProfile);
        }
        self.profiles
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(&name) || p.cli_names().contains(&name.as_str()))
            .map(|p| p.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles
            .iter()
            .map(|p| p.name())
            .chain(std::iter::once(self.fallback.name()))
            .collect()
    }
}

/// Common utilities for profiles
pub(crate) mod utils {
    use super::*;

    pub fn parse_url(url: &str) -> Result<Url> {
        Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))
    }

    pub fn host_matches(url: &str, hosts: &[&str]) -> bool {
        parse_url(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
            .is_some_and(|host| {
                hosts
                    .iter()
                    .any(|h| host == *h || host.ends_with(&format!(".{}", h)))
            })
    }

    /// First non-empty value among `fields`.
    pub fn resolve_field(document: &Html, fields: &[Field]) -> Result<Option<String>> {
        for field in fields {
            let selector = Selector::parse(field.selector)
                .map_err(|e| Error::Extraction(format!("Invalid selector: {}", e)))?;

            let value = document.select(&selector).find_map(|el| {
                let raw = match field.attr {
                    Some(attr) => el.value().attr(attr).map(str::to_string),
                    None => Some(el.text().collect::<String>()),
                }?;
                let value = rp_core::noise::collapse_whitespace(&raw);
                (!value.is_empty()).then_some(value)
            });

            if value.is_some() {
                return Ok(value);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_picks_wechat_for_mp_urls() {
        let registry = ProfileRegistry::default();
        assert_eq!(
            registry.for_url("https://mp.weixin.qq.com/s/abc123").name(),
            "wechat"
        );
        assert_eq!(registry.for_url("https://example.com/post").name(), "generic");
        assert_eq!(registry.for_url("not a url").name(), "generic");
    }

    #[test]
    fn test_registry_by_name() {
        let registry = ProfileRegistry::default();
        assert_eq!(registry.by_name("WX").map(|p| p.name()), Some("wechat"));
        assert_eq!(registry.by_name("generic").map(|p| p.name()), Some("generic"));
        assert!(registry.by_name("medium").is_none());
        assert_eq!(registry.names(), vec!["wechat", "generic"]);
    }

    #[test]
    fn test_resolve_field_order_and_attr() {
        let doc = Html::parse_document(
            r#"<html><head><meta property="og:title" content="Meta title"></head>
            <body><h1>  </h1><h2 class="t">Heading  two</h2></body></html>"#,
        );
        let fields = [
            Field::text("h1"),
            Field::text("h2.t"),
            Field::attr("meta[property=\"og:title\"]", "content"),
        ];
        assert_eq!(
            utils::resolve_field(&doc, &fields).unwrap().as_deref(),
            Some("Heading two")
        );
        assert_eq!(
            utils::resolve_field(&doc, &fields[2..]).unwrap().as_deref(),
            Some("Meta title")
        );
        assert!(utils::resolve_field(&doc, &[Field::text("h3")]).unwrap().is_none());
        assert!(utils::resolve_field(&doc, &[Field::text("h3[")]).is_err());
    }

    #[test]
    fn test_host_matches() {
        assert!(utils::host_matches("https://mp.weixin.qq.com/s/x", &["mp.weixin.qq.com"]));
        assert!(!utils::host_matches("https://weixin.qq.com.evil.io/", &["mp.weixin.qq.com"]));
    }
}
