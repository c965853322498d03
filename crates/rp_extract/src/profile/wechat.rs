use lazy_static::lazy_static;
use regex::Regex;

use super::{utils, Field, SourceProfile};

lazy_static! {
    static ref MMBIZ_IMAGE: Regex =
        Regex::new(r#"(?i)https?://[^"'()\s<>]*?(?:mmbiz\.qpic\.cn|qpic\.cn)[^"'()\s<>]*"#).unwrap();
}

const TITLE: &[Field] = &[
    Field::text("#activity-name"),
    Field::text(".rich_media_title"),
    Field::text("h1.rich_media_title"),
    Field::text("h1"),
    Field::attr("meta[property=\"og:title\"]", "content"),
];

const AUTHOR: &[Field] = &[
    Field::text("#js_name"),
    Field::text(".rich_media_meta_nickname"),
    Field::text(".rich_media_meta_text"),
    Field::attr("meta[name=\"author\"]", "content"),
];

const PUBLISH_TIME: &[Field] = &[
    Field::text("#publish_time"),
    Field::text(".rich_media_meta_date"),
];

const COVER: &[Field] = &[
    Field::attr(".rich_media_thumb", "src"),
    Field::attr("meta[property=\"og:image\"]", "content"),
];

const CONTENT: &[&str] = &["#js_content", ".rich_media_content", "#img-content", "article"];

const VIDEO: &[&str] = &[
    "video",
    "iframe[src*=\"v.qq.com\"]",
    "iframe[src*=\"video\"]",
    ".js_tx_video_container",
    ".js_video_channel_container",
    ".txp_player_container",
    ".txp_video_container",
    "[class*=\"video-player\"]",
    "[class*=\"videoPlayer\"]",
    "[class*=\"txp\"]",
    "[id*=\"txp\"]",
    ".qqmusic_iframe",
    ".js_wechat_video",
    ".wx_video_context",
    ".wx_video_play_area",
];

const HIDDEN: &[&str] = &[
    "[style*=\"display:none\"]",
    "[style*=\"display: none\"]",
    "[style*=\"visibility:hidden\"]",
    "[style*=\"visibility: hidden\"]",
    ".dn",
    ".hidden",
];

const TRACKING: &[&str] = &[".original_primary_card_tips", ".js_product_container", "mp-common-profile"];

/// WeChat official-account articles (`mp.weixin.qq.com`).
#[derive(Debug, Clone, Default)]
pub struct WechatProfile;

impl WechatProfile {
    pub fn new() -> Self {
        Self
    }

    const HOSTS: &'static [&'static str] = &["mp.weixin.qq.com"];
}

impl SourceProfile for WechatProfile {
    fn name(&self) -> &str {
        "wechat"
    }

    fn can_handle(&self, url: &str) -> bool {
        utils::host_matches(url, Self::HOSTS)
    }

    fn title_fields(&self) -> &[Field] {
        TITLE
    }

    fn author_fields(&self) -> &[Field] {
        AUTHOR
    }

    fn publish_time_fields(&self) -> &[Field] {
        PUBLISH_TIME
    }

    fn cover_fields(&self) -> &[Field] {
        COVER
    }

    fn content_selectors(&self) -> &[&'static str] {
        CONTENT
    }

    fn video_selectors(&self) -> &[&'static str] {
        VIDEO
    }

    fn hidden_selectors(&self) -> &[&'static str] {
        HIDDEN
    }

    fn tracking_selectors(&self) -> &[&'static str] {
        TRACKING
    }

    fn image_url_pattern(&self) -> Option<&Regex> {
        Some(&MMBIZ_IMAGE)
    }

    fn referer(&self) -> Option<&str> {
        Some("https://mp.weixin.qq.com/")
    }

    fn cli_names(&self) -> Vec<&str> {
        vec!["wechat", "weixin", "wx"]
    }
}
