use serde::Serialize;

use crate::{Error, Result};

/// Static descriptor of a destination platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    pub id: &'static str,
    pub name: &'static str,
    pub composer_url: &'static str,
    pub character_limit: Option<usize>,
}

pub const XIAOHONGSHU: &str = "xiaohongshu";

static PLATFORMS: &[PlatformConfig] = &[
    PlatformConfig {
        id: XIAOHONGSHU,
        name: "小红书",
        composer_url: "https://creator.xiaohongshu.com/publish/publish?from=tab_switch&target=article",
        character_limit: Some(1000),
    },
    PlatformConfig {
        id: "zhihu",
        name: "知乎",
        composer_url: "https://zhuanlan.zhihu.com/write",
        character_limit: None,
    },
    PlatformConfig {
        id: "jianshu",
        name: "简书",
        composer_url: "https://www.jianshu.com/writer",
        character_limit: None,
    },
    PlatformConfig {
        id: "toutiao",
        name: "今日头条",
        composer_url: "https://mp.toutiao.com/profile_v4/index/creation",
        character_limit: Some(5000),
    },
    PlatformConfig {
        id: "bilibili",
        name: "哔哩哔哩",
        composer_url: "https://member.bilibili.com/platform/article/text/new",
        character_limit: None,
    },
];

impl PlatformConfig {
    pub fn all() -> &'static [PlatformConfig] {
        PLATFORMS
    }

    pub fn find(id: &str) -> Option<&'static PlatformConfig> {
        let id = id.trim();
        PLATFORMS.iter().find(|p| p.id.eq_ignore_ascii_case(id))
    }

    /// Like [`PlatformConfig::find`] but reports unknown ids as `UnsupportedPlatform`.
    pub fn require(id: &str) -> Result<&'static PlatformConfig> {
        Self::find(id).ok_or_else(|| Error::UnsupportedPlatform(id.to_string()))
    }

    /// Only the xiaohongshu composer is driven end to end, images included.
    pub fn supports_automation(&self) -> bool {
        self.id == XIAOHONGSHU
    }

    pub fn exceeds_limit(&self, text: &str) -> bool {
        self.character_limit
            .map(|limit| text.chars().count() > limit)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_platform() {
        let xhs = PlatformConfig::find("xiaohongshu").unwrap();
        assert_eq!(xhs.character_limit, Some(1000));
        assert!(xhs.supports_automation());

        let zhihu = PlatformConfig::find("Zhihu").unwrap();
        assert_eq!(zhihu.composer_url, "https://zhuanlan.zhihu.com/write");
        assert!(!zhihu.supports_automation());

        assert!(PlatformConfig::find("weibo").is_none());
        assert!(matches!(
            PlatformConfig::require("weibo"),
            Err(Error::UnsupportedPlatform(id)) if id == "weibo"
        ));
    }

    #[test]
    fn test_character_limit_counts_chars() {
        let xhs = PlatformConfig::find(XIAOHONGSHU).unwrap();
        assert!(!xhs.exceeds_limit(&"字".repeat(1000)));
        assert!(xhs.exceeds_limit(&"字".repeat(1001)));
        assert!(!PlatformConfig::find("jianshu").unwrap().exceeds_limit(&"a".repeat(100_000)));
    }
}
