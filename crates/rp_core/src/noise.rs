//! Classification of player and social-widget chrome that leaks into article text.

use lazy_static::lazy_static;
use regex::Regex;

/// Lines at or below this many chars are eligible for the prefix and numeric rules.
pub const SHORT_LINE_CHARS: usize = 16;

/// Element text above this many chars is never treated as chrome.
pub const NOISE_ELEMENT_MAX_CHARS: usize = 80;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref EXACT_PATTERNS: Vec<Regex> = [
        r"(?i)^已关注$",
        r"(?i)^follow$",
        r"(?i)^replay$",
        r"(?i)^share$",
        r"(?i)^like$",
        r"(?i)^close$",
        r"(?i)^play$",
        r"^倍速$",
        r"^继续观看$",
        r"^观看更多$",
        r"^转载$",
        r"^全屏$",
        r"^退出全屏$",
        r"^切换到[横竖]屏.*$",
        r"^0/0$",
        r"^\d{2}:\d{2}\s*/\s*\d{2}:\d{2}$",
        r"^时长\d{2}:\d{2}$",
        r"^\d+\.\d+倍$",
        r"^超清$",
        r"^流畅$",
        r"(?i)^share video$",
        r"(?i)^enter comment$",
        r"(?i)^(wow)?added to top stories$",
        r"(?i)^continue watching$",
        r"^0/\d+$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();
    static ref NOISE_PREFIX: Regex = Regex::new(
        r"(?i)^(更多|退出全屏|继续播放进度条|倍速播放中|已关注|观看|继续观看|切换到|全屏|倍速|超清|流畅|follow|replay|share|like|close|play)"
    )
    .unwrap();
    static ref NUMERIC_RUN: Regex = Regex::new(r"^[\d:\s/]+$").unwrap();
    static ref CONTROL_WORDS: Regex = Regex::new(
        r"已关注|观看更多|继续观看|退出全屏|倍速播放中|\b(Follow|Replay|Share|Like|Close|Play)\b"
    )
    .unwrap();
    static ref BLANK_RUNS: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Collapse internal whitespace to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// True when the line is player or social chrome rather than content.
///
/// Empty lines count as noise. Exact labels match at any length; prefix labels and
/// bare runs of digits, colons and slashes only match short lines, so ordinary prose
/// that happens to start with "Play" or "Share" survives.
pub fn is_noise_line(line: &str) -> bool {
    let text = collapse_whitespace(line);
    if text.is_empty() {
        return true;
    }
    if EXACT_PATTERNS.iter().any(|re| re.is_match(&text)) {
        return true;
    }
    let short = text.chars().count() <= SHORT_LINE_CHARS;
    short && (NOISE_PREFIX.is_match(&text) || NUMERIC_RUN.is_match(&text))
}

/// True when the text carries a player or follow-button control word.
pub fn contains_control_words(text: &str) -> bool {
    CONTROL_WORDS.is_match(text)
}

/// Line filter: drops noise lines, keeps paragraph breaks, and never leaves more than one blank line in a row.
pub fn filter_noise_text(text: &str) -> String {
    let kept = text
        .split('\n')
        .map(str::trim)
        .filter(|line| line.is_empty() || !is_noise_line(line))
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUNS.replace_all(&kept, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_labels_are_noise() {
        for line in ["已关注", "Follow", "follow", "00:00 / 01:05", "倍速", "1.5倍", "0/12", "切换到竖屏全屏", "  Replay  "] {
            assert!(is_noise_line(line), "{line:?} should be noise");
        }
    }

    #[test]
    fn test_empty_and_numeric_runs() {
        assert!(is_noise_line(""));
        assert!(is_noise_line("   "));
        assert!(is_noise_line("12:30"));
        assert!(is_noise_line("3 / 4"));
        assert!(!is_noise_line("2024 12 30 11 22 33 44 55"));
    }

    #[test]
    fn test_prose_is_not_noise() {
        for line in [
            "Playing the piano every morning keeps me calm.",
            "Share prices fell sharply after the announcement.",
            "今天我们来聊一聊如何写出更好的文章结构",
            "The quick brown fox jumps over the dog",
        ] {
            assert!(line.chars().count() >= 17);
            assert!(!is_noise_line(line), "{line:?} should be kept");
        }
    }

    #[test]
    fn test_short_prefix_labels() {
        assert!(is_noise_line("观看更多视频"));
        assert!(is_noise_line("Follow 12.3k"));
        assert!(!is_noise_line("一段很短的话"));
    }

    #[test]
    fn test_control_words() {
        assert!(contains_control_words("点击 Follow 关注作者"));
        assert!(contains_control_words("继续观看"));
        assert!(!contains_control_words("I would like to share this"));
    }

    #[test]
    fn test_filter_noise_text() {
        let text = "第一段内容比较长一些\nFollow\n00:00 / 01:05\n\n\n\n第二段内容也比较长\n";
        assert_eq!(filter_noise_text(text), "第一段内容比较长一些\n\n第二段内容也比较长");
        assert_eq!(filter_noise_text("Play\nReplay"), "");
    }
}
