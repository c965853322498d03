//! Positional fill plan: text runs and image insertions in source order.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\[图片(\d+)\]").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    /// Zero-based index into the image list.
    Image(usize),
}

/// Cut `text` to `cap` characters, marking the cut with `...`.
pub fn truncate_text(text: &str, cap: usize) -> String {
    match text.char_indices().nth(cap) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

/// Split text with `[图片N]` placeholders into segments.
///
/// Each image index appears at most once, at its first placeholder. Indices
/// outside `1..=image_count` are dropped. Neighbouring text runs are merged.
pub fn parse_segments(text: &str, image_count: usize) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut seen = HashSet::new();
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(text) {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_text(&mut segments, &text[last..whole.start()]);
        last = whole.end();

        let index = match number.as_str().parse::<usize>() {
            Ok(n) if n >= 1 && n <= image_count => n - 1,
            _ => continue,
        };
        if seen.insert(index) {
            segments.push(Segment::Image(index));
        }
    }
    push_text(&mut segments, &text[last..]);

    segments
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    match segments.last_mut() {
        Some(Segment::Text(existing)) => {
            existing.push('\n');
            existing.push_str(text);
        }
        _ => segments.push(Segment::Text(text.to_string())),
    }
}

/// Distinct image indices the plan inserts, in order.
pub fn image_indices(segments: &[Segment]) -> Vec<usize> {
    segments
        .iter()
        .filter_map(|s| match s {
            Segment::Image(index) => Some(*index),
            Segment::Text(_) => None,
        })
        .collect()
}
