use lazy_static::lazy_static;
use regex::Regex;

use crate::{AnalyzeError, Result};

lazy_static! {
    /// Accepted URL shapes, in priority order
    static ref VIDEO_ID_PATTERNS: [Regex; 4] = [
        Regex::new(r"youtube\.com/watch\?v=([^&\n?#/]+)").unwrap(),
        Regex::new(r"youtu\.be/([^&\n?#/]+)").unwrap(),
        Regex::new(r"youtube\.com/embed/([^&\n?#/]+)").unwrap(),
        Regex::new(r"youtube\.com/v/([^&\n?#/]+)").unwrap(),
    ];
}

/// Extract the video identifier from a YouTube URL
pub fn resolve_video_id(url: &str) -> Result<String> {
    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| AnalyzeError::InvalidUrl(url.to_string()))
}
