use serde::{Deserialize, Serialize};

/// One timestamped piece of caption text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptFragment {
    pub text: String,

    /// Offset from the start of the video, in seconds
    pub start: f64,

    /// Duration in seconds
    pub duration: f64,
}

impl TranscriptFragment {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }
}

/// Flatten fragments into a single whitespace-normalized transcript
pub fn normalize(fragments: &[TranscriptFragment]) -> String {
    let joined = fragments
        .iter()
        .map(|fragment| fragment.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    collapse_whitespace(&joined)
}

/// Collapse whitespace runs to one space and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
