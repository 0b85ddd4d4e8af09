use serde::{Deserialize, Serialize};

pub mod captions;
pub mod orchestrator;
pub mod process;
pub mod transcript;
pub mod video_id;

pub use captions::{CaptionError, CaptionFetcher, CaptionSource, YoutubeCaptionClient};
pub use orchestrator::ExtractionOrchestrator;
pub use process::{PrimaryExtractor, ProcessExtractor};
pub use transcript::{normalize, TranscriptFragment};
pub use video_id::resolve_video_id;

/// Method tag recorded when the caption API fallback produced the transcript
pub const FALLBACK_METHOD: &str = "fallback_transcript_api";

/// Metadata about the analyzed video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    /// Platform identifier of the video
    pub id: String,

    pub title: String,

    pub thumbnail_url: String,

    /// Duration as reported by the source, or "Unknown"
    pub duration: String,
}

impl VideoInfo {
    /// Best-effort metadata when nothing richer is available
    pub fn with_defaults(video_id: &str) -> Self {
        Self {
            id: video_id.to_string(),
            title: "YouTube Video".to_string(),
            thumbnail_url: thumbnail_url(video_id),
            duration: "Unknown".to_string(),
        }
    }

    /// Canonical watch page for this video
    pub fn watch_url(&self) -> String {
        watch_url(&self.id)
    }
}

/// Outcome of a transcript extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub video_info: VideoInfo,

    /// Flattened transcript text
    pub transcript: String,

    /// Which strategy produced the transcript
    pub method: String,

    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn succeeded(video_info: VideoInfo, transcript: String, method: impl Into<String>) -> Self {
        Self {
            video_info,
            transcript,
            method: method.into(),
            success: true,
            error: None,
        }
    }
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", video_id)
}
