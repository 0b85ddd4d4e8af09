//! Recipe Scribe - turn YouTube cooking videos into structured recipes
//!
//! This library extracts the spoken or captioned content of a video through an
//! external extraction process (with a caption-API fallback), then summarizes the
//! transcript into a [`Recipe`] using a configurable language-model backend.

pub mod analyze;
pub mod cli;
pub mod config;
pub mod extractors;
pub mod output;
pub mod recipe;
pub mod server;
pub mod utils;

pub use analyze::{Analysis, AnalyzeRequest, AnalyzeResponse, Analyzer};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{ExtractionOrchestrator, ExtractionResult, VideoInfo};
pub use recipe::{Recipe, RecipeGenerator, RecipeStep};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, AnalyzeError>;

/// Error types surfaced by the analysis pipeline
#[derive(thiserror::Error, Debug)]
pub enum AnalyzeError {
    #[error("Invalid YouTube URL: {0}")]
    InvalidUrl(String),

    #[error("No transcript found: {0}")]
    NoTranscript(String),

    #[error("Extraction process timed out after {0:?}")]
    ProcessTimeout(std::time::Duration),

    #[error("Extraction process failed: {0}")]
    ProcessFailure(String),

    #[error("Summarization backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Summarization backend '{0}' is not implemented yet")]
    BackendNotImplemented(String),

    #[error("Malformed recipe response: {0}")]
    MalformedRecipe(String),
}

impl AnalyzeError {
    /// Errors caused by the request itself rather than by a collaborator
    pub fn is_client_error(&self) -> bool {
        matches!(self, AnalyzeError::InvalidUrl(_) | AnalyzeError::NoTranscript(_))
    }

    /// Whether a retry with speech transcription could help
    pub fn is_no_transcript(&self) -> bool {
        matches!(self, AnalyzeError::NoTranscript(_))
    }
}
