// Extraction orchestrator: primary strategy, then caption fallback
//
// 1. External extraction process (captions or speech transcription)
// 2. Caption API in the preferred, then fallback language
// 3. NoTranscript

use super::captions::CaptionFetcher;
use super::process::{PrimaryExtractor, ProcessExtractor};
use super::transcript::normalize;
use super::video_id::resolve_video_id;
use super::{ExtractionResult, VideoInfo, FALLBACK_METHOD};
use crate::config::Config;
use crate::{AnalyzeError, Result};

pub struct ExtractionOrchestrator {
    primary: Box<dyn PrimaryExtractor>,
    captions: CaptionFetcher,
}

impl ExtractionOrchestrator {
    pub fn new(primary: Box<dyn PrimaryExtractor>, captions: CaptionFetcher) -> Self {
        Self { primary, captions }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            Box::new(ProcessExtractor::from_config(config)),
            CaptionFetcher::from_config(&config.captions)?,
        ))
    }

    /// Obtain a non-empty transcript for the video at `url`
    pub async fn extract(&self, url: &str, use_speech_fallback: bool) -> Result<ExtractionResult> {
        let result = match self.primary.extract(url, use_speech_fallback).await {
            Ok(result) => {
                tracing::info!("{} succeeded (method: {})", self.primary.name(), result.method);
                result
            }
            Err(e) => {
                tracing::warn!("{} failed, falling back to caption API: {}", self.primary.name(), e);
                self.extract_with_captions(url).await?
            }
        };

        if result.transcript.trim().is_empty() {
            return Err(AnalyzeError::NoTranscript(format!(
                "the transcript for video {} is empty",
                result.video_info.id
            )));
        }

        Ok(result)
    }

    async fn extract_with_captions(&self, url: &str) -> Result<ExtractionResult> {
        let video_id = resolve_video_id(url)?;
        let fragments = self.captions.fetch(&video_id).await?;
        let transcript = normalize(&fragments);

        Ok(ExtractionResult::succeeded(
            VideoInfo::with_defaults(&video_id),
            transcript,
            FALLBACK_METHOD,
        ))
    }
}
