use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::extractors::{ExtractionOrchestrator, ExtractionResult};
use crate::recipe::{Recipe, RecipeGenerator};
use crate::Result;

/// Inbound analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub url: String,

    /// Ask the extraction process for speech transcription
    #[serde(default, alias = "useWhisper")]
    pub use_speech_fallback: bool,
}

/// Successful analysis as returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub recipe: Recipe,
    pub extraction_method: String,
    /// Transcript length in characters
    pub transcript_length: usize,
}

/// Extraction and recipe produced by one analysis
#[derive(Debug, Clone)]
pub struct Analysis {
    pub extraction: ExtractionResult,
    pub recipe: Recipe,
}

impl Analysis {
    pub fn to_response(&self) -> AnalyzeResponse {
        AnalyzeResponse {
            recipe: self.recipe.clone(),
            extraction_method: self.extraction.method.clone(),
            transcript_length: self.extraction.transcript.chars().count(),
        }
    }
}

impl From<Analysis> for AnalyzeResponse {
    fn from(analysis: Analysis) -> Self {
        let transcript_length = analysis.extraction.transcript.chars().count();
        Self {
            recipe: analysis.recipe,
            extraction_method: analysis.extraction.method,
            transcript_length,
        }
    }
}

/// Full pipeline: transcript extraction followed by recipe generation
pub struct Analyzer {
    orchestrator: ExtractionOrchestrator,
    generator: RecipeGenerator,
}

impl Analyzer {
    pub fn new(orchestrator: ExtractionOrchestrator, generator: RecipeGenerator) -> Self {
        Self {
            orchestrator,
            generator,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let orchestrator = ExtractionOrchestrator::from_config(config)?;
        let generator = RecipeGenerator::from_config(&config.llm)?;
        Ok(Self::new(orchestrator, generator))
    }

    pub fn backend_name(&self) -> &'static str {
        self.generator.backend_name()
    }

    pub async fn extract(&self, url: &str, use_speech_fallback: bool) -> Result<ExtractionResult> {
        self.orchestrator.extract(url, use_speech_fallback).await
    }

    /// Extract, re-running once with speech transcription when no transcript was found
    pub async fn extract_with_speech_retry(
        &self,
        url: &str,
        use_speech_fallback: bool,
    ) -> Result<ExtractionResult> {
        match self.orchestrator.extract(url, use_speech_fallback).await {
            Err(e) if e.is_no_transcript() && !use_speech_fallback => {
                tracing::warn!("{}; retrying with speech transcription", e);
                self.orchestrator.extract(url, true).await
            }
            other => other,
        }
    }

    /// Run the pipeline exactly as requested
    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<Analysis> {
        let extraction = self.extract(&request.url, request.use_speech_fallback).await?;
        self.summarize(extraction).await
    }

    /// Run the pipeline with the single speech retry on a missing transcript
    pub async fn analyze_with_speech_retry(&self, request: &AnalyzeRequest) -> Result<Analysis> {
        let extraction = self
            .extract_with_speech_retry(&request.url, request.use_speech_fallback)
            .await?;
        self.summarize(extraction).await
    }

    async fn summarize(&self, extraction: ExtractionResult) -> Result<Analysis> {
        tracing::info!(
            "Transcript ready ({} chars via {})",
            extraction.transcript.chars().count(),
            extraction.method
        );
        let recipe = self
            .generator
            .generate(&extraction.transcript, &extraction.video_info)
            .await?;
        Ok(Analysis { extraction, recipe })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::captions::{CaptionError, MockCaptionSource};
    use crate::extractors::process::MockPrimaryExtractor;
    use crate::extractors::{CaptionFetcher, TranscriptFragment, VideoInfo, FALLBACK_METHOD};
    use crate::recipe::backend::MockSummarizationBackend;
    use crate::AnalyzeError;
    use mockall::predicate::eq;
    use mockall::Sequence;

    const RECIPE_JSON: &str = r#"{"title": "계란말이", "summary": "간단한 반찬", "ingredients": ["계란 3개"],
        "tools": ["팬"], "steps": [{"step": 1, "description": "계란을 푼다"}], "totalTime": "10분", "tips": []}"#;

    fn generator() -> RecipeGenerator {
        let mut backend = MockSummarizationBackend::new();
        backend.expect_name().return_const("openai");
        backend
            .expect_complete()
            .returning(|_, _| Ok(format!("```json\n{}\n```", RECIPE_JSON)));
        RecipeGenerator::new(Box::new(backend), "Korean")
    }

    fn captions(result: fn(&str) -> std::result::Result<Vec<TranscriptFragment>, CaptionError>) -> CaptionFetcher {
        let mut source = MockCaptionSource::new();
        source.expect_fetch().returning(move |_, lang| result(lang));
        CaptionFetcher::new(Box::new(source), "ko", "en")
    }

    fn failing_primary() -> MockPrimaryExtractor {
        let mut primary = MockPrimaryExtractor::new();
        primary.expect_name().return_const("extraction process");
        primary
            .expect_extract()
            .returning(|_, _| Err(AnalyzeError::ProcessFailure("no subtitles".into())));
        primary
    }

    #[test]
    fn test_request_accepts_legacy_flag() {
        let request: AnalyzeRequest =
            serde_json::from_str(r#"{"url": "https://youtu.be/abc123", "useWhisper": true}"#).unwrap();
        assert!(request.use_speech_fallback);

        let request: AnalyzeRequest = serde_json::from_str(r#"{"url": "https://youtu.be/abc123"}"#).unwrap();
        assert!(!request.use_speech_fallback);
    }

    #[tokio::test]
    async fn test_caption_fallback_end_to_end() {
        let captions = captions(|lang| {
            assert_eq!(lang, "ko");
            Ok(vec![
                TranscriptFragment::new("안녕", 0.0, 1.0),
                TranscriptFragment::new("하세요", 1.0, 1.0),
            ])
        });
        let analyzer = Analyzer::new(
            ExtractionOrchestrator::new(Box::new(failing_primary()), captions),
            generator(),
        );

        let request = AnalyzeRequest {
            url: "https://www.youtube.com/watch?v=abc123".to_string(),
            use_speech_fallback: false,
        };
        let analysis = analyzer.analyze(&request).await.unwrap();
        assert_eq!(analysis.extraction.transcript, "안녕 하세요");

        let response = analysis.to_response();
        assert_eq!(response.recipe.id, "abc123");
        assert_eq!(response.recipe.video_url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(response.extraction_method, FALLBACK_METHOD);
        assert_eq!(response.transcript_length, 6);

        let json = serde_json::to_value(AnalyzeResponse::from(analysis)).unwrap();
        assert_eq!(json["extractionMethod"], FALLBACK_METHOD);
        assert_eq!(json["transcriptLength"], 6);
    }

    #[tokio::test]
    async fn test_speech_retry_after_no_transcript() {
        let mut seq = Sequence::new();
        let mut primary = MockPrimaryExtractor::new();
        primary.expect_name().return_const("extraction process");
        primary
            .expect_extract()
            .with(eq("https://youtu.be/abc123"), eq(false))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(AnalyzeError::ProcessFailure("no subtitles".into())));
        primary
            .expect_extract()
            .with(eq("https://youtu.be/abc123"), eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Ok(ExtractionResult::succeeded(
                    VideoInfo::with_defaults("abc123"),
                    "계란을 풀어 주세요".to_string(),
                    "whisper_api",
                ))
            });

        let analyzer = Analyzer::new(
            ExtractionOrchestrator::new(Box::new(primary), captions(|_| Err(CaptionError::Disabled))),
            generator(),
        );

        let request = AnalyzeRequest {
            url: "https://youtu.be/abc123".to_string(),
            use_speech_fallback: false,
        };
        let analysis = analyzer.analyze_with_speech_retry(&request).await.unwrap();
        assert_eq!(analysis.extraction.method, "whisper_api");
        assert_eq!(analysis.recipe.title, "계란말이");
    }

    #[tokio::test]
    async fn test_no_retry_when_speech_already_requested() {
        let mut primary = MockPrimaryExtractor::new();
        primary.expect_name().return_const("extraction process");
        primary
            .expect_extract()
            .with(eq("https://youtu.be/abc123"), eq(true))
            .times(1)
            .returning(|_, _| Err(AnalyzeError::ProcessTimeout(std::time::Duration::from_secs(300))));

        let analyzer = Analyzer::new(
            ExtractionOrchestrator::new(Box::new(primary), captions(|_| Err(CaptionError::Disabled))),
            generator(),
        );

        let request = AnalyzeRequest {
            url: "https://youtu.be/abc123".to_string(),
            use_speech_fallback: true,
        };
        let err = analyzer.analyze_with_speech_retry(&request).await.unwrap_err();
        assert!(err.is_no_transcript());
    }

    #[tokio::test]
    async fn test_invalid_url_is_not_retried() {
        let mut primary = MockPrimaryExtractor::new();
        primary.expect_name().return_const("extraction process");
        primary
            .expect_extract()
            .times(1)
            .returning(|_, _| Err(AnalyzeError::ProcessFailure("bad url".into())));

        let analyzer = Analyzer::new(
            ExtractionOrchestrator::new(Box::new(primary), captions(|_| Err(CaptionError::Disabled))),
            generator(),
        );

        let request = AnalyzeRequest {
            url: "not a url".to_string(),
            use_speech_fallback: false,
        };
        let err = analyzer.analyze_with_speech_retry(&request).await.unwrap_err();
        assert!(matches!(err, AnalyzeError::InvalidUrl(_)));
    }
}
