use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use super::transcript::TranscriptFragment;
use crate::config::CaptionConfig;
use crate::{AnalyzeError, Result};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Failure of a single caption request
#[derive(thiserror::Error, Debug)]
pub enum CaptionError {
    #[error("captions are disabled for this video")]
    Disabled,

    #[error("no captions in language '{0}'")]
    LanguageUnavailable(String),

    #[error("captions in language '{0}' are empty")]
    Empty(String),

    #[error("video is unavailable")]
    VideoUnavailable,

    #[error("caption request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for CaptionError {
    fn from(e: reqwest::Error) -> Self {
        CaptionError::Request(e.to_string())
    }
}

/// External captioning collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Fetch the captions of a video in one language
    async fn fetch(
        &self,
        video_id: &str,
        language: &str,
    ) -> std::result::Result<Vec<TranscriptFragment>, CaptionError>;
}

/// Caption source backed by the YouTube watch page and its timedtext tracks
pub struct YoutubeCaptionClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    #[serde(default)]
    kind: Option<String>,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    fn matches_language(&self, language: &str) -> bool {
        let code = self.language_code.to_lowercase();
        let wanted = language.to_lowercase();
        code == wanted || code.starts_with(&format!("{}-", wanted))
    }
}

impl YoutubeCaptionClient {
    pub fn new(config: &CaptionConfig) -> std::result::Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn watch_page(&self, video_id: &str, language: &str) -> std::result::Result<String, CaptionError> {
        let response = self
            .client
            .get(format!("{}/watch", self.base_url))
            .query(&[("v", video_id), ("hl", language)])
            .header("Accept-Language", language)
            .send()
            .await?;

        Self::body_text(response).await
    }

    async fn timedtext(&self, track: &CaptionTrack) -> std::result::Result<String, CaptionError> {
        let url = if track.base_url.starts_with('/') {
            format!("{}{}", self.base_url, track.base_url)
        } else {
            track.base_url.clone()
        };

        let response = self.client.get(url).send().await?;
        Self::body_text(response).await
    }

    async fn body_text(response: reqwest::Response) -> std::result::Result<String, CaptionError> {
        match response.status() {
            status if status.is_success() => Ok(response.text().await?),
            StatusCode::NOT_FOUND => Err(CaptionError::VideoUnavailable),
            StatusCode::TOO_MANY_REQUESTS => {
                Err(CaptionError::Request("rate limited (HTTP 429)".to_string()))
            }
            status => Err(CaptionError::Request(format!("HTTP {}", status))),
        }
    }
}

#[async_trait]
impl CaptionSource for YoutubeCaptionClient {
    async fn fetch(
        &self,
        video_id: &str,
        language: &str,
    ) -> std::result::Result<Vec<TranscriptFragment>, CaptionError> {
        tracing::debug!(video_id, language, "Fetching caption tracks");

        let page = self.watch_page(video_id, language).await?;
        let tracks = parse_caption_tracks(&page)?;
        let track = select_track(&tracks, language)
            .ok_or_else(|| CaptionError::LanguageUnavailable(language.to_string()))?;

        let xml = self.timedtext(track).await?;
        Ok(parse_timedtext(&xml))
    }
}

fn parse_caption_tracks(page: &str) -> std::result::Result<Vec<CaptionTrack>, CaptionError> {
    const MARKER: &str = "\"captionTracks\":";

    let Some(start) = page.find(MARKER) else {
        if page.contains("class=\"g-recaptcha\"") {
            return Err(CaptionError::Request("blocked by captcha".to_string()));
        }
        if !page.contains("\"playabilityStatus\":{\"status\":\"OK\"") {
            return Err(CaptionError::VideoUnavailable);
        }
        return Err(CaptionError::Disabled);
    };

    serde_json::Deserializer::from_str(&page[start + MARKER.len()..])
        .into_iter::<Vec<CaptionTrack>>()
        .next()
        .and_then(|parsed| parsed.ok())
        .ok_or_else(|| CaptionError::Request("unreadable caption track list".to_string()))
}

/// Manual tracks win over auto-generated ones for the same language
fn select_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    tracks
        .iter()
        .filter(|track| track.matches_language(language))
        .min_by_key(|track| track.is_generated())
}

lazy_static! {
    static ref TEXT_ELEMENT: Regex =
        Regex::new(r#"(?s)<text start="([0-9.]+)"(?: dur="([0-9.]+)")?[^>]*>(.*?)</text>"#).unwrap();
    static ref INNER_TAG: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref ENTITY: Regex = Regex::new(r"&(#[0-9]+|#x[0-9a-fA-F]+|amp|lt|gt|quot|apos);").unwrap();
}

fn parse_timedtext(xml: &str) -> Vec<TranscriptFragment> {
    TEXT_ELEMENT
        .captures_iter(xml)
        .map(|caps| {
            let start = caps[1].parse::<f64>().unwrap_or(0.0);
            let duration = caps
                .get(2)
                .and_then(|d| d.as_str().parse::<f64>().ok())
                .unwrap_or(0.0);
            let text = INNER_TAG.replace_all(&caps[3], "");
            // timedtext payloads are frequently escaped twice
            let text = decode_entities(&decode_entities(&text));
            TranscriptFragment::new(text, start, duration)
        })
        .filter(|fragment| !fragment.text.trim().is_empty())
        .collect()
}

fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| match &caps[1] {
            "amp" => "&".to_string(),
            "lt" => "<".to_string(),
            "gt" => ">".to_string(),
            "quot" => "\"".to_string(),
            "apos" => "'".to_string(),
            numeric => {
                let code = match numeric.strip_prefix("#x") {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => numeric[1..].parse().ok(),
                };
                code.and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_else(|| caps[0].to_string())
            }
        })
        .into_owned()
}

/// Two-attempt caption policy: preferred language, then the fallback language
pub struct CaptionFetcher {
    source: Box<dyn CaptionSource>,
    preferred_language: String,
    fallback_language: String,
}

impl CaptionFetcher {
    pub fn new(
        source: Box<dyn CaptionSource>,
        preferred_language: impl Into<String>,
        fallback_language: impl Into<String>,
    ) -> Self {
        Self {
            source,
            preferred_language: preferred_language.into(),
            fallback_language: fallback_language.into(),
        }
    }

    pub fn from_config(config: &CaptionConfig) -> std::result::Result<Self, reqwest::Error> {
        Ok(Self::new(
            Box::new(YoutubeCaptionClient::new(config)?),
            config.preferred_language.clone(),
            config.fallback_language.clone(),
        ))
    }

    /// Fetch captions, falling back to the secondary language once
    pub async fn fetch(&self, video_id: &str) -> Result<Vec<TranscriptFragment>> {
        let mut languages = vec![self.preferred_language.as_str()];
        if self.fallback_language != self.preferred_language {
            languages.push(self.fallback_language.as_str());
        }

        let mut failures = Vec::new();
        for language in languages {
            let error = match self.source.fetch(video_id, language).await {
                Ok(fragments) if !fragments.is_empty() => {
                    tracing::info!(
                        "Fetched {} caption fragments in '{}' for {}",
                        fragments.len(),
                        language,
                        video_id
                    );
                    return Ok(fragments);
                }
                Ok(_) => CaptionError::Empty(language.to_string()),
                Err(e) => e,
            };

            tracing::warn!("Caption fetch in '{}' failed for {}: {}", language, video_id, error);
            failures.push(format!("{}: {}", language, error));
        }

        Err(AnalyzeError::NoTranscript(format!(
            "captions unavailable for video {} ({})",
            video_id,
            failures.join("; ")
        )))
    }
}
