use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::{BackendKind, ClovaConfig, LlmConfig, OpenAiConfig};
use crate::{AnalyzeError, Result};

/// A language model that turns a prompt into free text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SummarizationBackend: Send + Sync {
    /// Run one completion with a system role and a user prompt
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;

    /// Backend name as used in configuration
    fn name(&self) -> &'static str;
}

/// Build the backend selected in configuration
pub fn build_backend(config: &LlmConfig) -> Result<Box<dyn SummarizationBackend>> {
    match config.backend {
        BackendKind::OpenAi => Ok(Box::new(OpenAiBackend::new(&config.openai)?)),
        BackendKind::Clova => Ok(Box::new(ClovaBackend::new(&config.clova))),
    }
}

/// OpenAI-compatible chat completions backend
pub struct OpenAiBackend {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiBackend {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AnalyzeError::BackendUnavailable(
                    "OpenAI API key is not configured (set OPENAI_API_KEY)".to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AnalyzeError::BackendUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl SummarizationBackend for OpenAiBackend {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        tracing::debug!("Requesting completion from {} ({})", self.endpoint, self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": &self.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": prompt },
                ],
                "temperature": self.temperature,
                "max_tokens": self.max_tokens,
                "response_format": { "type": "json_object" },
            }))
            .send()
            .await
            .map_err(|e| AnalyzeError::BackendUnavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(AnalyzeError::BackendUnavailable(format!("HTTP {}: {}", status, excerpt)));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| AnalyzeError::BackendUnavailable(format!("invalid API response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AnalyzeError::BackendUnavailable("the model returned an empty response".to_string()))
    }

    fn name(&self) -> &'static str {
        BackendKind::OpenAi.as_str()
    }
}

/// Declared backend for Naver Clova Studio; not wired up yet
pub struct ClovaBackend {
    api_url: Option<String>,
}

impl ClovaBackend {
    pub fn new(config: &ClovaConfig) -> Self {
        Self {
            api_url: config.api_url.clone(),
        }
    }
}

#[async_trait]
impl SummarizationBackend for ClovaBackend {
    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
        tracing::error!(
            "Clova backend selected (endpoint: {}) but it is not implemented",
            self.api_url.as_deref().unwrap_or("unset")
        );
        Err(AnalyzeError::BackendNotImplemented(self.name().to_string()))
    }

    fn name(&self) -> &'static str {
        BackendKind::Clova.as_str()
    }
}
