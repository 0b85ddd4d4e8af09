use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::LlmConfig;
use crate::extractors::VideoInfo;
use crate::{AnalyzeError, Result};

pub mod backend;

pub use backend::{build_backend, ClovaBackend, OpenAiBackend, SummarizationBackend};

const SYSTEM_PROMPT: &str = "You are a culinary expert. You analyze YouTube cooking videos and \
produce accurate, practical recipes from what the cook says and shows.";

/// Structured recipe derived from a video transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    /// Identifier of the source video
    pub id: String,

    pub title: String,

    /// Two or three sentence overview
    pub summary: String,

    pub ingredients: Vec<String>,

    pub tools: Vec<String>,

    pub steps: Vec<RecipeStep>,

    pub total_time: String,

    pub tips: Vec<String>,

    pub video_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// One numbered instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeStep {
    /// 1-based position
    pub step: u32,

    pub description: String,

    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,

    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<String>,
}

/// Recipe fields as produced by the model
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecipeDraft {
    title: String,
    #[serde(default)]
    summary: String,
    ingredients: Vec<String>,
    #[serde(default)]
    tools: Vec<String>,
    steps: Vec<RecipeStep>,
    #[serde(default)]
    total_time: String,
    #[serde(default)]
    tips: Vec<String>,
}

fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

impl RecipeDraft {
    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(AnalyzeError::MalformedRecipe("recipe has no title".to_string()));
        }
        if self.steps.is_empty() {
            return Err(AnalyzeError::MalformedRecipe("recipe has no steps".to_string()));
        }
        for (index, step) in self.steps.iter().enumerate() {
            let expected = index as u32 + 1;
            if step.step != expected {
                return Err(AnalyzeError::MalformedRecipe(format!(
                    "step numbers must run 1..{} without gaps, found {} at position {}",
                    self.steps.len(),
                    step.step,
                    expected
                )));
            }
            if step.description.trim().is_empty() {
                return Err(AnalyzeError::MalformedRecipe(format!("step {} has no description", expected)));
            }
        }
        Ok(())
    }

    fn into_recipe(self, video_info: &VideoInfo, created_at: DateTime<Utc>) -> Recipe {
        Recipe {
            id: video_info.id.clone(),
            title: self.title,
            summary: self.summary,
            ingredients: self.ingredients,
            tools: self.tools,
            steps: self.steps,
            total_time: self.total_time,
            tips: self.tips,
            video_url: video_info.watch_url(),
            thumbnail_url: Some(video_info.thumbnail_url.clone()).filter(|t| !t.is_empty()),
            created_at,
        }
    }
}

/// Summarizes transcripts into recipes with one backend
pub struct RecipeGenerator {
    backend: Box<dyn SummarizationBackend>,
    response_language: String,
}

impl RecipeGenerator {
    pub fn new(backend: Box<dyn SummarizationBackend>, response_language: impl Into<String>) -> Self {
        Self {
            backend,
            response_language: response_language.into(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self::new(build_backend(config)?, config.response_language.clone()))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Generate a recipe from a transcript
    pub async fn generate(&self, transcript: &str, video_info: &VideoInfo) -> Result<Recipe> {
        tracing::info!("Generating recipe with {} backend", self.backend.name());

        let prompt = build_prompt(transcript, video_info, &self.response_language);
        let raw = self.backend.complete(SYSTEM_PROMPT, &prompt).await?;
        tracing::debug!("Raw model response:\n{}", raw);

        let recipe = parse_recipe(&raw, video_info, Utc::now())?;
        tracing::info!("Generated recipe: {}", recipe.title);
        Ok(recipe)
    }
}

fn build_prompt(transcript: &str, video_info: &VideoInfo, language: &str) -> String {
    format!(
        r#"Analyze the transcript of the following YouTube cooking video and write a structured recipe.

Video information:
- Title: {title}
- URL: {url}
- Duration: {duration}

Transcript:
{transcript}

Respond with a single JSON object in exactly this shape:
{{
  "title": "Recipe title",
  "summary": "Summary of the dish (2-3 sentences)",
  "ingredients": ["ingredient 1", "ingredient 2"],
  "tools": ["tool 1", "tool 2"],
  "steps": [
    {{
      "step": 1,
      "description": "What to do",
      "time": "How long it takes (optional)",
      "temperature": "Heat or temperature (optional)"
    }}
  ],
  "totalTime": "Total time",
  "tips": ["tip 1", "tip 2"]
}}

Number the steps from 1 without gaps. Write every value in {language}."#,
        title = video_info.title,
        url = video_info.watch_url(),
        duration = video_info.duration,
        transcript = transcript,
        language = language,
    )
}

/// Remove a Markdown code fence wrapped around the response
pub fn strip_code_fences(raw: &str) -> &str {
    let mut body = raw.trim();

    if let Some(rest) = body.strip_prefix("```") {
        let tag_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        body = &rest[tag_len..];
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }

    body.trim()
}

/// Parse a model response into a recipe for `video_info`
pub fn parse_recipe(raw: &str, video_info: &VideoInfo, created_at: DateTime<Utc>) -> Result<Recipe> {
    let body = strip_code_fences(raw);
    // tolerate a sentence of prose around the object
    let body = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    };

    let draft: RecipeDraft = serde_json::from_str(body)
        .map_err(|e| AnalyzeError::MalformedRecipe(e.to_string()))?;
    draft.validate()?;

    Ok(draft.into_recipe(video_info, created_at))
}
