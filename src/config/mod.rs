use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Summarization backend settings
    pub llm: LlmConfig,

    /// External extraction process settings
    pub extractor: ExtractorConfig,

    /// Caption API fallback settings
    pub captions: CaptionConfig,
}

/// Summarization backends known to the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    OpenAi,
    Clova,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "openai",
            BackendKind::Clova => "clova",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(BackendKind::OpenAi),
            "clova" => Ok(BackendKind::Clova),
            other => anyhow::bail!("Unknown LLM provider: {}", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Which backend summarizes transcripts
    pub backend: BackendKind,

    /// Language the recipe should be written in
    pub response_language: String,

    pub openai: OpenAiConfig,

    pub clova: ClovaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key (overridden by OPENAI_API_KEY)
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    pub base_url: String,

    pub model: String,

    pub temperature: f32,

    pub max_tokens: u32,

    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClovaConfig {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Interpreter used to run the extraction script
    pub python: String,

    /// Path to the extraction script
    pub script: PathBuf,

    /// Hard limit for a single extraction run
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionConfig {
    /// Caption language requested first
    pub preferred_language: String,

    /// Caption language requested when the preferred one fails
    pub fallback_language: String,

    /// Origin serving watch pages
    pub base_url: String,

    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                backend: BackendKind::OpenAi,
                response_language: "Korean".to_string(),
                openai: OpenAiConfig {
                    api_key: None,
                    base_url: "https://api.openai.com/v1".to_string(),
                    model: "gpt-4o-mini".to_string(),
                    temperature: 0.3,
                    max_tokens: 2000,
                    request_timeout_secs: 120,
                },
                clova: ClovaConfig {
                    api_key: None,
                    api_url: None,
                },
            },
            extractor: ExtractorConfig {
                python: default_python(),
                script: PathBuf::from("scripts/youtube_extractor.py"),
                timeout_secs: 300,
            },
            captions: CaptionConfig {
                preferred_language: "ko".to_string(),
                fallback_language: "en".to_string(),
                base_url: "https://www.youtube.com".to_string(),
                request_timeout_secs: 30,
            },
        }
    }
}

/// Prefer a project-local virtualenv interpreter when one exists
fn default_python() -> String {
    let venv = if cfg!(windows) {
        PathBuf::from("venv").join("Scripts").join("python.exe")
    } else {
        PathBuf::from("venv").join("bin").join("python")
    };

    if venv.exists() {
        venv.to_string_lossy().into_owned()
    } else {
        "python3".to_string()
    }
}

impl Config {
    /// Load configuration from an explicit path, the default locations, or create default
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::read_from(path)?,
            None => {
                let config_path = Self::config_path()?;
                if config_path.exists() {
                    Self::read_from(&config_path)?
                } else {
                    let config = Self::default();
                    config.save_to(&config_path)?;
                    tracing::info!("Wrote default configuration to {}", config_path.display());
                    config
                }
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn read_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        serde_yaml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("recipe-scribe").join("config.yaml"))
    }

    /// Apply process environment overrides, read once at startup
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = lookup("LLM_PROVIDER") {
            match provider.parse() {
                Ok(kind) => self.llm.backend = kind,
                Err(e) => tracing::warn!("{}; keeping '{}'", e, self.llm.backend),
            }
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.openai.api_key = Some(key);
        }
        if let Some(key) = lookup("CLOVA_API_KEY") {
            self.llm.clova.api_key = Some(key);
        }
        if let Some(url) = lookup("CLOVA_API_URL") {
            self.llm.clova.api_url = Some(url);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.extractor.timeout_secs == 0 {
            anyhow::bail!("extractor.timeout_secs must be greater than zero");
        }
        if self.captions.request_timeout_secs == 0 || self.llm.openai.request_timeout_secs == 0 {
            anyhow::bail!("Request timeouts must be greater than zero");
        }
        if self.captions.preferred_language.trim().is_empty()
            || self.captions.fallback_language.trim().is_empty()
        {
            anyhow::bail!("Caption languages must not be empty");
        }
        url::Url::parse(&self.captions.base_url).context("captions.base_url is not a valid URL")?;
        url::Url::parse(&self.llm.openai.base_url)
            .context("llm.openai.base_url is not a valid URL")?;

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  LLM Backend: {}", self.llm.backend);
        println!("  Response Language: {}", self.llm.response_language);
        println!("  OpenAI Model: {}", self.llm.openai.model);
        println!("  OpenAI Base URL: {}", self.llm.openai.base_url);
        println!("  OpenAI API Key: {}", mask_secret(self.llm.openai.api_key.as_deref()));
        println!("  Clova API Key: {}", mask_secret(self.llm.clova.api_key.as_deref()));
        println!("  Python: {}", self.extractor.python);
        println!("  Extractor Script: {}", self.extractor.script.display());
        println!("  Extractor Timeout: {}s", self.extractor.timeout_secs);
        println!(
            "  Caption Languages: {} -> {}",
            self.captions.preferred_language, self.captions.fallback_language
        );
    }
}

fn mask_secret(secret: Option<&str>) -> String {
    match secret {
        Some(s) if s.chars().count() > 8 => {
            let tail: String = s.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            format!("****{}", tail)
        }
        Some(_) => "****".to_string(),
        None => "(not set)".to_string(),
    }
}
