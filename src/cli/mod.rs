use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::server::DEFAULT_BIND;

#[derive(Parser)]
#[command(
    name = "recipescribe",
    about = "Recipe Scribe - Turn YouTube cooking videos into structured recipes",
    version,
    long_about = "Extracts the captions or speech of a YouTube cooking video and summarizes them with a language model into a recipe with ingredients, tools, numbered steps, timing and tips."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./config.yaml, then the user config directory)
    #[arg(short, long, global = true, env = "RECIPE_SCRIBE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a cooking video and generate a recipe
    Analyze {
        /// YouTube video URL (watch, youtu.be, embed or /v/ links)
        #[arg(value_name = "URL")]
        url: String,

        /// Ask the extraction process for speech transcription up front
        #[arg(long)]
        speech_fallback: bool,

        /// Do not retry with speech transcription when no transcript is found
        #[arg(long)]
        no_speech_retry: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Also save the extracted transcript as JSON in the current directory
        #[arg(long)]
        save_transcript: bool,
    },

    /// Extract the transcript only, without generating a recipe
    Transcript {
        /// YouTube video URL
        #[arg(value_name = "URL")]
        url: String,

        /// Ask the extraction process for speech transcription
        #[arg(long)]
        speech_fallback: bool,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Serve the analysis API over HTTP
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = DEFAULT_BIND, value_name = "ADDR")]
        bind: String,
    },

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum OutputFormat {
    /// Styled plain text
    Text,
    /// Pretty-printed JSON
    Json,
    /// Markdown document
    Markdown,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}
