use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::analyze::Analysis;
use crate::cli::OutputFormat;
use crate::extractors::ExtractionResult;
use crate::utils::transcript_filename;

pub mod formatters;

pub use formatters::*;

fn render(analysis: &Analysis, format: &OutputFormat, styled: bool) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => format_as_text(analysis, styled)?,
        OutputFormat::Json => format_as_json(analysis)?,
        OutputFormat::Markdown => format_as_markdown(analysis)?,
    })
}

/// Save analysis to file
pub fn save_to_file(analysis: &Analysis, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render(analysis, format, false)?;

    fs_err::write(path, content)?;
    Ok(())
}

/// Print analysis to console
pub fn print_to_console(analysis: &Analysis, format: &OutputFormat) -> Result<()> {
    let content = render(analysis, format, true)?;

    println!("{}", content);
    Ok(())
}

/// Write an extraction result as JSON to `path`, or to stdout
pub fn write_extraction(result: &ExtractionResult, path: Option<&Path>) -> Result<()> {
    let content = format_extraction_json(result)?;
    match path {
        Some(path) => fs_err::write(path, content)?,
        None => println!("{}", content),
    }
    Ok(())
}

/// Save the extraction result under a timestamped name in `dir`
pub fn save_transcript(result: &ExtractionResult, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(transcript_filename(&result.video_info.id, chrono::Local::now()));
    let content = format_extraction_json(result)?;

    fs_err::write(&path, content).context("Failed to save transcript")?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::VideoInfo;

    #[test]
    fn test_save_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let result = ExtractionResult::succeeded(
            VideoInfo::with_defaults("abc123"),
            "안녕 하세요".to_string(),
            "fallback_transcript_api",
        );

        let path = save_transcript(&result, dir.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("transcript_abc123_"));
        assert!(name.ends_with(".json"));

        let saved: serde_json::Value = serde_json::from_str(&fs_err::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["transcript"], "안녕 하세요");
        assert_eq!(saved["videoInfo"]["id"], "abc123");
        assert_eq!(saved["method"], "fallback_transcript_api");
        assert_eq!(saved["success"], true);
    }

    #[test]
    fn test_write_extraction_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let result = ExtractionResult::succeeded(VideoInfo::with_defaults("xyz"), "text".to_string(), "subtitles");

        write_extraction(&result, Some(&path)).unwrap();
        let saved: serde_json::Value = serde_json::from_str(&fs_err::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["videoInfo"]["thumbnailUrl"], "https://img.youtube.com/vi/xyz/maxresdefault.jpg");
        assert!(saved.get("error").is_none());
    }
}
