use chrono::{DateTime, Local};
use std::time::Duration;

use crate::config::Config;
use crate::extractors::ProcessExtractor;

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Render a reported video duration; plain seconds become `12m 5s`
pub fn display_duration(duration: &str) -> String {
    match duration.trim().parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds > 0.0 => format_duration(seconds),
        _ => duration.to_string(),
    }
}

/// Sanitize filename for safe filesystem usage
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            c if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' => c,
            _ => '_',
        })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

/// File name for a saved transcript: `transcript_<id>_<YYYYmmdd_HHMMSS>.json`
pub fn transcript_filename(video_id: &str, at: DateTime<Local>) -> String {
    format!(
        "transcript_{}_{}.json",
        sanitize_filename(video_id),
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Check if the current environment has the extraction tooling
pub async fn check_dependencies(config: &Config) -> Vec<String> {
    let mut missing = Vec::new();

    let interpreter = ProcessExtractor::new(
        config.extractor.python.clone(),
        Vec::new(),
        Duration::from_secs(config.extractor.timeout_secs),
    );
    if !interpreter.check_availability().await {
        missing.push(format!(
            "{} - required to run the extraction script (caption fallback still works)",
            config.extractor.python
        ));
    }

    if !config.extractor.script.is_file() {
        missing.push(format!(
            "{} - extraction script not found (it is not bundled; install one and set extractor.script, otherwise every run uses the caption fallback)",
            config.extractor.script.display()
        ));
    }

    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30s");
        assert_eq!(format_duration(725.0), "12m 5s");
        assert_eq!(format_duration(3661.0), "1h 1m 1s");
    }

    #[test]
    fn test_display_duration() {
        assert_eq!(display_duration("725"), "12m 5s");
        assert_eq!(display_duration("725.4"), "12m 5s");
        assert_eq!(display_duration("Unknown"), "Unknown");
        assert_eq!(display_duration("10:05"), "10:05");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("abc123"), "abc123");
        assert_eq!(sanitize_filename("a-b_c"), "a-b_c");
        assert_eq!(sanitize_filename("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_filename("id?x"), "id_x");
    }

    #[test]
    fn test_transcript_filename() {
        let at = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(transcript_filename("abc123", at), "transcript_abc123_20260304_050607.json");
    }

    #[tokio::test]
    async fn test_check_dependencies_reports_missing_tools() {
        let mut config = Config::default();
        config.extractor.python = "definitely-not-a-real-python-binary".to_string();
        config.extractor.script = "does/not/exist.py".into();

        let missing = check_dependencies(&config).await;
        assert_eq!(missing.len(), 2);
        assert!(missing[0].starts_with("definitely-not-a-real-python-binary"));
        assert!(missing[1].starts_with("does/not/exist.py - extraction script not found"));
        assert!(missing[1].contains("extractor.script"));
        assert!(missing[1].contains("caption fallback"));
    }
}
