use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::transcript::collapse_whitespace;
use super::video_id::resolve_video_id;
use super::{thumbnail_url, ExtractionResult, VideoInfo};
use crate::config::Config;
use crate::{AnalyzeError, Result};

/// Flag asking the extraction tool to transcribe audio when captions are missing
pub const SPEECH_FLAG: &str = "--whisper";

/// Primary transcript strategy
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrimaryExtractor: Send + Sync {
    /// Extract the transcript of the video at `url`
    async fn extract(&self, url: &str, use_speech_fallback: bool) -> Result<ExtractionResult>;

    /// Human-readable name of this strategy
    fn name(&self) -> &'static str;
}

/// Runs the external extraction tool as a child process
pub struct ProcessExtractor {
    program: String,
    leading_args: Vec<String>,
    envs: Vec<(String, String)>,
    timeout: Duration,
}

/// JSON line printed by the extraction tool
#[derive(Debug, Deserialize)]
struct ProcessPayload {
    success: bool,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default)]
    video_info: Option<ProcessVideoInfo>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProcessVideoInfo {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    duration: Value,
}

impl ProcessExtractor {
    pub fn new(program: impl Into<String>, leading_args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            leading_args,
            envs: Vec::new(),
            timeout,
        }
    }

    /// Python extraction script as configured
    pub fn from_config(config: &Config) -> Self {
        let mut extractor = Self::new(
            config.extractor.python.clone(),
            vec![config.extractor.script.to_string_lossy().into_owned()],
            Duration::from_secs(config.extractor.timeout_secs),
        );

        // speech transcription inside the tool needs the same credentials
        if let Some(key) = &config.llm.openai.api_key {
            extractor = extractor.with_env("OPENAI_API_KEY", key);
        }

        extractor
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Check if the interpreter can be launched
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Run the tool, killing it once the timeout elapses
    async fn run(&self, url: &str, use_speech_fallback: bool) -> Result<Output> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .arg(url)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if use_speech_fallback {
            command.arg(SPEECH_FLAG);
        }
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| {
            AnalyzeError::ProcessFailure(format!("failed to start {}: {}", self.program, e))
        })?;

        let mut stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| AnalyzeError::ProcessFailure("stdout was not captured".to_string()))?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| AnalyzeError::ProcessFailure("stderr was not captured".to_string()))?;

        // leader pid doubles as the process group id; read it before the child is reaped
        let pgid = child.id();

        let mut stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            stdout_pipe.read_to_end(&mut buf).await?;
            Ok::<Vec<u8>, std::io::Error>(buf)
        });
        let mut stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            stderr_pipe.read_to_end(&mut buf).await?;
            Ok::<Vec<u8>, std::io::Error>(buf)
        });

        // background children can hold the pipes open after the leader exits
        let finished = timeout(self.timeout, async {
            let status = child.wait().await.map_err(|e| {
                AnalyzeError::ProcessFailure(format!("failed to wait for {}: {}", self.program, e))
            })?;
            let stdout = collect_pipe(&mut stdout_task).await?;
            let stderr = collect_pipe(&mut stderr_task).await?;
            Ok::<Output, AnalyzeError>(Output { status, stdout, stderr })
        })
        .await;

        match finished {
            Ok(output) => output,
            Err(_) => {
                tracing::warn!(
                    "Extraction process exceeded {:?}; killing its process group",
                    self.timeout
                );
                kill_process_group(pgid);
                if let Err(e) = child.kill().await {
                    tracing::debug!("Extraction process already exited: {}", e);
                }
                stdout_task.abort();
                stderr_task.abort();
                Err(AnalyzeError::ProcessTimeout(self.timeout))
            }
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = pgid.and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        tracing::debug!("Failed to kill process group {}: {}", pgid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: Option<u32>) {}

async fn collect_pipe(task: &mut JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    task.await
        .map_err(|e| AnalyzeError::ProcessFailure(format!("output reader failed: {}", e)))?
        .map_err(|e| AnalyzeError::ProcessFailure(format!("failed to read process output: {}", e)))
}

#[async_trait]
impl PrimaryExtractor for ProcessExtractor {
    async fn extract(&self, url: &str, use_speech_fallback: bool) -> Result<ExtractionResult> {
        tracing::info!(
            "Running extraction process {} {:?} (speech fallback: {})",
            self.program,
            self.leading_args,
            use_speech_fallback
        );

        let output = self.run(url, use_speech_fallback).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !stderr.trim().is_empty() {
            tracing::debug!("Extraction process stderr:\n{}", stderr.trim_end());
        }

        if !output.status.success() {
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no diagnostics");
            return Err(AnalyzeError::ProcessFailure(format!(
                "{} exited with {}: {}",
                self.program, output.status, reason
            )));
        }

        let value = find_result_line(&stdout).ok_or_else(|| {
            AnalyzeError::ProcessFailure("no JSON result line in extraction output".to_string())
        })?;
        let payload: ProcessPayload = serde_json::from_value(value).map_err(|e| {
            AnalyzeError::ProcessFailure(format!("unexpected extraction result shape: {}", e))
        })?;

        into_extraction_result(payload, url)
    }

    fn name(&self) -> &'static str {
        "extraction process"
    }
}

/// First stdout line that is a JSON object carrying a boolean `success`
fn find_result_line(stdout: &str) -> Option<Value> {
    let mut candidates = stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{') && line.ends_with('}'))
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(|value| value.get("success").map_or(false, Value::is_boolean));

    let first = candidates.next()?;
    let ignored = candidates.count();
    if ignored > 0 {
        tracing::warn!(
            "Extraction output contained {} additional result lines; using the first",
            ignored
        );
    }

    Some(first)
}

fn into_extraction_result(payload: ProcessPayload, url: &str) -> Result<ExtractionResult> {
    if !payload.success {
        return Err(AnalyzeError::ProcessFailure(
            payload
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| "transcript extraction failed".to_string()),
        ));
    }

    let transcript = collapse_whitespace(payload.transcript.as_deref().unwrap_or_default());
    if transcript.is_empty() {
        return Err(AnalyzeError::ProcessFailure(
            "extraction process returned an empty transcript".to_string(),
        ));
    }

    let video_info = match payload.video_info {
        Some(info) if !info.id.is_empty() => VideoInfo {
            title: info
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "YouTube Video".to_string()),
            thumbnail_url: info
                .thumbnail_url
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| thumbnail_url(&info.id)),
            duration: duration_string(&info.duration),
            id: info.id,
        },
        _ => {
            let video_id = resolve_video_id(url).map_err(|_| {
                AnalyzeError::ProcessFailure("extraction result carried no video info".to_string())
            })?;
            VideoInfo::with_defaults(&video_id)
        }
    };

    Ok(ExtractionResult::succeeded(
        video_info,
        transcript,
        payload.method.unwrap_or_else(|| "process".to_string()),
    ))
}

/// The tool reports 0 when it could not read the duration
fn duration_string(duration: &Value) -> String {
    match duration {
        Value::Number(n) if n.as_f64().map_or(false, |secs| secs > 0.0) => match n.as_u64() {
            Some(secs) => secs.to_string(),
            None => n.to_string(),
        },
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => "Unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_result_line_skips_diagnostics() {
        let stdout = "비디오 ID: abc123\n{not json}\n{\"progress\": 3}\n  {\"success\": false, \"error\": \"x\"}  \n{\"success\": true}\n";
        let value = find_result_line(stdout).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"], json!("x"));
    }

    #[test]
    fn test_find_result_line_none() {
        assert!(find_result_line("").is_none());
        assert!(find_result_line("[1] trying caption api\ndone").is_none());
        assert!(find_result_line("{\"success\": \"yes\"}").is_none());
    }

    #[test]
    fn test_duration_string() {
        assert_eq!(duration_string(&json!(754)), "754");
        assert_eq!(duration_string(&json!(12.5)), "12.5");
        assert_eq!(duration_string(&json!(0)), "Unknown");
        assert_eq!(duration_string(&json!("PT5M")), "PT5M");
        assert_eq!(duration_string(&Value::Null), "Unknown");
    }

    #[test]
    fn test_failed_payload_carries_tool_error() {
        let payload: ProcessPayload = serde_json::from_value(json!({
            "success": false,
            "method": "none",
            "error": "자막 추출에 실패했습니다.",
            "transcript": ""
        }))
        .unwrap();

        let err = into_extraction_result(payload, "https://youtu.be/abc123").unwrap_err();
        assert!(matches!(err, AnalyzeError::ProcessFailure(msg) if msg == "자막 추출에 실패했습니다."));
    }

    #[test]
    fn test_missing_video_info_uses_defaults() {
        let payload: ProcessPayload = serde_json::from_value(json!({
            "success": true,
            "method": "transcript_api",
            "transcript": "  heat   the pan  "
        }))
        .unwrap();

        let result = into_extraction_result(payload, "https://youtu.be/abc123").unwrap();
        assert_eq!(result.transcript, "heat the pan");
        assert_eq!(result.video_info, VideoInfo::with_defaults("abc123"));
    }

    #[test]
    fn test_empty_transcript_is_a_failure() {
        let payload: ProcessPayload =
            serde_json::from_value(json!({"success": true, "transcript": " \n "})).unwrap();
        assert!(matches!(
            into_extraction_result(payload, "https://youtu.be/abc123"),
            Err(AnalyzeError::ProcessFailure(_))
        ));
    }

    #[cfg(unix)]
    mod scripts {
        use super::*;
        use std::path::PathBuf;
        use std::time::Instant;
        use tempfile::TempDir;

        fn script(body: &str) -> (TempDir, PathBuf) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("extract.sh");
            fs_err::write(&path, body).unwrap();
            (dir, path)
        }

        fn extractor(path: &PathBuf, timeout: Duration) -> ProcessExtractor {
            ProcessExtractor::new("sh", vec![path.to_string_lossy().into_owned()], timeout)
        }

        #[tokio::test]
        async fn test_maps_successful_result() {
            let (_dir, path) = script(
                r#"echo "비디오 ID: abc123"
echo "[1] 자막 API 시도 중..."
if [ "$2" = "--whisper" ]; then method=whisper_api; else method=transcript_api; fi
echo "{\"video_info\": {\"id\": \"abc123\", \"title\": \"김치찌개\", \"thumbnail_url\": \"https://i.ytimg.com/vi/abc123/hq.jpg\", \"duration\": 754}, \"transcript\": \"돼지고기를   볶아요\", \"method\": \"$method\", \"success\": true}"
echo "done" >&2
"#,
            );
            let extractor = extractor(&path, Duration::from_secs(10));

            let result = extractor.extract("https://youtu.be/abc123", false).await.unwrap();
            assert!(result.success);
            assert_eq!(result.method, "transcript_api");
            assert_eq!(result.transcript, "돼지고기를 볶아요");
            assert_eq!(result.video_info.title, "김치찌개");
            assert_eq!(result.video_info.thumbnail_url, "https://i.ytimg.com/vi/abc123/hq.jpg");
            assert_eq!(result.video_info.duration, "754");

            let result = extractor.extract("https://youtu.be/abc123", true).await.unwrap();
            assert_eq!(result.method, "whisper_api");
        }

        #[tokio::test]
        async fn test_reported_failure() {
            let (_dir, path) = script(
                r#"echo '{"success": false, "method": "none", "transcript": "", "error": "no captions"}'"#,
            );
            let err = extractor(&path, Duration::from_secs(10))
                .extract("https://youtu.be/abc123", false)
                .await
                .unwrap_err();
            assert!(matches!(err, AnalyzeError::ProcessFailure(msg) if msg == "no captions"));
        }

        #[tokio::test]
        async fn test_output_without_json() {
            let (_dir, path) = script("echo 'Traceback (most recent call last):'\n");
            let err = extractor(&path, Duration::from_secs(10))
                .extract("https://youtu.be/abc123", false)
                .await
                .unwrap_err();
            assert!(matches!(err, AnalyzeError::ProcessFailure(msg) if msg.contains("no JSON")));
        }

        #[tokio::test]
        async fn test_non_zero_exit() {
            let (_dir, path) = script("echo 'ModuleNotFoundError: yt_dlp' >&2\nexit 3\n");
            let err = extractor(&path, Duration::from_secs(10))
                .extract("https://youtu.be/abc123", false)
                .await
                .unwrap_err();
            assert!(matches!(err, AnalyzeError::ProcessFailure(msg) if msg.contains("ModuleNotFoundError")));
        }

        #[tokio::test]
        async fn test_timeout_kills_process() {
            let (_dir, path) = script("exec sleep 30\n");
            let started = Instant::now();
            let err = extractor(&path, Duration::from_millis(200))
                .extract("https://youtu.be/abc123", false)
                .await
                .unwrap_err();
            assert!(matches!(err, AnalyzeError::ProcessTimeout(_)));
            assert_eq!(err.to_string(), "Extraction process timed out after 200ms");
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[tokio::test]
        async fn test_timeout_covers_inherited_output_pipe() {
            let (_dir, path) = script(
                "sleep 4 &\necho '{\"success\": true, \"method\": \"transcript_api\", \"transcript\": \"boil water\"}'\n",
            );
            let started = Instant::now();
            let err = extractor(&path, Duration::from_secs(1))
                .extract("https://youtu.be/abc123", false)
                .await
                .unwrap_err();
            assert!(matches!(err, AnalyzeError::ProcessTimeout(_)));
            assert!(started.elapsed() < Duration::from_secs(3));
        }

        #[tokio::test]
        async fn test_timeout_kills_background_children() {
            let (dir, path) = script("(sleep 1; touch \"$MARKER\") &\nsleep 30\n");
            let marker = dir.path().join("survived");
            let err = extractor(&path, Duration::from_millis(300))
                .with_env("MARKER", marker.to_string_lossy())
                .extract("https://youtu.be/abc123", false)
                .await
                .unwrap_err();
            assert!(matches!(err, AnalyzeError::ProcessTimeout(_)));

            tokio::time::sleep(Duration::from_millis(1500)).await;
            assert!(!marker.exists());
        }

        #[tokio::test]
        async fn test_missing_program() {
            let extractor = ProcessExtractor::new(
                "definitely-not-a-real-interpreter",
                Vec::new(),
                Duration::from_secs(1),
            );
            assert!(!extractor.check_availability().await);
            let err = extractor.extract("https://youtu.be/abc123", false).await.unwrap_err();
            assert!(matches!(err, AnalyzeError::ProcessFailure(msg) if msg.contains("failed to start")));
        }
    }
}
