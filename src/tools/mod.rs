use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// An opaque reference to a source video: the URL plus an optional one-shot
/// cookies file for authenticated content. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct VideoReference {
    url: String,
    credential: Option<PathBuf>,
}

impl VideoReference {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credential: None,
        }
    }

    pub fn with_credential(mut self, path: PathBuf) -> Self {
        self.credential = Some(path);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn credential(&self) -> Option<&Path> {
        self.credential.as_deref()
    }
}

/// Typed errors from external tool invocations. Callers above this layer
/// never see a raw process error.
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error("{tool} not found - please install it and make sure it is on PATH")]
    NotFound { tool: String },

    #[error("{tool} exited with {status:?}: {stderr}")]
    ExecutionFailed {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },
}

/// Captured output of a successful tool run.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Seam for the video/caption downloader tool. The pipeline only talks to
/// this trait; `YtDlp` is the production implementation.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// List the caption tracks available for a video (`--list-subs` output).
    async fn list_subtitles(&self, video: &VideoReference) -> Result<ToolOutput, ToolError>;

    /// Download the caption track for one language to files named after
    /// `out_stem`. Success does not imply a file was produced; callers must
    /// check the filesystem.
    async fn download_subtitle(
        &self,
        video: &VideoReference,
        lang: &str,
        out_stem: &Path,
    ) -> Result<(), ToolError>;

    /// Download the auto-generated caption track.
    async fn download_auto_subtitle(
        &self,
        video: &VideoReference,
        out_stem: &Path,
    ) -> Result<(), ToolError>;

    /// Extract best-available audio as 16 kHz mono WAV to `out_path`.
    async fn download_audio(&self, video: &VideoReference, out_path: &Path)
        -> Result<(), ToolError>;

    /// Fetch the video title for deriving a saved-transcript name.
    async fn fetch_title(&self, video: &VideoReference) -> Result<Option<String>, ToolError>;
}

/// yt-dlp subprocess adapter. Does not retry; retry policy belongs to the
/// orchestrator.
pub struct YtDlp {
    path: String,
    ffmpeg_location: Option<PathBuf>,
}

impl YtDlp {
    pub fn new(path: impl Into<String>, ffmpeg_location: Option<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ffmpeg_location,
        }
    }

    async fn run(&self, args: &[String]) -> Result<ToolOutput, ToolError> {
        tracing::debug!(tool = %self.path, ?args, "running downloader");

        let output = Command::new(&self.path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ToolError::NotFound {
                        tool: self.path.clone(),
                    }
                } else {
                    ToolError::ExecutionFailed {
                        tool: self.path.clone(),
                        status: None,
                        stderr: e.to_string(),
                    }
                }
            })?;

        if !output.status.success() {
            return Err(ToolError::ExecutionFailed {
                tool: self.path.clone(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn with_common_flags(&self, mut args: Vec<String>, video: &VideoReference) -> Vec<String> {
        if let Some(cookies) = video.credential() {
            args.push("--cookies".into());
            args.push(cookies.to_string_lossy().into_owned());
        }
        args.push(video.url().to_string());
        args
    }

    fn subtitle_args(&self, lang: &str, out_stem: &Path) -> Vec<String> {
        vec![
            "--write-sub".into(),
            "--sub-lang".into(),
            lang.into(),
            "--skip-download".into(),
            "--sub-format".into(),
            "vtt".into(),
            "--no-playlist".into(),
            "-o".into(),
            out_stem.to_string_lossy().into_owned(),
        ]
    }

    fn auto_subtitle_args(&self, out_stem: &Path) -> Vec<String> {
        vec![
            "--write-auto-sub".into(),
            "--skip-download".into(),
            "--sub-format".into(),
            "vtt".into(),
            "--no-playlist".into(),
            "-o".into(),
            out_stem.to_string_lossy().into_owned(),
        ]
    }

    fn audio_args(&self, out_path: &Path) -> Vec<String> {
        let mut args = vec![
            "-x".into(),
            "--audio-format".into(),
            "wav".into(),
            // Whisper expects 16 kHz mono PCM
            "--postprocessor-args".into(),
            "ffmpeg:-ar 16000 -ac 1".into(),
            "--no-playlist".into(),
            "-o".into(),
            out_path.to_string_lossy().into_owned(),
        ];
        if let Some(location) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(location.to_string_lossy().into_owned());
        }
        args
    }
}

#[async_trait]
impl Downloader for YtDlp {
    async fn list_subtitles(&self, video: &VideoReference) -> Result<ToolOutput, ToolError> {
        let args = self.with_common_flags(vec!["--list-subs".into()], video);
        self.run(&args).await
    }

    async fn download_subtitle(
        &self,
        video: &VideoReference,
        lang: &str,
        out_stem: &Path,
    ) -> Result<(), ToolError> {
        let args = self.with_common_flags(self.subtitle_args(lang, out_stem), video);
        self.run(&args).await.map(|_| ())
    }

    async fn download_auto_subtitle(
        &self,
        video: &VideoReference,
        out_stem: &Path,
    ) -> Result<(), ToolError> {
        let args = self.with_common_flags(self.auto_subtitle_args(out_stem), video);
        self.run(&args).await.map(|_| ())
    }

    async fn download_audio(
        &self,
        video: &VideoReference,
        out_path: &Path,
    ) -> Result<(), ToolError> {
        let args = self.with_common_flags(self.audio_args(out_path), video);
        self.run(&args).await.map(|_| ())
    }

    async fn fetch_title(&self, video: &VideoReference) -> Result<Option<String>, ToolError> {
        let args =
            self.with_common_flags(vec!["--dump-json".into(), "--no-playlist".into()], video);
        let output = self.run(&args).await?;

        let info: serde_json::Value =
            serde_json::from_str(&output.stdout).map_err(|e| ToolError::ExecutionFailed {
                tool: self.path.clone(),
                status: None,
                stderr: format!("unparseable metadata: {e}"),
            })?;

        Ok(info["title"].as_str().map(|s| s.to_string()))
    }
}

/// Check whether the transcoder is usable and return the location hint to pass
/// to the downloader. A missing transcoder degrades to yt-dlp's builtin
/// conversion path.
pub async fn probe_transcoder(configured: Option<&Path>) -> Option<PathBuf> {
    let candidate = configured
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ffmpeg".to_string());

    let available = Command::new(&candidate)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false);

    if available {
        tracing::info!("found ffmpeg: {}", candidate);
        // Only a non-default path is worth passing along as a hint
        configured.map(|p| p.to_path_buf())
    } else {
        tracing::warn!("ffmpeg not found, relying on the downloader's builtin conversion");
        None
    }
}

/// Check if the current environment has the required external tools.
pub async fn check_dependencies(yt_dlp_path: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(yt_dlp_path).await {
        missing.push(format!(
            "{} - required for caption and audio download",
            yt_dlp_path
        ));
    }

    if !check_command_available("ffmpeg").await {
        missing.push("ffmpeg - recommended for audio conversion".to_string());
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    Command::new(command)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
