use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::captions::{self, CaptionFetch};
use crate::cleanup;
use crate::prompts::PromptLibrary;
use crate::refine::{self, ReportGenerator};
use crate::store::TranscriptStore;
use crate::tools::{Downloader, VideoReference};
use crate::transcribe::{join_segments, ModelSize, SpeechRecognizer};
use crate::utils;
use crate::PipelineError;

/// Pipeline stages, carried inside a failure outcome so the UI can name the
/// step that broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    CaptionCheck,
    AudioDownload,
    Transcription,
    TranscriptCheck,
    Refinement,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validate => "input validation",
            Stage::CaptionCheck => "caption check",
            Stage::AudioDownload => "audio download",
            Stage::Transcription => "speech recognition",
            Stage::TranscriptCheck => "transcript validation",
            Stage::Refinement => "report generation",
        };
        write!(f, "{name}")
    }
}

/// Terminal result of one pipeline run. Stage failures come back as
/// `Failure`, never as `Err`; `Err` is reserved for setup faults.
#[derive(Debug)]
pub enum PipelineOutcome {
    Success {
        /// Saved transcript location, when persistence was requested and
        /// succeeded (persistence is best-effort).
        transcript_path: Option<PathBuf>,
        /// Generated report location, when refinement was requested.
        report_path: Option<PathBuf>,
    },
    Failure {
        stage: Stage,
        cause: PipelineError,
    },
}

/// Inputs for a fresh end-to-end video run.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub url: String,
    /// One-shot cookie blob for authenticated content
    pub cookies: Option<Vec<u8>>,
    /// Report destination; blank falls back to the current directory
    pub output_dir: Option<PathBuf>,
    pub model: ModelSize,
    /// None lets the recognizer auto-detect
    pub language: Option<String>,
    pub persona: String,
    /// false keeps the raw transcript as the final artifact
    pub refine: bool,
    pub save_transcript: bool,
}

/// Inputs for reprocessing an already-supplied transcript.
#[derive(Debug, Clone)]
pub struct TranscriptRequest {
    pub content: String,
    pub title: String,
    pub output_dir: Option<PathBuf>,
    pub persona: String,
    pub refine: bool,
    pub save_transcript: bool,
}

/// Per-invocation scratch arena. Every intermediate artifact of a run lives
/// under one temporary directory, so concurrent runs cannot collide and
/// dropping the workspace removes whatever a failed stage left behind.
pub struct RunWorkspace {
    temp: TempDir,
}

impl RunWorkspace {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new().context("Failed to create scratch directory")?;
        Ok(Self { temp })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn audio_path(&self) -> PathBuf {
        self.temp.path().join("audio.wav")
    }

    pub fn subtitle_path(&self) -> PathBuf {
        self.temp.path().join(captions::SUBTITLE_FILENAME)
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.temp.path().join("transcript.txt")
    }

    /// Materialize a one-shot credential file from uploaded cookie bytes.
    pub fn write_credential(&self, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.temp.path().join(format!(
            "{}{}.txt",
            cleanup::CREDENTIAL_PREFIX,
            &uuid::Uuid::new_v4().to_string()[..8]
        ));
        fs_err::write(&path, bytes).context("Failed to write credential file")?;
        Ok(path)
    }
}

/// Sequences caption attempt, audio fallback, persistence and refinement.
/// All collaborators sit behind traits so tests can substitute fakes.
pub struct Orchestrator {
    downloader: Arc<dyn Downloader>,
    recognizer: Arc<dyn SpeechRecognizer>,
    generator: Arc<dyn ReportGenerator>,
    store: TranscriptStore,
    prompts: PromptLibrary,
    caption_languages: Vec<String>,
    report_name: String,
}

impl Orchestrator {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        recognizer: Arc<dyn SpeechRecognizer>,
        generator: Arc<dyn ReportGenerator>,
        store: TranscriptStore,
        prompts: PromptLibrary,
        caption_languages: Vec<String>,
        report_name: impl Into<String>,
    ) -> Self {
        Self {
            downloader,
            recognizer,
            generator,
            store,
            prompts,
            caption_languages,
            report_name: report_name.into(),
        }
    }

    /// Process a fresh video end-to-end. Cleanup runs on every exit path:
    /// scratch files are removed explicitly and the workspace directory is
    /// dropped regardless of the outcome.
    pub async fn run(&self, request: AnalyzeRequest) -> Result<PipelineOutcome> {
        let workspace = RunWorkspace::new()?;

        let outcome = self.run_stages(&request, &workspace).await;

        cleanup::remove_files(&[
            workspace.audio_path(),
            workspace.subtitle_path(),
            workspace.transcript_path(),
        ]);
        cleanup::sweep_credentials(workspace.path());

        outcome
    }

    async fn run_stages(
        &self,
        request: &AnalyzeRequest,
        workspace: &RunWorkspace,
    ) -> Result<PipelineOutcome> {
        // Stage: validate
        stage_message("validating input");
        let url = match utils::validate_and_normalize_url(&request.url) {
            Ok(url) => url,
            Err(e) => return Ok(fail(Stage::Validate, PipelineError::InvalidInput(e.to_string()))),
        };
        let output_dir = match self.resolve_output_dir(request.output_dir.as_deref()) {
            Ok(dir) => dir,
            Err(e) => return Ok(fail(Stage::Validate, PipelineError::InvalidInput(e.to_string()))),
        };

        let mut video = VideoReference::new(url);
        if let Some(cookies) = &request.cookies {
            let credential = workspace.write_credential(cookies)?;
            video = video.with_credential(credential);
        }

        // Stage: caption attempt
        stage_message("checking for captions");
        let spinner = stage_spinner("Checking caption tracks...");
        let caption_fetch = captions::fetch_captions(
            self.downloader.as_ref(),
            &video,
            &self.caption_languages,
            workspace.path(),
        )
        .await;
        spinner.finish_and_clear();

        let transcript = match caption_fetch {
            Ok(CaptionFetch::Downloaded(subtitle_path)) => {
                let raw = match fs_err::read_to_string(&subtitle_path) {
                    Ok(raw) => raw,
                    Err(e) => {
                        return Ok(fail(Stage::CaptionCheck, PipelineError::File(e.to_string())))
                    }
                };
                captions::subtitle_to_plain_text(&raw)
            }
            Ok(CaptionFetch::NoCaptions) => {
                match self.audio_fallback(request, workspace, &video).await {
                    Ok(transcript) => transcript,
                    Err(outcome) => return Ok(outcome),
                }
            }
            Err(cause) => return Ok(fail(Stage::CaptionCheck, cause)),
        };

        // Stage: transcript invariant
        stage_message("validating transcript");
        if transcript.trim().is_empty() {
            return Ok(fail(Stage::TranscriptCheck, PipelineError::EmptyTranscript));
        }
        if let Err(e) = fs_err::write(workspace.transcript_path(), &transcript) {
            return Ok(fail(Stage::TranscriptCheck, PipelineError::File(e.to_string())));
        }

        // Stage: persist (best-effort, never fatal)
        let transcript_path = if request.save_transcript {
            let title = self.derive_title(&video).await;
            self.persist_transcript(&transcript, &title)
        } else {
            None
        };

        // Stage: refine
        let report_path = if request.refine {
            match self
                .refine_transcript(&transcript, &request.persona, &output_dir)
                .await
            {
                Ok(path) => Some(path),
                Err(cause) => return Ok(fail(Stage::Refinement, cause)),
            }
        } else {
            tracing::info!("refinement declined, keeping the raw transcript as the final artifact");
            None
        };

        Ok(PipelineOutcome::Success {
            transcript_path,
            report_path,
        })
    }

    /// Reprocess an uploaded or previously saved transcript: same persistence
    /// and refinement semantics, no acquisition stages.
    pub async fn run_transcript(&self, request: TranscriptRequest) -> Result<PipelineOutcome> {
        stage_message("validating transcript");
        if request.content.trim().is_empty() {
            return Ok(fail(Stage::TranscriptCheck, PipelineError::EmptyTranscript));
        }

        let output_dir = match self.resolve_output_dir(request.output_dir.as_deref()) {
            Ok(dir) => dir,
            Err(e) => return Ok(fail(Stage::Validate, PipelineError::InvalidInput(e.to_string()))),
        };

        let transcript_path = if request.save_transcript {
            self.persist_transcript(&request.content, &request.title)
        } else {
            None
        };

        let report_path = if request.refine {
            match self
                .refine_transcript(&request.content, &request.persona, &output_dir)
                .await
            {
                Ok(path) => Some(path),
                Err(cause) => return Ok(fail(Stage::Refinement, cause)),
            }
        } else {
            None
        };

        Ok(PipelineOutcome::Success {
            transcript_path,
            report_path,
        })
    }

    async fn audio_fallback(
        &self,
        request: &AnalyzeRequest,
        workspace: &RunWorkspace,
        video: &VideoReference,
    ) -> std::result::Result<String, PipelineOutcome> {
        // Stage: audio download
        stage_message("no usable captions, downloading audio");
        let spinner = stage_spinner("Downloading audio...");
        let audio_path = workspace.audio_path();
        let download = self.downloader.download_audio(video, &audio_path).await;
        spinner.finish_and_clear();

        if let Err(cause) = download {
            return Err(fail(Stage::AudioDownload, cause.into()));
        }
        if !audio_path.exists() {
            return Err(fail(
                Stage::AudioDownload,
                PipelineError::MissingInput(audio_path),
            ));
        }

        // Stage: transcription
        stage_message("transcribing audio (this can take a while)");
        let spinner = stage_spinner("Running speech recognition...");
        let segments = self
            .recognizer
            .transcribe(&audio_path, request.model, request.language.clone())
            .await;
        spinner.finish_and_clear();

        match segments {
            Ok(segments) => Ok(join_segments(&segments)),
            Err(cause) => Err(fail(Stage::Transcription, cause)),
        }
    }

    async fn refine_transcript(
        &self,
        transcript: &str,
        persona: &str,
        output_dir: &Path,
    ) -> std::result::Result<PathBuf, PipelineError> {
        stage_message("generating report");

        let template = self
            .prompts
            .load(persona)
            .map_err(|e| PipelineError::File(e.to_string()))?;
        let prompt = refine::build_prompt(&template, transcript);

        let spinner = stage_spinner("Waiting for the model...");
        let report = self.generator.generate(&prompt).await;
        spinner.finish_and_clear();
        let report = report?;

        let report_path = output_dir.join(format!("{}.md", self.report_name));
        fs_err::write(&report_path, &report).map_err(|e| PipelineError::File(e.to_string()))?;

        tracing::info!("report written to {}", report_path.display());
        Ok(report_path)
    }

    /// Best-effort persistence; a store error is logged and the run goes on.
    fn persist_transcript(&self, transcript: &str, title: &str) -> Option<PathBuf> {
        match self.store.save(transcript, title) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("persisting the transcript failed (continuing): {e}");
                None
            }
        }
    }

    async fn derive_title(&self, video: &VideoReference) -> String {
        let fallback = || format!("transcript_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S"));
        match self.downloader.fetch_title(video).await {
            Ok(Some(title)) => title,
            Ok(None) => fallback(),
            Err(e) => {
                tracing::warn!("could not fetch the video title: {e}");
                fallback()
            }
        }
    }

    fn resolve_output_dir(&self, requested: Option<&Path>) -> Result<PathBuf> {
        let dir = match requested {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => std::env::current_dir().context("Could not resolve the current directory")?,
        };
        if !dir.exists() {
            anyhow::bail!("output directory does not exist: {}", dir.display());
        }
        Ok(dir)
    }
}

fn fail(stage: Stage, cause: PipelineError) -> PipelineOutcome {
    tracing::error!("{stage} failed: {cause}");
    PipelineOutcome::Failure { stage, cause }
}

fn stage_message(msg: &str) {
    tracing::info!("{msg}");
}

fn stage_spinner(msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        spinner.set_style(style);
    }
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}
