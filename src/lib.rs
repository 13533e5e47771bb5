//! vidreport - turn a YouTube video into an AI-generated analyst report
//!
//! The library tries caption tracks first (prioritized language list, then
//! auto-generated captions), falls back to audio download plus local speech
//! recognition, and hands the resulting transcript together with a persona
//! prompt to the Gemini API.

pub mod captions;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod prompts;
pub mod refine;
pub mod store;
pub mod tools;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use pipeline::{AnalyzeRequest, Orchestrator, PipelineOutcome, Stage};
pub use tools::{Downloader, ToolError, VideoReference};
pub use transcribe::{DeviceKind, ModelSize, SpeechRecognizer};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Stage-terminal error taxonomy carried inside a failed pipeline outcome.
///
/// Recoverable conditions (an empty caption language candidate, a missing
/// transcoder, "no captions at all") never appear here; they drive fallback
/// branches instead.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("required input file is missing: {0}")]
    MissingInput(std::path::PathBuf),

    #[error("transcript is empty")]
    EmptyTranscript,

    #[error("speech recognition failed: {0}")]
    RecognitionFailed(String),

    #[error("report generation was blocked: {0}")]
    RefinementBlocked(String),

    #[error("report generation transport error: {0}")]
    RefinementTransport(String),

    #[error("file operation failed: {0}")]
    File(String),
}
