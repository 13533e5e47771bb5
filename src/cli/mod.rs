use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::transcribe::ModelSize;

#[derive(Parser)]
#[command(
    name = "vidreport",
    about = "vidreport - turn YouTube videos into AI-generated analyst reports",
    version,
    long_about = "Downloads captions (or falls back to audio plus local speech recognition) for a YouTube video, then merges the transcript with a persona prompt and asks the Gemini API for a structured report."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process a video end-to-end: captions or speech-to-text, then a report
    Analyze {
        /// Video URL
        #[arg(value_name = "URL")]
        url: String,

        /// Cookies file for authenticated content (used once, then removed)
        #[arg(long, value_name = "FILE")]
        cookies: Option<PathBuf>,

        /// Directory for the generated report (defaults to the current directory)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Recognition model size (used only when the video has no captions)
        #[arg(short, long, value_enum)]
        model: Option<ModelSize>,

        /// Force a transcription language (auto-detect if not specified)
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,

        /// Persona prompt to analyze with
        #[arg(short, long, value_name = "NAME")]
        persona: Option<String>,

        /// Keep the raw transcript as the final artifact, skip the AI report
        #[arg(long)]
        no_refine: bool,

        /// Do not persist the transcript to the saved-transcripts folder
        #[arg(long)]
        no_save_transcript: bool,

        /// Gemini API key
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Generate a report from an existing transcript file
    Refine {
        /// Plain-text transcript file
        #[arg(value_name = "FILE")]
        transcript: PathBuf,

        /// Directory for the generated report (defaults to the current directory)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Persona prompt to analyze with
        #[arg(short, long, value_name = "NAME")]
        persona: Option<String>,

        /// Do not persist the transcript to the saved-transcripts folder
        #[arg(long)]
        no_save_transcript: bool,

        /// Gemini API key
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// List saved transcripts, or print one
    Transcripts {
        /// Transcript name to print
        #[arg(value_name = "NAME")]
        name: Option<String>,
    },

    /// Manage persona prompts
    Prompts {
        #[command(subcommand)]
        action: PromptAction,
    },

    /// Show or edit the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(Subcommand)]
pub enum PromptAction {
    /// List available personas
    List,
    /// Print one persona template
    Show {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Create or overwrite a persona from a file
    Save {
        #[arg(value_name = "NAME")]
        name: String,
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Delete a persona
    Delete {
        #[arg(value_name = "NAME")]
        name: String,
    },
}
