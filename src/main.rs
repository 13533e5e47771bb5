use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidreport::{prompts, tools};

use vidreport::cli::{Cli, Commands, PromptAction};
use vidreport::config::Config;
use vidreport::pipeline::{AnalyzeRequest, Orchestrator, PipelineOutcome, TranscriptRequest};
use vidreport::prompts::PromptLibrary;
use vidreport::refine::GeminiClient;
use vidreport::store::TranscriptStore;
use vidreport::tools::YtDlp;
use vidreport::transcribe::{DeviceKind, WhisperRecognizer};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "vidreport=debug"
    } else {
        "vidreport=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().await?;

    match cli.command {
        Commands::Analyze {
            url,
            cookies,
            output_dir,
            model,
            language,
            persona,
            no_refine,
            no_save_transcript,
            api_key,
        } => {
            let missing_deps = tools::check_dependencies(&config.tools.yt_dlp_path).await;
            if !missing_deps.is_empty() {
                eprintln!("⚠️  Dependency check warnings:");
                for dep in missing_deps {
                    eprintln!("   • {}", dep);
                }
            }

            let refine_enabled = !no_refine;
            let api_key = resolve_api_key(api_key, refine_enabled)?;

            let cookies = match cookies {
                Some(path) => {
                    Some(fs_err::read(&path).context("Failed to read the cookies file")?)
                }
                None => None,
            };

            let orchestrator = build_orchestrator(&config, api_key).await;
            let request = AnalyzeRequest {
                url,
                cookies,
                output_dir,
                model: model.unwrap_or(config.whisper.default_model),
                language,
                persona: persona.unwrap_or_else(|| prompts::DEFAULT_PERSONA.to_string()),
                refine: refine_enabled,
                save_transcript: !no_save_transcript,
            };

            let outcome = orchestrator.run(request).await?;
            render_outcome(&outcome);
            if matches!(outcome, PipelineOutcome::Failure { .. }) {
                std::process::exit(1);
            }
        }

        Commands::Refine {
            transcript,
            output_dir,
            persona,
            no_save_transcript,
            api_key,
        } => {
            let content =
                fs_err::read_to_string(&transcript).context("Failed to read the transcript")?;
            let title = transcript
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "transcript".to_string());

            let api_key = resolve_api_key(api_key, true)?;
            let orchestrator = build_orchestrator(&config, api_key).await;

            let outcome = orchestrator
                .run_transcript(TranscriptRequest {
                    content,
                    title,
                    output_dir,
                    persona: persona.unwrap_or_else(|| prompts::DEFAULT_PERSONA.to_string()),
                    refine: true,
                    save_transcript: !no_save_transcript,
                })
                .await?;
            render_outcome(&outcome);
            if matches!(outcome, PipelineOutcome::Failure { .. }) {
                std::process::exit(1);
            }
        }

        Commands::Transcripts { name } => {
            let store = TranscriptStore::new(config.transcripts_dir());
            match name {
                Some(name) => println!("{}", store.load(&name)?),
                None => {
                    let names = store.list()?;
                    if names.is_empty() {
                        println!("No saved transcripts in {}", store.dir().display());
                    } else {
                        for name in names {
                            println!("{name}");
                        }
                    }
                }
            }
        }

        Commands::Prompts { action } => {
            let library = PromptLibrary::new(config.prompts_dir());
            match action {
                PromptAction::List => {
                    for name in library.list()? {
                        println!("{name}");
                    }
                }
                PromptAction::Show { name } => println!("{}", library.load(&name)?),
                PromptAction::Save { name, file } => {
                    let content =
                        fs_err::read_to_string(&file).context("Failed to read the prompt file")?;
                    library.save(&name, &content)?;
                    println!("Saved persona: {name}");
                }
                PromptAction::Delete { name } => {
                    library.delete(&name)?;
                    println!("Deleted persona: {name}");
                }
            }
        }

        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Edit the config file directly:");
                println!(
                    "  {}",
                    dirs::config_dir()
                        .map(|d| d.join("vidreport").join("config.yaml"))
                        .unwrap_or_default()
                        .display()
                );
            }
        }
    }

    Ok(())
}

fn resolve_api_key(api_key: Option<String>, refine_enabled: bool) -> Result<String> {
    match api_key {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ if refine_enabled => {
            anyhow::bail!(
                "a Gemini API key is required for report generation; pass --api-key, set GEMINI_API_KEY, or use --no-refine"
            )
        }
        _ => Ok(String::new()),
    }
}

async fn build_orchestrator(config: &Config, api_key: String) -> Orchestrator {
    let ffmpeg_hint = tools::probe_transcoder(config.tools.ffmpeg_path.as_deref()).await;
    let device = DeviceKind::detect().await;
    tracing::info!("compute device: {device}");

    Orchestrator::new(
        Arc::new(YtDlp::new(config.tools.yt_dlp_path.clone(), ffmpeg_hint)),
        Arc::new(WhisperRecognizer::new(&config.models_dir(), device)),
        Arc::new(GeminiClient::new(
            config.gemini.endpoint_base.clone(),
            config.gemini.model.clone(),
            api_key,
        )),
        TranscriptStore::new(config.transcripts_dir()),
        PromptLibrary::new(config.prompts_dir()),
        config.captions.languages.clone(),
        config.storage.report_name.clone(),
    )
}

fn render_outcome(outcome: &PipelineOutcome) {
    match outcome {
        PipelineOutcome::Success {
            transcript_path,
            report_path,
        } => {
            println!("{}", style("✅ Done").green().bold());
            if let Some(path) = report_path {
                println!("Report: {}", path.display());
            }
            if let Some(path) = transcript_path {
                println!("Transcript: {}", path.display());
            }
        }
        PipelineOutcome::Failure { stage, cause } => {
            println!(
                "{} during {}: {}",
                style("❌ Failed").red().bold(),
                stage,
                cause
            );
        }
    }
}
