use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::transcribe::ModelSize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// External tool settings
    pub tools: ToolsConfig,

    /// Caption handling
    pub captions: CaptionsConfig,

    /// Local speech recognition
    pub whisper: WhisperConfig,

    /// Report generation
    pub gemini: GeminiConfig,

    /// Durable storage locations
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path or command name for yt-dlp
    pub yt_dlp_path: String,

    /// Explicit ffmpeg location (PATH lookup if unset)
    pub ffmpeg_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionsConfig {
    /// Strict caption language priority order
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperConfig {
    /// Directory holding GGML model files (defaults to the data dir)
    pub models_dir: Option<PathBuf>,

    /// Model used when the CLI does not specify one
    pub default_model: ModelSize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API base, without the model segment
    pub endpoint_base: String,

    /// Model identifier
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Saved transcripts folder (defaults to the data dir)
    pub transcripts_dir: Option<PathBuf>,

    /// Persona prompts folder (defaults to the data dir)
    pub prompts_dir: Option<PathBuf>,

    /// Base name for generated report files
    pub report_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: ToolsConfig {
                yt_dlp_path: "yt-dlp".to_string(),
                ffmpeg_path: None,
            },
            captions: CaptionsConfig {
                languages: vec![
                    "zh-TW".to_string(),
                    "zh-CN".to_string(),
                    "zh".to_string(),
                    "en".to_string(),
                ],
            },
            whisper: WhisperConfig {
                models_dir: None,
                default_model: ModelSize::Base,
            },
            gemini: GeminiConfig {
                endpoint_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-2.0-flash".to_string(),
            },
            storage: StorageConfig {
                transcripts_dir: None,
                prompts_dir: None,
                report_name: "video_report".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content =
                fs_err::read_to_string(&config_path).context("Failed to read config file")?;

            let config: Config =
                serde_yaml::from_str(&content).context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // A local config.yaml takes precedence for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("vidreport").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.captions.languages.is_empty() {
            anyhow::bail!("caption language priority list must not be empty");
        }

        if self.tools.yt_dlp_path.trim().is_empty() {
            anyhow::bail!("yt-dlp path must be configured");
        }

        Ok(())
    }

    /// Resolved whisper model directory
    pub fn models_dir(&self) -> PathBuf {
        self.whisper
            .models_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("models"))
    }

    /// Resolved saved-transcripts directory
    pub fn transcripts_dir(&self) -> PathBuf {
        self.storage
            .transcripts_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("transcripts"))
    }

    /// Resolved persona prompts directory
    pub fn prompts_dir(&self) -> PathBuf {
        self.storage
            .prompts_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("prompts"))
    }

    fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidreport")
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  yt-dlp: {}", self.tools.yt_dlp_path);
        if let Some(ffmpeg) = &self.tools.ffmpeg_path {
            println!("  ffmpeg: {}", ffmpeg.display());
        }
        println!("  Caption languages: {}", self.captions.languages.join(", "));
        println!("  Whisper model: {}", self.whisper.default_model.as_str());
        println!("  Models dir: {}", self.models_dir().display());
        println!("  Gemini model: {}", self.gemini.model);
        println!("  Transcripts dir: {}", self.transcripts_dir().display());
        println!("  Prompts dir: {}", self.prompts_dir().display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_language_priority_is_preserved() {
        let config = Config::default();
        assert_eq!(config.captions.languages, vec!["zh-TW", "zh-CN", "zh", "en"]);
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.captions.languages, config.captions.languages);
        assert_eq!(back.gemini.model, config.gemini.model);
        assert_eq!(back.whisper.default_model, ModelSize::Base);
    }

    #[test]
    fn empty_language_list_fails_validation() {
        let mut config = Config::default();
        config.captions.languages.clear();
        assert!(config.validate().is_err());
    }
}
