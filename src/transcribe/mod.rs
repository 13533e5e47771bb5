use async_trait::async_trait;
use std::path::{Path, PathBuf};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::PipelineError;

/// Closed set of recognition model sizes, mapped to GGML model files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Base,
    Small,
    Medium,
}

impl ModelSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
        }
    }

    pub fn model_filename(&self) -> String {
        format!("ggml-{}.bin", self.as_str())
    }
}

/// Compute backend, probed once at pipeline start. Affects performance only;
/// the transcription contract is identical on both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Accelerated,
    CpuOnly,
}

impl DeviceKind {
    /// Prefer an accelerated backend when one is plausibly present: Metal on
    /// macOS, CUDA when the NVIDIA driver answers. Everything else runs CPU.
    pub async fn detect() -> Self {
        if cfg!(target_os = "macos") {
            return DeviceKind::Accelerated;
        }

        let has_nvidia = tokio::process::Command::new("nvidia-smi")
            .arg("-L")
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false);

        if has_nvidia {
            DeviceKind::Accelerated
        } else {
            DeviceKind::CpuOnly
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Accelerated => write!(f, "accelerated (GPU)"),
            DeviceKind::CpuOnly => write!(f, "CPU only"),
        }
    }
}

/// One unit of recognized speech. Timing is carried for diagnostics but the
/// transcript only uses the text.
#[derive(Debug, Clone)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Seam for the speech-recognition capability.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe an audio file into ordered segments. `language: None`
    /// triggers auto-detection; an explicit code forces that language.
    async fn transcribe(
        &self,
        audio_path: &Path,
        model: ModelSize,
        language: Option<String>,
    ) -> Result<Vec<Segment>, PipelineError>;
}

/// Concatenate segment texts in emission order, single-space separated,
/// trimmed. Reordering must never occur.
pub fn join_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve the GGML file for a requested model size. An unavailable model
/// degrades to base with a warning instead of failing the run.
pub fn resolve_model(models_dir: &Path, requested: ModelSize) -> (PathBuf, ModelSize) {
    let wanted = models_dir.join(requested.model_filename());
    if wanted.exists() {
        return (wanted, requested);
    }

    if requested != ModelSize::Base {
        tracing::warn!(
            "model {} not found at {}, degrading to base",
            requested.as_str(),
            wanted.display()
        );
    }
    (models_dir.join(ModelSize::Base.model_filename()), ModelSize::Base)
}

/// Local whisper.cpp recognizer.
pub struct WhisperRecognizer {
    models_dir: PathBuf,
    device: DeviceKind,
}

impl WhisperRecognizer {
    pub fn new(models_dir: &Path, device: DeviceKind) -> Self {
        Self {
            models_dir: models_dir.to_path_buf(),
            device,
        }
    }
}

#[async_trait]
impl SpeechRecognizer for WhisperRecognizer {
    async fn transcribe(
        &self,
        audio_path: &Path,
        model: ModelSize,
        language: Option<String>,
    ) -> Result<Vec<Segment>, PipelineError> {
        // A missing asset is a precondition violation, not an engine failure
        if !audio_path.exists() {
            return Err(PipelineError::MissingInput(audio_path.to_path_buf()));
        }

        let (model_path, resolved) = resolve_model(&self.models_dir, model);
        tracing::info!("using whisper model {} on {}", resolved.as_str(), self.device);
        let audio_path = audio_path.to_path_buf();
        let use_gpu = self.device == DeviceKind::Accelerated;

        tokio::task::spawn_blocking(move || {
            run_whisper(&model_path, &audio_path, language.as_deref(), use_gpu)
        })
        .await
        .map_err(|e| PipelineError::RecognitionFailed(format!("recognizer task panicked: {e}")))?
    }
}

fn run_whisper(
    model_path: &Path,
    audio_path: &Path,
    language: Option<&str>,
    use_gpu: bool,
) -> Result<Vec<Segment>, PipelineError> {
    let samples = read_wav_samples(audio_path)?;

    let ctx_params = WhisperContextParameters {
        use_gpu,
        flash_attn: use_gpu,
        ..Default::default()
    };
    let model_path_str = model_path.to_string_lossy();
    let ctx = WhisperContext::new_with_params(&model_path_str, ctx_params)
        .map_err(|e| PipelineError::RecognitionFailed(format!("failed to load model: {e}")))?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 5 });
    // whisper.cpp treats a null language as auto-detect
    params.set_language(language);
    params.set_print_progress(false);
    params.set_print_realtime(false);

    let mut state = ctx
        .create_state()
        .map_err(|e| PipelineError::RecognitionFailed(format!("failed to create state: {e}")))?;
    state
        .full(params, &samples)
        .map_err(|e| PipelineError::RecognitionFailed(format!("recognition run failed: {e}")))?;

    // Drain the full segment sequence; partial consumption would truncate
    // the transcript silently.
    let mut segments = Vec::new();
    for segment in state.as_iter() {
        let Ok(text) = segment.to_str() else {
            continue;
        };
        segments.push(Segment {
            text: text.to_string(),
            start: segment.start_timestamp() as f64 / 100.0,
            end: segment.end_timestamp() as f64 / 100.0,
        });
    }

    Ok(segments)
}

/// Read a WAV file into mono f32 samples. The downloader produces 16 kHz
/// mono PCM, but stereo input is downmixed rather than rejected.
fn read_wav_samples(path: &Path) -> Result<Vec<f32>, PipelineError> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| PipelineError::RecognitionFailed(format!("unreadable audio: {e}")))?;
    let spec = reader.spec();

    let mono = |samples: Vec<f32>, channels: u16| -> Vec<f32> {
        if channels <= 1 {
            return samples;
        }
        samples
            .chunks(channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    let samples = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<Result<Vec<f32>, _>>(),
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<f32>, _>>(),
    }
    .map_err(|e| PipelineError::RecognitionFailed(format!("corrupt audio samples: {e}")))?;

    Ok(mono(samples, spec.channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, start: f64, end: f64) -> Segment {
        Segment {
            text: text.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn segments_join_in_emission_order() {
        let segments = vec![seg(" A", 0.0, 1.0), seg("B ", 1.0, 2.0), seg("C", 2.0, 3.0)];
        assert_eq!(join_segments(&segments), "A B C");
    }

    #[test]
    fn cjk_segments_join_with_single_spaces() {
        let segments = vec![seg("財報", 0.0, 2.0), seg("分析", 2.0, 4.0)];
        assert_eq!(join_segments(&segments), "財報 分析");
    }

    #[test]
    fn empty_segments_are_skipped() {
        let segments = vec![seg("A", 0.0, 1.0), seg("  ", 1.0, 2.0), seg("B", 2.0, 3.0)];
        assert_eq!(join_segments(&segments), "A B");
    }

    #[test]
    fn unavailable_model_degrades_to_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ggml-base.bin"), b"stub").unwrap();

        let (path, resolved) = resolve_model(dir.path(), ModelSize::Medium);
        assert_eq!(resolved, ModelSize::Base);
        assert!(path.ends_with("ggml-base.bin"));
    }

    #[test]
    fn requested_model_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ggml-small.bin"), b"stub").unwrap();
        std::fs::write(dir.path().join("ggml-base.bin"), b"stub").unwrap();

        let (path, resolved) = resolve_model(dir.path(), ModelSize::Small);
        assert_eq!(resolved, ModelSize::Small);
        assert!(path.ends_with("ggml-small.bin"));
    }

    #[tokio::test]
    async fn missing_audio_is_a_precondition_violation() {
        let dir = tempfile::tempdir().unwrap();
        let recognizer = WhisperRecognizer::new(dir.path(), DeviceKind::CpuOnly);

        let err = recognizer
            .transcribe(&dir.path().join("nope.wav"), ModelSize::Base, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }
}
