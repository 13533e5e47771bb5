use std::path::{Path, PathBuf};

use crate::tools::{Downloader, ToolError, VideoReference};
use crate::PipelineError;

/// Languages we recognize in the downloader's track listing when deciding
/// whether any usable caption track exists at all.
const KNOWN_LANGUAGES: &[&str] = &["zh", "en", "ja", "ko", "es", "fr", "de"];

/// Stem for per-language subtitle downloads inside the scratch directory.
/// yt-dlp appends `.<lang>.vtt` or `.vtt` to it.
const SUBTITLE_STEM: &str = "subtitle";

/// Name of the winning subtitle file inside the scratch directory.
pub const SUBTITLE_FILENAME: &str = "captions.vtt";

/// Outcome of a caption attempt. "No captions" is an ordinary branch that
/// sends the pipeline down the audio fallback path, never an error.
#[derive(Debug)]
pub enum CaptionFetch {
    /// A usable subtitle document was materialized at this path.
    Downloaded(PathBuf),
    NoCaptions,
}

/// Check whether the video has usable captions and download the best one.
///
/// Language attempts are strictly sequential in priority order; the first
/// language that yields a non-empty file wins. Auto-generated captions are
/// tried only after every prioritized language is exhausted. A zero-byte
/// download is deleted and treated as "language unavailable".
pub async fn fetch_captions(
    downloader: &dyn Downloader,
    video: &VideoReference,
    languages: &[String],
    scratch_dir: &Path,
) -> Result<CaptionFetch, PipelineError> {
    tracing::info!("checking for available caption tracks");

    let listing = match downloader.list_subtitles(video).await {
        Ok(output) => output.stdout,
        Err(err @ ToolError::NotFound { .. }) => return Err(err.into()),
        Err(err) => {
            tracing::warn!("could not list caption tracks ({err}), falling back to speech-to-text");
            return Ok(CaptionFetch::NoCaptions);
        }
    };

    if !listing_has_usable_tracks(&listing) {
        tracing::info!("no caption tracks advertised for this video");
        return Ok(CaptionFetch::NoCaptions);
    }

    let stem = scratch_dir.join(SUBTITLE_STEM);
    let target = scratch_dir.join(SUBTITLE_FILENAME);

    for lang in languages {
        tracing::info!("trying {lang} captions");

        match downloader.download_subtitle(video, lang, &stem).await {
            Ok(()) => {}
            Err(err @ ToolError::NotFound { .. }) => return Err(err.into()),
            Err(err) => {
                tracing::warn!("downloading {lang} captions failed: {err}");
                continue;
            }
        }

        let candidates = [
            scratch_dir.join(format!("{SUBTITLE_STEM}.{lang}.vtt")),
            scratch_dir.join(format!("{SUBTITLE_STEM}.vtt")),
        ];
        if let Some(found) = claim_non_empty(&candidates, &target)? {
            tracing::info!("downloaded {lang} captions");
            return Ok(CaptionFetch::Downloaded(found));
        }
    }

    tracing::info!("trying auto-generated captions");
    match downloader.download_auto_subtitle(video, &stem).await {
        Ok(()) => {}
        Err(err @ ToolError::NotFound { .. }) => return Err(err.into()),
        Err(err) => {
            tracing::warn!("downloading auto-generated captions failed: {err}");
            return Ok(CaptionFetch::NoCaptions);
        }
    }

    let auto_candidates = auto_caption_candidates(scratch_dir)?;
    if let Some(found) = claim_non_empty(&auto_candidates, &target)? {
        tracing::info!("downloaded auto-generated captions");
        return Ok(CaptionFetch::Downloaded(found));
    }

    tracing::info!("no usable captions found, falling back to speech-to-text");
    Ok(CaptionFetch::NoCaptions)
}

/// The listing must advertise a caption block and at least one line that pairs
/// a known language with a subtitle format.
fn listing_has_usable_tracks(listing: &str) -> bool {
    if !listing.contains("Available subtitles") && !listing.contains("Available automatic captions")
    {
        return false;
    }

    listing.lines().any(|line| {
        KNOWN_LANGUAGES.iter().any(|lang| line.contains(lang))
            && (line.contains("vtt") || line.contains("srt"))
    })
}

/// Move the first non-empty candidate to `target`; delete zero-byte files so
/// they are never mistaken for a successful download.
fn claim_non_empty(candidates: &[PathBuf], target: &Path) -> Result<Option<PathBuf>, PipelineError> {
    for candidate in candidates {
        let Ok(meta) = std::fs::metadata(candidate) else {
            continue;
        };
        if meta.len() > 0 {
            fs_err::rename(candidate, target).map_err(|e| PipelineError::File(e.to_string()))?;
            return Ok(Some(target.to_path_buf()));
        }
        tracing::warn!("{} is empty, discarding", candidate.display());
        let _ = fs_err::remove_file(candidate);
    }
    Ok(None)
}

/// Auto-caption downloads land under unpredictable language suffixes; collect
/// every `subtitle*.vtt` in the scratch directory.
fn auto_caption_candidates(scratch_dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut candidates = Vec::new();
    let entries = fs_err::read_dir(scratch_dir).map_err(|e| PipelineError::File(e.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::File(e.to_string()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(SUBTITLE_STEM) && name.ends_with(".vtt") {
            candidates.push(entry.path());
        }
    }
    candidates.sort();
    Ok(candidates)
}

/// Convert raw subtitle markup to plain text: drop the duration header, cue
/// timing lines, pure sequence numbers and header metadata, strip inline
/// formatting tags, and join the surviving text with single spaces.
///
/// Malformed lines are discarded rather than raised; the conversion is
/// idempotent.
pub fn subtitle_to_plain_text(raw: &str) -> String {
    let mut parts: Vec<String> = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with("WEBVTT")
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
            || line.starts_with("NOTE")
            || line.starts_with("STYLE")
            || line.contains("-->")
            || line.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }

        let cleaned = strip_inline_tags(line);
        let cleaned = cleaned.trim();
        if !cleaned.is_empty() {
            parts.push(cleaned.to_string());
        }
    }

    parts.join(" ")
}

/// Remove `<...>` formatting spans. Unclosed tags swallow the rest of the
/// line, matching how a malformed cue should be discarded rather than leaked.
fn strip_inline_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolOutput;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const SAMPLE_VTT: &str = "WEBVTT\nKind: captions\nLanguage: zh\n\n1\n00:00:00.000 --> 00:00:02.500\n<c.yellow>財報</c> 重點\n\n2\n00:00:02.500 --> 00:00:05.000\n分析 <b>結論</b>\n";

    /// Fake downloader backed by an in-memory map of language -> caption body.
    /// Records the order of language attempts.
    struct FakeDownloader {
        listing: String,
        tracks: HashMap<String, Vec<u8>>,
        auto_track: Option<Vec<u8>>,
        attempts: Mutex<Vec<String>>,
    }

    impl FakeDownloader {
        fn new(listing: &str) -> Self {
            Self {
                listing: listing.to_string(),
                tracks: HashMap::new(),
                auto_track: None,
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn with_track(mut self, lang: &str, body: &[u8]) -> Self {
            self.tracks.insert(lang.to_string(), body.to_vec());
            self
        }

        fn with_auto_track(mut self, body: &[u8]) -> Self {
            self.auto_track = Some(body.to_vec());
            self
        }
    }

    #[async_trait]
    impl Downloader for FakeDownloader {
        async fn list_subtitles(&self, _video: &VideoReference) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput {
                stdout: self.listing.clone(),
                stderr: String::new(),
            })
        }

        async fn download_subtitle(
            &self,
            _video: &VideoReference,
            lang: &str,
            out_stem: &Path,
        ) -> Result<(), ToolError> {
            self.attempts.lock().unwrap().push(lang.to_string());
            if let Some(body) = self.tracks.get(lang) {
                let path = out_stem.with_extension(format!("{lang}.vtt"));
                std::fs::write(path, body).unwrap();
            }
            Ok(())
        }

        async fn download_auto_subtitle(
            &self,
            _video: &VideoReference,
            out_stem: &Path,
        ) -> Result<(), ToolError> {
            self.attempts.lock().unwrap().push("auto".to_string());
            if let Some(body) = &self.auto_track {
                let path = out_stem.with_extension("en.vtt");
                std::fs::write(path, body).unwrap();
            }
            Ok(())
        }

        async fn download_audio(
            &self,
            _video: &VideoReference,
            _out_path: &Path,
        ) -> Result<(), ToolError> {
            unreachable!("caption tests never download audio")
        }

        async fn fetch_title(
            &self,
            _video: &VideoReference,
        ) -> Result<Option<String>, ToolError> {
            Ok(None)
        }
    }

    fn priority() -> Vec<String> {
        vec!["zh-TW".into(), "zh-CN".into(), "zh".into(), "en".into()]
    }

    const LISTING_WITH_TRACKS: &str =
        "Available subtitles for abc:\nLanguage Name    Formats\nzh       Chinese vtt, srt\nen       English vtt, srt\n";

    #[tokio::test]
    async fn picks_first_available_language_in_priority_order() {
        let scratch = tempfile::tempdir().unwrap();
        let fake = FakeDownloader::new(LISTING_WITH_TRACKS)
            .with_track("zh", SAMPLE_VTT.as_bytes())
            .with_track("en", b"WEBVTT\n\nhello\n");
        let video = VideoReference::new("https://youtu.be/abc");

        let fetch = fetch_captions(&fake, &video, &priority(), scratch.path())
            .await
            .unwrap();

        assert!(matches!(fetch, CaptionFetch::Downloaded(_)));
        // zh wins before en is ever attempted
        let attempts = fake.attempts.lock().unwrap().clone();
        assert_eq!(attempts, vec!["zh-TW", "zh-CN", "zh"]);
    }

    #[tokio::test]
    async fn zero_byte_download_is_rejected_and_next_language_tried() {
        let scratch = tempfile::tempdir().unwrap();
        let fake = FakeDownloader::new(LISTING_WITH_TRACKS)
            .with_track("zh", b"")
            .with_track("en", SAMPLE_VTT.as_bytes());
        let video = VideoReference::new("https://youtu.be/abc");

        let fetch = fetch_captions(&fake, &video, &priority(), scratch.path())
            .await
            .unwrap();

        let CaptionFetch::Downloaded(path) = fetch else {
            panic!("expected a download");
        };
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
        // the empty zh file must not linger
        assert!(!scratch.path().join("subtitle.zh.vtt").exists());
        let attempts = fake.attempts.lock().unwrap().clone();
        assert_eq!(attempts, vec!["zh-TW", "zh-CN", "zh", "en"]);
    }

    #[tokio::test]
    async fn auto_captions_tried_only_after_all_languages_exhausted() {
        let scratch = tempfile::tempdir().unwrap();
        let fake =
            FakeDownloader::new(LISTING_WITH_TRACKS).with_auto_track(SAMPLE_VTT.as_bytes());
        let video = VideoReference::new("https://youtu.be/abc");

        let fetch = fetch_captions(&fake, &video, &priority(), scratch.path())
            .await
            .unwrap();

        assert!(matches!(fetch, CaptionFetch::Downloaded(_)));
        let attempts = fake.attempts.lock().unwrap().clone();
        assert_eq!(attempts, vec!["zh-TW", "zh-CN", "zh", "en", "auto"]);
    }

    #[tokio::test]
    async fn listing_without_caption_blocks_is_a_negative_outcome() {
        let scratch = tempfile::tempdir().unwrap();
        let fake = FakeDownloader::new("abc has no subtitles\n");
        let video = VideoReference::new("https://youtu.be/abc");

        let fetch = fetch_captions(&fake, &video, &priority(), scratch.path())
            .await
            .unwrap();

        assert!(matches!(fetch, CaptionFetch::NoCaptions));
        assert!(fake.attempts.lock().unwrap().is_empty());
    }

    #[test]
    fn conversion_strips_markup_and_joins_with_single_spaces() {
        let text = subtitle_to_plain_text(SAMPLE_VTT);
        assert_eq!(text, "財報 重點 分析 結論");
    }

    #[test]
    fn conversion_is_idempotent() {
        let once = subtitle_to_plain_text(SAMPLE_VTT);
        let twice = subtitle_to_plain_text(&once);
        assert_eq!(once, twice);
        assert!(!twice.contains("-->"));
        assert!(!twice.contains('<'));
    }

    #[test]
    fn malformed_lines_are_discarded_not_fatal() {
        let garbled = "WEBVTT\n00:00 --> broken\n<unclosed tag swallows\nkeep this\n42\n";
        assert_eq!(subtitle_to_plain_text(garbled), "keep this");
    }
}
