use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::utils::sanitize_title;

/// Durable folder of saved transcripts, one text file each. Saved transcripts
/// are never auto-deleted.
pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a transcript under a name derived from the title. Collisions
    /// are resolved with `_1`, `_2`, ... suffixes; content is written exactly.
    pub fn save(&self, content: &str, title: &str) -> Result<PathBuf> {
        fs_err::create_dir_all(&self.dir).context("Failed to create transcript store directory")?;

        let base = sanitize_title(title);
        let mut path = self.dir.join(format!("{base}.txt"));
        let mut counter = 1usize;
        while path.exists() {
            path = self.dir.join(format!("{base}_{counter}.txt"));
            counter += 1;
        }

        fs_err::write(&path, content).context("Failed to write transcript")?;
        tracing::info!("saved transcript to {}", path.display());
        Ok(path)
    }

    /// Saved transcript filenames, most recently modified first.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<(String, SystemTime)> = Vec::new();
        for entry in fs_err::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".txt") {
                continue;
            }
            let modified = entry
                .metadata()?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push((name, modified));
        }

        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(entries.into_iter().map(|(name, _)| name).collect())
    }

    /// Load a saved transcript by filename, with or without the extension.
    pub fn load(&self, name: &str) -> Result<String> {
        let filename = if name.ends_with(".txt") {
            name.to_string()
        } else {
            format!("{name}.txt")
        };
        let path = self.dir.join(&filename);

        if !path.exists() {
            anyhow::bail!("transcript not found: {}", filename);
        }

        fs_err::read_to_string(&path).context("Failed to read transcript")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saving_same_title_twice_disambiguates() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());

        let first = store.save("first body", "Report").unwrap();
        let second = store.save("second body", "Report").unwrap();

        assert_eq!(first.file_name().unwrap(), "Report.txt");
        assert_eq!(second.file_name().unwrap(), "Report_1.txt");
        assert_eq!(store.load("Report").unwrap(), "first body");
        assert_eq!(store.load("Report_1").unwrap(), "second body");
    }

    #[test]
    fn cjk_titles_stay_readable() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());

        let path = store.save("內容", "財報分析").unwrap();
        assert_eq!(path.file_name().unwrap(), "財報分析.txt");
        assert_eq!(store.load("財報分析").unwrap(), "內容");
    }

    #[test]
    fn list_orders_by_modification_time_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());

        store.save("a", "older").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        store.save("b", "newer").unwrap();

        assert_eq!(store.list().unwrap(), vec!["newer.txt", "older.txt"]);
    }

    #[test]
    fn loading_missing_transcript_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        assert!(store.load("absent").is_err());
    }
}
