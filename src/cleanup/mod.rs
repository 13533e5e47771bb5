use std::path::Path;

/// Prefix used for one-shot credential files so stray ones can be swept.
pub const CREDENTIAL_PREFIX: &str = "cookies_";

/// Best-effort removal of scratch artifacts. A missing file is not an error;
/// a failed deletion is logged and the remaining paths are still attempted.
pub fn remove_files<P: AsRef<Path>>(paths: &[P]) {
    for path in paths {
        let path = path.as_ref();
        if !path.exists() {
            continue;
        }
        match fs_err::remove_file(path) {
            Ok(()) => tracing::debug!("removed {}", path.display()),
            Err(e) => tracing::warn!("could not remove {}: {e}", path.display()),
        }
    }
}

/// Remove stray one-shot credential files (`cookies_*.txt`) left behind by
/// earlier runs, bounding resource leakage across repeated invocations.
pub fn sweep_credentials(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(CREDENTIAL_PREFIX) && name.ends_with(".txt") {
            match fs_err::remove_file(entry.path()) {
                Ok(()) => tracing::debug!("swept stale credential file {name}"),
                Err(e) => tracing::warn!("could not sweep {name}: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_existing_and_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("audio.wav");
        let absent = dir.path().join("never-created.vtt");
        std::fs::write(&present, b"x").unwrap();

        remove_files(&[present.clone(), absent]);
        assert!(!present.exists());
    }

    #[test]
    fn sweeps_only_credential_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("cookies_9f3a.txt");
        let unrelated = dir.path().join("notes.txt");
        std::fs::write(&stale, b"secret").unwrap();
        std::fs::write(&unrelated, b"keep").unwrap();

        sweep_credentials(dir.path());

        assert!(!stale.exists());
        assert!(unrelated.exists());
    }
}
