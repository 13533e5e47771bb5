use anyhow::{Context, Result};
use std::path::PathBuf;

/// Name of the built-in persona that is always available.
pub const DEFAULT_PERSONA: &str = "general-analyst";

const DEFAULT_PERSONA_TEMPLATE: &str = r#"You are a versatile content analyst able to produce professional insight on any kind of video.

Based on the following video transcript, write a comprehensive analysis report.

Report requirements:
1. Content summary: concise recap of the main content and core message
2. Theme analysis: the topics and viewpoints discussed, in depth
3. Key takeaways: the valuable information and insights worth remembering
4. Audience: who the content serves and how well
5. Overall assessment: strengths, weaknesses and suggestions

Keep the tone objective, cite concrete points from the transcript, and balance depth with readability.

Video transcript:
{transcript_text}"#;

/// Folder of named persona prompt templates, one text file per persona,
/// consulted by name at refine time.
pub struct PromptLibrary {
    dir: PathBuf,
}

impl PromptLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Available persona names: `*.txt` stems sorted alphabetically with the
    /// default persona first. The default is listed even with no files.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();

        if self.dir.exists() {
            for entry in fs_err::read_dir(&self.dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("txt") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.push(stem.to_string());
                    }
                }
            }
        }

        names.sort();
        names.retain(|n| n != DEFAULT_PERSONA);
        names.insert(0, DEFAULT_PERSONA.to_string());
        Ok(names)
    }

    /// Template content for a persona. A missing file falls back to the
    /// built-in default template.
    pub fn load(&self, name: &str) -> Result<String> {
        let path = self.dir.join(format!("{name}.txt"));
        if path.exists() {
            let content = fs_err::read_to_string(&path).context("Failed to read persona prompt")?;
            let content = content.trim().to_string();
            if !content.is_empty() {
                return Ok(content);
            }
            tracing::warn!("persona {name} is empty, using the built-in default");
        } else if name != DEFAULT_PERSONA {
            tracing::warn!("persona {name} not found, using the built-in default");
        }
        Ok(DEFAULT_PERSONA_TEMPLATE.to_string())
    }

    pub fn save(&self, name: &str, content: &str) -> Result<()> {
        fs_err::create_dir_all(&self.dir)?;
        fs_err::write(self.dir.join(format!("{name}.txt")), content)
            .context("Failed to write persona prompt")?;
        Ok(())
    }

    /// Delete a persona file. The default persona cannot be deleted.
    pub fn delete(&self, name: &str) -> Result<()> {
        if name == DEFAULT_PERSONA {
            anyhow::bail!("the default persona cannot be deleted");
        }
        let path = self.dir.join(format!("{name}.txt"));
        if !path.exists() {
            anyhow::bail!("persona not found: {name}");
        }
        fs_err::remove_file(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refine::TRANSCRIPT_PLACEHOLDER;

    #[test]
    fn default_persona_always_listed_first() {
        let dir = tempfile::tempdir().unwrap();
        let library = PromptLibrary::new(dir.path());

        assert_eq!(library.list().unwrap(), vec![DEFAULT_PERSONA]);

        library.save("zz-macro-economist", "template").unwrap();
        library.save("aa-value-investor", "template").unwrap();
        assert_eq!(
            library.list().unwrap(),
            vec![DEFAULT_PERSONA, "aa-value-investor", "zz-macro-economist"]
        );
    }

    #[test]
    fn builtin_template_carries_the_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let library = PromptLibrary::new(dir.path());

        let template = library.load(DEFAULT_PERSONA).unwrap();
        assert!(template.contains(TRANSCRIPT_PLACEHOLDER));
    }

    #[test]
    fn missing_persona_falls_back_to_default_template() {
        let dir = tempfile::tempdir().unwrap();
        let library = PromptLibrary::new(dir.path());

        let template = library.load("no-such-persona").unwrap();
        assert!(template.contains(TRANSCRIPT_PLACEHOLDER));
    }

    #[test]
    fn saved_persona_round_trips_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let library = PromptLibrary::new(dir.path());

        library.save("crypto-skeptic", "Be skeptical.").unwrap();
        assert_eq!(library.load("crypto-skeptic").unwrap(), "Be skeptical.");

        library.delete("crypto-skeptic").unwrap();
        assert!(library.delete("crypto-skeptic").is_err());
    }

    #[test]
    fn default_persona_cannot_be_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let library = PromptLibrary::new(dir.path());
        assert!(library.delete(DEFAULT_PERSONA).is_err());
    }
}
