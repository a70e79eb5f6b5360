use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Authored content of one card, before any scheduling state exists
#[derive(Debug, Clone)]
pub struct CardContent {
    pub question: String,
    pub answer: String,
    pub explanation: Option<String>,
}

/// A deck content file loaded from disk
#[derive(Debug, Clone)]
pub struct DeckFile {
    pub name: String,
    pub entries: Vec<CardContent>,
}

impl DeckFile {
    /// Load a deck from a TSV file
    /// Format: question<TAB>answer[<TAB>explanation]
    /// Lines starting with # are comments
    /// Empty lines are skipped
    pub fn load(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read deck file: {}", path.display()))?;

        let mut entries = Vec::new();

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.splitn(3, '\t').collect();
            if parts.len() < 2 {
                anyhow::bail!(
                    "Invalid line {} in {}: expected question<TAB>answer[<TAB>explanation]",
                    line_num + 1,
                    path.display()
                );
            }

            entries.push(CardContent {
                question: parts[0].to_string(),
                answer: parts[1].to_string(),
                explanation: parts.get(2).map(|s| s.to_string()),
            });
        }

        Ok(DeckFile { name, entries })
    }
}

/// List available deck files in a directory
pub fn list_decks(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut decks = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && path.extension().is_some_and(|ext| ext == "tsv") {
            decks.push(path);
        }
    }

    decks.sort();
    Ok(decks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_deck() {
        let mut file = NamedTempFile::with_suffix(".tsv").unwrap();
        writeln!(file, "What is the capital of France?\tParis").unwrap();
        writeln!(file, "# This is a comment").unwrap();
        writeln!(file, "").unwrap();
        writeln!(file, "2 + 2\t4\tBasic arithmetic").unwrap();

        let deck = DeckFile::load(file.path()).unwrap();
        assert_eq!(deck.entries.len(), 2);
        assert_eq!(deck.entries[0].answer, "Paris");
        assert_eq!(deck.entries[0].explanation, None);
        assert_eq!(
            deck.entries[1].explanation.as_deref(),
            Some("Basic arithmetic")
        );
    }

    #[test]
    fn test_load_deck_rejects_missing_answer() {
        let mut file = NamedTempFile::with_suffix(".tsv").unwrap();
        writeln!(file, "question without answer").unwrap();

        assert!(DeckFile::load(file.path()).is_err());
    }
}
