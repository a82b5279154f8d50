// ============================================================
// Layer 4 — Corpus Loaders
// ============================================================
// Reads raw text from disk into domain types.
//
//   TextCorpusLoader → DocumentSource
//     a single .txt file, or every .txt file in a directory
//     (sorted by name so the token stream is reproducible)
//
//   JsonlLoader → LabelledSource
//     one {"text": "...", "label": 3} object per line
//
// Windows line endings are normalised to \n on the way in.
// Unreadable files in a directory are skipped with a warning;
// a malformed JSONL line is an error naming the line number.
//
// Reference: Rust Book §9 (Error Handling)
//            serde_json crate documentation

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::document::Document;
use crate::domain::example::LabelledText;
use crate::domain::traits::{DocumentSource, LabelledSource};

// ─── TextCorpusLoader ─────────────────────────────────────────────────────────
pub struct TextCorpusLoader {
    path: PathBuf,
}

impl TextCorpusLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DocumentSource for TextCorpusLoader {
    fn load_all(&self) -> Result<Vec<Document>> {
        if !self.path.exists() {
            bail!("Corpus path '{}' does not exist", self.path.display());
        }

        if self.path.is_file() {
            let doc = load_text_file(&self.path)?;
            tracing::info!("Loaded 1 document ({} chars)", doc.text.len());
            return Ok(vec![doc]);
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.path)
            .with_context(|| format!("Cannot read directory '{}'", self.path.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("txt"))
            .collect();
        paths.sort();

        let mut docs = Vec::with_capacity(paths.len());
        for path in &paths {
            match load_text_file(path) {
                Ok(doc) if doc.is_blank() => {
                    tracing::debug!("Skipping blank file '{}'", doc.source);
                }
                Ok(doc) => {
                    tracing::debug!("Loaded: {} ({} chars)", doc.source, doc.text.len());
                    docs.push(doc);
                }
                Err(e) => tracing::warn!("Skipping '{}': {}", path.display(), e),
            }
        }

        tracing::info!("Loaded {} documents from '{}'", docs.len(), self.path.display());
        Ok(docs)
    }
}

fn load_text_file(path: &Path) -> Result<Document> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();
    Ok(Document::new(source, text.replace("\r\n", "\n")))
}

// ─── JsonlLoader ──────────────────────────────────────────────────────────────
pub struct JsonlLoader {
    path: PathBuf,
}

impl JsonlLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LabelledSource for JsonlLoader {
    fn load_labelled(&self) -> Result<Vec<LabelledText>> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read '{}'", self.path.display()))?;

        let mut rows = Vec::new();
        for (i, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let row: LabelledText = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: bad JSONL record", self.path.display(), i + 1))?;
            rows.push(row);
        }

        tracing::info!("Loaded {} labelled texts from '{}'", rows.len(), self.path.display());
        Ok(rows)
    }
}

/// Number of classes implied by the labels (max label + 1).
pub fn num_classes(rows: &[LabelledText]) -> usize {
    rows.iter().map(|r| r.label + 1).max().unwrap_or(0)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_single_file() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "one two\r\nthree").unwrap();
        let docs = TextCorpusLoader::new(f.path()).load_all().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "one two\nthree");
    }

    #[test]
    fn test_directory_sorted_txt_only() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "second").unwrap();
        fs::write(dir.path().join("a.txt"), "first").unwrap();
        fs::write(dir.path().join("c.md"), "ignored").unwrap();
        fs::write(dir.path().join("d.txt"), "   ").unwrap();

        let docs = TextCorpusLoader::new(dir.path()).load_all().unwrap();
        let sources: Vec<&str> = docs.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_missing_path_is_error() {
        let dir = tempdir().unwrap();
        assert!(TextCorpusLoader::new(dir.path().join("nope")).load_all().is_err());
    }

    #[test]
    fn test_jsonl_rows_and_classes() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, r#"{{"text": "good film", "label": 1}}"#).unwrap();
        writeln!(f).unwrap();
        writeln!(f, r#"{{"text": "dull", "label": 0}}"#).unwrap();

        let rows = JsonlLoader::new(f.path()).load_labelled().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], LabelledText { text: "good film".into(), label: 1 });
        assert_eq!(num_classes(&rows), 2);
    }

    #[test]
    fn test_jsonl_bad_line_reports_position() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, r#"{{"text": "ok", "label": 0}}"#).unwrap();
        writeln!(f, "not json").unwrap();

        let err = JsonlLoader::new(f.path()).load_labelled().unwrap_err();
        assert!(format!("{err}").contains(":2:"));
    }
}
