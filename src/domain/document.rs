// ============================================================
// Layer 3 — Document Domain Type
// ============================================================
// A plain-text file of the language-model corpus.
//
// Documents are concatenated into one token stream for LM
// training, each one closed by an end-of-sequence token so the
// model sees where one text stops and the next begins.
//
// Reference: Rust Book §5 (Structs and Methods)

use serde::{Deserialize, Serialize};

/// A corpus document loaded from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// File name the text came from, kept for log messages
    pub source: String,

    /// Full text content, untouched
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text:   text.into(),
        }
    }

    /// True when the document holds nothing but whitespace
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
