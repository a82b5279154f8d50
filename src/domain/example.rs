// ============================================================
// Layer 3 — Example Domain Type
// ============================================================
// One labelled token sequence for classifier training.
//
// The token ids are whatever the tokenizer produced; the label
// is a class index in [0, n_classes). Sentinel tokens, truncation
// and reversal are applied later by TextDataset, so an Example
// always holds the raw encoding.
//
// Reference: Rust Book §5 (Structs)

use serde::{Deserialize, Serialize};

/// A tokenised text with its class label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    /// Token ids in reading order
    pub tokens: Vec<u32>,

    /// Class index
    pub label: usize,
}

impl Example {
    pub fn new(tokens: Vec<u32>, label: usize) -> Self {
        Self { tokens, label }
    }

    /// Number of tokens in the sequence
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// A raw text with its class label, as read from a labelled corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelledText {
    pub text:  String,
    pub label: usize,
}
