// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer reads corpora through these traits, so
// a new on-disk format only needs a new implementation in the
// data layer.
//
// Implementations:
//   - TextCorpusLoader  → DocumentSource   (.txt file or directory)
//   - JsonlLoader       → LabelledSource   ({"text", "label"} lines)
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::document::Document;
use crate::domain::example::LabelledText;

// ─── DocumentSource ───────────────────────────────────────────────────────────
/// Anything that can provide the unlabelled texts of an LM corpus.
pub trait DocumentSource {
    fn load_all(&self) -> Result<Vec<Document>>;
}

// ─── LabelledSource ───────────────────────────────────────────────────────────
/// Anything that can provide labelled texts for classification.
pub trait LabelledSource {
    fn load_labelled(&self) -> Result<Vec<LabelledText>>;
}
