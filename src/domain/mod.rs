// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits shared by every other layer.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A corpus document loaded from disk
pub mod document;

// A tokenised, labelled classifier example
pub mod example;

// Corpus source abstractions
pub mod traits;
