// ============================================================
// Layer 4 — Data Errors
// ============================================================
// Typed failures raised by the batching layer. Everything above
// this layer (application, CLI) wraps these in anyhow::Error with
// extra context, so the variants here only describe WHAT went wrong
// with the data or its configuration.
//
// Reference: Rust Book §9 (Recoverable Errors with Result)
//            thiserror crate documentation

use thiserror::Error;

/// Errors produced while building or collating batches.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataError {
    /// A loader or batcher parameter is out of range (zero batch size,
    /// target longer than bptt, ...).
    #[error("Invalid batching configuration: {0}")]
    InvalidConfig(String),

    /// The token stream cannot fill even one usable chunk.
    #[error("Token stream too short: {tokens} tokens with batch size {batch_size}, need at least {needed}")]
    StreamTooShort {
        tokens:     usize,
        batch_size: usize,
        needed:     usize,
    },

    /// An example is longer than the fixed pad length. The dataset is
    /// expected to truncate before collation; the collator never does.
    #[error("Example {index} has {len} tokens but the fixed pad length is {seq_length}")]
    PaddingContractViolation {
        index:      usize,
        len:        usize,
        seq_length: usize,
    },

    /// Collation was asked to stack zero examples.
    #[error("Cannot collate an empty batch")]
    EmptyBatch,
}

/// Result type for the data layer
pub type Result<T> = std::result::Result<T, DataError>;
