// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by the application and ML layers:
//
//   checkpoint.rs      — model weights via CompactRecorder,
//                        run and model configs as JSON
//
//   tokenizer_store.rs — word-level tokenizer built from the
//                        corpus, saved so every run shares ids
//
//   metrics.rs         — per-epoch CSV log (loss + task metric)
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer building, saving, and loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;
