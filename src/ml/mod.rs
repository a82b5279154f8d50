// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Model architectures and training loops.
//
//   encoder.rs        — token + position embeddings and post-LN
//                       transformer blocks (pad and causal masks)
//
//   language_model.rs — encoder + tied decoder, predictions
//                       flattened to the target positions
//
//   classifier.rs     — encoder + pooling/MLP head of LinearBlocks
//
//   trainer.rs        — Adam epoch loops with validation,
//                       metrics and per-epoch checkpoints
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Radford et al. (2018) GPT

/// Shared transformer encoder
pub mod encoder;

/// Language model with tied input/output embeddings
pub mod language_model;

/// Sequence classifier heads
pub mod classifier;

/// Training loops for both models
pub mod trainer;
