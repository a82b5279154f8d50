// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from text on disk to tensor batches.
//
// Language modelling (one long token stream):
//
//   TextCorpusLoader        → Documents
//       │  tokenizer (infra)
//       ▼
//   split_stream            → train / valid token streams
//       │
//       ▼
//   SequenceBatcher         → BatchMatrix (bs parallel streams)
//       │
//       ▼
//   LanguageModelLoader     → contiguous chunks, in order
//   ShuffledLanguageModelLoader → chunks at random offsets
//       │  (chunk widths from ChunkLengthPolicy)
//       ▼
//   LmBatch { input, target }
//
// Classification (many short labelled texts):
//
//   JsonlLoader             → LabelledText
//       │  tokenizer (infra)
//       ▼
//   TextDataset             → truncate / reverse / sentinels
//       │
//       ▼
//   FixedLengthBatcher      → padded ClassifierBatch
//       │
//       ▼
//   burn DataLoader         → batches for the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Typed errors for batching and collation
pub mod error;

/// Token stream → batch matrix, and window extraction
pub mod batchify;

/// Randomized chunk length sampling
pub mod chunk_len;

/// Streaming LM loader and the LmBatchSource trait
pub mod lm_loader;

/// LM loader drawing chunks at random offsets
pub mod shuffled_loader;

/// Train/valid LM loaders bundled with vocabulary info
pub mod lm_data;

/// Implements Burn's Dataset trait for labelled token sequences
pub mod dataset;

/// Implements Burn's Batcher trait with fixed-length padding
pub mod collator;

/// Reads .txt corpora and JSONL labelled files
pub mod corpus;

/// Train/validation splits for examples and token streams
pub mod splitter;
