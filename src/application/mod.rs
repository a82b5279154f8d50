// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each:
//
//   train_lm_use_case   — corpus → tokens → LM loaders → LM
//   train_clf_use_case  — JSONL → examples → padded batches → classifier
//   inspect_use_case    — dry-run of an LM loader, no training
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Language-model training workflow
pub mod train_lm_use_case;

// Classifier training / fine-tuning workflow
pub mod train_clf_use_case;

// Loader dry-run
pub mod inspect_use_case;
