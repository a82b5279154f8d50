#![recursion_limit = "256"]

//! Transformer language models and classifiers on Burn, with the
//! batch iterators used to train them on variable-length text.
//!
//! Layers, outermost first:
//!
//! 1. [`cli`]          argument parsing
//! 2. [`application`]  training and inspection workflows
//! 3. [`domain`]       plain data types and source traits
//! 4. [`data`]         batching, datasets, collation, corpora
//! 5. [`ml`]           models and training loops
//! 6. [`infra`]        checkpoints, tokenizer, metrics

pub mod application;
pub mod cli;
pub mod data;
pub mod domain;
pub mod infra;
pub mod ml;
