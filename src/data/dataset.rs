// ============================================================
// Layer 4 — Text Dataset
// ============================================================
// Implements Burn's Dataset trait over tokenised Examples and
// applies the per-example transform on every `get`:
//
//   1. truncate to max_seq_len   (keep head if cut_tail, else tail)
//   2. reverse                   (for backwards models)
//   3. append eos
//   4. prepend sos
//
// The order matters: with both sentinels and `backwards` set,
// the result is [sos, reversed tokens..., eos], so a backwards
// model still sees the sentinels in their usual positions.
//
// Note that sentinels are added AFTER truncation, so a padded
// batch must allow max_seq_len + 2 positions when both are set.
//
// Reference: Burn Book §4 (Datasets)

use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::domain::example::Example;

/// How each example is reshaped before collation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDatasetConfig {
    pub backwards:   bool,
    pub sos:         Option<u32>,
    pub eos:         Option<u32>,
    /// `None` keeps sequences at full length
    pub max_seq_len: Option<usize>,
    /// Keep the first `max_seq_len` tokens (true) or the last (false)
    pub cut_tail:    bool,
}

impl TextDatasetConfig {
    /// Longest sequence `get` can return, if bounded.
    pub fn max_output_len(&self) -> Option<usize> {
        self.max_seq_len.map(|len| {
            len + usize::from(self.sos.is_some()) + usize::from(self.eos.is_some())
        })
    }
}

pub struct TextDataset {
    examples: Vec<Example>,
    config:   TextDatasetConfig,
}

impl TextDataset {
    pub fn new(examples: Vec<Example>, config: TextDatasetConfig) -> Self {
        Self { examples, config }
    }

    pub fn config(&self) -> &TextDatasetConfig {
        &self.config
    }

    /// Apply the configured transform to one example.
    pub fn transform(&self, example: &Example) -> Example {
        let cfg = &self.config;
        let mut tokens: Vec<u32> = match cfg.max_seq_len {
            Some(max) if example.tokens.len() > max => {
                if cfg.cut_tail {
                    example.tokens[..max].to_vec()
                } else {
                    example.tokens[example.tokens.len() - max..].to_vec()
                }
            }
            _ => example.tokens.clone(),
        };

        if cfg.backwards {
            tokens.reverse();
        }
        if let Some(eos) = cfg.eos {
            tokens.push(eos);
        }
        if let Some(sos) = cfg.sos {
            tokens.insert(0, sos);
        }

        Example::new(tokens, example.label)
    }
}

impl Dataset<Example> for TextDataset {
    fn get(&self, index: usize) -> Option<Example> {
        self.examples.get(index).map(|ex| self.transform(ex))
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}
