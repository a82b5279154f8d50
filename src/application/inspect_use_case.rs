// ============================================================
// Layer 2 — InspectBatchesUseCase
// ============================================================
// Dry-runs an LM loader over a corpus on the CPU backend and
// reports what a training epoch would actually see:
//
//   tokens / steps          stream size and columns per stream
//   advisory vs yielded     len() against batches really produced
//   chunk widths            smallest and largest seq_len
//   dropped tokens          remainder of the bs split, plus the
//                           residual tail a streaming pass skips
//
// Useful for choosing bptt and batch size before a long run.

use anyhow::{bail, Result};
use burn::{backend::NdArray, prelude::*};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::{
    corpus::TextCorpusLoader,
    lm_loader::{LanguageModelLoader, LmBatchSource, LmLoaderConfig},
    shuffled_loader::ShuffledLanguageModelLoader,
};
use crate::domain::traits::DocumentSource;
use crate::infra::tokenizer_store::{encode_stream, TokenizerStore};

type InspectBackend = NdArray;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectConfig {
    pub corpus:         String,
    pub tokenizer_dir:  String,
    pub vocab_size:     usize,
    pub loader:         LmLoaderConfig,
    pub shuffle:        bool,
    pub seed:           u64,
    pub passes:         usize,
}

/// What one or more passes over a loader produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub tokens:          usize,
    pub steps:           usize,
    pub passes:          usize,
    pub advisory_len:    usize,
    /// Batches per pass, in order
    pub yielded:         Vec<usize>,
    pub min_seq_len:     usize,
    pub max_seq_len:     usize,
    /// Tokens lost to the batch-size split
    pub truncated:       usize,
    /// Largest per-stream tail left unread by a streaming pass
    pub residual_steps:  usize,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tokens:           {}", self.tokens)?;
        writeln!(f, "steps per stream: {}", self.steps)?;
        writeln!(f, "advisory len:     {}", self.advisory_len)?;
        writeln!(f, "yielded/pass:     {:?}", self.yielded)?;
        writeln!(f, "seq_len range:    {}..={}", self.min_seq_len, self.max_seq_len)?;
        writeln!(f, "truncated tokens: {}", self.truncated)?;
        write!(f,   "residual steps:   {}", self.residual_steps)
    }
}

/// Run `passes` passes over `source` and summarise them.
pub fn summarize<B: Backend>(
    source:     &mut dyn LmBatchSource<B>,
    tokens:     usize,
    batch_size: usize,
    passes:     usize,
    streaming:  bool,
) -> BatchReport {
    let steps = tokens / batch_size;
    let mut yielded  = Vec::with_capacity(passes);
    let mut min_len  = usize::MAX;
    let mut max_len  = 0usize;
    let mut residual = 0usize;

    for _ in 0..passes {
        let mut count = 0usize;
        let mut end   = 0usize;
        for batch in source.batches() {
            count  += 1;
            min_len = min_len.min(batch.seq_len);
            max_len = max_len.max(batch.seq_len);
            end     = end.max(batch.offset + batch.seq_len);
        }
        if streaming {
            residual = residual.max(steps - end);
        }
        yielded.push(count);
    }

    BatchReport {
        tokens,
        steps,
        passes,
        advisory_len:   source.len(),
        yielded,
        min_seq_len:    if min_len == usize::MAX { 0 } else { min_len },
        max_seq_len:    max_len,
        truncated:      tokens - steps * batch_size,
        residual_steps: residual,
    }
}

pub struct InspectBatchesUseCase {
    config: InspectConfig,
}

impl InspectBatchesUseCase {
    pub fn new(config: InspectConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<BatchReport> {
        let cfg  = &self.config;
        let docs = TextCorpusLoader::new(&cfg.corpus).load_all()?;
        if docs.is_empty() {
            bail!("No documents found in '{}'", cfg.corpus);
        }
        let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
        let tokenizer = TokenizerStore::new(&cfg.tokenizer_dir).load_or_build(&texts, cfg.vocab_size)?;
        let stream    = encode_stream(&tokenizer, &texts)?;

        Ok(inspect_stream(&stream, &cfg.loader, cfg.shuffle, cfg.seed, cfg.passes)?)
    }
}

/// Build the requested loader over `stream` on the CPU and summarise it.
pub fn inspect_stream(
    stream:  &[u32],
    loader:  &LmLoaderConfig,
    shuffle: bool,
    seed:    u64,
    passes:  usize,
) -> crate::data::error::Result<BatchReport> {
    let device = Default::default();
    let mut source: Box<dyn LmBatchSource<InspectBackend>> = if shuffle {
        Box::new(ShuffledLanguageModelLoader::new(stream, loader, &device)?.with_seed(seed))
    } else {
        Box::new(LanguageModelLoader::new(stream, loader, &device)?.with_seed(seed))
    };
    Ok(summarize(source.as_mut(), stream.len(), loader.batch_size, passes, !shuffle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(n: u32) -> Vec<u32> {
        (0..n).collect()
    }

    #[test]
    fn test_fixed_streaming_report() {
        // 1003 tokens, bs 10 → 100 steps, bptt 10 → 9 batches, 10 steps unread
        let cfg    = LmLoaderConfig::new(10, 10, 10);
        let report = inspect_stream(&stream(1003), &cfg, false, 0, 2).unwrap();

        assert_eq!(report.steps, 100);
        assert_eq!(report.truncated, 3);
        assert_eq!(report.advisory_len, 9);
        assert_eq!(report.yielded, vec![9, 9]);
        assert_eq!((report.min_seq_len, report.max_seq_len), (10, 10));
        assert_eq!(report.residual_steps, 10);
    }

    #[test]
    fn test_randomized_never_exceeds_advisory() {
        let cfg    = LmLoaderConfig::new(4, 12, 6).with_randomize_bptt(true);
        let report = inspect_stream(&stream(4_000), &cfg, false, 11, 5).unwrap();

        assert!(report.yielded.iter().all(|&n| n <= report.advisory_len));
        assert!(report.min_seq_len >= 5);
        assert!(report.max_seq_len <= 12 + 25);
        assert_eq!(report.max_seq_len, 12 + 25);
    }

    #[test]
    fn test_shuffled_report_yields_len() {
        let cfg    = LmLoaderConfig::new(2, 10, 10);
        let report = inspect_stream(&stream(400), &cfg, true, 1, 3).unwrap();
        assert_eq!(report.yielded, vec![19, 19, 19]);
        assert_eq!(report.residual_steps, 0);
        assert!(format!("{report}").contains("advisory len:     19"));
    }
}
