// ============================================================
// Layer 4 — Streaming Language Model Loader
// ============================================================
// Walks a BatchMatrix from left to right, one chunk at a time,
// without overlap and without skipping tokens. Each stream keeps
// its token order across batches, so a recurrent model can carry
// its hidden state from one batch to the next.
//
// Per step:
//   1. pick a chunk length (ChunkLengthPolicy)
//   2. stop if the chunk would reach the end of the stream
//      (the residual tail is dropped, at most one chunk's worth)
//   3. yield get_batch(cursor, len) and advance the cursor by len
//
// The reported length, n / bptt - 1, is only a hint for progress
// bars: with randomized chunks the loader can yield fewer batches.
//
// Reference: Merity et al. (2017) AWD-LSTM
//            Rust Book §13 (Iterators)

use burn::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::batchify::{BatchMatrix, LmBatch, SequenceBatcher};
use crate::data::chunk_len::ChunkLengthPolicy;
use crate::data::error::{DataError, Result};

// ─── LmBatchSource ────────────────────────────────────────────────────────────
/// Anything the language-model training loop can pull batches from.
pub trait LmBatchSource<B: Backend> {
    /// Start a fresh pass and iterate its batches.
    fn batches(&mut self) -> Box<dyn Iterator<Item = LmBatch<B>> + '_>;

    /// Advisory number of batches per pass.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of target positions per stream.
    fn target_length(&self) -> usize;

    /// Widest input window this source can yield.
    fn max_seq_len(&self) -> usize;

    /// Inputs come out as `[batch, seq]` rather than `[seq, batch]`.
    fn is_batch_first(&self) -> bool;
}

// ─── LmLoaderConfig ───────────────────────────────────────────────────────────
/// Shared settings of the streaming and shuffled loaders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LmLoaderConfig {
    pub batch_size:     usize,
    pub bptt:           usize,
    pub target_length:  usize,
    pub backwards:      bool,
    pub batch_first:    bool,
    pub randomize_bptt: bool,
    /// Start randomized passes with the widest chunk.
    pub warmup:         bool,
}

impl LmLoaderConfig {
    pub fn new(batch_size: usize, bptt: usize, target_length: usize) -> Self {
        Self {
            batch_size,
            bptt,
            target_length,
            backwards:      false,
            batch_first:    false,
            randomize_bptt: false,
            warmup:         true,
        }
    }

    pub fn with_backwards(mut self, backwards: bool) -> Self {
        self.backwards = backwards;
        self
    }

    pub fn with_batch_first(mut self, batch_first: bool) -> Self {
        self.batch_first = batch_first;
        self
    }

    pub fn with_randomize_bptt(mut self, randomize: bool) -> Self {
        self.randomize_bptt = randomize;
        self
    }

    pub fn with_warmup(mut self, warmup: bool) -> Self {
        self.warmup = warmup;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.target_length > self.bptt {
            return Err(DataError::InvalidConfig(format!(
                "target_length ({}) must not exceed bptt ({})",
                self.target_length, self.bptt
            )));
        }
        Ok(())
    }

    pub(crate) fn policy(&self) -> Result<ChunkLengthPolicy> {
        ChunkLengthPolicy::new(self.bptt, self.randomize_bptt, self.warmup)
    }

    pub(crate) fn batcher(&self) -> SequenceBatcher {
        SequenceBatcher::new(self.batch_size, self.target_length)
            .with_batch_first(self.batch_first)
    }
}

// ─── LanguageModelLoader ──────────────────────────────────────────────────────
pub struct LanguageModelLoader<B: Backend, R: Rng = StdRng> {
    matrix: BatchMatrix<B>,
    policy: ChunkLengthPolicy,
    rng:    R,
}

impl<B: Backend> LanguageModelLoader<B, StdRng> {
    /// Lay `tokens` out on `device` and prepare a streaming pass.
    pub fn new(tokens: &[u32], config: &LmLoaderConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;
        let policy = config.policy()?;
        let matrix = config
            .batcher()
            .with_reverse(config.backwards)
            .batchify(tokens, device)?;

        let loader = Self { matrix, policy, rng: StdRng::from_entropy() };
        if loader.len() == 0 {
            return Err(DataError::StreamTooShort {
                tokens:     tokens.len(),
                batch_size: config.batch_size,
                needed:     2 * config.bptt * config.batch_size,
            });
        }

        tracing::debug!(
            "LanguageModelLoader: {} streams x {} steps, ~{} batches",
            loader.matrix.batch_size(),
            loader.matrix.steps(),
            loader.len()
        );
        Ok(loader)
    }

    /// Reseed the chunk-length sampler.
    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(StdRng::seed_from_u64(seed))
    }
}

impl<B: Backend, R: Rng> LanguageModelLoader<B, R> {
    /// Swap in another random source.
    pub fn with_rng<R2: Rng>(self, rng: R2) -> LanguageModelLoader<B, R2> {
        LanguageModelLoader { matrix: self.matrix, policy: self.policy, rng }
    }

    /// Advisory batch count: `n / bptt - 1`.
    pub fn len(&self) -> usize {
        (self.matrix.steps() / self.policy.bptt()).saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Steps per stream.
    pub fn steps(&self) -> usize {
        self.matrix.steps()
    }

    pub fn batch_size(&self) -> usize {
        self.matrix.batch_size()
    }

    pub fn max_possible_seq_len(&self) -> usize {
        self.policy.max_len()
    }

    /// Begin a pass from the start of every stream.
    pub fn iter(&mut self) -> LmLoaderIter<'_, B, R> {
        LmLoaderIter { loader: self, cursor: 0, step: 0, done: false }
    }
}

impl<B: Backend, R: Rng> LmBatchSource<B> for LanguageModelLoader<B, R> {
    fn batches(&mut self) -> Box<dyn Iterator<Item = LmBatch<B>> + '_> {
        Box::new(self.iter())
    }

    fn len(&self) -> usize {
        LanguageModelLoader::len(self)
    }

    fn target_length(&self) -> usize {
        self.matrix.target_length()
    }

    fn max_seq_len(&self) -> usize {
        self.policy.max_len()
    }

    fn is_batch_first(&self) -> bool {
        self.matrix.is_batch_first()
    }
}

/// One streaming pass over a [`LanguageModelLoader`].
pub struct LmLoaderIter<'a, B: Backend, R: Rng> {
    loader: &'a mut LanguageModelLoader<B, R>,
    cursor: usize,
    step:   usize,
    done:   bool,
}

impl<'a, B: Backend, R: Rng> Iterator for LmLoaderIter<'a, B, R> {
    type Item = LmBatch<B>;

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.loader.matrix.steps();
        if self.done || self.cursor + 1 >= n || self.step >= self.loader.len() {
            return None;
        }

        let seq_len = self.loader.policy.next_len(self.step, &mut self.loader.rng);
        if self.cursor + seq_len >= n {
            tracing::trace!(
                "dropping {} residual steps per stream",
                n - self.cursor
            );
            self.done = true;
            return None;
        }

        let batch = self.loader.matrix.get_batch(self.cursor, seq_len);
        self.cursor += seq_len;
        self.step   += 1;
        Some(batch)
    }
}
