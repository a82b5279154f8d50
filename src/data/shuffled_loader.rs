// ============================================================
// Layer 4 — Shuffled Language Model Loader
// ============================================================
// Same batch matrix and chunk lengths as the streaming loader,
// but every batch starts at an independent, uniformly drawn step:
//
//   offset ~ U[0, n - max_possible_seq_len - 1]
//
// Nothing is carried from one batch to the next, which suits
// models that see each window in isolation (transformers) rather
// than ones that thread hidden state through the stream.
//
// Streams are never reversed here.
//
// Reference: Radford et al. (2018) GPT pre-training on random windows

use burn::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::data::batchify::{BatchMatrix, LmBatch};
use crate::data::chunk_len::ChunkLengthPolicy;
use crate::data::error::{DataError, Result};
use crate::data::lm_loader::{LmBatchSource, LmLoaderConfig};

pub struct ShuffledLanguageModelLoader<B: Backend, R: Rng = StdRng> {
    matrix: BatchMatrix<B>,
    policy: ChunkLengthPolicy,
    rng:    R,
}

impl<B: Backend> ShuffledLanguageModelLoader<B, StdRng> {
    /// `config.backwards` is ignored.
    pub fn new(tokens: &[u32], config: &LmLoaderConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;
        if config.backwards {
            tracing::warn!("ShuffledLanguageModelLoader ignores `backwards`");
        }
        let policy = config.policy()?;
        let matrix = config.batcher().batchify(tokens, device)?;

        if matrix.steps() <= policy.max_len() {
            return Err(DataError::StreamTooShort {
                tokens:     tokens.len(),
                batch_size: config.batch_size,
                needed:     (policy.max_len() + 1) * config.batch_size,
            });
        }

        let loader = Self { matrix, policy, rng: StdRng::from_entropy() };
        if loader.len() == 0 {
            return Err(DataError::StreamTooShort {
                tokens:     tokens.len(),
                batch_size: config.batch_size,
                needed:     2 * config.bptt * config.batch_size,
            });
        }
        Ok(loader)
    }

    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(StdRng::seed_from_u64(seed))
    }
}

impl<B: Backend, R: Rng> ShuffledLanguageModelLoader<B, R> {
    pub fn with_rng<R2: Rng>(self, rng: R2) -> ShuffledLanguageModelLoader<B, R2> {
        ShuffledLanguageModelLoader { matrix: self.matrix, policy: self.policy, rng }
    }

    /// Batches per pass: `n / bptt - 1`.
    pub fn len(&self) -> usize {
        (self.matrix.steps() / self.policy.bptt()).saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn steps(&self) -> usize {
        self.matrix.steps()
    }

    pub fn max_possible_seq_len(&self) -> usize {
        self.policy.max_len()
    }

    /// Largest offset a batch may start at.
    pub fn max_offset(&self) -> usize {
        self.matrix.steps() - self.policy.max_len() - 1
    }

    pub fn iter(&mut self) -> ShuffledLoaderIter<'_, B, R> {
        ShuffledLoaderIter { loader: self, step: 0 }
    }
}

impl<B: Backend, R: Rng> LmBatchSource<B> for ShuffledLanguageModelLoader<B, R> {
    fn batches(&mut self) -> Box<dyn Iterator<Item = LmBatch<B>> + '_> {
        Box::new(self.iter())
    }

    fn len(&self) -> usize {
        ShuffledLanguageModelLoader::len(self)
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

pub struct ShuffledLoaderIter<'a, B: Backend, R: Rng> {
    loader: &'a mut ShuffledLanguageModelLoader<B, R>,
    step:   usize,
}

impl<'a, B: Backend, R: Rng> Iterator for ShuffledLoaderIter<'a, B, R> {
    type Item = LmBatch<B>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.step >= self.loader.len() {
            return None;
        }

        let max_offset = self.loader.max_offset();
        let offset     = self.loader.rng.gen_range(0..=max_offset);
        let seq_len    = self.loader.policy.next_len(self.step, &mut self.loader.rng);
        self.step += 1;
        Some(self.loader.matrix.get_batch(offset, seq_len))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.loader.len().saturating_sub(self.step);
        (left, Some(left))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn stream(n: u32) -> Vec<u32> {
        (0..n).collect()
    }

    #[test]
    fn test_yields_exactly_len_batches() {
        let device = Default::default();
        let cfg    = LmLoaderConfig::new(2, 10, 10).with_batch_first(true);
        let mut loader = ShuffledLanguageModelLoader::<TestBackend>::new(&stream(400), &cfg, &device)
            .unwrap()
            .with_seed(3);
        assert_eq!(loader.len(), 19);
        assert_eq!(loader.iter().count(), 19);
    }

    #[test]
    fn test_offsets_within_valid_range() {
        let device = Default::default();
        let cfg = LmLoaderConfig::new(2, 10, 4)
            .with_batch_first(true)
            .with_randomize_bptt(true);
        let mut loader = ShuffledLanguageModelLoader::<TestBackend>::new(&stream(1_000), &cfg, &device)
            .unwrap()
            .with_seed(8);
        let n   = loader.steps();
        let max = loader.max_offset();
        assert_eq!(max, n - 35 - 1);

        for _ in 0..5 {
            for b in loader.iter() {
                assert!(b.offset <= max);
                assert!(b.offset + b.seq_len < n);
                assert_eq!(b.target.dims(), [2 * b.seq_len.min(4)]);
            }
        }
    }

    #[test]
    fn test_first_batch_uses_warmup_width() {
        let device = Default::default();
        let cfg = LmLoaderConfig::new(2, 10, 4).with_randomize_bptt(true);
        let mut loader = ShuffledLanguageModelLoader::<TestBackend>::new(&stream(1_000), &cfg, &device)
            .unwrap()
            .with_seed(2);
        assert_eq!(loader.iter().next().unwrap().seq_len, 35);
    }

    #[test]
    fn test_offsets_roughly_uniform() {
        // n = 200, bptt = 10 → offsets in [0, 189]; ten buckets of 19
        let device = Default::default();
        let cfg    = LmLoaderConfig::new(2, 10, 10).with_batch_first(true);
        let mut loader = ShuffledLanguageModelLoader::<TestBackend>::new(&stream(400), &cfg, &device)
            .unwrap()
            .with_seed(1234);

        let mut buckets = [0usize; 10];
        let mut draws   = 0usize;
        for _ in 0..200 {
            for b in loader.iter() {
                buckets[b.offset / 19] += 1;
                draws += 1;
            }
        }

        let expected = draws as f64 / 10.0;
        for (i, &count) in buckets.iter().enumerate() {
            let ratio = count as f64 / expected;
            assert!((0.75..1.25).contains(&ratio), "bucket {i}: {count} vs {expected}");
        }
    }

    #[test]
    fn test_stream_shorter_than_widest_chunk_rejected() {
        let device = Default::default();
        let cfg    = LmLoaderConfig::new(1, 10, 10).with_randomize_bptt(true);
        let res    = ShuffledLanguageModelLoader::<TestBackend>::new(&stream(30), &cfg, &device);
        assert!(matches!(res, Err(DataError::StreamTooShort { .. })));
    }
}
