// ============================================================
// Layer 4 — Sequence Batcher
// ============================================================
// Turns one long token stream into a grid of parallel streams,
// then cuts (input, target) windows out of that grid.
//
// batchify, with batch_size = 3:
//
//   stream:  0 1 2 3 4 5 6 7 8 9 10
//   truncate to 9, reshape to 3 rows:
//            row 0: 0 1 2
//            row 1: 3 4 5
//            row 2: 6 7 8
//   (reverse: each row flipped)
//   (seq-first: transposed so the time step is axis 0)
//
// get_batch(offset, len) with target_length = t:
//
//   input  = steps [offset, offset + len)
//   target = steps [offset + 1 + max(0, len - t), offset + 1 + len)
//
// so the target is always the last ≤ t positions of the input
// window shifted one step into the future, flattened row-major.
//
// Reference: Burn Book §3 (Tensor operations)
//            Zaremba et al. (2014) batchify scheme for RNN LMs

use burn::prelude::*;

use crate::data::error::{DataError, Result};

// ─── LmBatch ──────────────────────────────────────────────────────────────────
/// One (input, target) pair for language-model training.
#[derive(Debug, Clone)]
pub struct LmBatch<B: Backend> {
    /// `[batch_size, seq_len]` when batch-first, `[seq_len, batch_size]` otherwise
    pub input: Tensor<B, 2, Int>,

    /// Flattened next-token targets, at most `target_length` per stream
    pub target: Tensor<B, 1, Int>,

    /// First step of the input window inside the batch matrix
    pub offset: usize,

    /// Number of steps covered by the input window
    pub seq_len: usize,
}

// ─── SequenceBatcher ──────────────────────────────────────────────────────────
/// Reshapes token streams into a [`BatchMatrix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceBatcher {
    pub batch_size:    usize,
    pub target_length: usize,
    pub reverse:       bool,
    pub batch_first:   bool,
}

impl SequenceBatcher {
    pub fn new(batch_size: usize, target_length: usize) -> Self {
        Self { batch_size, target_length, reverse: false, batch_first: false }
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn with_batch_first(mut self, batch_first: bool) -> Self {
        self.batch_first = batch_first;
        self
    }

    /// Build the grid on `device`.
    ///
    /// Tokens past the last full multiple of `batch_size` are dropped.
    pub fn batchify<B: Backend>(&self, tokens: &[u32], device: &B::Device) -> Result<BatchMatrix<B>> {
        if self.batch_size == 0 {
            return Err(DataError::InvalidConfig("batch_size must be > 0".into()));
        }
        if self.target_length == 0 {
            return Err(DataError::InvalidConfig("target_length must be > 0".into()));
        }

        let steps = tokens.len() / self.batch_size;
        if steps == 0 {
            return Err(DataError::StreamTooShort {
                tokens:     tokens.len(),
                batch_size: self.batch_size,
                needed:     self.batch_size,
            });
        }

        let kept = steps * self.batch_size;
        if kept < tokens.len() {
            tracing::debug!(
                "batchify: dropping {} trailing tokens to fit {} rows",
                tokens.len() - kept,
                self.batch_size
            );
        }

        let values: Vec<i64> = tokens[..kept].iter().map(|&t| t as i64).collect();
        let mut data = Tensor::<B, 2, Int>::from_data(
            TensorData::new(values, [self.batch_size, steps]),
            device,
        );

        if self.reverse {
            data = data.flip([1]);
        }
        if !self.batch_first {
            data = data.swap_dims(0, 1);
        }

        Ok(BatchMatrix {
            data,
            steps,
            batch_size: self.batch_size,
            target_length: self.target_length,
            batch_first: self.batch_first,
        })
    }
}

// ─── BatchMatrix ──────────────────────────────────────────────────────────────
/// A token stream laid out as `batch_size` parallel streams.
#[derive(Debug, Clone)]
pub struct BatchMatrix<B: Backend> {
    data:          Tensor<B, 2, Int>,
    steps:         usize,
    batch_size:    usize,
    target_length: usize,
    batch_first:   bool,
}

impl<B: Backend> BatchMatrix<B> {
    /// Tokens per stream (`n`).
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn target_length(&self) -> usize {
        self.target_length
    }

    pub fn is_batch_first(&self) -> bool {
        self.batch_first
    }

    /// The whole grid.
    pub fn data(&self) -> &Tensor<B, 2, Int> {
        &self.data
    }

    /// Cut the window starting at step `offset` spanning `seq_len` steps.
    ///
    /// # Panics
    /// If `offset + seq_len >= steps()`: the shifted target would run
    /// past the end of the grid.
    pub fn get_batch(&self, offset: usize, seq_len: usize) -> LmBatch<B> {
        assert!(
            offset + seq_len < self.steps,
            "window runs past the stream: offset {offset} + seq_len {seq_len} >= {} steps",
            self.steps
        );

        let target_offset = seq_len.saturating_sub(self.target_length);
        let input_steps   = offset..offset + seq_len;
        let target_steps  = offset + 1 + target_offset..offset + 1 + seq_len;
        let target_len    = target_steps.len() * self.batch_size;

        let (input, target) = if self.batch_first {
            (
                self.data.clone().slice([0..self.batch_size, input_steps]),
                self.data.clone().slice([0..self.batch_size, target_steps]),
            )
        } else {
            (
                self.data.clone().slice([input_steps, 0..self.batch_size]),
                self.data.clone().slice([target_steps, 0..self.batch_size]),
            )
        };

        LmBatch {
            input,
            target: target.reshape([target_len]),
            offset,
            seq_len,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn to_vec<const D: usize>(t: Tensor<TestBackend, D, Int>) -> Vec<i64> {
        t.into_data().convert::<i64>().to_vec::<i64>().unwrap()
    }

    fn stream(n: u32) -> Vec<u32> {
        (0..n).collect()
    }

    #[test]
    fn test_batchify_shape_and_rows() {
        let device  = Default::default();
        let batcher = SequenceBatcher::new(10, 5).with_batch_first(true);
        let m       = batcher.batchify::<TestBackend>(&stream(103), &device).unwrap();

        assert_eq!(m.steps(), 10);
        assert_eq!(m.data().dims(), [10, 10]);

        // Rows concatenated reproduce the first 100 tokens in order
        let flat = to_vec(m.data().clone());
        let expected: Vec<i64> = (0..100).collect();
        assert_eq!(flat, expected);
    }

    #[test]
    fn test_batchify_seq_first_is_transposed() {
        let device = Default::default();
        let m = SequenceBatcher::new(4, 3)
            .batchify::<TestBackend>(&stream(12), &device)
            .unwrap();

        // rows: [0 1 2] [3 4 5] [6 7 8] [9 10 11] → columns after transpose
        assert_eq!(m.data().dims(), [3, 4]);
        assert_eq!(to_vec(m.data().clone()), vec![0, 3, 6, 9, 1, 4, 7, 10, 2, 5, 8, 11]);
    }

    #[test]
    fn test_reverse_is_involutive() {
        let device  = Default::default();
        let tokens  = stream(57);
        let forward = SequenceBatcher::new(5, 3).with_batch_first(true);
        let plain   = forward.batchify::<TestBackend>(&tokens, &device).unwrap();
        let rev     = forward.with_reverse(true).batchify::<TestBackend>(&tokens, &device).unwrap();

        assert_eq!(to_vec(rev.data().clone().flip([1])), to_vec(plain.data().clone()));
        assert_ne!(to_vec(rev.data().clone()), to_vec(plain.data().clone()));
    }

    #[test]
    fn test_get_batch_seq_first() {
        // stream 0..99, bs = 10: data[t][r] = r * 10 + t
        let device = Default::default();
        let m = SequenceBatcher::new(10, 5)
            .batchify::<TestBackend>(&stream(100), &device)
            .unwrap();
        let batch = m.get_batch(0, 5);

        assert_eq!(batch.input.dims(), [5, 10]);
        assert_eq!(batch.target.dims(), [50]);

        let input  = to_vec(batch.input);
        let target = to_vec(batch.target);
        for t in 0..5 {
            for r in 0..10 {
                assert_eq!(input[t * 10 + r], (r * 10 + t) as i64);
                assert_eq!(target[t * 10 + r], (r * 10 + t + 1) as i64);
            }
        }
    }

    #[test]
    fn test_get_batch_target_keeps_tail_only() {
        let device = Default::default();
        let m = SequenceBatcher::new(2, 2)
            .with_batch_first(true)
            .batchify::<TestBackend>(&stream(40), &device)
            .unwrap();
        // rows: 0..20 and 20..40
        let batch = m.get_batch(3, 6);

        assert_eq!(batch.input.dims(), [2, 6]);
        assert_eq!(to_vec(batch.input), vec![3, 4, 5, 6, 7, 8, 23, 24, 25, 26, 27, 28]);
        // last two positions of the window, shifted by one
        assert_eq!(to_vec(batch.target), vec![8, 9, 28, 29]);
    }

    #[test]
    fn test_short_window_uses_whole_shift() {
        // seq_len below target_length: the target is the full shifted window
        let device = Default::default();
        let m = SequenceBatcher::new(1, 8)
            .with_batch_first(true)
            .batchify::<TestBackend>(&stream(20), &device)
            .unwrap();
        let batch = m.get_batch(0, 3);
        assert_eq!(to_vec(batch.target), vec![1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "window runs past the stream")]
    fn test_get_batch_rejects_window_at_stream_end() {
        // 20 steps per stream: offset 15 + 5 leaves no shifted target
        let device = Default::default();
        let m = SequenceBatcher::new(2, 5)
            .with_batch_first(true)
            .batchify::<TestBackend>(&stream(40), &device)
            .unwrap();
        let _ = m.get_batch(15, 5);
    }

    #[test]
    fn test_too_short_stream_is_error() {
        let device = Default::default();
        let err = SequenceBatcher::new(8, 2)
            .batchify::<TestBackend>(&stream(5), &device)
            .unwrap_err();
        assert_eq!(err, DataError::StreamTooShort { tokens: 5, batch_size: 8, needed: 8 });
    }

    #[test]
    fn test_zero_batch_size_is_error() {
        let device = Default::default();
        let res = SequenceBatcher::new(0, 2).batchify::<TestBackend>(&stream(5), &device);
        assert!(matches!(res, Err(DataError::InvalidConfig(_))));
    }
}
