// ============================================================
// Layer 4 — Fixed Length Batcher (padding collator)
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<Example> of
// ragged sequences into one fixed-width classifier batch.
//
// jag_stack, seq_length = 5, pad = 0:
//
//   examples        pre_pad = true      pre_pad = false
//   [7 8 9]         0 0 7 8 9           7 8 9 0 0
//   [4 5 6 7 8]     4 5 6 7 8           4 5 6 7 8
//   [1]             0 0 0 0 1           1 0 0 0 0
//
// If every example already has exactly seq_length tokens the
// rows are stacked as-is. The collator never truncates: an
// example longer than seq_length is a contract violation and
// fails loudly instead of being silently cut.
//
// Reference: Burn Book §4 (Batcher)
//            Howard & Ruder (2018) ULMFiT, pre-padded classifier input

use burn::{
    data::{
        dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
        dataset::{transform::PartialDataset, Dataset},
    },
    prelude::*,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::error::{DataError, Result};
use crate::domain::example::Example;

// ─── ClassifierBatch ──────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ClassifierBatch<B: Backend> {
    /// `[batch, seq_length]`, or `[seq_length, batch]` when transposed
    pub inputs: Tensor<B, 2, Int>,

    /// Labels as a `[batch, 1]` column, or a `[1, batch]` row when transposed
    pub targets: Tensor<B, 2, Int>,

    /// `inputs` is `[batch, seq_length]`
    pub batch_first: bool,
}

impl<B: Backend> ClassifierBatch<B> {
    /// Labels as a flat `[batch]` vector, the layout cross-entropy expects.
    pub fn flat_targets(&self) -> Tensor<B, 1, Int> {
        let [rows, cols] = self.targets.dims();
        self.targets.clone().reshape([rows * cols])
    }
}

// ─── PaddedRows ───────────────────────────────────────────────────────────────
/// Host-side result of `jag_stack`: a row-major `rows x cols` grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedRows {
    pub values: Vec<u32>,
    pub rows:   usize,
    pub cols:   usize,
}

impl PaddedRows {
    pub fn row(&self, i: usize) -> &[u32] {
        &self.values[i * self.cols..(i + 1) * self.cols]
    }
}

// ─── FixedLengthBatcher ───────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixedLengthBatcher {
    pub seq_length:  usize,
    pub pad_idx:     u32,
    /// Right-align content, padding in front
    pub pre_pad:     bool,
    /// Emit inputs as `[seq_length, batch]`
    pub transpose:   bool,
    /// Emit targets as a `[1, batch]` row
    pub transpose_y: bool,
}

impl FixedLengthBatcher {
    pub fn new(seq_length: usize, pad_idx: u32) -> Self {
        Self {
            seq_length,
            pad_idx,
            pre_pad:     true,
            transpose:   false,
            transpose_y: false,
        }
    }

    pub fn with_pre_pad(mut self, pre_pad: bool) -> Self {
        self.pre_pad = pre_pad;
        self
    }

    pub fn with_transpose(mut self, transpose: bool) -> Self {
        self.transpose = transpose;
        self
    }

    pub fn with_transpose_y(mut self, transpose_y: bool) -> Self {
        self.transpose_y = transpose_y;
        self
    }

    /// Pad ragged sequences into a `len(seqs) x seq_length` grid.
    pub fn jag_stack(&self, seqs: &[&[u32]]) -> Result<PaddedRows> {
        if seqs.is_empty() {
            return Err(DataError::EmptyBatch);
        }
        if let Some((index, seq)) = seqs.iter().enumerate().find(|(_, s)| s.len() > self.seq_length) {
            return Err(DataError::PaddingContractViolation {
                index,
                len:        seq.len(),
                seq_length: self.seq_length,
            });
        }

        let rows = seqs.len();
        let cols = self.seq_length;

        if seqs.iter().all(|s| s.len() == cols) {
            let values = seqs.iter().flat_map(|s| s.iter().copied()).collect();
            return Ok(PaddedRows { values, rows, cols });
        }

        let mut values = vec![self.pad_idx; rows * cols];
        for (i, seq) in seqs.iter().enumerate() {
            let row = &mut values[i * cols..(i + 1) * cols];
            if self.pre_pad {
                row[cols - seq.len()..].copy_from_slice(seq);
            } else {
                row[..seq.len()].copy_from_slice(seq);
            }
        }
        Ok(PaddedRows { values, rows, cols })
    }

    /// Collate `items` into tensors on `device`.
    pub fn try_batch<B: Backend>(&self, items: &[Example], device: &B::Device) -> Result<ClassifierBatch<B>> {
        let seqs: Vec<&[u32]> = items.iter().map(|ex| ex.tokens.as_slice()).collect();
        let padded = self.jag_stack(&seqs)?;

        let values: Vec<i64> = padded.values.iter().map(|&t| t as i64).collect();
        let mut inputs = Tensor::<B, 2, Int>::from_data(
            TensorData::new(values, [padded.rows, padded.cols]),
            device,
        );
        if self.transpose {
            inputs = inputs.swap_dims(0, 1);
        }

        let labels: Vec<i64> = items.iter().map(|ex| ex.label as i64).collect();
        let mut targets = Tensor::<B, 2, Int>::from_data(
            TensorData::new(labels, [items.len(), 1]),
            device,
        );
        if self.transpose_y {
            targets = targets.swap_dims(0, 1);
        }

        Ok(ClassifierBatch { inputs, targets, batch_first: !self.transpose })
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// Batcher::batch cannot return an error, so a contract violation
// stops the loader here with the collator's message.
impl<B: Backend> Batcher<B, Example, ClassifierBatch<B>> for FixedLengthBatcher {
    fn batch(&self, items: Vec<Example>, device: &B::Device) -> ClassifierBatch<B> {
        match self.try_batch(&items, device) {
            Ok(batch) => batch,
            Err(e) => panic!("FixedLengthBatcher: {e}"),
        }
    }
}

// ─── FixedLengthLoaderConfig ──────────────────────────────────────────────────
/// Options for building a burn DataLoader around [`FixedLengthBatcher`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixedLengthLoaderConfig {
    pub seq_length:  usize,
    pub batch_size:  usize,
    /// Shuffle seed; `None` keeps dataset order
    pub shuffle:     Option<u64>,
    pub pad_idx:     u32,
    pub pre_pad:     bool,
    pub drop_last:   bool,
    pub transpose:   bool,
    pub transpose_y: bool,
    pub num_workers: usize,
}

impl FixedLengthLoaderConfig {
    pub fn new(seq_length: usize, batch_size: usize) -> Self {
        Self {
            seq_length,
            batch_size,
            shuffle:     None,
            pad_idx:     0,
            pre_pad:     true,
            drop_last:   false,
            transpose:   false,
            transpose_y: false,
            num_workers: 1,
        }
    }

    pub fn batcher(&self) -> FixedLengthBatcher {
        FixedLengthBatcher::new(self.seq_length, self.pad_idx)
            .with_pre_pad(self.pre_pad)
            .with_transpose(self.transpose)
            .with_transpose_y(self.transpose_y)
    }

    /// Number of examples the loader will actually visit.
    pub fn kept_len(&self, dataset_len: usize) -> usize {
        if self.drop_last && self.batch_size > 0 {
            dataset_len - dataset_len % self.batch_size
        } else {
            dataset_len
        }
    }

    /// Build the loader.
    ///
    /// `drop_last` keeps the first `len - len % batch_size` examples,
    /// so with shuffling the dropped tail is always the same examples.
    pub fn build<B, D>(
        &self,
        dataset: D,
        device:  &B::Device,
    ) -> Result<Arc<dyn DataLoader<B, ClassifierBatch<B>>>>
    where
        B: Backend,
        D: Dataset<Example> + 'static,
    {
        if self.batch_size == 0 {
            return Err(DataError::InvalidConfig("batch_size must be > 0".into()));
        }
        if self.seq_length == 0 {
            return Err(DataError::InvalidConfig("seq_length must be > 0".into()));
        }

        let total = dataset.len();
        let kept  = self.kept_len(total);
        if kept == 0 {
            return Err(DataError::InvalidConfig(format!(
                "{total} examples leave no full batch of {}",
                self.batch_size
            )));
        }
        if kept < total {
            tracing::debug!("drop_last: skipping {} examples", total - kept);
        }

        let mut builder = DataLoaderBuilder::new(self.batcher())
            .batch_size(self.batch_size)
            .num_workers(self.num_workers)
            .set_device(device.clone());
        if let Some(seed) = self.shuffle {
            builder = builder.shuffle(seed);
        }

        Ok(builder.build(PartialDataset::new(dataset, 0, kept)))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::{TextDataset, TextDatasetConfig};
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn to_vec<const D: usize>(t: Tensor<TestBackend, D, Int>) -> Vec<i64> {
        t.into_data().convert::<i64>().to_vec::<i64>().unwrap()
    }

    #[test]
    fn test_full_length_rows_stack_directly() {
        let b      = FixedLengthBatcher::new(3, 0);
        let padded = b.jag_stack(&[&[1, 2, 3], &[4, 5, 6]]).unwrap();
        assert_eq!(padded.values, vec![1, 2, 3, 4, 5, 6]);
        assert!(!padded.values.contains(&0));
    }

    #[test]
    fn test_pre_pad_right_aligns() {
        let b      = FixedLengthBatcher::new(5, 1);
        let padded = b.jag_stack(&[&[7, 8, 9], &[4, 5, 6, 7, 8], &[3]]).unwrap();
        assert_eq!(padded.row(0), &[1, 1, 7, 8, 9]);
        assert_eq!(padded.row(1), &[4, 5, 6, 7, 8]);
        assert_eq!(padded.row(2), &[1, 1, 1, 1, 3]);
    }

    #[test]
    fn test_post_pad_left_aligns() {
        let b      = FixedLengthBatcher::new(4, 0).with_pre_pad(false);
        let padded = b.jag_stack(&[&[7, 8], &[9]]).unwrap();
        assert_eq!(padded.row(0), &[7, 8, 0, 0]);
        assert_eq!(padded.row(1), &[9, 0, 0, 0]);
    }

    #[test]
    fn test_too_long_example_fails_fast() {
        let b   = FixedLengthBatcher::new(2, 0);
        let err = b.jag_stack(&[&[1], &[1, 2, 3]]).unwrap_err();
        assert_eq!(err, DataError::PaddingContractViolation { index: 1, len: 3, seq_length: 2 });
    }

    #[test]
    fn test_empty_batch_rejected() {
        let b = FixedLengthBatcher::new(2, 0);
        assert_eq!(b.jag_stack(&[]).unwrap_err(), DataError::EmptyBatch);
    }

    #[test]
    fn test_try_batch_shapes_and_labels() {
        let device = Default::default();
        let b      = FixedLengthBatcher::new(4, 0);
        let items  = vec![Example::new(vec![5, 6], 2), Example::new(vec![7], 0)];

        let batch: ClassifierBatch<TestBackend> = b.try_batch(&items, &device).unwrap();
        assert_eq!(batch.inputs.dims(), [2, 4]);
        assert_eq!(batch.targets.dims(), [2, 1]);
        assert!(batch.batch_first);
        assert_eq!(to_vec(batch.inputs.clone()), vec![0, 0, 5, 6, 0, 0, 0, 7]);
        assert_eq!(to_vec(batch.flat_targets()), vec![2, 0]);
    }

    #[test]
    fn test_transposed_batch() {
        let device = Default::default();
        let b = FixedLengthBatcher::new(3, 0)
            .with_transpose(true)
            .with_transpose_y(true);
        let items = vec![Example::new(vec![1, 2, 3], 4), Example::new(vec![5], 6)];

        let batch: ClassifierBatch<TestBackend> = b.try_batch(&items, &device).unwrap();
        assert_eq!(batch.inputs.dims(), [3, 2]);
        assert_eq!(batch.targets.dims(), [1, 2]);
        assert!(!batch.batch_first);
        assert_eq!(to_vec(batch.inputs.clone()), vec![1, 0, 2, 0, 3, 5]);
        assert_eq!(to_vec(batch.flat_targets()), vec![4, 6]);
    }

    #[test]
    #[should_panic(expected = "fixed pad length")]
    fn test_batcher_trait_panics_on_violation() {
        let device = Default::default();
        let b      = FixedLengthBatcher::new(1, 0);
        let _: ClassifierBatch<TestBackend> =
            Batcher::<TestBackend, _, _>::batch(&b, vec![Example::new(vec![1, 2], 0)], &device);
    }

    fn numbered(n: usize) -> TextDataset {
        let examples = (0..n).map(|i| Example::new(vec![1 + (i % 3) as u32; 1 + i % 4], i)).collect();
        TextDataset::new(examples, TextDatasetConfig::default())
    }

    #[test]
    fn test_loader_drop_last_yields_full_batches_only() {
        let device = Default::default();
        let mut cfg = FixedLengthLoaderConfig::new(4, 4);
        cfg.drop_last = true;
        let loader = cfg.build::<TestBackend, _>(numbered(10), &device).unwrap();

        let sizes: Vec<usize> = loader.iter().map(|b| b.inputs.dims()[0]).collect();
        assert_eq!(sizes, vec![4, 4]);

        cfg.drop_last = false;
        let loader = cfg.build::<TestBackend, _>(numbered(10), &device).unwrap();
        let sizes: Vec<usize> = loader.iter().map(|b| b.inputs.dims()[0]).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_seeded_shuffle_visits_every_example_once() {
        let device = Default::default();
        let mut cfg = FixedLengthLoaderConfig::new(4, 3);
        cfg.shuffle = Some(7);
        let loader = cfg.build::<TestBackend, _>(numbered(10), &device).unwrap();

        let mut labels: Vec<i64> = loader.iter().flat_map(|b| to_vec(b.flat_targets())).collect();
        labels.sort_unstable();
        assert_eq!(labels, (0..10).collect::<Vec<i64>>());
    }

    #[test]
    fn test_kept_len_with_drop_last() {
        let mut cfg = FixedLengthLoaderConfig::new(8, 4);
        assert_eq!(cfg.kept_len(10), 10);
        cfg.drop_last = true;
        assert_eq!(cfg.kept_len(10), 8);
        assert_eq!(cfg.kept_len(3), 0);
    }
}
