// ============================================================
// Layer 4 — Language Model Data Bundle
// ============================================================
// Pairs a training and a validation batch source built from the
// same loader settings, together with what a model needs to know
// about the vocabulary.
//
//   train: LanguageModelLoader            (shuffle = false)
//          ShuffledLanguageModelLoader    (shuffle = true)
//   valid: LanguageModelLoader, fixed chunk length, never shuffled
//
// Validation always uses plain bptt chunks so that validation
// loss is comparable from one epoch to the next. It also reads
// the text in the same direction as training: the shuffled
// loader never reverses, so `backwards` is cleared for both
// sources when `shuffle` is set.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use burn::prelude::*;

use crate::data::error::Result;
use crate::data::lm_loader::{LanguageModelLoader, LmBatchSource, LmLoaderConfig};
use crate::data::shuffled_loader::ShuffledLanguageModelLoader;

pub struct LanguageModelData<B: Backend> {
    pub train:      Box<dyn LmBatchSource<B>>,
    pub valid:      Box<dyn LmBatchSource<B>>,
    pub vocab_size: usize,
    pub pad_idx:    u32,
}

impl<B: Backend> LanguageModelData<B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        train_tokens: &[u32],
        valid_tokens: &[u32],
        vocab_size:   usize,
        pad_idx:      u32,
        config:       &LmLoaderConfig,
        shuffle:      bool,
        seed:         u64,
        device:       &B::Device,
    ) -> Result<Self> {
        let train: Box<dyn LmBatchSource<B>> = if shuffle {
            Box::new(ShuffledLanguageModelLoader::new(train_tokens, config, device)?.with_seed(seed))
        } else {
            Box::new(LanguageModelLoader::new(train_tokens, config, device)?.with_seed(seed))
        };

        let valid_config = config
            .clone()
            .with_randomize_bptt(false)
            .with_backwards(config.backwards && !shuffle);
        let valid = LanguageModelLoader::new(valid_tokens, &valid_config, device)?
            .with_seed(seed.wrapping_add(1));

        tracing::info!(
            "LM data: {} train batches/epoch, {} valid batches, vocab {}",
            train.len(),
            valid.len(),
            vocab_size
        );

        Ok(Self { train, valid: Box::new(valid), vocab_size, pad_idx })
    }

    /// Target positions per stream, as produced by the training source.
    pub fn target_length(&self) -> usize {
        self.train.target_length()
    }

    /// Widest input window the training source can yield.
    pub fn max_seq_len(&self) -> usize {
        self.train.max_seq_len()
    }

    /// Both sources lay batches out as `[batch, seq]`.
    pub fn is_batch_first(&self) -> bool {
        self.train.is_batch_first() && self.valid.is_batch_first()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batchify::LmBatch;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_valid_source_never_randomized() {
        let device = Default::default();
        let tokens: Vec<u32> = (0..600).collect();
        let cfg = LmLoaderConfig::new(2, 10, 5)
            .with_batch_first(true)
            .with_randomize_bptt(true);

        let mut data = LanguageModelData::<TestBackend>::new(
            &tokens[..500], &tokens[500..], 600, 0, &cfg, true, 9, &device,
        )
        .unwrap();

        assert!(data.is_batch_first());
        assert_eq!(data.target_length(), 5);
        assert_eq!(data.max_seq_len(), 35);
        assert_eq!(data.valid.max_seq_len(), 10);
        let all_fixed = data.valid.batches().all(|b| b.seq_len == 10);
        assert!(all_fixed);
        let yielded = data.train.batches().count();
        assert_eq!(yielded, data.train.len());
    }

    #[test]
    fn test_shuffled_training_validates_forwards() {
        let device = Default::default();
        let tokens: Vec<u32> = (0..600).collect();
        let cfg = LmLoaderConfig::new(1, 10, 10)
            .with_batch_first(true)
            .with_backwards(true);

        let mut data = LanguageModelData::<TestBackend>::new(
            &tokens[..500], &tokens[500..], 600, 0, &cfg, true, 4, &device,
        )
        .unwrap();

        let ascending = |b: LmBatch<TestBackend>| {
            let row = b.input.into_data().convert::<i64>().to_vec::<i64>().unwrap();
            row.windows(2).all(|w| w[1] == w[0] + 1)
        };
        let train_forward = data.train.batches().all(ascending);
        let valid_forward = data.valid.batches().all(ascending);
        assert!(train_forward);
        assert!(valid_forward);
    }

    #[test]
    fn test_streaming_training_keeps_backwards_validation() {
        let device = Default::default();
        let tokens: Vec<u32> = (0..600).collect();
        let cfg = LmLoaderConfig::new(1, 10, 10)
            .with_batch_first(true)
            .with_backwards(true);

        let mut data = LanguageModelData::<TestBackend>::new(
            &tokens[..500], &tokens[500..], 600, 0, &cfg, false, 4, &device,
        )
        .unwrap();

        let first = data.valid.batches().next().unwrap();
        let row   = first.input.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(row[0], 599);
        assert!(row.windows(2).all(|w| w[1] == w[0] - 1));
    }

    #[test]
    fn test_short_validation_stream_is_error() {
        let device = Default::default();
        let tokens: Vec<u32> = (0..300).collect();
        let cfg = LmLoaderConfig::new(2, 10, 5);
        let res = LanguageModelData::<TestBackend>::new(
            &tokens[..290], &tokens[290..], 300, 0, &cfg, false, 0, &device,
        );
        assert!(res.is_err());
    }
}
