// ============================================================
// Layer 5 — Training Loops
// ============================================================
// Epoch loops for the language model and the classifier, both
// with Adam and the same shape:
//
//   for each epoch:
//     train: forward → loss → backward → Adam step
//     valid: model.valid() (inner backend, dropout off)
//     log EpochMetrics (CSV + tracing), save checkpoint
//     mark the epoch as best if valid_loss improved
//
// Key Burn 0.20 points:
//   - training runs on an AutodiffBackend
//   - model.valid() returns the model on B::InnerBackend, so
//     validation tensors must live there too: LM batches are
//     moved with .inner(), classifier batches come from a loader
//     built on the inner backend
//   - argmax(1) returns [batch, 1], flattened before .equal()
//
// Reference: Burn Book §5 (Training)
//            Kingma & Ba (2015) Adam

use anyhow::{ensure, Result};
use burn::{
    data::dataloader::DataLoader,
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::sync::Arc;

use crate::data::collator::ClassifierBatch;
use crate::data::lm_data::LanguageModelData;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{perplexity, EpochMetrics, MetricsLogger};
use crate::ml::classifier::TransformerClassifier;
use crate::ml::language_model::TransformerLanguageModel;

pub type InnerBackend = burn::backend::Wgpu;
pub type TrainBackend = burn::backend::Autodiff<InnerBackend>;

pub fn default_device() -> burn::backend::wgpu::WgpuDevice {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    device
}

/// Optimiser and schedule settings shared by both loops.
#[derive(Debug, Clone)]
pub struct FitSettings {
    pub epochs:        usize,
    pub learning_rate: f64,
    /// Clip the global gradient norm to this value
    pub grad_clip:     Option<f32>,
}

impl FitSettings {
    fn optimizer(&self) -> AdamConfig {
        AdamConfig::new()
            .with_epsilon(1e-8)
            .with_grad_clipping(self.grad_clip.map(GradientClippingConfig::Norm))
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count > 0 { sum / count as f64 } else { f64::NAN }
}

fn track_best(row: &EpochMetrics, best_valid_loss: &mut f64, ckpt: &CheckpointManager) -> Result<()> {
    if row.is_improvement(*best_valid_loss) {
        *best_valid_loss = row.valid_loss;
        ckpt.mark_best(row.epoch)?;
        tracing::info!("New best valid_loss={:.4} at epoch {}", row.valid_loss, row.epoch);
    }
    Ok(())
}

// ─── Language Model ───────────────────────────────────────────────────────────
pub fn fit_language_model<B: AutodiffBackend>(
    mut model: TransformerLanguageModel<B>,
    data:      &mut LanguageModelData<B>,
    settings:  &FitSettings,
    ckpt:      &CheckpointManager,
    metrics:   &MetricsLogger,
) -> Result<(TransformerLanguageModel<B>, Vec<EpochMetrics>)> {
    ensure!(
        data.is_batch_first(),
        "Language model batches must be laid out [batch, seq]; build the loaders with batch_first"
    );

    let mut optim   = settings.optimizer().init();
    let mut history = Vec::with_capacity(settings.epochs);
    let mut best    = f64::INFINITY;

    for epoch in 1..=settings.epochs {
        // ── Training phase ────────────────────────────────────────────────────
        let mut train_sum = 0.0f64;
        let mut train_n   = 0usize;
        for batch in data.train.batches() {
            let loss = model.forward_loss(batch.input, batch.target);
            train_sum += loss.clone().into_scalar().elem::<f64>();
            train_n   += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(settings.learning_rate, model, grads);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();
        let mut valid_sum = 0.0f64;
        let mut valid_n   = 0usize;
        for batch in data.valid.batches() {
            let loss = model_valid.forward_loss(batch.input.inner(), batch.target.inner());
            valid_sum += loss.into_scalar().elem::<f64>();
            valid_n   += 1;
        }

        let train_loss = mean(train_sum, train_n);
        let valid_loss = mean(valid_sum, valid_n);
        let row = EpochMetrics::new(epoch, train_loss, valid_loss, perplexity(valid_loss));

        tracing::info!(
            "Epoch {:>3}/{} | train_loss={:.4} | valid_loss={:.4} | perplexity={:.2} | batches={}",
            epoch, settings.epochs, train_loss, valid_loss, row.score, train_n,
        );
        metrics.log(&row)?;
        ckpt.save_model(&model, epoch)?;
        track_best(&row, &mut best, ckpt)?;
        history.push(row);
    }

    tracing::info!("Language model training complete");
    Ok((model, history))
}

// ─── Classifier ───────────────────────────────────────────────────────────────
const SEQ_FIRST_CLASSIFIER_BATCH: &str =
    "Classifier batches must be laid out [batch, seq]; build the loaders without transpose";

pub fn fit_classifier<B: AutodiffBackend>(
    mut model: TransformerClassifier<B>,
    train:     Arc<dyn DataLoader<B, ClassifierBatch<B>>>,
    valid:     Arc<dyn DataLoader<B::InnerBackend, ClassifierBatch<B::InnerBackend>>>,
    settings:  &FitSettings,
    ckpt:      &CheckpointManager,
    metrics:   &MetricsLogger,
) -> Result<(TransformerClassifier<B>, Vec<EpochMetrics>)> {
    let mut optim   = settings.optimizer().init();
    let mut history = Vec::with_capacity(settings.epochs);
    let mut best    = f64::INFINITY;

    for epoch in 1..=settings.epochs {
        // ── Training phase ────────────────────────────────────────────────────
        let mut train_sum = 0.0f64;
        let mut train_n   = 0usize;
        for batch in train.iter() {
            ensure!(batch.batch_first, "{SEQ_FIRST_CLASSIFIER_BATCH}");
            let targets = batch.flat_targets();
            let out     = model.forward_classification(batch.inputs, targets);
            train_sum += out.loss.clone().into_scalar().elem::<f64>();
            train_n   += 1;

            let grads = GradientsParams::from_grads(out.loss.backward(), &model);
            model = optim.step(settings.learning_rate, model, grads);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();
        let mut valid_sum = 0.0f64;
        let mut valid_n   = 0usize;
        let mut correct   = 0usize;
        let mut seen      = 0usize;
        for batch in valid.iter() {
            ensure!(batch.batch_first, "{SEQ_FIRST_CLASSIFIER_BATCH}");
            let targets = batch.flat_targets();
            let out     = model_valid.forward_classification(batch.inputs, targets.clone());
            valid_sum += out.loss.into_scalar().elem::<f64>();
            valid_n   += 1;

            seen += targets.dims()[0];
            let hits: i64 = out
                .logits
                .argmax(1)
                .flatten::<1>(0, 1)
                .equal(targets)
                .int()
                .sum()
                .into_scalar()
                .elem::<i64>();
            correct += hits as usize;
        }

        let train_loss = mean(train_sum, train_n);
        let valid_loss = mean(valid_sum, valid_n);
        let accuracy   = if seen > 0 { correct as f64 / seen as f64 } else { 0.0 };
        let row = EpochMetrics::new(epoch, train_loss, valid_loss, accuracy);

        tracing::info!(
            "Epoch {:>3}/{} | train_loss={:.4} | valid_loss={:.4} | accuracy={:.1}%",
            epoch, settings.epochs, train_loss, valid_loss, accuracy * 100.0,
        );
        metrics.log(&row)?;
        ckpt.save_model(&model, epoch)?;
        track_best(&row, &mut best, ckpt)?;
        history.push(row);
    }

    tracing::info!("Classifier training complete");
    Ok((model, history))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::collator::FixedLengthLoaderConfig;
    use crate::data::dataset::{TextDataset, TextDatasetConfig};
    use crate::data::lm_loader::LmLoaderConfig;
    use crate::domain::example::Example;
    use crate::ml::classifier::TransformerClassifierConfig;
    use crate::ml::encoder::TransformerEncoderConfig;
    use burn::backend::{Autodiff, NdArray};
    use tempfile::tempdir;

    type TestBackend = Autodiff<NdArray>;

    fn settings(epochs: usize) -> FitSettings {
        FitSettings { epochs, learning_rate: 1e-3, grad_clip: Some(1.0) }
    }

    #[test]
    fn test_language_model_epochs_logged_and_saved() {
        let dir    = tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        let log    = MetricsLogger::new(dir.path(), "perplexity").unwrap();
        let device = Default::default();

        let tokens: Vec<u32> = (0..600).map(|i| (i % 17) + 4).collect();
        let cfg = LmLoaderConfig::new(4, 8, 4).with_batch_first(true);
        let mut data = LanguageModelData::<TestBackend>::new(
            &tokens[..480], &tokens[480..], 24, 0, &cfg, true, 5, &device,
        )
        .unwrap();

        let model = data.transformer_config(16, 2, 1).init::<TestBackend>(&device);
        let (_, history) = fit_language_model(model, &mut data, &settings(2), &ckpt, &log).unwrap();

        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|m| m.train_loss.is_finite() && m.score >= 1.0));
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);

        let best = history
            .iter()
            .min_by(|a, b| a.valid_loss.total_cmp(&b.valid_loss))
            .unwrap()
            .epoch;
        assert_eq!(ckpt.best_epoch().unwrap(), best);
    }

    #[test]
    fn test_seq_first_language_model_data_rejected() {
        let dir    = tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        let log    = MetricsLogger::new(dir.path(), "perplexity").unwrap();
        let device = Default::default();

        let tokens: Vec<u32> = (0..600).map(|i| (i % 17) + 4).collect();
        let cfg = LmLoaderConfig::new(4, 8, 4);
        let mut data = LanguageModelData::<TestBackend>::new(
            &tokens[..480], &tokens[480..], 24, 0, &cfg, false, 5, &device,
        )
        .unwrap();
        assert!(!data.is_batch_first());

        let model = data.transformer_config(16, 2, 1).init::<TestBackend>(&device);
        let err   = fit_language_model(model, &mut data, &settings(1), &ckpt, &log).unwrap_err();
        assert!(err.to_string().contains("[batch, seq]"));
        assert!(ckpt.latest_epoch().is_err());
    }

    #[test]
    fn test_classifier_accuracy_in_range() {
        let dir    = tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        let log    = MetricsLogger::new(dir.path(), "accuracy").unwrap();
        let device = Default::default();

        let examples: Vec<Example> = (0..12)
            .map(|i| Example::new(vec![4 + (i % 5) as u32; 1 + i % 6], i % 2))
            .collect();
        let loader_cfg = FixedLengthLoaderConfig::new(6, 4);
        let train = loader_cfg
            .build::<TestBackend, _>(TextDataset::new(examples.clone(), TextDatasetConfig::default()), &device)
            .unwrap();
        let valid = loader_cfg
            .build::<NdArray, _>(TextDataset::new(examples, TextDatasetConfig::default()), &device)
            .unwrap();

        let model = TransformerClassifierConfig::new(TransformerEncoderConfig::new(10, 6, 8, 2, 1, 0), 2)
            .with_concat_pool(true)
            .init::<TestBackend>(&device);
        let (_, history) = fit_classifier(model, train, valid, &settings(1), &ckpt, &log).unwrap();

        assert_eq!(history.len(), 1);
        assert!((0.0..=1.0).contains(&history[0].score));
    }

    #[test]
    fn test_transposed_classifier_batches_rejected() {
        let dir    = tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        let log    = MetricsLogger::new(dir.path(), "accuracy").unwrap();
        let device = Default::default();

        // 4 x 4 batches: square inputs would otherwise pass shape checks
        let examples: Vec<Example> = (0..8)
            .map(|i| Example::new(vec![4 + (i % 5) as u32; 1 + i % 4], i % 2))
            .collect();
        let mut loader_cfg = FixedLengthLoaderConfig::new(4, 4);
        loader_cfg.transpose = true;
        let train = loader_cfg
            .build::<TestBackend, _>(TextDataset::new(examples.clone(), TextDatasetConfig::default()), &device)
            .unwrap();
        let valid = loader_cfg
            .build::<NdArray, _>(TextDataset::new(examples, TextDatasetConfig::default()), &device)
            .unwrap();

        let model = TransformerClassifierConfig::new(TransformerEncoderConfig::new(10, 4, 8, 2, 1, 0), 2)
            .init::<TestBackend>(&device);
        let err = fit_classifier(model, train, valid, &settings(1), &ckpt, &log).unwrap_err();
        assert!(err.to_string().contains("without transpose"));
    }
}
