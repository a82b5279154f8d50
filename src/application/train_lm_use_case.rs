// ============================================================
// Layer 2 — TrainLmUseCase
// ============================================================
// Orchestrates language-model training in order:
//
//   Step 1: Load the text corpus          (Layer 4 - data)
//   Step 2: Build / load tokenizer        (Layer 6 - infra)
//   Step 3: Encode into one token stream  (Layer 6 - infra)
//   Step 4: Split off the validation tail (Layer 4 - data)
//   Step 5: Build train/valid loaders     (Layer 4 - data)
//   Step 6: Build the model from the data (Layer 5 - ml)
//   Step 7: Save configs                  (Layer 6 - infra)
//   Step 8: Run the training loop         (Layer 5 - ml)
//
// Loaders are batch-first so the flattened targets line up with
// the model's flattened predictions.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    corpus::TextCorpusLoader,
    lm_data::LanguageModelData,
    lm_loader::LmLoaderConfig,
    splitter::split_stream,
};
use crate::domain::traits::DocumentSource;
use crate::infra::{
    checkpoint::{CheckpointManager, MODEL_CONFIG_FILE, TRAIN_CONFIG_FILE},
    metrics::MetricsLogger,
    tokenizer_store::{encode_stream, TokenizerStore, PAD_ID},
};
use crate::ml::{
    encoder::Activation,
    trainer::{default_device, fit_language_model, FitSettings, TrainBackend},
};

// ─── Training Configuration ──────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmTrainConfig {
    pub corpus:         String,
    pub checkpoint_dir: String,
    pub vocab_size:     usize,
    pub valid_fraction: f64,
    pub batch_size:     usize,
    pub bptt:           usize,
    pub target_length:  usize,
    pub backwards:      bool,
    pub randomize_bptt: bool,
    pub shuffle:        bool,
    pub seed:           u64,
    pub epochs:         usize,
    pub lr:             f64,
    pub grad_clip:      Option<f32>,
    pub d_model:        usize,
    pub n_head:         usize,
    pub n_layer:        usize,
    pub embd_pdrop:     f64,
    pub attn_pdrop:     f64,
    pub resid_pdrop:    f64,
    pub activation:     Activation,
}

impl Default for LmTrainConfig {
    fn default() -> Self {
        Self {
            corpus:         "data/corpus".to_string(),
            checkpoint_dir: "checkpoints/lm".to_string(),
            vocab_size:     30000,
            valid_fraction: 0.1,
            batch_size:     32,
            bptt:           70,
            target_length:  70,
            backwards:      false,
            randomize_bptt: true,
            shuffle:        true,
            seed:           42,
            epochs:         10,
            lr:             2.5e-4,
            grad_clip:      Some(0.25),
            d_model:        256,
            n_head:         8,
            n_layer:        6,
            embd_pdrop:     0.1,
            attn_pdrop:     0.1,
            resid_pdrop:    0.1,
            activation:     Activation::Gelu,
        }
    }
}

impl LmTrainConfig {
    pub fn loader_config(&self) -> LmLoaderConfig {
        LmLoaderConfig::new(self.batch_size, self.bptt, self.target_length)
            .with_batch_first(true)
            .with_backwards(self.backwards)
            .with_randomize_bptt(self.randomize_bptt)
    }
}

// ─── TrainLmUseCase ───────────────────────────────────────────────────────────
pub struct TrainLmUseCase {
    config: LmTrainConfig,
}

impl TrainLmUseCase {
    pub fn new(config: LmTrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;
        if cfg.shuffle && cfg.backwards {
            tracing::warn!("Shuffled loading never reverses the stream; ignoring `backwards` for training and validation");
        }

        // ── Step 1: Load corpus ───────────────────────────────────────────────
        tracing::info!("Loading corpus from '{}'", cfg.corpus);
        let docs = TextCorpusLoader::new(&cfg.corpus).load_all()?;
        if docs.is_empty() {
            bail!("No documents found in '{}'", cfg.corpus);
        }
        let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();

        // ── Step 2–3: Tokenizer and token stream ──────────────────────────────
        let tokenizer = TokenizerStore::new(&cfg.checkpoint_dir).load_or_build(&texts, cfg.vocab_size)?;
        let stream    = encode_stream(&tokenizer, &texts)?;
        tracing::info!("Encoded corpus into {} tokens", stream.len());

        // ── Step 4: Validation tail ───────────────────────────────────────────
        let (train_tokens, valid_tokens) = split_stream(&stream, 1.0 - cfg.valid_fraction);
        tracing::info!("Split: {} train tokens, {} valid tokens", train_tokens.len(), valid_tokens.len());

        // ── Step 5: Loaders ───────────────────────────────────────────────────
        let device   = default_device();
        let mut data = LanguageModelData::<TrainBackend>::new(
            train_tokens,
            valid_tokens,
            tokenizer.get_vocab_size(true),
            PAD_ID,
            &cfg.loader_config(),
            cfg.shuffle,
            cfg.seed,
            &device,
        )
        .context("Cannot build language model loaders")?;

        // ── Step 6: Model ─────────────────────────────────────────────────────
        let mut model_cfg = data.transformer_config(cfg.d_model, cfg.n_head, cfg.n_layer);
        model_cfg.encoder = model_cfg
            .encoder
            .with_embd_pdrop(cfg.embd_pdrop)
            .with_attn_pdrop(cfg.attn_pdrop)
            .with_resid_pdrop(cfg.resid_pdrop)
            .with_activation(cfg.activation);
        let model = model_cfg.init::<TrainBackend>(&device);
        tracing::info!(
            "Model ready: {} layers, d_model={}, n_ctx={}, target_length={}",
            cfg.n_layer, cfg.d_model, model_cfg.encoder.n_ctx, model_cfg.target_length,
        );
        for group in model.layer_groups() {
            tracing::debug!("layer group {:<10} {:>10} params", group.name, group.num_params);
        }

        // ── Step 7: Configs ───────────────────────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt.save_config(TRAIN_CONFIG_FILE, cfg)?;
        ckpt.save_config(MODEL_CONFIG_FILE, &model_cfg)?;

        // ── Step 8: Train ─────────────────────────────────────────────────────
        let metrics  = MetricsLogger::new(&cfg.checkpoint_dir, "perplexity")?;
        let settings = FitSettings {
            epochs:        cfg.epochs,
            learning_rate: cfg.lr,
            grad_clip:     cfg.grad_clip,
        };
        fit_language_model(model, &mut data, &settings, &ckpt, &metrics)?;
        Ok(())
    }
}
