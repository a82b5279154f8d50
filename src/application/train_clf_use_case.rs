// ============================================================
// Layer 2 — TrainClfUseCase
// ============================================================
// Orchestrates classifier training in order:
//
//   Step 1: Load labelled JSONL           (Layer 4 - data)
//   Step 2: Tokenizer                     (Layer 6 - infra)
//           from the LM run when fine-tuning, else built here
//   Step 3: Encode texts into Examples    (Layer 6 - infra)
//   Step 4: Split train/validation        (Layer 4 - data)
//   Step 5: Wrap in TextDataset + loaders (Layer 4 - data)
//   Step 6: Build or transfer the model   (Layer 5 - ml)
//   Step 7: Save configs                  (Layer 6 - infra)
//   Step 8: Run the training loop         (Layer 5 - ml)
//
// Fine-tuning: with `encoder_from` set, the encoder config and
// weights come from a language-model checkpoint directory, and
// only the head starts from scratch. Its n_ctx then bounds the
// padded sequence length.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::data::{
    collator::FixedLengthLoaderConfig,
    corpus::{num_classes, JsonlLoader},
    dataset::{TextDataset, TextDatasetConfig},
    splitter::split_train_val,
};
use crate::domain::example::{Example, LabelledText};
use crate::domain::traits::LabelledSource;
use crate::infra::{
    checkpoint::{CheckpointManager, MODEL_CONFIG_FILE, TRAIN_CONFIG_FILE},
    metrics::MetricsLogger,
    tokenizer_store::{encode, TokenizerStore, BOS_ID, EOS_ID, PAD_ID},
};
use crate::ml::{
    classifier::{TransformerClassifier, TransformerClassifierConfig},
    encoder::TransformerEncoderConfig,
    language_model::TransformerLanguageModelConfig,
    trainer::{default_device, fit_classifier, FitSettings, InnerBackend, TrainBackend},
};

// ─── Training Configuration ──────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierTrainConfig {
    pub data:           String,
    pub checkpoint_dir: String,
    /// LM checkpoint directory to take the encoder from
    pub encoder_from:   Option<String>,
    pub vocab_size:     usize,
    pub valid_fraction: f64,
    pub seed:           u64,
    pub max_seq_len:    usize,
    pub cut_tail:       bool,
    pub backwards:      bool,
    pub add_sentinels:  bool,
    pub pre_pad:        bool,
    pub batch_size:     usize,
    pub num_workers:    usize,
    pub epochs:         usize,
    pub lr:             f64,
    pub d_model:        usize,
    pub n_head:         usize,
    pub n_layer:        usize,
    pub hidden:         Vec<usize>,
    pub concat_pool:    bool,
    pub clf_pdrop:      f64,
}

impl Default for ClassifierTrainConfig {
    fn default() -> Self {
        Self {
            data:           "data/labelled.jsonl".to_string(),
            checkpoint_dir: "checkpoints/clf".to_string(),
            encoder_from:   None,
            vocab_size:     30000,
            valid_fraction: 0.2,
            seed:           42,
            max_seq_len:    254,
            cut_tail:       false,
            backwards:      false,
            add_sentinels:  true,
            pre_pad:        true,
            batch_size:     16,
            num_workers:    1,
            epochs:         5,
            lr:             1e-4,
            d_model:        256,
            n_head:         8,
            n_layer:        6,
            hidden:         vec![50],
            concat_pool:    true,
            clf_pdrop:      0.1,
        }
    }
}

impl ClassifierTrainConfig {
    pub fn dataset_config(&self) -> TextDatasetConfig {
        TextDatasetConfig {
            backwards:   self.backwards,
            sos:         self.add_sentinels.then_some(BOS_ID),
            eos:         self.add_sentinels.then_some(EOS_ID),
            max_seq_len: Some(self.max_seq_len),
            cut_tail:    self.cut_tail,
        }
    }

    /// Loader settings whose pad length fits every transformed example.
    pub fn loader_config(&self, shuffle: bool) -> FixedLengthLoaderConfig {
        let seq_length = self.dataset_config().max_output_len().unwrap_or(self.max_seq_len);
        let mut cfg = FixedLengthLoaderConfig::new(seq_length, self.batch_size);
        cfg.pad_idx     = PAD_ID;
        cfg.pre_pad     = self.pre_pad;
        cfg.num_workers = self.num_workers;
        cfg.shuffle     = shuffle.then_some(self.seed);
        cfg
    }
}

fn encode_all(tokenizer: &Tokenizer, rows: &[LabelledText]) -> Result<Vec<Example>> {
    rows.iter()
        .map(|r| Ok(Example::new(encode(tokenizer, &r.text)?, r.label)))
        .collect()
}

// ─── TrainClfUseCase ──────────────────────────────────────────────────────────
pub struct TrainClfUseCase {
    config: ClassifierTrainConfig,
}

impl TrainClfUseCase {
    pub fn new(config: ClassifierTrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg    = &self.config;
        let device = default_device();

        // ── Step 1: Labelled texts ────────────────────────────────────────────
        let rows = JsonlLoader::new(&cfg.data).load_labelled()?;
        if rows.is_empty() {
            bail!("No labelled texts in '{}'", cfg.data);
        }
        let n_classes = num_classes(&rows);
        tracing::info!("{} texts, {} classes", rows.len(), n_classes);

        // ── Step 2: Tokenizer ─────────────────────────────────────────────────
        let tokenizer = match &cfg.encoder_from {
            Some(dir) => TokenizerStore::new(dir).load()?,
            None => {
                let texts: Vec<&str> = rows.iter().map(|r| r.text.as_str()).collect();
                TokenizerStore::new(&cfg.checkpoint_dir).load_or_build(&texts, cfg.vocab_size)?
            }
        };

        // ── Step 3–4: Examples and split ──────────────────────────────────────
        let examples = encode_all(&tokenizer, &rows)?;
        let (train, valid) = split_train_val(examples, 1.0 - cfg.valid_fraction, cfg.seed);
        tracing::info!("Split: {} train, {} validation", train.len(), valid.len());

        // ── Step 5: Datasets and loaders ──────────────────────────────────────
        let train_cfg = cfg.loader_config(true);
        let valid_cfg = cfg.loader_config(false);
        let train_loader = train_cfg
            .build::<TrainBackend, _>(TextDataset::new(train, cfg.dataset_config()), &device)
            .context("Cannot build training loader")?;
        let valid_loader = valid_cfg
            .build::<InnerBackend, _>(TextDataset::new(valid, cfg.dataset_config()), &device)
            .context("Cannot build validation loader")?;

        // ── Step 6: Model ─────────────────────────────────────────────────────
        let (model_cfg, model) = self.build_model(n_classes, tokenizer.get_vocab_size(true), train_cfg.seq_length, &device)?;
        for group in model.layer_groups() {
            tracing::debug!("layer group {:<10} {:>10} params", group.name, group.num_params);
        }

        // ── Step 7: Configs ───────────────────────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt.save_config(TRAIN_CONFIG_FILE, cfg)?;
        ckpt.save_config(MODEL_CONFIG_FILE, &model_cfg)?;

        // ── Step 8: Train ─────────────────────────────────────────────────────
        let metrics  = MetricsLogger::new(&cfg.checkpoint_dir, "accuracy")?;
        let settings = FitSettings { epochs: cfg.epochs, learning_rate: cfg.lr, grad_clip: None };
        fit_classifier(model, train_loader, valid_loader, &settings, &ckpt, &metrics)?;
        Ok(())
    }

    fn build_model(
        &self,
        n_classes:  usize,
        vocab_size: usize,
        seq_length: usize,
        device:     &burn::backend::wgpu::WgpuDevice,
    ) -> Result<(TransformerClassifierConfig, TransformerClassifier<TrainBackend>)> {
        let cfg = &self.config;

        let with_head = |encoder: TransformerEncoderConfig| {
            TransformerClassifierConfig::new(encoder, n_classes)
                .with_hidden(cfg.hidden.clone())
                .with_clf_pdrop(cfg.clf_pdrop)
                .with_concat_pool(cfg.concat_pool)
        };

        match &cfg.encoder_from {
            None => {
                let encoder = TransformerEncoderConfig::new(
                    vocab_size, seq_length, cfg.d_model, cfg.n_head, cfg.n_layer, PAD_ID as usize,
                );
                let model_cfg = with_head(encoder);
                let model     = model_cfg.init(device);
                Ok((model_cfg, model))
            }
            Some(dir) => {
                let lm_ckpt = CheckpointManager::new(dir)?;
                let lm_cfg: TransformerLanguageModelConfig = lm_ckpt.load_config(MODEL_CONFIG_FILE)?;
                if lm_cfg.encoder.n_ctx < seq_length {
                    bail!(
                        "Encoder from '{}' supports {} positions, but padded texts need {}; lower max_seq_len",
                        dir, lm_cfg.encoder.n_ctx, seq_length
                    );
                }
                let lm = lm_ckpt.load_model(lm_cfg.init::<TrainBackend>(device), device)?;
                tracing::info!("Fine-tuning encoder from '{}'", dir);

                let model_cfg = with_head(lm_cfg.encoder.clone());
                let model = TransformerClassifier {
                    encoder: lm.encoder,
                    head:    model_cfg.head_config().init(device),
                };
                Ok((model_cfg, model))
            }
        }
    }
}
