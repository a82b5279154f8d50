// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands:
//
//   train-lm   train a transformer language model on a text corpus
//   train-clf  train (or fine-tune) a classifier on labelled JSONL
//   batches    dry-run an LM loader and report what it yields
//
// Each Args struct converts into its application-layer config
// via From, so Layer 2 never sees clap types.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::{
    inspect_use_case::InspectConfig,
    train_clf_use_case::ClassifierTrainConfig,
    train_lm_use_case::LmTrainConfig,
};
use crate::data::lm_loader::LmLoaderConfig;
use crate::ml::encoder::Activation;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a transformer language model on .txt files
    TrainLm(TrainLmArgs),

    /// Train a transformer classifier on {"text", "label"} JSONL
    TrainClf(TrainClfArgs),

    /// Report the batches an LM loader would produce, without training
    Batches(BatchesArgs),
}

// ─── Shared loader flags ──────────────────────────────────────────────────────
#[derive(Args, Debug, Clone)]
pub struct LoaderArgs {
    /// Number of parallel streams per batch
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Base chunk length (backprop-through-time window)
    #[arg(long, default_value_t = 70)]
    pub bptt: usize,

    /// Positions per stream that get a loss; at most bptt
    #[arg(long)]
    pub target_length: Option<usize>,

    /// Read every stream right to left
    #[arg(long)]
    pub backwards: bool,

    /// Use a fixed chunk length instead of sampling one per batch
    #[arg(long)]
    pub fixed_bptt: bool,

    /// Draw each batch at a random offset instead of streaming in order
    #[arg(long)]
    pub shuffle: bool,

    /// Seed for chunk lengths and offsets
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl LoaderArgs {
    fn target_length(&self) -> usize {
        self.target_length.unwrap_or(self.bptt)
    }
}

// ─── train-lm ─────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainLmArgs {
    /// A .txt file or a directory of .txt files
    #[arg(long, default_value = "data/corpus")]
    pub corpus: String,

    /// Directory for checkpoints, tokenizer and metrics
    #[arg(long, default_value = "checkpoints/lm")]
    pub checkpoint_dir: String,

    /// Maximum vocabulary size including special tokens
    #[arg(long, default_value_t = 30000)]
    pub vocab_size: usize,

    /// Fraction of the token stream held out (taken from the end)
    #[arg(long, default_value_t = 0.1)]
    pub valid_fraction: f64,

    #[command(flatten)]
    pub loader: LoaderArgs,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    #[arg(long, default_value_t = 2.5e-4)]
    pub lr: f64,

    /// Clip the gradient norm; 0 disables clipping
    #[arg(long, default_value_t = 0.25)]
    pub grad_clip: f32,

    /// Hidden size of the transformer
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    /// Attention heads; d_model must be divisible by n_head
    #[arg(long, default_value_t = 8)]
    pub n_head: usize,

    #[arg(long, default_value_t = 6)]
    pub n_layer: usize,

    /// Dropout on embeddings, attention weights and residual branches
    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Feed-forward activation: gelu, relu or swish
    #[arg(long, default_value = "gelu")]
    pub activation: Activation,
}

impl From<TrainLmArgs> for LmTrainConfig {
    fn from(a: TrainLmArgs) -> Self {
        LmTrainConfig {
            corpus:         a.corpus,
            checkpoint_dir: a.checkpoint_dir,
            vocab_size:     a.vocab_size,
            valid_fraction: a.valid_fraction,
            batch_size:     a.loader.batch_size,
            bptt:           a.loader.bptt,
            target_length:  a.loader.target_length(),
            backwards:      a.loader.backwards,
            randomize_bptt: !a.loader.fixed_bptt,
            shuffle:        a.loader.shuffle,
            seed:           a.loader.seed,
            epochs:         a.epochs,
            lr:             a.lr,
            grad_clip:      (a.grad_clip > 0.0).then_some(a.grad_clip),
            d_model:        a.d_model,
            n_head:         a.n_head,
            n_layer:        a.n_layer,
            embd_pdrop:     a.dropout,
            attn_pdrop:     a.dropout,
            resid_pdrop:    a.dropout,
            activation:     a.activation,
        }
    }
}

// ─── train-clf ────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainClfArgs {
    /// JSONL file with one {"text", "label"} object per line
    #[arg(long, default_value = "data/labelled.jsonl")]
    pub data: String,

    #[arg(long, default_value = "checkpoints/clf")]
    pub checkpoint_dir: String,

    /// Fine-tune the encoder of the LM saved in this directory
    #[arg(long)]
    pub encoder_from: Option<String>,

    #[arg(long, default_value_t = 30000)]
    pub vocab_size: usize,

    #[arg(long, default_value_t = 0.2)]
    pub valid_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Texts are cut to this many tokens before sentinels are added
    #[arg(long, default_value_t = 254)]
    pub max_seq_len: usize,

    /// Keep the start of long texts instead of the end
    #[arg(long)]
    pub cut_tail: bool,

    #[arg(long)]
    pub backwards: bool,

    /// Do not wrap texts in [BOS] ... [EOS]
    #[arg(long)]
    pub no_sentinels: bool,

    /// Pad after the text instead of before it
    #[arg(long)]
    pub post_pad: bool,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    #[arg(long, default_value_t = 5)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    #[arg(long, default_value_t = 8)]
    pub n_head: usize,

    #[arg(long, default_value_t = 6)]
    pub n_layer: usize,

    /// Hidden widths of the head, comma separated
    #[arg(long, value_delimiter = ',', default_value = "50")]
    pub hidden: Vec<usize>,

    /// Classify from the last hidden state only (MLP head)
    #[arg(long)]
    pub no_concat_pool: bool,

    #[arg(long, default_value_t = 0.1)]
    pub clf_dropout: f64,
}

impl From<TrainClfArgs> for ClassifierTrainConfig {
    fn from(a: TrainClfArgs) -> Self {
        ClassifierTrainConfig {
            data:           a.data,
            checkpoint_dir: a.checkpoint_dir,
            encoder_from:   a.encoder_from,
            vocab_size:     a.vocab_size,
            valid_fraction: a.valid_fraction,
            seed:           a.seed,
            max_seq_len:    a.max_seq_len,
            cut_tail:       a.cut_tail,
            backwards:      a.backwards,
            add_sentinels:  !a.no_sentinels,
            pre_pad:        !a.post_pad,
            batch_size:     a.batch_size,
            num_workers:    a.num_workers,
            epochs:         a.epochs,
            lr:             a.lr,
            d_model:        a.d_model,
            n_head:         a.n_head,
            n_layer:        a.n_layer,
            hidden:         a.hidden,
            concat_pool:    !a.no_concat_pool,
            clf_pdrop:      a.clf_dropout,
        }
    }
}

// ─── batches ──────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct BatchesArgs {
    #[arg(long, default_value = "data/corpus")]
    pub corpus: String,

    /// Where the tokenizer is loaded from, or built into
    #[arg(long, default_value = "checkpoints/lm")]
    pub tokenizer_dir: String,

    #[arg(long, default_value_t = 30000)]
    pub vocab_size: usize,

    #[command(flatten)]
    pub loader: LoaderArgs,

    /// Passes to run over the loader
    #[arg(long, default_value_t = 1)]
    pub passes: usize,
}

impl From<BatchesArgs> for InspectConfig {
    fn from(a: BatchesArgs) -> Self {
        let loader = LmLoaderConfig::new(a.loader.batch_size, a.loader.bptt, a.loader.target_length())
            .with_batch_first(true)
            .with_backwards(a.loader.backwards)
            .with_randomize_bptt(!a.loader.fixed_bptt);
        InspectConfig {
            corpus:        a.corpus,
            tokenizer_dir: a.tokenizer_dir,
            vocab_size:    a.vocab_size,
            loader,
            shuffle:       a.loader.shuffle,
            seed:          a.loader.seed,
            passes:        a.passes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_lm_flags() {
        let cli = Cli::try_parse_from([
            "transformer-text", "train-lm", "--bptt", "40", "--fixed-bptt", "--grad-clip", "0",
            "--activation", "relu",
        ])
        .unwrap();
        let Commands::TrainLm(args) = cli.command else { panic!("wrong subcommand") };
        let cfg: LmTrainConfig = args.into();
        assert_eq!(cfg.bptt, 40);
        assert_eq!(cfg.target_length, 40);
        assert!(!cfg.randomize_bptt);
        assert_eq!(cfg.grad_clip, None);
        assert_eq!(cfg.activation, Activation::Relu);
    }

    #[test]
    fn test_train_clf_hidden_list() {
        let cli = Cli::try_parse_from([
            "transformer-text", "train-clf", "--hidden", "64,32", "--no-concat-pool", "--post-pad",
        ])
        .unwrap();
        let Commands::TrainClf(args) = cli.command else { panic!("wrong subcommand") };
        let cfg: ClassifierTrainConfig = args.into();
        assert_eq!(cfg.hidden, vec![64, 32]);
        assert!(!cfg.concat_pool);
        assert!(!cfg.pre_pad);
        assert!(cfg.add_sentinels);
    }

    #[test]
    fn test_batches_target_length() {
        let cli = Cli::try_parse_from([
            "transformer-text", "batches", "--bptt", "20", "--target-length", "5", "--shuffle",
        ])
        .unwrap();
        let Commands::Batches(args) = cli.command else { panic!("wrong subcommand") };
        let cfg: InspectConfig = args.into();
        assert_eq!(cfg.loader.target_length, 5);
        assert!(cfg.loader.randomize_bptt);
        assert!(cfg.shuffle);
    }
}
