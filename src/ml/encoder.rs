// ============================================================
// Layer 5 — Transformer Encoder
// ============================================================
// Token + position embeddings followed by a stack of post-LN
// blocks. Shared by the language model and the classifier.
//
//   input_ids [b, s]
//       │  TokenEmbedding: tokens(ids) + positions(0..s), dropout
//       ▼
//   x [b, s, d]
//       │  EncoderBlock × n_layer
//       │    x = LN(x + drop(MHA(x, pad mask, causal mask)))
//       │    x = LN(x + drop(FFN(x)))          FFN = d → 4d → d
//       ▼
//   hidden [b, s, d]
//
// Pad positions are excluded as attention keys. With `causal`
// set, position t only attends to positions ≤ t, which is what
// makes next-token prediction over a whole window legitimate.
//
// Reference: Radford et al. (2018) Improving Language Understanding
//            by Generative Pre-Training
//            Vaswani et al. (2017) Attention Is All You Need

use burn::{
    module::Ignored,
    nn::{
        attention::{generate_autoregressive_mask, MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation,
};
use serde::{Deserialize, Serialize};

// ─── Activation ───────────────────────────────────────────────────────────────
/// Non-linearity inside the feed-forward sublayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Gelu,
    Relu,
    Swish,
}

impl Activation {
    pub fn apply<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Activation::Gelu  => activation::gelu(x),
            Activation::Relu  => activation::relu(x),
            Activation::Swish => activation::silu(x),
        }
    }
}

impl std::str::FromStr for Activation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gelu"          => Ok(Activation::Gelu),
            "relu"          => Ok(Activation::Relu),
            "swish" | "silu" => Ok(Activation::Swish),
            other           => Err(format!("unknown activation '{other}'")),
        }
    }
}

// ─── LayerGroup ───────────────────────────────────────────────────────────────
/// A named slice of a model, for per-group learning rates or freezing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerGroup {
    pub name:       String,
    pub num_params: usize,
}

impl LayerGroup {
    pub fn new(name: impl Into<String>, num_params: usize) -> Self {
        Self { name: name.into(), num_params }
    }
}

// ─── Config ───────────────────────────────────────────────────────────────────
// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct TransformerEncoderConfig {
    pub vocab_size: usize,
    /// Maximum sequence length (number of position embeddings)
    pub n_ctx:      usize,
    pub d_model:    usize,
    pub n_head:     usize,
    pub n_layer:    usize,
    pub pad_token:  usize,
    #[config(default = 0.1)]
    pub embd_pdrop:  f64,
    #[config(default = 0.1)]
    pub attn_pdrop:  f64,
    #[config(default = 0.1)]
    pub resid_pdrop: f64,
    #[config(default = "Activation::Gelu")]
    pub activation:  Activation,
    #[config(default = true)]
    pub causal:      bool,
}

impl TransformerEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TransformerEncoder<B> {
        let embed = TokenEmbedding {
            tokens:    EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            positions: EmbeddingConfig::new(self.n_ctx, self.d_model).init(device),
            dropout:   DropoutConfig::new(self.embd_pdrop).init(),
        };
        let blocks: Vec<EncoderBlock<B>> = (0..self.n_layer)
            .map(|_| self.build_block(device))
            .collect();
        TransformerEncoder {
            embed,
            blocks,
            pad_token: self.pad_token,
            n_ctx:     self.n_ctx,
            causal:    self.causal,
        }
    }

    fn build_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn = MultiHeadAttentionConfig::new(self.d_model, self.n_head)
            .with_dropout(self.attn_pdrop)
            .init(device);
        let d_ff = 4 * self.d_model;
        EncoderBlock {
            self_attn,
            ffn_in:     LinearConfig::new(self.d_model, d_ff).init(device),
            ffn_out:    LinearConfig::new(d_ff, self.d_model).init(device),
            norm1:      LayerNormConfig::new(self.d_model).init(device),
            norm2:      LayerNormConfig::new(self.d_model).init(device),
            dropout:    DropoutConfig::new(self.resid_pdrop).init(),
            activation: Ignored(self.activation),
        }
    }
}

// ─── TokenEmbedding ───────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct TokenEmbedding<B: Backend> {
    pub tokens:    Embedding<B>,
    pub positions: Embedding<B>,
    pub dropout:   Dropout,
}

impl<B: Backend> TokenEmbedding<B> {
    /// `[b, s]` ids → `[b, s, d]`
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let tok = self.tokens.forward(input_ids);
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos = self.positions.forward(positions);
        self.dropout.forward(tok + pos)
    }

    /// The `[vocab, d]` token matrix, shared with tied decoders.
    pub fn token_weight(&self) -> Tensor<B, 2> {
        self.tokens.weight.val()
    }
}

// ─── EncoderBlock ─────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:  MultiHeadAttention<B>,
    pub ffn_in:     Linear<B>,
    pub ffn_out:    Linear<B>,
    pub norm1:      LayerNorm<B>,
    pub norm2:      LayerNorm<B>,
    pub dropout:    Dropout,
    pub activation: Ignored<Activation>,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(
        &self,
        x:         Tensor<B, 3>,
        mask_pad:  Tensor<B, 2, Bool>,
        mask_attn: Option<Tensor<B, 3, Bool>>,
    ) -> Tensor<B, 3> {
        let mut input = MhaInput::self_attn(x.clone()).mask_pad(mask_pad);
        if let Some(mask) = mask_attn {
            input = input.mask_attn(mask);
        }
        let attn = self.self_attn.forward(input).context;
        let x    = self.norm1.forward(x + self.dropout.forward(attn));

        let ffn = self.ffn_out.forward(self.activation.apply(self.ffn_in.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(ffn))
    }
}

// ─── TransformerEncoder ───────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct TransformerEncoder<B: Backend> {
    pub embed:     TokenEmbedding<B>,
    pub blocks:    Vec<EncoderBlock<B>>,
    pub pad_token: usize,
    pub n_ctx:     usize,
    pub causal:    bool,
}

impl<B: Backend> TransformerEncoder<B> {
    /// input_ids `[b, s]` → hidden states `[b, s, d]`, with `s <= n_ctx`.
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        debug_assert!(seq_len <= self.n_ctx, "sequence longer than n_ctx");

        let mask_pad  = input_ids.clone().equal_elem(self.pad_token as i64);
        let mask_attn = self
            .causal
            .then(|| generate_autoregressive_mask::<B>(batch_size, seq_len, &input_ids.device()));

        let mut x = self.embed.forward(input_ids);
        for block in &self.blocks {
            x = block.forward(x, mask_pad.clone(), mask_attn.clone());
        }
        x
    }

    /// `[embed, block_0, .., block_{n-1}]`
    pub fn layer_groups(&self) -> Vec<LayerGroup> {
        let mut groups = vec![LayerGroup::new("embed", self.embed.num_params())];
        groups.extend(
            self.blocks
                .iter()
                .enumerate()
                .map(|(i, b)| LayerGroup::new(format!("block_{i}"), b.num_params())),
        );
        groups
    }
}
