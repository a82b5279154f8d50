// ============================================================
// Layer 5 — Transformer Language Model
// ============================================================
// Encoder + tied decoder + flattened predictions.
//
//   input [b, s]
//       │  TransformerEncoder (causal)
//       ▼
//   hidden [b, s, d]
//       │  keep the last t = min(target_length, s) positions
//       ▼
//   [b * t, d]
//       │  TiedDecoder: x · Eᵀ  (E = token embedding, [vocab, d])
//       ▼
//   logits [b * t, vocab]
//
// Row i * t + j of the logits predicts the token after position
// s - t + j of stream i, which is exactly the row-major order of
// LmBatch::target from a batch-first loader.
//
// The decoder owns no weights. It reads the embedding matrix at
// forward time, so there is a single copy of the parameters and
// gradients from both ends accumulate into it.
//
// Reference: Press & Wolf (2017) Using the Output Embedding to
//            Improve Language Models

use burn::{
    nn::loss::CrossEntropyLossConfig,
    prelude::*,
};

use crate::data::lm_data::LanguageModelData;
use crate::ml::encoder::{LayerGroup, TokenEmbedding, TransformerEncoder, TransformerEncoderConfig};

#[derive(Config, Debug)]
pub struct TransformerLanguageModelConfig {
    pub encoder:       TransformerEncoderConfig,
    /// Positions per stream that receive a loss
    pub target_length: usize,
}

impl TransformerLanguageModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TransformerLanguageModel<B> {
        TransformerLanguageModel {
            encoder:       self.encoder.init(device),
            decoder:       TiedDecoder { vocab_size: self.encoder.vocab_size },
            target_length: self.target_length,
        }
    }
}

impl<B: Backend> LanguageModelData<B> {
    /// Model settings matching these loaders: vocabulary, pad index,
    /// widest window as `n_ctx` and the loaders' target length.
    pub fn transformer_config(&self, d_model: usize, n_head: usize, n_layer: usize) -> TransformerLanguageModelConfig {
        let encoder = TransformerEncoderConfig::new(
            self.vocab_size,
            self.max_seq_len(),
            d_model,
            n_head,
            n_layer,
            self.pad_idx as usize,
        )
        .with_causal(true);
        TransformerLanguageModelConfig::new(encoder, self.target_length())
    }
}

// ─── TiedDecoder ──────────────────────────────────────────────────────────────
#[derive(Module, Clone, Debug)]
pub struct TiedDecoder {
    pub vocab_size: usize,
}

impl TiedDecoder {
    /// `[n, d]` → `[n, vocab]` using the embedding's token matrix.
    pub fn forward<B: Backend>(&self, x: Tensor<B, 2>, embed: &TokenEmbedding<B>) -> Tensor<B, 2> {
        let weight = embed.token_weight();
        debug_assert_eq!(weight.dims()[0], self.vocab_size);
        x.matmul(weight.transpose())
    }
}

// ─── TransformerLanguageModel ─────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct TransformerLanguageModel<B: Backend> {
    pub encoder:       TransformerEncoder<B>,
    pub decoder:       TiedDecoder,
    pub target_length: usize,
}

impl<B: Backend> TransformerLanguageModel<B> {
    /// input `[b, s]` → logits `[b * min(target_length, s), vocab]`
    pub fn forward(&self, input: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let hidden = self.encoder.forward(input);
        let [batch_size, seq_len, d_model] = hidden.dims();
        let t = self.target_length.min(seq_len);

        let tail = hidden
            .slice([0..batch_size, seq_len - t..seq_len, 0..d_model])
            .reshape([batch_size * t, d_model]);
        self.decoder.forward(tail, &self.encoder.embed)
    }

    /// Mean next-token cross-entropy against a flattened target.
    pub fn forward_loss(&self, input: Tensor<B, 2, Int>, target: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let logits = self.forward(input);
        CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits, target)
    }

    /// `[embed, block_0, .., decoder]`
    pub fn layer_groups(&self) -> Vec<LayerGroup> {
        let mut groups = self.encoder.layer_groups();
        groups.push(LayerGroup::new(
            "decoder",
            <TiedDecoder as Module<B>>::num_params(&self.decoder),
        ));
        groups
    }
}
