// ============================================================
// Layer 5 — Transformer Classifier
// ============================================================
// Encoder + a small stack of LinearBlocks on top.
//
// Two ways to summarise the sequence before the head:
//
//   concat_pool = true        x = [h_last, max_t h_t, mean_t h_t]   (3d)
//                              norm on every block except the last
//   concat_pool = false (MLP) x = h_last                            (d)
//                              norm on every block
//
// Between blocks: ReLU. The last block's raw output is returned,
// so the head emits logits, not probabilities.
//
// With pre-padded batches the real tokens end at the last
// position, so h_last always belongs to the text itself.
//
// Reference: Howard & Ruder (2018) ULMFiT, concat pooling
//            He et al. (2015) Kaiming initialisation

use burn::{
    module::Param,
    nn::{
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Initializer,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::ml::encoder::{LayerGroup, TransformerEncoder, TransformerEncoderConfig};

// ─── LinearBlock ──────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct LinearBlockConfig {
    pub d_input:  usize,
    pub d_output: usize,
    #[config(default = 0.1)]
    pub dropout:  f64,
    #[config(default = true)]
    pub norm:     bool,
}

impl LinearBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LinearBlock<B> {
        let mut linear = LinearConfig::new(self.d_input, self.d_output)
            .with_initializer(Initializer::KaimingNormal {
                gain:          2.0_f64.sqrt(),
                fan_out_only:  false,
            })
            .init(device);
        linear.bias = Some(Param::from_tensor(Tensor::zeros([self.d_output], device)));

        LinearBlock {
            norm:    self.norm.then(|| LayerNormConfig::new(self.d_input).init(device)),
            dropout: DropoutConfig::new(self.dropout).init(),
            linear,
        }
    }
}

/// LayerNorm (optional) → Dropout → Linear
#[derive(Module, Debug)]
pub struct LinearBlock<B: Backend> {
    pub norm:    Option<LayerNorm<B>>,
    pub dropout: Dropout,
    pub linear:  Linear<B>,
}

impl<B: Backend> LinearBlock<B> {
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = match &self.norm {
            Some(norm) => norm.forward(x),
            None       => x,
        };
        self.linear.forward(self.dropout.forward(x))
    }
}

// ─── ClassifierHead ───────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct ClassifierHeadConfig {
    /// Widths from input to logits, e.g. `[3 * d, 50, n_classes]`
    pub layers:      Vec<usize>,
    #[config(default = 0.1)]
    pub dropout:     f64,
    #[config(default = false)]
    pub concat_pool: bool,
    /// Hidden states arrive as `[b, s, d]` (else `[s, b, d]`)
    #[config(default = true)]
    pub batch_first: bool,
}

impl ClassifierHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ClassifierHead<B> {
        let n_blocks = self.layers.len().saturating_sub(1);
        let layers = (0..n_blocks)
            .map(|i| {
                let is_last = i + 1 == n_blocks;
                LinearBlockConfig::new(self.layers[i], self.layers[i + 1])
                    .with_dropout(self.dropout)
                    .with_norm(!(self.concat_pool && is_last))
                    .init(device)
            })
            .collect();
        ClassifierHead {
            layers,
            concat_pool: self.concat_pool,
            batch_first: self.batch_first,
        }
    }
}

#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    pub layers:      Vec<LinearBlock<B>>,
    pub concat_pool: bool,
    pub batch_first: bool,
}

impl<B: Backend> ClassifierHead<B> {
    /// hidden states → logits `[b, n_classes]`
    pub fn forward(&self, hidden: Tensor<B, 3>) -> Tensor<B, 2> {
        let hidden = if self.batch_first { hidden } else { hidden.swap_dims(0, 1) };
        let [batch_size, seq_len, d_model] = hidden.dims();

        let last = hidden
            .clone()
            .slice([0..batch_size, seq_len - 1..seq_len, 0..d_model])
            .reshape([batch_size, d_model]);

        let mut x = if self.concat_pool {
            let max  = hidden.clone().max_dim(1).reshape([batch_size, d_model]);
            let mean = hidden.mean_dim(1).reshape([batch_size, d_model]);
            Tensor::cat(vec![last, max, mean], 1)
        } else {
            last
        };

        let n = self.layers.len();
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(x);
            if i + 1 < n {
                x = relu(x);
            }
        }
        x
    }
}

// ─── TransformerClassifier ────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct TransformerClassifierConfig {
    pub encoder:     TransformerEncoderConfig,
    pub n_classes:   usize,
    /// Hidden widths between the pooled features and the logits
    #[config(default = "Vec::new()")]
    pub hidden:      Vec<usize>,
    #[config(default = 0.1)]
    pub clf_pdrop:   f64,
    #[config(default = false)]
    pub concat_pool: bool,
}

impl TransformerClassifierConfig {
    pub fn head_config(&self) -> ClassifierHeadConfig {
        let d_in = if self.concat_pool { 3 * self.encoder.d_model } else { self.encoder.d_model };
        let mut layers = Vec::with_capacity(self.hidden.len() + 2);
        layers.push(d_in);
        layers.extend_from_slice(&self.hidden);
        layers.push(self.n_classes);

        ClassifierHeadConfig::new(layers)
            .with_dropout(self.clf_pdrop)
            .with_concat_pool(self.concat_pool)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> TransformerClassifier<B> {
        TransformerClassifier {
            encoder: self.encoder.init(device),
            head:    self.head_config().init(device),
        }
    }
}

pub struct ClassificationOutput<B: Backend> {
    pub loss:   Tensor<B, 1>,
    pub logits: Tensor<B, 2>,
}

#[derive(Module, Debug)]
pub struct TransformerClassifier<B: Backend> {
    pub encoder: TransformerEncoder<B>,
    pub head:    ClassifierHead<B>,
}

impl<B: Backend> TransformerClassifier<B> {
    /// inputs `[b, s]` → logits `[b, n_classes]`
    pub fn forward(&self, inputs: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        self.head.forward(self.encoder.forward(inputs))
    }

    pub fn forward_classification(
        &self,
        inputs:  Tensor<B, 2, Int>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let logits = self.forward(inputs);
        let loss   = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), targets);
        ClassificationOutput { loss, logits }
    }

    /// `[embed, block_0, .., head]`
    pub fn layer_groups(&self) -> Vec<LayerGroup> {
        let mut groups = self.encoder.layer_groups();
        groups.push(LayerGroup::new("head", self.head.num_params()));
        groups
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn encoder_cfg() -> TransformerEncoderConfig {
        TransformerEncoderConfig::new(30, 10, 8, 2, 1, 0)
    }

    #[test]
    fn test_linear_block_bias_starts_at_zero() {
        let device = Default::default();
        let block  = LinearBlockConfig::new(8, 4).init::<TestBackend>(&device);
        let bias   = block.linear.bias.as_ref().unwrap().val();
        assert_eq!(bias.into_data().to_vec::<f32>().unwrap(), vec![0.0; 4]);
        assert!(block.norm.is_some());
    }

    #[test]
    fn test_norm_placement() {
        let device = Default::default();
        let pooled = ClassifierHeadConfig::new(vec![24, 6, 3])
            .with_concat_pool(true)
            .init::<TestBackend>(&device);
        assert!(pooled.layers[0].norm.is_some());
        assert!(pooled.layers[1].norm.is_none());

        let mlp = ClassifierHeadConfig::new(vec![8, 6, 3]).init::<TestBackend>(&device);
        assert!(mlp.layers.iter().all(|l| l.norm.is_some()));
    }

    #[test]
    fn test_head_layouts_agree() {
        let device = Default::default();
        let head = ClassifierHeadConfig::new(vec![24, 5, 3])
            .with_concat_pool(true)
            .init::<TestBackend>(&device);
        let hidden = Tensor::<TestBackend, 3>::random([2, 7, 8], Distribution::Normal(0.0, 1.0), &device);

        let batch_first = head.forward(hidden.clone());
        assert_eq!(batch_first.dims(), [2, 3]);

        let mut seq_first_head = head.clone();
        seq_first_head.batch_first = false;
        let seq_first = seq_first_head.forward(hidden.swap_dims(0, 1));

        let a = batch_first.into_data().to_vec::<f32>().unwrap();
        let b = seq_first.into_data().to_vec::<f32>().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_classifier_forward_and_groups() {
        let device = Default::default();
        let cfg = TransformerClassifierConfig::new(encoder_cfg(), 4)
            .with_hidden(vec![6])
            .with_concat_pool(true);
        assert_eq!(cfg.head_config().layers, vec![24, 6, 4]);

        let model  = cfg.init::<TestBackend>(&device);
        let inputs = Tensor::<TestBackend, 2, Int>::from_data(
            TensorData::new(vec![0i64, 0, 3, 4, 5, 6, 7, 8, 9, 1], [2, 5]),
            &device,
        );
        let targets = Tensor::<TestBackend, 1, Int>::from_data(TensorData::new(vec![1i64, 3], [2]), &device);

        let out = model.forward_classification(inputs, targets);
        assert_eq!(out.logits.dims(), [2, 4]);
        let loss: f32 = out.loss.into_scalar();
        assert!(loss.is_finite());

        let groups = model.layer_groups();
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["embed", "block_0", "head"]);
        assert_eq!(groups.iter().map(|g| g.num_params).sum::<usize>(), model.num_params());
    }
}
