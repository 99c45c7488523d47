//! # Parameter Initialization
//!
//! Every learnable layer of the classifier is created through [`ParamInit`], which
//! picks the initializer from the closed set of layer kinds the model uses
//! instead of inspecting layer types after construction.

use burn::{
    nn::{
        Embedding, EmbeddingConfig, Initializer, LayerNorm, LayerNormConfig, Linear,
        LinearConfig,
    },
    prelude::*,
};

/// The kinds of parameterized layers in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Projections inside embeddings, attention and feed-forward blocks.
    Linear,
    /// The final classification head.
    Classifier,
    /// Layer normalization scale.
    Norm,
    /// Learned lookup tables such as the relative position bias.
    Embedding,
}

/// Initialization strategy shared by all layers of a model.
#[derive(Config, Debug)]
pub struct ParamInit {
    /// Standard deviation of linear weights.
    #[config(default = "0.02")]
    pub linear_std: f64,
    /// Standard deviation of the classifier weights.
    #[config(default = "0.01")]
    pub classifier_std: f64,
}

impl ParamInit {
    /// The weight initializer for a layer kind.
    pub fn initializer(&self, kind: LayerKind) -> Initializer {
        match kind {
            LayerKind::Linear => Initializer::Normal {
                mean: 0.0,
                std: self.linear_std,
            },
            LayerKind::Classifier => Initializer::Normal {
                mean: 0.0,
                std: self.classifier_std,
            },
            LayerKind::Norm => Initializer::Ones,
            LayerKind::Embedding => Initializer::Zeros,
        }
    }

    /// Linear projection with a normal weight and a zero bias.
    pub fn linear<B: Backend>(
        &self,
        d_input: usize,
        d_output: usize,
        bias: bool,
        device: &B::Device,
    ) -> Linear<B> {
        self.linear_of_kind(LayerKind::Linear, d_input, d_output, bias, device)
    }

    /// Classification head.
    pub fn classifier<B: Backend>(
        &self,
        d_input: usize,
        n_class: usize,
        device: &B::Device,
    ) -> Linear<B> {
        self.linear_of_kind(LayerKind::Classifier, d_input, n_class, true, device)
    }

    /// Layer normalization with unit scale and zero shift.
    pub fn layer_norm<B: Backend>(
        &self,
        d_model: usize,
        epsilon: f64,
        device: &B::Device,
    ) -> LayerNorm<B> {
        let mut norm = LayerNormConfig::new(d_model)
            .with_epsilon(epsilon)
            .init(device);
        norm.gamma = self.initializer(LayerKind::Norm).init([d_model], device);
        norm.beta = Initializer::Zeros.init([d_model], device);

        norm
    }

    /// Embedding table.
    pub fn embedding<B: Backend>(
        &self,
        n_embedding: usize,
        d_model: usize,
        device: &B::Device,
    ) -> Embedding<B> {
        EmbeddingConfig::new(n_embedding, d_model)
            .with_initializer(self.initializer(LayerKind::Embedding))
            .init(device)
    }

    fn linear_of_kind<B: Backend>(
        &self,
        kind: LayerKind,
        d_input: usize,
        d_output: usize,
        bias: bool,
        device: &B::Device,
    ) -> Linear<B> {
        let mut linear = LinearConfig::new(d_input, d_output)
            .with_bias(bias)
            .with_initializer(self.initializer(kind))
            .init(device);
        linear.bias = linear
            .bias
            .map(|_| Initializer::Zeros.init([d_output], device));

        linear
    }
}
