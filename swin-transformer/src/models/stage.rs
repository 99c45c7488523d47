use burn::prelude::*;

use super::{
    patch_embedding::{PatchEmbedding, PatchEmbeddingConfig},
    transformer_layer::{TransformerLayer, TransformerLayerConfig},
};
use crate::{error::SwinResult, init::ParamInit};

/// A layer of a stage.
///
/// A stage is an ordered list of these, applied one after the other on a
/// `[batch, height, width, channels]` feature map.
#[derive(Module, Debug)]
pub enum StageLayer<B: Backend> {
    PatchEmbedding(PatchEmbedding<B>),
    Transformer(TransformerLayer<B>),
}

impl<B: Backend> StageLayer<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> SwinResult<Tensor<B, 4>> {
        match self {
            Self::PatchEmbedding(embedding) => embedding.forward(x),
            Self::Transformer(layer) => layer.forward(x),
        }
    }
}

/// Configuration for one stage of the hierarchy.
///
/// # Stage Structure
/// A patch embedding with patch size `reduction` followed by `depth` transformer
/// layers. Layers alternate between regular and shifted windows, starting with
/// regular windows:
/// - Layer 0, 2, 4, ...: Window attention
/// - Layer 1, 3, 5, ...: Shifted window attention
///
/// # Arguments
/// - `depth`: Number of transformer layers
/// - `in_dim`: Channels entering the stage
/// - `dim`: Channels inside the stage
/// - `n_head`: Number of attention heads
/// - `dim_head`: Dimension of every head
/// - `dim_ff`: Hidden width of the feed-forward blocks
/// - `window_size`: Attention window side (default: 7)
/// - `reduction`: Patch size of the embedding (4 for raw pixels, 2 for downsampling)
/// - `drop_ff`: Dropout after the feed-forward blocks
/// - `drop_attn`: Dropout on attention weights
/// - `drop_path`: Stochastic depth rate of every layer
#[derive(Config, Debug)]
pub struct StageConfig {
    depth: usize,
    in_dim: usize,
    dim: usize,
    n_head: usize,
    dim_head: usize,
    dim_ff: usize,
    #[config(default = "7")]
    window_size: usize,
    #[config(default = "2")]
    reduction: usize,
    #[config(default = "0.0")]
    drop_ff: f64,
    #[config(default = "0.0")]
    drop_attn: f64,
    #[config(default = "0.0")]
    drop_path: f64,
    #[config(default = "ParamInit::new()")]
    param_init: ParamInit,
}

impl StageConfig {
    /// Builds the stage.
    ///
    /// # Errors
    /// Propagates configuration errors from the patch embedding and the layers.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SwinResult<Stage<B>> {
        let embedding = PatchEmbeddingConfig::new(self.in_dim, self.dim)
            .with_patch_size(self.reduction)
            .with_param_init(self.param_init.clone())
            .init(device)?;

        let mut layers = Vec::with_capacity(self.depth + 1);
        layers.push(StageLayer::PatchEmbedding(embedding));
        for i in 0..self.depth {
            let layer = TransformerLayerConfig::new(
                self.dim,
                self.n_head,
                self.dim_head,
                self.dim_ff,
            )
            .with_window_size(self.window_size)
            .with_shift(i % 2 == 1)
            .with_drop_ff(self.drop_ff)
            .with_drop_attn(self.drop_attn)
            .with_drop_path(self.drop_path)
            .with_param_init(self.param_init.clone())
            .init(device)?;
            layers.push(StageLayer::Transformer(layer));
        }

        tracing::debug!(
            depth = self.depth,
            in_dim = self.in_dim,
            dim = self.dim,
            reduction = self.reduction,
            "stage initialized"
        );

        Ok(Stage { layers })
    }
}

/// One stage of the hierarchy: downsampling embedding, then transformer layers.
#[derive(Module, Debug)]
pub struct Stage<B: Backend> {
    layers: Vec<StageLayer<B>>,
}

impl<B: Backend> Stage<B> {
    /// Number of transformer layers in the stage.
    pub fn depth(&self) -> usize {
        self.transformer_layers().count()
    }

    /// The transformer layers of the stage, in order.
    pub fn transformer_layers(&self) -> impl Iterator<Item = &TransformerLayer<B>> {
        self.layers.iter().filter_map(|layer| match layer {
            StageLayer::Transformer(layer) => Some(layer),
            StageLayer::PatchEmbedding(_) => None,
        })
    }

    /// Assigns stochastic depth rates to the transformer layers in order.
    ///
    /// Layers beyond the end of `rates` keep their current rate.
    pub fn set_drop_path(&mut self, rates: &[f64]) {
        let layers = self.layers.iter_mut().filter_map(|layer| match layer {
            StageLayer::Transformer(layer) => Some(layer),
            StageLayer::PatchEmbedding(_) => None,
        });
        for (layer, &rate) in layers.zip(rates) {
            layer.set_drop_path(rate);
        }
    }

    /// Forward pass through the stage.
    ///
    /// # Arguments
    /// - `x`: Input tensor of shape `[batch_size, height, width, in_dim]`
    ///
    /// # Returns
    /// Output tensor of shape `[batch_size, height / reduction, width / reduction, dim]`
    pub fn forward(&self, x: Tensor<B, 4>) -> SwinResult<Tensor<B, 4>> {
        self.layers
            .iter()
            .try_fold(x, |x, layer| layer.forward(x))
    }
}
