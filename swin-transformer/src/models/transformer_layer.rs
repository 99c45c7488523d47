use burn::{nn::LayerNorm, prelude::*};
use burn_extra_ops::{DropPath, DropPathConfig};

use super::{
    feed_forward::{FeedForward, FeedForwardConfig},
    window_attention::{WindowAttention, WindowAttentionConfig},
};
use crate::{error::SwinResult, init::ParamInit};

/// Epsilon of the layer norms in front of attention and feed-forward.
const LAYER_NORM_EPS: f64 = 1e-6;

/// Configuration for a pre-norm transformer layer with windowed attention.
///
/// # Architecture
/// ```text
/// x   = x + DropPath(WindowAttention(LayerNorm(x)))
/// out = x + DropPath(FeedForward(LayerNorm(x)))
/// ```
///
/// # Arguments
/// - `dim`: Channels of the feature map
/// - `n_head`: Number of attention heads
/// - `dim_head`: Dimension of every head
/// - `dim_ff`: Hidden width of the feed-forward block
/// - `window_size`: Attention window side (default: 7)
/// - `shift`: Whether attention uses shifted windows (default: false)
/// - `drop_ff`: Dropout after the feed-forward block
/// - `drop_attn`: Dropout on attention weights
/// - `drop_path`: Stochastic depth rate of both residual branches
#[derive(Config, Debug)]
pub struct TransformerLayerConfig {
    dim: usize,
    n_head: usize,
    dim_head: usize,
    dim_ff: usize,
    #[config(default = "7")]
    window_size: usize,
    #[config(default = "false")]
    shift: bool,
    #[config(default = "0.0")]
    drop_ff: f64,
    #[config(default = "0.0")]
    drop_attn: f64,
    #[config(default = "0.0")]
    drop_path: f64,
    #[config(default = "ParamInit::new()")]
    param_init: ParamInit,
}

impl TransformerLayerConfig {
    /// Builds the layer.
    ///
    /// # Errors
    /// Propagates configuration errors from the attention block.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SwinResult<TransformerLayer<B>> {
        let attn = WindowAttentionConfig::new(self.dim, self.n_head, self.dim_head)
            .with_window_size(self.window_size)
            .with_shift(self.shift)
            .with_dropout(self.drop_attn)
            .with_param_init(self.param_init.clone())
            .init(device)?;
        let ff = FeedForwardConfig::new(self.dim, self.dim_ff)
            .with_dropout(self.drop_ff)
            .with_param_init(self.param_init.clone())
            .init(device);

        Ok(TransformerLayer {
            norm_attn: self.param_init.layer_norm(self.dim, LAYER_NORM_EPS, device),
            attn,
            norm_ff: self.param_init.layer_norm(self.dim, LAYER_NORM_EPS, device),
            ff,
            drop_path: DropPathConfig::new()
                .with_drop_prob(self.drop_path)
                .init(),
        })
    }
}

/// Transformer layer of a stage.
///
/// # Components
/// - `norm_attn`: Layer normalization before attention
/// - `attn`: Window-based (optionally shifted) multi-head self-attention
/// - `norm_ff`: Layer normalization before the feed-forward block
/// - `ff`: Position-wise feed-forward block
/// - `drop_path`: Stochastic depth shared by both residual branches
#[derive(Module, Debug)]
pub struct TransformerLayer<B: Backend> {
    norm_attn: LayerNorm<B>,
    attn: WindowAttention<B>,
    norm_ff: LayerNorm<B>,
    ff: FeedForward<B>,
    drop_path: DropPath<B>,
}

impl<B: Backend> TransformerLayer<B> {
    /// Sets the stochastic depth rate of both residual branches.
    pub fn set_drop_path(&mut self, drop_path: f64) {
        self.drop_path.set_drop_prob(drop_path);
    }

    pub const fn drop_path(&self) -> f64 {
        self.drop_path.drop_prob()
    }

    pub const fn is_shifted(&self) -> bool {
        self.attn.is_shifted()
    }

    /// Forward pass through the layer.
    ///
    /// # Arguments
    /// - `x`: Input tensor of shape `[batch_size, height, width, dim]`
    ///
    /// # Returns
    /// Output tensor of the same shape.
    ///
    /// # Errors
    /// Propagates shape errors from the attention block.
    pub fn forward(&self, x: Tensor<B, 4>) -> SwinResult<Tensor<B, 4>> {
        let attn = self.attn.forward(self.norm_attn.forward(x.clone()))?;
        let x = x + self.drop_path.forward(attn);

        let ff = self.ff.forward(self.norm_ff.forward(x.clone()));

        Ok(x + self.drop_path.forward(ff))
    }
}
