use burn::{
    nn::{Dropout, DropoutConfig, Linear},
    prelude::*,
    tensor::activation::silu,
};

use crate::init::ParamInit;

/// Configuration for the position-wise feed-forward block of a transformer layer.
///
/// # Architecture
/// ```text
/// Input -> Linear -> SiLU -> Linear -> Dropout -> Output
/// ```
///
/// # Arguments
/// - `in_dim`: Number of input (and output) features
/// - `dim_ff`: Number of hidden features
/// - `dropout`: Dropout probability applied to the output
#[derive(Config, Debug)]
pub struct FeedForwardConfig {
    in_dim: usize,
    dim_ff: usize,
    #[config(default = "0.0")]
    dropout: f64,
    #[config(default = "ParamInit::new()")]
    param_init: ParamInit,
}

impl FeedForwardConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> FeedForward<B> {
        FeedForward {
            fc1: self.param_init.linear(self.in_dim, self.dim_ff, true, device),
            fc2: self.param_init.linear(self.dim_ff, self.in_dim, true, device),
            drop: DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// Two-layer position-wise projection applied after attention.
///
/// Works on any tensor whose last dimension holds the features, so it can be
/// applied directly to `[batch, height, width, channels]` feature maps.
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    drop: Dropout,
}

impl<B: Backend> FeedForward<B> {
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let x = self.fc1.forward(x);
        let x = silu(x);
        let x = self.fc2.forward(x);

        self.drop.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::ElementConversion};

    type TestBackend = NdArray;

    #[test]
    fn test_feed_forward_forward_shape() {
        let device = Default::default();
        let ff = FeedForwardConfig::new(32, 128).init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::random(
            [2, 7, 7, 32],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = ff.forward(input);

        assert_eq!(output.dims(), [2, 7, 7, 32]);
    }

    #[test]
    fn test_feed_forward_is_position_wise() {
        let device = Default::default();
        let ff = FeedForwardConfig::new(8, 16).init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 3>::random(
            [1, 5, 8],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let full = ff.forward(input.clone());
        let single = ff.forward(input.slice([0..1, 2..3, 0..8]));

        let diff = (full.slice([0..1, 2..3, 0..8]) - single)
            .abs()
            .max()
            .into_scalar()
            .elem::<f32>();
        assert!(diff < 1e-6);
    }
}
