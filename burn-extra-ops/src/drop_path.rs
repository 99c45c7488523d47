//! # DropPath Regularization
//!
//! Implements DropPath, also known as stochastic depth. During training it zeroes
//! the whole residual branch for randomly chosen samples of the batch and rescales
//! the surviving samples so the expected magnitude of the branch is preserved.

use burn::{prelude::*, tensor::Distribution};

/// Configuration for the `DropPath` module.
#[derive(Config, Debug)]
pub struct DropPathConfig {
    /// The probability of dropping a path.
    #[config(default = "0.0")]
    pub drop_prob: f64,
}

impl DropPathConfig {
    /// Initializes a new `DropPath` module.
    pub const fn init<B: Backend>(&self) -> DropPath<B> {
        DropPath {
            drop_prob: self.drop_prob,
            _phantom: std::marker::PhantomData,
        }
    }
}

/// DropPath module.
///
/// The module is active only when the backend tracks gradients, mirroring how
/// `burn::nn::Dropout` decides between training and inference.
#[derive(Module, Debug)]
pub struct DropPath<B: Backend> {
    drop_prob: f64,
    _phantom: std::marker::PhantomData<B>,
}

impl<B: Backend> DropPath<B> {
    /// Current drop probability.
    pub const fn drop_prob(&self) -> f64 {
        self.drop_prob
    }

    /// Replaces the drop probability.
    ///
    /// Schedules that grow the rate with depth are applied through this call
    /// after the model has been built.
    pub fn set_drop_prob(&mut self, drop_prob: f64) {
        self.drop_prob = drop_prob;
    }

    /// Applies DropPath to the input tensor.
    ///
    /// The mask is drawn once per sample along the batch dimension and broadcast
    /// to every other dimension.
    ///
    /// # Shapes
    /// - input: `[batch_size, ...]`
    /// - output: `[batch_size, ...]`
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        if !B::ad_enabled() || self.drop_prob <= 0.0 {
            return x;
        }
        if self.drop_prob >= 1.0 {
            return x.zeros_like();
        }

        let keep_prob = 1.0 - self.drop_prob;
        let mut mask_shape = [1; D];
        mask_shape[0] = x.dims()[0];

        let random_tensor =
            Tensor::random(mask_shape, Distribution::Bernoulli(keep_prob), &x.device());

        x * random_tensor / keep_prob
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        tensor::{ElementConversion, Tensor},
    };

    type TestBackend = NdArray;
    type TrainBackend = Autodiff<NdArray>;

    fn max_abs_diff<B: Backend, const D: usize>(a: Tensor<B, D>, b: Tensor<B, D>) -> f32 {
        (a - b).abs().max().into_scalar().elem::<f32>()
    }

    #[test]
    fn test_droppath_eval_mode_is_identity() {
        let device = Default::default();
        let drop_path = DropPathConfig::new()
            .with_drop_prob(0.5)
            .init::<TestBackend>();

        let x = Tensor::<TestBackend, 4>::ones([2, 3, 4, 4], &device);
        let output = drop_path.forward(x.clone());

        assert_eq!(max_abs_diff(output, x), 0.0);
    }

    #[test]
    fn test_droppath_zero_prob_in_training_is_identity() {
        let device = Default::default();
        let drop_path = DropPathConfig::new().init::<TrainBackend>();

        let x = Tensor::<TrainBackend, 3>::random(
            [4, 9, 8],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = drop_path.forward(x.clone());

        assert_eq!(max_abs_diff(output, x), 0.0);
    }

    #[test]
    fn test_droppath_full_prob_in_training_is_zero() {
        let device = Default::default();
        let drop_path = DropPathConfig::new()
            .with_drop_prob(1.0)
            .init::<TrainBackend>();

        let x = Tensor::<TrainBackend, 4>::ones([3, 2, 4, 4], &device);
        let output = drop_path.forward(x);

        let total = output.abs().sum().into_scalar().elem::<f32>();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn test_droppath_training_drops_whole_samples() {
        let device = Default::default();
        let drop_path = DropPathConfig::new()
            .with_drop_prob(0.5)
            .init::<TrainBackend>();

        let batch_size = 16;
        let x = Tensor::<TrainBackend, 3>::ones([batch_size, 4, 4], &device);
        let output = drop_path.forward(x);

        // Every sample is either fully dropped or fully kept and rescaled by 2.
        let per_sample = output.sum_dim(2).sum_dim(1).reshape([batch_size]);
        let values = per_sample.into_data().to_vec::<f32>().unwrap();
        for value in values {
            assert!(
                value.abs() < 1e-6 || (value - 32.0).abs() < 1e-4,
                "unexpected per-sample sum {value}"
            );
        }
    }

    #[test]
    fn test_droppath_survivors_scaled_by_inverse_keep_prob() {
        let device = Default::default();
        let drop_path = DropPathConfig::new()
            .with_drop_prob(0.75)
            .init::<TrainBackend>();

        let x = Tensor::<TrainBackend, 2>::ones([64, 2], &device);
        let values = drop_path.forward(x).into_data().to_vec::<f32>().unwrap();

        // Kept entries are 1 / 0.25
        for value in values {
            assert!(
                value.abs() < 1e-6 || (value - 4.0).abs() < 1e-5,
                "unexpected value {value}"
            );
        }
    }

    #[test]
    fn test_set_drop_prob() {
        let mut drop_path = DropPathConfig::new().init::<TestBackend>();
        assert_eq!(drop_path.drop_prob(), 0.0);

        drop_path.set_drop_prob(0.3);
        assert_eq!(drop_path.drop_prob(), 0.3);
    }
}
