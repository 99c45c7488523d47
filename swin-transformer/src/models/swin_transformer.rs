use burn::{
    nn::{LayerNorm, Linear},
    prelude::*,
};

use super::stage::{Stage, StageConfig};
use crate::{
    config::{swin_b_config, swin_s_config, swin_t_config, SwinTransformerConfig},
    error::{SwinError, SwinResult},
};

/// Epsilon of the norm in front of the classifier.
const HEAD_NORM_EPS: f64 = 1e-5;

/// `steps` evenly spaced values from `start` to `end`, both included.
pub(crate) fn linspace(start: f64, end: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step_size = (end - start) / (steps as f64 - 1.0);
            (0..steps)
                .map(|i| (i as f64).mul_add(step_size, start))
                .collect()
        }
    }
}

impl SwinTransformerConfig {
    /// Builds a classifier from the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err(SwinError::InvalidConfiguration)` if [`Self::validate`] fails.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SwinResult<SwinTransformer<B>> {
        self.validate()?;

        let in_dims = [
            self.in_channels,
            self.dims[0],
            self.dims[1],
            self.dims[2],
        ];
        let stages = self
            .reductions()
            .into_iter()
            .enumerate()
            .map(|(i, reduction)| {
                StageConfig::new(
                    self.depths[i],
                    in_dims[i],
                    self.dims[i],
                    self.n_heads[i],
                    self.dim_head,
                    self.dim_ffs[i],
                )
                .with_window_size(self.window_size)
                .with_reduction(reduction)
                .with_drop_ff(self.drop_ff)
                .with_drop_attn(self.drop_attn)
                .with_drop_path(self.drop_path)
                .with_param_init(self.param_init.clone())
                .init(device)
            })
            .collect::<SwinResult<Vec<_>>>()?;

        let num_features = self.dims[self.dims.len() - 1];
        let model = SwinTransformer {
            stages,
            norm: self
                .param_init
                .layer_norm(num_features, HEAD_NORM_EPS, device),
            classifier: self.param_init.classifier(num_features, self.n_class, device),
            in_channels: self.in_channels,
        };

        tracing::info!(
            depths = ?self.depths,
            dims = ?self.dims,
            window_size = self.window_size,
            n_class = self.n_class,
            num_params = model.num_params(),
            "Swin transformer initialized"
        );

        Ok(model)
    }
}

/// Hierarchical window-attention image classifier.
///
/// # Tensor Transformations
/// - Input: `[batch_size, in_channels, height, width]`
/// - After stage `i`: `[batch_size, height / r_i, width / r_i, dims[i]]` with `r = 4, 8, 16, 32`
/// - Output: `[batch_size, n_class]` unnormalized logits
#[derive(Module, Debug)]
pub struct SwinTransformer<B: Backend> {
    stages: Vec<Stage<B>>,
    norm: LayerNorm<B>,
    classifier: Linear<B>,
    in_channels: usize,
}

impl<B: Backend> SwinTransformer<B> {
    pub fn stages(&self) -> &[Stage<B>] {
        &self.stages
    }

    /// Number of transformer layers across all stages.
    pub fn total_depth(&self) -> usize {
        self.stages.iter().map(Stage::depth).sum()
    }

    /// Stochastic depth rate of every transformer layer, in execution order.
    pub fn drop_path_rates(&self) -> Vec<f64> {
        self.stages
            .iter()
            .flat_map(Stage::transformer_layers)
            .map(|layer| layer.drop_path())
            .collect()
    }

    /// Gives every transformer layer the same stochastic depth rate.
    pub fn set_drop_path(&mut self, drop_path: f64) {
        let rates = vec![drop_path; self.total_depth()];
        self.assign_drop_path(&rates);
    }

    /// Increases the stochastic depth rate linearly from 0 at the first
    /// transformer layer to `max_drop_path` at the last one.
    pub fn set_drop_path_schedule(&mut self, max_drop_path: f64) {
        let rates = linspace(0.0, max_drop_path, self.total_depth());
        self.assign_drop_path(&rates);
    }

    fn assign_drop_path(&mut self, rates: &[f64]) {
        let mut start = 0;
        for stage in &mut self.stages {
            let end = start + stage.depth();
            stage.set_drop_path(&rates[start..end]);
            start = end;
        }
        tracing::trace!(?rates, "drop path rates updated");
    }

    /// Classifies a batch of images.
    ///
    /// # Arguments
    /// - `x`: Images of shape `[batch_size, in_channels, height, width]`
    ///
    /// # Returns
    /// Logits of shape `[batch_size, n_class]`.
    ///
    /// # Errors
    /// Returns `SwinError::InvalidTensorShape` if the channel count is wrong or if
    /// a stage resolution does not tile into patches and windows.
    pub fn forward(&self, x: Tensor<B, 4>) -> SwinResult<Tensor<B, 2>> {
        let dims = x.dims();
        if dims[1] != self.in_channels {
            return Err(SwinError::shape(
                format!("[batch, {}, height, width]", self.in_channels),
                dims,
            ));
        }

        // NCHW -> NHWC
        let x = x.permute([0, 2, 3, 1]);
        let x = self
            .stages
            .iter()
            .try_fold(x, |x, stage| stage.forward(x))?;
        let x = self.norm.forward(x);

        // Global average pool over height and width
        let [b, _, _, c] = x.dims();
        let x = x.mean_dim(1).mean_dim(2).reshape([b, c]);

        Ok(self.classifier.forward(x))
    }
}

/// Swin-T classifier for 224x224 images and 1000 classes.
pub fn swin_t<B: Backend>(device: &Device<B>) -> SwinResult<SwinTransformer<B>> {
    swin_t_config().init(device)
}

/// Swin-S classifier for 224x224 images and 1000 classes.
pub fn swin_s<B: Backend>(device: &Device<B>) -> SwinResult<SwinTransformer<B>> {
    swin_s_config().init(device)
}

/// Swin-B classifier for 224x224 images and 1000 classes.
pub fn swin_b<B: Backend>(device: &Device<B>) -> SwinResult<SwinTransformer<B>> {
    swin_b_config().init(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::NdArray,
        tensor::{Distribution, ElementConversion},
    };

    type TestBackend = NdArray;

    /// Two-layer-per-stage model on 64x64 images with 2x2 windows.
    fn small_config() -> SwinTransformerConfig {
        SwinTransformerConfig::new()
            .with_image_size([64, 64])
            .with_n_class(10)
            .with_depths([2, 2, 2, 2])
            .with_dims([16, 32, 64, 128])
            .with_dim_head(8)
            .with_n_heads([2, 4, 8, 16])
            .with_dim_ffs([32, 64, 128, 256])
            .with_window_size(2)
    }

    #[test]
    fn test_linspace() {
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(0.0, 0.3, 1), vec![0.0]);
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_small_model_forward_shape() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device).unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [2, 3, 64, 64],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = model.forward(input).expect("forward failed");

        assert_eq!(output.dims(), [2, 10]);
        let nan_count = output.is_nan().int().sum().into_scalar().elem::<i64>();
        assert_eq!(nan_count, 0);
    }

    #[test]
    fn test_swin_t_forward_shape() {
        let device = Default::default();
        let model = swin_t::<TestBackend>(&device).unwrap();
        assert_eq!(model.total_depth(), 12);

        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 224, 224],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = model.forward(input).expect("forward failed");

        assert_eq!(output.dims(), [1, 1000]);
        let nan_count = output.is_nan().int().sum().into_scalar().elem::<i64>();
        assert_eq!(nan_count, 0);
    }

    #[test]
    fn test_stage_layouts_follow_config() {
        let device = Default::default();
        let model = small_config()
            .with_depths([1, 2, 3, 2])
            .init::<TestBackend>(&device)
            .unwrap();

        let depths: Vec<usize> = model.stages().iter().map(Stage::depth).collect();
        assert_eq!(depths, vec![1, 2, 3, 2]);
        assert_eq!(model.total_depth(), 8);
    }

    #[test]
    fn test_rejects_wrong_channel_count() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device).unwrap();

        let input = Tensor::<TestBackend, 4>::zeros([1, 1, 64, 64], &device);
        match model.forward(input) {
            Err(SwinError::InvalidTensorShape { expected, .. }) => {
                assert!(expected.contains("[batch, 3, height, width]"));
            }
            _ => panic!("Expected InvalidTensorShape error"),
        }
    }

    #[test]
    fn test_rejects_unsupported_resolution() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device).unwrap();

        // Stage 3 sees 48 / 16 = 3, which 2x2 windows cannot tile
        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 48, 48], &device);
        assert!(model.forward(input).is_err());
    }

    #[test]
    fn test_drop_path_setters() {
        let device = Default::default();
        let mut model = small_config()
            .with_drop_path(0.1)
            .init::<TestBackend>(&device)
            .unwrap();
        assert_eq!(model.drop_path_rates(), vec![0.1; 8]);

        model.set_drop_path(0.3);
        assert_eq!(model.drop_path_rates(), vec![0.3; 8]);

        model.set_drop_path_schedule(0.7);
        let rates = model.drop_path_rates();
        assert_eq!(rates.len(), 8);
        assert_eq!(rates[0], 0.0);
        assert!((rates[7] - 0.7).abs() < 1e-12);
        assert!(rates.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_eval_forward_is_deterministic() {
        let device = Default::default();
        let model = small_config()
            .with_drop_ff(0.5)
            .with_drop_attn(0.5)
            .with_drop_path(0.5)
            .init::<TestBackend>(&device)
            .unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 64, 64],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let first = model.forward(input.clone()).unwrap();
        let second = model.forward(input).unwrap();

        first.into_data().assert_eq(&second.into_data(), true);
    }
}
