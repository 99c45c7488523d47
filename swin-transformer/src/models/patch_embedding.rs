use burn::{
    nn::{LayerNorm, Linear},
    prelude::*,
};

use crate::{
    error::{SwinError, SwinResult},
    init::ParamInit,
};

/// Splits a channels-last feature map into non-overlapping `size x size` patches
/// and flattens every patch into one feature vector.
///
/// # Arguments
/// - `x`: Input tensor of shape `[batch_size, height, width, channels]`
/// - `size`: Patch size; must divide both height and width
///
/// # Returns
/// Tensor of shape `[batch_size, height / size, width / size, size * size * channels]`.
/// Within a patch, features are ordered by row, then column, then channel.
pub fn patchify<B: Backend>(x: Tensor<B, 4>, size: usize) -> Tensor<B, 4> {
    let [b, h, w, c] = x.dims();

    x.reshape([b, h / size, size, w / size, size, c])
        .permute([0, 1, 3, 2, 4, 5])
        .reshape([b, h / size, w / size, size * size * c])
}

/// Configuration for the patch embedding that opens every stage.
///
/// The first stage embeds raw pixels with patches of 4; later stages use it as a
/// downsampling step with patches of 2.
///
/// # Arguments
/// - `in_dim`: Channels of the incoming feature map
/// - `out_dim`: Embedding dimension of every patch
/// - `patch_size`: Side of the square patch
#[derive(Config, Debug)]
pub struct PatchEmbeddingConfig {
    in_dim: usize,
    out_dim: usize,
    #[config(default = "4")]
    patch_size: usize,
    #[config(default = "ParamInit::new()")]
    param_init: ParamInit,
}

impl PatchEmbeddingConfig {
    /// Builds the patch embedding.
    ///
    /// # Errors
    /// Returns `SwinError::InvalidConfiguration` if the patch size is zero.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SwinResult<PatchEmbedding<B>> {
        if self.patch_size == 0 {
            return Err(SwinError::InvalidConfiguration {
                reason: "patch size must be positive".to_string(),
            });
        }
        let patch_dim = self.in_dim * self.patch_size * self.patch_size;

        Ok(PatchEmbedding {
            in_dim: self.in_dim,
            patch_size: self.patch_size,
            linear: self.param_init.linear(patch_dim, self.out_dim, true, device),
            norm: self.param_init.layer_norm(self.out_dim, 1e-5, device),
        })
    }
}

/// Linear patch projection followed by layer normalization.
///
/// # Tensor Transformations
/// - Input: `[batch_size, height, width, in_dim]`
/// - Output: `[batch_size, height / patch_size, width / patch_size, out_dim]`
#[derive(Module, Debug)]
pub struct PatchEmbedding<B: Backend> {
    in_dim: usize,
    patch_size: usize,
    linear: Linear<B>,
    norm: LayerNorm<B>,
}

impl<B: Backend> PatchEmbedding<B> {
    /// Embeds every patch of `x`.
    ///
    /// # Errors
    /// Returns `SwinError::InvalidTensorShape` if height or width is not divisible
    /// by the patch size or if the channel count differs from `in_dim`.
    pub fn forward(&self, x: Tensor<B, 4>) -> SwinResult<Tensor<B, 4>> {
        let dims = x.dims();
        let [_, h, w, c] = dims;
        if h % self.patch_size != 0 || w % self.patch_size != 0 {
            return Err(SwinError::shape(
                format!(
                    "[batch, height, width, channels] with height and width divisible by {}",
                    self.patch_size
                ),
                dims,
            ));
        }
        if c != self.in_dim {
            return Err(SwinError::shape(
                format!("[batch, height, width, {}]", self.in_dim),
                dims,
            ));
        }

        let x = patchify(x, self.patch_size);
        let x = self.linear.forward(x);

        Ok(self.norm.forward(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::TensorData};

    type TestBackend = NdArray;

    #[test]
    fn test_patchify_layout() {
        let device = Default::default();
        // [1, 4, 4, 1] holding 0..16 in row-major order
        let x = Tensor::<TestBackend, 1, Int>::arange(0..16, &device)
            .float()
            .reshape([1, 4, 4, 1]);

        let patches = patchify(x, 2);
        assert_eq!(patches.dims(), [1, 2, 2, 4]);

        patches.into_data().assert_eq(
            &TensorData::from([[
                [[0.0f32, 1.0, 4.0, 5.0], [2.0, 3.0, 6.0, 7.0]],
                [[8.0, 9.0, 12.0, 13.0], [10.0, 11.0, 14.0, 15.0]],
            ]]),
            false,
        );
    }

    #[test]
    fn test_patch_embedding_forward_shape() {
        let device = Default::default();
        let embed = PatchEmbeddingConfig::new(3, 96)
            .with_patch_size(4)
            .init::<TestBackend>(&device)
            .unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [2, 224, 224, 3],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = embed.forward(input).expect("forward failed");

        assert_eq!(output.dims(), [2, 56, 56, 96]); // 224/4 = 56
    }

    #[test]
    fn test_patch_embedding_downsample_shape() {
        let device = Default::default();
        let embed = PatchEmbeddingConfig::new(96, 192)
            .with_patch_size(2)
            .init::<TestBackend>(&device)
            .unwrap();

        let input = Tensor::<TestBackend, 4>::zeros([1, 56, 56, 96], &device);
        let output = embed.forward(input).expect("forward failed");

        assert_eq!(output.dims(), [1, 28, 28, 192]);
    }

    #[test]
    fn test_patch_embedding_rejects_indivisible_input() {
        let device = Default::default();
        let embed = PatchEmbeddingConfig::new(3, 8)
            .with_patch_size(4)
            .init::<TestBackend>(&device)
            .unwrap();

        let input = Tensor::<TestBackend, 4>::zeros([1, 30, 32, 3], &device);
        match embed.forward(input) {
            Err(SwinError::InvalidTensorShape { expected, actual }) => {
                assert!(expected.contains("divisible by 4"));
                assert!(actual.contains("30"));
            }
            _ => panic!("Expected InvalidTensorShape error"),
        }
    }

    #[test]
    fn test_patch_embedding_rejects_channel_mismatch() {
        let device = Default::default();
        let embed = PatchEmbeddingConfig::new(3, 8)
            .with_patch_size(2)
            .init::<TestBackend>(&device)
            .unwrap();

        let input = Tensor::<TestBackend, 4>::zeros([1, 8, 8, 4], &device);
        assert!(matches!(
            embed.forward(input),
            Err(SwinError::InvalidTensorShape { .. })
        ));
    }

    #[test]
    fn test_patch_embedding_rejects_zero_patch_size() {
        let device = Default::default();
        let result = PatchEmbeddingConfig::new(3, 8)
            .with_patch_size(0)
            .init::<TestBackend>(&device);

        match result {
            Err(SwinError::InvalidConfiguration { reason }) => {
                assert!(reason.contains("patch size"));
            }
            _ => panic!("Expected InvalidConfiguration error"),
        }
    }
}
