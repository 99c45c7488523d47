//! Configuration of the Swin classifier.
//!
//! [`SwinTransformerConfig`] fixes the whole architecture at construction time.
//! It can be built in code with the `with_*` builders, taken from one of the
//! presets, or read from a JSON file; in every case [`SwinTransformerConfig::validate`]
//! runs before a model is created.

use std::path::Path;

use burn::prelude::*;

use crate::{
    error::{SwinError, SwinResult},
    init::ParamInit,
};

/// Number of stages of the hierarchy.
pub const NUM_STAGES: usize = 4;

/// Downsampling factor between consecutive stages.
pub const STAGE_REDUCTION: usize = 2;

/// Architecture of a Swin classifier.
///
/// Defaults describe Swin-T at 224x224 with 1000 classes.
#[derive(Config, Debug)]
pub struct SwinTransformerConfig {
    /// Input image height and width.
    #[config(default = "[224, 224]")]
    pub image_size: [usize; 2],
    /// Number of output classes.
    #[config(default = "1000")]
    pub n_class: usize,
    /// Transformer layers per stage.
    #[config(default = "[2, 2, 6, 2]")]
    pub depths: [usize; NUM_STAGES],
    /// Channel width per stage.
    #[config(default = "[96, 192, 384, 768]")]
    pub dims: [usize; NUM_STAGES],
    /// Dimension of every attention head, shared by all stages.
    #[config(default = "32")]
    pub dim_head: usize,
    /// Attention heads per stage.
    #[config(default = "[3, 6, 12, 24]")]
    pub n_heads: [usize; NUM_STAGES],
    /// Feed-forward hidden width per stage.
    #[config(default = "[384, 768, 1536, 3072]")]
    pub dim_ffs: [usize; NUM_STAGES],
    /// Attention window side.
    #[config(default = "7")]
    pub window_size: usize,
    /// Dropout after feed-forward blocks.
    #[config(default = "0.0")]
    pub drop_ff: f64,
    /// Dropout on attention weights.
    #[config(default = "0.0")]
    pub drop_attn: f64,
    /// Stochastic depth rate given to every transformer layer.
    #[config(default = "0.0")]
    pub drop_path: f64,
    /// Channels of the input image.
    #[config(default = "3")]
    pub in_channels: usize,
    /// Patch size of the first stage.
    #[config(default = "4")]
    pub patch_size: usize,
    /// Parameter initialization strategy.
    #[config(default = "ParamInit::new()")]
    pub param_init: ParamInit,
}

impl SwinTransformerConfig {
    /// Reads a configuration from a JSON file and validates it.
    ///
    /// # Errors
    ///
    /// Returns `Err(SwinError::ConfigLoad)` if the file cannot be read or parsed and
    /// `Err(SwinError::InvalidConfiguration)` if the loaded values are inconsistent.
    pub fn from_file(path: impl AsRef<Path>) -> SwinResult<Self> {
        let path = path.as_ref();
        let config = Self::load(path).map_err(|err| SwinError::ConfigLoad {
            path: path.to_path_buf(),
            reason: format!("{err:?}"),
        })?;
        config.validate()?;

        Ok(config)
    }

    /// Reduction factor of the patch embedding opening each stage.
    pub fn reductions(&self) -> [usize; NUM_STAGES] {
        let mut reductions = [STAGE_REDUCTION; NUM_STAGES];
        reductions[0] = self.patch_size;
        reductions
    }

    /// Spatial resolution `[height, width]` inside each stage.
    pub fn stage_resolutions(&self) -> [[usize; 2]; NUM_STAGES] {
        let mut size = self.image_size;
        self.reductions().map(|reduction| {
            size = [size[0] / reduction, size[1] / reduction];
            size
        })
    }

    /// Total number of transformer layers across all stages.
    pub fn total_depth(&self) -> usize {
        self.depths.iter().sum()
    }

    /// Validate the configuration and return appropriate errors for invalid settings.
    ///
    /// # Errors
    ///
    /// Returns `Err(SwinError::InvalidConfiguration)` if a size is zero, a dropout
    /// rate lies outside `[0, 1]`, or a stage resolution is not divisible by its
    /// patch size or by the window size.
    pub fn validate(&self) -> SwinResult<()> {
        let invalid = |reason: String| Err(SwinError::InvalidConfiguration { reason });

        // 1. Sizes must be positive
        let scalars = [
            ("n_class", self.n_class),
            ("dim_head", self.dim_head),
            ("window_size", self.window_size),
            ("in_channels", self.in_channels),
            ("patch_size", self.patch_size),
            ("image height", self.image_size[0]),
            ("image width", self.image_size[1]),
        ];
        if let Some((name, _)) = scalars.iter().find(|(_, value)| *value == 0) {
            return invalid(format!("{name} must be positive"));
        }
        let per_stage = [
            ("dims", self.dims),
            ("n_heads", self.n_heads),
            ("dim_ffs", self.dim_ffs),
        ];
        for (name, values) in per_stage {
            if let Some(stage) = values.iter().position(|&value| value == 0) {
                return invalid(format!("{name}[{stage}] must be positive"));
            }
        }

        // 2. Dropout rates are probabilities
        let rates = [
            ("drop_ff", self.drop_ff),
            ("drop_attn", self.drop_attn),
            ("drop_path", self.drop_path),
        ];
        for (name, rate) in rates {
            if !(0.0..=1.0).contains(&rate) {
                return invalid(format!("{name} must be within [0, 1], got {rate}"));
            }
        }

        // 3. Every stage must tile exactly into patches and then into windows
        let mut size = self.image_size;
        for (stage, reduction) in self.reductions().into_iter().enumerate() {
            if size[0] % reduction != 0 || size[1] % reduction != 0 {
                return invalid(format!(
                    "stage {stage} input {}x{} is not divisible by patch size {reduction}",
                    size[0], size[1]
                ));
            }
            size = [size[0] / reduction, size[1] / reduction];
            if size[0] % self.window_size != 0 || size[1] % self.window_size != 0 {
                return invalid(format!(
                    "stage {stage} resolution {}x{} is not divisible by window size {}",
                    size[0], size[1], self.window_size
                ));
            }
        }

        Ok(())
    }
}

/// Swin-T: dims 96·2^i, depths [2, 2, 6, 2], heads [3, 6, 12, 24].
pub fn swin_t_config() -> SwinTransformerConfig {
    SwinTransformerConfig::new()
}

/// Swin-S: Swin-T with a deeper third stage.
pub fn swin_s_config() -> SwinTransformerConfig {
    SwinTransformerConfig::new().with_depths([2, 2, 18, 2])
}

/// Swin-B: dims 128·2^i, depths [2, 2, 18, 2], heads [4, 8, 16, 32].
pub fn swin_b_config() -> SwinTransformerConfig {
    SwinTransformerConfig::new()
        .with_depths([2, 2, 18, 2])
        .with_dims([128, 256, 512, 1024])
        .with_n_heads([4, 8, 16, 32])
        .with_dim_ffs([512, 1024, 2048, 4096])
}
