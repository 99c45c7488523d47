//! Additional operations for the Burn deep learning framework
//!
//! This crate provides the operations the Swin classifier needs that are not
//! available in the core Burn framework: cyclic shifts of feature maps and
//! stochastic depth.

use burn::prelude::*;

mod drop_path;
mod roll;

// Convenient re-exports
pub use drop_path::{DropPath, DropPathConfig};
pub use roll::roll;

/// Additional operations for Burn tensors
pub trait TensorExtraOps<B: Backend, const D: usize> {
    /// Apply drop path (stochastic depth) to the tensor
    fn drop_path(self, drop_prob: f64) -> Self;

    /// Cyclically shift the tensor along the given dimensions
    fn roll(self, shifts: &[i64], dims: &[usize]) -> Self;
}

impl<B: Backend, const D: usize> TensorExtraOps<B, D> for Tensor<B, D> {
    fn drop_path(self, drop_prob: f64) -> Self {
        DropPathConfig::new()
            .with_drop_prob(drop_prob)
            .init::<B>()
            .forward(self)
    }

    fn roll(self, shifts: &[i64], dims: &[usize]) -> Self {
        roll::roll(self, shifts, dims)
    }
}
