//! # Model Architectures
//!
//! Building blocks of the classifier, from the innermost to the outermost:
//!
//! - `feed_forward`: Position-wise two-layer MLP.
//! - `patch_embedding`: Patch flattening and projection that opens every stage.
//! - `window_attention`: Multi-head self-attention restricted to local windows,
//!   with relative position bias and optional cyclic shift.
//! - `transformer_layer`: Pre-norm residual layer combining the two blocks above.
//! - `stage`: Patch embedding followed by alternating regular and shifted layers.
//! - `swin_transformer`: The four-stage classifier and its presets.

pub mod feed_forward;
pub mod patch_embedding;
pub mod stage;
pub mod swin_transformer;
pub mod transformer_layer;
pub mod window_attention;

pub use swin_transformer::{swin_b, swin_s, swin_t, SwinTransformer, SwinTransformerRecord};
