//! # Swin Transformer
//!
//! A hierarchical vision transformer for image classification, built using the
//! Burn deep learning framework. Self-attention is computed inside local windows
//! and alternate layers shift the window grid so information flows between
//! neighbouring windows.
//!
//! ## Modules
//!
//! - `config`: The architecture configuration, its validation and the standard presets.
//! - `error`: Defines the custom error types used throughout the crate.
//! - `init`: Parameter initialization shared by every layer.
//! - `models`: The layers, stages and the full classifier.
//!
//! ## Key Components
//!
//! - `SwinTransformer`: The classifier.
//! - `SwinTransformerConfig`: The configuration that drives its construction.
//! - `SwinError`: The enum for all possible errors.

mod config;
mod error;
pub mod init;
pub mod models;

#[doc(inline)]
pub use config::{
    swin_b_config, swin_s_config, swin_t_config, SwinTransformerConfig, NUM_STAGES,
    STAGE_REDUCTION,
};
#[doc(inline)]
pub use error::{SwinError, SwinResult};
#[doc(inline)]
pub use models::{swin_b, swin_s, swin_t, SwinTransformer, SwinTransformerRecord};
