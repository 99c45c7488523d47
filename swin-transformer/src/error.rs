use std::path::PathBuf;

use thiserror::Error;

/// The error type for Swin classifier operations.
///
/// Every variant describes a misconfiguration. None of them is recoverable at
/// runtime: the configuration or the input geometry has to be fixed before a
/// forward pass can succeed.
#[derive(Error, Debug)]
pub enum SwinError {
    /// Error for when an invalid model configuration is provided.
    /// This can happen if configuration parameters are logically inconsistent.
    #[error("Invalid model configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Error for when an input tensor has an invalid shape.
    #[error("Invalid input tensor shape: expected {expected}, got {actual}")]
    InvalidTensorShape {
        /// The expected tensor shape.
        expected: String,
        /// The actual tensor shape.
        actual: String,
    },

    /// Error for when a configuration file cannot be read or parsed.
    #[error("Failed to load configuration from {}: {reason}", path.display())]
    ConfigLoad {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying failure.
        reason: String,
    },
}

/// A specialized `Result` type for Swin classifier operations.
pub type SwinResult<T> = Result<T, SwinError>;

impl SwinError {
    pub(crate) fn shape(expected: impl Into<String>, actual: impl core::fmt::Debug) -> Self {
        Self::InvalidTensorShape {
            expected: expected.into(),
            actual: format!("{actual:?}"),
        }
    }
}
