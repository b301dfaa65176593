//! Error types for wavefunction evaluation and output.

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, WavefunctionError>;

#[derive(Error, Debug)]
pub enum WavefunctionError {
    /// Quantum numbers, length scale or radius outside their mathematical domain
    #[error("domain error: {0}")]
    Domain(String),

    /// A valid state whose values leave the `f64` range
    #[error("non-finite result: {0}")]
    NonFinite(String),

    /// Grid, colormap or thread-pool configuration rejected
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WavefunctionError {
    /// True for errors caused by caller input rather than by the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            WavefunctionError::Domain(_)
                | WavefunctionError::NonFinite(_)
                | WavefunctionError::Config(_)
        )
    }
}
