//! Error types shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for visual regression operations
pub type VisregResult<T> = Result<T, VisregError>;

/// Error types for visual regression operations
#[derive(Error, Debug)]
pub enum VisregError {
    /// Captured or baseline bytes could not be decoded into an image
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    /// An image could not be encoded for storage or rendering
    #[error("Image encode error: {0}")]
    ImageEncode(String),

    /// Reading or writing a file in the baseline tree failed
    #[error("Baseline I/O error at {}: {source}", path.display())]
    BaselineIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error outside the baseline tree
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The external capture collaborator failed
    #[error("Capture error: {0}")]
    Capture(String),

    /// A hook or command was invoked out of lifecycle order
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// An option value was out of range or unknown
    #[error("Invalid option: {0}")]
    InvalidOption(String),
}

impl VisregError {
    /// Wrap an I/O error that happened at a path inside the baseline tree
    pub fn baseline_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VisregError::BaselineIo {
            path: path.into(),
            source,
        }
    }
}
