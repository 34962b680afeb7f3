//! Storage error types.

use thiserror::Error;

/// Image archive errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Image size exceeds the configured maximum.
    #[error("image size {size} bytes exceeds maximum allowed {max} bytes")]
    FileTooLarge {
        /// Actual image size.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// Image has no bytes.
    #[error("image is empty")]
    EmptyImage,

    /// Object not found in the archive.
    #[error("image not found: {key}")]
    NotFound {
        /// Archive key that was not found.
        key: String,
    },

    /// Backend configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// OpenDAL operation error.
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    /// Create a file too large error.
    #[must_use]
    pub fn file_too_large(size: u64, max: u64) -> Self {
        Self::FileTooLarge { size, max }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::NotFound {
                key: err.to_string(),
            },
            _ => Self::Operation(err.to_string()),
        }
    }
}
