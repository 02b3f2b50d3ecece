use std::{io, path::Path};
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by statistics stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing file could not be read or written.
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: io::Error,
    },
    /// The stored document is not valid statistics JSON.
    #[error("corrupt statistics document: {message}")]
    Corrupt {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// I/O failure while performing `action` on `path`.
    pub fn unavailable(action: &str, path: &Path, source: io::Error) -> Self {
        StorageError::Unavailable {
            message: format!("failed to {action} {}", path.display()),
            source,
        }
    }

    /// Document at `path` could not be (de)serialized.
    pub fn corrupt(path: &Path, source: serde_json::Error) -> Self {
        StorageError::Corrupt {
            message: path.display().to_string(),
            source,
        }
    }
}
