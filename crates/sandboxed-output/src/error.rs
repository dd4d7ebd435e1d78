//! Error types for sandboxed output operations.

use std::path::PathBuf;

/// Result type for sandboxed output operations.
pub type Result<T> = std::result::Result<T, SandboxedFileError>;

/// Errors that can occur during sandboxed output operations.
#[derive(Debug, thiserror::Error)]
pub enum SandboxedFileError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Path validation failed - potential security issue
    #[error("Path validation failed: {path:?} - {reason}")]
    PathValidation { path: PathBuf, reason: String },

    /// Directory creation failed
    #[error("Failed to create directory: {path:?} - {source}")]
    DirectoryCreation {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Temp-file write or rename into place failed
    #[error("Atomic write failed: {path:?} - {source}")]
    AtomicWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Permissions error
    #[error("Permission denied: {operation} on {path:?}")]
    Permission { operation: String, path: PathBuf },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl SandboxedFileError {
    /// True when the underlying I/O error is `NotFound`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io(e) | Self::AtomicWrite { source: e, .. } => {
                e.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}
