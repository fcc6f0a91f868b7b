//! Blob storage error types.

use thiserror::Error;

/// Result type for blob storage operations.
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors reported by an object storage backend.
#[derive(Debug, Error)]
pub enum BlobError {
    /// Blob not found in storage.
    #[error("blob not found: {key}")]
    NotFound {
        /// The blob key that was not found.
        key: String,
    },

    /// Upload failed.
    #[error("upload failed for {key}: {message}")]
    UploadFailed {
        /// The blob key.
        key: String,
        /// Error message.
        message: String,
    },

    /// Download failed.
    #[error("download failed for {key}: {message}")]
    DownloadFailed {
        /// The blob key.
        key: String,
        /// Error message.
        message: String,
    },

    /// I/O error outside a single upload or download.
    #[error("I/O error: {operation}: {message}")]
    Io {
        /// What operation was being performed.
        operation: &'static str,
        /// Error message.
        message: String,
    },
}
