//! Checkpoint error types.
//!
//! Two layers: [`StoreError`] is what a record store reports,
//! [`CheckpointError`] is what the protocol reports, wrapping the store
//! error that caused it.

use thiserror::Error;

use crate::types::PartitionKey;

/// Result type for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for checkpoint protocol operations.
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Errors reported by a record store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transport, authentication or timeout failure talking to the store.
    #[error("record store unavailable: {operation}: {message}")]
    Unavailable {
        /// The store operation that failed.
        operation: &'static str,
        /// Error message.
        message: String,
    },

    /// No record exists for the key; `create_if_absent` was never called.
    #[error("record not found: {key}")]
    RecordNotFound {
        /// The key that was not found.
        key: PartitionKey,
    },

    /// The stored record could not be decoded.
    #[error("corrupt record {key}: {message}")]
    Corrupt {
        /// The key of the corrupt record.
        key: PartitionKey,
        /// Decoder message.
        message: String,
    },
}

impl StoreError {
    /// Returns true for failures expected to clear on retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Errors reported by the checkpoint protocol.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckpointError {
    /// Reading the current record before advancing failed.
    #[error("checkpoint read failed for {key}: {source}")]
    ReadFailed {
        /// The partition being checkpointed.
        key: PartitionKey,
        /// The underlying store error.
        source: StoreError,
    },

    /// Writing the advanced record failed.
    #[error("checkpoint write failed for {key}: {source}")]
    WriteFailed {
        /// The partition being checkpointed.
        key: PartitionKey,
        /// The underlying store error.
        source: StoreError,
    },

    /// Creating or reading the record at receiver attach failed.
    #[error("resume failed for {key}: {source}")]
    ResumeFailed {
        /// The partition being attached.
        key: PartitionKey,
        /// The underlying store error.
        source: StoreError,
    },

    /// Resuming from a checkpoint was requested without a record store.
    #[error("resume from checkpoint for {key} requires a record store")]
    StoreRequired {
        /// The partition being attached.
        key: PartitionKey,
    },
}

impl CheckpointError {
    /// Returns the underlying store error, if any.
    #[must_use]
    pub const fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::ReadFailed { source, .. }
            | Self::WriteFailed { source, .. }
            | Self::ResumeFailed { source, .. } => Some(source),
            Self::StoreRequired { .. } => None,
        }
    }
}
