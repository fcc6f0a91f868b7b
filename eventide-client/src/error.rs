//! Client error types.

use eventide_checkpoint::CheckpointError;
use eventide_core::PartitionId;
use thiserror::Error;

/// Result type for configuration validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for the outward client API.
pub type ClientResult<T> = Result<T, ClientError>;

/// Receiver configuration errors, raised at construction time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither resume mode was selected.
    #[error("invalid resume mode: exactly one of FromCheckpoint or FromWallClockTime must be selected")]
    InvalidResumeMode,

    /// `FromCheckpoint` was selected without a record store.
    #[error("resume from checkpoint requires a record store")]
    MissingRecordStore,

    /// Checkpoint interval out of range.
    #[error("invalid checkpoint interval {value}: must be in 1..={max}")]
    InvalidCheckpointInterval {
        /// The configured value.
        value: u32,
        /// The maximum allowed value.
        max: u32,
    },

    /// Prefetch count out of range.
    #[error("invalid prefetch count {value}: must be in 1..={max}")]
    InvalidPrefetchCount {
        /// The configured value.
        value: u32,
        /// The maximum allowed value.
        max: u32,
    },

    /// A name or connection setting failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] eventide_core::Error),
}

/// Terminal transport errors.
///
/// A receive loop that sees one of these exits and reports it; there is no
/// automatic reconnect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed")]
    Closed,

    /// The receive link for a partition was detached by the service.
    #[error("link detached for {partition}")]
    Detached {
        /// The partition whose link was detached.
        partition: PartitionId,
    },

    /// An operation did not complete in time.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// The service refused a link or a message.
    #[error("rejected: {reason}")]
    Rejected {
        /// Why it was rejected.
        reason: String,
    },

    /// The partition does not exist on this hub.
    #[error("unknown partition {partition} (partition count {partition_count})")]
    UnknownPartition {
        /// The requested partition.
        partition: PartitionId,
        /// Number of partitions on the hub.
        partition_count: u32,
    },
}

/// Errors returned by the outward client API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Receiver configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Resume selection or a checkpoint failed.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ClientError {
    /// Returns true if this is a construction-time configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
