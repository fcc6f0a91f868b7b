//! Resume selection.
//!
//! Runs once per receiver attach and turns the partition's durable state (or
//! a wall-clock threshold) into the [`StartFilter`] the transport attaches
//! with.

use std::fmt;
use std::sync::Arc;

use eventide_core::{Offset, Timestamp};
use tracing::{debug, info};

use crate::error::{CheckpointError, CheckpointResult, StoreError};
use crate::storage::{NoRecordStore, RecordStore};
use crate::types::{Checkpoint, PartitionKey};

/// Name of the AMQP filter carrying the start position.
pub const SELECTOR_FILTER_NAME: &str = "apache.org:selector-filter:string";

/// Where a new receiver starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMode {
    /// Resume after the persisted checkpoint, creating the record if absent.
    FromCheckpoint,
    /// Start at the first event enqueued at or after the given time. The
    /// record store is never touched in this mode.
    FromWallClockTime(Timestamp),
}

impl ResumeMode {
    /// Returns true if this mode reads and writes the record store.
    #[must_use]
    pub const fn uses_store(&self) -> bool {
        matches!(self, Self::FromCheckpoint)
    }
}

/// Transport-level start position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartFilter {
    /// Deliver from the very first event of the partition.
    FromBeginning,
    /// Deliver events strictly after this offset.
    AfterOffset(Offset),
    /// Deliver events enqueued at or after this time.
    EnqueuedAtOrAfter(Timestamp),
}

impl StartFilter {
    /// Builds the filter for a stored checkpoint.
    #[must_use]
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        if checkpoint.is_beginning() {
            Self::FromBeginning
        } else {
            Self::AfterOffset(checkpoint.offset.clone())
        }
    }

    /// Renders the selector expression sent under [`SELECTOR_FILTER_NAME`].
    #[must_use]
    pub fn selector_expression(&self) -> String {
        match self {
            Self::FromBeginning => format!(
                "amqp.annotation.x-opt-offset > '{}'",
                Offset::beginning()
            ),
            Self::AfterOffset(offset) => {
                format!("amqp.annotation.x-opt-offset > '{offset}'")
            }
            Self::EnqueuedAtOrAfter(time) => format!(
                "amqp.annotation.x-opt-enqueued-time >= '{}'",
                time.as_millis()
            ),
        }
    }
}

impl fmt::Display for StartFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.selector_expression())
    }
}

/// The outcome of resume selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePosition {
    /// Filter to attach the transport with.
    pub filter: StartFilter,
    /// Checkpoint read from the store, `None` in wall-clock mode.
    pub checkpoint: Option<Checkpoint>,
}

/// Computes start positions for new receivers.
#[derive(Debug)]
pub struct ResumeSelector<S: RecordStore> {
    store: Option<Arc<S>>,
}

impl<S: RecordStore> ResumeSelector<S> {
    /// Creates a selector backed by `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store: Some(store) }
    }

    /// Creates a selector for an optional store.
    #[must_use]
    pub const fn with_store(store: Option<Arc<S>>) -> Self {
        Self { store }
    }

    /// Selects the start position for `key`.
    ///
    /// In `FromCheckpoint` mode the record is created if absent and then read.
    /// In `FromWallClockTime` mode the store is not touched.
    ///
    /// # Errors
    ///
    /// Returns `StoreRequired` for `FromCheckpoint` without a store, and
    /// `ResumeFailed` if creating or reading the record fails.
    pub async fn select_start(
        &self,
        key: &PartitionKey,
        mode: &ResumeMode,
    ) -> CheckpointResult<ResumePosition> {
        match mode {
            ResumeMode::FromWallClockTime(time) => {
                debug!(key = %key, enqueued_after = time.as_millis(), "Resuming from wall-clock time");
                Ok(ResumePosition {
                    filter: StartFilter::EnqueuedAtOrAfter(*time),
                    checkpoint: None,
                })
            }
            ResumeMode::FromCheckpoint => {
                let store = self
                    .store
                    .as_ref()
                    .ok_or_else(|| CheckpointError::StoreRequired { key: key.clone() })?;

                let resume_failed = |source: StoreError| CheckpointError::ResumeFailed {
                    key: key.clone(),
                    source,
                };

                let created = store.create_if_absent(key).await.map_err(resume_failed)?;
                if created {
                    info!(key = %key, "Created partition record");
                } else {
                    debug!(key = %key, "Partition record already exists");
                }

                let record = store.read(key).await.map_err(resume_failed)?;
                if record.partition_id != key.partition {
                    return Err(resume_failed(StoreError::Corrupt {
                        key: key.clone(),
                        message: format!(
                            "record names partition {}",
                            record.partition_id.get()
                        ),
                    }));
                }
                let checkpoint = record.checkpoint();
                let filter = StartFilter::from_checkpoint(&checkpoint);

                info!(
                    key = %key,
                    offset = %checkpoint.offset,
                    sequence_number = checkpoint.sequence_number.get(),
                    "Resuming from checkpoint"
                );
                Ok(ResumePosition {
                    filter,
                    checkpoint: Some(checkpoint),
                })
            }
        }
    }
}

impl ResumeSelector<NoRecordStore> {
    /// Creates a selector with no store; only wall-clock mode succeeds.
    #[must_use]
    pub const fn ephemeral() -> Self {
        Self { store: None }
    }
}
