//! Checkpoint controller.
//!
//! Advances a partition's persisted position with a read-then-write cycle.
//! A candidate whose sequence number is below the stored one is ignored, so
//! the persisted position never regresses under redelivery or reordering.

use std::sync::Arc;

use eventide_core::{Offset, SequenceNumber};
use tracing::debug;

use crate::error::{CheckpointError, CheckpointResult};
use crate::storage::RecordStore;
use crate::types::{Checkpoint, PartitionKey};

/// Result of a successful `advance` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The candidate was persisted.
    Written(Checkpoint),
    /// The candidate was older than the stored checkpoint and was ignored.
    Stale {
        /// The checkpoint that remains stored.
        stored: Checkpoint,
    },
}

impl AdvanceOutcome {
    /// Returns the checkpoint now in effect for the partition.
    #[must_use]
    pub const fn checkpoint(&self) -> &Checkpoint {
        match self {
            Self::Written(checkpoint) | Self::Stale { stored: checkpoint } => checkpoint,
        }
    }

    /// Returns true if the store was written.
    #[must_use]
    pub const fn is_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

/// Owns checkpoint writes for a single partition.
///
/// One controller per receive loop. Writes are sequential on `&mut self`, so
/// a controller never races itself.
#[derive(Debug)]
pub struct CheckpointController<S: RecordStore> {
    key: PartitionKey,
    store: Arc<S>,
    last_persisted: Option<Checkpoint>,
}

impl<S: RecordStore> CheckpointController<S> {
    /// Creates a controller for `key` backed by `store`.
    #[must_use]
    pub const fn new(key: PartitionKey, store: Arc<S>) -> Self {
        Self {
            key,
            store,
            last_persisted: None,
        }
    }

    /// Builder: seeds the last known persisted checkpoint (from resume).
    #[must_use]
    pub fn with_last_persisted(mut self, checkpoint: Checkpoint) -> Self {
        // TigerStyle: Assert precondition.
        assert_eq!(
            checkpoint.partition_id, self.key.partition,
            "checkpoint partition must match controller key"
        );
        self.last_persisted = Some(checkpoint);
        self
    }

    /// Returns the partition key this controller writes.
    #[must_use]
    pub const fn key(&self) -> &PartitionKey {
        &self.key
    }

    /// Returns the last checkpoint this controller knows to be stored.
    #[must_use]
    pub const fn last_persisted(&self) -> Option<&Checkpoint> {
        self.last_persisted.as_ref()
    }

    /// Persists `(offset, sequence_number)` unless the store already holds a
    /// newer sequence number.
    ///
    /// Equal sequence numbers are written again, which makes retrying the
    /// same candidate idempotent.
    ///
    /// # Errors
    ///
    /// Returns `ReadFailed` if the current record can't be read, or
    /// `WriteFailed` if the new record can't be written. In both cases the
    /// stored record is unchanged.
    pub async fn advance(
        &mut self,
        offset: Offset,
        sequence_number: SequenceNumber,
    ) -> CheckpointResult<AdvanceOutcome> {
        let current = self
            .store
            .read(&self.key)
            .await
            .map_err(|source| CheckpointError::ReadFailed {
                key: self.key.clone(),
                source,
            })?;

        if sequence_number < current.sequence_number {
            debug!(
                key = %self.key,
                stored_sequence = current.sequence_number.get(),
                candidate_sequence = sequence_number.get(),
                "Ignoring stale checkpoint"
            );
            let stored = current.checkpoint();
            self.last_persisted = Some(stored.clone());
            return Ok(AdvanceOutcome::Stale { stored });
        }

        let candidate = Checkpoint::new(self.key.partition, offset, sequence_number);
        let record = current.with_checkpoint(&candidate);
        self.store
            .write(&self.key, &record)
            .await
            .map_err(|source| CheckpointError::WriteFailed {
                key: self.key.clone(),
                source,
            })?;

        debug!(
            key = %self.key,
            offset = %candidate.offset,
            sequence = candidate.sequence_number.get(),
            "Checkpoint written"
        );
        self.last_persisted = Some(candidate.clone());
        Ok(AdvanceOutcome::Written(candidate))
    }
}
