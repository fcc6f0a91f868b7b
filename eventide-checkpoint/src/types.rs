//! Checkpoint data structures.

use std::fmt;

use eventide_core::{ConsumerGroup, Offset, PartitionId, SequenceNumber, StreamId};

/// Owner name written into records created by this library.
pub const DEFAULT_OWNER: &str = "eventide";

// -----------------------------------------------------------------------------
// Partition Key
// -----------------------------------------------------------------------------

/// Key identifying one partition record: (stream, consumer group, partition).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    /// Stream the partition belongs to.
    pub stream: StreamId,
    /// Consumer group whose progress is tracked.
    pub group: ConsumerGroup,
    /// Partition identifier.
    pub partition: PartitionId,
}

impl PartitionKey {
    /// Creates a new partition key.
    #[must_use]
    pub const fn new(stream: StreamId, group: ConsumerGroup, partition: PartitionId) -> Self {
        Self {
            stream,
            group,
            partition,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.stream,
            self.group,
            self.partition.get()
        )
    }
}

// -----------------------------------------------------------------------------
// Checkpoint
// -----------------------------------------------------------------------------

/// "Consumption of this partition has progressed at least this far."
///
/// Immutable value; a newer checkpoint replaces an older one wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Offset of the last event covered by this checkpoint.
    pub offset: Offset,
    /// Sequence number of the last event covered by this checkpoint.
    pub sequence_number: SequenceNumber,
    /// Partition this checkpoint belongs to.
    pub partition_id: PartitionId,
}

impl Checkpoint {
    /// Creates a checkpoint.
    #[must_use]
    pub const fn new(
        partition_id: PartitionId,
        offset: Offset,
        sequence_number: SequenceNumber,
    ) -> Self {
        Self {
            offset,
            sequence_number,
            partition_id,
        }
    }

    /// Checkpoint meaning "nothing consumed yet".
    #[must_use]
    pub fn beginning(partition_id: PartitionId) -> Self {
        Self::new(partition_id, Offset::beginning(), SequenceNumber::initial())
    }

    /// Returns true if this checkpoint points at the start of the partition.
    #[must_use]
    pub fn is_beginning(&self) -> bool {
        self.offset.is_beginning()
    }
}

// -----------------------------------------------------------------------------
// Partition Record
// -----------------------------------------------------------------------------

/// The persisted lease for one partition key.
///
/// Superset of [`Checkpoint`] with ownership metadata. `epoch`, `owner` and
/// `token` are carried through every write but not enforced here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRecord {
    /// Partition this record belongs to.
    pub partition_id: PartitionId,
    /// Persisted offset.
    pub offset: Offset,
    /// Persisted sequence number.
    pub sequence_number: SequenceNumber,
    /// Ownership epoch.
    pub epoch: u64,
    /// Name of the owning consumer.
    pub owner: String,
    /// Ownership token.
    pub token: String,
}

impl PartitionRecord {
    /// Creates the record written on first attach: beginning sentinel,
    /// sequence number 0.
    #[must_use]
    pub fn initial(partition_id: PartitionId, owner: impl Into<String>) -> Self {
        Self {
            partition_id,
            offset: Offset::beginning(),
            sequence_number: SequenceNumber::initial(),
            epoch: 0,
            owner: owner.into(),
            token: String::new(),
        }
    }

    /// Returns the checkpoint held by this record.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(
            self.partition_id,
            self.offset.clone(),
            self.sequence_number,
        )
    }

    /// Returns a copy of this record advanced to `checkpoint`, keeping the
    /// ownership metadata.
    #[must_use]
    pub fn with_checkpoint(&self, checkpoint: &Checkpoint) -> Self {
        Self {
            offset: checkpoint.offset.clone(),
            sequence_number: checkpoint.sequence_number,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> PartitionKey {
        PartitionKey::new(
            StreamId::new("telemetry").unwrap(),
            ConsumerGroup::new("analytics").unwrap(),
            PartitionId::new(4),
        )
    }

    #[test]
    fn test_partition_key_display() {
        assert_eq!(key().to_string(), "telemetry/analytics/4");
    }

    #[test]
    fn test_initial_record() {
        let record = PartitionRecord::initial(PartitionId::new(4), DEFAULT_OWNER);
        assert!(record.offset.is_beginning());
        assert_eq!(record.sequence_number, SequenceNumber::initial());
        assert_eq!(record.epoch, 0);
        assert_eq!(record.owner, "eventide");
        assert!(record.token.is_empty());
        assert_eq!(record.checkpoint(), Checkpoint::beginning(PartitionId::new(4)));
    }

    #[test]
    fn test_with_checkpoint_keeps_metadata() {
        let mut record = PartitionRecord::initial(PartitionId::new(1), "worker-a");
        record.epoch = 3;
        record.token = "t".to_string();

        let checkpoint = Checkpoint::new(
            PartitionId::new(1),
            Offset::new("4096"),
            SequenceNumber::new(17),
        );
        let advanced = record.with_checkpoint(&checkpoint);

        assert_eq!(advanced.offset, Offset::new("4096"));
        assert_eq!(advanced.sequence_number, SequenceNumber::new(17));
        assert_eq!(advanced.epoch, 3);
        assert_eq!(advanced.owner, "worker-a");
        assert_eq!(advanced.token, "t");
        assert!(!advanced.checkpoint().is_beginning());
    }
}
