//! Checkpoint cadence.
//!
//! Counts delivered events and fires a checkpoint every `interval` events.
//! A failed checkpoint is logged and swallowed; it is retried only when the
//! counter next reaches a multiple of the interval.

use std::num::NonZeroU32;

use eventide_core::ReceivedEvent;
use tracing::warn;

use crate::controller::{AdvanceOutcome, CheckpointController};
use crate::error::CheckpointError;
use crate::storage::RecordStore;

/// What the gate did for one delivered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CadenceOutcome {
    /// Not a checkpoint instant.
    Skipped,
    /// The controller ran (written or stale).
    Advanced(AdvanceOutcome),
    /// The controller failed; delivery continues.
    Failed(CheckpointError),
}

impl CadenceOutcome {
    /// Returns true if this event was a checkpoint instant.
    #[must_use]
    pub const fn is_instant(&self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

/// Per-partition checkpoint cadence.
///
/// Owned by a single receive loop; the counter starts at zero when the
/// receiver is constructed.
#[derive(Debug, Clone)]
pub struct CadenceGate {
    interval: NonZeroU32,
    delivered: u64,
}

impl CadenceGate {
    /// Creates a gate that checkpoints every `interval` events.
    #[must_use]
    pub const fn new(interval: NonZeroU32) -> Self {
        Self {
            interval,
            delivered: 0,
        }
    }

    /// Returns the checkpoint interval.
    #[must_use]
    pub const fn interval(&self) -> NonZeroU32 {
        self.interval
    }

    /// Returns the number of events counted so far.
    #[must_use]
    pub const fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Counts one delivery and returns true if it is a checkpoint instant.
    pub fn tick(&mut self) -> bool {
        self.delivered += 1;
        self.delivered % u64::from(self.interval.get()) == 0
    }

    /// Counts `event` and, at a checkpoint instant, advances `controller` to
    /// the event's position.
    ///
    /// Never returns an error: a failed advance is logged and reported as
    /// [`CadenceOutcome::Failed`].
    pub async fn on_delivered<S: RecordStore>(
        &mut self,
        event: &ReceivedEvent,
        controller: &mut CheckpointController<S>,
    ) -> CadenceOutcome {
        if !self.tick() {
            return CadenceOutcome::Skipped;
        }

        match controller
            .advance(event.offset.clone(), event.sequence_number)
            .await
        {
            Ok(outcome) => CadenceOutcome::Advanced(outcome),
            Err(err) => {
                warn!(
                    key = %controller.key(),
                    offset = %event.offset,
                    sequence_number = event.sequence_number.get(),
                    delivered = self.delivered,
                    error = %err,
                    "Checkpoint failed, continuing delivery"
                );
                CadenceOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RecordStoreFaultConfig, SimulatedRecordStore};
    use crate::types::PartitionKey;
    use bytes::Bytes;
    use eventide_core::{
        ConsumerGroup, EventData, Offset, PartitionId, SequenceNumber, StreamId, Timestamp,
    };
    use std::sync::Arc;

    fn key() -> PartitionKey {
        PartitionKey::new(
            StreamId::new("metrics").unwrap(),
            ConsumerGroup::default(),
            PartitionId::new(2),
        )
    }

    fn event(seq: i64) -> ReceivedEvent {
        ReceivedEvent {
            partition_id: PartitionId::new(2),
            offset: Offset::new((seq * 10).to_string()),
            sequence_number: SequenceNumber::new(seq),
            enqueued_time: Timestamp::from_millis(seq),
            data: EventData::new(Bytes::from_static(b"x")),
        }
    }

    fn interval(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn test_tick_fires_on_multiples() {
        let mut gate = CadenceGate::new(interval(3));
        let instants: Vec<u64> = (1..=10)
            .filter(|_| gate.tick())
            .collect();
        assert_eq!(instants, vec![3, 6, 9]);
        assert_eq!(gate.delivered(), 10);
    }

    #[test]
    fn test_interval_one_fires_every_time() {
        let mut gate = CadenceGate::new(interval(1));
        assert!((0..5).all(|_| gate.tick()));
    }

    #[tokio::test]
    async fn test_on_delivered_advances_at_instants() {
        let store = SimulatedRecordStore::new(42);
        store.create_if_absent(&key()).await.unwrap();
        let mut controller = CheckpointController::new(key(), Arc::new(store.clone()));
        let mut gate = CadenceGate::new(interval(3));

        let mut advanced = Vec::new();
        for seq in 1..=10 {
            if let CadenceOutcome::Advanced(outcome) =
                gate.on_delivered(&event(seq), &mut controller).await
            {
                advanced.push(outcome.checkpoint().sequence_number.get());
            }
        }

        assert_eq!(advanced, vec![3, 6, 9]);
        assert_eq!(store.write_count(), 3);
        assert_eq!(
            store.record(&key()).unwrap().sequence_number,
            SequenceNumber::new(9)
        );
    }

    #[tokio::test]
    async fn test_failure_is_swallowed_and_retried_at_next_instant() {
        let store = SimulatedRecordStore::new(42);
        store.create_if_absent(&key()).await.unwrap();
        let mut controller = CheckpointController::new(key(), Arc::new(store.clone()));
        let mut gate = CadenceGate::new(interval(2));

        assert_eq!(
            gate.on_delivered(&event(1), &mut controller).await,
            CadenceOutcome::Skipped
        );

        store.fault_config().force_write_fail = true;
        let outcome = gate.on_delivered(&event(2), &mut controller).await;
        assert!(matches!(
            outcome,
            CadenceOutcome::Failed(CheckpointError::WriteFailed { .. })
        ));

        // No special retry on the next event.
        assert_eq!(
            gate.on_delivered(&event(3), &mut controller).await,
            CadenceOutcome::Skipped
        );
        let outcome = gate.on_delivered(&event(4), &mut controller).await;
        assert!(matches!(outcome, CadenceOutcome::Advanced(_)));
        assert_eq!(
            store.record(&key()).unwrap().sequence_number,
            SequenceNumber::new(4)
        );
    }

    #[tokio::test]
    async fn test_unavailable_store_never_blocks_delivery() {
        let store = SimulatedRecordStore::new(42);
        store.create_if_absent(&key()).await.unwrap();
        *store.fault_config() = RecordStoreFaultConfig::unavailable();
        let mut controller = CheckpointController::new(key(), Arc::new(store.clone()));
        let mut gate = CadenceGate::new(interval(1));

        for seq in 1..=5 {
            let outcome = gate.on_delivered(&event(seq), &mut controller).await;
            assert!(matches!(outcome, CadenceOutcome::Failed(_)));
        }
        assert_eq!(gate.delivered(), 5);
        assert!(store.record(&key()).unwrap().offset.is_beginning());
    }
}
