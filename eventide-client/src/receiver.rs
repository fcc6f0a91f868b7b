//! Partition receiver.
//!
//! Owns one partition's receive link together with its cadence gate and
//! checkpoint controller. Delivery and checkpointing are strictly
//! sequential inside a receiver; partitions run independently, each on its
//! own receiver (and optionally its own task, see [`spawn_receive_loop`]).

use std::ops::ControlFlow;

use eventide_checkpoint::{
    AdvanceOutcome, CadenceGate, CadenceOutcome, Checkpoint, CheckpointController,
    CheckpointResult, NoRecordStore, PartitionKey, RecordStore, ResumeMode,
};
use eventide_core::{Offset, PartitionId, ReceivedEvent, SequenceNumber};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::TransportResult;
use crate::transport::EventSource;

/// Counters for one receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Events handed to the caller.
    pub delivered: u64,
    /// Checkpoint instants that moved the checkpoint forward.
    pub checkpoints_advanced: u64,
    /// Checkpoint instants ignored because the store was already ahead.
    pub checkpoints_stale: u64,
    /// Checkpoint instants that failed; delivery continued.
    pub checkpoint_failures: u64,
}

/// How a receive loop ended when the callback asked it to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSummary {
    /// Partition the loop consumed.
    pub partition_id: PartitionId,
    /// Events delivered during this loop.
    pub delivered: u64,
    /// Checkpoint in effect when the loop ended.
    pub checkpoint: Option<Checkpoint>,
    /// Receiver counters since construction.
    pub stats: ReceiverStats,
}

/// A receiver attached to one partition.
///
/// Built by [`EventHubClient`](crate::EventHubClient). `S` is the record
/// store; receivers in wall-clock mode use [`NoRecordStore`] and never touch
/// storage.
#[derive(Debug)]
pub struct PartitionReceiver<Src: EventSource, S: RecordStore = NoRecordStore> {
    key: PartitionKey,
    mode: ResumeMode,
    source: Src,
    gate: CadenceGate,
    controller: Option<CheckpointController<S>>,
    current: Option<Checkpoint>,
    last_delivered: Option<(Offset, SequenceNumber)>,
    stats: ReceiverStats,
}

impl<Src: EventSource, S: RecordStore> PartitionReceiver<Src, S> {
    pub(crate) const fn new(
        key: PartitionKey,
        mode: ResumeMode,
        source: Src,
        gate: CadenceGate,
        controller: Option<CheckpointController<S>>,
        current: Option<Checkpoint>,
    ) -> Self {
        Self {
            key,
            mode,
            source,
            gate,
            controller,
            current,
            last_delivered: None,
            stats: ReceiverStats {
                delivered: 0,
                checkpoints_advanced: 0,
                checkpoints_stale: 0,
                checkpoint_failures: 0,
            },
        }
    }

    /// Returns the (stream, group, partition) key.
    #[must_use]
    pub const fn key(&self) -> &PartitionKey {
        &self.key
    }

    /// Returns the partition this receiver reads.
    #[must_use]
    pub const fn partition_id(&self) -> PartitionId {
        self.key.partition
    }

    /// Returns the resume mode the receiver was built with.
    #[must_use]
    pub const fn resume_mode(&self) -> ResumeMode {
        self.mode
    }

    /// Returns the receiver counters.
    #[must_use]
    pub const fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// Returns the checkpoint currently in effect.
    ///
    /// In `FromCheckpoint` mode this is the last persisted checkpoint,
    /// starting with the one read at attach. In wall-clock mode it is the
    /// position of the last checkpoint instant, kept in memory only, and
    /// `None` until the first instant.
    #[must_use]
    pub const fn current_checkpoint(&self) -> Option<&Checkpoint> {
        self.current.as_ref()
    }

    /// Waits for one event, passes it to `handler`, then runs the cadence
    /// gate for it.
    ///
    /// The checkpoint instant runs after `handler` returns, so a checkpoint
    /// never covers an event the caller hasn't seen.
    ///
    /// # Errors
    ///
    /// Returns the transport error that ended delivery. Checkpoint failures
    /// are never returned here.
    pub async fn receive_one<F, R>(&mut self, handler: F) -> TransportResult<R>
    where
        F: FnOnce(&ReceivedEvent) -> R,
    {
        let event = self.source.next_event().await?;
        let result = handler(&event);
        self.record_delivery(&event).await;
        Ok(result)
    }

    /// Delivers events to `callback` until it returns `Break` or the
    /// transport fails.
    ///
    /// # Errors
    ///
    /// Returns the terminal transport error. The caller decides whether to
    /// build a new receiver, which resumes from the last persisted
    /// checkpoint.
    pub async fn receive_loop<F>(&mut self, mut callback: F) -> TransportResult<LoopSummary>
    where
        F: FnMut(&ReceivedEvent) -> ControlFlow<()>,
    {
        info!(key = %self.key, "Receive loop started");
        let mut delivered = 0u64;
        loop {
            match self.receive_one(&mut callback).await {
                Ok(flow) => {
                    delivered += 1;
                    if flow.is_break() {
                        info!(
                            key = %self.key,
                            delivered,
                            "Receive loop stopped by callback"
                        );
                        return Ok(self.summary(delivered));
                    }
                }
                Err(err) => {
                    warn!(
                        key = %self.key,
                        delivered,
                        error = %err,
                        "Receive loop terminated by transport error"
                    );
                    return Err(err);
                }
            }
        }
    }

    /// Advances the checkpoint to the last delivered event now, outside the
    /// cadence.
    ///
    /// Returns `None` if nothing has been delivered yet. Does not reset the
    /// cadence counter.
    ///
    /// # Errors
    ///
    /// Returns `ReadFailed` or `WriteFailed` if the store fails.
    pub async fn checkpoint_now(&mut self) -> CheckpointResult<Option<Checkpoint>> {
        let Some((offset, sequence_number)) = self.last_delivered.clone() else {
            return Ok(None);
        };

        if let Some(controller) = self.controller.as_mut() {
            let outcome = controller.advance(offset, sequence_number).await?;
            let checkpoint = outcome.checkpoint().clone();
            self.apply_advance(&outcome);
            Ok(Some(checkpoint))
        } else {
            let checkpoint = Checkpoint::new(self.key.partition, offset, sequence_number);
            self.current = Some(checkpoint.clone());
            self.stats.checkpoints_advanced += 1;
            Ok(Some(checkpoint))
        }
    }

    /// Counts `event` and runs the cadence gate.
    async fn record_delivery(&mut self, event: &ReceivedEvent) {
        self.stats.delivered += 1;
        self.last_delivered = Some((event.offset.clone(), event.sequence_number));

        if let Some(controller) = self.controller.as_mut() {
            match self.gate.on_delivered(event, controller).await {
                CadenceOutcome::Skipped => {}
                CadenceOutcome::Advanced(outcome) => self.apply_advance(&outcome),
                CadenceOutcome::Failed(_) => self.stats.checkpoint_failures += 1,
            }
        } else if self.gate.tick() {
            debug!(
                key = %self.key,
                offset = %event.offset,
                sequence_number = event.sequence_number.get(),
                "Checkpoint recorded in memory"
            );
            self.current = Some(Checkpoint::new(
                self.key.partition,
                event.offset.clone(),
                event.sequence_number,
            ));
            self.stats.checkpoints_advanced += 1;
        }
    }

    fn apply_advance(&mut self, outcome: &AdvanceOutcome) {
        match outcome {
            AdvanceOutcome::Written(_) => self.stats.checkpoints_advanced += 1,
            AdvanceOutcome::Stale { .. } => self.stats.checkpoints_stale += 1,
        }
        self.current = Some(outcome.checkpoint().clone());
    }

    fn summary(&self, delivered: u64) -> LoopSummary {
        LoopSummary {
            partition_id: self.key.partition,
            delivered,
            checkpoint: self.current.clone(),
            stats: self.stats,
        }
    }
}

/// Runs `receiver`'s loop on its own tokio task.
///
/// One task per partition lets partitions progress in parallel while each
/// partition stays strictly sequential.
pub fn spawn_receive_loop<Src, S, F>(
    mut receiver: PartitionReceiver<Src, S>,
    callback: F,
) -> JoinHandle<TransportResult<LoopSummary>>
where
    Src: EventSource,
    S: RecordStore + 'static,
    F: FnMut(&ReceivedEvent) -> ControlFlow<()> + Send + 'static,
{
    tokio::spawn(async move { receiver.receive_loop(callback).await })
}
