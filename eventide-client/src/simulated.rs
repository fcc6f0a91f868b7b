//! In-memory simulated hub.
//!
//! A partitioned append-only log behind the [`Transport`] traits, for tests
//! and the demo binary.
//!
//! # Positions
//!
//! - Sequence numbers start at 0 per partition.
//! - Offsets are byte positions: an event's offset is the total body length
//!   of every earlier event in the partition, as a decimal string. An empty
//!   body still occupies one byte so offsets stay strictly increasing.
//! - Enqueued time comes from a manual clock that only moves forward.
//!
//! # Fault Injection
//!
//! - [`SimulatedHub::detach_partition`]: the next receive on that partition
//!   fails with `Detached`.
//! - [`Transport::close`]: every link fails with `Closed`.

#![allow(clippy::significant_drop_tightening)]

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use eventide_checkpoint::StartFilter;
use eventide_core::{
    EventData, Offset, PartitionId, ReceivedEvent, SequenceNumber, StreamId, Timestamp,
};
use tokio::sync::Notify;
use tracing::debug;

use crate::error::{TransportError, TransportResult};
use crate::transport::{EventSink, EventSource, ReceiverLink, SendReceipt, Transport};

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------

/// Configuration for [`SimulatedHub`].
#[derive(Debug, Clone)]
pub struct SimulatedHubConfig {
    /// Hub name; link addresses must start with it.
    pub hub: StreamId,
    /// Number of partitions.
    pub partition_count: u32,
    /// Initial clock value.
    pub start_time: Timestamp,
}

impl SimulatedHubConfig {
    /// Creates a config starting the clock at zero.
    ///
    /// # Panics
    ///
    /// Panics if `partition_count` is zero.
    #[must_use]
    pub fn new(hub: StreamId, partition_count: u32) -> Self {
        assert!(partition_count > 0, "partition_count must be positive");
        Self {
            hub,
            partition_count,
            start_time: Timestamp::from_millis(0),
        }
    }

    /// Sets the initial clock value.
    #[must_use]
    pub const fn with_start_time(mut self, start_time: Timestamp) -> Self {
        self.start_time = start_time;
        self
    }
}

// -----------------------------------------------------------------------------
// Hub State
// -----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PartitionLog {
    events: Vec<ReceivedEvent>,
    next_position: i64,
}

#[derive(Debug)]
struct HubState {
    partitions: Vec<PartitionLog>,
    clock: Timestamp,
    round_robin: u64,
    closed: bool,
    detached: HashSet<PartitionId>,
}

#[derive(Debug)]
struct HubInner {
    config: SimulatedHubConfig,
    state: Mutex<HubState>,
    /// Woken on every append, detach and close.
    changed: Notify,
}

impl HubInner {
    fn state(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().expect("hub state lock poisoned")
    }

    fn check_partition(&self, partition: PartitionId) -> TransportResult<usize> {
        let count = self.config.partition_count;
        if partition.get() >= u64::from(count) {
            return Err(TransportError::UnknownPartition {
                partition,
                partition_count: count,
            });
        }
        usize::try_from(partition.get()).map_err(|_| TransportError::UnknownPartition {
            partition,
            partition_count: count,
        })
    }

    fn route(&self, state: &mut HubState, event: &EventData) -> PartitionId {
        let count = u64::from(self.config.partition_count);
        if let Some(key) = &event.partition_key {
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            PartitionId::new(hasher.finish() % count)
        } else {
            let partition = state.round_robin % count;
            state.round_robin = state.round_robin.wrapping_add(1);
            PartitionId::new(partition)
        }
    }

    fn append(&self, partition: PartitionId, data: EventData) -> TransportResult<SendReceipt> {
        let index = self.check_partition(partition)?;
        data.validate().map_err(|e| TransportError::Rejected {
            reason: e.to_string(),
        })?;

        let receipt = {
            let mut state = self.state();
            if state.closed {
                return Err(TransportError::Closed);
            }
            let enqueued_time = state.clock;
            let log = &mut state.partitions[index];

            let sequence_number = SequenceNumber::new(
                i64::try_from(log.events.len()).unwrap_or(i64::MAX),
            );
            let offset = Offset::new(log.next_position.to_string());
            let size = i64::try_from(data.body.len().max(1)).unwrap_or(i64::MAX);
            log.next_position = log.next_position.saturating_add(size);

            log.events.push(ReceivedEvent {
                partition_id: partition,
                offset: offset.clone(),
                sequence_number,
                enqueued_time,
                data,
            });
            SendReceipt {
                partition_id: partition,
                offset,
                sequence_number,
            }
        };

        self.changed.notify_waiters();
        Ok(receipt)
    }

    /// Parses `{hub}/ConsumerGroups/{group}/Partitions/{partition}`.
    fn parse_receive_address(&self, address: &str) -> TransportResult<PartitionId> {
        let rejected = || TransportError::Rejected {
            reason: format!("unknown source address '{address}'"),
        };
        let parts: Vec<&str> = address.split('/').collect();
        match parts.as_slice() {
            [hub, "ConsumerGroups", group, "Partitions", partition]
                if *hub == self.config.hub.as_str() && !group.is_empty() =>
            {
                let partition = PartitionId::new(partition.parse().map_err(|_| rejected())?);
                self.check_partition(partition)?;
                Ok(partition)
            }
            _ => Err(rejected()),
        }
    }
}

// -----------------------------------------------------------------------------
// SimulatedHub
// -----------------------------------------------------------------------------

/// In-memory partitioned hub.
///
/// Clones share the same log (via `Arc`), so a test can keep one handle
/// for publishing and fault injection while the client holds another.
#[derive(Debug, Clone)]
pub struct SimulatedHub {
    inner: Arc<HubInner>,
}

impl SimulatedHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new(config: SimulatedHubConfig) -> Self {
        let partitions = (0..config.partition_count)
            .map(|_| PartitionLog::default())
            .collect();
        let clock = config.start_time;
        Self {
            inner: Arc::new(HubInner {
                config,
                state: Mutex::new(HubState {
                    partitions,
                    clock,
                    round_robin: 0,
                    closed: false,
                    detached: HashSet::new(),
                }),
                changed: Notify::new(),
            }),
        }
    }

    /// Returns the hub name.
    #[must_use]
    pub fn hub(&self) -> &StreamId {
        &self.inner.config.hub
    }

    /// Returns the number of partitions.
    #[must_use]
    pub fn partition_count(&self) -> u32 {
        self.inner.config.partition_count
    }

    /// Appends an event directly to `partition`, bypassing routing.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition is unknown, the event is too
    /// large, or the hub is closed.
    pub fn append(&self, partition: PartitionId, data: EventData) -> TransportResult<SendReceipt> {
        self.inner.append(partition, data)
    }

    /// Returns the number of events in `partition`.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn event_count(&self, partition: PartitionId) -> usize {
        let Ok(index) = self.inner.check_partition(partition) else {
            return 0;
        };
        self.inner.state().partitions[index].events.len()
    }

    /// Returns the current clock value.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.inner.state().clock
    }

    /// Moves the clock forward.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn advance_clock(&self, by: Duration) {
        let mut state = self.inner.state();
        let millis = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        state.clock = Timestamp::from_millis(state.clock.as_millis().saturating_add(millis));
    }

    /// Makes the next receive on `partition` fail with `Detached`.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn detach_partition(&self, partition: PartitionId) {
        self.inner.state().detached.insert(partition);
        self.inner.changed.notify_waiters();
    }

    /// Returns true once the hub is closed.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state().closed
    }
}

#[async_trait]
impl Transport for SimulatedHub {
    type Source = SimulatedSource;
    type Sink = SimulatedSink;

    async fn attach_receiver(&self, link: &ReceiverLink) -> TransportResult<SimulatedSource> {
        let partition = self.inner.parse_receive_address(&link.address)?;
        if link.prefetch_count == 0 {
            return Err(TransportError::Rejected {
                reason: "prefetch count must be positive".to_string(),
            });
        }
        let after_position = match &link.filter {
            StartFilter::AfterOffset(offset) => {
                Some(offset.as_str().parse::<i64>().map_err(|_| {
                    TransportError::Rejected {
                        reason: format!("malformed offset '{offset}'"),
                    }
                })?)
            }
            _ => None,
        };
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        // A detach only affects links that exist when it is requested.
        self.inner.state().detached.remove(&partition);

        debug!(
            address = %link.address,
            filter = %link.filter,
            prefetch = link.prefetch_count,
            "Attached simulated receive link"
        );
        Ok(SimulatedSource {
            inner: Arc::clone(&self.inner),
            partition,
            cursor: 0,
            start: Some(link.filter.clone()),
            after_position,
            terminal: None,
        })
    }

    async fn attach_sender(&self, address: &str) -> TransportResult<SimulatedSink> {
        if address != self.inner.config.hub.as_str() {
            return Err(TransportError::Rejected {
                reason: format!("unknown target address '{address}'"),
            });
        }
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        Ok(SimulatedSink {
            inner: Arc::clone(&self.inner),
        })
    }

    async fn close(&self) {
        self.inner.state().closed = true;
        self.inner.changed.notify_waiters();
    }
}

// -----------------------------------------------------------------------------
// Links
// -----------------------------------------------------------------------------

/// Receive link on a [`SimulatedHub`] partition.
#[derive(Debug)]
pub struct SimulatedSource {
    inner: Arc<HubInner>,
    partition: PartitionId,
    /// Index of the next event to inspect.
    cursor: usize,
    /// Start filter, cleared once the first matching event is found.
    start: Option<StartFilter>,
    after_position: Option<i64>,
    terminal: Option<TransportError>,
}

impl SimulatedSource {
    fn matches_start(&self, event: &ReceivedEvent) -> bool {
        match &self.start {
            None | Some(StartFilter::FromBeginning) => true,
            Some(StartFilter::AfterOffset(_)) => {
                let position = event.offset.as_str().parse::<i64>().unwrap_or(i64::MIN);
                self.after_position.map_or(true, |after| position > after)
            }
            Some(StartFilter::EnqueuedAtOrAfter(time)) => event.enqueued_time >= *time,
        }
    }

    fn poll_event(&mut self) -> Option<TransportResult<ReceivedEvent>> {
        let index = usize::try_from(self.partition.get()).unwrap_or(usize::MAX);
        let mut state = self.inner.state();
        if state.closed {
            return Some(Err(TransportError::Closed));
        }
        if state.detached.remove(&self.partition) {
            return Some(Err(TransportError::Detached {
                partition: self.partition,
            }));
        }

        let events = &state.partitions.get(index)?.events;
        while self.cursor < events.len() {
            let event = &events[self.cursor];
            self.cursor += 1;
            if self.matches_start(event) {
                self.start = None;
                return Some(Ok(event.clone()));
            }
        }
        drop(state);
        None
    }
}

#[async_trait]
impl EventSource for SimulatedSource {
    async fn next_event(&mut self) -> TransportResult<ReceivedEvent> {
        if let Some(err) = &self.terminal {
            return Err(err.clone());
        }
        let inner = Arc::clone(&self.inner);
        loop {
            // Registered before checking state so a concurrent append can't
            // be missed.
            let changed = inner.changed.notified();
            match self.poll_event() {
                Some(Ok(event)) => return Ok(event),
                Some(Err(err)) => {
                    self.terminal = Some(err.clone());
                    return Err(err);
                }
                None => changed.await,
            }
        }
    }
}

/// Send link on a [`SimulatedHub`].
#[derive(Debug, Clone)]
pub struct SimulatedSink {
    inner: Arc<HubInner>,
}

#[async_trait]
impl EventSink for SimulatedSink {
    async fn send(&self, event: EventData) -> TransportResult<SendReceipt> {
        let partition = {
            let mut state = self.inner.state();
            if state.closed {
                return Err(TransportError::Closed);
            }
            self.inner.route(&mut state, &event)
        };
        self.inner.append(partition, event)
    }
}
