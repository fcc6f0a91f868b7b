//! Transport abstraction.
//!
//! The client needs three primitives from the wire: attach a receive link
//! at a start position, pull the next event off it, and send an event.
//! Connection setup, link management and message codecs live behind these
//! traits.
//!
//! # Implementors
//!
//! - [`SimulatedHub`](crate::SimulatedHub): in-memory hub for tests and demos

use async_trait::async_trait;
use eventide_checkpoint::StartFilter;
use eventide_core::{EventData, Offset, PartitionId, ReceivedEvent, SequenceNumber};

use crate::error::TransportResult;

/// Parameters of a receive link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverLink {
    /// Source address, `{hub}/ConsumerGroups/{group}/Partitions/{partition}`.
    pub address: String,
    /// Where delivery starts.
    pub filter: StartFilter,
    /// Link credit.
    pub prefetch_count: u32,
}

/// Acknowledgment of a sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Partition the event was appended to.
    pub partition_id: PartitionId,
    /// Offset assigned to the event.
    pub offset: Offset,
    /// Sequence number assigned to the event.
    pub sequence_number: SequenceNumber,
}

/// A connection to a hub.
///
/// Implementations must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Receive side of a link.
    type Source: EventSource;
    /// Send side of a link.
    type Sink: EventSink;

    /// Attaches a receive link.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is unknown, the filter is rejected,
    /// or the connection is closed.
    async fn attach_receiver(&self, link: &ReceiverLink) -> TransportResult<Self::Source>;

    /// Attaches a send link targeting `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is unknown or the connection is closed.
    async fn attach_sender(&self, address: &str) -> TransportResult<Self::Sink>;

    /// Closes the connection; every link fails with `Closed` afterwards.
    async fn close(&self);
}

/// Receive side of a link.
#[async_trait]
pub trait EventSource: Send + 'static {
    /// Waits for the next event.
    ///
    /// # Errors
    ///
    /// Any error is terminal for this link.
    async fn next_event(&mut self) -> TransportResult<ReceivedEvent>;
}

/// Send side of a link.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    /// Sends an event and waits for the acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns an error if the event is rejected or the link fails.
    async fn send(&self, event: EventData) -> TransportResult<SendReceipt>;
}
