//! Stream positions and event payloads.
//!
//! # Positions
//!
//! Every event delivered from a partition carries two positions assigned by
//! the stream:
//! - **Offset**: an opaque, transport-defined token. Only the transport can
//!   interpret it; the client stores it and hands it back in a start filter.
//! - **Sequence number**: a per-partition integer that increases with every
//!   event. This is what checkpoint monotonicity is judged on.
//!
//! # Payloads
//!
//! [`EventData`] is what a sender publishes; [`ReceivedEvent`] is what a
//! receiver gets back, with the positions and enqueue time filled in.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::limits::EVENT_BODY_BYTES_MAX;
use crate::{Error, PartitionId, Result};

/// Offset token understood by the service as "before the first event".
const BEGINNING_OFFSET: &str = "-1";

/// Opaque, stream-ordered position token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Offset(String);

impl Offset {
    /// Creates an offset from a transport-provided token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the sentinel offset meaning "start of the partition".
    #[must_use]
    pub fn beginning() -> Self {
        Self(BEGINNING_OFFSET.to_string())
    }

    /// Returns true if this is the "start of the partition" sentinel.
    #[must_use]
    pub fn is_beginning(&self) -> bool {
        self.0 == BEGINNING_OFFSET
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-partition sequence number assigned by the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SequenceNumber(i64);

impl SequenceNumber {
    /// Creates a sequence number from a raw value.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Sequence number stored in a freshly created partition record.
    #[must_use]
    pub const fn initial() -> Self {
        Self(0)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock timestamp in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from milliseconds since Unix epoch.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as milliseconds since Unix epoch.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Returns the current time as a timestamp.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Timestamps won't overflow i64 for centuries.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as i64)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An event to publish.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventData {
    /// The payload.
    pub body: Bytes,
    /// Optional partition-affinity key. Events with the same key land on the
    /// same partition.
    pub partition_key: Option<String>,
    /// Optional application message id.
    pub message_id: Option<String>,
    /// Application properties.
    pub properties: BTreeMap<String, String>,
}

impl EventData {
    /// Creates an event with just a body.
    #[must_use]
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Sets the partition-affinity key.
    #[must_use]
    pub fn with_partition_key(mut self, key: impl Into<String>) -> Self {
        self.partition_key = Some(key.into());
        self
    }

    /// Sets the message id.
    #[must_use]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Adds an application property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Validates the event against the payload bound.
    ///
    /// # Errors
    ///
    /// Returns `LimitExceeded` if the body is larger than `EVENT_BODY_BYTES_MAX`.
    pub fn validate(&self) -> Result<()> {
        if self.body.len() > EVENT_BODY_BYTES_MAX {
            return Err(Error::LimitExceeded {
                limit: "event_body_bytes",
                max: EVENT_BODY_BYTES_MAX as u64,
                actual: self.body.len() as u64,
            });
        }
        Ok(())
    }
}

/// An event delivered from a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedEvent {
    /// Partition the event was read from.
    pub partition_id: PartitionId,
    /// Offset token of this event.
    pub offset: Offset,
    /// Sequence number of this event.
    pub sequence_number: SequenceNumber,
    /// When the service enqueued the event.
    pub enqueued_time: Timestamp,
    /// The published payload.
    pub data: EventData,
}

impl ReceivedEvent {
    /// Returns the payload body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.data.body
    }
}
