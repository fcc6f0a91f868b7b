//! Eventide Core - Identifiers, positions and payload types for Eventide.
//!
//! This crate provides the vocabulary shared by every other Eventide crate:
//! partition identifiers, stream and consumer-group names, the opaque
//! [`Offset`] token and [`SequenceNumber`] assigned by the stream, and the
//! event payload types exchanged with the transport.
//!
//! It does NOT talk to storage or to the network. Those live in
//! `eventide-checkpoint`, `eventide-blob` and `eventide-client`.
//!
//! # Design Principles
//!
//! - **Strongly-typed IDs**: a `PartitionId` can't be confused with a sequence number
//! - **Validated names**: stream and group names are checked once, at construction
//! - **Explicit limits**: every configurable bound has a named maximum
//! - **No unsafe code**

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
pub mod limits;
mod record;
mod types;

pub use error::{Error, Result};
pub use record::{EventData, Offset, ReceivedEvent, SequenceNumber, Timestamp};
pub use types::{ConsumerGroup, PartitionId, StreamId};
