//! Partition checkpoint and resume protocol for Eventide.
//!
//! This crate decides where a new receiver starts reading a partition, when
//! consumption progress is persisted, and guarantees a persisted position
//! never moves backwards, even when events are redelivered.
//!
//! # Overview
//!
//! - **[`RecordStore`]**: the narrow storage contract the protocol needs
//!   (create-if-absent, read, write), keyed by stream, group and partition.
//! - **[`CheckpointController`]**: owns the read-then-write cycle that
//!   advances a partition's record. Stale candidates are ignored.
//! - **[`ResumeSelector`]**: turns the stored record (or a wall-clock time)
//!   into a [`StartFilter`] for the transport.
//! - **[`CadenceGate`]**: decides per delivered event whether this is a
//!   checkpoint instant, so the store is written every N events instead of
//!   every event.
//!
//! Control flow: resume selection runs once per receiver, the cadence gate
//! once per delivered event, the controller once per checkpoint instant.
//!
//! # Delivery Semantics
//!
//! The protocol is at-least-once. A crash between delivery and the next
//! checkpoint instant redelivers everything after the last persisted offset.
//!
//! # Ownership
//!
//! A partition record has exactly one writer: the receive loop that owns the
//! partition. The store offers no compare-and-swap; two processes consuming
//! the same partition of the same group can overwrite each other.
//!
//! # Testing
//!
//! [`SimulatedRecordStore`] keeps records in memory and injects faults
//! deterministically from a seed:
//!
//! ```ignore
//! use eventide_checkpoint::{RecordStoreFaultConfig, SimulatedRecordStore};
//!
//! let store = SimulatedRecordStore::with_faults(seed, RecordStoreFaultConfig::flaky());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod cadence;
mod controller;
mod error;
mod resume;
mod storage;
mod types;

pub use cadence::{CadenceGate, CadenceOutcome};
pub use controller::{AdvanceOutcome, CheckpointController};
pub use error::{CheckpointError, CheckpointResult, StoreError, StoreResult};
pub use resume::{ResumeMode, ResumePosition, ResumeSelector, StartFilter, SELECTOR_FILTER_NAME};
pub use storage::{NoRecordStore, RecordStore, RecordStoreFaultConfig, SimulatedRecordStore};
pub use types::{Checkpoint, PartitionKey, PartitionRecord, DEFAULT_OWNER};
