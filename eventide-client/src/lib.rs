//! Eventide Client - partition receivers and senders.
//!
//! Connects the checkpoint protocol in `eventide-checkpoint` to a
//! transport: an [`EventHubClient`] builds a [`PartitionReceiver`] per
//! partition, running resume selection once at construction and the
//! cadence gate once per delivered event.
//!
//! # Example
//!
//! ```ignore
//! use std::ops::ControlFlow;
//! use eventide_client::{EventHubClient, ReceiverConfig};
//!
//! let client = EventHubClient::new(connection, transport);
//! let config = ReceiverConfig::from_checkpoint().with_checkpoint_interval(100);
//! let mut receiver = client
//!     .create_receiver(PartitionId::new(0), &config, Some(store))
//!     .await?;
//!
//! receiver
//!     .receive_loop(|event| {
//!         handle(event);
//!         ControlFlow::Continue(())
//!     })
//!     .await?;
//! ```
//!
//! # Failure Semantics
//!
//! - Checkpoint failures are logged and counted; delivery continues.
//! - Transport errors end the loop and are returned to the caller.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod config;
mod error;
mod receiver;
mod sender;
mod simulated;
mod transport;

pub use client::EventHubClient;
pub use config::{ConnectionConfig, ReceiverConfig, AMQPS_PORT};
pub use error::{
    ClientError, ClientResult, ConfigError, ConfigResult, TransportError, TransportResult,
};
pub use receiver::{spawn_receive_loop, LoopSummary, PartitionReceiver, ReceiverStats};
pub use sender::Sender;
pub use simulated::{SimulatedHub, SimulatedHubConfig, SimulatedSink, SimulatedSource};
pub use transport::{EventSink, EventSource, ReceiverLink, SendReceipt, Transport};
