//! Eventide Blob - blob-backed checkpoint store.
//!
//! Persists each partition's checkpoint lease as a small JSON blob, one blob
//! per (stream, consumer group, partition). Implements the
//! `eventide_checkpoint::RecordStore` contract on top of a minimal object
//! storage trait.
//!
//! # Storage Backends
//!
//! - [`SimulatedObjectStorage`]: In-memory storage with fault injection for DST
//! - [`FilesystemObjectStorage`]: Local filesystem storage, used by the CLI
//!
//! # Example
//!
//! ```ignore
//! use eventide_blob::{BlobRecordStore, BlobStoreConfig, FilesystemConfig, FilesystemObjectStorage};
//!
//! let storage = FilesystemObjectStorage::new(FilesystemConfig::new("/var/lib/eventide")).await?;
//! let store = BlobRecordStore::new(storage, BlobStoreConfig::new());
//! store.create_if_absent(&key).await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod filesystem;
mod lease;
mod record_store;
mod storage;

pub use error::{BlobError, BlobResult};
pub use filesystem::{FilesystemConfig, FilesystemObjectStorage};
pub use lease::{lease_blob_key, LeaseDocument};
pub use record_store::{BlobRecordStore, BlobStoreConfig, OPERATION_TIMEOUT_DEFAULT};
pub use storage::{BlobKey, ObjectStorage, ObjectStorageFaultConfig, SimulatedObjectStorage};
