//! Blob-backed record store.
//!
//! Adapts any [`ObjectStorage`] to the checkpoint [`RecordStore`] contract.
//! Every storage call is bounded by `operation_timeout`; a slow backend
//! surfaces as `StoreError::Unavailable` rather than hanging the receive
//! loop.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use eventide_checkpoint::{
    PartitionKey, PartitionRecord, RecordStore, StoreError, StoreResult, DEFAULT_OWNER,
};
use tracing::debug;

use crate::error::{BlobError, BlobResult};
use crate::lease::{lease_blob_key, LeaseDocument};
use crate::storage::ObjectStorage;

/// Default bound on a single storage call.
pub const OPERATION_TIMEOUT_DEFAULT: Duration = Duration::from_secs(30);

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------

/// Configuration for [`BlobRecordStore`].
#[derive(Debug, Clone)]
pub struct BlobStoreConfig {
    /// Owner written into newly created leases.
    pub owner: String,
    /// Upper bound on each storage call.
    pub operation_timeout: Duration,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            owner: DEFAULT_OWNER.to_string(),
            operation_timeout: OPERATION_TIMEOUT_DEFAULT,
        }
    }
}

impl BlobStoreConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Short timeouts for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            operation_timeout: Duration::from_millis(200),
            ..Self::default()
        }
    }

    /// Sets the owner name.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Sets the per-operation timeout.
    ///
    /// # Panics
    ///
    /// Panics if `timeout` is zero.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        assert!(!timeout.is_zero(), "operation timeout must be positive");
        self.operation_timeout = timeout;
        self
    }
}

// -----------------------------------------------------------------------------
// BlobRecordStore
// -----------------------------------------------------------------------------

/// Record store persisting one JSON lease blob per partition key.
#[derive(Debug, Clone)]
pub struct BlobRecordStore<O: ObjectStorage> {
    storage: O,
    config: BlobStoreConfig,
}

impl<O: ObjectStorage> BlobRecordStore<O> {
    /// Creates a record store over `storage`.
    #[must_use]
    pub const fn new(storage: O, config: BlobStoreConfig) -> Self {
        Self { storage, config }
    }

    /// Returns the underlying object storage.
    #[must_use]
    pub const fn storage(&self) -> &O {
        &self.storage
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &BlobStoreConfig {
        &self.config
    }

    /// Runs a storage call under the operation timeout.
    ///
    /// Backend errors go through `map_err`; an elapsed timeout is always
    /// `Unavailable`.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = BlobResult<T>> + Send,
        map_err: impl FnOnce(BlobError) -> StoreError + Send,
    ) -> StoreResult<T> {
        match tokio::time::timeout(self.config.operation_timeout, call).await {
            Ok(result) => result.map_err(map_err),
            Err(_) => Err(StoreError::Unavailable {
                operation,
                message: format!(
                    "timed out after {}ms",
                    self.config.operation_timeout.as_millis()
                ),
            }),
        }
    }
}

fn unavailable(operation: &'static str) -> impl FnOnce(BlobError) -> StoreError + Send {
    move |e| StoreError::Unavailable {
        operation,
        message: e.to_string(),
    }
}

fn corrupt(key: &PartitionKey, message: String) -> StoreError {
    StoreError::Corrupt {
        key: key.clone(),
        message,
    }
}

#[async_trait]
impl<O: ObjectStorage> RecordStore for BlobRecordStore<O> {
    async fn create_if_absent(&self, key: &PartitionKey) -> StoreResult<bool> {
        let blob = lease_blob_key(key);
        let record = PartitionRecord::initial(key.partition, self.config.owner.clone());
        let data = LeaseDocument::encode(&record).map_err(|e| corrupt(key, e.to_string()))?;

        let created = self
            .bounded(
                "create_if_absent",
                self.storage.put_if_absent(&blob, data),
                unavailable("create_if_absent"),
            )
            .await?;
        debug!(blob = %blob, created, "Lease create-if-absent");
        Ok(created)
    }

    async fn read(&self, key: &PartitionKey) -> StoreResult<PartitionRecord> {
        let blob = lease_blob_key(key);
        let data = self
            .bounded("read", self.storage.get(&blob), |e| match e {
                BlobError::NotFound { .. } => StoreError::RecordNotFound { key: key.clone() },
                e => unavailable("read")(e),
            })
            .await?;

        let record = LeaseDocument::decode(&data).map_err(|message| corrupt(key, message))?;
        if record.partition_id != key.partition {
            return Err(corrupt(
                key,
                format!(
                    "lease names partition {} but is stored under partition {}",
                    record.partition_id.get(),
                    key.partition.get()
                ),
            ));
        }
        Ok(record)
    }

    async fn write(&self, key: &PartitionKey, record: &PartitionRecord) -> StoreResult<()> {
        // TigerStyle: Assert precondition.
        assert_eq!(
            record.partition_id, key.partition,
            "record partition must match key"
        );

        let blob = lease_blob_key(key);
        let data = LeaseDocument::encode(record).map_err(|e| corrupt(key, e.to_string()))?;
        self.bounded("write", self.storage.put(&blob, data), unavailable("write"))
            .await
    }
}
