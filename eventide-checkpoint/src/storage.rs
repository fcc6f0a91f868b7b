//! Record store abstraction.
//!
//! Provides the `RecordStore` trait the checkpoint protocol persists through,
//! and `SimulatedRecordStore` for deterministic simulation testing.

#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::types::{PartitionKey, PartitionRecord, DEFAULT_OWNER};

// -----------------------------------------------------------------------------
// Record Store Trait
// -----------------------------------------------------------------------------

/// Durable storage for partition records.
///
/// The store carries no compare-and-swap: `write` overwrites. Monotonicity is
/// enforced by `CheckpointController`, and safety against concurrent writers
/// relies on a single owner per partition.
///
/// Implementations must time out slow operations and report
/// `StoreError::Unavailable` rather than hang.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Creates the initial record for `key` unless one already exists.
    ///
    /// Returns `true` if this call created the record. A concurrent creator
    /// must never clobber an existing record.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` on transport or authentication failure.
    async fn create_if_absent(&self, key: &PartitionKey) -> StoreResult<bool>;

    /// Reads the record for `key`.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if the record was never created, `Unavailable`
    /// on transport failure, `Corrupt` if the record can't be decoded.
    async fn read(&self, key: &PartitionKey) -> StoreResult<PartitionRecord>;

    /// Overwrites the record for `key`.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` on transport failure.
    async fn write(&self, key: &PartitionKey, record: &PartitionRecord) -> StoreResult<()>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn create_if_absent(&self, key: &PartitionKey) -> StoreResult<bool> {
        (**self).create_if_absent(key).await
    }

    async fn read(&self, key: &PartitionKey) -> StoreResult<PartitionRecord> {
        (**self).read(key).await
    }

    async fn write(&self, key: &PartitionKey, record: &PartitionRecord) -> StoreResult<()> {
        (**self).write(key, record).await
    }
}

// -----------------------------------------------------------------------------
// No Record Store
// -----------------------------------------------------------------------------

/// Store type for receivers that never persist progress.
///
/// Uninhabited: a value can't exist, so a receiver typed with it provably
/// performs no store I/O.
#[derive(Debug, Clone, Copy)]
pub enum NoRecordStore {}

#[async_trait]
impl RecordStore for NoRecordStore {
    async fn create_if_absent(&self, _key: &PartitionKey) -> StoreResult<bool> {
        match *self {}
    }

    async fn read(&self, _key: &PartitionKey) -> StoreResult<PartitionRecord> {
        match *self {}
    }

    async fn write(&self, _key: &PartitionKey, _record: &PartitionRecord) -> StoreResult<()> {
        match *self {}
    }
}

// -----------------------------------------------------------------------------
// Fault Configuration
// -----------------------------------------------------------------------------

/// Fault configuration for simulated record store.
#[derive(Debug, Clone, Default)]
pub struct RecordStoreFaultConfig {
    /// Probability of create operations failing (0.0 - 1.0).
    pub create_fail_rate: f64,
    /// Probability of read operations failing (0.0 - 1.0).
    pub read_fail_rate: f64,
    /// Probability of write operations failing (0.0 - 1.0).
    pub write_fail_rate: f64,
    /// Force next create to fail (one-shot).
    pub force_create_fail: bool,
    /// Force next read to fail (one-shot).
    pub force_read_fail: bool,
    /// Force next write to fail (one-shot).
    pub force_write_fail: bool,
}

impl RecordStoreFaultConfig {
    /// No faults (all operations succeed).
    #[must_use]
    pub const fn none() -> Self {
        Self {
            create_fail_rate: 0.0,
            read_fail_rate: 0.0,
            write_fail_rate: 0.0,
            force_create_fail: false,
            force_read_fail: false,
            force_write_fail: false,
        }
    }

    /// Flaky configuration for stress testing.
    #[must_use]
    pub const fn flaky() -> Self {
        Self {
            create_fail_rate: 0.02,
            read_fail_rate: 0.05,
            write_fail_rate: 0.05,
            force_create_fail: false,
            force_read_fail: false,
            force_write_fail: false,
        }
    }

    /// Store that is completely down.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            create_fail_rate: 1.0,
            read_fail_rate: 1.0,
            write_fail_rate: 1.0,
            force_create_fail: false,
            force_read_fail: false,
            force_write_fail: false,
        }
    }

    /// Builder: set create fail rate.
    #[must_use]
    pub const fn with_create_fail_rate(mut self, rate: f64) -> Self {
        self.create_fail_rate = rate;
        self
    }

    /// Builder: set read fail rate.
    #[must_use]
    pub const fn with_read_fail_rate(mut self, rate: f64) -> Self {
        self.read_fail_rate = rate;
        self
    }

    /// Builder: set write fail rate.
    #[must_use]
    pub const fn with_write_fail_rate(mut self, rate: f64) -> Self {
        self.write_fail_rate = rate;
        self
    }
}

// -----------------------------------------------------------------------------
// Simulated Record Store
// -----------------------------------------------------------------------------

/// In-memory simulated record store for DST.
///
/// Clones share state via `Arc`, so a clone handed to a receiver and a clone
/// kept by the test observe the same records. Dropping every receiver and
/// attaching a new one against the same store simulates a process restart.
#[derive(Debug, Clone)]
pub struct SimulatedRecordStore {
    /// Partition records.
    records: Arc<Mutex<HashMap<PartitionKey, PartitionRecord>>>,
    /// Fault configuration.
    fault_config: Arc<Mutex<RecordStoreFaultConfig>>,
    /// RNG seed for deterministic faults.
    seed: u64,
    /// Operation counter for deterministic RNG.
    counter: Arc<AtomicU64>,
    /// Number of records actually created.
    creations: Arc<AtomicU64>,
    /// Number of successful writes.
    writes: Arc<AtomicU64>,
}

impl SimulatedRecordStore {
    /// Creates a new simulated store with no faults.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_faults(seed, RecordStoreFaultConfig::none())
    }

    /// Creates a simulated store with fault injection.
    #[must_use]
    pub fn with_faults(seed: u64, config: RecordStoreFaultConfig) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            fault_config: Arc::new(Mutex::new(config)),
            seed,
            counter: Arc::new(AtomicU64::new(0)),
            creations: Arc::new(AtomicU64::new(0)),
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns fault config for modification.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn fault_config(&self) -> std::sync::MutexGuard<'_, RecordStoreFaultConfig> {
        self.fault_config.lock().expect("fault config lock poisoned")
    }

    /// Returns the stored record (bypasses faults, for assertions in tests).
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn record(&self, key: &PartitionKey) -> Option<PartitionRecord> {
        let records = self.records.lock().expect("records lock poisoned");
        records.get(key).cloned()
    }

    /// Installs a record directly (for simulating pre-existing state).
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn set_record(&self, key: &PartitionKey, record: PartitionRecord) {
        let mut records = self.records.lock().expect("records lock poisoned");
        records.insert(key.clone(), record);
    }

    /// Returns the number of records created through `create_if_absent`.
    #[must_use]
    pub fn creation_count(&self) -> u64 {
        self.creations.load(Ordering::Relaxed)
    }

    /// Returns the number of successful writes.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Deterministic RNG following the seed + counter pattern.
    ///
    /// Uses `(seed + counter) * M` formula for reproducible fault injection.
    fn should_inject_fault(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let hash = self
            .seed
            .wrapping_add(counter)
            .wrapping_mul(0x9e37_79b9_7f4a_7c15);
        #[allow(clippy::cast_precision_loss)]
        let normalized = (hash as f64) / (u64::MAX as f64);
        normalized < rate
    }

    /// Applies the one-shot flag and the fail rate selected by `pick`.
    fn check_fault(
        &self,
        operation: &'static str,
        pick: impl FnOnce(&mut RecordStoreFaultConfig) -> (bool, f64),
    ) -> StoreResult<()> {
        let (forced, rate) = {
            let mut config = self.fault_config.lock().expect("lock poisoned");
            pick(&mut config)
        };
        if forced {
            return Err(StoreError::Unavailable {
                operation,
                message: "simulated failure (forced)".into(),
            });
        }
        if self.should_inject_fault(rate) {
            return Err(StoreError::Unavailable {
                operation,
                message: "simulated failure (random)".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SimulatedRecordStore {
    async fn create_if_absent(&self, key: &PartitionKey) -> StoreResult<bool> {
        self.check_fault("create_if_absent", |config| {
            let forced = std::mem::take(&mut config.force_create_fail);
            (forced, config.create_fail_rate)
        })?;

        let mut records = self.records.lock().expect("records lock poisoned");
        if records.contains_key(key) {
            return Ok(false);
        }
        records.insert(
            key.clone(),
            PartitionRecord::initial(key.partition, DEFAULT_OWNER),
        );
        self.creations.fetch_add(1, Ordering::Relaxed);

        // TigerStyle: Assert postcondition.
        assert!(records.contains_key(key));
        Ok(true)
    }

    async fn read(&self, key: &PartitionKey) -> StoreResult<PartitionRecord> {
        self.check_fault("read", |config| {
            let forced = std::mem::take(&mut config.force_read_fail);
            (forced, config.read_fail_rate)
        })?;

        let records = self.records.lock().expect("records lock poisoned");
        records
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::RecordNotFound { key: key.clone() })
    }

    async fn write(&self, key: &PartitionKey, record: &PartitionRecord) -> StoreResult<()> {
        // TigerStyle: Assert precondition.
        assert_eq!(
            record.partition_id, key.partition,
            "record partition must match key"
        );

        self.check_fault("write", |config| {
            let forced = std::mem::take(&mut config.force_write_fail);
            (forced, config.write_fail_rate)
        })?;

        let mut records = self.records.lock().expect("records lock poisoned");
        records.insert(key.clone(), record.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
