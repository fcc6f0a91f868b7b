//! Object storage abstraction for lease blobs.
//!
//! Provides the narrow blob API the lease store needs, plus an in-memory
//! simulated backend with deterministic fault injection.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{BlobError, BlobResult};

// -----------------------------------------------------------------------------
// BlobKey
// -----------------------------------------------------------------------------

/// Location of a blob: a container and a `/`-separated name within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobKey {
    container: String,
    name: String,
}

impl BlobKey {
    /// Creates a blob key.
    ///
    /// # Panics
    ///
    /// Panics if either part is empty.
    #[must_use]
    pub fn new(container: impl Into<String>, name: impl Into<String>) -> Self {
        let container = container.into();
        let name = name.into();
        // TigerStyle: Assert preconditions.
        assert!(!container.is_empty(), "container must not be empty");
        assert!(!name.is_empty(), "blob name must not be empty");
        Self { container, name }
    }

    /// Returns the container name.
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Returns the blob name within the container.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.name)
    }
}

// -----------------------------------------------------------------------------
// ObjectStorage Trait
// -----------------------------------------------------------------------------

/// Object storage backend trait.
///
/// Implementations must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Uploads a blob, replacing any existing content.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    async fn put(&self, key: &BlobKey, data: Bytes) -> BlobResult<()>;

    /// Uploads a blob only if no blob exists at `key`.
    ///
    /// Returns `false` without touching the existing blob if one is present.
    /// The check and the write are atomic with respect to other callers.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    async fn put_if_absent(&self, key: &BlobKey, data: Bytes) -> BlobResult<bool>;

    /// Downloads a blob.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the blob doesn't exist, or an error if the
    /// download fails.
    async fn get(&self, key: &BlobKey) -> BlobResult<Bytes>;

    /// Checks if a blob exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the check fails.
    async fn exists(&self, key: &BlobKey) -> BlobResult<bool>;
}

#[async_trait]
impl<O: ObjectStorage + ?Sized> ObjectStorage for Arc<O> {
    async fn put(&self, key: &BlobKey, data: Bytes) -> BlobResult<()> {
        (**self).put(key, data).await
    }

    async fn put_if_absent(&self, key: &BlobKey, data: Bytes) -> BlobResult<bool> {
        (**self).put_if_absent(key, data).await
    }

    async fn get(&self, key: &BlobKey) -> BlobResult<Bytes> {
        (**self).get(key).await
    }

    async fn exists(&self, key: &BlobKey) -> BlobResult<bool> {
        (**self).exists(key).await
    }
}

// -----------------------------------------------------------------------------
// Fault Configuration
// -----------------------------------------------------------------------------

/// Configuration for fault injection in simulated object storage.
#[derive(Debug, Clone, Default)]
pub struct ObjectStorageFaultConfig {
    /// Probability of put (and put-if-absent) failing. Range: 0.0 - 1.0.
    pub put_fail_rate: f64,
    /// Probability of get failing. Range: 0.0 - 1.0.
    pub get_fail_rate: f64,
    /// Extra latency added to every operation, in milliseconds.
    pub latency_ms: u64,
    /// If true, next put will fail (one-shot).
    pub force_put_fail: bool,
    /// If true, next get will fail (one-shot).
    pub force_get_fail: bool,
    /// If true, next get returns bytes that are not a valid document (one-shot).
    pub force_get_garbage: bool,
}

impl ObjectStorageFaultConfig {
    /// Creates a fault config with no faults.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a fault config that simulates a flaky blob service.
    #[must_use]
    pub fn flaky() -> Self {
        Self {
            put_fail_rate: 0.02,
            get_fail_rate: 0.02,
            ..Default::default()
        }
    }

    /// Sets the put failure rate.
    ///
    /// # Panics
    ///
    /// Panics if rate is not in range 0.0..=1.0.
    #[must_use]
    pub fn with_put_fail_rate(mut self, rate: f64) -> Self {
        assert!((0.0..=1.0).contains(&rate), "rate must be in 0.0..=1.0");
        self.put_fail_rate = rate;
        self
    }

    /// Sets the get failure rate.
    ///
    /// # Panics
    ///
    /// Panics if rate is not in range 0.0..=1.0.
    #[must_use]
    pub fn with_get_fail_rate(mut self, rate: f64) -> Self {
        assert!((0.0..=1.0).contains(&rate), "rate must be in 0.0..=1.0");
        self.get_fail_rate = rate;
        self
    }

    /// Sets the per-operation latency.
    #[must_use]
    pub const fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

// -----------------------------------------------------------------------------
// SimulatedObjectStorage
// -----------------------------------------------------------------------------

/// In-memory simulated object storage for deterministic testing.
///
/// # Determinism
///
/// Fault injection hashes the seed with an operation counter, so the same
/// seed yields the same failures across runs.
///
/// # Cloning
///
/// Clones share the same underlying blobs (via `Arc`).
#[derive(Debug, Clone)]
pub struct SimulatedObjectStorage {
    blobs: Arc<Mutex<HashMap<BlobKey, Bytes>>>,
    fault_config: Arc<Mutex<ObjectStorageFaultConfig>>,
    seed: u64,
    counter: Arc<AtomicU64>,
}

impl SimulatedObjectStorage {
    /// Creates a new simulated storage with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_faults(seed, ObjectStorageFaultConfig::none())
    }

    /// Creates a new simulated storage with fault injection enabled.
    #[must_use]
    pub fn with_faults(seed: u64, config: ObjectStorageFaultConfig) -> Self {
        Self {
            blobs: Arc::new(Mutex::new(HashMap::new())),
            fault_config: Arc::new(Mutex::new(config)),
            seed,
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns a reference to the fault configuration for modification.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn fault_config(&self) -> std::sync::MutexGuard<'_, ObjectStorageFaultConfig> {
        self.fault_config.lock().expect("fault config lock poisoned")
    }

    /// Gets the raw blob content for inspection in tests.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn get_raw_content(&self, key: &BlobKey) -> Option<Bytes> {
        let blobs = self.blobs.lock().expect("blobs lock poisoned");
        blobs.get(key).cloned()
    }

    /// Sets raw blob content directly (for simulating pre-existing data).
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn set_raw_content(&self, key: &BlobKey, content: impl Into<Bytes>) {
        let mut blobs = self.blobs.lock().expect("blobs lock poisoned");
        blobs.insert(key.clone(), content.into());
    }

    /// Returns the number of blobs stored.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn blob_count(&self) -> usize {
        let blobs = self.blobs.lock().expect("blobs lock poisoned");
        blobs.len()
    }

    /// Deterministic RNG based on seed and counter.
    fn should_inject_fault(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let hash = self.seed.wrapping_add(counter).wrapping_mul(0x5851_f42d_4c95_7f2d);
        #[allow(clippy::cast_precision_loss)]
        let normalized = (hash as f64) / (u64::MAX as f64);
        normalized < rate
    }

    async fn simulate_latency(&self) {
        let latency_ms = self.fault_config().latency_ms;
        if latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(latency_ms)).await;
        }
    }

    fn check_put_fault(&self, key: &BlobKey) -> BlobResult<()> {
        let mut config = self.fault_config();
        if std::mem::take(&mut config.force_put_fail) {
            return Err(BlobError::UploadFailed {
                key: key.to_string(),
                message: "simulated upload failure (forced)".to_string(),
            });
        }
        let rate = config.put_fail_rate;
        drop(config);

        if self.should_inject_fault(rate) {
            return Err(BlobError::UploadFailed {
                key: key.to_string(),
                message: "simulated upload failure (random)".to_string(),
            });
        }
        Ok(())
    }
}

#[allow(clippy::significant_drop_tightening)]
#[async_trait]
impl ObjectStorage for SimulatedObjectStorage {
    async fn put(&self, key: &BlobKey, data: Bytes) -> BlobResult<()> {
        self.simulate_latency().await;
        self.check_put_fault(key)?;

        let mut blobs = self.blobs.lock().expect("blobs lock poisoned");
        let data_len = data.len();
        blobs.insert(key.clone(), data);

        // TigerStyle: Assert postcondition.
        assert!(
            blobs.get(key).is_some_and(|v| v.len() == data_len),
            "data should be stored after put"
        );
        Ok(())
    }

    async fn put_if_absent(&self, key: &BlobKey, data: Bytes) -> BlobResult<bool> {
        self.simulate_latency().await;
        self.check_put_fault(key)?;

        let mut blobs = self.blobs.lock().expect("blobs lock poisoned");
        if blobs.contains_key(key) {
            return Ok(false);
        }
        blobs.insert(key.clone(), data);
        Ok(true)
    }

    async fn get(&self, key: &BlobKey) -> BlobResult<Bytes> {
        self.simulate_latency().await;

        let mut config = self.fault_config();
        if std::mem::take(&mut config.force_get_fail) {
            return Err(BlobError::DownloadFailed {
                key: key.to_string(),
                message: "simulated download failure (forced)".to_string(),
            });
        }
        let garbage = std::mem::take(&mut config.force_get_garbage);
        let rate = config.get_fail_rate;
        drop(config);

        if self.should_inject_fault(rate) {
            return Err(BlobError::DownloadFailed {
                key: key.to_string(),
                message: "simulated download failure (random)".to_string(),
            });
        }

        let blobs = self.blobs.lock().expect("blobs lock poisoned");
        let data = blobs.get(key).cloned().ok_or_else(|| BlobError::NotFound {
            key: key.to_string(),
        })?;
        if garbage {
            return Ok(Bytes::from_static(b"\xff\xfe not a document"));
        }
        Ok(data)
    }

    async fn exists(&self, key: &BlobKey) -> BlobResult<bool> {
        self.simulate_latency().await;
        let blobs = self.blobs.lock().expect("blobs lock poisoned");
        Ok(blobs.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> BlobKey {
        BlobKey::new("hub", "$Default/0")
    }

    #[test]
    fn test_blob_key_display() {
        assert_eq!(key().to_string(), "hub/$Default/0");
        assert_eq!(key().container(), "hub");
        assert_eq!(key().name(), "$Default/0");
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let storage = SimulatedObjectStorage::new(42);
        storage.put(&key(), Bytes::from("lease")).await.unwrap();
        assert_eq!(storage.get(&key()).await.unwrap(), Bytes::from("lease"));
        assert!(storage.exists(&key()).await.unwrap());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let storage = SimulatedObjectStorage::new(42);
        let result = storage.get(&key()).await;
        assert!(matches!(result, Err(BlobError::NotFound { .. })));
        assert!(!storage.exists(&key()).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_if_absent_keeps_existing() {
        let storage = SimulatedObjectStorage::new(42);
        assert!(storage
            .put_if_absent(&key(), Bytes::from("first"))
            .await
            .unwrap());
        assert!(!storage
            .put_if_absent(&key(), Bytes::from("second"))
            .await
            .unwrap());
        assert_eq!(storage.get_raw_content(&key()).unwrap(), Bytes::from("first"));
        assert_eq!(storage.blob_count(), 1);
    }

    #[tokio::test]
    async fn test_forced_failures_are_one_shot() {
        let storage = SimulatedObjectStorage::new(42);
        storage.set_raw_content(&key(), "data");

        storage.fault_config().force_get_fail = true;
        assert!(matches!(
            storage.get(&key()).await,
            Err(BlobError::DownloadFailed { .. })
        ));
        assert!(storage.get(&key()).await.is_ok());

        storage.fault_config().force_put_fail = true;
        assert!(storage.put(&key(), Bytes::from("x")).await.is_err());
        assert!(storage.put(&key(), Bytes::from("x")).await.is_ok());
    }

    #[tokio::test]
    async fn test_deterministic_faults() {
        let config = ObjectStorageFaultConfig::none().with_put_fail_rate(0.5);
        let a = SimulatedObjectStorage::with_faults(99, config.clone());
        let b = SimulatedObjectStorage::with_faults(99, config);

        let mut ra = Vec::new();
        let mut rb = Vec::new();
        for i in 0..20 {
            let k = BlobKey::new("hub", format!("g/{i}"));
            ra.push(a.put(&k, Bytes::from("x")).await.is_ok());
            rb.push(b.put(&k, Bytes::from("x")).await.is_ok());
        }
        assert_eq!(ra, rb);
    }
}
