//! Event sender.

use std::sync::Arc;
use std::time::Duration;

use eventide_core::EventData;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{TransportError, TransportResult};
use crate::transport::{EventSink, SendReceipt};

/// Sends events to the hub.
///
/// Cheap to clone; clones share the underlying link.
#[derive(Debug)]
pub struct Sender<K: EventSink> {
    sink: Arc<K>,
    address: String,
}

impl<K: EventSink> Clone for Sender<K> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            address: self.address.clone(),
        }
    }
}

impl<K: EventSink> Sender<K> {
    pub(crate) fn new(sink: K, address: String) -> Self {
        Self {
            sink: Arc::new(sink),
            address,
        }
    }

    /// Returns the target address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sends `event` and waits for the acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` if the event exceeds the payload bound, or the
    /// transport error if the send fails.
    pub async fn send(&self, event: EventData) -> TransportResult<SendReceipt> {
        send_checked(&*self.sink, event).await
    }

    /// Like [`send`](Self::send), bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if no acknowledgment arrives in time. The event may
    /// still have been appended.
    pub async fn send_timeout(
        &self,
        event: EventData,
        timeout: Duration,
    ) -> TransportResult<SendReceipt> {
        tokio::time::timeout(timeout, self.send(event))
            .await
            .map_err(|_| TransportError::Timeout {
                operation: "send",
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })?
    }

    /// Sends `event` on a background task and returns a channel that yields
    /// the outcome.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn send_async(&self, event: EventData) -> oneshot::Receiver<TransportResult<SendReceipt>> {
        let (tx, rx) = oneshot::channel();
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            let outcome = send_checked(&*sink, event).await;
            // The caller may have dropped the receiver.
            let _ = tx.send(outcome);
        });
        rx
    }
}

async fn send_checked<K: EventSink>(sink: &K, event: EventData) -> TransportResult<SendReceipt> {
    event.validate().map_err(|e| TransportError::Rejected {
        reason: e.to_string(),
    })?;
    let message_id = event.message_id.clone();
    let receipt = sink.send(event).await?;
    debug!(
        partition = receipt.partition_id.get(),
        offset = %receipt.offset,
        sequence_number = receipt.sequence_number.get(),
        message_id = message_id.as_deref().unwrap_or(""),
        "Sent event"
    );
    Ok(receipt)
}
