//! Hub client.
//!
//! Entry point of the outward API: builds partition receivers (running
//! resume selection once per receiver) and senders over a [`Transport`].

use std::sync::Arc;

use eventide_checkpoint::{
    CadenceGate, CheckpointController, NoRecordStore, PartitionKey, RecordStore, ResumeSelector,
};
use eventide_core::{PartitionId, StreamId};
use tracing::info;

use crate::config::{ConnectionConfig, ReceiverConfig};
use crate::error::{ClientResult, ConfigError};
use crate::receiver::PartitionReceiver;
use crate::sender::Sender;
use crate::transport::{ReceiverLink, Transport};

/// A connection to one hub.
#[derive(Debug)]
pub struct EventHubClient<T: Transport> {
    connection: ConnectionConfig,
    transport: Arc<T>,
}

impl<T: Transport> Clone for EventHubClient<T> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> EventHubClient<T> {
    /// Creates a client over an established transport.
    #[must_use]
    pub fn new(connection: ConnectionConfig, transport: T) -> Self {
        Self {
            connection,
            transport: Arc::new(transport),
        }
    }

    /// Returns the connection settings.
    #[must_use]
    pub const fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    /// Returns the hub name.
    #[must_use]
    pub const fn hub(&self) -> &StreamId {
        &self.connection.hub
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Builds a receiver for `partition`.
    ///
    /// Validates `config`, selects the start position (creating the
    /// partition record if absent in `FromCheckpoint` mode), then attaches
    /// the receive link.
    ///
    /// # Errors
    ///
    /// - `Config` if `config` is invalid, or `FromCheckpoint` is selected
    ///   with no `store`
    /// - `Checkpoint` if the partition record can't be created or read
    /// - `Transport` if the link can't be attached
    pub async fn create_receiver<S: RecordStore>(
        &self,
        partition: PartitionId,
        config: &ReceiverConfig,
        store: Option<Arc<S>>,
    ) -> ClientResult<PartitionReceiver<T::Source, S>> {
        let (mode, interval) = config.resolve()?;
        if mode.uses_store() && store.is_none() {
            return Err(ConfigError::MissingRecordStore.into());
        }

        let key = PartitionKey::new(
            self.connection.hub.clone(),
            config.consumer_group.clone(),
            partition,
        );
        let position = ResumeSelector::with_store(store.clone())
            .select_start(&key, &mode)
            .await?;

        let link = ReceiverLink {
            address: self
                .connection
                .receive_address(&config.consumer_group, partition),
            filter: position.filter,
            prefetch_count: config.prefetch_count,
        };
        let source = self.transport.attach_receiver(&link).await?;

        let controller = match (mode.uses_store(), store) {
            (true, Some(store)) => {
                let controller = CheckpointController::new(key.clone(), store);
                Some(match position.checkpoint.clone() {
                    Some(checkpoint) => controller.with_last_persisted(checkpoint),
                    None => controller,
                })
            }
            _ => None,
        };

        info!(
            key = %key,
            address = %link.address,
            filter = %link.filter,
            checkpoint_interval = interval.get(),
            "Receiver attached"
        );
        Ok(PartitionReceiver::new(
            key,
            mode,
            source,
            CadenceGate::new(interval),
            controller,
            position.checkpoint,
        ))
    }

    /// Builds a receiver that never touches a record store.
    ///
    /// # Errors
    ///
    /// Returns `Config(MissingRecordStore)` unless `config` selects
    /// `FromWallClockTime`, otherwise as [`create_receiver`](Self::create_receiver).
    pub async fn create_ephemeral_receiver(
        &self,
        partition: PartitionId,
        config: &ReceiverConfig,
    ) -> ClientResult<PartitionReceiver<T::Source, NoRecordStore>> {
        self.create_receiver::<NoRecordStore>(partition, config, None)
            .await
    }

    /// Attaches a sender targeting the hub.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the link can't be attached.
    pub async fn create_sender(&self) -> ClientResult<Sender<T::Sink>> {
        let address = self.connection.send_address();
        let sink = self.transport.attach_sender(&address).await?;
        Ok(Sender::new(sink, address))
    }

    /// Closes the connection.
    pub async fn close(&self) {
        info!(hub = %self.connection.hub, "Closing connection");
        self.transport.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientError, TransportError};
    use crate::simulated::{SimulatedHub, SimulatedHubConfig};
    use crate::spawn_receive_loop;
    use bytes::Bytes;
    use eventide_checkpoint::{
        Checkpoint, RecordStoreFaultConfig, SimulatedRecordStore, StartFilter,
    };
    use eventide_core::{ConsumerGroup, EventData, Offset, ReceivedEvent, SequenceNumber, Timestamp};
    use std::ops::ControlFlow;
    use std::time::Duration;

    fn setup(partitions: u32) -> (SimulatedHub, EventHubClient<SimulatedHub>) {
        let hub_name = StreamId::new("telemetry").unwrap();
        let hub = SimulatedHub::new(SimulatedHubConfig::new(hub_name.clone(), partitions));
        let client = EventHubClient::new(ConnectionConfig::new("contoso", hub_name), hub.clone());
        (hub, client)
    }

    fn publish(hub: &SimulatedHub, partition: u64, count: usize) {
        for i in 0..count {
            hub.append(
                PartitionId::new(partition),
                EventData::new(Bytes::from(format!("event-{i:03}"))),
            )
            .unwrap();
        }
    }

    fn key(partition: u64) -> PartitionKey {
        PartitionKey::new(
            StreamId::new("telemetry").unwrap(),
            ConsumerGroup::default(),
            PartitionId::new(partition),
        )
    }

    #[tokio::test]
    async fn test_missing_resume_mode_is_config_error() {
        let (_hub, client) = setup(1);
        let store = Arc::new(SimulatedRecordStore::new(1));

        let err = client
            .create_receiver(PartitionId::new(0), &ReceiverConfig::new(), Some(store.clone()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::Config(ConfigError::InvalidResumeMode)
        ));
        assert!(store.record(&key(0)).is_none());
    }

    #[tokio::test]
    async fn test_from_checkpoint_requires_store() {
        let (_hub, client) = setup(1);
        let err = client
            .create_ephemeral_receiver(PartitionId::new(0), &ReceiverConfig::from_checkpoint())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Config(ConfigError::MissingRecordStore)
        ));
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_receiver_creates_record_and_checkpoints() {
        let (hub, client) = setup(1);
        publish(&hub, 0, 10);
        let store = Arc::new(SimulatedRecordStore::new(1));
        let config = ReceiverConfig::from_checkpoint().with_checkpoint_interval(3);

        let mut receiver = client
            .create_receiver(PartitionId::new(0), &config, Some(store.clone()))
            .await
            .unwrap();
        assert_eq!(
            receiver.current_checkpoint(),
            Some(&Checkpoint::beginning(PartitionId::new(0)))
        );

        let mut seen = Vec::new();
        let summary = receiver
            .receive_loop(|event| {
                seen.push(event.sequence_number.get());
                if seen.len() == 10 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .await
            .unwrap();

        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert_eq!(summary.delivered, 10);
        assert_eq!(summary.stats.checkpoints_advanced, 3);
        assert_eq!(store.write_count(), 3);

        // Instants at the 3rd, 6th and 9th event: sequence number 8.
        let record = store.record(&key(0)).unwrap();
        assert_eq!(record.sequence_number, SequenceNumber::new(8));
        assert_eq!(summary.checkpoint.unwrap().sequence_number, SequenceNumber::new(8));
    }

    #[tokio::test]
    async fn test_restart_resumes_after_persisted_offset() {
        let (hub, client) = setup(1);
        publish(&hub, 0, 6);
        let store = Arc::new(SimulatedRecordStore::new(1));
        let config = ReceiverConfig::from_checkpoint().with_checkpoint_interval(2);

        let mut first = client
            .create_receiver(PartitionId::new(0), &config, Some(store.clone()))
            .await
            .unwrap();
        for _ in 0..5 {
            first.receive_one(|_| ()).await.unwrap();
        }
        let persisted = first.current_checkpoint().cloned().unwrap();
        assert_eq!(persisted.sequence_number, SequenceNumber::new(3));
        drop(first);

        let mut second = client
            .create_receiver(PartitionId::new(0), &config, Some(store.clone()))
            .await
            .unwrap();
        assert_eq!(second.current_checkpoint(), Some(&persisted));

        // Event 4 was delivered but never checkpointed, so it is redelivered.
        let event = second.receive_one(ReceivedEvent::clone).await.unwrap();
        assert_eq!(event.sequence_number, SequenceNumber::new(4));
        assert_eq!(store.creation_count(), 1);
    }

    #[tokio::test]
    async fn test_wall_clock_receiver_keeps_checkpoint_in_memory() {
        let (hub, client) = setup(1);
        publish(&hub, 0, 2);
        hub.advance_clock(Duration::from_secs(60));
        let start = hub.now();
        publish(&hub, 0, 4);

        let config = ReceiverConfig::from_wall_clock_time(start).with_checkpoint_interval(2);
        let mut receiver = client
            .create_ephemeral_receiver(PartitionId::new(0), &config)
            .await
            .unwrap();
        assert!(receiver.current_checkpoint().is_none());

        let first = receiver.receive_one(ReceivedEvent::clone).await.unwrap();
        assert_eq!(first.sequence_number, SequenceNumber::new(2));
        assert!(first.enqueued_time >= start);
        assert!(receiver.current_checkpoint().is_none());

        receiver.receive_one(|_| ()).await.unwrap();
        assert_eq!(
            receiver.current_checkpoint().unwrap().sequence_number,
            SequenceNumber::new(3)
        );
    }

    #[tokio::test]
    async fn test_wall_clock_mode_ignores_broken_store() {
        let (hub, client) = setup(1);
        publish(&hub, 0, 3);
        let store = Arc::new(SimulatedRecordStore::with_faults(
            1,
            RecordStoreFaultConfig::unavailable(),
        ));
        let config = ReceiverConfig::from_wall_clock_time(Timestamp::from_millis(0))
            .with_checkpoint_interval(1);

        let mut receiver = client
            .create_receiver(PartitionId::new(0), &config, Some(store.clone()))
            .await
            .unwrap();
        for _ in 0..3 {
            receiver.receive_one(|_| ()).await.unwrap();
        }
        assert_eq!(receiver.stats().checkpoint_failures, 0);
        assert!(store.record(&key(0)).is_none());
    }

    #[tokio::test]
    async fn test_checkpoint_failure_does_not_stop_delivery() {
        let (hub, client) = setup(1);
        publish(&hub, 0, 6);
        let store = Arc::new(SimulatedRecordStore::new(1));
        let config = ReceiverConfig::from_checkpoint().with_checkpoint_interval(2);

        let mut receiver = client
            .create_receiver(PartitionId::new(0), &config, Some(store.clone()))
            .await
            .unwrap();
        store.fault_config().write_fail_rate = 1.0;

        let mut delivered = 0;
        let summary = receiver
            .receive_loop(|_| {
                delivered += 1;
                if delivered == 6 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .await
            .unwrap();

        assert_eq!(summary.delivered, 6);
        assert_eq!(summary.stats.checkpoint_failures, 3);
        assert!(store.record(&key(0)).unwrap().offset.is_beginning());
    }

    #[tokio::test]
    async fn test_checkpoint_now() {
        let (hub, client) = setup(1);
        publish(&hub, 0, 3);
        let store = Arc::new(SimulatedRecordStore::new(1));
        let config = ReceiverConfig::from_checkpoint().with_checkpoint_interval(100);

        let mut receiver = client
            .create_receiver(PartitionId::new(0), &config, Some(store.clone()))
            .await
            .unwrap();
        assert_eq!(receiver.checkpoint_now().await.unwrap(), None);

        receiver.receive_one(|_| ()).await.unwrap();
        receiver.receive_one(|_| ()).await.unwrap();
        let checkpoint = receiver.checkpoint_now().await.unwrap().unwrap();

        assert_eq!(checkpoint.sequence_number, SequenceNumber::new(1));
        assert_eq!(
            store.record(&key(0)).unwrap().offset,
            checkpoint.offset
        );
    }

    #[tokio::test]
    async fn test_transport_error_ends_loop() {
        let (hub, client) = setup(2);
        publish(&hub, 1, 2);
        let store = Arc::new(SimulatedRecordStore::new(1));
        let config = ReceiverConfig::from_checkpoint().with_checkpoint_interval(1);

        let mut receiver = client
            .create_receiver(PartitionId::new(1), &config, Some(store.clone()))
            .await
            .unwrap();

        let detacher = hub.clone();
        let result = receiver
            .receive_loop(|event| {
                if event.sequence_number == SequenceNumber::new(1) {
                    detacher.detach_partition(PartitionId::new(1));
                }
                ControlFlow::Continue(())
            })
            .await;

        assert_eq!(
            result,
            Err(TransportError::Detached {
                partition: PartitionId::new(1)
            })
        );
        // Both delivered events were checkpointed before the detach surfaced.
        assert_eq!(
            store.record(&key(1)).unwrap().sequence_number,
            SequenceNumber::new(1)
        );
    }

    #[tokio::test]
    async fn test_spawned_loops_run_per_partition() {
        let (hub, client) = setup(3);
        for partition in 0..3 {
            publish(&hub, partition, 5);
        }
        let store = Arc::new(SimulatedRecordStore::new(1));
        let config = ReceiverConfig::from_checkpoint().with_checkpoint_interval(5);

        let mut handles = Vec::new();
        for partition in 0..3 {
            let receiver = client
                .create_receiver(PartitionId::new(partition), &config, Some(store.clone()))
                .await
                .unwrap();
            let mut count = 0;
            handles.push(spawn_receive_loop(receiver, move |_| {
                count += 1;
                if count == 5 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }));
        }

        for handle in handles {
            let summary = handle.await.unwrap().unwrap();
            assert_eq!(summary.delivered, 5);
            assert_eq!(
                store.record(&key(summary.partition_id.get())).unwrap().offset,
                summary.checkpoint.unwrap().offset
            );
        }
    }

    #[tokio::test]
    async fn test_attach_uses_resume_filter() {
        let (hub, client) = setup(1);
        publish(&hub, 0, 3);
        let store = Arc::new(SimulatedRecordStore::new(1));
        store.create_if_absent(&key(0)).await.unwrap();
        let mut record = store.record(&key(0)).unwrap();
        record.offset = Offset::new("9");
        record.sequence_number = SequenceNumber::new(1);
        store.set_record(&key(0), record);

        let mut receiver = client
            .create_receiver(
                PartitionId::new(0),
                &ReceiverConfig::from_checkpoint(),
                Some(store),
            )
            .await
            .unwrap();
        // "event-000" is 9 bytes, so offset 9 is the second event.
        let event = receiver.receive_one(ReceivedEvent::clone).await.unwrap();
        assert_eq!(event.offset, Offset::new("18"));
        assert_eq!(
            StartFilter::AfterOffset(Offset::new("9")).to_string(),
            "amqp.annotation.x-opt-offset > '9'"
        );
    }

    #[tokio::test]
    async fn test_closed_connection_fails_receivers() {
        let (_hub, client) = setup(1);
        let config = ReceiverConfig::from_wall_clock_time(Timestamp::from_millis(0));
        let mut receiver = client
            .create_ephemeral_receiver(PartitionId::new(0), &config)
            .await
            .unwrap();

        client.close().await;
        assert_eq!(
            receiver.receive_one(|_| ()).await,
            Err(TransportError::Closed)
        );
    }
}
