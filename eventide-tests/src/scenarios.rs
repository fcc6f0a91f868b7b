//! Reusable fixtures for checkpoint scenarios.

use bytes::Bytes;
use eventide_checkpoint::PartitionKey;
use eventide_client::{ConnectionConfig, EventHubClient, SimulatedHub, SimulatedHubConfig};
use eventide_core::{
    ConsumerGroup, EventData, Offset, PartitionId, ReceivedEvent, SequenceNumber, StreamId,
    Timestamp,
};

/// Builds a partition key from plain names.
///
/// # Panics
///
/// Panics if `stream` or `group` is not a valid name.
#[must_use]
pub fn partition_key(stream: &str, group: &str, partition: u64) -> PartitionKey {
    PartitionKey::new(
        StreamId::new(stream).expect("valid stream name"),
        ConsumerGroup::new(group).expect("valid group name"),
        PartitionId::new(partition),
    )
}

/// Builds a delivered event at `offset` / `sequence_number` without a hub.
#[must_use]
pub fn received_event(partition: PartitionId, offset: &str, sequence_number: i64) -> ReceivedEvent {
    ReceivedEvent {
        partition_id: partition,
        offset: Offset::new(offset),
        sequence_number: SequenceNumber::new(sequence_number),
        enqueued_time: Timestamp::from_millis(sequence_number * 1_000),
        data: EventData::new(Bytes::from(format!("event-{sequence_number}"))),
    }
}

/// Creates a simulated hub and a client connected to it.
///
/// # Panics
///
/// Panics if `hub` is not a valid name.
#[must_use]
pub fn hub_client(hub: &str, partition_count: u32) -> (SimulatedHub, EventHubClient<SimulatedHub>) {
    let hub_id = StreamId::new(hub).expect("valid hub name");
    let sim = SimulatedHub::new(SimulatedHubConfig::new(hub_id.clone(), partition_count));
    let client = EventHubClient::new(ConnectionConfig::new("local", hub_id), sim.clone());
    (sim, client)
}

/// Appends `count` events to `partition`, bodies `"{prefix}-{i}"`.
///
/// # Panics
///
/// Panics if the hub rejects an append.
pub fn fill_partition(hub: &SimulatedHub, partition: PartitionId, prefix: &str, count: usize) {
    for i in 0..count {
        hub.append(partition, EventData::new(Bytes::from(format!("{prefix}-{i}"))))
            .expect("append to simulated hub");
    }
}
