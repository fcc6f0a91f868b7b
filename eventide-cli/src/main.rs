//! Eventide command-line tool.
//!
//! Inspects and manages partition checkpoint leases kept in a filesystem
//! blob store, and runs a simulated consume demo against the same store.
//!
//! # Inspect a lease
//!
//! ```bash
//! eventide inspect --store ./leases --hub telemetry --partition 0
//! ```
//!
//! # Demo
//!
//! Publishes events to an in-memory hub and consumes every partition on its
//! own task, checkpointing into `--store`. Running it again resumes after
//! the persisted offsets:
//!
//! ```bash
//! eventide demo --store ./leases --partitions 4 --events 20 --stop-after 10 --interval 5
//! eventide demo --store ./leases --partitions 4 --events 20 --stop-after 10 --interval 5
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use eventide_blob::{BlobRecordStore, BlobStoreConfig, FilesystemConfig, FilesystemObjectStorage};
use eventide_checkpoint::{Checkpoint, PartitionKey, PartitionRecord, RecordStore};
use eventide_client::{
    spawn_receive_loop, ConnectionConfig, EventHubClient, ReceiverConfig, SimulatedHub,
    SimulatedHubConfig,
};
use eventide_core::{ConsumerGroup, EventData, PartitionId, StreamId};
use tokio::time::Instant;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

type LeaseStore = BlobRecordStore<FilesystemObjectStorage>;

/// Eventide checkpoint tool.
#[derive(Parser, Debug)]
#[command(name = "eventide")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the stored lease for a partition.
    Inspect(LeaseArgs),
    /// Create the lease if absent, then print it.
    Init(LeaseArgs),
    /// Move the lease back to the start of the partition.
    Reset(LeaseArgs),
    /// Publish to a simulated hub and consume it with checkpointing.
    Demo(DemoArgs),
}

/// Identifies one lease in a filesystem store.
#[derive(Args, Debug)]
struct LeaseArgs {
    /// Directory holding the lease blobs.
    #[arg(long)]
    store: PathBuf,

    /// Hub (stream) name.
    #[arg(long)]
    hub: StreamId,

    /// Consumer group.
    #[arg(long, default_value = "$Default")]
    group: ConsumerGroup,

    /// Partition id.
    #[arg(long)]
    partition: u64,
}

impl LeaseArgs {
    fn key(&self) -> PartitionKey {
        PartitionKey::new(
            self.hub.clone(),
            self.group.clone(),
            PartitionId::new(self.partition),
        )
    }
}

#[derive(Args, Debug)]
struct DemoArgs {
    /// Directory holding the lease blobs.
    #[arg(long)]
    store: PathBuf,

    /// Hub (stream) name.
    #[arg(long, default_value = "demo")]
    hub: StreamId,

    /// Consumer group.
    #[arg(long, default_value = "$Default")]
    group: ConsumerGroup,

    /// Number of partitions.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..=1024))]
    partitions: u32,

    /// Events published per partition.
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(0..=100_000))]
    events: u32,

    /// Deliveries per partition before the loop stops.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    stop_after: u64,

    /// Checkpoint every this many deliveries.
    #[arg(long, default_value_t = 5)]
    interval: u32,

    /// How long to wait for partitions that run out of events.
    #[arg(long, default_value_t = 500)]
    idle_timeout_ms: u64,
}

async fn open_store(path: PathBuf) -> Result<LeaseStore, Box<dyn std::error::Error>> {
    let storage = FilesystemObjectStorage::new(FilesystemConfig::new(path)).await?;
    Ok(BlobRecordStore::new(storage, BlobStoreConfig::new()))
}

fn print_record(key: &PartitionKey, record: &PartitionRecord) {
    println!(
        "{key} offset={} seq_no={} epoch={} owner={} token={:?}",
        record.offset, record.sequence_number, record.epoch, record.owner, record.token
    );
}

async fn inspect(args: LeaseArgs) -> Result<(), Box<dyn std::error::Error>> {
    let key = args.key();
    let store = open_store(args.store).await?;
    let record = store.read(&key).await?;
    print_record(&key, &record);
    Ok(())
}

async fn init(args: LeaseArgs) -> Result<(), Box<dyn std::error::Error>> {
    let key = args.key();
    let store = open_store(args.store).await?;
    let created = store.create_if_absent(&key).await?;
    info!(key = %key, created, "Lease initialised");
    print_record(&key, &store.read(&key).await?);
    Ok(())
}

async fn reset(args: LeaseArgs) -> Result<(), Box<dyn std::error::Error>> {
    let key = args.key();
    let store = open_store(args.store).await?;
    let current = store.read(&key).await?;
    let record = current.with_checkpoint(&Checkpoint::beginning(key.partition));
    store.write(&key, &record).await?;
    info!(
        key = %key,
        previous_offset = %current.offset,
        previous_sequence = current.sequence_number.get(),
        "Lease reset"
    );
    print_record(&key, &record);
    Ok(())
}

async fn demo(args: DemoArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(open_store(args.store).await?);
    let hub = SimulatedHub::new(SimulatedHubConfig::new(args.hub.clone(), args.partitions));
    let client = EventHubClient::new(ConnectionConfig::new("local", args.hub.clone()), hub);

    // Unkeyed sends go round-robin, so each partition gets `events` events
    // with identical offsets on every run.
    let sender = client.create_sender().await?;
    let total = args
        .events
        .checked_mul(args.partitions)
        .ok_or("demo event count overflows u32")?;
    for i in 0..total {
        let event = EventData::new(Bytes::from(format!("event-{i:06}")))
            .with_message_id(format!("demo-{i}"));
        sender.send(event).await?;
    }
    info!(
        hub = %args.hub,
        partitions = args.partitions,
        events = args.events,
        "Published demo events"
    );

    let config = ReceiverConfig::from_checkpoint()
        .with_consumer_group(args.group.clone())
        .with_checkpoint_interval(args.interval);
    config.validate()?;

    let mut handles = Vec::new();
    for partition in 0..u64::from(args.partitions) {
        let receiver = client
            .create_receiver(PartitionId::new(partition), &config, Some(Arc::clone(&store)))
            .await?;
        let stop_after = args.stop_after;
        let mut delivered = 0u64;
        let handle = spawn_receive_loop(receiver, move |event| {
            delivered += 1;
            debug!(
                partition = event.partition_id.get(),
                offset = %event.offset,
                sequence_number = event.sequence_number.get(),
                "Delivered"
            );
            if delivered >= stop_after {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        handles.push((partition, handle));
    }

    // A partition with fewer than `stop_after` unread events never breaks
    // out of its loop; give up on it once the hub has gone quiet.
    let deadline = Instant::now() + Duration::from_millis(args.idle_timeout_ms);
    let mut summaries = Vec::new();
    for (partition, mut handle) in handles {
        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(result) => summaries.push(result??),
            Err(_) => {
                warn!(partition, "Partition drained before stop-after, stopping loop");
                handle.abort();
            }
        }
    }

    for summary in &summaries {
        println!(
            "partition={} delivered={} checkpoint_seq_no={} failures={}",
            summary.partition_id.get(),
            summary.delivered,
            summary
                .checkpoint
                .as_ref()
                .map_or(-1, |c| c.sequence_number.get()),
            summary.stats.checkpoint_failures
        );
    }
    for partition in 0..u64::from(args.partitions) {
        let key = PartitionKey::new(args.hub.clone(), args.group.clone(), PartitionId::new(partition));
        print_record(&key, &store.read(&key).await?);
    }

    client.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Command::Inspect(args) => inspect(args).await,
        Command::Init(args) => init(args).await,
        Command::Reset(args) => reset(args).await,
        Command::Demo(args) => demo(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventide_core::{Offset, SequenceNumber};

    #[test]
    fn test_lease_args_defaults_to_default_group() {
        let cli = Cli::try_parse_from([
            "eventide", "inspect", "--store", "/tmp/leases", "--hub", "telemetry", "--partition", "3",
        ])
        .unwrap();
        let Command::Inspect(args) = cli.command else {
            panic!("expected inspect");
        };
        let key = args.key();
        assert_eq!(key.group.as_str(), "$Default");
        assert_eq!(key.partition, PartitionId::new(3));
        assert_eq!(cli.log_level, Level::INFO);
    }

    #[test]
    fn test_demo_event_count_is_bounded() {
        let parse = |events: &str| {
            Cli::try_parse_from([
                "eventide", "demo", "--store", "/tmp/leases", "--partitions", "1024", "--events",
                events,
            ])
        };
        assert!(parse("5000000").is_err());

        let cli = parse("100000").unwrap();
        let Command::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert!(args.events.checked_mul(args.partitions).is_some());
    }

    #[test]
    fn test_invalid_hub_name_rejected() {
        let result = Cli::try_parse_from([
            "eventide", "init", "--store", "/tmp/leases", "--hub", "a/b", "--partition", "0",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_init_then_reset() {
        let dir = tempfile::tempdir().unwrap();
        let args = || LeaseArgs {
            store: dir.path().to_path_buf(),
            hub: StreamId::new("telemetry").unwrap(),
            group: ConsumerGroup::default_group(),
            partition: 1,
        };
        init(args()).await.unwrap();

        let key = args().key();
        let store = open_store(dir.path().to_path_buf()).await.unwrap();
        let advanced = PartitionRecord::initial(key.partition, "worker-a").with_checkpoint(
            &Checkpoint::new(key.partition, Offset::new("4096"), SequenceNumber::new(42)),
        );
        store.write(&key, &advanced).await.unwrap();

        reset(args()).await.unwrap();
        let record = store.read(&key).await.unwrap();
        assert!(record.offset.is_beginning());
        assert_eq!(record.sequence_number.get(), 0);
        assert_eq!(record.owner, "worker-a");
    }
}
