//! Seeded fault-injection runs of the checkpoint protocol.
//!
//! Several controllers (standing in for consumers that lost and regained
//! the same partition) push out-of-order candidates through a flaky record
//! store. Whatever fails, the stored sequence number must never go
//! backwards and must end at the largest value any write carried.

#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::unreadable_literal)]

use std::num::NonZeroU32;
use std::sync::Arc;

use eventide_checkpoint::{
    CadenceGate, CadenceOutcome, CheckpointController, RecordStore, RecordStoreFaultConfig,
    SimulatedRecordStore,
};
use eventide_core::{Offset, SequenceNumber};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::properties::CheckpointHistory;
use crate::scenarios::{partition_key, received_event};

const SEEDS: [u64; 8] = [0, 1, 42, 123, 999, 4242, 12345, 987654321];
const OPERATIONS_PER_SEED: usize = 400;

#[tokio::test]
async fn test_dst_checkpoint_competing_controllers_flaky_store() {
    for seed in SEEDS {
        let store = Arc::new(SimulatedRecordStore::with_faults(
            seed,
            RecordStoreFaultConfig::flaky().with_write_fail_rate(0.2),
        ));
        let key = partition_key("payments", "$Default", 4);

        // Creation may itself fail under faults; retry until it lands.
        while store.create_if_absent(&key).await.is_err() {}

        let mut controllers: Vec<_> = (0..3)
            .map(|_| CheckpointController::new(key.clone(), Arc::clone(&store)))
            .collect();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut history = CheckpointHistory::new();
        let mut failures = 0u64;

        for _ in 0..OPERATIONS_PER_SEED {
            let controller = &mut controllers[rng.gen_range(0..3)];
            let seq: i64 = rng.gen_range(0..1_000);
            match controller
                .advance(Offset::new(format!("{}", seq * 64)), SequenceNumber::new(seq))
                .await
            {
                Ok(outcome) if outcome.is_written() => {
                    history.observe_written(SequenceNumber::new(seq));
                }
                Ok(_) => {}
                Err(_) => failures += 1,
            }
            history.observe_stored(store.record(&key).unwrap().sequence_number);
        }

        history
            .check_all()
            .unwrap_or_else(|violation| panic!("seed {seed}: {violation}"));
        assert!(failures > 0, "seed {seed}: fault injection never fired");

        let record = store.record(&key).unwrap();
        assert_eq!(
            record.offset.as_str(),
            (record.sequence_number.get() * 64).to_string(),
            "seed {seed}: offset and sequence number written together"
        );
    }
}

#[tokio::test]
async fn test_dst_cadence_delivery_survives_flaky_store() {
    for seed in SEEDS {
        let store = Arc::new(SimulatedRecordStore::with_faults(
            seed,
            RecordStoreFaultConfig::flaky(),
        ));
        let key = partition_key("payments", "$Default", 0);
        while store.create_if_absent(&key).await.is_err() {}

        let mut controller = CheckpointController::new(key.clone(), Arc::clone(&store));
        let mut gate = CadenceGate::new(NonZeroU32::new(5).unwrap());
        let mut history = CheckpointHistory::new();
        let mut instants = 0u64;

        for seq in 1..=OPERATIONS_PER_SEED as i64 {
            let event = received_event(key.partition, &seq.to_string(), seq);
            match gate.on_delivered(&event, &mut controller).await {
                CadenceOutcome::Skipped => {}
                CadenceOutcome::Advanced(outcome) => {
                    instants += 1;
                    assert!(outcome.is_written(), "seed {seed}: single consumer never stale");
                    history.observe_written(outcome.checkpoint().sequence_number);
                }
                CadenceOutcome::Failed(_) => instants += 1,
            }
            history.observe_stored(store.record(&key).unwrap().sequence_number);
        }

        // Every delivery was counted and every fifth one was an instant,
        // failed or not.
        assert_eq!(gate.delivered(), OPERATIONS_PER_SEED as u64, "seed {seed}");
        assert_eq!(instants, OPERATIONS_PER_SEED as u64 / 5, "seed {seed}");
        history
            .check_all()
            .unwrap_or_else(|violation| panic!("seed {seed}: {violation}"));

        let stored = store.record(&key).unwrap().sequence_number.get();
        assert_eq!(stored % 5, 0, "seed {seed}: only instants are persisted");
    }
}
