//! Eventide Tests - integration and simulation tests for Eventide.
//!
//! Unit tests live inline in each crate. This crate holds the tests that
//! span crates: the checkpoint protocol driven end to end through the client,
//! blob-backed stores, and seeded fault-injection runs.
//!
//! ## Test Organization
//!
//! **DST Tests** (`*_dst.rs`): Deterministic simulation with fault injection
//! - `checkpoint_dst`: Controller and cadence against flaky record stores
//!
//! **Integration Tests** (`*_tests.rs`): Multi-component integration
//! - `checkpoint_tests`: Monotonicity, idempotence and cadence properties
//! - `resume_tests`: Start-position selection and restart behaviour
//! - `blob_store_tests`: Lease persistence through the blob stores
//!
//! **Support Modules**:
//! - `properties`: Checkpoint invariants and their checkers
//! - `scenarios`: Reusable fixtures (keys, events, simulated hubs)
//!
//! ## Naming Conventions
//!
//! - DST tests: `test_dst_<component>_<scenario>`
//! - Integration tests: `test_<component>_<scenario>`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod properties;
pub mod scenarios;

// DST test modules (deterministic simulation with fault injection).
#[cfg(test)]
mod checkpoint_dst;
