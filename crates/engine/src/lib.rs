// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hearth-engine: the occupancy engine and its module wrapper.
//!
//! The engine is a deterministic state machine keyed by Location: per-source
//! contributions with optional expirations, lock suspension, hierarchical
//! propagation through synthetic `child:` sources, and versioned state
//! snapshots. It never reads the clock (`now_ms` is always an argument) and
//! it never publishes; mutations return the list of occupancy flips for the
//! module wrapper to put on the bus.

pub mod change;
pub mod config;
pub mod engine;
pub mod module;
pub mod runtime;
pub mod schedule;
pub mod snapshot;

pub use change::{ChangeReason, ContributionView, OccupancyChange};
pub use config::{
    ConfigError, OccupancyConfig, OccupancyStrategy, TimeoutPolicy, CURRENT_CONFIG_VERSION,
    MODULE_ID,
};
pub use engine::{OccupancyEngine, OccupancyError};
pub use module::{LocationStateView, ModuleError, OccupancyModule};
pub use runtime::{Contribution, LocationRuntime};
pub use snapshot::{
    ContributionRecord, LocationSnapshot, RestoreReport, SnapshotError, StateSnapshot,
    SuspendedRecord, CURRENT_SNAPSHOT_VERSION,
};
