// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned state snapshots for host-side persistence.
//!
//! The snapshot records host-supplied state only: synthetic propagation
//! entries are omitted and rebuilt on restore. Restoring drops non-locked
//! contributions staler than `max_age` and never emits.

use crate::change::ChangeReason;
use crate::engine::OccupancyEngine;
use crate::runtime::{Contribution, LocationRuntime};
use hearth_core::{LocationId, LocationTree, SourceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Current snapshot schema version.
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A persisted contribution. Unknown fields are ignored on read, so hosts
/// may annotate records without breaking restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRecord {
    pub source_id: SourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendedRecord {
    pub source_id: SourceId,
    pub remaining_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LocationSnapshot {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributions: Vec<ContributionRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locked_by: Vec<SourceId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suspended: Vec<SuspendedRecord>,
}

/// The versioned snapshot: one record per Location with non-default state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(rename = "v")]
    pub version: u32,
    #[serde(default)]
    pub locations: BTreeMap<LocationId, LocationSnapshot>,
}

/// Restore accounting, logged as a single aggregate line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestoreReport {
    pub locations: usize,
    pub contributions: usize,
    pub stale_dropped: usize,
    pub unknown_locations: usize,
}

impl OccupancyEngine {
    /// Snapshot every Location with non-default state. Synthetic entries
    /// are derived and left out.
    pub fn dump_state(&self) -> StateSnapshot {
        let mut locations = BTreeMap::new();
        for (location, rt) in &self.runtime {
            let contributions: Vec<ContributionRecord> = rt
                .contributions
                .iter()
                .filter(|(source, _)| !source.is_synthetic())
                .map(|(source, c)| ContributionRecord {
                    source_id: source.clone(),
                    expires_at_ms: c.expires_at_ms,
                })
                .collect();
            let suspended: Vec<SuspendedRecord> = rt
                .suspended
                .iter()
                .filter(|(source, _)| !source.is_synthetic())
                .map(|(source, remaining)| SuspendedRecord {
                    source_id: source.clone(),
                    remaining_ms: *remaining,
                })
                .collect();
            let locked_by: Vec<SourceId> = rt.locked_by.iter().cloned().collect();
            if contributions.is_empty() && suspended.is_empty() && locked_by.is_empty() {
                continue;
            }
            locations.insert(
                location.clone(),
                LocationSnapshot { contributions, locked_by, suspended },
            );
        }
        StateSnapshot { version: CURRENT_SNAPSHOT_VERSION, locations }
    }

    /// Replace runtime state from a snapshot.
    ///
    /// Non-locked contributions whose expiry is older than `now` by more
    /// than `max_age` are dropped; locked state is restored verbatim.
    /// Locations the tree no longer knows are skipped. Propagation is
    /// rebuilt bottom-up and nothing is emitted.
    pub fn restore_state(
        &mut self,
        tree: &LocationTree,
        snapshot: &StateSnapshot,
        now_ms: u64,
        max_age: Duration,
    ) -> Result<RestoreReport, SnapshotError> {
        if snapshot.version != CURRENT_SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        self.runtime.clear();
        let max_age_ms = crate::engine::duration_ms(max_age);
        let mut report = RestoreReport::default();

        for (location, snap) in &snapshot.locations {
            if !tree.contains(location) {
                report.unknown_locations += 1;
                continue;
            }
            let locked = !snap.locked_by.is_empty();
            let mut rt = LocationRuntime::default();
            for record in &snap.contributions {
                if record.source_id.is_synthetic() {
                    continue;
                }
                if !locked {
                    if let Some(expires) = record.expires_at_ms {
                        if now_ms.saturating_sub(expires) > max_age_ms {
                            report.stale_dropped += 1;
                            continue;
                        }
                    }
                }
                rt.contributions.insert(
                    record.source_id.clone(),
                    Contribution { expires_at_ms: record.expires_at_ms },
                );
                report.contributions += 1;
            }
            rt.locked_by = snap.locked_by.iter().cloned().collect();
            if locked {
                rt.suspended = snap
                    .suspended
                    .iter()
                    .filter(|s| !s.source_id.is_synthetic())
                    .map(|s| (s.source_id.clone(), s.remaining_ms))
                    .collect();
            }
            if rt.is_default() {
                continue;
            }
            self.runtime.insert(location.clone(), rt);
            report.locations += 1;
        }

        // Rebuild occupancy and propagation deepest-first; follower
        // mirroring rides the same cascade. Flips are discarded: restore
        // is silent.
        let mut restored: Vec<LocationId> = self.runtime.keys().cloned().collect();
        restored.sort_by_key(|l| std::cmp::Reverse(tree.ancestors_of(l).len()));
        let mut discarded = Vec::new();
        for location in restored {
            self.refresh(tree, &location, ChangeReason::Propagated(location.clone()), &mut discarded);
        }

        if report.stale_dropped > 0 || report.unknown_locations > 0 {
            tracing::warn!(
                stale_dropped = report.stale_dropped,
                unknown_locations = report.unknown_locations,
                "snapshot restore dropped entries"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
