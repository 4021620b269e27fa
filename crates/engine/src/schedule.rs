// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer scheduling queries and the expiry sweep.
//!
//! The engine holds no timers. The host schedules a callback at
//! `next_expiration()` and calls `check_timeouts(now_ms)` when it fires,
//! re-querying after every mutation since mutations move the next expiry.
//! A fixed-cadence poll is equally correct, just busier.

use crate::change::{ChangeReason, OccupancyChange};
use crate::config::OccupancyStrategy;
use crate::engine::OccupancyEngine;
use hearth_core::{LocationId, LocationTree, SourceId};
use std::time::Duration;

impl OccupancyEngine {
    /// Earliest finite expiry across all unlocked Locations, or `None`
    /// when nothing is pending. May return a value at or before the
    /// host's current time; the host fires immediately in that case.
    ///
    /// Synthetic entries are skipped; each mirrors its child's latest
    /// expiry, so the child's own contributions always bound it.
    pub fn next_expiration(&self) -> Option<u64> {
        let mut earliest: Option<u64> = None;
        for rt in self.runtime.values() {
            if rt.is_locked() {
                continue;
            }
            for (source, contribution) in &rt.contributions {
                if source.is_synthetic() {
                    continue;
                }
                if let Some(expires) = contribution.expires_at_ms {
                    earliest = Some(earliest.map_or(expires, |e| e.min(expires)));
                }
            }
        }
        earliest
    }

    /// Expire every due contribution, in `(expires_at, location, source)`
    /// order so cascades are deterministic. Locked Locations are masked.
    pub fn check_timeouts(&mut self, tree: &LocationTree, now_ms: u64) -> Vec<OccupancyChange> {
        let mut due: Vec<(u64, LocationId, SourceId)> = Vec::new();
        for (location, rt) in &self.runtime {
            if rt.is_locked() {
                continue;
            }
            for (source, contribution) in &rt.contributions {
                if source.is_synthetic() {
                    continue;
                }
                if let Some(expires) = contribution.expires_at_ms {
                    if expires <= now_ms {
                        due.push((expires, location.clone(), source.clone()));
                    }
                }
            }
        }
        due.sort();

        let mut changes = Vec::new();
        for (_, location, source) in due {
            // An earlier cascade in this sweep may have removed the entry.
            let still_due = self
                .runtime
                .get(location.as_str())
                .and_then(|rt| rt.contributions.get(&source))
                .is_some_and(|c| c.expires_at_ms.is_some_and(|e| e <= now_ms));
            if !still_due {
                continue;
            }
            if let Some(rt) = self.runtime.get_mut(location.as_str()) {
                rt.contributions.remove(&source);
            }
            self.refresh(tree, &location, ChangeReason::Expired(source), &mut changes);
        }
        changes
    }

    /// Predicted vacancy time for a Location, counting its own
    /// contributions and everything its descendants propagate into it.
    /// `None` when it is already vacant or any contributing source is
    /// indefinite (including any lock, which masks every expiry).
    pub fn next_vacant_time(&self, tree: &LocationTree, location: &LocationId) -> Option<u64> {
        // Follower chains resolve at the nearest independent ancestor.
        let mut target = location.clone();
        while self.strategy_of(&target) == OccupancyStrategy::FollowParent {
            target = tree.get(&target)?.parent_id.clone()?;
        }
        let rt = self.runtime.get(target.as_str())?;
        if !rt.occupied {
            return None;
        }
        rt.max_expiry_ms()
    }

    /// Remaining time until predicted vacancy, with the same `None`
    /// semantics as [`next_vacant_time`](Self::next_vacant_time).
    pub fn effective_timeout(
        &self,
        tree: &LocationTree,
        location: &LocationId,
        now_ms: u64,
    ) -> Option<Duration> {
        self.next_vacant_time(tree, location)
            .map(|t| Duration::from_millis(t.saturating_sub(now_ms)))
    }

    fn strategy_of(&self, location: &LocationId) -> OccupancyStrategy {
        self.config(location).occupancy_strategy
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
