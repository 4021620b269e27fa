// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The occupancy state machine.
//!
//! Deterministic in `(state, operation, now_ms)`: the tree is passed by
//! reference, time is injected, and mutations return the occupancy flips
//! they produced in child-first cascade order. Locked Locations are frozen:
//! nothing but the lock operations themselves touches their contributions,
//! and child transitions are reconciled when the lock clears.

use crate::change::{ChangeReason, ContributionView, OccupancyChange};
use crate::config::{OccupancyConfig, OccupancyStrategy};
use crate::runtime::{Contribution, LocationRuntime};
use hearth_core::{LocationId, LocationTree, SourceId};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Invalid-argument failures. Everything else the engine treats as a soft
/// no-op: clears, unlocks, and vacates of unknown targets do nothing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OccupancyError {
    /// The tree is authoritative; triggers and locks must name a known
    /// Location.
    #[error("unknown location: {0}")]
    UnknownLocation(LocationId),
    #[error("source id must not be empty")]
    EmptySourceId,
    /// `child:` sources are reserved for propagation.
    #[error("source id uses the reserved child: prefix: {0}")]
    ReservedSourceId(SourceId),
}

#[derive(Default)]
pub struct OccupancyEngine {
    pub(crate) runtime: HashMap<LocationId, LocationRuntime>,
    pub(crate) configs: HashMap<LocationId, OccupancyConfig>,
    default_config: OccupancyConfig,
}

impl OccupancyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Config ──────────────────────────────────────────────────────────

    /// Resolved config for a Location, falling back to defaults.
    pub fn config(&self, location: &str) -> &OccupancyConfig {
        self.configs.get(location).unwrap_or(&self.default_config)
    }

    /// Install a Location's config. A strategy change can flip occupancy
    /// (e.g. independent → follow_parent), so this returns any flips.
    pub fn set_config(
        &mut self,
        tree: &LocationTree,
        location: LocationId,
        config: OccupancyConfig,
    ) -> Vec<OccupancyChange> {
        self.configs.insert(location.clone(), config);
        let mut changes = Vec::new();
        self.refresh(tree, &location, ChangeReason::Propagated(location.clone()), &mut changes);
        changes
    }

    pub fn clear_config(&mut self, tree: &LocationTree, location: &LocationId) -> Vec<OccupancyChange> {
        if self.configs.remove(location.as_str()).is_none() {
            return Vec::new();
        }
        let mut changes = Vec::new();
        self.refresh(tree, location, ChangeReason::Propagated(location.clone()), &mut changes);
        changes
    }

    fn strategy(&self, location: &str) -> OccupancyStrategy {
        self.configs.get(location).map(|c| c.occupancy_strategy).unwrap_or_default()
    }

    fn contributes(&self, location: &str) -> bool {
        self.configs.get(location).map(|c| c.contributes_to_parent).unwrap_or(true)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn runtime(&self, location: &str) -> Option<&LocationRuntime> {
        self.runtime.get(location)
    }

    pub fn is_occupied(&self, location: &str) -> bool {
        self.runtime.get(location).map(|rt| rt.occupied).unwrap_or(false)
    }

    pub fn is_locked(&self, location: &str) -> bool {
        self.runtime.get(location).is_some_and(|rt| rt.is_locked())
    }

    // ── Events ──────────────────────────────────────────────────────────

    /// Add or refresh a contribution. A repeat trigger takes
    /// `max(existing, new)` with indefinite dominating, so a shorter
    /// trigger never shortens a pending expiry. Dropped silently on
    /// followers and on locked Locations.
    pub fn trigger(
        &mut self,
        tree: &LocationTree,
        location: &LocationId,
        source: &SourceId,
        timeout: Option<Duration>,
        now_ms: u64,
    ) -> Result<Vec<OccupancyChange>, OccupancyError> {
        if !tree.contains(location) {
            return Err(OccupancyError::UnknownLocation(location.clone()));
        }
        if source.is_empty() {
            return Err(OccupancyError::EmptySourceId);
        }
        if source.is_synthetic() {
            return Err(OccupancyError::ReservedSourceId(source.clone()));
        }
        if self.strategy(location) == OccupancyStrategy::FollowParent {
            tracing::debug!(%location, %source, "follower ignores direct trigger");
            return Ok(Vec::new());
        }
        if self.is_locked(location) {
            tracing::debug!(%location, %source, "locked; trigger ignored");
            return Ok(Vec::new());
        }

        let new_expiry = timeout.map(|t| now_ms.saturating_add(duration_ms(t)));
        let rt = self.runtime.entry(location.clone()).or_default();
        let existing = rt.contributions.get(source).map(|c| c.expires_at_ms);
        let merged = match existing {
            Some(old) => merge_max(old, new_expiry),
            None => new_expiry,
        };
        if existing == Some(merged) {
            return Ok(Vec::new());
        }
        rt.contributions.insert(source.clone(), Contribution { expires_at_ms: merged });

        let mut changes = Vec::new();
        self.refresh(tree, location, ChangeReason::Trigger(source.clone()), &mut changes);
        Ok(changes)
    }

    /// Withdraw a contribution, immediately or after a trailing window.
    /// A trailing clear only ever shortens the pending expiry. Soft no-op
    /// for unknown targets, followers, and locked Locations.
    pub fn clear(
        &mut self,
        tree: &LocationTree,
        location: &LocationId,
        source: &SourceId,
        trailing: Duration,
        now_ms: u64,
    ) -> Vec<OccupancyChange> {
        if !tree.contains(location) {
            return Vec::new();
        }
        if self.strategy(location) == OccupancyStrategy::FollowParent {
            tracing::debug!(%location, %source, "follower ignores direct clear");
            return Vec::new();
        }
        let Some(rt) = self.runtime.get_mut(location.as_str()) else {
            return Vec::new();
        };
        if rt.is_locked() {
            tracing::debug!(%location, %source, "locked; clear ignored");
            return Vec::new();
        }
        let Some(existing) = rt.contributions.get(source).copied() else {
            return Vec::new();
        };

        if trailing.is_zero() {
            rt.contributions.remove(source);
        } else {
            let cutoff = now_ms.saturating_add(duration_ms(trailing));
            let shortened = match existing.expires_at_ms {
                Some(expires) => expires.min(cutoff),
                None => cutoff,
            };
            if existing.expires_at_ms == Some(shortened) {
                return Vec::new();
            }
            rt.contributions.insert(source.clone(), Contribution::until(shortened));
        }

        let mut changes = Vec::new();
        self.refresh(tree, location, ChangeReason::Clear(source.clone()), &mut changes);
        changes
    }

    // ── Commands ────────────────────────────────────────────────────────

    /// Drop every host contribution on a Location. Synthetic entries stay:
    /// a still-occupied child keeps its parent occupied through a vacate.
    /// No-op when locked or unknown.
    pub fn vacate(&mut self, tree: &LocationTree, location: &LocationId) -> Vec<OccupancyChange> {
        if !tree.contains(location) {
            return Vec::new();
        }
        let Some(rt) = self.runtime.get_mut(location.as_str()) else {
            return Vec::new();
        };
        if rt.is_locked() {
            tracing::debug!(%location, "locked; vacate ignored");
            return Vec::new();
        }
        let before = rt.contributions.len();
        rt.contributions.retain(|source, _| source.is_synthetic());
        if rt.contributions.len() == before {
            return Vec::new();
        }

        let mut changes = Vec::new();
        self.refresh(tree, location, ChangeReason::Vacate, &mut changes);
        changes
    }

    /// Vacate a subtree, children before parents. Locked Locations are
    /// skipped unless `include_locked`, in which case they are fully
    /// unlocked first.
    pub fn vacate_area(
        &mut self,
        tree: &LocationTree,
        location: &LocationId,
        source: &SourceId,
        include_locked: bool,
        now_ms: u64,
    ) -> Vec<OccupancyChange> {
        if !tree.contains(location) {
            return Vec::new();
        }
        tracing::debug!(%location, %source, include_locked, "vacating area");

        let mut targets: Vec<LocationId> =
            tree.descendants_of(location).iter().map(|l| l.id.clone()).collect();
        targets.reverse();
        targets.push(location.clone());

        let mut changes = Vec::new();
        for target in targets {
            if self.is_locked(&target) {
                if !include_locked {
                    continue;
                }
                changes.extend(self.unlock_all(tree, &target, now_ms));
            }
            changes.extend(self.vacate(tree, &target));
        }
        changes
    }

    /// Add a lock. The first lock freezes the Location: every finite
    /// expiry is swapped for its remaining duration, to be re-anchored at
    /// unlock time.
    pub fn lock(
        &mut self,
        tree: &LocationTree,
        location: &LocationId,
        source: &SourceId,
        now_ms: u64,
    ) -> Result<Vec<OccupancyChange>, OccupancyError> {
        if !tree.contains(location) {
            return Err(OccupancyError::UnknownLocation(location.clone()));
        }
        if source.is_empty() {
            return Err(OccupancyError::EmptySourceId);
        }

        let rt = self.runtime.entry(location.clone()).or_default();
        if rt.locked_by.contains(source) {
            return Ok(Vec::new());
        }
        if rt.locked_by.is_empty() {
            let LocationRuntime { contributions, suspended, .. } = &mut *rt;
            for (sid, contribution) in contributions.iter_mut() {
                if let Some(expires) = contribution.expires_at_ms {
                    suspended.insert(sid.clone(), expires.saturating_sub(now_ms));
                    contribution.expires_at_ms = None;
                }
            }
        }
        rt.locked_by.insert(source.clone());

        // Expiry masking changes what this Location reports upward; no
        // flip is possible anywhere, only synthetic expiries move.
        let mut changes = Vec::new();
        self.refresh(tree, location, ChangeReason::Propagated(location.clone()), &mut changes);
        Ok(changes)
    }

    /// Remove one lock; the lock that empties the set resumes timers and
    /// reconciles child propagation. Soft no-op for unknown targets.
    pub fn unlock(
        &mut self,
        tree: &LocationTree,
        location: &LocationId,
        source: &SourceId,
        now_ms: u64,
    ) -> Vec<OccupancyChange> {
        if !tree.contains(location) {
            return Vec::new();
        }
        let Some(rt) = self.runtime.get_mut(location.as_str()) else {
            return Vec::new();
        };
        if !rt.locked_by.remove(source) {
            return Vec::new();
        }
        if !rt.locked_by.is_empty() {
            return Vec::new();
        }
        self.resume(tree, location, now_ms)
    }

    /// Drop every lock at once.
    pub fn unlock_all(
        &mut self,
        tree: &LocationTree,
        location: &LocationId,
        now_ms: u64,
    ) -> Vec<OccupancyChange> {
        if !tree.contains(location) {
            return Vec::new();
        }
        let Some(rt) = self.runtime.get_mut(location.as_str()) else {
            return Vec::new();
        };
        if rt.locked_by.is_empty() {
            return Vec::new();
        }
        rt.locked_by.clear();
        self.resume(tree, location, now_ms)
    }

    /// Post-unlock bookkeeping: re-anchor suspended expirations at `now`,
    /// then rebuild the synthetic entries from current child state, since
    /// children may have flipped while this Location was frozen.
    fn resume(
        &mut self,
        tree: &LocationTree,
        location: &LocationId,
        now_ms: u64,
    ) -> Vec<OccupancyChange> {
        if let Some(rt) = self.runtime.get_mut(location.as_str()) {
            let suspended = std::mem::take(&mut rt.suspended);
            for (source, remaining) in suspended {
                if let Some(contribution) = rt.contributions.get_mut(&source) {
                    contribution.expires_at_ms = Some(now_ms.saturating_add(remaining));
                }
            }
        }

        let desired: Vec<(SourceId, Option<Contribution>)> = tree
            .children_of(location)
            .iter()
            .map(|child| {
                let contribution = if self.strategy(&child.id) == OccupancyStrategy::Independent
                    && self.contributes(&child.id)
                {
                    match self.runtime.get(child.id.as_str()) {
                        Some(crt) if crt.occupied => {
                            Some(Contribution { expires_at_ms: crt.max_expiry_ms() })
                        }
                        _ => None,
                    }
                } else {
                    None
                };
                (SourceId::child_of(&child.id), contribution)
            })
            .collect();

        if let Some(rt) = self.runtime.get_mut(location.as_str()) {
            let live: Vec<SourceId> = desired.iter().map(|(sid, _)| sid.clone()).collect();
            rt.contributions
                .retain(|sid, _| !sid.is_synthetic() || live.iter().any(|l| l == sid));
            for (sid, contribution) in desired {
                match contribution {
                    Some(c) => {
                        rt.contributions.insert(sid, c);
                    }
                    None => {
                        rt.contributions.remove(&sid);
                    }
                }
            }
        }

        let mut changes = Vec::new();
        self.refresh(tree, location, ChangeReason::Unlocked, &mut changes);
        changes
    }

    /// Clear all runtime state for a Location the host deleted, cascading
    /// the loss of its propagation upward.
    pub fn purge_location(
        &mut self,
        tree: &LocationTree,
        location: &LocationId,
    ) -> Vec<OccupancyChange> {
        self.configs.remove(location.as_str());
        self.runtime.remove(location.as_str());

        let sid = SourceId::child_of(location);
        let holders: Vec<LocationId> = self
            .runtime
            .iter()
            .filter(|(_, rt)| !rt.is_locked() && rt.contributions.contains_key(&sid))
            .map(|(l, _)| l.clone())
            .collect();

        let mut changes = Vec::new();
        for holder in holders {
            if let Some(rt) = self.runtime.get_mut(holder.as_str()) {
                rt.contributions.remove(&sid);
            }
            self.refresh(tree, &holder, ChangeReason::Propagated(location.clone()), &mut changes);
        }
        changes
    }

    // ── Recompute ───────────────────────────────────────────────────────

    /// Recompute one Location and cascade: push a flip for this Location
    /// first, then sync the synthetic entry on the parent (recursing when
    /// it changed), then mirror into follower children. Bounded by the
    /// forest invariant.
    pub(crate) fn refresh(
        &mut self,
        tree: &LocationTree,
        location: &LocationId,
        reason: ChangeReason,
        changes: &mut Vec<OccupancyChange>,
    ) {
        let strategy = self.strategy(location);
        let parent_id = tree.get(location).and_then(|l| l.parent_id.clone());

        let new_occupied = match strategy {
            OccupancyStrategy::FollowParent => parent_id
                .as_ref()
                .and_then(|p| self.runtime.get(p.as_str()))
                .map(|rt| rt.occupied)
                .unwrap_or(false),
            OccupancyStrategy::Independent => self
                .runtime
                .get(location.as_str())
                .map(|rt| !rt.contributions.is_empty())
                .unwrap_or(false),
        };
        let previous = self.runtime.get(location.as_str()).map(|rt| rt.occupied).unwrap_or(false);
        let flipped = new_occupied != previous;
        if flipped {
            self.runtime.entry(location.clone()).or_default().occupied = new_occupied;
            changes.push(self.snapshot_change(location, new_occupied, previous, reason.clone()));
        }

        if let Some(parent) = parent_id {
            if !self.is_locked(&parent) {
                let sid = SourceId::child_of(location);
                // Followers and non-contributors never hold a synthetic
                // entry on their parent; a stale one is removed here when
                // the config changes out from under an occupied Location.
                let desired = if strategy == OccupancyStrategy::Independent
                    && self.contributes(location)
                {
                    match self.runtime.get(location.as_str()) {
                        Some(rt) if rt.occupied => {
                            Some(Contribution { expires_at_ms: rt.max_expiry_ms() })
                        }
                        _ => None,
                    }
                } else {
                    None
                };
                let current = self
                    .runtime
                    .get(parent.as_str())
                    .and_then(|rt| rt.contributions.get(&sid).copied());
                if desired != current {
                    let prt = self.runtime.entry(parent.clone()).or_default();
                    match desired {
                        Some(c) => {
                            prt.contributions.insert(sid, c);
                        }
                        None => {
                            prt.contributions.remove(&sid);
                        }
                    }
                    self.refresh(
                        tree,
                        &parent,
                        ChangeReason::Propagated(location.clone()),
                        changes,
                    );
                }
            }
        }

        if flipped {
            let followers: Vec<LocationId> = tree
                .children_of(location)
                .iter()
                .filter(|c| self.strategy(&c.id) == OccupancyStrategy::FollowParent)
                .map(|c| c.id.clone())
                .collect();
            for follower in followers {
                self.refresh(tree, &follower, ChangeReason::Propagated(location.clone()), changes);
            }
        }
    }

    fn snapshot_change(
        &self,
        location: &LocationId,
        occupied: bool,
        previous_occupied: bool,
        reason: ChangeReason,
    ) -> OccupancyChange {
        let (contributions, locked_by) = match self.runtime.get(location.as_str()) {
            Some(rt) => (
                rt.contributions
                    .iter()
                    .map(|(source, c)| ContributionView {
                        source_id: source.clone(),
                        expires_at_ms: c.expires_at_ms,
                    })
                    .collect(),
                rt.locked_by.iter().cloned().collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };
        OccupancyChange { location: location.clone(), occupied, previous_occupied, reason, contributions, locked_by }
    }
}

fn merge_max(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        _ => None,
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
