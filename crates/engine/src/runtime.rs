// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-Location dynamic state.

use hearth_core::SourceId;
use std::collections::{BTreeMap, BTreeSet};

/// One source's active assertion that a Location is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contribution {
    /// Absolute epoch milliseconds; `None` holds the contribution open
    /// until an explicit clear or vacate.
    pub expires_at_ms: Option<u64>,
}

impl Contribution {
    pub fn indefinite() -> Self {
        Self { expires_at_ms: None }
    }

    pub fn until(expires_at_ms: u64) -> Self {
        Self { expires_at_ms: Some(expires_at_ms) }
    }
}

/// Dynamic state for one Location. Ordered maps keep expiry processing and
/// snapshots deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocationRuntime {
    /// Active contributions keyed by source; synthetic `child:` entries
    /// mirror occupied children.
    pub contributions: BTreeMap<SourceId, Contribution>,
    /// Sources currently holding a lock.
    pub locked_by: BTreeSet<SourceId>,
    /// Remaining durations (ms) captured when the first lock landed.
    /// Non-empty only while locked.
    pub suspended: BTreeMap<SourceId, u64>,
    /// Cached occupancy, used to detect flips. For independent Locations
    /// this tracks contribution presence; followers mirror their parent.
    pub occupied: bool,
}

impl LocationRuntime {
    pub fn is_locked(&self) -> bool {
        !self.locked_by.is_empty()
    }

    /// True when there is nothing worth persisting or reporting.
    pub fn is_default(&self) -> bool {
        !self.occupied
            && self.contributions.is_empty()
            && self.locked_by.is_empty()
            && self.suspended.is_empty()
    }

    /// Latest expiry across contributions, with indefinite dominating:
    /// `None` as soon as any contribution has no expiry. Only meaningful
    /// when the contribution set is non-empty.
    pub fn max_expiry_ms(&self) -> Option<u64> {
        let mut max = 0u64;
        for contribution in self.contributions.values() {
            match contribution.expires_at_ms {
                None => return None,
                Some(expires) => max = max.max(expires),
            }
        }
        Some(max)
    }

    /// Earliest finite expiry across contributions, or `None` when every
    /// contribution is indefinite (or there are none).
    pub fn min_finite_expiry_ms(&self) -> Option<u64> {
        self.contributions.values().filter_map(|c| c.expires_at_ms).min()
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
