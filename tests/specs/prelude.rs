// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for scenario specs.

pub use hearth_core::test_support::{house_tree, shared_house_tree, single_room};
pub use hearth_core::{
    events, Event, EventBus, EventFilter, LocationId, LocationSpec, LocationTree, SourceId,
};
pub use hearth_engine::{
    ChangeReason, OccupancyChange, OccupancyConfig, OccupancyEngine, OccupancyModule,
    OccupancyStrategy,
};
pub use std::sync::Arc;
pub use std::time::Duration;

pub const SEC: u64 = 1_000;

pub fn loc(s: &str) -> LocationId {
    LocationId::new(s)
}

pub fn src(s: &str) -> SourceId {
    SourceId::new(s)
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// Locations the changes flipped, in emission order.
pub fn flip_order(changes: &[OccupancyChange]) -> Vec<String> {
    changes.iter().map(|c| c.location.to_string()).collect()
}

/// Universal invariants that must hold after every operation.
pub fn assert_invariants(engine: &OccupancyEngine, tree: &LocationTree) {
    for location in tree.iter() {
        // Forest: parents resolve and no walk returns home.
        if let Some(parent) = &location.parent_id {
            assert!(tree.get(parent).is_some(), "dangling parent for {}", location.id);
        }
        assert!(
            tree.ancestors_of(&location.id).iter().all(|a| a.id != location.id),
            "cycle through {}",
            location.id
        );

        let Some(rt) = engine.runtime(&location.id) else { continue };

        // Lock invariant: suspension state only exists under a lock.
        if rt.locked_by.is_empty() {
            assert!(rt.suspended.is_empty(), "orphan suspension on {}", location.id);
        }

        // Propagation consistency, for parents not frozen by a lock.
        let config = engine.config(&location.id);
        if config.occupancy_strategy == OccupancyStrategy::Independent
            && config.contributes_to_parent
        {
            if let Some(parent) = &location.parent_id {
                if !engine.runtime(parent).is_some_and(|p| !p.locked_by.is_empty()) {
                    let synthetic = SourceId::child_of(&location.id);
                    let held = engine
                        .runtime(parent)
                        .is_some_and(|p| p.contributions.contains_key(&synthetic));
                    assert_eq!(
                        rt.occupied, held,
                        "propagation mismatch between {} and {parent}",
                        location.id
                    );
                }
            }
        }
    }
}
