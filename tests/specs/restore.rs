// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence specs: dump, restore, stale protection.

use crate::prelude::*;
use hearth_engine::{ContributionRecord, LocationSnapshot, StateSnapshot};

#[test]
fn restore_with_stale_protection_discards_old_contributions() {
    let tree = single_room("kitchen");
    let snapshot = StateSnapshot {
        version: hearth_engine::CURRENT_SNAPSHOT_VERSION,
        locations: [(
            loc("kitchen"),
            LocationSnapshot {
                contributions: vec![ContributionRecord {
                    source_id: src("motion"),
                    expires_at_ms: Some(100 * SEC),
                }],
                ..Default::default()
            },
        )]
        .into_iter()
        .collect(),
    };

    // Age 100s against a 60s allowance: dropped, kitchen comes back vacant.
    let mut engine = OccupancyEngine::new();
    let report = engine.restore_state(&tree, &snapshot, 200 * SEC, secs(60)).unwrap();
    assert_eq!(report.stale_dropped, 1);
    assert!(!engine.is_occupied("kitchen"));

    // A 200s allowance keeps it; the next sweep expires it.
    let mut engine = OccupancyEngine::new();
    let report = engine.restore_state(&tree, &snapshot, 200 * SEC, secs(200)).unwrap();
    assert_eq!(report.stale_dropped, 0);
    assert!(engine.is_occupied("kitchen"));
    let changes = engine.check_timeouts(&tree, 200 * SEC);
    assert_eq!(changes.len(), 1);
    assert!(!engine.is_occupied("kitchen"));
}

#[test]
fn dump_restore_round_trip_is_bisimilar() {
    let tree = house_tree();
    let mut engine = OccupancyEngine::new();
    engine.trigger(&tree, &loc("kitchen"), &src("motion"), Some(secs(300)), 0).unwrap();
    engine.trigger(&tree, &loc("kitchen"), &src("presence"), None, 0).unwrap();
    engine.trigger(&tree, &loc("bedroom"), &src("motion"), Some(secs(900)), 50 * SEC).unwrap();
    engine.lock(&tree, &loc("bedroom"), &src("sleep"), 100 * SEC).unwrap();

    let snapshot = engine.dump_state();
    let json = serde_json::to_string_pretty(&snapshot).unwrap();
    let reloaded: StateSnapshot = serde_json::from_str(&json).unwrap();

    let mut restored = OccupancyEngine::new();
    restored.restore_state(&tree, &reloaded, 100 * SEC, Duration::MAX).unwrap();

    for location in ["house", "main_floor", "kitchen", "bedroom", "office"] {
        similar_asserts::assert_eq!(
            restored.runtime(location),
            engine.runtime(location),
            "{}",
            location
        );
    }
    assert_eq!(restored.next_expiration(), engine.next_expiration());
    assert_invariants(&restored, &tree);
}

#[test]
fn snapshot_survives_tree_shape_changes() {
    let tree = house_tree();
    let mut engine = OccupancyEngine::new();
    engine.trigger(&tree, &loc("kitchen"), &src("motion"), None, 0).unwrap();
    engine.trigger(&tree, &loc("office"), &src("desk"), None, 0).unwrap();
    let snapshot = engine.dump_state();

    // The office was torn down between dump and restore.
    let mut smaller = house_tree();
    smaller.delete("office").unwrap();

    let mut restored = OccupancyEngine::new();
    let report = restored.restore_state(&smaller, &snapshot, 0, Duration::MAX).unwrap();
    assert_eq!(report.unknown_locations, 1);
    assert!(restored.is_occupied("kitchen"));
    assert!(restored.runtime("office").is_none());
    assert_invariants(&restored, &smaller);
}

#[test]
fn locked_state_survives_any_age() {
    let tree = single_room("bedroom");
    let mut engine = OccupancyEngine::new();
    engine.trigger(&tree, &loc("bedroom"), &src("motion"), Some(secs(100)), 0).unwrap();
    engine.lock(&tree, &loc("bedroom"), &src("sleep"), 20 * SEC).unwrap();
    let snapshot = engine.dump_state();

    let mut restored = OccupancyEngine::new();
    let report = restored.restore_state(&tree, &snapshot, 1_000_000 * SEC, secs(1)).unwrap();
    assert_eq!(report.stale_dropped, 0);
    assert!(restored.is_locked("bedroom"));
    assert!(restored.is_occupied("bedroom"));

    // Unlock far in the future: the 80s that remained resumes from there.
    restored.unlock(&tree, &loc("bedroom"), &src("sleep"), 1_000_000 * SEC);
    assert_eq!(restored.next_expiration(), Some(1_000_080 * SEC));
}

#[test]
fn empty_engine_dumps_an_empty_snapshot() {
    let engine = OccupancyEngine::new();
    let snapshot = engine.dump_state();
    assert!(snapshot.locations.is_empty());

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["v"], hearth_engine::CURRENT_SNAPSHOT_VERSION);
}
