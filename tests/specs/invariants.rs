// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-cutting laws: idempotence, emission fidelity, and the universal
//! invariants under longer operation sequences.

use crate::prelude::*;

#[test]
fn trigger_is_idempotent_at_one_instant() {
    let tree = house_tree();
    let mut once = OccupancyEngine::new();
    once.trigger(&tree, &loc("kitchen"), &src("motion"), Some(secs(300)), 7 * SEC).unwrap();

    let mut twice = OccupancyEngine::new();
    twice.trigger(&tree, &loc("kitchen"), &src("motion"), Some(secs(300)), 7 * SEC).unwrap();
    let repeat =
        twice.trigger(&tree, &loc("kitchen"), &src("motion"), Some(secs(300)), 7 * SEC).unwrap();

    assert!(repeat.is_empty(), "no flip, no emission");
    for location in ["kitchen", "main_floor", "house"] {
        similar_asserts::assert_eq!(once.runtime(location), twice.runtime(location));
    }
}

#[yare::parameterized(
    clear_unknown_source     = { "clear" },
    unlock_unknown_source    = { "unlock" },
    vacate_vacant            = { "vacate" },
    unlock_all_unlocked      = { "unlock_all" },
)]
fn soft_noops_emit_nothing(op: &str) {
    let tree = house_tree();
    let mut engine = OccupancyEngine::new();
    engine.trigger(&tree, &loc("office"), &src("motion"), Some(secs(300)), 0).unwrap();

    let changes = match op {
        "clear" => engine.clear(&tree, &loc("kitchen"), &src("nobody"), Duration::ZERO, 0),
        "unlock" => engine.unlock(&tree, &loc("office"), &src("nobody"), 0),
        "vacate" => engine.vacate(&tree, &loc("kitchen")),
        _ => engine.unlock_all(&tree, &loc("office"), 0),
    };
    assert!(changes.is_empty());
    assert!(engine.is_occupied("office"));
    assert_invariants(&engine, &tree);
}

#[test]
fn every_emission_is_a_real_flip() {
    let tree = house_tree();
    let mut engine = OccupancyEngine::new();
    let mut all_changes = Vec::new();

    all_changes
        .extend(engine.trigger(&tree, &loc("kitchen"), &src("motion"), Some(secs(300)), 0).unwrap());
    all_changes
        .extend(engine.trigger(&tree, &loc("bedroom"), &src("presence"), None, 10 * SEC).unwrap());
    all_changes.extend(engine.clear(&tree, &loc("kitchen"), &src("motion"), secs(60), 20 * SEC));
    all_changes.extend(engine.lock(&tree, &loc("bedroom"), &src("sleep"), 30 * SEC).unwrap());
    all_changes.extend(engine.check_timeouts(&tree, 80 * SEC));
    all_changes.extend(engine.unlock(&tree, &loc("bedroom"), &src("sleep"), 90 * SEC));
    all_changes.extend(engine.vacate_area(&tree, &loc("house"), &src("reset"), true, 100 * SEC));

    for change in &all_changes {
        assert_ne!(change.occupied, change.previous_occupied, "{change:?}");
    }
    assert_invariants(&engine, &tree);
}

#[test]
fn invariants_hold_through_a_busy_day() {
    let tree = house_tree();
    let mut engine = OccupancyEngine::new();
    engine.set_config(
        &tree,
        loc("bedroom"),
        OccupancyConfig {
            occupancy_strategy: OccupancyStrategy::FollowParent,
            ..Default::default()
        },
    );

    let mut now = 0u64;
    for round in 0..50u64 {
        now += 37 * SEC;
        match round % 7 {
            0 => {
                engine
                    .trigger(&tree, &loc("kitchen"), &src("motion"), Some(secs(300)), now)
                    .unwrap();
            }
            1 => {
                engine.trigger(&tree, &loc("office"), &src("presence"), None, now).unwrap();
            }
            2 => {
                engine.clear(&tree, &loc("kitchen"), &src("motion"), secs(30), now);
            }
            3 => {
                engine.lock(&tree, &loc("main_floor"), &src("away"), now).unwrap();
            }
            4 => {
                engine.unlock(&tree, &loc("main_floor"), &src("away"), now);
            }
            5 => {
                engine.vacate(&tree, &loc("office"));
            }
            _ => {
                engine.check_timeouts(&tree, now);
            }
        }
        assert_invariants(&engine, &tree);
    }
}

#[test]
fn dump_is_pure() {
    let tree = house_tree();
    let mut engine = OccupancyEngine::new();
    engine.trigger(&tree, &loc("kitchen"), &src("motion"), Some(secs(300)), 0).unwrap();

    let first = engine.dump_state();
    let second = engine.dump_state();
    similar_asserts::assert_eq!(first, second);
}
