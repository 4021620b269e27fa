// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hierarchical propagation and subtree command specs.

use crate::prelude::*;

/// house ← {kitchen, bedroom}, the flat two-room shape.
fn flat_house() -> LocationTree {
    let mut tree = LocationTree::new();
    tree.create(LocationSpec::new("house", "House").explicit_root(true)).unwrap();
    tree.create(LocationSpec::new("kitchen", "Kitchen").parent("house")).unwrap();
    tree.create(LocationSpec::new("bedroom", "Bedroom").parent("house")).unwrap();
    tree
}

#[test]
fn propagation_climbs_and_collapses_child_first() {
    let tree = house_tree();
    let mut engine = OccupancyEngine::new();

    let changes =
        engine.trigger(&tree, &loc("kitchen"), &src("motion"), Some(secs(300)), 0).unwrap();
    assert_eq!(flip_order(&changes), ["kitchen", "main_floor", "house"]);
    assert!(changes.iter().all(|c| c.occupied));

    let floor = engine.runtime("main_floor").unwrap();
    assert_eq!(floor.contributions[&src("child:kitchen")].expires_at_ms, Some(300 * SEC));
    let house = engine.runtime("house").unwrap();
    assert_eq!(house.contributions[&src("child:main_floor")].expires_at_ms, Some(300 * SEC));
    assert_invariants(&engine, &tree);

    let changes = engine.check_timeouts(&tree, 300 * SEC);
    assert_eq!(flip_order(&changes), ["kitchen", "main_floor", "house"]);
    assert!(changes.iter().all(|c| !c.occupied));
    assert!(!engine.is_occupied("house"));
    assert_invariants(&engine, &tree);
}

#[test]
fn cascading_vacate_skips_locks() {
    let tree = flat_house();
    let mut engine = OccupancyEngine::new();
    engine.trigger(&tree, &loc("kitchen"), &src("motion"), None, 0).unwrap();
    engine.trigger(&tree, &loc("bedroom"), &src("motion"), None, 0).unwrap();
    engine.lock(&tree, &loc("bedroom"), &src("sleep"), 0).unwrap();

    let changes = engine.vacate_area(&tree, &loc("house"), &src("everyone_left"), false, 0);
    assert!(changes.iter().all(|c| c.location != "bedroom"));
    assert!(!engine.is_occupied("kitchen"));
    assert!(engine.is_occupied("bedroom"), "the lock held");
    assert!(engine.is_occupied("house"), "bedroom still propagates");
    assert_invariants(&engine, &tree);
}

#[test]
fn cascading_vacate_include_locked_takes_everything_down() {
    let tree = flat_house();
    let mut engine = OccupancyEngine::new();
    engine.trigger(&tree, &loc("kitchen"), &src("motion"), None, 0).unwrap();
    engine.trigger(&tree, &loc("bedroom"), &src("motion"), None, 0).unwrap();
    engine.lock(&tree, &loc("bedroom"), &src("sleep"), 0).unwrap();

    engine.vacate_area(&tree, &loc("house"), &src("everyone_left"), true, 0);
    assert!(!engine.is_locked("bedroom"));
    assert!(!engine.is_occupied("bedroom"));
    assert!(!engine.is_occupied("house"));
    assert_invariants(&engine, &tree);
}

#[test]
fn sibling_occupancy_is_independent() {
    let tree = flat_house();
    let mut engine = OccupancyEngine::new();
    engine.trigger(&tree, &loc("kitchen"), &src("motion"), None, 0).unwrap();

    assert!(engine.is_occupied("house"));
    assert!(!engine.is_occupied("bedroom"));
}

#[test]
fn followers_ride_the_cascade() {
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

    let changes = engine.trigger(&tree, &loc("kitchen"), &src("motion"), Some(secs(60)), 0).unwrap();
    assert_eq!(flip_order(&changes), ["kitchen", "main_floor", "house", "bedroom"]);

    let changes = engine.check_timeouts(&tree, 60 * SEC);
    assert!(changes.iter().any(|c| c.location == "bedroom" && !c.occupied));
    assert_invariants(&engine, &tree);
}

#[test]
fn reparenting_moves_future_propagation() {
    let mut tree = house_tree();
    let mut engine = OccupancyEngine::new();
    engine.trigger(&tree, &loc("office"), &src("desk"), None, 0).unwrap();
    assert!(engine.is_occupied("office"));
    assert!(!engine.is_occupied("house"));

    tree.reparent("office", Some(&loc("house"))).unwrap();
    engine.clear(&tree, &loc("office"), &src("desk"), Duration::ZERO, 0);
    let changes = engine.trigger(&tree, &loc("office"), &src("desk"), None, 10 * SEC).unwrap();
    assert_eq!(flip_order(&changes), ["office", "house"]);
    assert_invariants(&engine, &tree);
}
