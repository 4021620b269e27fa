// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-room occupancy specs: trigger, expiry, coverage gaps.

use crate::prelude::*;

#[test]
fn motion_only_room_single_trigger_and_expiry() {
    let tree = single_room("kitchen");
    let mut engine = OccupancyEngine::new();

    let changes =
        engine.trigger(&tree, &loc("kitchen"), &src("motion"), Some(secs(300)), 0).unwrap();
    assert_eq!(changes.len(), 1);
    assert!(changes[0].occupied);
    assert_invariants(&engine, &tree);

    assert_eq!(engine.next_expiration(), Some(300 * SEC));

    assert!(engine.check_timeouts(&tree, 299 * SEC).is_empty());
    assert!(engine.is_occupied("kitchen"));

    let changes = engine.check_timeouts(&tree, 300 * SEC);
    assert_eq!(changes.len(), 1);
    assert!(!changes[0].occupied);
    assert_eq!(changes[0].reason.to_string(), "expired:motion");
    assert!(!engine.is_occupied("kitchen"));
    assert_invariants(&engine, &tree);
}

#[test]
fn motion_only_room_through_the_bus() {
    let tree = shared_house_tree();
    let bus = Arc::new(EventBus::with_tree(tree.clone()));
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe(EventFilter::new().event_type(events::OCCUPANCY_CHANGED), move |event| {
        sink.lock().push(event.clone());
        Ok(())
    });
    let module = OccupancyModule::attach(bus, tree);

    module.trigger(&loc("office"), &src("motion"), Some(secs(300)), 0).unwrap();
    assert_eq!(module.next_expiration(), Some(300 * SEC));
    module.check_timeouts(300 * SEC);

    let events = seen.lock();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].payload_bool("occupied"), Some(true));
    assert_eq!(events[0].payload_str("reason"), Some("trigger:motion"));
    assert_eq!(events[1].payload_bool("occupied"), Some(false));
    assert_eq!(events[1].payload_bool("previous_occupied"), Some(true));
    assert_eq!(events[1].payload_str("reason"), Some("expired:motion"));
}

#[test]
fn presence_and_motion_coverage_gap() {
    let tree = single_room("office");
    let mut engine = OccupancyEngine::new();

    engine.trigger(&tree, &loc("office"), &src("presence"), None, 0).unwrap();
    engine.trigger(&tree, &loc("office"), &src("motion"), Some(secs(600)), 60 * SEC).unwrap();
    engine.clear(&tree, &loc("office"), &src("presence"), secs(120), 120 * SEC);

    // t=121: occupied, presence expiring at 240, motion at 660.
    let rt = engine.runtime("office").unwrap();
    assert!(rt.occupied);
    assert_eq!(rt.contributions[&src("presence")].expires_at_ms, Some(240 * SEC));
    assert_eq!(rt.contributions[&src("motion")].expires_at_ms, Some(660 * SEC));

    let changes = engine.check_timeouts(&tree, 240 * SEC);
    assert!(changes.is_empty(), "presence gone but motion still covers the room");
    assert!(engine.is_occupied("office"));
    assert!(!engine.runtime("office").unwrap().contributions.contains_key(&src("presence")));

    let changes = engine.check_timeouts(&tree, 660 * SEC);
    assert_eq!(changes.len(), 1);
    assert!(!changes[0].occupied);
    assert_invariants(&engine, &tree);
}

#[test]
fn indefinite_trigger_then_immediate_clear_goes_vacant() {
    let tree = single_room("office");
    let mut engine = OccupancyEngine::new();

    engine.trigger(&tree, &loc("office"), &src("presence"), None, 0).unwrap();
    let changes = engine.clear(&tree, &loc("office"), &src("presence"), Duration::ZERO, 5 * SEC);
    assert_eq!(changes.len(), 1);
    assert!(!changes[0].occupied);
    assert!(!engine.is_occupied("office"));
}
