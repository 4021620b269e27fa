// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

#![allow(clippy::panic)]

use crate::location::LocationSpec;
use crate::tree::{LocationTree, SharedTree};
use parking_lot::Mutex;
use std::sync::Arc;

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for kernel types.
pub mod strategies {
    use crate::id::SourceId;
    use proptest::prelude::*;
    use std::time::Duration;

    pub fn arb_source_id() -> impl Strategy<Value = SourceId> {
        "[a-z][a-z0-9_]{0,12}".prop_map(|s| SourceId::new(&s))
    }

    /// An optional finite timeout between one second and a day.
    pub fn arb_timeout() -> impl Strategy<Value = Option<Duration>> {
        prop_oneof![
            Just(None),
            (1u64..86_400).prop_map(|s| Some(Duration::from_secs(s))),
        ]
    }
}

// ── Tree factories ──────────────────────────────────────────────────────

/// `house ← main_floor ← {kitchen, bedroom}` plus a detached `office`.
pub fn house_tree() -> LocationTree {
    let mut tree = LocationTree::new();
    tree.create(LocationSpec::new("house", "House").explicit_root(true))
        .unwrap_or_else(|e| panic!("seed tree: {e}"));
    for (id, name, parent) in [
        ("main_floor", "Main Floor", "house"),
        ("kitchen", "Kitchen", "main_floor"),
        ("bedroom", "Bedroom", "main_floor"),
    ] {
        tree.create(LocationSpec::new(id, name).parent(parent))
            .unwrap_or_else(|e| panic!("seed tree: {e}"));
    }
    tree.create(LocationSpec::new("office", "Office").explicit_root(true))
        .unwrap_or_else(|e| panic!("seed tree: {e}"));
    tree
}

pub fn shared_house_tree() -> SharedTree {
    Arc::new(Mutex::new(house_tree()))
}

/// A single detached room, for flat scenarios.
pub fn single_room(id: &str) -> LocationTree {
    let mut tree = LocationTree::new();
    tree.create(LocationSpec::new(id, id).explicit_root(true))
        .unwrap_or_else(|e| panic!("seed tree: {e}"));
    tree
}
