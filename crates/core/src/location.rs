// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Location record.

use crate::id::{EntityId, LocationId, ModuleId};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// A node in the topology forest representing a logical space.
///
/// `id` is the stable identity; `name` is display-only and may change.
/// A Location with no parent is either an explicit root (a House, a Garage)
/// or a discovered one not yet organized into the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<LocationId>,
    /// Only meaningful while `parent_id` is unset; must be false otherwise.
    #[serde(default)]
    pub is_explicit_root: bool,
    /// External entities assigned here, in assignment order. An entity lives
    /// under at most one Location at a time.
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub entity_ids: IndexSet<EntityId>,
    /// Alternate names the host may resolve to this Location.
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub aliases: IndexSet<SmolStr>,
    /// Opaque per-module config blobs, keyed by module id. Semantics and
    /// schema versions are owned by each module.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub modules: BTreeMap<ModuleId, serde_json::Value>,
}

impl Location {
    /// True when this Location sits at the top of the forest.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Configuration for creating a new Location.
#[derive(Debug, Clone)]
pub struct LocationSpec {
    pub id: LocationId,
    pub name: String,
    pub parent: Option<LocationId>,
    pub explicit_root: bool,
    pub aliases: Vec<SmolStr>,
    pub entities: Vec<EntityId>,
}

impl LocationSpec {
    pub fn new(id: impl Into<LocationId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent: None,
            explicit_root: false,
            aliases: Vec::new(),
            entities: Vec::new(),
        }
    }

    crate::setters! {
        set {
            explicit_root: bool,
            aliases: Vec<SmolStr>,
            entities: Vec<EntityId>,
        }
        option {
            parent: LocationId,
        }
    }

    pub fn alias(mut self, alias: impl Into<SmolStr>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn entity(mut self, entity: impl Into<EntityId>) -> Self {
        self.entities.push(entity.into());
        self
    }
}

#[cfg(test)]
#[path = "location_tests.rs"]
mod tests;
