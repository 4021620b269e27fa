// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Location forest.
//!
//! Stores Locations with O(1) lookup by id, entity, or alias, and O(depth)
//! ancestor/descendant walks. The parent relation is a forest: every parent
//! reference resolves, and no walk from a Location returns to itself. All
//! mutators validate before touching state, so the invariants hold after
//! every call.

use crate::id::{EntityId, LocationId, ModuleId};
use crate::location::{Location, LocationSpec};
use indexmap::IndexSet;
use parking_lot::Mutex;
use smol_str::SmolStr;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Tree handle shared between the event bus (ancestor/descendant filters)
/// and the module layer. Callers serialize access; the kernel holds the
/// lock only for the duration of a single operation.
pub type SharedTree = Arc<Mutex<LocationTree>>;

/// Errors surfaced by tree mutators. Queries never fail; they return `None`
/// or empty collections for unknown ids.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("id must not be empty")]
    EmptyId,
    #[error("location already exists: {0}")]
    DuplicateId(LocationId),
    #[error("unknown location: {0}")]
    UnknownLocation(LocationId),
    #[error("alias already in use: {0}")]
    DuplicateAlias(SmolStr),
    #[error("location with a parent cannot be an explicit root: {0}")]
    ExplicitRootWithParent(LocationId),
    #[error("moving {id} under {parent} would create a cycle")]
    WouldCycle { id: LocationId, parent: LocationId },
    #[error("location still has children: {0}")]
    HasChildren(LocationId),
}

/// Top-level Locations, partitioned by intent.
#[derive(Debug, Default)]
pub struct RootSet<'a> {
    /// Intentional top-level Locations (a House, a Garage).
    pub explicit: Vec<&'a Location>,
    /// Discovered, not yet organized.
    pub discovered: Vec<&'a Location>,
}

#[derive(Debug, Default)]
pub struct LocationTree {
    locations: HashMap<LocationId, Location>,
    /// Child ids per parent, in creation order.
    children: HashMap<LocationId, Vec<LocationId>>,
    /// Root ids in creation order.
    roots: Vec<LocationId>,
    entity_index: HashMap<EntityId, LocationId>,
    alias_index: HashMap<SmolStr, LocationId>,
}

impl LocationTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.locations.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Location> {
        self.locations.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.values()
    }

    /// Create a Location from a spec.
    ///
    /// Fails on an empty or duplicate id, an unknown parent, an alias
    /// already in use, or an explicit root that also names a parent.
    /// Entities listed in the spec are moved here from any prior Location.
    pub fn create(&mut self, spec: LocationSpec) -> Result<(), TreeError> {
        if spec.id.is_empty() {
            return Err(TreeError::EmptyId);
        }
        if self.locations.contains_key(spec.id.as_str()) {
            return Err(TreeError::DuplicateId(spec.id));
        }
        if let Some(parent) = &spec.parent {
            if !self.locations.contains_key(parent.as_str()) {
                return Err(TreeError::UnknownLocation(parent.clone()));
            }
            if spec.explicit_root {
                return Err(TreeError::ExplicitRootWithParent(spec.id));
            }
        }
        for alias in &spec.aliases {
            if self.alias_index.contains_key(alias) {
                return Err(TreeError::DuplicateAlias(alias.clone()));
            }
        }
        if spec.entities.iter().any(|e| e.is_empty()) {
            return Err(TreeError::EmptyId);
        }

        let location = Location {
            id: spec.id.clone(),
            name: spec.name,
            parent_id: spec.parent.clone(),
            is_explicit_root: spec.explicit_root,
            entity_ids: IndexSet::new(),
            aliases: spec.aliases.iter().cloned().collect(),
            modules: BTreeMap::new(),
        };
        for alias in &spec.aliases {
            self.alias_index.insert(alias.clone(), spec.id.clone());
        }
        match &spec.parent {
            Some(parent) => {
                self.children.entry(parent.clone()).or_default().push(spec.id.clone())
            }
            None => self.roots.push(spec.id.clone()),
        }
        self.locations.insert(spec.id.clone(), location);

        for entity in spec.entities {
            self.assign_entity(entity, &spec.id)?;
        }
        Ok(())
    }

    /// Delete a Location with no children. Returns the removed record.
    ///
    /// Cascades entity and alias removal; runtime state held by modules is
    /// theirs to clear.
    pub fn delete(&mut self, id: &str) -> Result<Location, TreeError> {
        let Some(location) = self.locations.get(id) else {
            return Err(TreeError::UnknownLocation(LocationId::new(id)));
        };
        if self.children.get(id).is_some_and(|c| !c.is_empty()) {
            return Err(TreeError::HasChildren(location.id.clone()));
        }

        // Checked above, so the remove cannot miss.
        let Some(location) = self.locations.remove(id) else {
            return Err(TreeError::UnknownLocation(LocationId::new(id)));
        };
        for entity in &location.entity_ids {
            self.entity_index.remove(entity);
        }
        for alias in &location.aliases {
            self.alias_index.remove(alias);
        }
        self.children.remove(id);
        match &location.parent_id {
            Some(parent) => {
                if let Some(siblings) = self.children.get_mut(parent.as_str()) {
                    siblings.retain(|c| c != &location.id);
                }
            }
            None => self.roots.retain(|r| r != &location.id),
        }
        Ok(location)
    }

    /// Change the display name. Identity is untouched.
    pub fn rename(&mut self, id: &str, name: impl Into<String>) -> Result<(), TreeError> {
        let location = self.get_mut(id)?;
        location.name = name.into();
        Ok(())
    }

    /// Mark or unmark a root Location as intentional.
    pub fn set_explicit_root(&mut self, id: &str, explicit: bool) -> Result<(), TreeError> {
        let location = self.get_mut(id)?;
        if explicit && location.parent_id.is_some() {
            return Err(TreeError::ExplicitRootWithParent(location.id.clone()));
        }
        location.is_explicit_root = explicit;
        Ok(())
    }

    /// Move a Location under a new parent (or to the top level).
    ///
    /// Fails when the move would make a Location its own ancestor.
    pub fn reparent(&mut self, id: &str, new_parent: Option<&LocationId>) -> Result<(), TreeError> {
        let Some(location) = self.locations.get(id) else {
            return Err(TreeError::UnknownLocation(LocationId::new(id)));
        };
        let id = location.id.clone();
        let old_parent = location.parent_id.clone();

        if let Some(parent) = new_parent {
            if !self.locations.contains_key(parent.as_str()) {
                return Err(TreeError::UnknownLocation(parent.clone()));
            }
            // Walking up from the new parent must never reach the moved node.
            let mut cursor = Some(parent.clone());
            while let Some(current) = cursor {
                if current == id {
                    return Err(TreeError::WouldCycle { id, parent: parent.clone() });
                }
                cursor = self.locations.get(current.as_str()).and_then(|l| l.parent_id.clone());
            }
        }

        if old_parent.as_ref() == new_parent {
            return Ok(());
        }

        match &old_parent {
            Some(parent) => {
                if let Some(siblings) = self.children.get_mut(parent.as_str()) {
                    siblings.retain(|c| c != &id);
                }
            }
            None => self.roots.retain(|r| r != &id),
        }
        match new_parent {
            Some(parent) => self.children.entry(parent.clone()).or_default().push(id.clone()),
            None => self.roots.push(id.clone()),
        }
        let location = self.get_mut(&id)?;
        location.parent_id = new_parent.cloned();
        if new_parent.is_some() {
            location.is_explicit_root = false;
        }
        Ok(())
    }

    /// Resolve a name to a Location: exact id first, then alias.
    pub fn resolve_alias(&self, name: &str) -> Option<&Location> {
        if let Some(location) = self.locations.get(name) {
            return Some(location);
        }
        let id = self.alias_index.get(name)?;
        self.locations.get(id.as_str())
    }

    pub fn add_alias(&mut self, id: &str, alias: impl Into<SmolStr>) -> Result<(), TreeError> {
        let alias = alias.into();
        if self.alias_index.contains_key(&alias) {
            return Err(TreeError::DuplicateAlias(alias));
        }
        let location = self.get_mut(id)?;
        location.aliases.insert(alias.clone());
        let id = location.id.clone();
        self.alias_index.insert(alias, id);
        Ok(())
    }

    /// Returns true if the alias existed.
    pub fn remove_alias(&mut self, alias: &str) -> bool {
        let Some(id) = self.alias_index.remove(alias) else {
            return false;
        };
        if let Some(location) = self.locations.get_mut(id.as_str()) {
            location.aliases.shift_remove(alias);
        }
        true
    }

    pub fn parent_of(&self, id: &str) -> Option<&Location> {
        let parent = self.locations.get(id)?.parent_id.as_ref()?;
        self.locations.get(parent.as_str())
    }

    /// Direct children in creation order. Empty for unknown ids.
    pub fn children_of(&self, id: &str) -> Vec<&Location> {
        self.children
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|c| self.locations.get(c.as_str()))
            .collect()
    }

    /// Ancestors in parent-to-root order. Empty for roots and unknown ids.
    pub fn ancestors_of(&self, id: &str) -> Vec<&Location> {
        let mut ancestors = Vec::new();
        let mut cursor = self.locations.get(id).and_then(|l| l.parent_id.clone());
        while let Some(current) = cursor {
            let Some(location) = self.locations.get(current.as_str()) else {
                break;
            };
            ancestors.push(location);
            cursor = location.parent_id.clone();
        }
        ancestors
    }

    /// Descendants in pre-order, excluding the Location itself.
    pub fn descendants_of(&self, id: &str) -> Vec<&Location> {
        let mut descendants = Vec::new();
        self.collect_descendants(id, &mut descendants);
        descendants
    }

    fn collect_descendants<'a>(&'a self, id: &str, out: &mut Vec<&'a Location>) {
        for child in self.children.get(id).into_iter().flatten() {
            if let Some(location) = self.locations.get(child.as_str()) {
                out.push(location);
                self.collect_descendants(child.as_str(), out);
            }
        }
    }

    /// Top-level Locations partitioned into explicit and discovered roots.
    pub fn roots(&self) -> RootSet<'_> {
        let mut set = RootSet::default();
        for id in &self.roots {
            if let Some(location) = self.locations.get(id.as_str()) {
                if location.is_explicit_root {
                    set.explicit.push(location);
                } else {
                    set.discovered.push(location);
                }
            }
        }
        set
    }

    /// Assign an entity, moving it from any prior Location.
    pub fn assign_entity(
        &mut self,
        entity: impl Into<EntityId>,
        location_id: &str,
    ) -> Result<(), TreeError> {
        let entity = entity.into();
        if entity.is_empty() {
            return Err(TreeError::EmptyId);
        }
        if !self.locations.contains_key(location_id) {
            return Err(TreeError::UnknownLocation(LocationId::new(location_id)));
        }
        if let Some(prior) = self.entity_index.get(&entity).cloned() {
            if prior == location_id {
                return Ok(());
            }
            if let Some(location) = self.locations.get_mut(prior.as_str()) {
                location.entity_ids.shift_remove(&entity);
            }
        }
        // Present, checked above.
        if let Some(location) = self.locations.get_mut(location_id) {
            location.entity_ids.insert(entity.clone());
            let id = location.id.clone();
            self.entity_index.insert(entity, id);
        }
        Ok(())
    }

    /// Returns true if the entity was assigned anywhere.
    pub fn remove_entity(&mut self, entity: &str) -> bool {
        let Some(id) = self.entity_index.remove(entity) else {
            return false;
        };
        if let Some(location) = self.locations.get_mut(id.as_str()) {
            location.entity_ids.shift_remove(entity);
        }
        true
    }

    pub fn location_of_entity(&self, entity: &str) -> Option<&Location> {
        let id = self.entity_index.get(entity)?;
        self.locations.get(id.as_str())
    }

    /// Store a module's opaque config blob on a Location.
    pub fn set_module_config(
        &mut self,
        location_id: &str,
        module: impl Into<ModuleId>,
        config: serde_json::Value,
    ) -> Result<(), TreeError> {
        let location = self.get_mut(location_id)?;
        location.modules.insert(module.into(), config);
        Ok(())
    }

    pub fn module_config(&self, location_id: &str, module: &str) -> Option<&serde_json::Value> {
        self.locations.get(location_id)?.modules.get(module)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Location, TreeError> {
        self.locations
            .get_mut(id)
            .ok_or_else(|| TreeError::UnknownLocation(LocationId::new(id)))
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
