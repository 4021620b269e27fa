// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed string ids.
//!
//! Ids are host-supplied and stable; the kernel never generates them. The
//! one id namespace the kernel owns is the synthetic `child:` prefix on
//! [`SourceId`], used for occupancy propagation from a child Location onto
//! its parent.

crate::define_id! {
    /// Unique identifier of a Location in the topology forest.
    ///
    /// Never derived from the display name; renames do not touch it.
    pub struct LocationId;
}

crate::define_id! {
    /// Identifier of a sensor or other source asserting occupancy.
    ///
    /// Unique within a single Location's contribution set.
    pub struct SourceId;
}

crate::define_id! {
    /// External entity identifier as the host platform knows it
    /// (e.g. `binary_sensor.hallway_motion`).
    pub struct EntityId;
}

crate::define_id! {
    /// Identifier of a behavior module ("occupancy", "lighting", ...).
    /// Keys the per-Location config blobs.
    pub struct ModuleId;
}

/// Reserved prefix for synthetic propagation sources.
pub const CHILD_SOURCE_PREFIX: &str = "child:";

impl SourceId {
    /// The synthetic source a child Location holds on its parent while the
    /// child is occupied: `child:<child_location_id>`.
    pub fn child_of(location: &LocationId) -> Self {
        Self::new(format!("{CHILD_SOURCE_PREFIX}{location}"))
    }

    /// True when this source is a synthetic propagation entry.
    pub fn is_synthetic(&self) -> bool {
        self.as_str().starts_with(CHILD_SOURCE_PREFIX)
    }

    /// Parse the child Location id out of a synthetic source.
    ///
    /// Returns `None` for host-supplied sources.
    pub fn synthetic_child(&self) -> Option<LocationId> {
        self.as_str().strip_prefix(CHILD_SOURCE_PREFIX).map(LocationId::new)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
