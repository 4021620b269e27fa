// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The bus event record.
//!
//! Event types are open dotted strings (`sensor.state_changed`,
//! `occupancy.changed`); the well-known ones live in [`events`]. Payloads
//! are JSON maps whose semantics belong to the emitting module.

use crate::id::{EntityId, LocationId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smol_str::SmolStr;

/// Well-known event type names.
pub mod events {
    /// A Location's occupancy flipped.
    pub const OCCUPANCY_CHANGED: &str = "occupancy.changed";

    /// Normalized occupancy commands, for hosts that route everything
    /// through the bus instead of calling module methods.
    pub const OCCUPANCY_TRIGGER: &str = "occupancy.trigger";
    pub const OCCUPANCY_CLEAR: &str = "occupancy.clear";
    pub const OCCUPANCY_VACATE: &str = "occupancy.vacate";
    pub const OCCUPANCY_LOCK: &str = "occupancy.lock";
    pub const OCCUPANCY_UNLOCK: &str = "occupancy.unlock";

    /// Host-side entity state transition, already normalized.
    pub const SENSOR_STATE_CHANGED: &str = "sensor.state_changed";
}

/// An event on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: SmolStr,
    /// Originator tag (`ha`, `occupancy`, ...).
    pub source: SmolStr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub payload: Map<String, Value>,
    /// Host-supplied epoch milliseconds.
    #[serde(default)]
    pub timestamp_ms: u64,
}

impl Event {
    pub fn new(event_type: impl Into<SmolStr>, source: impl Into<SmolStr>) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
            location_id: None,
            entity_id: None,
            payload: Map::new(),
            timestamp_ms: 0,
        }
    }

    crate::setters! {
        set {
            timestamp_ms: u64,
        }
    }

    pub fn location(mut self, id: impl Into<LocationId>) -> Self {
        self.location_id = Some(id.into());
        self
    }

    pub fn entity(mut self, id: impl Into<EntityId>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    pub fn payload_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key)?.as_str()
    }

    pub fn payload_u64(&self, key: &str) -> Option<u64> {
        self.payload.get(key)?.as_u64()
    }

    pub fn payload_bool(&self, key: &str) -> Option<bool> {
        self.payload.get(key)?.as_bool()
    }

    pub fn log_summary(&self) -> String {
        let mut summary = format!("{} src={}", self.event_type, self.source);
        if let Some(location) = &self.location_id {
            summary.push_str(&format!(" loc={location}"));
        }
        if let Some(entity) = &self.entity_id {
            summary.push_str(&format!(" entity={entity}"));
        }
        summary
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
