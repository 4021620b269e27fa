// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Occupancy flips produced by engine mutations.
//!
//! The engine returns these instead of publishing; the module wrapper turns
//! each into an `occupancy.changed` event. Cascades arrive child-first.

use hearth_core::{events, Event, LocationId, SourceId};
use serde::Serialize;

/// Why a Location's occupancy flipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeReason {
    Trigger(SourceId),
    Clear(SourceId),
    Expired(SourceId),
    Vacate,
    /// A hierarchy neighbor changed: a child stopped or started propagating,
    /// or a mirrored parent flipped.
    Propagated(LocationId),
    Unlocked,
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeReason::Trigger(source) => write!(f, "trigger:{source}"),
            ChangeReason::Clear(source) => write!(f, "clear:{source}"),
            ChangeReason::Expired(source) => write!(f, "expired:{source}"),
            ChangeReason::Vacate => write!(f, "vacate"),
            ChangeReason::Propagated(location) => write!(f, "propagated:{location}"),
            ChangeReason::Unlocked => write!(f, "unlocked"),
        }
    }
}

impl Serialize for ChangeReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// A contribution as reported in change payloads and state views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributionView {
    pub source_id: SourceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
}

/// One occupancy flip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupancyChange {
    pub location: LocationId,
    pub occupied: bool,
    pub previous_occupied: bool,
    pub reason: ChangeReason,
    /// The Location's contribution set after the operation.
    pub contributions: Vec<ContributionView>,
    pub locked_by: Vec<SourceId>,
}

impl OccupancyChange {
    /// Render as an `occupancy.changed` bus event.
    pub fn into_event(self, timestamp_ms: u64) -> Event {
        Event::new(events::OCCUPANCY_CHANGED, "occupancy")
            .location(self.location)
            .timestamp_ms(timestamp_ms)
            .payload_field("occupied", self.occupied)
            .payload_field("previous_occupied", self.previous_occupied)
            .payload_field("reason", self.reason.to_string())
            .payload_field(
                "contributions",
                serde_json::to_value(&self.contributions).unwrap_or_default(),
            )
            .payload_field("locked_by", serde_json::to_value(&self.locked_by).unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "change_tests.rs"]
mod tests;
