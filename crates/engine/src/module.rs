// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The occupancy module: engine + bus + tree.
//!
//! Wraps the engine behind a mutex, resolves timeouts
//! (explicit parameter > host `TimeoutPolicy` > Location default), and
//! publishes one `occupancy.changed` event per flip. Tree and engine locks
//! are released before publishing, so handlers may re-enter the module.

use crate::change::OccupancyChange;
use crate::config::{ConfigError, OccupancyConfig, TimeoutPolicy, MODULE_ID};
use crate::engine::{OccupancyEngine, OccupancyError};
use crate::snapshot::{RestoreReport, SnapshotError, StateSnapshot};
use hearth_core::{
    events, EntityId, Event, EventBus, EventFilter, HandlerError, LocationId, SharedTree,
    SourceId, SubscriptionId, TreeError,
};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Occupancy(#[from] OccupancyError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Inspection snapshot for one Location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationStateView {
    pub occupied: bool,
    pub contributions: Vec<crate::change::ContributionView>,
    pub locked_by: Vec<SourceId>,
    /// Earliest finite expiry on this Location; `None` when locked or
    /// nothing is pending.
    pub next_expiration_ms: Option<u64>,
}

pub struct OccupancyModule {
    engine: Mutex<OccupancyEngine>,
    bus: Arc<EventBus>,
    tree: SharedTree,
    policy: Mutex<Option<Arc<dyn TimeoutPolicy>>>,
}

impl OccupancyModule {
    /// Bind to a bus and tree, loading any stored per-Location configs.
    pub fn attach(bus: Arc<EventBus>, tree: SharedTree) -> Self {
        let module = Self {
            engine: Mutex::new(OccupancyEngine::new()),
            bus,
            tree,
            policy: Mutex::new(None),
        };
        module.load_configs();
        module
    }

    pub fn set_timeout_policy(&self, policy: Arc<dyn TimeoutPolicy>) {
        *self.policy.lock() = Some(policy);
    }

    /// The shared tree this module was attached to.
    pub fn tree(&self) -> &SharedTree {
        &self.tree
    }

    // ── Config ──────────────────────────────────────────────────────────

    /// Re-read every Location's stored config blob into the engine.
    /// Unknown versions fall back to defaults with a warning.
    pub fn load_configs(&self) {
        let tree = self.tree.lock();
        let mut engine = self.engine.lock();
        for location in tree.iter() {
            if let Some(blob) = location.modules.get(MODULE_ID) {
                let config = resolve_config(&location.id, blob);
                engine.set_config(&tree, location.id.clone(), config);
            }
        }
    }

    /// Write a Location's config to the tree and refresh the engine. A
    /// strategy change can flip occupancy, so this takes `now_ms` for the
    /// resulting events.
    pub fn set_location_config(
        &self,
        location: &LocationId,
        config: &OccupancyConfig,
        now_ms: u64,
    ) -> Result<(), ModuleError> {
        let blob = serde_json::to_value(config).map_err(ConfigError::Invalid)?;
        let changes = {
            let mut tree = self.tree.lock();
            tree.set_module_config(location, MODULE_ID, blob)?;
            let mut engine = self.engine.lock();
            engine.set_config(&tree, location.clone(), config.clone())
        };
        self.publish(changes, now_ms);
        Ok(())
    }

    /// The resolved config in effect for a Location.
    pub fn location_config(&self, location: &LocationId) -> OccupancyConfig {
        self.engine.lock().config(location).clone()
    }

    // ── Events ──────────────────────────────────────────────────────────

    /// Trigger with timeout resolution: `explicit` wins, then the host's
    /// per-entity policy (keyed by the source), then the Location default.
    pub fn trigger(
        &self,
        location: &LocationId,
        source: &SourceId,
        explicit: Option<Duration>,
        now_ms: u64,
    ) -> Result<(), ModuleError> {
        let changes = {
            let tree = self.tree.lock();
            let mut engine = self.engine.lock();
            let timeout = self.resolve_timeout(&engine, location, source, explicit);
            engine.trigger(&tree, location, source, Some(timeout), now_ms)?
        };
        self.publish(changes, now_ms);
        Ok(())
    }

    /// Trigger a contribution held open until an explicit clear or vacate.
    pub fn trigger_indefinite(
        &self,
        location: &LocationId,
        source: &SourceId,
        now_ms: u64,
    ) -> Result<(), ModuleError> {
        let changes = {
            let tree = self.tree.lock();
            let mut engine = self.engine.lock();
            engine.trigger(&tree, location, source, None, now_ms)?
        };
        self.publish(changes, now_ms);
        Ok(())
    }

    /// Clear with the Location's default trailing window unless an
    /// explicit one (possibly zero) is given.
    pub fn clear(
        &self,
        location: &LocationId,
        source: &SourceId,
        trailing: Option<Duration>,
        now_ms: u64,
    ) {
        let changes = {
            let tree = self.tree.lock();
            let mut engine = self.engine.lock();
            let trailing =
                trailing.unwrap_or(engine.config(location).default_trailing_timeout);
            engine.clear(&tree, location, source, trailing, now_ms)
        };
        self.publish(changes, now_ms);
    }

    // ── Commands ────────────────────────────────────────────────────────

    pub fn vacate(&self, location: &LocationId, now_ms: u64) {
        let changes = {
            let tree = self.tree.lock();
            self.engine.lock().vacate(&tree, location)
        };
        self.publish(changes, now_ms);
    }

    pub fn vacate_area(
        &self,
        location: &LocationId,
        source: &SourceId,
        include_locked: bool,
        now_ms: u64,
    ) -> Vec<OccupancyChange> {
        let changes = {
            let tree = self.tree.lock();
            self.engine.lock().vacate_area(&tree, location, source, include_locked, now_ms)
        };
        self.publish(changes.clone(), now_ms);
        changes
    }

    pub fn lock(
        &self,
        location: &LocationId,
        source: &SourceId,
        now_ms: u64,
    ) -> Result<(), ModuleError> {
        let changes = {
            let tree = self.tree.lock();
            self.engine.lock().lock(&tree, location, source, now_ms)?
        };
        self.publish(changes, now_ms);
        Ok(())
    }

    pub fn unlock(&self, location: &LocationId, source: &SourceId, now_ms: u64) {
        let changes = {
            let tree = self.tree.lock();
            self.engine.lock().unlock(&tree, location, source, now_ms)
        };
        self.publish(changes, now_ms);
    }

    pub fn unlock_all(&self, location: &LocationId, now_ms: u64) {
        let changes = {
            let tree = self.tree.lock();
            self.engine.lock().unlock_all(&tree, location, now_ms)
        };
        self.publish(changes, now_ms);
    }

    // ── Scheduling ──────────────────────────────────────────────────────

    pub fn next_expiration(&self) -> Option<u64> {
        self.engine.lock().next_expiration()
    }

    pub fn check_timeouts(&self, now_ms: u64) {
        let changes = {
            let tree = self.tree.lock();
            self.engine.lock().check_timeouts(&tree, now_ms)
        };
        self.publish(changes, now_ms);
    }

    pub fn next_vacant_time(&self, location: &LocationId) -> Option<u64> {
        let tree = self.tree.lock();
        self.engine.lock().next_vacant_time(&tree, location)
    }

    pub fn effective_timeout(&self, location: &LocationId, now_ms: u64) -> Option<Duration> {
        let tree = self.tree.lock();
        self.engine.lock().effective_timeout(&tree, location, now_ms)
    }

    // ── State ───────────────────────────────────────────────────────────

    pub fn is_occupied(&self, location: &LocationId) -> bool {
        self.engine.lock().is_occupied(location)
    }

    pub fn location_state(&self, location: &LocationId) -> Option<LocationStateView> {
        let tree = self.tree.lock();
        if !tree.contains(location) {
            return None;
        }
        let engine = self.engine.lock();
        let Some(rt) = engine.runtime(location) else {
            return Some(LocationStateView {
                occupied: false,
                contributions: Vec::new(),
                locked_by: Vec::new(),
                next_expiration_ms: None,
            });
        };
        Some(LocationStateView {
            occupied: rt.occupied,
            contributions: rt
                .contributions
                .iter()
                .map(|(source, c)| crate::change::ContributionView {
                    source_id: source.clone(),
                    expires_at_ms: c.expires_at_ms,
                })
                .collect(),
            locked_by: rt.locked_by.iter().cloned().collect(),
            next_expiration_ms: if rt.is_locked() { None } else { rt.min_finite_expiry_ms() },
        })
    }

    pub fn dump_state(&self) -> StateSnapshot {
        self.engine.lock().dump_state()
    }

    pub fn restore_state(
        &self,
        snapshot: &StateSnapshot,
        now_ms: u64,
        max_age: Duration,
    ) -> Result<RestoreReport, SnapshotError> {
        let tree = self.tree.lock();
        self.engine.lock().restore_state(&tree, snapshot, now_ms, max_age)
    }

    /// Clear engine state after the host deleted a Location.
    pub fn sync_deleted_location(&self, location: &LocationId, now_ms: u64) {
        let changes = {
            let tree = self.tree.lock();
            self.engine.lock().purge_location(&tree, location)
        };
        self.publish(changes, now_ms);
    }

    // ── Bus wiring ──────────────────────────────────────────────────────

    /// Subscribe the module to normalized `occupancy.*` command events,
    /// for hosts that route everything through the bus. Malformed
    /// payloads surface as handler errors: logged and isolated.
    pub fn subscribe_inputs(self: &Arc<Self>) -> SubscriptionId {
        let module: Weak<Self> = Arc::downgrade(self);
        self.bus.subscribe(
            EventFilter::new().event_type_prefix("occupancy."),
            move |event| {
                let Some(module) = module.upgrade() else {
                    return Ok(());
                };
                module.handle_input(event)
            },
        )
    }

    fn handle_input(&self, event: &Event) -> Result<(), HandlerError> {
        let now_ms = event.timestamp_ms;
        match event.event_type.as_str() {
            events::OCCUPANCY_TRIGGER => {
                let location = required_location(event)?;
                let source = required_source(event)?;
                if event.payload_bool("indefinite").unwrap_or(false) {
                    self.trigger_indefinite(&location, &source, now_ms)?;
                } else {
                    let timeout = event.payload_u64("timeout_ms").map(Duration::from_millis);
                    self.trigger(&location, &source, timeout, now_ms)?;
                }
            }
            events::OCCUPANCY_CLEAR => {
                let location = required_location(event)?;
                let source = required_source(event)?;
                let trailing = event.payload_u64("trailing_ms").map(Duration::from_millis);
                self.clear(&location, &source, trailing, now_ms);
            }
            events::OCCUPANCY_VACATE => {
                let location = required_location(event)?;
                if event.payload_bool("area").unwrap_or(false) {
                    let source = required_source(event)?;
                    let include_locked = event.payload_bool("include_locked").unwrap_or(false);
                    self.vacate_area(&location, &source, include_locked, now_ms);
                } else {
                    self.vacate(&location, now_ms);
                }
            }
            events::OCCUPANCY_LOCK => {
                let location = required_location(event)?;
                let source = required_source(event)?;
                self.lock(&location, &source, now_ms)?;
            }
            events::OCCUPANCY_UNLOCK => {
                let location = required_location(event)?;
                if event.payload_bool("all").unwrap_or(false) {
                    self.unlock_all(&location, now_ms);
                } else {
                    let source = required_source(event)?;
                    self.unlock(&location, &source, now_ms);
                }
            }
            // Our own occupancy.changed emissions land here too.
            _ => {}
        }
        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn resolve_timeout(
        &self,
        engine: &OccupancyEngine,
        location: &LocationId,
        source: &SourceId,
        explicit: Option<Duration>,
    ) -> Duration {
        if let Some(timeout) = explicit {
            return timeout;
        }
        if let Some(policy) = self.policy.lock().as_ref() {
            if let Some(timeout) = policy.timeout_for(&EntityId::new(source.as_str())) {
                return timeout;
            }
        }
        engine.config(location).default_timeout
    }

    fn publish(&self, changes: Vec<OccupancyChange>, now_ms: u64) {
        for change in changes {
            self.bus.publish(&change.into_event(now_ms));
        }
    }
}

fn resolve_config(location: &LocationId, blob: &serde_json::Value) -> OccupancyConfig {
    match OccupancyConfig::migrate(blob) {
        Ok(config) => config,
        Err(error) => {
            tracing::warn!(%location, %error, "bad occupancy config; falling back to defaults");
            OccupancyConfig::default()
        }
    }
}

fn required_location(event: &Event) -> Result<LocationId, HandlerError> {
    event.location_id.clone().ok_or_else(|| "event missing location_id".into())
}

fn required_source(event: &Event) -> Result<SourceId, HandlerError> {
    Ok(SourceId::new(event.payload_str("source_id").ok_or("event payload missing source_id")?))
}

#[cfg(test)]
#[path = "module_tests.rs"]
mod tests;
