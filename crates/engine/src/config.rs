// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-Location occupancy config.
//!
//! Stored as an opaque versioned blob on the Location; this module owns the
//! schema and its migrations. Unknown versions fail closed: the wrapper
//! falls back to defaults and logs a warning.

use hearth_core::EntityId;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Module id keying the config blob on a Location.
pub const MODULE_ID: &str = "occupancy";

/// Current config schema version.
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported config version: {0}")]
    UnsupportedVersion(u32),
    #[error("invalid config: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// How a Location derives its occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyStrategy {
    /// Driven by its own contribution set.
    #[default]
    Independent,
    /// Mirrors the parent; direct trigger/clear events are dropped.
    FollowParent,
}

hearth_core::simple_display! {
    OccupancyStrategy {
        Independent => "independent",
        FollowParent => "follow_parent",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyConfig {
    #[serde(rename = "v", default = "default_version")]
    pub version: u32,
    /// Applied to a trigger with no explicit or per-entity timeout.
    #[serde(with = "duration_secs", default = "default_timeout")]
    pub default_timeout: Duration,
    /// Applied to a clear with no explicit trailing window.
    #[serde(with = "duration_secs", default = "default_trailing_timeout")]
    pub default_trailing_timeout: Duration,
    #[serde(default)]
    pub occupancy_strategy: OccupancyStrategy,
    /// Whether this Location's occupancy places a synthetic contribution
    /// on its parent. Ignored for followers.
    #[serde(default = "default_true")]
    pub contributes_to_parent: bool,
}

fn default_version() -> u32 {
    CURRENT_CONFIG_VERSION
}

fn default_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_trailing_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_true() -> bool {
    true
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            default_timeout: default_timeout(),
            default_trailing_timeout: default_trailing_timeout(),
            occupancy_strategy: OccupancyStrategy::default(),
            contributes_to_parent: true,
        }
    }
}

impl OccupancyConfig {
    /// Parse a stored blob, migrating older schema versions forward.
    ///
    /// A missing `v` reads as version 1. Versions newer than
    /// [`CURRENT_CONFIG_VERSION`] are rejected.
    pub fn migrate(value: &serde_json::Value) -> Result<Self, ConfigError> {
        let version = value.get("v").and_then(|v| v.as_u64()).unwrap_or(1) as u32;
        match version {
            1 => Ok(serde_json::from_value(value.clone())?),
            other => Err(ConfigError::UnsupportedVersion(other)),
        }
    }

    pub fn follows_parent(&self) -> bool {
        self.occupancy_strategy == OccupancyStrategy::FollowParent
    }
}

/// Host-owned per-entity timeout overrides.
///
/// Sits between an explicit timeout parameter and the Location default:
/// explicit > policy > `default_timeout`.
pub trait TimeoutPolicy: Send + Sync {
    /// Timeout for a trigger originating from this entity; `None` defers
    /// to the Location default.
    fn timeout_for(&self, entity: &EntityId) -> Option<Duration>;
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
