// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hearth-core: topology substrate for the hearth home kernel.
//!
//! Holds the Location forest, the typed string ids, the event record, and
//! the synchronous event bus. Time never enters this crate on its own:
//! every timestamp is host-supplied epoch milliseconds.

pub mod macros;

pub mod bus;
pub mod event;
pub mod id;
pub mod location;
pub mod tree;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use bus::{EventBus, EventFilter, HandlerError, SubscriptionId};
pub use event::{events, Event};
pub use id::{EntityId, LocationId, ModuleId, SourceId};
pub use location::{Location, LocationSpec};
pub use tree::{LocationTree, RootSet, SharedTree, TreeError};
