// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Synchronous, filter-based event dispatch.
//!
//! `publish` delivers to every matching subscription in subscription order,
//! on the calling thread, before returning. Handler failures are logged and
//! swallowed so one misbehaving subscriber never starves the rest. The
//! handler list is snapshotted before dispatch, which makes re-entrant
//! `publish`/`subscribe`/`unsubscribe` from inside a handler safe: a nested
//! publish runs to completion before the outer dispatch resumes.
//!
//! Ordering holds per thread only. Multi-producer hosts serialize their
//! calls; the bus adds no locking beyond its own subscription list.

use crate::event::Event;
use crate::id::{EntityId, LocationId};
use crate::tree::SharedTree;
use parking_lot::Mutex;
use smol_str::SmolStr;
use std::sync::Arc;

/// Errors a handler may surface. Logged, never propagated to the publisher.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

type Handler = Arc<dyn Fn(&Event) -> Result<(), HandlerError> + Send + Sync>;

/// Opaque handle returned by `subscribe`, usable for `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Matching criteria for a subscription. Every present constraint must
/// hold; an empty filter matches everything.
#[derive(Clone, Default)]
pub struct EventFilter {
    event_type: Option<SmolStr>,
    event_type_prefix: Option<SmolStr>,
    source: Option<SmolStr>,
    location: Option<LocationId>,
    entity: Option<EntityId>,
    ancestors_of: Option<LocationId>,
    descendants_of: Option<LocationId>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    crate::setters! {
        option {
            event_type: SmolStr,
            event_type_prefix: SmolStr,
            source: SmolStr,
            location: LocationId,
            entity: EntityId,
            ancestors_of: LocationId,
            descendants_of: LocationId,
        }
    }

    /// The tree-aware predicates (`ancestors_of`, `descendants_of`) are
    /// inclusive of the named Location and need an attached tree; without
    /// one they never match.
    fn matches(&self, event: &Event, tree: Option<&SharedTree>) -> bool {
        if let Some(t) = &self.event_type {
            if event.event_type != *t {
                return false;
            }
        }
        if let Some(prefix) = &self.event_type_prefix {
            if !event.event_type.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(source) = &self.source {
            if event.source != *source {
                return false;
            }
        }
        if let Some(location) = &self.location {
            if event.location_id.as_ref() != Some(location) {
                return false;
            }
        }
        if let Some(entity) = &self.entity {
            if event.entity_id.as_ref() != Some(entity) {
                return false;
            }
        }
        if let Some(anchor) = &self.ancestors_of {
            if !Self::in_lineage(event, tree, anchor, Lineage::Ancestors) {
                return false;
            }
        }
        if let Some(anchor) = &self.descendants_of {
            if !Self::in_lineage(event, tree, anchor, Lineage::Descendants) {
                return false;
            }
        }
        true
    }

    fn in_lineage(
        event: &Event,
        tree: Option<&SharedTree>,
        anchor: &LocationId,
        lineage: Lineage,
    ) -> bool {
        let Some(event_location) = &event.location_id else {
            return false;
        };
        if event_location == anchor {
            return true;
        }
        let Some(tree) = tree else {
            tracing::debug!(%anchor, "tree-aware filter with no tree attached never matches");
            return false;
        };
        let tree = tree.lock();
        match lineage {
            Lineage::Ancestors => {
                tree.ancestors_of(anchor).iter().any(|l| &l.id == event_location)
            }
            Lineage::Descendants => {
                tree.descendants_of(anchor).iter().any(|l| &l.id == event_location)
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Lineage {
    Ancestors,
    Descendants,
}

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    filter: EventFilter,
    handler: Handler,
}

/// The event bus. Cheap to share behind an `Arc`.
pub struct EventBus {
    subscriptions: Mutex<Vec<Subscription>>,
    next_id: Mutex<u64>,
    tree: Option<SharedTree>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// A bus with no tree attached; tree-aware filters never match.
    pub fn new() -> Self {
        Self { subscriptions: Mutex::new(Vec::new()), next_id: Mutex::new(0), tree: None }
    }

    /// A bus whose ancestor/descendant filters consult the given tree.
    pub fn with_tree(tree: SharedTree) -> Self {
        Self { subscriptions: Mutex::new(Vec::new()), next_id: Mutex::new(0), tree: Some(tree) }
    }

    pub fn subscribe(
        &self,
        filter: EventFilter,
        handler: impl Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            SubscriptionId(*next)
        };
        self.subscriptions.lock().push(Subscription { id, filter, handler: Arc::new(handler) });
        id
    }

    /// Returns true if the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.lock();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Dispatch to every matching subscription, in subscription order.
    ///
    /// Each handler invocation is isolated: a failure is logged with the
    /// subscription id and event type, then skipped.
    pub fn publish(&self, event: &Event) {
        let snapshot: Vec<Subscription> = self.subscriptions.lock().clone();
        for sub in &snapshot {
            if !sub.filter.matches(event, self.tree.as_ref()) {
                continue;
            }
            if let Err(error) = (sub.handler)(event) {
                tracing::warn!(
                    subscription = %sub.id,
                    event_type = %event.event_type,
                    %error,
                    "event handler failed; skipping"
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
