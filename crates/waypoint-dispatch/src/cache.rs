//! Per-name listener resolution cache.
//!
//! Entries are keyed by literal event name and never expire on their own.
//! The dispatcher clears the whole cache on every registry mutation, since
//! one subscriber can change the listener set of any number of names.

use std::sync::Arc;

use dashmap::DashMap;

use waypoint_core::SharedListener;

/// Listeners resolved for one event name, in subscription order.
pub type Listeners = Arc<[SharedListener]>;

#[derive(Default)]
pub(crate) struct ResolutionCache {
    entries: DashMap<String, Listeners>,
}

impl ResolutionCache {
    pub(crate) fn get(&self, name: &str) -> Option<Listeners> {
        self.entries.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Store a resolution. An entry already present for `name` wins, so
    /// concurrent resolvers all hand out the same list.
    pub(crate) fn insert(&self, name: &str, listeners: Listeners) -> Listeners {
        let entry = self.entries.entry(name.to_string()).or_insert(listeners);
        Arc::clone(entry.value())
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
