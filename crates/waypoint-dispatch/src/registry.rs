//! Subscriber registry.
//!
//! Subscribers are kept in insertion order. That order decides the order in
//! which listeners fire, for both `before` and `after`.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use waypoint_core::{Pattern, SharedListener};

/// Unique identifier of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe later.
///
/// Every call to `subscribe` produces a distinct handle, even for the same
/// pattern and listener.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: SubscriptionId,
    pattern: String,
}

impl Subscription {
    /// The subscription's identifier.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The pattern this subscription was created with.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Describe this subscription as JSON, for diagnostics.
    pub fn describe(&self) -> Value {
        serde_json::json!({
            "id": self.id.to_string(),
            "pattern": self.pattern,
        })
    }
}

/// One registry entry.
struct Subscriber {
    id: SubscriptionId,
    pattern: Pattern,
    listener: SharedListener,
}

/// Ordered collection of subscribers.
#[derive(Default)]
pub(crate) struct Registry {
    subscribers: Vec<Subscriber>,
}

impl Registry {
    /// Append a subscriber.
    pub(crate) fn push(&mut self, pattern: Pattern, listener: SharedListener) -> Subscription {
        let id = SubscriptionId::new();
        let handle = Subscription {
            id,
            pattern: pattern.as_str().to_string(),
        };
        self.subscribers.push(Subscriber {
            id,
            pattern,
            listener,
        });
        handle
    }

    /// Remove the subscriber with the given identifier.
    ///
    /// Returns whether a subscriber was removed.
    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        match self.subscribers.iter().position(|s| s.id == id) {
            Some(index) => {
                self.subscribers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove every subscriber, returning how many there were.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.subscribers.len();
        self.subscribers.clear();
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Patterns in subscription order.
    pub(crate) fn patterns(&self) -> Vec<String> {
        self.subscribers
            .iter()
            .map(|s| s.pattern.as_str().to_string())
            .collect()
    }

    /// Listeners whose pattern accepts `name`, in subscription order.
    pub(crate) fn matching(&self, name: &str) -> Arc<[SharedListener]> {
        self.subscribers
            .iter()
            .filter(|s| s.pattern.matches(name))
            .map(|s| Arc::clone(&s.listener))
            .collect()
    }
}
