//! The instrumentation engine.
//!
//! [`Dispatcher`] owns the subscriber registry and the per-name resolution
//! cache, and drives the checkpoint protocol:
//!
//! 1. With no subscribers at all, or none matching the name, the callback
//!    runs directly. The payload source is never evaluated and the clock is
//!    never read.
//! 2. Otherwise the payload is materialized, every matching listener's
//!    `before` runs in subscription order, and the callback runs.
//! 3. Finalization always runs exactly once: every matching listener that
//!    has an `after` hook receives it, again in subscription order, along
//!    with the memo its own `before` returned.
//!
//! A callback that returns `Err` or panics does not fail `instrument`; the
//! failure is recorded on the payload, which comes back as
//! [`Outcome::Failed`]. Panics raised by listener hooks are not caught and
//! unwind through `instrument`.

use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use waypoint_core::{
    BoxError, CallbackError, Clock, DispatchConfig, HostClock, Listener, Memo, Pattern, Payload,
    PayloadSource, SharedClock, SharedListener,
};

use crate::cache::{Listeners, ResolutionCache};
use crate::error::DispatchResult;
use crate::outcome::Outcome;
use crate::registry::{Registry, Subscription};

/// Subscriber registry plus instrumentation engine.
///
/// # Example
///
/// ```
/// use waypoint_core::{Hooks, Memo};
/// use waypoint_dispatch::Dispatcher;
///
/// let dispatcher = Dispatcher::new(Default::default());
/// dispatcher
///     .subscribe("render", Hooks::before(|name, _, _| {
///         println!("-> {name}");
///         Memo::none()
///     }))
///     .unwrap();
///
/// let outcome = dispatcher.measure("render.header", (), || 2 + 2);
/// assert_eq!(outcome.ok(), Some(4));
/// ```
pub struct Dispatcher {
    /// Subscribers in insertion order.
    registry: RwLock<Registry>,
    /// Resolved listeners per event name.
    cache: ResolutionCache,
    /// Mirror of the registry length, read without locking on the fast path.
    active: AtomicUsize,
    /// Timestamp source for hooks.
    clock: SharedClock,
    /// Host switches.
    config: DispatchConfig,
}

impl Dispatcher {
    /// Create a dispatcher reading the clock named in `config`.
    pub fn new(config: DispatchConfig) -> Self {
        let clock: SharedClock = Arc::new(HostClock::new(config.clock));
        Self::with_clock(config, clock)
    }

    /// Create a dispatcher with an explicit clock.
    pub fn with_clock(config: DispatchConfig, clock: SharedClock) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            cache: ResolutionCache::default(),
            active: AtomicUsize::new(0),
            clock,
            config,
        }
    }

    /// The configuration this dispatcher was built with.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// The clock used for hook timestamps.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    // Registry

    /// Subscribe a listener to every event name matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidPattern`](crate::DispatchError::InvalidPattern)
    /// if the pattern cannot be compiled; the registry is left unchanged.
    pub fn subscribe<L: Listener + 'static>(
        &self,
        pattern: &str,
        listener: L,
    ) -> DispatchResult<Subscription> {
        self.subscribe_shared(pattern, Arc::new(listener))
    }

    /// Subscribe an already shared listener.
    pub fn subscribe_shared(
        &self,
        pattern: &str,
        listener: SharedListener,
    ) -> DispatchResult<Subscription> {
        let pattern = Pattern::compile(pattern)?;

        let mut registry = self.registry.write();
        let subscription = registry.push(pattern, listener);
        self.active.store(registry.len(), Ordering::Release);
        self.cache.clear();
        drop(registry);

        debug!(
            subscription = %subscription.id(),
            pattern = subscription.pattern(),
            "Listener subscribed"
        );
        Ok(subscription)
    }

    /// Subscribe a listener for as long as the returned guard lives.
    pub fn subscribe_scoped<L: Listener + 'static>(
        self: &Arc<Self>,
        pattern: &str,
        listener: L,
    ) -> DispatchResult<SubscriptionGuard> {
        let subscription = self.subscribe(pattern, listener)?;
        Ok(SubscriptionGuard {
            dispatcher: Arc::clone(self),
            subscription: Some(subscription),
        })
    }

    /// Remove a subscription.
    ///
    /// Unknown handles are ignored. Returns whether a subscriber was
    /// removed. The resolution cache is invalidated either way.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let mut registry = self.registry.write();
        let removed = registry.remove(subscription.id());
        self.active.store(registry.len(), Ordering::Release);
        self.cache.clear();
        drop(registry);

        debug!(
            subscription = %subscription.id(),
            pattern = subscription.pattern(),
            removed,
            "Listener unsubscribed"
        );
        removed
    }

    /// Remove every subscriber and empty the resolution cache.
    pub fn reset(&self) {
        let mut registry = self.registry.write();
        let cleared = registry.clear();
        self.active.store(0, Ordering::Release);
        self.cache.clear();
        drop(registry);

        debug!(cleared, "Dispatcher reset");
    }

    /// Number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Whether there are no subscribers.
    pub fn is_empty(&self) -> bool {
        self.subscriber_count() == 0
    }

    /// Subscribed patterns, in subscription order.
    pub fn patterns(&self) -> Vec<String> {
        self.registry.read().patterns()
    }

    // Resolution

    /// Listeners for `name`, in subscription order.
    ///
    /// Results are cached per name until the registry next changes.
    pub fn resolve(&self, name: &str) -> Listeners {
        // Held across the lookup so a concurrent mutation cannot interleave
        // between computing an entry and storing it.
        let registry = self.registry.read();

        if let Some(listeners) = self.cache.get(name) {
            trace!(checkpoint = name, listeners = listeners.len(), "Resolution cache hit");
            return listeners;
        }

        let listeners = self.cache.insert(name, registry.matching(name));
        trace!(checkpoint = name, listeners = listeners.len(), "Resolution cache miss");
        listeners
    }

    /// Whether any listener would observe `name`.
    pub fn is_observed(&self, name: &str) -> bool {
        !self.is_empty() && !self.resolve(name).is_empty()
    }

    /// Number of names currently held in the resolution cache.
    pub fn cached_names(&self) -> usize {
        self.cache.len()
    }

    // Instrumentation

    /// Run `callback` as the checkpoint `name`.
    ///
    /// The payload is only materialized when at least one listener matches.
    /// An `Err` or panic from the callback is captured into the payload and
    /// returned as [`Outcome::Failed`]; `instrument` itself never fails.
    pub fn instrument<'a, T, E, F>(
        &self,
        name: &str,
        payload: impl Into<PayloadSource<'a>>,
        callback: F,
    ) -> Outcome<T>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<BoxError>,
    {
        if self.is_empty() {
            return run_unobserved(name, callback);
        }

        let listeners = self.resolve(name);
        if listeners.is_empty() {
            return run_unobserved(name, callback);
        }

        let mut payload = payload.into().materialize();

        let span = self.config.timing_spans.then(|| {
            tracing::debug_span!("checkpoint", checkpoint = name, label = %payload.label())
        });
        let _entered = span.as_ref().map(|span| span.enter());

        let start = self.clock.now();
        let memos: Vec<Memo> = listeners
            .iter()
            .map(|listener| listener.before(name, start, &mut payload))
            .collect();

        let value = match panic::catch_unwind(AssertUnwindSafe(callback)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(error)) => {
                capture(name, &mut payload, CallbackError::failed(error));
                None
            }
            Err(panic) => {
                capture(name, &mut payload, CallbackError::from_panic(panic));
                None
            }
        };

        self.finalize(name, &listeners, &mut payload, memos);

        match value {
            Some(value) => Outcome::Completed(value),
            None => Outcome::Failed(payload),
        }
    }

    /// Run an infallible `callback` as the checkpoint `name`.
    ///
    /// Panics are still captured into [`Outcome::Failed`].
    pub fn measure<'a, T, F>(
        &self,
        name: &str,
        payload: impl Into<PayloadSource<'a>>,
        callback: F,
    ) -> Outcome<T>
    where
        F: FnOnce() -> T,
    {
        self.instrument(name, payload, || Ok::<T, Infallible>(callback()))
    }

    /// Deliver `after` to every listener that has one, pairing each with
    /// the memo its own `before` produced.
    fn finalize(&self, name: &str, listeners: &Listeners, payload: &mut Payload, memos: Vec<Memo>) {
        let end = self.clock.now();
        for (listener, memo) in listeners.iter().zip(memos) {
            if listener.has_after() {
                listener.after(name, end, payload, memo);
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatchConfig::default())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("subscriber_count", &self.subscriber_count())
            .field("cached_names", &self.cached_names())
            .field("config", &self.config)
            .finish()
    }
}

/// Fast path: no listener observes the checkpoint.
fn run_unobserved<T, E, F>(name: &str, callback: F) -> Outcome<T>
where
    F: FnOnce() -> Result<T, E>,
    E: Into<BoxError>,
{
    let error = match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(value)) => return Outcome::Completed(value),
        Ok(Err(error)) => CallbackError::failed(error),
        Err(panic) => CallbackError::from_panic(panic),
    };
    let mut payload = Payload::new();
    capture(name, &mut payload, error);
    Outcome::Failed(payload)
}

fn capture(name: &str, payload: &mut Payload, error: CallbackError) {
    warn!(
        checkpoint = name,
        kind = error.kind(),
        error = %error,
        "Instrumented callback failed"
    );
    payload.record_exception(error);
}

/// Keeps a subscription alive; unsubscribes when dropped.
pub struct SubscriptionGuard {
    dispatcher: Arc<Dispatcher>,
    subscription: Option<Subscription>,
}

impl SubscriptionGuard {
    /// The guarded subscription.
    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    /// Keep the subscription past the guard's lifetime.
    pub fn detach(mut self) -> Option<Subscription> {
        self.subscription.take()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.dispatcher.unsubscribe(&subscription);
        }
    }
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("subscription", &self.subscription)
            .finish()
    }
}
