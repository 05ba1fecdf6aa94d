//! # Waypoint - Named Checkpoints with Before/After Observers
//!
//! Waypoint is a lightweight, in-process instrumentation dispatcher. Code
//! marks named checkpoints such as `render.component`; independently
//! registered listeners subscribe to those names, exactly or by
//! dot-segmented prefix and wildcard, and receive paired `before`/`after`
//! callbacks around the instrumented work.
//!
//! ## Features
//!
//! - **Hierarchical patterns**: `render` observes `render.component.layout`,
//!   `*.flush` observes `db.flush` and `cache.flush`
//! - **Zero cost when unobserved**: no payload, timing, or locking work when
//!   nothing listens
//! - **Failure capture**: a failing callback never fails the caller; the
//!   failure comes back inside the checkpoint payload
//! - **Gated entry point**: an experimental switch, resolved once, that turns
//!   every checkpoint into a bare call
//!
//! ## Quick Start
//!
//! ```
//! use waypoint::prelude::*;
//!
//! let runtime = Waypoint::builder()
//!     .with_config(DispatchConfig::new().with_experimental(true))
//!     .with_listener("render", LoggingListener::new())
//!     .build()
//!     .unwrap();
//!
//! let outcome = runtime.measure("render.header", Payload::new().with("id", 7), || 21 * 2);
//! assert_eq!(outcome.ok(), Some(42));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Your Application                     │
//! ├─────────────────────────────────────────────────────────┤
//! │          waypoint (facade, gate, global runtime)        │
//! ├──────────────────┬───────────────────┬──────────────────┤
//! │ waypoint-dispatch│  waypoint-observe │                  │
//! │ (registry, cache,│  (logging and     │                  │
//! │  instrument)     │   collecting)     │                  │
//! ├──────────────────┴───────────────────┘                  │
//! │  waypoint-core (patterns, clock, payload, listener)     │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use waypoint_core::{
    BoxError, DispatchConfig, HostClock, Listener, PayloadSource, SharedClock, SharedListener,
};
use waypoint_dispatch::{DispatchError, Dispatcher, Outcome, Subscription};

pub mod gate;
pub mod global;

pub use gate::Gate;
pub use global::{global, init};

// Re-export from sub-crates
pub use waypoint_core;
pub use waypoint_dispatch;
pub use waypoint_observe;

/// Main entry point for Waypoint.
pub struct Waypoint;

impl Waypoint {
    /// Create a new Waypoint runtime builder.
    pub fn builder() -> WaypointBuilder {
        WaypointBuilder::new()
    }

    /// Create a runtime configured from the environment.
    pub fn from_env() -> WaypointRuntime {
        WaypointRuntime::new(DispatchConfig::from_env())
    }
}

/// Builder for configuring a Waypoint runtime.
pub struct WaypointBuilder {
    config: DispatchConfig,
    clock: Option<SharedClock>,
    listeners: Vec<(String, SharedListener)>,
}

impl WaypointBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: DispatchConfig::default(),
            clock: None,
            listeners: Vec::new(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable or disable the experimental entry point.
    pub fn with_experimental(mut self, enabled: bool) -> Self {
        self.config.experimental = enabled;
        self
    }

    /// Enable or disable timing spans.
    pub fn with_timing_spans(mut self, enabled: bool) -> Self {
        self.config.timing_spans = enabled;
        self
    }

    /// Use a custom clock instead of the one named in the configuration.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Subscribe a listener when the runtime is built.
    pub fn with_listener<L: Listener + 'static>(self, pattern: impl Into<String>, listener: L) -> Self {
        self.with_shared_listener(pattern, Arc::new(listener))
    }

    /// Subscribe a shared listener when the runtime is built.
    pub fn with_shared_listener(
        mut self,
        pattern: impl Into<String>,
        listener: SharedListener,
    ) -> Self {
        self.listeners.push((pattern.into(), listener));
        self
    }

    /// Build the runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a listener pattern cannot be compiled.
    pub fn build(self) -> Result<WaypointRuntime, WaypointError> {
        let runtime = match self.clock {
            Some(clock) => WaypointRuntime::with_clock(self.config, clock),
            None => WaypointRuntime::new(self.config),
        };

        for (pattern, listener) in self.listeners {
            runtime.dispatcher.subscribe_shared(&pattern, listener)?;
        }

        Ok(runtime)
    }
}

impl Default for WaypointBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured Waypoint runtime: a dispatcher plus its gate.
pub struct WaypointRuntime {
    dispatcher: Arc<Dispatcher>,
    gate: Gate,
}

impl WaypointRuntime {
    /// Create a runtime reading the clock named in `config`.
    pub fn new(config: DispatchConfig) -> Self {
        let clock: SharedClock = Arc::new(HostClock::new(config.clock));
        Self::with_clock(config, clock)
    }

    /// Create a runtime with an explicit clock.
    pub fn with_clock(config: DispatchConfig, clock: SharedClock) -> Self {
        let dispatcher = Arc::new(Dispatcher::with_clock(config, clock));
        let gate = Gate::for_dispatcher(Arc::clone(&dispatcher));
        Self { dispatcher, gate }
    }

    /// Get the dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Get the gate selected at construction.
    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Subscribe a listener.
    pub fn subscribe<L: Listener + 'static>(
        &self,
        pattern: &str,
        listener: L,
    ) -> Result<Subscription, WaypointError> {
        Ok(self.dispatcher.subscribe(pattern, listener)?)
    }

    /// Subscribe a shared listener.
    pub fn subscribe_shared(
        &self,
        pattern: &str,
        listener: SharedListener,
    ) -> Result<Subscription, WaypointError> {
        Ok(self.dispatcher.subscribe_shared(pattern, listener)?)
    }

    /// Remove a subscription. Unknown handles are ignored.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.dispatcher.unsubscribe(subscription)
    }

    /// Remove every subscriber.
    pub fn reset(&self) {
        self.dispatcher.reset();
    }

    /// Run `callback` as the checkpoint `name` through the gate.
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
        self.gate.instrument(name, payload, callback)
    }

    /// Run an infallible `callback` as the checkpoint `name` through the gate.
    pub fn measure<'a, T, F>(
        &self,
        name: &str,
        payload: impl Into<PayloadSource<'a>>,
        callback: F,
    ) -> Outcome<T>
    where
        F: FnOnce() -> T,
    {
        self.gate.measure(name, payload, callback)
    }
}

impl std::fmt::Debug for WaypointRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaypointRuntime")
            .field("dispatcher", &self.dispatcher)
            .field("gate_enabled", &self.gate.is_enabled())
            .finish()
    }
}

/// Errors from the Waypoint runtime.
#[derive(Debug, thiserror::Error)]
pub enum WaypointError {
    /// Dispatcher error.
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// The global runtime was already initialized.
    #[error("Global runtime already initialized")]
    AlreadyInitialized,
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::{Gate, Waypoint, WaypointBuilder, WaypointError, WaypointRuntime};

    // Core types
    pub use waypoint_core::{
        CallbackError, Clock, DispatchConfig, Hooks, Listener, ManualClock, Memo, Pattern, Payload,
        PayloadSource, Timestamp,
    };

    // Dispatch types
    pub use waypoint_dispatch::{Dispatcher, Outcome, Subscription};

    // Observability types
    pub use waypoint_observe::{CollectingListener, LoggingListener};

    // Common std types
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use waypoint_core::SharedListener;

    use super::prelude::*;

    #[test]
    fn test_waypoint_builder() {
        let collector = Arc::new(CollectingListener::new(10));
        let runtime = Waypoint::builder()
            .with_experimental(true)
            .with_shared_listener("render", Arc::clone(&collector) as SharedListener)
            .with_listener("db.*", Hooks::before(|_, _, _| Memo::none()))
            .build()
            .unwrap();

        assert!(runtime.gate().is_enabled());
        assert_eq!(runtime.dispatcher().patterns(), vec!["render", "db.*"]);

        let _ = runtime.measure("render.list", (), || ());
        assert_eq!(collector.len(), 2);
    }

    #[test]
    fn test_builder_rejects_bad_pattern() {
        let err = Waypoint::builder()
            .with_listener("render.", Hooks::before(|_, _, _| Memo::none()))
            .build()
            .unwrap_err();
        assert!(matches!(err, WaypointError::Dispatch(_)));
    }

    #[test]
    fn test_runtime_with_manual_clock() {
        let clock = ManualClock::new();
        let collector = Arc::new(CollectingListener::new(10));
        let runtime = Waypoint::builder()
            .with_experimental(true)
            .with_clock(Arc::new(clock.clone()))
            .with_shared_listener("job", Arc::clone(&collector) as SharedListener)
            .build()
            .unwrap();

        let outcome: Outcome<u32> = runtime.instrument(
            "job.import",
            Payload::new().with("rows", 10),
            || {
                clock.advance(Duration::from_millis(2));
                Err("corrupt row")
            },
        );

        let payload = outcome.payload().unwrap();
        assert_eq!(payload.get("rows"), Some(&json!(10)));
        assert_eq!(payload.exception().unwrap().to_string(), "corrupt row");

        let records = collector.records();
        assert_eq!(
            records[1].timestamp.elapsed_since(records[0].timestamp),
            Duration::from_millis(2)
        );
    }

    #[test]
    fn test_disabled_runtime_still_accepts_subscribers() {
        let runtime = Waypoint::builder().build().unwrap();
        let collector = Arc::new(CollectingListener::new(10));
        let handle = runtime
            .subscribe_shared("render", Arc::clone(&collector) as SharedListener)
            .unwrap();

        assert!(!runtime.gate().is_enabled());
        assert_eq!(runtime.measure("render", (), || 5).ok(), Some(5));
        assert!(collector.is_empty());

        // The dispatcher itself is still usable directly.
        let _ = runtime.dispatcher().measure("render", (), || ());
        assert_eq!(collector.len(), 2);

        assert!(runtime.unsubscribe(&handle));
        runtime.reset();
        assert!(runtime.dispatcher().is_empty());
    }
}
