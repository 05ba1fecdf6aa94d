//! Process-wide Waypoint context.
//!
//! Most hosts want one registry shared by every call site. The global
//! runtime is built on first use from the environment
//! ([`DispatchConfig::from_env`]), or explicitly with [`init`] before any
//! other call. Its gate is fixed from then on.

use std::sync::OnceLock;

use waypoint_core::{BoxError, DispatchConfig, Listener, PayloadSource};
use waypoint_dispatch::{Outcome, Subscription};

use crate::{WaypointError, WaypointRuntime};

static GLOBAL: OnceLock<WaypointRuntime> = OnceLock::new();

/// Initialize the global runtime with an explicit configuration.
///
/// # Errors
///
/// Returns [`WaypointError::AlreadyInitialized`] if the global runtime
/// already exists, including when it was created implicitly by an earlier
/// call to [`global`].
pub fn init(config: DispatchConfig) -> Result<&'static WaypointRuntime, WaypointError> {
    let mut created = false;
    let runtime = GLOBAL.get_or_init(|| {
        created = true;
        WaypointRuntime::new(config)
    });

    if created {
        tracing::debug!(gate = runtime.gate().is_enabled(), "Global runtime initialized");
        Ok(runtime)
    } else {
        Err(WaypointError::AlreadyInitialized)
    }
}

/// The global runtime, creating it from the environment if needed.
pub fn global() -> &'static WaypointRuntime {
    GLOBAL.get_or_init(|| {
        let config = DispatchConfig::from_env();
        tracing::debug!(?config, "Global runtime initialized from environment");
        WaypointRuntime::new(config)
    })
}

/// Subscribe a listener on the global runtime.
pub fn subscribe<L: Listener + 'static>(
    pattern: &str,
    listener: L,
) -> Result<Subscription, WaypointError> {
    global().subscribe(pattern, listener)
}

/// Remove a subscription from the global runtime.
pub fn unsubscribe(subscription: &Subscription) -> bool {
    global().unsubscribe(subscription)
}

/// Remove every subscriber from the global runtime.
pub fn reset() {
    global().reset();
}

/// Run `callback` as the checkpoint `name` through the global gate.
pub fn instrument<'a, T, E, F>(
    name: &str,
    payload: impl Into<PayloadSource<'a>>,
    callback: F,
) -> Outcome<T>
where
    F: FnOnce() -> Result<T, E>,
    E: Into<BoxError>,
{
    global().instrument(name, payload, callback)
}

/// Run an infallible `callback` as the checkpoint `name` through the global gate.
pub fn measure<'a, T, F>(name: &str, payload: impl Into<PayloadSource<'a>>, callback: F) -> Outcome<T>
where
    F: FnOnce() -> T,
{
    global().measure(name, payload, callback)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use waypoint_core::SharedListener;
    use waypoint_observe::CollectingListener;

    use super::*;

    // The only test in this crate that touches the global runtime.
    #[test]
    fn test_global_lifecycle() {
        let runtime = init(DispatchConfig::new().with_experimental(true)).unwrap();
        assert!(runtime.gate().is_enabled());
        assert!(matches!(
            init(DispatchConfig::quiet()),
            Err(WaypointError::AlreadyInitialized)
        ));
        assert!(std::ptr::eq(runtime, global()));

        let collector = Arc::new(CollectingListener::new(16));
        let handle = global()
            .subscribe_shared("app", Arc::clone(&collector) as SharedListener)
            .unwrap();

        assert_eq!(measure("app.start", (), || 1).ok(), Some(1));
        assert_eq!(collector.len(), 2);

        assert!(unsubscribe(&handle));
        let second = subscribe("app", CollectingListener::new(4)).unwrap();
        assert_eq!(global().dispatcher().subscriber_count(), 1);

        reset();
        assert!(global().dispatcher().is_empty());
        assert!(!unsubscribe(&second));

        let outcome: Outcome<()> = instrument("app.stop", (), || Err("shutdown"));
        assert!(outcome.is_failed());
        assert_eq!(collector.len(), 2);
    }
}
