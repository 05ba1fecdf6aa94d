//! Feature-gated entry point.
//!
//! The gate is chosen once, from [`DispatchConfig::experimental`], when a
//! runtime is built. A closed gate never looks at listeners: the callback
//! runs directly and its panics unwind to the caller. An open gate hands
//! every call to the [`Dispatcher`].
//!
//! [`DispatchConfig::experimental`]: waypoint_core::DispatchConfig::experimental

use std::convert::Infallible;
use std::sync::Arc;

use waypoint_core::{BoxError, CallbackError, Payload, PayloadSource};
use waypoint_dispatch::{Dispatcher, Outcome};

/// The selected instrumentation entry point.
#[derive(Debug, Clone)]
pub enum Gate {
    /// Instrumentation is off; callbacks run bare.
    Disabled,
    /// Instrumentation goes through the dispatcher.
    Enabled(Arc<Dispatcher>),
}

impl Gate {
    /// Select the entry point from the dispatcher's configuration.
    pub fn for_dispatcher(dispatcher: Arc<Dispatcher>) -> Self {
        if dispatcher.config().experimental {
            Gate::Enabled(dispatcher)
        } else {
            Gate::Disabled
        }
    }

    /// Whether calls reach the dispatcher.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Gate::Enabled(_))
    }

    /// Run `callback` as the checkpoint `name`.
    ///
    /// With the gate closed, `name` and `payload` are discarded unevaluated.
    /// An `Err` from the callback is still reported as [`Outcome::Failed`],
    /// carrying an otherwise empty payload.
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
        match self {
            Gate::Enabled(dispatcher) => dispatcher.instrument(name, payload, callback),
            Gate::Disabled => match callback() {
                Ok(value) => Outcome::Completed(value),
                Err(error) => {
                    let mut payload = Payload::new();
                    payload.record_exception(CallbackError::failed(error));
                    Outcome::Failed(payload)
                }
            },
        }
    }

    /// Run an infallible `callback` as the checkpoint `name`.
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
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use waypoint_core::{DispatchConfig, Hooks, Memo};

    use super::*;

    fn counting(dispatcher: &Dispatcher) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        dispatcher
            .subscribe(
                "render",
                Hooks::before(move |_, _, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Memo::none()
                }),
            )
            .unwrap();
        count
    }

    #[test]
    fn test_disabled_gate_bypasses_listeners() {
        let dispatcher = Arc::new(Dispatcher::new(DispatchConfig::quiet()));
        let count = counting(&dispatcher);
        let gate = Gate::for_dispatcher(dispatcher);
        assert!(!gate.is_enabled());

        let built = Cell::new(false);
        let outcome = gate.measure(
            "render",
            PayloadSource::lazy(|| {
                built.set(true);
                Payload::new()
            }),
            || 11,
        );

        assert_eq!(outcome.ok(), Some(11));
        assert!(!built.get());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_enabled_gate_dispatches() {
        let dispatcher = Arc::new(Dispatcher::new(DispatchConfig::new().with_experimental(true)));
        let count = counting(&dispatcher);
        let gate = Gate::for_dispatcher(dispatcher);
        assert!(gate.is_enabled());

        assert_eq!(gate.measure("render", (), || 11).ok(), Some(11));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disabled_gate_reports_errors() {
        let outcome: Outcome<()> = Gate::Disabled.instrument("job", (), || Err("bad input"));
        assert_eq!(outcome.exception().unwrap().to_string(), "bad input");
        assert!(outcome.payload().unwrap().fields().is_empty());
    }

    #[test]
    fn test_disabled_gate_lets_panics_unwind() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            Gate::Disabled.measure("job", (), || -> u8 { panic!("unguarded") })
        }));
        assert!(result.is_err());
    }
}
