//! Listener trait and helpers.
//!
//! A listener is the hook object attached to a subscription. For every
//! matching checkpoint it receives `before` ahead of the instrumented work
//! and `after` once the work has finished, whether it succeeded or not.
//! Whatever `before` returns is handed back to the same listener's `after`
//! as a [`Memo`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::clock::Timestamp;
use crate::payload::Payload;

/// Observer of checkpoints.
///
/// # Example
///
/// ```
/// use waypoint_core::{Listener, Memo, Payload, Timestamp};
///
/// struct Stopwatch;
///
/// impl Listener for Stopwatch {
///     fn before(&self, _name: &str, timestamp: Timestamp, _payload: &mut Payload) -> Memo {
///         Memo::new(timestamp)
///     }
///
///     fn after(&self, name: &str, timestamp: Timestamp, _payload: &mut Payload, memo: Memo) {
///         if let Some(start) = memo.take::<Timestamp>() {
///             println!("{name} took {:?}", timestamp.elapsed_since(start));
///         }
///     }
/// }
/// ```
pub trait Listener: Send + Sync {
    /// Called before the instrumented work runs.
    fn before(&self, name: &str, timestamp: Timestamp, payload: &mut Payload) -> Memo;

    /// Called after the instrumented work has finished.
    fn after(&self, name: &str, timestamp: Timestamp, payload: &mut Payload, memo: Memo) {
        let _ = (name, timestamp, payload, memo);
    }

    /// Whether this listener wants `after` calls.
    ///
    /// Listeners returning `false` are skipped when a checkpoint finalizes.
    fn has_after(&self) -> bool {
        true
    }
}

/// Shared listener handle.
pub type SharedListener = Arc<dyn Listener>;

/// Value returned by [`Listener::before`] and passed back to
/// [`Listener::after`].
#[derive(Default)]
pub struct Memo(Option<Box<dyn Any>>);

impl Memo {
    /// A memo carrying nothing.
    pub fn none() -> Self {
        Self(None)
    }

    /// A memo carrying a value.
    pub fn new<T: Any>(value: T) -> Self {
        Self(Some(Box::new(value)))
    }

    /// Whether a value is present.
    pub fn is_some(&self) -> bool {
        self.0.is_some()
    }

    /// Borrow the value if it has type `T`.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.0.as_ref().and_then(|v| v.downcast_ref::<T>())
    }

    /// Take the value if it has type `T`.
    pub fn take<T: Any>(self) -> Option<T> {
        self.0.and_then(|v| v.downcast::<T>().ok()).map(|v| *v)
    }
}

impl fmt::Debug for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(_) => f.write_str("Memo(..)"),
            None => f.write_str("Memo(None)"),
        }
    }
}

type BeforeFn = dyn Fn(&str, Timestamp, &mut Payload) -> Memo + Send + Sync;
type AfterFn = dyn Fn(&str, Timestamp, &mut Payload, Memo) + Send + Sync;

/// A listener assembled from closures.
///
/// ```
/// use waypoint_core::{Hooks, Listener, Memo};
///
/// let hooks = Hooks::before(|name, _ts, _payload| {
///     println!("entering {name}");
///     Memo::none()
/// });
/// assert!(!hooks.has_after());
/// ```
pub struct Hooks {
    before: Box<BeforeFn>,
    after: Option<Box<AfterFn>>,
}

impl Hooks {
    /// Create hooks with only a `before` callback.
    pub fn before<F>(f: F) -> Self
    where
        F: Fn(&str, Timestamp, &mut Payload) -> Memo + Send + Sync + 'static,
    {
        Self {
            before: Box::new(f),
            after: None,
        }
    }

    /// Add an `after` callback.
    pub fn with_after<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Timestamp, &mut Payload, Memo) + Send + Sync + 'static,
    {
        self.after = Some(Box::new(f));
        self
    }

    /// Wrap into a shared listener.
    pub fn into_shared(self) -> SharedListener {
        Arc::new(self)
    }
}

impl Listener for Hooks {
    fn before(&self, name: &str, timestamp: Timestamp, payload: &mut Payload) -> Memo {
        (self.before)(name, timestamp, payload)
    }

    fn after(&self, name: &str, timestamp: Timestamp, payload: &mut Payload, memo: Memo) {
        if let Some(after) = &self.after {
            after(name, timestamp, payload, memo);
        }
    }

    fn has_after(&self) -> bool {
        self.after.is_some()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("after", &self.after.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_memo_roundtrip() {
        let memo = Memo::new(42u32);
        assert!(memo.is_some());
        assert_eq!(memo.get::<u32>(), Some(&42));
        assert_eq!(memo.get::<i64>(), None);
        assert_eq!(memo.take::<u32>(), Some(42));

        assert!(!Memo::none().is_some());
        assert_eq!(Memo::new("text").take::<u32>(), None);
    }

    #[test]
    fn test_hooks_forward_memo() {
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);

        let hooks = Hooks::before(|_, ts, _| Memo::new(ts.as_nanos() as usize)).with_after(
            move |_, _, _, memo| {
                sink.store(memo.take::<usize>().unwrap_or(0), Ordering::SeqCst);
            },
        );
        assert!(hooks.has_after());

        let mut payload = Payload::new();
        let memo = hooks.before("a", Timestamp::from_nanos(7), &mut payload);
        hooks.after("a", Timestamp::from_nanos(9), &mut payload, memo);

        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_hooks_can_mutate_payload() {
        let hooks = Hooks::before(|name, _, payload| {
            payload.insert("seen_by", name.to_string());
            Memo::none()
        });

        let mut payload = Payload::new();
        hooks.before("render", Timestamp::ZERO, &mut payload);
        assert_eq!(payload.get("seen_by").and_then(|v| v.as_str()), Some("render"));
    }
}
