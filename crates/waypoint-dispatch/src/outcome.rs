//! Result of an instrumented call.

use std::sync::Arc;

use waypoint_core::{CallbackError, Payload};

/// What an instrumented callback produced.
///
/// The dispatcher never propagates a callback failure. Instead the failure
/// is recorded on the checkpoint payload and the payload is returned as
/// [`Outcome::Failed`].
#[must_use = "a failed callback is only reported through the outcome"]
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The callback returned normally.
    Completed(T),
    /// The callback failed; the payload carries the failure.
    Failed(Payload),
}

impl<T> Outcome<T> {
    /// Whether the callback returned normally.
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    /// Whether the callback failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// The callback's value, if it completed.
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Failed(_) => None,
        }
    }

    /// The payload of a failed call.
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Outcome::Completed(_) => None,
            Outcome::Failed(payload) => Some(payload),
        }
    }

    /// The captured failure, if any.
    pub fn exception(&self) -> Option<&Arc<CallbackError>> {
        self.payload().and_then(Payload::exception)
    }

    /// Convert into a `Result`, with the failure payload as the error.
    pub fn into_result(self) -> Result<T, Payload> {
        match self {
            Outcome::Completed(value) => Ok(value),
            Outcome::Failed(payload) => Err(payload),
        }
    }

    /// The callback's value, if it completed.
    pub fn ok(self) -> Option<T> {
        self.into_result().ok()
    }

    /// Map the completed value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Failed(payload) => Outcome::Failed(payload),
        }
    }

    /// The completed value, or one computed from the failure payload.
    pub fn unwrap_or_else<F: FnOnce(Payload) -> T>(self, f: F) -> T {
        match self {
            Outcome::Completed(value) => value,
            Outcome::Failed(payload) => f(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed() -> Outcome<u32> {
        let mut payload = Payload::new().with("step", "load");
        payload.record_exception(CallbackError::Panicked("bad".to_string()));
        Outcome::Failed(payload)
    }

    #[test]
    fn test_completed_outcome() {
        let outcome = Outcome::Completed(2u32);
        assert!(outcome.is_completed());
        assert_eq!(outcome.value(), Some(&2));
        assert!(outcome.exception().is_none());
        assert_eq!(outcome.map(|v| v * 10).ok(), Some(20));
    }

    #[test]
    fn test_failed_outcome() {
        let outcome = failed();
        assert!(outcome.is_failed());
        assert!(outcome.exception().is_some_and(|e| e.is_panic()));
        assert_eq!(outcome.clone().unwrap_or_else(|_| 0), 0);

        let payload = outcome.into_result().unwrap_err();
        assert_eq!(payload.get("step").and_then(|v| v.as_str()), Some("load"));
    }
}
