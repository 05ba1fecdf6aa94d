//! Core error types for Waypoint.
//!
//! Two families live here: errors raised while compiling a subscription
//! pattern, and the captured failure of an instrumented callback. The latter
//! is never returned as an `Err` by the dispatcher; it travels inside the
//! payload of a failed outcome.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error type accepted from instrumented callbacks.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors raised while compiling a subscription pattern.
#[derive(Debug, Error)]
pub enum PatternError {
    /// A segment between two dots (or at either end) is empty.
    #[error("Empty segment at index {index} in pattern '{pattern}'")]
    EmptySegment {
        /// The offending pattern.
        pattern: String,
        /// Zero-based segment index.
        index: usize,
    },

    /// A wildcard shares a segment with other characters, e.g. `ren*`.
    #[error("Wildcard must fill a whole segment: '{segment}' in pattern '{pattern}'")]
    MixedWildcard {
        /// The offending pattern.
        pattern: String,
        /// The offending segment.
        segment: String,
    },

    /// The generated matcher failed to compile.
    #[error("Matcher compilation failed: {0}")]
    Regex(#[from] regex::Error),
}

/// Result type alias for pattern compilation.
pub type PatternResult<T> = std::result::Result<T, PatternError>;

/// The failure of an instrumented callback, as captured by the dispatcher.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// The callback returned an error.
    #[error("{0}")]
    Failed(BoxError),

    /// The callback panicked.
    #[error("callback panicked: {0}")]
    Panicked(String),
}

impl CallbackError {
    /// Capture an error returned by a callback.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        CallbackError::Failed(error.into())
    }

    /// Capture a panic payload from `std::panic::catch_unwind`.
    pub fn from_panic(panic: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = panic.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        CallbackError::Panicked(message)
    }

    /// Short label for structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CallbackError::Failed(_) => "error",
            CallbackError::Panicked(_) => "panic",
        }
    }

    /// Whether this failure came from a panic.
    pub fn is_panic(&self) -> bool {
        matches!(self, CallbackError::Panicked(_))
    }

    /// Attempt to view the returned error as a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            CallbackError::Failed(err) => err.downcast_ref::<E>(),
            CallbackError::Panicked(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("disk full")]
    struct DiskFull;

    #[test]
    fn test_callback_error_downcast() {
        let err = CallbackError::failed(DiskFull);
        assert!(err.downcast_ref::<DiskFull>().is_some());
        assert_eq!(err.to_string(), "disk full");
        assert!(!err.is_panic());
    }

    #[test]
    fn test_callback_error_from_panic() {
        let caught = std::panic::catch_unwind(|| -> u8 { panic!("boom {}", 7) }).unwrap_err();
        let err = CallbackError::from_panic(caught);
        assert!(err.is_panic());
        assert_eq!(err.to_string(), "callback panicked: boom 7");
    }

    #[test]
    fn test_pattern_error_display() {
        let err = PatternError::EmptySegment {
            pattern: "a..b".to_string(),
            index: 1,
        };
        assert_eq!(err.to_string(), "Empty segment at index 1 in pattern 'a..b'");
    }
}
