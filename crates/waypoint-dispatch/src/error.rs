//! Error types for the dispatcher.

use thiserror::Error;

use waypoint_core::PatternError;

/// Errors raised by registry operations.
///
/// Failures of instrumented callbacks are not errors of the dispatcher;
/// they are reported through [`Outcome::Failed`](crate::Outcome::Failed).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The subscription pattern could not be compiled. The registry is unchanged.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] PatternError),
}

/// Result type for dispatcher operations.
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
