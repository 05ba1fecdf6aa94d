//! Waypoint Core
//!
//! Leaf types shared by the Waypoint instrumentation dispatcher:
//!
//! - [`Pattern`]: compiled, dot-segmented subscription patterns
//! - [`Clock`]: timestamp sources ([`HostClock`], [`ManualClock`])
//! - [`Payload`] and [`PayloadSource`]: data handed to listeners
//! - [`Listener`]: the before/after hook trait, with [`Hooks`] for closures
//! - [`DispatchConfig`]: host-owned switches
//!
//! # Patterns
//!
//! ```
//! use waypoint_core::Pattern;
//!
//! let pattern = Pattern::compile("db.*").unwrap();
//! assert!(pattern.matches("db.query"));
//! assert!(pattern.matches("db.query.prepare"));
//! assert!(!pattern.matches("db"));
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod listener;
pub mod pattern;
pub mod payload;

// Re-export main types at crate root
pub use clock::{Clock, ClockSource, HostClock, ManualClock, SharedClock, Timestamp};
pub use config::DispatchConfig;
pub use error::{BoxError, CallbackError, PatternError, PatternResult};
pub use listener::{Hooks, Listener, Memo, SharedListener};
pub use pattern::Pattern;
pub use payload::{EXCEPTION_KEY, Payload, PayloadSource};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::clock::{Clock, Timestamp};
    pub use crate::config::DispatchConfig;
    pub use crate::error::CallbackError;
    pub use crate::listener::{Hooks, Listener, Memo};
    pub use crate::pattern::Pattern;
    pub use crate::payload::{Payload, PayloadSource};
}
