//! Waypoint Dispatch
//!
//! The subscriber registry and instrumentation engine of Waypoint.
//!
//! - [`Dispatcher`]: registry, per-name resolution cache, and the
//!   `instrument` protocol
//! - [`Subscription`]: handle returned by `subscribe`
//! - [`Outcome`]: result of an instrumented call
//!
//! # Usage
//!
//! ```ignore
//! use waypoint_core::{Hooks, Memo, Payload};
//! use waypoint_dispatch::Dispatcher;
//!
//! let dispatcher = Dispatcher::default();
//! let handle = dispatcher.subscribe("db.*", Hooks::before(|name, ts, payload| {
//!     Memo::new(ts)
//! }))?;
//!
//! let rows = dispatcher.instrument("db.query", Payload::new().with("table", "users"), || {
//!     run_query()
//! });
//!
//! dispatcher.unsubscribe(&handle);
//! ```

pub mod cache;
pub mod dispatcher;
pub mod error;
pub mod outcome;
pub mod registry;

// Re-export main types
pub use cache::Listeners;
pub use dispatcher::{Dispatcher, SubscriptionGuard};
pub use error::{DispatchError, DispatchResult};
pub use outcome::Outcome;
pub use registry::{Subscription, SubscriptionId};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::dispatcher::Dispatcher;
    pub use crate::error::{DispatchError, DispatchResult};
    pub use crate::outcome::Outcome;
    pub use crate::registry::Subscription;
}
