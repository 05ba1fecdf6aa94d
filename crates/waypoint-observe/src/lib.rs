//! Waypoint Observability
//!
//! Ready-made listeners for the Waypoint instrumentation dispatcher:
//!
//! - [`LoggingListener`]: logs each checkpoint and its duration via `tracing`
//! - [`CollectingListener`]: records hook calls in memory
//!
//! # Logging
//!
//! ```ignore
//! use waypoint_observe::LoggingListener;
//!
//! dispatcher.subscribe("render", LoggingListener::new().with_level(tracing::Level::INFO))?;
//! ```
//!
//! # Collecting
//!
//! ```ignore
//! use std::sync::Arc;
//! use waypoint_observe::CollectingListener;
//!
//! let collector = Arc::new(CollectingListener::new(1_000));
//! dispatcher.subscribe_shared("db.*", collector.clone())?;
//!
//! // ... run instrumented code ...
//!
//! for record in collector.records() {
//!     println!("{:?} {} at {}", record.phase, record.name, record.timestamp);
//! }
//! ```

pub mod collecting;
pub mod logging;

// Re-export main types
pub use collecting::{CheckpointRecord, CollectingListener, Phase};
pub use logging::LoggingListener;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::collecting::{CollectingListener, Phase};
    pub use crate::logging::LoggingListener;
}
