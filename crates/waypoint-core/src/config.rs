//! Configuration for the Waypoint dispatcher.
//!
//! The dispatcher consumes two boolean switches owned by its host: whether
//! the experimental instrumentation entry point is live, and whether each
//! observed checkpoint is also emitted as a timing span. Both can be set in
//! code or read from the environment.

use serde::{Deserialize, Serialize};

use crate::clock::ClockSource;

/// Environment variable enabling timing spans.
pub const ENV_TIMING_SPANS: &str = "WAYPOINT_TIMING_SPANS";

/// Environment variable enabling the experimental entry point.
pub const ENV_EXPERIMENTAL: &str = "WAYPOINT_EXPERIMENTAL";

/// Environment variable selecting the clock source (`wall` or `high_resolution`).
pub const ENV_CLOCK: &str = "WAYPOINT_CLOCK";

/// Configuration for a dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Emit a timing span around every observed checkpoint.
    ///
    /// Spans are only opened when at least one listener matches, so this
    /// does not affect the unobserved fast path.
    pub timing_spans: bool,

    /// Timer used for hook timestamps.
    pub clock: ClockSource,

    /// Enable the experimental instrumentation entry point.
    ///
    /// When disabled, the gated entry point runs callbacks directly and
    /// never consults listeners. Read once when the gate is built.
    pub experimental: bool,
}

impl DispatchConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable timing spans.
    pub fn with_timing_spans(mut self, enabled: bool) -> Self {
        self.timing_spans = enabled;
        self
    }

    /// Set the clock source.
    pub fn with_clock(mut self, clock: ClockSource) -> Self {
        self.clock = clock;
        self
    }

    /// Enable the experimental entry point.
    pub fn with_experimental(mut self, enabled: bool) -> Self {
        self.experimental = enabled;
        self
    }

    /// Configuration with every diagnostic enabled.
    pub fn diagnostics() -> Self {
        Self {
            timing_spans: true,
            clock: ClockSource::HighResolution,
            experimental: true,
        }
    }

    /// Configuration that never dispatches through the gate.
    pub fn quiet() -> Self {
        Self {
            timing_spans: false,
            clock: ClockSource::HighResolution,
            experimental: false,
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    ///
    /// Unset or unrecognized values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let timing_spans = lookup(ENV_TIMING_SPANS)
            .and_then(|v| parse_flag(&v))
            .unwrap_or(defaults.timing_spans);
        let experimental = lookup(ENV_EXPERIMENTAL)
            .and_then(|v| parse_flag(&v))
            .unwrap_or(defaults.experimental);
        let clock = match lookup(ENV_CLOCK).map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "wall" => ClockSource::Wall,
            Some(v) if v == "high_resolution" => ClockSource::HighResolution,
            _ => defaults.clock,
        };

        Self {
            timing_spans,
            clock,
            experimental,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
