//! Timestamp sources for checkpoint hooks.
//!
//! Listeners receive a [`Timestamp`] in both `before` and `after`. Callers
//! must not assume a particular epoch: larger means later, and the
//! difference between two timestamps from the same clock is elapsed time.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A point in time, in nanoseconds from an unspecified origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The origin.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a timestamp from nanoseconds.
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Nanoseconds since the clock's origin.
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Time since the clock's origin.
    pub const fn as_duration(self) -> Duration {
        Duration::from_nanos(self.0)
    }

    /// Time elapsed between `earlier` and `self`, saturating at zero.
    pub fn elapsed_since(self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// A source of timestamps.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> Timestamp;
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Which host timer a [`HostClock`] reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockSource {
    /// Monotonic high-resolution timer.
    #[default]
    HighResolution,
    /// Coarse wall-clock time since the Unix epoch.
    Wall,
}

/// Clock backed by the host's timers.
///
/// Readings never go backwards, even when the wall clock is adjusted.
#[derive(Debug)]
pub struct HostClock {
    source: ClockSource,
    origin: Instant,
    last: AtomicU64,
}

impl HostClock {
    /// Create a clock reading the given source.
    pub fn new(source: ClockSource) -> Self {
        Self {
            source,
            origin: Instant::now(),
            last: AtomicU64::new(0),
        }
    }

    /// Create a clock using the high-resolution timer.
    pub fn high_resolution() -> Self {
        Self::new(ClockSource::HighResolution)
    }

    /// Create a clock using wall-clock time.
    pub fn wall() -> Self {
        Self::new(ClockSource::Wall)
    }

    /// The source this clock reads.
    pub fn source(&self) -> ClockSource {
        self.source
    }

    fn read(&self) -> u64 {
        match self.source {
            ClockSource::HighResolution => {
                u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
            }
            ClockSource::Wall => SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
                .unwrap_or(0),
        }
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::high_resolution()
    }
}

impl Clock for HostClock {
    fn now(&self) -> Timestamp {
        let reading = self.read();
        let previous = self.last.fetch_max(reading, Ordering::AcqRel);
        Timestamp(previous.max(reading))
    }
}

/// Manually driven clock for deterministic tests.
///
/// Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    current: Arc<Mutex<u64>>,
}

impl ManualClock {
    /// Create a clock stopped at the origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock stopped at the given timestamp.
    pub fn starting_at(timestamp: Timestamp) -> Self {
        Self {
            current: Arc::new(Mutex::new(timestamp.0)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        let mut current = self.current.lock();
        *current = current.saturating_add(nanos);
    }

    /// Set the clock to a specific timestamp.
    pub fn set(&self, timestamp: Timestamp) {
        *self.current.lock() = timestamp.0;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(*self.current.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_resolution_clock_is_non_decreasing() {
        let clock = HostClock::high_resolution();
        let mut previous = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next >= previous);
            previous = next;
        }
    }

    #[test]
    fn test_wall_clock_measures_elapsed_time() {
        let clock = HostClock::wall();
        assert_eq!(clock.source(), ClockSource::Wall);

        let start = clock.now();
        std::thread::sleep(Duration::from_millis(5));
        let end = clock.now();
        assert!(end.elapsed_since(start) >= Duration::from_millis(5));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::starting_at(Timestamp::from_nanos(100));
        let shared = clock.clone();

        assert_eq!(clock.now().as_nanos(), 100);
        shared.advance(Duration::from_micros(2));
        assert_eq!(clock.now().as_nanos(), 2_100);

        clock.set(Timestamp::ZERO);
        assert_eq!(shared.now(), Timestamp::ZERO);
    }

    #[test]
    fn test_elapsed_since_saturates() {
        let early = Timestamp::from_nanos(10);
        let late = Timestamp::from_nanos(30);
        assert_eq!(late.elapsed_since(early), Duration::from_nanos(20));
        assert_eq!(early.elapsed_since(late), Duration::ZERO);
        assert_eq!(late.to_string(), "30ns");
    }
}
