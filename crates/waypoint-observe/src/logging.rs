//! Listener that logs checkpoints through `tracing`.

use tracing::Level;

use waypoint_core::{Listener, Memo, Payload, Timestamp};

/// A simple logging listener.
///
/// `before` logs the checkpoint and remembers its start time; `after` logs
/// the elapsed time and whether the callback failed.
#[derive(Debug, Clone)]
pub struct LoggingListener {
    /// Level for regular checkpoints.
    pub log_level: Level,
    /// Include payload fields in log lines.
    pub include_payload: bool,
}

impl LoggingListener {
    /// Create a new logging listener.
    pub fn new() -> Self {
        Self {
            log_level: Level::DEBUG,
            include_payload: false,
        }
    }

    /// Set the log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }

    /// Include payload fields in log lines.
    pub fn with_payload(mut self, enabled: bool) -> Self {
        self.include_payload = enabled;
        self
    }

    fn payload_field(&self, payload: &Payload) -> String {
        if self.include_payload {
            payload.to_json().to_string()
        } else {
            String::new()
        }
    }
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new()
    }
}

// `tracing` macros need the level at compile time.
macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {{
        let level = $level;
        if level == Level::TRACE {
            tracing::trace!($($arg)+)
        } else if level == Level::DEBUG {
            tracing::debug!($($arg)+)
        } else if level == Level::INFO {
            tracing::info!($($arg)+)
        } else if level == Level::WARN {
            tracing::warn!($($arg)+)
        } else {
            tracing::error!($($arg)+)
        }
    }};
}

impl Listener for LoggingListener {
    fn before(&self, name: &str, timestamp: Timestamp, payload: &mut Payload) -> Memo {
        log_at!(
            self.log_level,
            checkpoint = name,
            timestamp = timestamp.as_nanos(),
            payload = %self.payload_field(payload),
            "Checkpoint started"
        );
        Memo::new(timestamp)
    }

    fn after(&self, name: &str, timestamp: Timestamp, payload: &mut Payload, memo: Memo) {
        let elapsed_us = memo
            .take::<Timestamp>()
            .map(|start| timestamp.elapsed_since(start).as_micros())
            .map(|us| u64::try_from(us).unwrap_or(u64::MAX))
            .unwrap_or_default();

        match payload.exception() {
            Some(exception) => {
                tracing::warn!(
                    checkpoint = name,
                    elapsed_us,
                    error = %exception,
                    "Checkpoint failed"
                );
            }
            None => {
                log_at!(
                    self.log_level,
                    checkpoint = name,
                    elapsed_us,
                    payload = %self.payload_field(payload),
                    "Checkpoint finished"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use waypoint_core::{CallbackError, ManualClock};
    use waypoint_dispatch::Dispatcher;

    use super::*;

    #[test]
    fn test_logging_listener_memo_is_start_time() {
        let listener = LoggingListener::new().with_level(Level::TRACE);
        let mut payload = Payload::new();
        let memo = listener.before("render", Timestamp::from_nanos(40), &mut payload);
        assert_eq!(memo.get::<Timestamp>(), Some(&Timestamp::from_nanos(40)));

        payload.record_exception(CallbackError::Panicked("x".to_string()));
        listener.after("render", Timestamp::from_nanos(90), &mut payload, memo);
    }

    #[test]
    fn test_logging_listener_in_dispatcher() {
        let clock = ManualClock::new();
        let dispatcher = Dispatcher::with_clock(Default::default(), Arc::new(clock));
        dispatcher
            .subscribe("render", LoggingListener::new().with_payload(true))
            .unwrap();

        let outcome = dispatcher.measure("render.header", Payload::new().with("id", 3), || 1);
        assert_eq!(outcome.ok(), Some(1));
    }
}
