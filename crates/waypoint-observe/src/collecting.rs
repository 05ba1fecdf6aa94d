//! Listener that records checkpoints in memory.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use waypoint_core::{Listener, Memo, Payload, Timestamp};

/// Which side of the instrumented work a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Recorded by `before`.
    Before,
    /// Recorded by `after`.
    After,
}

/// One recorded hook call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Hook that produced the record.
    pub phase: Phase,
    /// Event name.
    pub name: String,
    /// Timestamp handed to the hook.
    pub timestamp: Timestamp,
    /// Payload as seen by the hook, rendered as JSON.
    pub payload: Value,
    /// Position of this record's checkpoint among all checkpoints seen.
    pub sequence: u64,
}

impl CheckpointRecord {
    /// Whether the payload carried a captured failure.
    pub fn failed(&self) -> bool {
        self.payload
            .get(waypoint_core::EXCEPTION_KEY)
            .is_some_and(|v| !v.is_null())
    }
}

#[derive(Default)]
struct Inner {
    records: Vec<CheckpointRecord>,
    next_sequence: u64,
}

/// A listener that collects hook calls for later analysis.
///
/// Records beyond `max_records` are dropped.
pub struct CollectingListener {
    inner: RwLock<Inner>,
    max_records: usize,
}

impl CollectingListener {
    /// Create a new collecting listener.
    pub fn new(max_records: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_records,
        }
    }

    /// Get collected records.
    pub fn records(&self) -> Vec<CheckpointRecord> {
        self.inner.read().records.clone()
    }

    /// Records for one event name.
    pub fn records_for(&self, name: &str) -> Vec<CheckpointRecord> {
        self.inner
            .read()
            .records
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect()
    }

    /// Clear collected records.
    pub fn clear(&self) {
        self.inner.write().records.clear();
    }

    /// Get record count.
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    fn push(&self, record: CheckpointRecord) {
        let mut inner = self.inner.write();
        if inner.records.len() < self.max_records {
            inner.records.push(record);
        }
    }
}

impl Listener for CollectingListener {
    fn before(&self, name: &str, timestamp: Timestamp, payload: &mut Payload) -> Memo {
        let sequence = {
            let mut inner = self.inner.write();
            let sequence = inner.next_sequence;
            inner.next_sequence += 1;
            sequence
        };
        self.push(CheckpointRecord {
            phase: Phase::Before,
            name: name.to_string(),
            timestamp,
            payload: payload.to_json(),
            sequence,
        });
        Memo::new(sequence)
    }

    fn after(&self, name: &str, timestamp: Timestamp, payload: &mut Payload, memo: Memo) {
        let sequence = memo.take::<u64>().unwrap_or_default();
        self.push(CheckpointRecord {
            phase: Phase::After,
            name: name.to_string(),
            timestamp,
            payload: payload.to_json(),
            sequence,
        });
    }
}

impl std::fmt::Debug for CollectingListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectingListener")
            .field("len", &self.len())
            .field("max_records", &self.max_records)
            .finish()
    }
}
