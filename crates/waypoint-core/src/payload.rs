//! Checkpoint payloads.
//!
//! A payload is an open key/value map supplied by the caller of
//! `instrument`. Every listener of one checkpoint sees the same payload by
//! mutable reference, so hooks can attach metadata for hooks further down
//! the line. When the instrumented callback fails, the failure is recorded
//! on the payload and the payload is handed back to the caller.

use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::error::CallbackError;

/// Key under which a captured failure appears in [`Payload::to_json`].
pub const EXCEPTION_KEY: &str = "exception";

/// Label used for timing spans when the payload does not name itself.
pub const DEFAULT_LABEL: &str = "payload";

/// Caller-supplied data shared by all hooks of one checkpoint.
#[derive(Debug, Clone, Default)]
pub struct Payload {
    fields: Map<String, Value>,
    label: Option<String>,
    exception: Option<Arc<CallbackError>>,
}

impl Payload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a payload from an existing map.
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Builder-style field insertion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Set the label used to describe this payload in timing spans.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Insert a field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// Get a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a field mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    /// Remove a field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Check whether a field is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// All fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consume the payload, returning its fields.
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// The label used for timing spans.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(DEFAULT_LABEL)
    }

    /// Record the failure of the instrumented callback.
    pub fn record_exception(&mut self, error: CallbackError) {
        self.exception = Some(Arc::new(error));
    }

    /// The captured failure, if the instrumented callback failed.
    pub fn exception(&self) -> Option<&Arc<CallbackError>> {
        self.exception.as_ref()
    }

    /// Whether a failure has been recorded.
    pub fn is_failure(&self) -> bool {
        self.exception.is_some()
    }

    /// Render as a JSON object, with any failure under [`EXCEPTION_KEY`].
    pub fn to_json(&self) -> Value {
        let mut fields = self.fields.clone();
        if let Some(exception) = &self.exception {
            fields.insert(EXCEPTION_KEY.to_string(), Value::String(exception.to_string()));
        }
        Value::Object(fields)
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_map(fields)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = match &self.exception {
            Some(_) if self.fields.contains_key(EXCEPTION_KEY) => self.fields.len(),
            Some(_) => self.fields.len() + 1,
            None => self.fields.len(),
        };
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, value) in &self.fields {
            if self.exception.is_some() && key == EXCEPTION_KEY {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        if let Some(exception) = &self.exception {
            map.serialize_entry(EXCEPTION_KEY, &exception.to_string())?;
        }
        map.end()
    }
}

/// Where the payload of a checkpoint comes from.
///
/// Payloads are only materialized once at least one listener matches the
/// checkpoint, so an expensive payload can be deferred with
/// [`PayloadSource::lazy`].
#[derive(Default)]
pub enum PayloadSource<'a> {
    /// No payload; listeners receive an empty one.
    #[default]
    Empty,
    /// A payload built up front.
    Ready(Payload),
    /// A payload computed on demand.
    Lazy(Box<dyn FnOnce() -> Payload + 'a>),
}

impl<'a> PayloadSource<'a> {
    /// Defer payload construction until a listener needs it.
    pub fn lazy(f: impl FnOnce() -> Payload + 'a) -> Self {
        PayloadSource::Lazy(Box::new(f))
    }

    /// Produce the payload.
    pub fn materialize(self) -> Payload {
        match self {
            PayloadSource::Empty => Payload::new(),
            PayloadSource::Ready(payload) => payload,
            PayloadSource::Lazy(f) => f(),
        }
    }
}

impl From<()> for PayloadSource<'_> {
    fn from(_: ()) -> Self {
        PayloadSource::Empty
    }
}

impl From<Payload> for PayloadSource<'_> {
    fn from(payload: Payload) -> Self {
        PayloadSource::Ready(payload)
    }
}

impl From<Option<Payload>> for PayloadSource<'_> {
    fn from(payload: Option<Payload>) -> Self {
        payload.map_or(PayloadSource::Empty, PayloadSource::Ready)
    }
}

impl From<Map<String, Value>> for PayloadSource<'_> {
    fn from(fields: Map<String, Value>) -> Self {
        PayloadSource::Ready(Payload::from_map(fields))
    }
}

impl std::fmt::Debug for PayloadSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadSource::Empty => f.write_str("Empty"),
            PayloadSource::Ready(payload) => f.debug_tuple("Ready").field(payload).finish(),
            PayloadSource::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_payload_fields() {
        let mut payload = Payload::new().with("component", "Header").with("depth", 3);
        assert_eq!(payload.get("component"), Some(&json!("Header")));
        assert_eq!(payload.insert("depth", 4), Some(json!(3)));
        assert!(payload.contains_key("depth"));
        assert_eq!(payload.remove("depth"), Some(json!(4)));
        assert_eq!(payload.fields().len(), 1);
        assert_eq!(payload.label(), DEFAULT_LABEL);
    }

    #[test]
    fn test_payload_exception_rendering() {
        let mut payload = Payload::new().with("query", "SELECT 1").with_label("Query");
        assert!(!payload.is_failure());

        payload.record_exception(CallbackError::Panicked("lost connection".to_string()));

        assert!(payload.is_failure());
        assert_eq!(payload.label(), "Query");
        assert_eq!(
            payload.to_json(),
            json!({ "query": "SELECT 1", "exception": "callback panicked: lost connection" })
        );
        assert_eq!(serde_json::to_value(&payload).unwrap(), payload.to_json());
    }

    #[test]
    fn test_cloned_payload_shares_exception() {
        let mut payload = Payload::new();
        payload.record_exception(CallbackError::Panicked("x".to_string()));
        let copy = payload.clone();
        assert!(Arc::ptr_eq(
            payload.exception().unwrap(),
            copy.exception().unwrap()
        ));
    }

    #[test]
    fn test_lazy_source_runs_only_when_materialized() {
        let calls = Cell::new(0);
        let source = PayloadSource::lazy(|| {
            calls.set(calls.get() + 1);
            Payload::new().with("built", true)
        });
        assert_eq!(calls.get(), 0);

        let payload = source.materialize();
        assert_eq!(calls.get(), 1);
        assert_eq!(payload.get("built"), Some(&json!(true)));
    }

    #[test]
    fn test_source_conversions() {
        assert!(PayloadSource::from(()).materialize().fields().is_empty());
        assert!(PayloadSource::from(None).materialize().fields().is_empty());

        let mut map = Map::new();
        map.insert("k".to_string(), json!(1));
        assert_eq!(PayloadSource::from(map).materialize().get("k"), Some(&json!(1)));
    }
}
