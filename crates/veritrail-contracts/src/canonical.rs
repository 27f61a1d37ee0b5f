//! Canonical serialization: the byte form every leaf is hashed from.
//!
//! The recorder and the verifier must agree on these bytes exactly, so the
//! encoding is a pure function of a `serde_json::Value`:
//!
//!   - object keys sorted by byte order, at every depth
//!   - serde_json's compact output: no whitespace, its number formatting and
//!     its string escaping
//!
//! Key order does not depend on whether serde_json was built with
//! `preserve_order`; keys are sorted here explicitly.

use serde::Serialize;
use serde_json::Value;

use crate::event::Event;

/// Placeholder recorded in place of a value that cannot be turned into JSON.
pub const UNSERIALIZABLE: &str = "<unserializable>";

/// Encode `value` into its canonical byte sequence.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    // Value's Display is serde_json's compact writer and cannot fail.
    sorted_keys(value).to_string().into_bytes()
}

/// Canonical bytes of an event's JSON form with `leafHash` removed.
///
/// Operates on raw JSON so a verifier can hash whatever a session file
/// actually contains, unknown keys included.
pub fn event_leaf_bytes(event_json: &Value) -> Vec<u8> {
    match event_json {
        Value::Object(map) if map.contains_key(Event::LEAF_HASH_FIELD) => {
            let mut stripped = map.clone();
            stripped.remove(Event::LEAF_HASH_FIELD);
            canonical_bytes(&Value::Object(stripped))
        }
        other => canonical_bytes(other),
    }
}

/// Canonical leaf bytes for a typed event.
pub fn event_to_leaf(event: &Event) -> Vec<u8> {
    event_leaf_bytes(&to_recorded_value(event))
}

/// Convert any serializable value to JSON, degrading to [`UNSERIALIZABLE`].
///
/// Recording is best-effort: a result that serde cannot represent (a map
/// with non-string keys, a failing custom `Serialize`) is replaced by the
/// placeholder rather than aborting the audit.
pub fn to_recorded_value<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|_| Value::String(UNSERIALIZABLE.to_string()))
}

/// Rebuild `value` with every object's keys inserted in byte order.
///
/// With serde_json's default `BTreeMap` the order is already sorted; with
/// `preserve_order` insertion order wins, so insert sorted.
fn sorted_keys(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(sorted_keys).collect()),
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), sorted_keys(value)))
                    .collect(),
            )
        }
        other => other.clone(),
    }
}
