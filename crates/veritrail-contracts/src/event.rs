//! Audit event types.
//!
//! An `Event` is one recorded observation, action, thought, or error.  Its
//! JSON form (camelCase keys) is both the export format and, minus
//! `leafHash`, the input to canonical serialization.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tool name used for events produced by the decision-maker.
pub const BRAIN_TOOL: &str = "Brain";

/// Tool name used for events the runtime emits on its own behalf.
pub const SYSTEM_TOOL: &str = "System";

/// Process-unique identifier of an event.
///
/// Freshly minted ids are UUID v4 strings, but any string read back from a
/// session file is accepted so the verifier can report on foreign ids
/// instead of failing to decode them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    /// Mint a new, unique event id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The closed set of event kinds the chain policy understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Data read from the outside world.
    Observation,
    /// A side-effecting call; expected to carry a `basisId`.
    Action,
    /// Raw decision-maker output.
    Thought,
    /// A failed tool call, decision, or brain request.
    Error,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Observation => "OBSERVATION",
            EventKind::Action => "ACTION",
            EventKind::Thought => "THOUGHT",
            EventKind::Error => "ERROR",
        }
    }

    /// Parse the wire name of a kind; `None` for anything outside the set.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OBSERVATION" => Some(EventKind::Observation),
            "ACTION" => Some(EventKind::Action),
            "THOUGHT" => Some(EventKind::Thought),
            "ERROR" => Some(EventKind::Error),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit record.
///
/// The recorder fills `leaf_hash` exactly once, in the same critical section
/// that appends the event to the hash tree.  Nothing else is ever mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,

    /// The earlier event this one is evidentially based on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis_id: Option<EventId>,

    pub kind: EventKind,

    /// The external capability invoked, or `"Brain"` / `"System"`.
    pub tool_name: String,

    /// Call arguments as captured at invocation time.
    pub inputs: serde_json::Value,

    /// Call result, or the failure message for `ERROR` events.
    pub output: serde_json::Value,

    /// Display only; not part of any integrity decision beyond being hashed.
    pub timestamp: DateTime<Utc>,

    /// Lowercase hex SHA-256 of this event's canonical serialization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_hash: Option<String>,
}

impl Event {
    /// The JSON object key holding the leaf digest.  Excluded from hashing.
    pub const LEAF_HASH_FIELD: &'static str = "leafHash";

    /// Build an unhashed event with a fresh id and the current time.
    pub fn new(
        tool_name: impl Into<String>,
        kind: EventKind,
        inputs: serde_json::Value,
        output: serde_json::Value,
        basis_id: Option<EventId>,
    ) -> Self {
        Self {
            id: EventId::new(),
            basis_id,
            kind,
            tool_name: tool_name.into(),
            inputs,
            output,
            timestamp: Utc::now(),
            leaf_hash: None,
        }
    }

    /// Replace the creation time, e.g. with the moment a tool call began.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
