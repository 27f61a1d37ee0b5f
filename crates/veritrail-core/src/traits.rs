//! Collaborator traits for the VERITRAIL runtime.
//!
//! These define the boundary between the audit core and the code it does
//! not own:
//!
//! - `Brain`: untrusted decision-maker (typically an LLM call)
//! - `EventListener`: downstream subscriber (live feed, checkpoint writer)
//! - `Attestor`: publishes a root to an external append-only venue
//!
//! Tools are described by the concrete [`crate::tool::Tool`] type rather than
//! a trait so that the blocking/async distinction is an explicit flag.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use veritrail_contracts::{
    error::{BrainError, VeritrailResult},
    event::Event,
};

/// The decision-maker queried once per mission step.
///
/// Any text returned is a success, however malformed; the mission loop
/// records it before trying to parse it.  Only a failure to get text back
/// at all is an error.
#[async_trait]
pub trait Brain: Send + Sync {
    async fn think(&self, system_prompt: &str, user_prompt: &str) -> Result<String, BrainError>;
}

/// What subscribers receive for each recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Position of the event in append order (its leaf index).
    pub index: usize,
    pub event: Event,
    /// Root of the tree including this event.
    pub root: String,
}

/// A subscriber notified after each event is recorded.
///
/// Called outside the recorder's lock.  Concurrent completions may notify in
/// a different order than they were appended; `RecordedEvent::index` is the
/// authoritative position.  Returning `Err` (or panicking) is logged by the
/// recorder and never reaches the code that recorded the event.
pub trait EventListener: Send + Sync {
    fn on_event(&self, recorded: &RecordedEvent) -> Result<(), String>;
}

impl<F> EventListener for F
where
    F: Fn(&RecordedEvent) -> Result<(), String> + Send + Sync,
{
    fn on_event(&self, recorded: &RecordedEvent) -> Result<(), String> {
        self(recorded)
    }
}

/// Opaque receipt returned by an attestation venue (e.g. a transaction id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt(pub String);

/// Publishes a session root to an external venue.
///
/// The core hands over the root and small metadata and keeps the receipt;
/// it never validates or interprets it.
#[async_trait]
pub trait Attestor: Send + Sync {
    async fn attest(&self, root: &str, metadata: &serde_json::Value) -> VeritrailResult<Receipt>;
}
