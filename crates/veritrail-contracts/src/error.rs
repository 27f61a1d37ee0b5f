//! Error types for the VERITRAIL audit trail.
//!
//! `VeritrailError` covers the recorder, the session file format, and
//! configuration.  Collaborator failures (tools and the brain) get their own
//! enums so the mission loop can tell a timeout from a transport error.

use thiserror::Error;

/// The unified error type for the VERITRAIL crates.
#[derive(Debug, Error)]
pub enum VeritrailError {
    /// The recorder could not append an event.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },

    /// An explicit `basisId` does not name an event already in the store.
    #[error("basis event '{basis_id}' is not recorded in this session")]
    UnknownBasis { basis_id: String },

    /// An event id was appended twice.
    #[error("event id '{event_id}' is already recorded in this session")]
    DuplicateEventId { event_id: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A session document could not be decoded.
    #[error("malformed session document: {reason}")]
    SessionFormat { reason: String },

    /// Reading or writing a session artifact failed.
    #[error("i/o error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The attestation collaborator rejected or failed to publish a root.
    #[error("attestation failed: {reason}")]
    Attestation { reason: String },
}

/// Convenience alias used throughout the VERITRAIL crates.
pub type VeritrailResult<T> = Result<T, VeritrailError>;

/// Failure of an external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// The tool ran and reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The decoded parameters do not satisfy the tool's parameter schema.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The caller stopped waiting for the tool.
    #[error("timed out after {secs}s")]
    TimedOut { secs: u64 },

    /// The tool panicked or its worker task was cancelled.
    #[error("tool worker aborted: {0}")]
    Panicked(String),
}

/// Failure to obtain any text from the decision-maker.
///
/// A badly formed response is NOT a `BrainError`: any text that comes back is
/// a success at this layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrainError {
    /// Network or provider failure.
    #[error("brain transport failure: {0}")]
    Transport(String),

    /// No response within the step deadline.
    #[error("brain did not answer within {secs}s")]
    Timeout { secs: u64 },
}
