//! The exported session document.
//!
//! `SessionExport` is a value object: once written to disk it has no owner
//! and carries only already-recorded event fields, never live handles.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{VeritrailError, VeritrailResult},
    event::Event,
};

/// Root reported for a session with no events: 64 hex zeros.
///
/// Downstream consumers (attestation, display) always get a fixed-width
/// value, and no SHA-256 output is expected to collide with it.
pub const EMPTY_ROOT: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// A snapshot of one recorded session plus its root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    /// Identifier of the recorder that produced the session.
    #[serde(default)]
    pub session_id: String,

    /// Lowercase hex root of the hash tree, or [`EMPTY_ROOT`].
    pub session_root: String,

    pub event_count: usize,

    /// Events in append order.
    pub events: Vec<Event>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
}

impl SessionExport {
    /// Serialize as pretty JSON and write to `path`.
    pub fn write_to_file(&self, path: &Path) -> VeritrailResult<()> {
        let text = serde_json::to_string_pretty(self).map_err(|e| VeritrailError::SessionFormat {
            reason: format!("cannot encode session: {e}"),
        })?;
        std::fs::write(path, text).map_err(|source| VeritrailError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Read and decode a session file written by [`SessionExport::write_to_file`].
    pub fn read_from_file(path: &Path) -> VeritrailResult<Self> {
        let value = read_document(path)?;
        serde_json::from_value(value).map_err(|e| VeritrailError::SessionFormat {
            reason: format!("'{}': {e}", path.display()),
        })
    }
}

/// Read a session file as raw JSON without imposing the typed schema.
///
/// The verifier works on this form so that a tampered file with odd or
/// missing fields still produces a report rather than a decode error.
pub fn read_document(path: &Path) -> VeritrailResult<serde_json::Value> {
    let text = std::fs::read_to_string(path).map_err(|source| VeritrailError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| VeritrailError::SessionFormat {
        reason: format!("'{}' is not valid JSON: {e}", path.display()),
    })
}
