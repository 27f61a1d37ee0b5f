//! # veritrail-contracts
//!
//! Shared types for the VERITRAIL audit trail.
//!
//! All crates in the workspace import from here.  The only logic in this
//! crate is canonical serialization, which both the recorder and the
//! independent verifier must compute identically.

pub mod canonical;
pub mod config;
pub mod error;
pub mod event;
pub mod session;
pub mod verify;

#[cfg(test)]
mod tests {
    use super::*;
    use error::{BrainError, ToolError, VeritrailError};
    use event::{EventId, EventKind};
    use verify::Severity;

    // ── EventId ──────────────────────────────────────────────────────────────

    #[test]
    fn event_id_new_produces_unique_values() {
        let ids: std::collections::HashSet<EventId> = (0..100).map(|_| EventId::new()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn event_id_serializes_as_bare_string() {
        let id = EventId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }

    // ── EventKind ────────────────────────────────────────────────────────────

    #[test]
    fn event_kind_wire_names_match_parse() {
        for kind in [EventKind::Observation, EventKind::Action, EventKind::Thought, EventKind::Error] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::parse("DECISION"), None);
    }

    // ── Severity ordering ────────────────────────────────────────────────────

    #[test]
    fn severity_orders_pass_to_fail() {
        assert!(Severity::Pass < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Fail);
    }

    // ── Error display messages ───────────────────────────────────────────────

    #[test]
    fn error_unknown_basis_display() {
        let err = VeritrailError::UnknownBasis { basis_id: "evt-9".to_string() };
        assert!(err.to_string().contains("evt-9"));
    }

    #[test]
    fn error_audit_write_failed_display() {
        let err = VeritrailError::AuditWriteFailed { reason: "lock poisoned".to_string() };
        let msg = err.to_string();
        assert!(msg.contains("audit write failed"));
        assert!(msg.contains("lock poisoned"));
    }

    #[test]
    fn tool_timeout_display_names_the_deadline() {
        assert_eq!(ToolError::TimedOut { secs: 15 }.to_string(), "timed out after 15s");
    }

    #[test]
    fn brain_transport_display() {
        let msg = BrainError::Transport("503 from provider".to_string()).to_string();
        assert!(msg.contains("503 from provider"));
    }
}
