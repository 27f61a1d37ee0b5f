//! Session verifier.
//!
//! `SessionVerifier` works on the raw JSON of an exported session rather than
//! the typed `SessionExport`, so a file with altered or missing fields is
//! still reported on instead of failing to decode.  Verification runs in
//! four passes and never stops early:
//!
//! 1. **Session**: refuse an empty session; note count and id anomalies.
//! 2. **Rows**: re-hash each event's canonical form into a fresh tree and
//!    compare against its stored `leafHash`.
//! 3. **Root**: compare the recomputed root with `sessionRoot`.
//! 4. **Chain**: every `basisId` must name an earlier event; an `ACTION`
//!    without one is handled by [`MissingBasisPolicy`].

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use veritrail_contracts::{
    canonical::event_leaf_bytes,
    config::{MissingBasisPolicy, VerifyConfig},
    event::{Event, EventKind},
    session::SessionExport,
    verify::{CheckDetail, CheckKind, Severity, VerificationReport},
};
use veritrail_merkle::HashTree;

const SUMMARY_VALID: &str = "Session integrity verified";
const SUMMARY_INVALID: &str = "Session integrity verification FAILED";

/// Re-derives the integrity of an exported session.
#[derive(Debug, Clone, Default)]
pub struct SessionVerifier {
    config: VerifyConfig,
}

/// Findings accumulated over one run.
#[derive(Default)]
struct Findings {
    details: Vec<CheckDetail>,
}

impl Findings {
    fn push(&mut self, severity: Severity, check: CheckKind, event_index: Option<usize>, message: String) {
        if severity == Severity::Fail {
            warn!(check = ?check, event_index, %message, "verification failure");
        }
        self.details.push(CheckDetail {
            severity,
            check,
            event_index,
            message,
        });
    }

    fn has_failure(&self, check: CheckKind) -> bool {
        self.details
            .iter()
            .any(|d| d.check == check && d.severity == Severity::Fail)
    }
}

impl SessionVerifier {
    /// A verifier with the default policy (missing basis on an ACTION warns).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: VerifyConfig) -> Self {
        Self { config }
    }

    /// Verify a typed export by way of its JSON form.
    pub fn verify(&self, export: &SessionExport) -> VerificationReport {
        match serde_json::to_value(export) {
            Ok(document) => self.verify_document(&document),
            Err(e) => invalid_report(vec![CheckDetail {
                severity: Severity::Fail,
                check: CheckKind::Session,
                event_index: None,
                message: format!("session could not be encoded as JSON: {e}"),
            }]),
        }
    }

    /// Verify a session document as read from disk.
    pub fn verify_document(&self, document: &Value) -> VerificationReport {
        let mut findings = Findings::default();

        let events = match document.get("events").and_then(Value::as_array) {
            Some(events) if !events.is_empty() => events,
            Some(_) => {
                findings.push(
                    Severity::Fail,
                    CheckKind::Session,
                    None,
                    "session contains no events; nothing to verify".to_string(),
                );
                return invalid_report(findings.details);
            }
            None => {
                findings.push(
                    Severity::Fail,
                    CheckKind::Session,
                    None,
                    "session document has no 'events' array".to_string(),
                );
                return invalid_report(findings.details);
            }
        };

        self.check_session(document, events, &mut findings);
        let computed_root = self.check_rows(events, &mut findings);
        self.check_root(document, &computed_root, &mut findings);
        self.check_chain(events, &mut findings);

        let valid = !findings.has_failure(CheckKind::Row)
            && !findings.has_failure(CheckKind::Root)
            && !findings.has_failure(CheckKind::Chain)
            && !findings.has_failure(CheckKind::Session);

        debug!(
            valid,
            event_count = events.len(),
            detail_count = findings.details.len(),
            computed_root = %computed_root,
            "verification complete"
        );

        VerificationReport {
            valid,
            summary: if valid { SUMMARY_VALID } else { SUMMARY_INVALID }.to_string(),
            computed_root: Some(computed_root),
            details: findings.details,
        }
    }

    // ── Passes ────────────────────────────────────────────────────────────────

    fn check_session(&self, document: &Value, events: &[Value], findings: &mut Findings) {
        if let Some(declared) = document.get("eventCount").and_then(Value::as_u64) {
            if declared != events.len() as u64 {
                findings.push(
                    Severity::Warn,
                    CheckKind::Session,
                    None,
                    format!(
                        "eventCount says {declared} but the session holds {} events",
                        events.len()
                    ),
                );
            }
        }

        let mut first_seen: HashMap<&str, usize> = HashMap::new();
        for (i, event) in events.iter().enumerate() {
            let Some(id) = event.get("id").and_then(Value::as_str) else {
                findings.push(
                    Severity::Warn,
                    CheckKind::Session,
                    Some(i),
                    format!("row {i} ({}) has no id", tool_name(event)),
                );
                continue;
            };
            if let Some(&first) = first_seen.get(id) {
                findings.push(
                    Severity::Warn,
                    CheckKind::Session,
                    Some(i),
                    format!("row {i} repeats event id {id} first used at row {first}"),
                );
            } else {
                first_seen.insert(id, i);
            }

            let kind = event.get("kind").and_then(Value::as_str);
            if kind.and_then(EventKind::parse).is_none() {
                findings.push(
                    Severity::Warn,
                    CheckKind::Session,
                    Some(i),
                    format!(
                        "row {i} ({}) has unknown kind {}",
                        tool_name(event),
                        kind.unwrap_or("<missing>")
                    ),
                );
            }
        }
    }

    /// Re-hash every row; returns the recomputed root.
    fn check_rows(&self, events: &[Value], findings: &mut Findings) -> String {
        let mut tree = HashTree::new();

        for (i, event) in events.iter().enumerate() {
            let computed = hex::encode(tree.add_leaf(&event_leaf_bytes(event)));
            let tool = tool_name(event);

            match event.get(Event::LEAF_HASH_FIELD).and_then(Value::as_str) {
                Some(stored) if stored.eq_ignore_ascii_case(&computed) => findings.push(
                    Severity::Pass,
                    CheckKind::Row,
                    Some(i),
                    format!("row {i} ({tool}) leaf hash verified"),
                ),
                Some(stored) => findings.push(
                    Severity::Fail,
                    CheckKind::Row,
                    Some(i),
                    format!(
                        "TAMPER DETECTED at row {i} ({tool}): stored leaf hash {stored}, recomputed {computed}"
                    ),
                ),
                None => findings.push(
                    Severity::Info,
                    CheckKind::Row,
                    Some(i),
                    format!("row {i} ({tool}) carries no leaf hash; covered by the root check only"),
                ),
            }
        }

        // `events` is non-empty here, so the tree always has a root.
        tree.root_hex().unwrap_or_default()
    }

    fn check_root(&self, document: &Value, computed: &str, findings: &mut Findings) {
        match document.get("sessionRoot").and_then(Value::as_str) {
            Some(claimed) if claimed.eq_ignore_ascii_case(computed) => findings.push(
                Severity::Pass,
                CheckKind::Root,
                None,
                format!("session root verified: {computed}"),
            ),
            Some(claimed) => findings.push(
                Severity::Fail,
                CheckKind::Root,
                None,
                format!("CRITICAL FAILURE: session root mismatch (claimed {claimed}, computed {computed})"),
            ),
            None => findings.push(
                Severity::Fail,
                CheckKind::Root,
                None,
                format!("CRITICAL FAILURE: session has no sessionRoot (computed {computed})"),
            ),
        }
    }

    fn check_chain(&self, events: &[Value], findings: &mut Findings) {
        // First occurrence wins when an id is repeated.
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (i, event) in events.iter().enumerate() {
            if let Some(id) = event.get("id").and_then(Value::as_str) {
                positions.entry(id).or_insert(i);
            }
        }

        for (i, event) in events.iter().enumerate() {
            let tool = tool_name(event);
            match event.get("basisId") {
                None | Some(Value::Null) => {
                    let is_action = event.get("kind").and_then(Value::as_str)
                        == Some(EventKind::Action.as_str());
                    if is_action {
                        let severity = match self.config.missing_basis {
                            MissingBasisPolicy::Warn => Severity::Warn,
                            MissingBasisPolicy::Fail => Severity::Fail,
                        };
                        findings.push(
                            severity,
                            CheckKind::Chain,
                            Some(i),
                            format!("row {i} ({tool}): ACTION has no basis"),
                        );
                    }
                }
                Some(Value::String(basis)) => match positions.get(basis.as_str()) {
                    Some(&p) if p < i => findings.push(
                        Severity::Pass,
                        CheckKind::Chain,
                        Some(i),
                        format!("row {i} ({tool}): verified link to row {p}"),
                    ),
                    Some(&p) => findings.push(
                        Severity::Fail,
                        CheckKind::Chain,
                        Some(i),
                        format!("broken link at row {i} ({tool}): basis {basis} is row {p}, not an earlier event"),
                    ),
                    None => findings.push(
                        Severity::Fail,
                        CheckKind::Chain,
                        Some(i),
                        format!("broken link at row {i} ({tool}): basis {basis} does not exist"),
                    ),
                },
                Some(other) => findings.push(
                    Severity::Fail,
                    CheckKind::Chain,
                    Some(i),
                    format!("broken link at row {i} ({tool}): basis {other} is not an event id"),
                ),
            }
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn tool_name(event: &Value) -> &str {
    event
        .get("toolName")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
}

fn invalid_report(details: Vec<CheckDetail>) -> VerificationReport {
    VerificationReport {
        valid: false,
        summary: SUMMARY_INVALID.to_string(),
        computed_root: None,
        details,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
