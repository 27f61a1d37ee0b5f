//! Session verification report types.
//!
//! The verifier never stops at the first problem.  Every check produces a
//! `CheckDetail`, and the report lists them in the order they were run so a
//! CLI can print the full picture.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of one verification check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Pass,
    Info,
    Warn,
    Fail,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Pass => "PASS",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which part of the algorithm produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    /// Session-level sanity: emptiness, declared count, duplicate ids.
    Session,
    /// Per-event leaf digest comparison.
    Row,
    /// Recomputed root versus claimed root.
    Root,
    /// Basis-link resolution and the missing-basis policy.
    Chain,
}

/// One line of a verification report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDetail {
    pub severity: Severity,
    pub check: CheckKind,
    /// Position of the event the finding concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_index: Option<usize>,
    pub message: String,
}

impl fmt::Display for CheckDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// The complete outcome of verifying one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// No row tamper, root matches, no broken links.  Warnings never count.
    pub valid: bool,
    /// Human-readable one-line verdict.
    pub summary: String,
    /// Root recomputed from the events, absent for an empty session.
    pub computed_root: Option<String>,
    /// Every check in the order it ran.
    pub details: Vec<CheckDetail>,
}

impl VerificationReport {
    /// Details at exactly `severity`.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &CheckDetail> {
        self.details.iter().filter(move |d| d.severity == severity)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckDetail> {
        self.with_severity(Severity::Fail)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &CheckDetail> {
        self.with_severity(Severity::Warn)
    }
}
