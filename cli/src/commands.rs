//! Subcommands that inspect session files.
//!
//! Each returns `Ok(true)` when the check it performs passed, `Ok(false)`
//! when it ran to completion but the session or proof is invalid, and `Err`
//! only when the input could not be read at all.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use veritrail_audit::load_checkpoint;
use veritrail_contracts::{
    canonical::event_leaf_bytes,
    config::RuntimeConfig,
    error::{VeritrailError, VeritrailResult},
    session::read_document,
    verify::VerificationReport,
};
use veritrail_merkle::{digest_from_hex, verify_proof, HashTree, ProofStep};
use veritrail_verify::SessionVerifier;

/// The file `prove` writes and `check-proof` reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionProof {
    pub index: usize,
    /// The event exactly as it appears in the session file.
    pub event: Value,
    pub proof: Vec<ProofStep>,
    /// The session's `sessionRoot`, confirmed against its events.
    pub root: String,
}

// ── verify ────────────────────────────────────────────────────────────────────

pub fn verify(path: &Path, checkpoint: bool, config: Option<&Path>, json: bool) -> VeritrailResult<bool> {
    let config = match config {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::default(),
    };
    let verifier = SessionVerifier::with_config(config.verify);

    let report = if checkpoint {
        verifier.verify(&load_checkpoint(path)?)
    } else {
        verifier.verify_document(&read_document(path)?)
    };

    if json {
        println!("{}", to_pretty(&report)?);
    } else {
        print_report(path, &report);
    }
    Ok(report.valid)
}

fn print_report(path: &Path, report: &VerificationReport) {
    println!("Verifying {}", path.display());
    println!();
    for detail in &report.details {
        println!("  {detail}");
    }
    println!();
    if let Some(root) = &report.computed_root {
        println!("Computed root: {root}");
    }
    let verdict = if report.valid { "PASS" } else { "FAIL" };
    println!("{verdict}: {}", report.summary);
}

// ── prove / check-proof ───────────────────────────────────────────────────────

pub fn prove(session: &Path, index: usize) -> VeritrailResult<bool> {
    let proof = build_proof(&read_document(session)?, index)?;
    println!("{}", to_pretty(&proof)?);
    Ok(true)
}

pub fn check_proof(path: &Path, root: Option<&str>) -> VeritrailResult<bool> {
    let text = std::fs::read_to_string(path).map_err(|source| VeritrailError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let proof: InclusionProof = serde_json::from_str(&text).map_err(|e| VeritrailError::SessionFormat {
        reason: format!("'{}' is not an inclusion proof: {e}", path.display()),
    })?;

    let ok = proof_holds(&proof, root)?;
    let root = root.unwrap_or(&proof.root);
    if ok {
        println!("PASS: event {} is included under root {root}", proof.index);
    } else {
        println!("FAIL: event {} is NOT included under root {root}", proof.index);
    }
    Ok(ok)
}

/// Proof for the event at `index`, computed from the document's events.
///
/// Refuses a document whose events do not hash to its `sessionRoot`; a
/// proof from such a file would vouch for whatever the file now says.
pub fn build_proof(document: &Value, index: usize) -> VeritrailResult<InclusionProof> {
    let events = session_events(document)?;
    let event = events.get(index).ok_or_else(|| VeritrailError::SessionFormat {
        reason: format!("event index {index} out of range; session has {} events", events.len()),
    })?;

    let tree = HashTree::from_leaves(events.iter().map(event_leaf_bytes));
    let root = tree.root_hex().unwrap_or_default();

    let claimed = document
        .get("sessionRoot")
        .and_then(Value::as_str)
        .ok_or_else(|| VeritrailError::SessionFormat {
            reason: "document has no 'sessionRoot' to prove against".to_string(),
        })?;
    if !claimed.eq_ignore_ascii_case(&root) {
        tracing::warn!(claimed, computed = %root, "session root does not match its events");
        return Err(VeritrailError::SessionFormat {
            reason: format!(
                "events hash to {root} but sessionRoot is {claimed}; run `veritrail verify` first"
            ),
        });
    }

    Ok(InclusionProof {
        index,
        event: event.clone(),
        proof: tree.proof(index),
        root,
    })
}

/// Check `proof` against `root`, or against its own stored root.
pub fn proof_holds(proof: &InclusionProof, root: Option<&str>) -> VeritrailResult<bool> {
    let root = root.unwrap_or(&proof.root);
    let digest = digest_from_hex(root).ok_or_else(|| VeritrailError::SessionFormat {
        reason: format!("'{root}' is not a 64-character hex root"),
    })?;
    Ok(verify_proof(&event_leaf_bytes(&proof.event), &proof.proof, &digest))
}

// ── info ──────────────────────────────────────────────────────────────────────

pub fn info(path: &Path) -> VeritrailResult<bool> {
    let document = read_document(path)?;
    let events = session_events(&document)?;

    let mut by_kind: BTreeMap<&str, usize> = BTreeMap::new();
    for event in events {
        let kind = event.get("kind").and_then(Value::as_str).unwrap_or("<missing>");
        *by_kind.entry(kind).or_default() += 1;
    }
    let field = |name: &str| document.get(name).and_then(Value::as_str).unwrap_or("-").to_string();

    println!("Session:      {}", field("sessionId"));
    println!("Root:         {}", field("sessionRoot"));
    println!("Exported at:  {}", field("exportedAt"));
    println!("Events:       {}", events.len());
    for (kind, count) in by_kind {
        println!("  {kind:<12} {count}");
    }
    Ok(true)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn session_events(document: &Value) -> VeritrailResult<&Vec<Value>> {
    document
        .get("events")
        .and_then(Value::as_array)
        .ok_or_else(|| VeritrailError::SessionFormat {
            reason: "document has no 'events' array".to_string(),
        })
}

fn to_pretty<T: Serialize>(value: &T) -> VeritrailResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| VeritrailError::SessionFormat {
        reason: format!("cannot encode output: {e}"),
    })
}
