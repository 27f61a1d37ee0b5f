//! # veritrail-audit
//!
//! Append-only, hash-tree-backed recording of agent tool invocations.
//!
//! ## Overview
//!
//! Every observation, action, thought, or error is captured as an `Event`,
//! serialized canonically, and added as a leaf of a SHA-256 hash tree.  The
//! tree's root is a compact commitment to the whole ordered session; changing,
//! dropping, or reordering any event changes it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use veritrail_audit::{Recorder, Basis};
//! use veritrail_contracts::event::EventKind;
//!
//! let recorder = Recorder::new("session-001");
//! let price = recorder.wrap(price_tool, EventKind::Observation);
//! let transfer = recorder.wrap(transfer_tool, EventKind::Action);
//!
//! price.invoke(json!({})).await?;
//! transfer.invoke(json!({ "to": "0xdead", "amount": 1 })).await?; // basis = the price read
//!
//! let export = recorder.export_session();
//! ```

pub mod checkpoint;
pub mod recorder;
pub mod store;

pub use checkpoint::{load_checkpoint, JsonlCheckpoint};
pub use recorder::{AuditedTool, Basis, Recorder};
pub use store::EventStore;

// ── Tests ─────────────────────────────────────────────────────────────────────
