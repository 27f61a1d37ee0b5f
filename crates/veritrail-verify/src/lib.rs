//! # veritrail-verify
//!
//! Offline verification of exported VERITRAIL sessions.
//!
//! [`engine::SessionVerifier`] re-derives every leaf digest and the session
//! root from the event records alone, then checks basis links.  It shares
//! only the canonical encoding and the hash tree with the recorder, so a
//! recorder that lies about its root cannot also make verification agree.
//!
//! ```rust,ignore
//! use veritrail_verify::engine::SessionVerifier;
//!
//! let document = veritrail_contracts::session::read_document(path)?;
//! let report = SessionVerifier::new().verify_document(&document);
//! for detail in &report.details {
//!     println!("{detail}");
//! }
//! ```

pub mod engine;

pub use engine::SessionVerifier;
