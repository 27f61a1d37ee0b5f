//! # veritrail-merkle
//!
//! Deterministic, incremental SHA-256 hash tree over an ordered list of
//! opaque leaves, with per-leaf inclusion proofs.
//!
//! The root is a pure function of the ordered leaf bytes: two trees fed the
//! same leaves in the same order always agree, which is what lets the
//! verifier rebuild a session independently of the recorder.
//!
//! ```rust,ignore
//! use veritrail_merkle::{HashTree, verify_proof};
//!
//! let mut tree = HashTree::new();
//! tree.add_leaf(b"observation");
//! tree.add_leaf(b"action");
//! let root = tree.root().unwrap();
//! assert!(verify_proof(b"action", &tree.proof(1), &root));
//! ```

pub mod proof;
pub mod tree;

use sha2::{Digest as _, Sha256};

pub use proof::{verify_proof, ProofStep};
pub use tree::HashTree;

/// A 256-bit SHA-256 digest.
pub type Digest = [u8; 32];

/// Digest of one leaf's bytes.
pub fn hash_leaf(data: &[u8]) -> Digest {
    Sha256::digest(data).into()
}

/// Digest of an internal node: SHA-256 over the two child digests.
///
/// The input is the 64 raw digest bytes, not their hex text, so roots are
/// not interchangeable with trees that hash concatenated hex strings.
pub fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Decode a 64-character hex digest.
pub fn digest_from_hex(s: &str) -> Option<Digest> {
    let mut out = [0u8; 32];
    hex::decode_to_slice(s, &mut out).ok()?;
    Some(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
