//! Inclusion proofs.

use serde::{Deserialize, Serialize};

use crate::{hash_leaf, hash_pair, Digest};

/// One level of an inclusion proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofStep {
    /// Digest of the node paired with the running hash at this level.
    #[serde(with = "hex::serde")]
    pub sibling: Digest,
    /// True when the sibling is hashed on the left of the running hash.
    pub sibling_is_left: bool,
}

/// Recompute the root from `leaf_data` and `proof` and compare it to
/// `claimed_root`.
pub fn verify_proof(leaf_data: &[u8], proof: &[ProofStep], claimed_root: &Digest) -> bool {
    let mut running = hash_leaf(leaf_data);
    for step in proof {
        running = if step.sibling_is_left {
            hash_pair(&step.sibling, &running)
        } else {
            hash_pair(&running, &step.sibling)
        };
    }
    &running == claimed_root
}
