//! The incremental hash tree.
//!
//! Construction rule, applied level by level from the leaves up:
//!
//!   - leaf digest = SHA-256(leaf bytes)
//!   - parent      = SHA-256(left digest || right digest), 64 raw bytes in
//!   - pairs are taken left to right; an odd node out at the end of a level is
//!     paired with itself
//!
//! A tree with a single leaf has that leaf's digest as its root.
//!
//! Leaf and internal hashes are not domain-separated.  Proofs over leaves an
//! attacker controls can therefore confuse a leaf with an internal node; do
//! not expose `verify_proof` to untrusted leaf content on its own.

use tracing::debug;

use crate::proof::ProofStep;
use crate::{hash_leaf, hash_pair, Digest};

/// Append-only binary hash tree.
///
/// `levels[0]` holds the leaf digests, `levels.last()` holds the root once
/// the tree is non-empty.  Appending a leaf only recomputes the rightmost
/// node of each level, so `add_leaf` costs O(log n) hashes.
#[derive(Debug, Clone, Default)]
pub struct HashTree {
    levels: Vec<Vec<Digest>>,
}

impl HashTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from an ordered list of leaves.
    pub fn from_leaves<I, B>(leaves: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut tree = Self::new();
        for leaf in leaves {
            tree.add_leaf(leaf.as_ref());
        }
        tree
    }

    /// Append a leaf and return its own digest (not the root).
    pub fn add_leaf(&mut self, data: &[u8]) -> Digest {
        let leaf = hash_leaf(data);
        if self.levels.is_empty() {
            self.levels.push(Vec::new());
        }
        self.levels[0].push(leaf);

        // Only the last node of each level moved; walk its ancestors upward.
        let mut level = 0;
        while self.levels[level].len() > 1 {
            let nodes = &self.levels[level];
            let parent_index = (nodes.len() - 1) / 2;
            let left = nodes[parent_index * 2];
            let right = nodes.get(parent_index * 2 + 1).copied().unwrap_or(left);
            let parent = hash_pair(&left, &right);

            if self.levels.len() == level + 1 {
                self.levels.push(Vec::new());
            }
            let above = &mut self.levels[level + 1];
            if parent_index < above.len() {
                above[parent_index] = parent;
            } else {
                above.push(parent);
            }
            level += 1;
        }

        leaf
    }

    /// Top-level digest, or `None` for an empty tree.
    pub fn root(&self) -> Option<Digest> {
        self.levels.last().and_then(|top| top.first().copied())
    }

    /// Lowercase hex form of [`HashTree::root`].
    pub fn root_hex(&self) -> Option<String> {
        self.root().map(hex::encode)
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Digest of the leaf at `index`.
    pub fn leaf(&self, index: usize) -> Option<Digest> {
        self.levels.first().and_then(|leaves| leaves.get(index).copied())
    }

    /// Sibling digests needed to recompute the root from leaf `index`,
    /// ordered bottom to top.
    ///
    /// An out-of-range `index` yields an empty proof, which only verifies for
    /// a one-leaf tree.  Callers holding an index from outside should check it
    /// against [`HashTree::len`] first.
    pub fn proof(&self, index: usize) -> Vec<ProofStep> {
        if index >= self.len() {
            debug!(index, leaves = self.len(), "proof requested for out-of-range leaf");
            return Vec::new();
        }

        let mut steps = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut position = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_is_left = position % 2 == 1;
            let sibling_position = if sibling_is_left { position - 1 } else { position + 1 };
            // A missing right sibling means this node was paired with itself.
            let sibling = level.get(sibling_position).copied().unwrap_or(level[position]);
            steps.push(ProofStep { sibling, sibling_is_left });
            position /= 2;
        }
        steps
    }
}
