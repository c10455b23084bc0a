//! Ordered-pair Merkle builder with duplicate-last padding, as used by
//! OpenZeppelin-compatible verifiers. Not a sorted-pair construction: pair
//! order is preserved, which is what the ordered proof below relies on.

use crate::error::{ManifestError, Result};
use crate::hashing::pair_hash;
use alloy_primitives::B256;

/// One step of a Merkle proof: the sibling hash and whether it sits to the
/// right of the running value at that level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProofStep {
    pub sibling: B256,
    pub is_right: bool,
}

/// A built Merkle tree: every level from leaves to root, plus the
/// permutation that sorted the input leaves into level 0's order.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    pub levels: Vec<Vec<B256>>,
    /// `permutation[i]` is the index in the *original* input slice that
    /// ended up at sorted position `i`.
    pub permutation: Vec<usize>,
}

impl MerkleTree {
    pub fn root(&self) -> B256 {
        self.levels
            .last()
            .and_then(|l| l.first())
            .copied()
            .unwrap_or(B256::ZERO)
    }

    pub fn leaves(&self) -> &[B256] {
        &self.levels[0]
    }

    /// Generate the proof for the leaf at sorted position `index`.
    pub fn proof(&self, mut index: usize) -> Vec<ProofStep> {
        let mut proof = Vec::with_capacity(self.levels.len().saturating_sub(1));
        for level in &self.levels[..self.levels.len().saturating_sub(1)] {
            let sibling_index = index ^ 1;
            let sibling = if sibling_index < level.len() {
                level[sibling_index]
            } else {
                // odd-length level: last node pairs with itself
                level[index]
            };
            proof.push(ProofStep {
                sibling,
                is_right: index % 2 == 1,
            });
            index /= 2;
        }
        proof
    }
}

/// Build a Merkle tree over `leaves`, first sorting them lexicographically
/// by their 32-byte value. Returns `EmptyRouteSet` for zero leaves (root is
/// reported as `bytes32(0)` by `MerkleTree::root`, but callers should treat
/// this as an explicit edge case rather than a valid tree).
pub fn build(leaves: &[B256]) -> Result<MerkleTree> {
    if leaves.is_empty() {
        tracing::debug!("merkle build called with an empty leaf set");
        return Err(ManifestError::EmptyRouteSet);
    }

    let mut indexed: Vec<(usize, B256)> = leaves.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.cmp(&b.1));
    let permutation: Vec<usize> = indexed.iter().map(|(i, _)| *i).collect();
    let sorted: Vec<B256> = indexed.into_iter().map(|(_, h)| h).collect();

    let mut levels = vec![sorted];
    while levels.last().unwrap().len() > 1 {
        let current = levels.last().unwrap();
        let mut parent = Vec::with_capacity(current.len().div_ceil(2));
        let mut i = 0;
        while i < current.len() {
            let left = current[i];
            let right = if i + 1 < current.len() {
                current[i + 1]
            } else {
                current[i]
            };
            parent.push(pair_hash(&left, &right));
            i += 2;
        }
        levels.push(parent);
    }

    tracing::debug!(leaves = levels[0].len(), depth = levels.len(), "merkle tree built");

    Ok(MerkleTree {
        levels,
        permutation,
    })
}

/// Verify a leaf/proof pair against an expected root.
pub fn verify(leaf: B256, proof: &[ProofStep], expected_root: B256) -> bool {
    let mut current = leaf;
    for step in proof {
        current = if step.is_right {
            pair_hash(&current, &step.sibling)
        } else {
            pair_hash(&step.sibling, &current)
        };
    }
    current == expected_root
}
