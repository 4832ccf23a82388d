//! # Merkle Trees over Chunk Digests
//!
//! The dataset fingerprint is the root of a binary SHA-256 Merkle tree whose
//! leaves are the chunk digests, in chunk order.
//!
//! ## Construction
//!
//! - Leaf: `SHA256(chunk)`.
//! - Parent: `SHA256(left || right)` over the raw 32-byte child hashes.
//! - A level with an odd node count pairs its last node with itself.
//! - A single chunk's root is its leaf hash.
//!
//! Leaves and interior nodes share one hash function with no domain prefix,
//! so fingerprints stay comparable with roots computed by existing clients.
//!
//! ## Inclusion Proofs
//!
//! [`InclusionProof`] carries the sibling hashes bottom-up. The bits of the
//! leaf index pick the side at each level: bit 0 means the running hash is
//! the left child.

use chaintrain_core::{sha256_raw, ContentDigest};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Hash a leaf (raw chunk bytes).
pub fn hash_leaf(data: &[u8]) -> [u8; 32] {
    sha256_raw(data)
}

/// Hash two child nodes.
pub fn hash_node(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left);
    buf[32..].copy_from_slice(right);
    sha256_raw(&buf)
}

/// A fully materialized Merkle tree. `levels[0]` holds the leaves and the
/// last level holds the root alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    /// Build a tree from leaf hashes. Zero leaves is an error.
    pub fn from_leaves(leaves: Vec<[u8; 32]>) -> Result<Self, CryptoError> {
        if leaves.is_empty() {
            return Err(CryptoError::Merkle("cannot build a tree with no leaves".into()));
        }
        let mut levels = vec![leaves];
        while levels.last().map_or(0, Vec::len) > 1 {
            let prev = levels.last().map(Vec::as_slice).unwrap_or_default();
            let next = prev
                .chunks(2)
                .map(|pair| {
                    let left = &pair[0];
                    hash_node(left, pair.get(1).unwrap_or(left))
                })
                .collect();
            levels.push(next);
        }
        Ok(Self { levels })
    }

    /// Build a tree directly from chunk bytes.
    pub fn from_chunks<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Result<Self, CryptoError> {
        Self::from_leaves(chunks.into_iter().map(hash_leaf).collect())
    }

    /// The Merkle root.
    pub fn root(&self) -> ContentDigest {
        let root = self
            .levels
            .last()
            .and_then(|l| l.first())
            .copied()
            .unwrap_or([0u8; 32]);
        ContentDigest::from_bytes(root)
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> u64 {
        self.levels.first().map_or(0, |l| l.len() as u64)
    }

    /// Leaf hash at `index`.
    pub fn leaf(&self, index: u64) -> Option<[u8; 32]> {
        self.levels
            .first()
            .and_then(|l| l.get(usize::try_from(index).ok()?))
            .copied()
    }

    /// Inclusion proof for the leaf at `index`.
    pub fn proof(&self, index: u64) -> Result<InclusionProof, CryptoError> {
        let count = self.leaf_count();
        if index >= count {
            return Err(CryptoError::Merkle(format!(
                "leaf index {index} out of range (tree has {count} leaves)"
            )));
        }
        let mut path = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut i = index as usize;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = if i % 2 == 0 {
                level.get(i + 1).unwrap_or(&level[i])
            } else {
                &level[i - 1]
            };
            path.push(ContentDigest::from_bytes(*sibling));
            i /= 2;
        }
        Ok(InclusionProof {
            leaf_index: index,
            leaf_count: count,
            path,
        })
    }
}

/// Sibling path from a leaf to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Index of the proven leaf.
    pub leaf_index: u64,
    /// Total leaves in the tree.
    pub leaf_count: u64,
    /// Sibling hashes, bottom level first.
    pub path: Vec<ContentDigest>,
}

impl InclusionProof {
    /// Recompute the root from a leaf hash and compare.
    pub fn verify_leaf(&self, leaf: &[u8; 32], root: &ContentDigest) -> bool {
        if self.leaf_index >= self.leaf_count || self.path.len() != expected_depth(self.leaf_count) {
            return false;
        }
        let mut current = *leaf;
        let mut index = self.leaf_index;
        for sibling in &self.path {
            current = if index & 1 == 0 {
                hash_node(&current, sibling.as_bytes())
            } else {
                hash_node(sibling.as_bytes(), &current)
            };
            index >>= 1;
        }
        current == *root.as_bytes()
    }

    /// Hash raw chunk bytes and verify them against the root.
    pub fn verify_chunk(&self, chunk: &[u8], root: &ContentDigest) -> bool {
        self.verify_leaf(&hash_leaf(chunk), root)
    }
}

fn expected_depth(leaf_count: u64) -> usize {
    let mut depth = 0;
    let mut n = leaf_count;
    while n > 1 {
        n = n.div_ceil(2);
        depth += 1;
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_leaf_root_is_leaf_hash() {
        let t = MerkleTree::from_chunks([&b"only"[..]]).unwrap();
        assert_eq!(t.root(), ContentDigest::of(b"only"));
        assert!(t.proof(0).unwrap().path.is_empty());
    }

    #[test]
    fn two_leaves() {
        let t = MerkleTree::from_chunks([&b"a"[..], &b"b"[..]]).unwrap();
        let expected = hash_node(&hash_leaf(b"a"), &hash_leaf(b"b"));
        assert_eq!(t.root().as_bytes(), &expected);
    }

    #[test]
    fn odd_node_is_paired_with_itself() {
        let t = MerkleTree::from_chunks([&b"a"[..], &b"b"[..], &b"c"[..]]).unwrap();
        let ab = hash_node(&hash_leaf(b"a"), &hash_leaf(b"b"));
        let cc = hash_node(&hash_leaf(b"c"), &hash_leaf(b"c"));
        assert_eq!(t.root().as_bytes(), &hash_node(&ab, &cc));
    }

    #[test]
    fn empty_tree_rejected() {
        assert!(MerkleTree::from_leaves(vec![]).is_err());
    }

    #[test]
    fn proof_out_of_range() {
        let t = MerkleTree::from_chunks([&b"a"[..]]).unwrap();
        assert!(t.proof(1).is_err());
    }

    #[test]
    fn tampered_chunk_fails_verification() {
        let chunks: Vec<&[u8]> = vec![b"one", b"two", b"three", b"four", b"five"];
        let t = MerkleTree::from_chunks(chunks.clone()).unwrap();
        let p = t.proof(4).unwrap();
        assert!(p.verify_chunk(b"five", &t.root()));
        assert!(!p.verify_chunk(b"fivE", &t.root()));
    }

    #[test]
    fn truncated_path_is_rejected() {
        let chunks: Vec<&[u8]> = vec![b"one", b"two", b"three", b"four"];
        let t = MerkleTree::from_chunks(chunks).unwrap();
        let mut p = t.proof(1).unwrap();
        p.path.pop();
        assert!(!p.verify_chunk(b"two", &t.root()));
    }

    proptest! {
        #[test]
        fn every_leaf_proves(leaves in proptest::collection::vec(proptest::array::uniform32(any::<u8>()), 1..40)) {
            let t = MerkleTree::from_leaves(leaves.clone()).unwrap();
            let root = t.root();
            for (i, leaf) in leaves.iter().enumerate() {
                prop_assert!(t.proof(i as u64).unwrap().verify_leaf(leaf, &root));
            }
        }

        #[test]
        fn root_is_deterministic(leaves in proptest::collection::vec(proptest::array::uniform32(any::<u8>()), 1..20)) {
            let a = MerkleTree::from_leaves(leaves.clone()).unwrap().root();
            let b = MerkleTree::from_leaves(leaves).unwrap().root();
            prop_assert_eq!(a, b);
        }
    }
}
