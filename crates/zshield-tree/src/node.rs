//! Note commitment tree node types.
//!
//! Two hash domains back the note commitment trees: the legacy domain built on
//! the SHA-256 compression function, and the Sapling domain built on the
//! Pedersen hash from `sapling-crypto`. Both implement `Hashable` from
//! `incrementalmerkletree`, which is the only capability the trees rely on.

use std::sync::LazyLock;

use incrementalmerkletree::{Hashable, Level};
use sapling::merkle_hash;
use sha2::digest::generic_array::GenericArray;

use crate::empty_roots::EmptyRoots;

/// Depth of the Sapling note commitment tree.
pub const SAPLING_TREE_DEPTH: u8 = sapling::NOTE_COMMITMENT_TREE_DEPTH;

/// Depth of the legacy SHA-256 note commitment tree.
pub const SPROUT_TREE_DEPTH: u8 = 29;

/// A 32-byte tree node with a canonical byte encoding.
pub trait TreeNode: Hashable + Copy + Eq {
    /// The canonical encoding of this node.
    fn to_bytes(&self) -> [u8; 32];

    /// Decode a node, returning `None` when `bytes` is not a valid encoding.
    fn from_bytes(bytes: [u8; 32]) -> Option<Self>;
}

/// SHA-256 initial hash value (FIPS 180-4, 5.3.3).
const SHA256_IV: [u32; 8] = [
    0x6a09_e667,
    0xbb67_ae85,
    0x3c6e_f372,
    0xa54f_f53a,
    0x510e_527f,
    0x9b05_688c,
    0x1f83_d9ab,
    0x5be0_cd19,
];

/// A node of the legacy commitment tree.
///
/// Internal nodes are the raw SHA-256 compression of `left || right`, with no
/// padding and no length block. The level does not enter the hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Sha256Node([u8; 32]);

impl Sha256Node {
    /// Wrap raw node bytes. Every 32-byte string is a valid node.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

fn sha256_compress(lhs: &[u8; 32], rhs: &[u8; 32]) -> [u8; 32] {
    let mut block = [0_u8; 64];
    let (first, second) = block.split_at_mut(32);
    first.copy_from_slice(lhs);
    second.copy_from_slice(rhs);

    let mut state = SHA256_IV;
    sha2::compress256(&mut state, &[GenericArray::clone_from_slice(&block)]);

    let mut out = [0_u8; 32];
    for (chunk, word) in out.chunks_exact_mut(4).zip(state) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
    out
}

impl Hashable for Sha256Node {
    /// The uncommitted leaf is all zeros.
    fn empty_leaf() -> Self {
        Self([0_u8; 32])
    }

    fn combine(_level: Level, lhs: &Self, rhs: &Self) -> Self {
        Self(sha256_compress(&lhs.0, &rhs.0))
    }

    fn empty_root(level: Level) -> Self {
        SHA256_EMPTY_ROOTS.root(level.into())
    }
}

impl TreeNode for Sha256Node {
    fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    fn from_bytes(bytes: [u8; 32]) -> Option<Self> {
        Some(Self(bytes))
    }
}

static SHA256_EMPTY_ROOTS: LazyLock<EmptyRoots<Sha256Node>> =
    LazyLock::new(|| EmptyRoots::new(SPROUT_TREE_DEPTH));

/// A node of the Sapling note commitment tree.
///
/// The bytes are always the canonical little-endian encoding of a BLS12-381
/// scalar; [`TreeNode::from_bytes`] rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SaplingNode([u8; 32]);

impl SaplingNode {
    /// Node for a note commitment (`cmu`) given in its canonical encoding.
    ///
    /// Returns `None` if the bytes are not a canonical scalar.
    #[must_use]
    pub fn from_cmu(cmu: &sapling::note::ExtractedNoteCommitment) -> Option<Self> {
        <Self as TreeNode>::from_bytes(cmu.to_bytes())
    }

    /// Convert into the node type consumed by the Sapling prover.
    #[must_use]
    pub fn to_sapling(&self) -> Option<sapling::Node> {
        sapling::Node::from_bytes(self.0).into_option()
    }
}

impl Hashable for SaplingNode {
    /// The uncommitted leaf is the scalar one.
    fn empty_leaf() -> Self {
        Self(bls12_381::Scalar::one().to_bytes())
    }

    /// Pedersen hash with the level as personalization.
    fn combine(level: Level, lhs: &Self, rhs: &Self) -> Self {
        Self(merkle_hash(level.into(), &lhs.0, &rhs.0))
    }

    fn empty_root(level: Level) -> Self {
        SAPLING_EMPTY_ROOTS.root(level.into())
    }
}

impl TreeNode for SaplingNode {
    fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    fn from_bytes(bytes: [u8; 32]) -> Option<Self> {
        bls12_381::Scalar::from_bytes(&bytes)
            .into_option()
            .map(|_| Self(bytes))
    }
}

static SAPLING_EMPTY_ROOTS: LazyLock<EmptyRoots<SaplingNode>> =
    LazyLock::new(|| EmptyRoots::new(SAPLING_TREE_DEPTH));

#[cfg(test)]
mod tests {
    #![allow(clippy::arithmetic_side_effects, reason = "Tests")]

    use hex_literal::hex;

    use super::*;

    #[test]
    fn sha256_empty_leaf_is_zeros() {
        assert_eq!(Sha256Node::empty_leaf().to_bytes(), [0_u8; 32]);
    }

    #[test]
    fn sha256_compression_of_zero_block() {
        // First non-trivial entry of the legacy empty-root table.
        assert_eq!(
            Sha256Node::empty_root(Level::from(1)).to_bytes(),
            hex!("da5698be17b9b46962335799779fbeca8ce5d491c0d26243bafef9ea1837a9d8")
        );
    }

    #[test]
    fn sha256_order_matters() {
        let a = Sha256Node::new([1_u8; 32]);
        let b = Sha256Node::new([2_u8; 32]);
        assert_ne!(
            Sha256Node::combine(Level::from(0), &a, &b),
            Sha256Node::combine(Level::from(0), &b, &a)
        );
    }

    #[test]
    fn sha256_level_is_not_bound() {
        let a = Sha256Node::new([1_u8; 32]);
        let b = Sha256Node::new([2_u8; 32]);
        assert_eq!(
            Sha256Node::combine(Level::from(0), &a, &b),
            Sha256Node::combine(Level::from(7), &a, &b)
        );
    }

    #[test]
    fn sapling_empty_leaf_is_one() {
        let mut one = [0_u8; 32];
        one[0] = 1;
        assert_eq!(SaplingNode::empty_leaf().to_bytes(), one);
    }

    #[test]
    fn sapling_matches_upstream_empty_roots() {
        for level in [0_u8, 1, 5, SAPLING_TREE_DEPTH] {
            let ours = SaplingNode::empty_root(Level::from(level));
            let upstream = sapling::Node::empty_root(Level::from(level));
            assert_eq!(ours.to_sapling(), Some(upstream));
        }
    }

    #[test]
    fn sapling_combine_uses_level_for_domain_separation() {
        let a = SaplingNode::empty_leaf();
        let b = SaplingNode::empty_root(Level::from(1));

        let level0 = SaplingNode::combine(Level::from(0), &a, &b);
        let level1 = SaplingNode::combine(Level::from(1), &a, &b);

        assert_ne!(level0, level1);
    }

    #[test]
    fn sapling_rejects_non_canonical_bytes() {
        assert!(SaplingNode::from_bytes([0xff_u8; 32]).is_none());
        assert!(SaplingNode::from_bytes([0_u8; 32]).is_some());
    }

    #[test]
    fn empty_roots_follow_recurrence() {
        for level in 1..=SAPLING_TREE_DEPTH {
            let prev = SaplingNode::empty_root(Level::from(level - 1));
            assert_eq!(
                SaplingNode::empty_root(Level::from(level)),
                SaplingNode::combine(Level::from(level - 1), &prev, &prev)
            );
        }
    }
}
