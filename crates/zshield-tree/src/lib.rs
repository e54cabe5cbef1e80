//! Incremental note commitment trees.
//!
//! An [`IncrementalMerkleTree`] keeps only the frontier of an append-only,
//! fixed-depth Merkle tree. An [`IncrementalWitness`] snapshots that frontier
//! when a note is appended and keeps its authentication path current as the
//! global tree grows.

mod empty_roots;
mod encoding;
mod error;
mod node;
mod path;
mod tree;
mod witness;

pub use empty_roots::EmptyRoots;
pub use error::TreeError;
pub use node::{SAPLING_TREE_DEPTH, SPROUT_TREE_DEPTH, SaplingNode, Sha256Node, TreeNode};
pub use path::MerklePath;
pub use tree::IncrementalMerkleTree;
pub use witness::IncrementalWitness;

/// The Sapling note commitment tree.
pub type SaplingTree = IncrementalMerkleTree<SaplingNode, SAPLING_TREE_DEPTH>;
/// A witness into the Sapling note commitment tree.
pub type SaplingWitness = IncrementalWitness<SaplingNode, SAPLING_TREE_DEPTH>;
/// The legacy SHA-256 note commitment tree.
pub type SproutTree = IncrementalMerkleTree<Sha256Node, SPROUT_TREE_DEPTH>;
/// A witness into the legacy SHA-256 note commitment tree.
pub type SproutWitness = IncrementalWitness<Sha256Node, SPROUT_TREE_DEPTH>;
