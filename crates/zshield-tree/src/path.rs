//! Authentication paths.

use std::io::{self, Read, Write};

use incrementalmerkletree::{Hashable, Level, Position};

use crate::encoding::{read_node, read_u8};
use crate::error::TreeError;
use crate::node::{SaplingNode, TreeNode};

/// Longest path whose position still fits in a `u64`.
const MAX_PATH_DEPTH: usize = 64;

/// Sibling hashes and direction bits from a leaf up to the root.
///
/// `auth_path()[i]` is the sibling at level `i`; `index()[i]` is `true` when
/// the node on the path is the right child at that level. Read as bits of an
/// integer (bit `i` = `index()[i]`) the direction bits are the leaf position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerklePath<H> {
    auth_path: Vec<H>,
    index: Vec<bool>,
}

impl<H> MerklePath<H> {
    /// Build a path from leaf-to-root siblings and direction bits.
    ///
    /// # Errors
    /// [`TreeError::InvalidPath`] if the two sequences differ in length or
    /// are longer than 64 levels.
    pub fn from_parts(auth_path: Vec<H>, index: Vec<bool>) -> Result<Self, TreeError> {
        if auth_path.len() != index.len() {
            return Err(TreeError::InvalidPath(
                "sibling and direction counts differ",
            ));
        }
        if auth_path.len() > MAX_PATH_DEPTH {
            return Err(TreeError::InvalidPath("path is deeper than 64 levels"));
        }
        Ok(Self { auth_path, index })
    }

    /// Number of levels.
    #[must_use]
    pub fn depth(&self) -> u8 {
        u8::try_from(self.auth_path.len()).unwrap_or(u8::MAX)
    }

    /// Sibling hashes, leaf to root.
    #[must_use]
    pub fn auth_path(&self) -> &[H] {
        &self.auth_path
    }

    /// Direction bits, leaf to root.
    #[must_use]
    pub fn index(&self) -> &[bool] {
        &self.index
    }

    /// Position of the leaf this path authenticates.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.index
            .iter()
            .zip(0_u32..)
            .filter(|(is_right, _)| **is_right)
            .fold(0_u64, |acc, (_, bit)| acc | 1_u64.checked_shl(bit).unwrap_or(0))
    }
}

impl<H: Hashable + Copy> MerklePath<H> {
    /// Fold the path up from `leaf` and return the resulting root.
    #[must_use]
    pub fn root(&self, leaf: H) -> H {
        self.auth_path
            .iter()
            .zip(&self.index)
            .zip(0_u8..)
            .fold(leaf, |node, ((sibling, is_right), level)| {
                let level = Level::from(level);
                if *is_right {
                    H::combine(level, sibling, &node)
                } else {
                    H::combine(level, &node, sibling)
                }
            })
    }
}

impl<H: TreeNode> MerklePath<H> {
    /// Serialize the path.
    ///
    /// The layout is the depth as one byte, the siblings leaf to root, then
    /// the position as a big-endian integer of `ceil(depth / 8)` bytes.
    ///
    /// # Errors
    /// Propagates errors from `writer`.
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }

    /// Deserialize a path.
    ///
    /// # Errors
    /// - [`TreeError::Io`] on a truncated or unreadable stream.
    /// - [`TreeError::InvalidNode`] on a sibling outside the node domain.
    /// - [`TreeError::InvalidPath`] if the depth exceeds 64 or the packed
    ///   position has bits set at or above the depth.
    pub fn read<R: Read>(mut reader: R) -> Result<Self, TreeError> {
        let depth = read_u8(&mut reader)?;
        if usize::from(depth) > MAX_PATH_DEPTH {
            return Err(TreeError::InvalidPath("path is deeper than 64 levels"));
        }

        let auth_path = (0..depth)
            .map(|_| read_node(&mut reader))
            .collect::<Result<Vec<H>, _>>()?;

        let mut packed = [0_u8; 8];
        let skip = packed.len().saturating_sub(packed_len(depth));
        let tail = packed
            .get_mut(skip..)
            .ok_or(TreeError::InvalidPath("path is deeper than 64 levels"))?;
        reader.read_exact(tail)?;
        let position = u64::from_be_bytes(packed);

        if position.checked_shr(u32::from(depth)).unwrap_or(0) != 0 {
            return Err(TreeError::InvalidPath(
                "position has bits above the path depth",
            ));
        }

        let index = (0..u32::from(depth))
            .map(|bit| position.checked_shr(bit).is_some_and(|v| v & 1 == 1))
            .collect();

        Self::from_parts(auth_path, index)
    }

    /// The serialized form as a byte vector.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let depth = self.depth();
        let mut bytes = Vec::with_capacity(
            self.auth_path
                .len()
                .saturating_mul(32)
                .saturating_add(packed_len(depth))
                .saturating_add(1),
        );
        bytes.push(depth);
        for sibling in &self.auth_path {
            bytes.extend_from_slice(&sibling.to_bytes());
        }
        let packed = self.position().to_be_bytes();
        let skip = packed.len().saturating_sub(packed_len(depth));
        bytes.extend_from_slice(packed.get(skip..).unwrap_or_default());
        bytes
    }

    /// Parse a path from its serialized form.
    ///
    /// # Errors
    /// See [`MerklePath::read`]. Trailing bytes are rejected.
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, TreeError> {
        let path = Self::read(&mut bytes)?;
        if !bytes.is_empty() {
            return Err(TreeError::InvalidPath("trailing bytes after path"));
        }
        Ok(path)
    }
}

impl MerklePath<SaplingNode> {
    /// Convert into the path type consumed by the Sapling prover.
    ///
    /// # Errors
    /// [`TreeError::InvalidPath`] if the path is not exactly as deep as the
    /// Sapling tree.
    pub fn to_sapling(&self) -> Result<sapling::MerklePath, TreeError> {
        let nodes = self
            .auth_path
            .iter()
            .map(|node| node.to_sapling().ok_or(TreeError::InvalidNode))
            .collect::<Result<Vec<_>, _>>()?;
        sapling::MerklePath::from_parts(nodes, Position::from(self.position()))
            .map_err(|()| TreeError::InvalidPath("path depth does not match the Sapling tree"))
    }
}

fn packed_len(depth: u8) -> usize {
    usize::from(depth.div_ceil(8))
}
