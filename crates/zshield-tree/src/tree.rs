//! The incremental (frontier) Merkle tree.

use std::io::{self, Read, Write};

use incrementalmerkletree::{Hashable, Level};

use crate::encoding::{
    read_length, read_node, read_optional, write_compact_size, write_node, write_optional,
};
use crate::error::TreeError;
use crate::node::TreeNode;
use crate::path::MerklePath;
use crate::witness::IncrementalWitness;

/// Supplies the hashes substituted for unfilled subtrees.
///
/// Caller-provided hashes are consumed one per missing subtree, lowest level
/// first; once they run out the empty root of the requested level is used.
struct PathFiller<'a, H> {
    queue: std::slice::Iter<'a, H>,
}

impl<'a, H: Hashable + Copy> PathFiller<'a, H> {
    fn new(filler: &'a [H]) -> Self {
        Self {
            queue: filler.iter(),
        }
    }

    fn next(&mut self, level: u8) -> H {
        self.queue
            .next()
            .copied()
            .unwrap_or_else(|| H::empty_root(Level::from(level)))
    }
}

/// An append-only Merkle tree of fixed depth that stores only its frontier.
///
/// `left` and `right` are the two leaves of the rightmost level-1 subtree;
/// `parents[i]` is the root of a complete subtree at level `i + 1` waiting
/// for its right sibling. Reading the populated slots as the bits of a binary
/// counter gives the number of leaves appended so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementalMerkleTree<H, const DEPTH: u8> {
    left: Option<H>,
    right: Option<H>,
    parents: Vec<Option<H>>,
}

impl<H: TreeNode, const DEPTH: u8> Default for IncrementalMerkleTree<H, DEPTH> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: TreeNode, const DEPTH: u8> IncrementalMerkleTree<H, DEPTH> {
    const VALID_DEPTH: () = assert!(
        DEPTH >= 1 && DEPTH <= 63,
        "tree depth must be between 1 and 63"
    );

    /// An empty tree.
    #[must_use]
    pub const fn new() -> Self {
        let () = Self::VALID_DEPTH;
        Self {
            left: None,
            right: None,
            parents: Vec::new(),
        }
    }

    /// Rebuild a tree from its frontier slots.
    ///
    /// # Errors
    /// [`TreeError::MalformedTree`] if the slots could not have been produced
    /// by any sequence of appends.
    pub fn from_parts(
        left: Option<H>,
        right: Option<H>,
        parents: Vec<Option<H>>,
    ) -> Result<Self, TreeError> {
        let tree = Self {
            left,
            right,
            parents,
        };
        tree.wfcheck()?;
        Ok(tree)
    }

    /// The left leaf of the rightmost level-1 subtree.
    #[must_use]
    pub const fn left(&self) -> Option<&H> {
        self.left.as_ref()
    }

    /// The right leaf of the rightmost level-1 subtree.
    #[must_use]
    pub const fn right(&self) -> Option<&H> {
        self.right.as_ref()
    }

    /// Completed subtree roots, `parents()[i]` at level `i + 1`.
    #[must_use]
    pub fn parents(&self) -> &[Option<H>] {
        &self.parents
    }

    /// Whether no leaf has been appended.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.left.is_none()
    }

    /// Maximum number of leaves, `2^DEPTH`.
    #[must_use]
    pub fn capacity() -> u64 {
        1_u64.checked_shl(u32::from(DEPTH)).unwrap_or(u64::MAX)
    }

    /// Number of leaves appended so far.
    #[must_use]
    pub fn size(&self) -> u64 {
        let leaves = u64::from(self.left.is_some()).saturating_add(u64::from(self.right.is_some()));
        self.parents
            .iter()
            .zip(1_u32..)
            .filter(|(parent, _)| parent.is_some())
            .fold(leaves, |acc, (_, level)| {
                acc.saturating_add(1_u64.checked_shl(level).unwrap_or(0))
            })
    }

    /// Append a leaf.
    ///
    /// # Errors
    /// [`TreeError::CapacityExceeded`] if the tree already holds `2^DEPTH`
    /// leaves. The tree is left unchanged.
    pub fn append(&mut self, obj: H) -> Result<(), TreeError> {
        if self.is_complete(DEPTH) {
            return Err(TreeError::CapacityExceeded { depth: DEPTH });
        }

        match (self.left, self.right) {
            (None, _) => self.left = Some(obj),
            (Some(_), None) => self.right = Some(obj),
            (Some(left), Some(right)) => {
                let mut carry = H::combine(Level::from(0), &left, &right);
                self.left = Some(obj);
                self.right = None;

                for (slot, level) in self.parents.iter_mut().zip(1_u8..) {
                    match slot.take() {
                        Some(parent) => carry = H::combine(Level::from(level), &parent, &carry),
                        None => {
                            *slot = Some(carry);
                            return Ok(());
                        }
                    }
                }

                // The carry ran past the highest slot.
                self.parents.push(Some(carry));
            }
        }

        Ok(())
    }

    /// Whether the tree is a full subtree of height `depth`.
    #[must_use]
    pub fn is_complete(&self, depth: u8) -> bool {
        if depth == 0 || self.left.is_none() || self.right.is_none() {
            return false;
        }
        self.parents.len() == usize::from(depth.saturating_sub(1))
            && self.parents.iter().all(Option::is_some)
    }

    /// Level of the lowest unfilled subtree after skipping `skip` of them.
    ///
    /// Free slots are counted from the bottom of the frontier; past the top
    /// each further skip moves up one level.
    #[must_use]
    pub fn next_depth(&self, skip: usize) -> u8 {
        let mut skip = skip;
        let slots = [(self.left.is_none(), 0_u8), (self.right.is_none(), 0_u8)]
            .into_iter()
            .chain(
                self.parents
                    .iter()
                    .zip(1_u8..)
                    .map(|(parent, level)| (parent.is_none(), level)),
            );

        for (free, level) in slots {
            if free {
                if skip == 0 {
                    return level;
                }
                skip = skip.saturating_sub(1);
            }
        }

        let above = u8::try_from(self.parents.len())
            .unwrap_or(u8::MAX)
            .saturating_add(1);
        above.saturating_add(u8::try_from(skip).unwrap_or(u8::MAX))
    }

    /// Root of the full depth-`DEPTH` tree, padding with empty subtrees.
    #[must_use]
    pub fn root(&self) -> H {
        self.root_at(DEPTH, &[])
    }

    /// Root at height `depth`, filling missing subtrees from `filler` first.
    #[must_use]
    pub fn root_at(&self, depth: u8, filler: &[H]) -> H {
        let mut filler = PathFiller::new(filler);

        let left = self.left.unwrap_or_else(|| filler.next(0));
        let right = self.right.unwrap_or_else(|| filler.next(0));
        let mut root = H::combine(Level::from(0), &left, &right);

        let mut level = 1_u8;
        for parent in &self.parents {
            root = match parent {
                Some(parent) => H::combine(Level::from(level), parent, &root),
                None => H::combine(Level::from(level), &root, &filler.next(level)),
            };
            level = level.saturating_add(1);
        }

        while level < depth {
            root = H::combine(Level::from(level), &root, &filler.next(level));
            level = level.saturating_add(1);
        }

        root
    }

    /// Authentication path of the most recently appended leaf.
    ///
    /// Siblings the frontier does not hold are taken from `filler`, then from
    /// the empty-root table.
    ///
    /// # Errors
    /// [`TreeError::EmptyTree`] if no leaf has been appended.
    pub fn path(&self, filler: &[H]) -> Result<MerklePath<H>, TreeError> {
        let left = self.left.ok_or(TreeError::EmptyTree)?;
        let mut filler = PathFiller::new(filler);

        let depth = usize::from(DEPTH);
        let mut auth_path = Vec::with_capacity(depth);
        let mut index = Vec::with_capacity(depth);

        if self.right.is_some() {
            auth_path.push(left);
            index.push(true);
        } else {
            auth_path.push(filler.next(0));
            index.push(false);
        }

        let mut level = 1_u8;
        for parent in &self.parents {
            match parent {
                Some(parent) => {
                    auth_path.push(*parent);
                    index.push(true);
                }
                None => {
                    auth_path.push(filler.next(level));
                    index.push(false);
                }
            }
            level = level.saturating_add(1);
        }

        while level < DEPTH {
            auth_path.push(filler.next(level));
            index.push(false);
            level = level.saturating_add(1);
        }

        MerklePath::from_parts(auth_path, index)
    }

    /// The most recently appended leaf.
    ///
    /// # Errors
    /// [`TreeError::EmptyTree`] if no leaf has been appended.
    pub fn last(&self) -> Result<H, TreeError> {
        self.right.or(self.left).ok_or(TreeError::EmptyTree)
    }

    /// A witness for the most recently appended leaf.
    #[must_use]
    pub fn witness(&self) -> IncrementalWitness<H, DEPTH> {
        IncrementalWitness::from_tree(self.clone())
    }

    /// Root of a depth-`DEPTH` tree with no leaves.
    #[must_use]
    pub fn empty_root() -> H {
        H::empty_root(Level::from(DEPTH))
    }

    /// Check that the frontier is in canonical form.
    ///
    /// # Errors
    /// [`TreeError::MalformedTree`] if the tree has `DEPTH` or more parent
    /// slots, an empty highest parent slot, a right leaf without a left leaf,
    /// or parents without a left leaf.
    pub fn wfcheck(&self) -> Result<(), TreeError> {
        if self.parents.len() >= usize::from(DEPTH) {
            return Err(TreeError::MalformedTree("tree has too many parents"));
        }
        if matches!(self.parents.last(), Some(None)) {
            return Err(TreeError::MalformedTree(
                "tree has a non-canonical representation of parents",
            ));
        }
        if self.left.is_none() && self.right.is_some() {
            return Err(TreeError::MalformedTree(
                "tree has a right leaf but no left leaf",
            ));
        }
        if self.left.is_none() && !self.parents.is_empty() {
            return Err(TreeError::MalformedTree(
                "tree has parents but no left leaf",
            ));
        }
        Ok(())
    }

    /// Serialize the frontier.
    ///
    /// # Errors
    /// Propagates errors from `writer`.
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        write_optional(&mut writer, self.left.as_ref(), write_node)?;
        write_optional(&mut writer, self.right.as_ref(), write_node)?;
        write_compact_size(
            &mut writer,
            u64::try_from(self.parents.len()).unwrap_or(u64::MAX),
        )?;
        for parent in &self.parents {
            write_optional(&mut writer, parent.as_ref(), write_node)?;
        }
        Ok(())
    }

    /// Deserialize a frontier and check it is well formed.
    ///
    /// # Errors
    /// - [`TreeError::Io`] on a truncated or unreadable stream.
    /// - [`TreeError::InvalidNode`] on a hash outside the node domain.
    /// - [`TreeError::MalformedTree`] on a non-canonical frontier.
    pub fn read<R: Read>(mut reader: R) -> Result<Self, TreeError> {
        let left = read_optional(&mut reader, read_node)?;
        let right = read_optional(&mut reader, read_node)?;
        let count = read_length(&mut reader, usize::from(DEPTH))?;
        let parents = (0..count)
            .map(|_| read_optional(&mut reader, read_node))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_parts(left, right, parents)
    }
}
