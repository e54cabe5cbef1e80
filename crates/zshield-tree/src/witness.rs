//! Incremental witnesses.

use std::io::{self, Read, Write};

use crate::encoding::{
    read_length, read_node, read_optional, write_compact_size, write_node, write_optional,
};
use crate::error::TreeError;
use crate::node::TreeNode;
use crate::path::MerklePath;
use crate::tree::IncrementalMerkleTree;

/// Keeps the authentication path of one leaf current as the tree grows.
///
/// `tree` is the frontier as it was when the leaf was appended. Every leaf
/// appended to the global tree afterwards must be passed to
/// [`IncrementalWitness::append`] in the same order. Those leaves build the
/// right-hand siblings the snapshot is missing: completed ones are kept in
/// `filled`, the one under construction lives in `cursor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementalWitness<H, const DEPTH: u8> {
    tree: IncrementalMerkleTree<H, DEPTH>,
    filled: Vec<H>,
    cursor: Option<IncrementalMerkleTree<H, DEPTH>>,
    cursor_depth: u8,
}

impl<H: TreeNode, const DEPTH: u8> IncrementalWitness<H, DEPTH> {
    /// Witness the most recently appended leaf of `tree`.
    #[must_use]
    pub fn from_tree(tree: IncrementalMerkleTree<H, DEPTH>) -> Self {
        let cursor_depth = tree.next_depth(0);
        Self {
            tree,
            filled: Vec::new(),
            cursor: None,
            cursor_depth,
        }
    }

    /// Rebuild a witness from its persisted parts.
    ///
    /// The cursor depth is derived from `tree` and `filled`.
    ///
    /// # Errors
    /// [`TreeError::MalformedTree`] if either tree is malformed, if a filled
    /// sibling would sit at or above the root, if the cursor is empty or
    /// already complete, if the cursor is taller than the subtree it builds,
    /// or if a cursor is present where no sibling remains to be built.
    pub fn from_parts(
        tree: IncrementalMerkleTree<H, DEPTH>,
        filled: Vec<H>,
        cursor: Option<IncrementalMerkleTree<H, DEPTH>>,
    ) -> Result<Self, TreeError> {
        tree.wfcheck()?;
        if filled.len() > usize::from(DEPTH) {
            return Err(TreeError::MalformedTree(
                "witness has more filled siblings than levels",
            ));
        }
        if !filled.is_empty() && tree.next_depth(filled.len().saturating_sub(1)) >= DEPTH {
            return Err(TreeError::MalformedTree(
                "witness filled sibling lies above the tree",
            ));
        }

        let cursor_depth = tree.next_depth(filled.len());
        if let Some(cursor) = &cursor {
            cursor.wfcheck()?;
            if cursor_depth == 0 || cursor_depth >= DEPTH {
                return Err(TreeError::MalformedTree(
                    "witness cursor has no sibling to build",
                ));
            }
            if cursor.is_empty() || cursor.is_complete(cursor_depth) {
                return Err(TreeError::MalformedTree(
                    "witness cursor is empty or already complete",
                ));
            }
            // Building level `d` needs at most `d - 1` parent slots.
            if cursor.parents().len() >= usize::from(cursor_depth) {
                return Err(TreeError::MalformedTree(
                    "witness cursor is taller than the sibling it builds",
                ));
            }
        }

        Ok(Self {
            tree,
            filled,
            cursor,
            cursor_depth,
        })
    }

    /// The tree as it was when the leaf was witnessed.
    #[must_use]
    pub const fn tree(&self) -> &IncrementalMerkleTree<H, DEPTH> {
        &self.tree
    }

    /// Completed sibling roots, lowest first.
    #[must_use]
    pub fn filled(&self) -> &[H] {
        &self.filled
    }

    /// The sibling subtree currently being built.
    #[must_use]
    pub const fn cursor(&self) -> Option<&IncrementalMerkleTree<H, DEPTH>> {
        self.cursor.as_ref()
    }

    /// Height of the sibling subtree the cursor is building.
    #[must_use]
    pub const fn cursor_depth(&self) -> u8 {
        self.cursor_depth
    }

    /// Feed the next leaf appended to the global tree.
    ///
    /// # Errors
    /// [`TreeError::CapacityExceeded`] if the global tree would exceed
    /// `2^DEPTH` leaves. The witness is left unchanged.
    pub fn append(&mut self, obj: H) -> Result<(), TreeError> {
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.append(obj)?;
            if cursor.is_complete(self.cursor_depth) {
                let sibling = cursor.root_at(self.cursor_depth, &[]);
                self.filled.push(sibling);
                self.cursor = None;
            }
            return Ok(());
        }

        let cursor_depth = self.tree.next_depth(self.filled.len());
        if cursor_depth >= DEPTH {
            return Err(TreeError::CapacityExceeded { depth: DEPTH });
        }
        self.cursor_depth = cursor_depth;

        if cursor_depth == 0 {
            self.filled.push(obj);
        } else {
            let mut cursor = IncrementalMerkleTree::new();
            cursor.append(obj)?;
            self.cursor = Some(cursor);
        }
        Ok(())
    }

    /// The witnessed leaf.
    ///
    /// # Errors
    /// [`TreeError::EmptyTree`] if the witness was taken on an empty tree.
    pub fn element(&self) -> Result<H, TreeError> {
        self.tree.last()
    }

    /// Position of the witnessed leaf.
    ///
    /// # Errors
    /// [`TreeError::EmptyTree`] if the witness was taken on an empty tree.
    pub fn position(&self) -> Result<u64, TreeError> {
        self.tree.size().checked_sub(1).ok_or(TreeError::EmptyTree)
    }

    /// Sibling roots above the snapshot, lowest first.
    ///
    /// A sibling still under construction is included with its missing
    /// leaves treated as empty, so it only matches the global tree once the
    /// cursor completes.
    #[must_use]
    pub fn partial_path(&self) -> Vec<H> {
        let mut path = self.filled.clone();
        if let Some(cursor) = &self.cursor {
            path.push(cursor.root_at(self.cursor_depth, &[]));
        }
        path
    }

    /// Authentication path from the witnessed leaf to [`root`](Self::root).
    ///
    /// # Errors
    /// [`TreeError::EmptyTree`] if the witness was taken on an empty tree.
    pub fn path(&self) -> Result<MerklePath<H>, TreeError> {
        self.tree.path(&self.partial_path())
    }

    /// The anchor this witness currently authenticates against.
    #[must_use]
    pub fn root(&self) -> H {
        self.tree.root_at(DEPTH, &self.partial_path())
    }

    /// Serialize the witness. The cursor depth is not written.
    ///
    /// # Errors
    /// Propagates errors from `writer`.
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        self.tree.write(&mut writer)?;
        write_compact_size(
            &mut writer,
            u64::try_from(self.filled.len()).unwrap_or(u64::MAX),
        )?;
        for node in &self.filled {
            write_node(&mut writer, node)?;
        }
        write_optional(&mut writer, self.cursor.as_ref(), |w, cursor| cursor.write(w))
    }

    /// Deserialize a witness, recomputing the cursor depth.
    ///
    /// # Errors
    /// As for [`IncrementalMerkleTree::read`], plus the checks of
    /// [`IncrementalWitness::from_parts`].
    pub fn read<R: Read>(mut reader: R) -> Result<Self, TreeError> {
        let tree = IncrementalMerkleTree::read(&mut reader)?;
        let count = read_length(&mut reader, usize::from(DEPTH))?;
        let filled = (0..count)
            .map(|_| read_node(&mut reader))
            .collect::<Result<Vec<_>, _>>()?;
        let cursor = read_optional(&mut reader, |r| IncrementalMerkleTree::read(&mut *r))?;
        Self::from_parts(tree, filled, cursor)
    }
}
