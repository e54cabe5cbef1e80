//! Commitment tree and witness bookkeeping driven by the chain tip.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use tracing::{debug, info, instrument, warn};
use zshield_core::base::reversed_hex;
use zshield_tree::{
    IncrementalMerkleTree, IncrementalWitness, MerklePath, SAPLING_TREE_DEPTH, SaplingNode,
    TreeNode,
};

use crate::error::TrackerError;

/// Number of blocks that can be disconnected before witnesses run out.
///
/// Each note keeps one witness per block it has seen, up to this many plus
/// the current one.
pub const WITNESS_CACHE_SIZE: usize = 100;

/// Identifies a shielded output by transaction and output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteId {
    /// Transaction id in internal byte order.
    pub txid: [u8; 32],
    /// Index of the output within the transaction.
    pub output_index: u32,
}

impl NoteId {
    /// Identify output `output_index` of transaction `txid`.
    #[must_use]
    pub const fn new(txid: [u8; 32], output_index: u32) -> Self {
        Self { txid, output_index }
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", reversed_hex(&self.txid), self.output_index)
    }
}

/// A commitment appended by a block, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCommitment<H> {
    /// The note commitment.
    pub cmu: H,
    /// Set when the commitment belongs to a note this wallet tracks.
    pub note: Option<NoteId>,
}

impl<H> BlockCommitment<H> {
    /// A commitment to someone else's note.
    #[must_use]
    pub const fn foreign(cmu: H) -> Self {
        Self { cmu, note: None }
    }

    /// A commitment to one of our notes.
    #[must_use]
    pub const fn owned(cmu: H, note: NoteId) -> Self {
        Self {
            cmu,
            note: Some(note),
        }
    }
}

/// Witnesses for one note, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessCache<H, const DEPTH: u8> {
    discovered_at: u32,
    witnesses: VecDeque<IncrementalWitness<H, DEPTH>>,
}

impl<H: TreeNode, const DEPTH: u8> WitnessCache<H, DEPTH> {
    pub(crate) fn from_parts(
        discovered_at: u32,
        witnesses: VecDeque<IncrementalWitness<H, DEPTH>>,
    ) -> Result<Self, TrackerError> {
        if witnesses.is_empty() {
            return Err(TrackerError::Corrupt("note has no witnesses"));
        }
        if witnesses.len() > WITNESS_CACHE_SIZE.saturating_add(1) {
            return Err(TrackerError::Corrupt("witness cache exceeds its limit"));
        }
        Ok(Self {
            discovered_at,
            witnesses,
        })
    }

    /// Height of the block that contained the note.
    #[must_use]
    pub const fn discovered_at(&self) -> u32 {
        self.discovered_at
    }

    /// Witness as of the current tip.
    #[must_use]
    pub fn latest(&self) -> Option<&IncrementalWitness<H, DEPTH>> {
        self.witnesses.front()
    }

    /// All cached witnesses, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &IncrementalWitness<H, DEPTH>> {
        self.witnesses.iter()
    }

    /// Number of cached witnesses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.witnesses.len()
    }

    /// Whether no witness is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.witnesses.is_empty()
    }

    fn push(&mut self, witness: IncrementalWitness<H, DEPTH>) {
        self.witnesses.push_front(witness);
        self.witnesses.truncate(WITNESS_CACHE_SIZE.saturating_add(1));
    }
}

/// Tree state before a connected block, kept to undo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockUndo<H, const DEPTH: u8> {
    pub(crate) height: u32,
    pub(crate) prior_tip: Option<u32>,
    pub(crate) tree: IncrementalMerkleTree<H, DEPTH>,
}

/// Keeps the commitment tree and the witnesses of owned notes in step with
/// the chain, including across reorganizations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentTracker<H, const DEPTH: u8> {
    pub(crate) tree: IncrementalMerkleTree<H, DEPTH>,
    pub(crate) tip: Option<u32>,
    pub(crate) history: VecDeque<BlockUndo<H, DEPTH>>,
    pub(crate) notes: BTreeMap<NoteId, WitnessCache<H, DEPTH>>,
}

/// Tracker over the Sapling note commitment tree.
pub type SaplingTracker = CommitmentTracker<SaplingNode, SAPLING_TREE_DEPTH>;

impl<H: TreeNode, const DEPTH: u8> Default for CommitmentTracker<H, DEPTH> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: TreeNode, const DEPTH: u8> CommitmentTracker<H, DEPTH> {
    /// An empty tracker that accepts any height as its first block.
    #[must_use]
    pub fn new() -> Self {
        Self::from_tree(IncrementalMerkleTree::new(), None)
    }

    /// Start tracking from a known tree state at `tip`.
    #[must_use]
    pub fn from_tree(tree: IncrementalMerkleTree<H, DEPTH>, tip: Option<u32>) -> Self {
        Self {
            tree,
            tip,
            history: VecDeque::new(),
            notes: BTreeMap::new(),
        }
    }

    /// The canonical commitment tree.
    #[must_use]
    pub const fn tree(&self) -> &IncrementalMerkleTree<H, DEPTH> {
        &self.tree
    }

    /// Height of the last connected block.
    #[must_use]
    pub const fn tip_height(&self) -> Option<u32> {
        self.tip
    }

    /// Root of the commitment tree at the tip.
    #[must_use]
    pub fn anchor(&self) -> H {
        self.tree.root()
    }

    /// How many blocks can currently be disconnected.
    #[must_use]
    pub fn reorg_depth(&self) -> usize {
        self.history.len()
    }

    /// Tracked notes in id order.
    pub fn notes(&self) -> impl Iterator<Item = (&NoteId, &WitnessCache<H, DEPTH>)> {
        self.notes.iter()
    }

    /// Append a block's commitments.
    ///
    /// Every tracked witness advances over every commitment. A witness for an
    /// owned commitment starts right after that commitment is appended. The
    /// tracker is left unchanged if any step fails.
    ///
    /// # Errors
    /// - [`TrackerError::NonContiguousBlock`] if `height` does not follow the tip.
    /// - [`TrackerError::DuplicateNote`] if an owned note is already tracked.
    /// - [`TrackerError::Tree`] if the tree is full.
    #[instrument(skip_all, fields(height = height))]
    pub fn connect_block(
        &mut self,
        height: u32,
        commitments: &[BlockCommitment<H>],
    ) -> Result<(), TrackerError> {
        if let Some(tip) = self.tip {
            let expected = tip.checked_add(1).ok_or(TrackerError::NonContiguousBlock {
                expected: tip,
                found: height,
            })?;
            if height != expected {
                warn!(expected, found = height, "Rejecting non-contiguous block");
                return Err(TrackerError::NonContiguousBlock {
                    expected,
                    found: height,
                });
            }
        }

        let mut tree = self.tree.clone();
        let mut advanced: BTreeMap<NoteId, IncrementalWitness<H, DEPTH>> = self
            .notes
            .iter()
            .filter_map(|(id, cache)| cache.latest().map(|w| (*id, w.clone())))
            .collect();
        let mut discovered = Vec::new();

        for commitment in commitments {
            tree.append(commitment.cmu)?;
            for witness in advanced.values_mut() {
                witness.append(commitment.cmu)?;
            }
            if let Some(id) = commitment.note {
                if advanced.contains_key(&id) {
                    return Err(TrackerError::DuplicateNote(id));
                }
                advanced.insert(id, tree.witness());
                discovered.push(id);
            }
        }

        for (id, witness) in advanced {
            match self.notes.get_mut(&id) {
                Some(cache) => cache.push(witness),
                None => {
                    self.notes.insert(
                        id,
                        WitnessCache {
                            discovered_at: height,
                            witnesses: VecDeque::from([witness]),
                        },
                    );
                }
            }
        }

        let before = std::mem::replace(&mut self.tree, tree);
        self.history.push_front(BlockUndo {
            height,
            prior_tip: self.tip,
            tree: before,
        });
        self.history.truncate(WITNESS_CACHE_SIZE);
        self.tip = Some(height);

        info!(
            commitments = commitments.len(),
            discovered = discovered.len(),
            tree_size = self.tree.size(),
            "Connected block"
        );
        Ok(())
    }

    /// Undo the most recently connected block and return its height.
    ///
    /// Notes first seen in that block are forgotten; every other note falls
    /// back to its previous witness.
    ///
    /// # Errors
    /// [`TrackerError::ReorgTooDeep`] once the undo history is exhausted.
    #[instrument(skip_all)]
    pub fn disconnect_block(&mut self) -> Result<u32, TrackerError> {
        let undo = self.history.pop_front().ok_or(TrackerError::ReorgTooDeep)?;

        let before = self.notes.len();
        self.notes.retain(|_, cache| cache.discovered_at != undo.height);
        let forgotten = before.saturating_sub(self.notes.len());

        for cache in self.notes.values_mut() {
            cache.witnesses.pop_front();
        }
        self.notes.retain(|_, cache| !cache.is_empty());

        self.tree = undo.tree;
        self.tip = undo.prior_tip;

        warn!(height = undo.height, forgotten, "Disconnected block");
        Ok(undo.height)
    }

    /// Stop tracking a note, e.g. once it is spent.
    ///
    /// # Errors
    /// [`TrackerError::UnknownNote`] if the note is not tracked.
    pub fn forget_note(&mut self, id: &NoteId) -> Result<(), TrackerError> {
        if self.notes.remove(id).is_none() {
            return Err(TrackerError::UnknownNote(*id));
        }
        debug!(note = %id, "Forgot note");
        Ok(())
    }

    /// Current witness of a note.
    ///
    /// # Errors
    /// [`TrackerError::UnknownNote`] if the note is not tracked.
    pub fn witness(&self, id: &NoteId) -> Result<&IncrementalWitness<H, DEPTH>, TrackerError> {
        self.notes
            .get(id)
            .and_then(WitnessCache::latest)
            .ok_or(TrackerError::UnknownNote(*id))
    }

    /// The anchor and authentication path for spending one note.
    ///
    /// # Errors
    /// As for [`CommitmentTracker::spend_witnesses`].
    pub fn spendable(&self, id: &NoteId) -> Result<(H, MerklePath<H>), TrackerError> {
        let witness = self.witness(id)?;
        let anchor = self.anchor();
        if witness.root() != anchor {
            return Err(TrackerError::WitnessOutOfSync(*id));
        }
        Ok((anchor, witness.path()?))
    }

    /// The anchor and one authentication path per note, ready to spend them
    /// together.
    ///
    /// # Errors
    /// - [`TrackerError::UnknownNote`] if any note is not tracked.
    /// - [`TrackerError::WitnessOutOfSync`] if a witness does not lead to the
    ///   current anchor.
    pub fn spend_witnesses(&self, ids: &[NoteId]) -> Result<(H, Vec<MerklePath<H>>), TrackerError> {
        let paths = ids
            .iter()
            .map(|id| self.spendable(id).map(|(_, path)| path))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((self.anchor(), paths))
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::arithmetic_side_effects,
        clippy::indexing_slicing,
        reason = "Tests"
    )]

    use test_utils::{TestNode, dense_root, leaf};

    use super::*;

    type Tracker = CommitmentTracker<TestNode, 8>;

    fn id(n: u8) -> NoteId {
        NoteId::new([n; 32], u32::from(n))
    }

    fn foreign(label: &str) -> BlockCommitment<TestNode> {
        BlockCommitment::foreign(leaf!(label))
    }

    fn owned(label: &str, n: u8) -> BlockCommitment<TestNode> {
        BlockCommitment::owned(leaf!(label), id(n))
    }

    fn assert_in_sync(tracker: &Tracker) {
        let anchor = tracker.anchor();
        for (note, cache) in tracker.notes() {
            let witness = cache.latest().expect("non-empty cache");
            assert_eq!(witness.root(), anchor, "witness for {note}");
            let path = witness.path().expect("non-empty witness");
            assert_eq!(path.root(witness.element().expect("element")), anchor);
        }
    }

    #[test]
    fn fresh_tracker_is_empty() {
        let tracker = Tracker::new();
        assert_eq!(tracker.tip_height(), None);
        assert_eq!(tracker.anchor(), IncrementalMerkleTree::<TestNode, 8>::empty_root());
        assert_eq!(tracker.reorg_depth(), 0);
        assert_eq!(tracker.notes().count(), 0);
    }

    #[test]
    fn witnesses_follow_the_tree() {
        let mut tracker = Tracker::new();
        tracker
            .connect_block(10, &[foreign("a"), owned("b", 1), foreign("c")])
            .expect("connect");
        tracker.connect_block(11, &[]).expect("connect");
        tracker
            .connect_block(12, &[owned("d", 2), foreign("e")])
            .expect("connect");

        assert_eq!(tracker.tip_height(), Some(12));
        let labels = ["a", "b", "c", "d", "e"].map(|l| leaf!(l));
        assert_eq!(tracker.anchor(), dense_root(&labels, 8));
        assert_eq!(tracker.witness(&id(1)).expect("tracked").position().expect("pos"), 1);
        assert_eq!(tracker.witness(&id(2)).expect("tracked").position().expect("pos"), 3);
        assert_in_sync(&tracker);

        let cache = tracker.notes().find(|(n, _)| **n == id(1)).expect("tracked").1;
        assert_eq!(cache.discovered_at(), 10);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn owned_commitment_at_end_of_block() {
        let mut tracker = Tracker::new();
        tracker
            .connect_block(1, &[foreign("a"), owned("b", 1)])
            .expect("connect");
        assert_eq!(tracker.witness(&id(1)).expect("tracked").element().expect("leaf"), leaf!("b"));
        assert_in_sync(&tracker);
    }

    #[test]
    fn rejects_gaps_and_repeats() {
        let mut tracker = Tracker::new();
        tracker.connect_block(5, &[foreign("a")]).expect("connect");
        assert!(matches!(
            tracker.connect_block(7, &[]),
            Err(TrackerError::NonContiguousBlock { expected: 6, found: 7 })
        ));
        assert!(matches!(
            tracker.connect_block(5, &[]),
            Err(TrackerError::NonContiguousBlock { expected: 6, found: 5 })
        ));
        assert_eq!(tracker.tip_height(), Some(5));
    }

    #[test]
    fn duplicate_note_leaves_tracker_unchanged() {
        let mut tracker = Tracker::new();
        tracker.connect_block(1, &[owned("a", 1)]).expect("connect");
        let snapshot = tracker.clone();

        assert!(matches!(
            tracker.connect_block(2, &[foreign("b"), owned("c", 1)]),
            Err(TrackerError::DuplicateNote(n)) if n == id(1)
        ));
        assert_eq!(tracker, snapshot);
    }

    #[test]
    fn full_tree_leaves_tracker_unchanged() {
        let mut tracker = CommitmentTracker::<TestNode, 2>::new();
        tracker
            .connect_block(1, &[owned("a", 1), foreign("b"), foreign("c")])
            .expect("connect");
        let snapshot = tracker.clone();

        assert!(matches!(
            tracker.connect_block(2, &[foreign("d"), foreign("e")]),
            Err(TrackerError::Tree(_))
        ));
        assert_eq!(tracker, snapshot);
    }

    #[test]
    fn disconnect_restores_previous_state() {
        let mut tracker = Tracker::new();
        tracker.connect_block(1, &[owned("a", 1), foreign("b")]).expect("connect");
        let after_first = tracker.clone();
        tracker
            .connect_block(2, &[foreign("c"), owned("d", 2)])
            .expect("connect");

        assert_eq!(tracker.disconnect_block().expect("history"), 2);
        assert_eq!(tracker.anchor(), after_first.anchor());
        assert_eq!(tracker.tip_height(), Some(1));
        assert!(matches!(tracker.witness(&id(2)), Err(TrackerError::UnknownNote(_))));
        assert_eq!(
            tracker.witness(&id(1)).expect("tracked"),
            after_first.witness(&id(1)).expect("tracked")
        );
        assert_in_sync(&tracker);

        // Replaying a different block on top works.
        tracker.connect_block(2, &[foreign("x")]).expect("connect");
        assert_in_sync(&tracker);
    }

    #[test]
    fn disconnect_everything_then_too_deep() {
        let mut tracker = Tracker::new();
        tracker.connect_block(3, &[owned("a", 1)]).expect("connect");
        tracker.connect_block(4, &[foreign("b")]).expect("connect");

        assert_eq!(tracker.disconnect_block().expect("history"), 4);
        assert_eq!(tracker.disconnect_block().expect("history"), 3);
        assert_eq!(tracker.tip_height(), None);
        assert_eq!(tracker.notes().count(), 0);
        assert!(matches!(tracker.disconnect_block(), Err(TrackerError::ReorgTooDeep)));
    }

    #[test]
    fn reorg_depth_is_bounded_by_cache() {
        let mut tracker = CommitmentTracker::<TestNode, 16>::new();
        tracker.connect_block(0, &[owned("note", 1)]).expect("connect");
        for height in 1..=150_u32 {
            let label = height.to_string();
            tracker
                .connect_block(height, &[BlockCommitment::foreign(leaf!(label))])
                .expect("connect");
        }
        assert_eq!(tracker.reorg_depth(), WITNESS_CACHE_SIZE);
        let cache = tracker.notes().next().expect("tracked").1;
        assert_eq!(cache.len(), WITNESS_CACHE_SIZE + 1);

        for _ in 0..WITNESS_CACHE_SIZE {
            tracker.disconnect_block().expect("within cache");
            let anchor = tracker.anchor();
            assert_eq!(tracker.witness(&id(1)).expect("tracked").root(), anchor);
        }
        assert_eq!(tracker.tip_height(), Some(50));
        assert!(matches!(tracker.disconnect_block(), Err(TrackerError::ReorgTooDeep)));
    }

    #[test]
    fn forget_and_spend_witnesses() {
        let mut tracker = Tracker::new();
        tracker
            .connect_block(1, &[owned("a", 1), foreign("b"), owned("c", 2)])
            .expect("connect");

        let (anchor, paths) = tracker.spend_witnesses(&[id(1), id(2)]).expect("tracked");
        assert_eq!(anchor, tracker.anchor());
        assert_eq!(paths[0].position(), 0);
        assert_eq!(paths[1].position(), 2);
        assert_eq!(paths[1].root(leaf!("c")), anchor);

        let (single_anchor, single) = tracker.spendable(&id(2)).expect("tracked");
        assert_eq!(single_anchor, anchor);
        assert_eq!(single, paths[1]);

        tracker.forget_note(&id(1)).expect("tracked");
        assert!(matches!(
            tracker.forget_note(&id(1)),
            Err(TrackerError::UnknownNote(_))
        ));
        assert!(matches!(
            tracker.spend_witnesses(&[id(2), id(1)]),
            Err(TrackerError::UnknownNote(n)) if n == id(1)
        ));
    }

    #[test]
    fn note_id_displays_reversed_txid() {
        let mut txid = [0_u8; 32];
        txid[0] = 0xab;
        let note = NoteId::new(txid, 3);
        let shown = note.to_string();
        assert!(shown.starts_with("0000"));
        assert!(shown.ends_with("ab:3"));
    }
}
