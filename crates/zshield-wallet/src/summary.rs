//! Serializable snapshot of tracker state for display and diagnostics.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use zshield_core::base::ReversedHex;
use zshield_tree::TreeNode;

use crate::tracker::CommitmentTracker;

/// Tracker state as reported to users.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSummary {
    /// Height of the last connected block.
    pub tip_height: Option<u32>,
    /// Current tree root, in display byte order.
    #[serde_as(as = "ReversedHex")]
    pub anchor: [u8; 32],
    /// Number of commitments in the tree.
    pub tree_size: u64,
    /// Blocks that can still be disconnected.
    pub reorg_depth: usize,
    /// Tracked notes in id order.
    pub notes: Vec<NoteSummary>,
}

/// One tracked note.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSummary {
    /// Transaction id, in display byte order.
    #[serde_as(as = "ReversedHex")]
    pub txid: [u8; 32],
    /// Output index within the transaction.
    pub output_index: u32,
    /// Leaf position of the note commitment.
    pub position: u64,
    /// Height of the block that contained the note.
    pub discovered_at: u32,
    /// Number of cached witnesses, the current one included.
    pub cached_witnesses: usize,
}

impl<H: TreeNode, const DEPTH: u8> CommitmentTracker<H, DEPTH> {
    /// Snapshot the tracker for reporting.
    #[must_use]
    pub fn summary(&self) -> TrackerSummary {
        let notes = self
            .notes()
            .filter_map(|(id, cache)| {
                let position = cache.latest()?.position().ok()?;
                Some(NoteSummary {
                    txid: id.txid,
                    output_index: id.output_index,
                    position,
                    discovered_at: cache.discovered_at(),
                    cached_witnesses: cache.len(),
                })
            })
            .collect();

        TrackerSummary {
            tip_height: self.tip_height(),
            anchor: self.anchor().to_bytes(),
            tree_size: self.tree().size(),
            reorg_depth: self.reorg_depth(),
            notes,
        }
    }
}
