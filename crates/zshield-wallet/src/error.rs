//! Errors raised by the commitment tracker.

use thiserror::Error;
use zshield_tree::TreeError;

use crate::tracker::NoteId;

/// Errors that can occur while tracking commitments and witnesses.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// A block was connected out of order.
    #[error("Expected block at height {expected}, got {found}")]
    NonContiguousBlock {
        /// Height following the current tip.
        expected: u32,
        /// Height of the rejected block.
        found: u32,
    },

    /// The block to disconnect is older than the witness cache reaches.
    #[error("Cannot disconnect past the witness cache")]
    ReorgTooDeep,

    /// The note is not tracked.
    #[error("Unknown note {0}")]
    UnknownNote(NoteId),

    /// The note is already tracked.
    #[error("Note {0} is already tracked")]
    DuplicateNote(NoteId),

    /// The note's witness does not authenticate against the current anchor.
    #[error("Witness for note {0} is out of sync with the commitment tree")]
    WitnessOutOfSync(NoteId),

    /// Persisted tracker state is inconsistent.
    #[error("Corrupt tracker state: {0}")]
    Corrupt(&'static str),

    /// A tree or witness operation failed.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Reading or writing tracker state failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
