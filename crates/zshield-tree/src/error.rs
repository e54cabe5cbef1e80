//! Errors raised by trees, paths and witnesses.

use thiserror::Error;

/// Errors that can occur when working with note commitment trees.
#[derive(Error, Debug)]
pub enum TreeError {
    /// The tree already holds `2^depth` leaves.
    #[error("Tree is full: a depth-{depth} tree holds at most 2^{depth} leaves")]
    CapacityExceeded {
        /// Depth of the full tree.
        depth: u8,
    },

    /// The tree has no leaves.
    #[error("Tree is empty")]
    EmptyTree,

    /// A decoded tree or witness does not correspond to any append sequence.
    #[error("Malformed tree: {0}")]
    MalformedTree(&'static str),

    /// Node bytes are not a valid encoding for the hash domain.
    #[error("Invalid node encoding")]
    InvalidNode,

    /// A Merkle path is inconsistent.
    #[error("Invalid Merkle path: {0}")]
    InvalidPath(&'static str),

    /// Reading or writing the binary form failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
