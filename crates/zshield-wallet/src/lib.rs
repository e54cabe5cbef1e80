//! Wallet-side commitment tracking.
//!
//! [`CommitmentTracker`] follows the chain block by block, appending every
//! note commitment to the tree and advancing a witness for each note the
//! wallet owns. A bounded cache of past witnesses lets it undo blocks during
//! a reorganization, and the current witnesses feed straight into a
//! transaction builder as anchor and authentication paths.

mod error;
mod persist;
mod summary;
mod tracker;

pub use error::TrackerError;
pub use summary::{NoteSummary, TrackerSummary};
pub use tracker::{
    BlockCommitment, CommitmentTracker, NoteId, SaplingTracker, WITNESS_CACHE_SIZE, WitnessCache,
};
