//! Errors raised while assembling a transaction.

use thiserror::Error;
use zshield_tree::TreeError;

/// Errors that can occur while building a transaction.
#[derive(Error, Debug)]
pub enum BuilderError {
    /// A spend references a different anchor than the spends before it.
    #[error("Anchor {found} does not match anchor {expected} of previously added spends")]
    AnchorMismatch {
        /// Anchor fixed by the first spend, as display hex.
        expected: String,
        /// Anchor of the rejected spend, as display hex.
        found: String,
    },

    /// The authentication path does not lead from the note to the anchor.
    #[error("Merkle path does not connect the note commitment to the anchor")]
    PathMismatch,

    /// Inputs do not cover outputs plus fee.
    #[error("Insufficient funds: need {required} zatoshi, have {available}")]
    InsufficientFunds {
        /// Sum of outputs and fee.
        required: u64,
        /// Sum of transparent inputs and spent notes.
        available: u64,
    },

    /// An amount or running total left the valid money range.
    #[error("Value {0} is outside the valid money range")]
    ValueOutOfRange(u64),

    /// There is change to return but nowhere to send it.
    #[error("No change address: set one or add a shielded spend")]
    NoChangeAddress,

    /// Shielded components were added below the Sapling activation height.
    #[error("Sapling is not active at height {height} (activates at {activation})")]
    SaplingNotActive {
        /// Target height of the transaction.
        height: u32,
        /// Sapling activation height of the network.
        activation: u32,
    },

    /// The memo is longer than 512 bytes.
    #[error("Memo of {0} bytes exceeds 512 bytes")]
    MemoTooLong(usize),

    /// The proving backend rejected the transaction.
    #[error("Proving failed: {0}")]
    ProvingFailure(String),

    /// A tree, path or node could not be used.
    #[error(transparent)]
    Tree(#[from] TreeError),
}
