//! Shielded transaction construction.
//!
//! A [`TransactionBuilder`] collects transparent inputs and outputs together
//! with Sapling spends and outputs, balances them against the fee, routes
//! change, and hands the result to a [`TxProver`] for proofs and signatures.
//! Spends carry an anchor and authentication path taken from an
//! [`IncrementalWitness`](zshield_tree::IncrementalWitness); all spends in one
//! transaction must share the anchor.

mod builder;
mod error;
mod prover;
mod types;

pub use builder::TransactionBuilder;
pub use error::BuilderError;
#[cfg(any(test, feature = "test-dependencies"))]
pub use prover::MockTxProver;
pub use prover::TxProver;
pub use types::{
    ENC_CIPHERTEXT_SIZE, GROTH_PROOF_SIZE, MEMO_SIZE, Memo, OUT_CIPHERTEXT_SIZE, OutPoint,
    OutputDescription, OutputDescriptionInfo, Script, SpendDescription, SpendDescriptionInfo,
    Transaction, TransparentInputInfo, TxIn, TxOut, UnprovenTransaction,
};
