//! The proving backend seam.

use crate::types::{Transaction, UnprovenTransaction};

/// Attaches zero-knowledge proofs and signatures to a balanced transaction.
///
/// Implementations are expected to be expensive and synchronous. The error
/// string is surfaced verbatim by the builder.
pub trait TxProver {
    /// Prove every spend and output and sign the result.
    ///
    /// # Errors
    /// Any backend failure, described for a human reader.
    fn prove(&self, tx: UnprovenTransaction) -> Result<Transaction, String>;
}

#[cfg(any(test, feature = "test-dependencies"))]
pub use mock::MockTxProver;

#[cfg(any(test, feature = "test-dependencies"))]
mod mock {
    use super::TxProver;
    use crate::types::{
        ENC_CIPHERTEXT_SIZE, GROTH_PROOF_SIZE, OUT_CIPHERTEXT_SIZE, OutputDescription,
        SpendDescription, Transaction, UnprovenTransaction,
    };

    /// A prover that fills proofs and signatures with zeros.
    ///
    /// Anchors, nullifiers and note commitments are real, so the result can
    /// be checked against the commitment tree. Each spend path is converted
    /// to the Sapling prover's form, and `rk` carries the raw randomizer.
    #[derive(Debug, Clone, Default)]
    pub struct MockTxProver {
        failure: Option<String>,
    }

    impl MockTxProver {
        /// A prover that always succeeds.
        #[must_use]
        pub const fn new() -> Self {
            Self { failure: None }
        }

        /// A prover that always fails with `message`.
        #[must_use]
        pub fn failing(message: impl Into<String>) -> Self {
            Self {
                failure: Some(message.into()),
            }
        }
    }

    impl TxProver for MockTxProver {
        fn prove(&self, tx: UnprovenTransaction) -> Result<Transaction, String> {
            if let Some(message) = &self.failure {
                return Err(message.clone());
            }

            let anchor = tx.anchor_bytes();
            let spends = tx
                .spends
                .iter()
                .map(|spend| {
                    let path = spend.sapling_path().map_err(|err| err.to_string())?;
                    if u64::from(path.position()) != spend.position() {
                        return Err("spend path does not lead to the spent note".to_owned());
                    }
                    Ok(SpendDescription {
                        cv: [0; 32],
                        anchor,
                        nullifier: spend.nullifier(),
                        rk: spend.alpha.to_bytes(),
                        zkproof: [0; GROTH_PROOF_SIZE],
                        spend_auth_sig: [0; 64],
                    })
                })
                .collect::<Result<Vec<_>, String>>()?;
            let outputs = tx
                .outputs
                .iter()
                .map(|output| OutputDescription {
                    cv: [0; 32],
                    cmu: output.cmu(),
                    ephemeral_key: [0; 32],
                    enc_ciphertext: [0; ENC_CIPHERTEXT_SIZE],
                    out_ciphertext: [0; OUT_CIPHERTEXT_SIZE],
                    zkproof: [0; GROTH_PROOF_SIZE],
                })
                .collect();

            Ok(tx.into_transaction(spends, outputs, [0; 64]))
        }
    }
}
