//! Transaction components produced and consumed by the builder.

use ff::Field as _;
use rand::rngs::OsRng;
use sapling::keys::{ExpandedSpendingKey, OutgoingViewingKey};
use sapling::{Note, PaymentAddress};
use zshield_tree::{MerklePath, SaplingNode, TreeError, TreeNode};

use crate::error::BuilderError;

/// Size of a Groth16 proof.
pub const GROTH_PROOF_SIZE: usize = 192;

/// Size of a note plaintext ciphertext.
pub const ENC_CIPHERTEXT_SIZE: usize = 580;

/// Size of the outgoing ciphertext.
pub const OUT_CIPHERTEXT_SIZE: usize = 80;

/// Size of a memo field.
pub const MEMO_SIZE: usize = 512;

/// A 512-byte memo field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Memo([u8; MEMO_SIZE]);

impl Default for Memo {
    /// The "no memo" marker: `0xF6` followed by zeros.
    fn default() -> Self {
        let mut bytes = [0_u8; MEMO_SIZE];
        bytes[0] = 0xF6;
        Self(bytes)
    }
}

impl Memo {
    /// A memo holding `bytes`, zero padded to 512 bytes.
    ///
    /// # Errors
    /// [`BuilderError::MemoTooLong`] if `bytes` exceeds 512 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BuilderError> {
        let mut memo = [0_u8; MEMO_SIZE];
        memo.get_mut(..bytes.len())
            .ok_or(BuilderError::MemoTooLong(bytes.len()))?
            .copy_from_slice(bytes);
        Ok(Self(memo))
    }

    /// The raw memo bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; MEMO_SIZE] {
        &self.0
    }
}

/// A serialized locking or unlocking script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script(pub Vec<u8>);

/// Reference to a transparent output of an earlier transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutPoint {
    /// Transaction id.
    pub hash: [u8; 32],
    /// Output index.
    pub n: u32,
}

/// A transparent coin being spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    /// The output being spent.
    pub prevout: OutPoint,
    /// Locking script of the coin.
    pub script_pubkey: Script,
    /// Value of the coin in zatoshi.
    pub value: u64,
}

/// A transparent output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    /// Value in zatoshi.
    pub value: u64,
    /// Locking script.
    pub script_pubkey: Script,
}

/// Everything needed to prove one shielded spend.
pub struct SpendDescriptionInfo {
    /// Key authorizing the spend.
    pub expsk: ExpandedSpendingKey,
    /// Note being spent.
    pub note: Note,
    /// Randomizer for the spend authorization key.
    pub alpha: jubjub::Fr,
    /// Commitment tree root the spend proves membership against.
    pub anchor: SaplingNode,
    /// Path from the note commitment to `anchor`.
    pub path: MerklePath<SaplingNode>,
}

impl SpendDescriptionInfo {
    /// Record a spend with a fresh randomizer.
    #[must_use]
    pub fn new(
        expsk: ExpandedSpendingKey,
        note: Note,
        anchor: SaplingNode,
        path: MerklePath<SaplingNode>,
    ) -> Self {
        Self {
            expsk,
            note,
            alpha: jubjub::Fr::random(&mut OsRng),
            anchor,
            path,
        }
    }

    /// Position of the note in the commitment tree.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.path.position()
    }

    /// Nullifier revealed by spending the note.
    #[must_use]
    pub fn nullifier(&self) -> [u8; 32] {
        let viewing_key = self.expsk.proof_generation_key().to_viewing_key();
        self.note.nf(&viewing_key.nk, self.position()).0
    }

    /// The path in the form the Sapling prover consumes.
    ///
    /// # Errors
    /// [`TreeError::InvalidPath`] if the path is not a full Sapling path.
    pub fn sapling_path(&self) -> Result<sapling::MerklePath, TreeError> {
        self.path.to_sapling()
    }
}

/// Everything needed to prove one shielded output.
pub struct OutputDescriptionInfo {
    /// Key allowing the sender to recover the output, if any.
    pub ovk: Option<OutgoingViewingKey>,
    /// Recipient address.
    pub to: PaymentAddress,
    /// The note created for the recipient.
    pub note: Note,
    /// Memo delivered with the note.
    pub memo: Memo,
}

impl OutputDescriptionInfo {
    /// Commitment of the created note, as appended to the commitment tree.
    #[must_use]
    pub fn cmu(&self) -> [u8; 32] {
        self.note.cmu().to_bytes()
    }
}

/// A transparent coin the builder will spend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransparentInputInfo {
    /// The output being spent.
    pub outpoint: OutPoint,
    /// Locking script of the coin.
    pub script_pubkey: Script,
    /// Value in zatoshi.
    pub value: u64,
}

impl From<TransparentInputInfo> for TxIn {
    fn from(input: TransparentInputInfo) -> Self {
        Self {
            prevout: input.outpoint,
            script_pubkey: input.script_pubkey,
            value: input.value,
        }
    }
}

/// A proven shielded spend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendDescription {
    /// Value commitment.
    pub cv: [u8; 32],
    /// Commitment tree root the proof is bound to.
    pub anchor: [u8; 32],
    /// Nullifier of the spent note.
    pub nullifier: [u8; 32],
    /// Randomized spend authorization key.
    pub rk: [u8; 32],
    /// Groth16 proof.
    pub zkproof: [u8; GROTH_PROOF_SIZE],
    /// Spend authorization signature.
    pub spend_auth_sig: [u8; 64],
}

/// A proven shielded output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDescription {
    /// Value commitment.
    pub cv: [u8; 32],
    /// Note commitment.
    pub cmu: [u8; 32],
    /// Ephemeral public key for note encryption.
    pub ephemeral_key: [u8; 32],
    /// Note plaintext encrypted to the recipient.
    pub enc_ciphertext: [u8; ENC_CIPHERTEXT_SIZE],
    /// Note key material encrypted to the sender's ovk.
    pub out_ciphertext: [u8; OUT_CIPHERTEXT_SIZE],
    /// Groth16 proof.
    pub zkproof: [u8; GROTH_PROOF_SIZE],
}

/// A transaction with proofs and binding signature attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Transparent coins spent.
    pub vin: Vec<TxIn>,
    /// Transparent outputs.
    pub vout: Vec<TxOut>,
    /// Last height at which the transaction may be mined.
    pub expiry_height: u32,
    /// Net value leaving the shielded pool (spends minus outputs).
    pub value_balance: i64,
    /// Shielded spends, in the order they were added.
    pub spends: Vec<SpendDescription>,
    /// Shielded outputs, in the order they were added.
    pub outputs: Vec<OutputDescription>,
    /// Binding signature over the value balance.
    pub binding_sig: [u8; 64],
}

impl Transaction {
    /// Fee implied by the value flows: transparent in plus value balance
    /// minus transparent out. `None` on overflow.
    #[must_use]
    pub fn implied_fee(&self) -> Option<i64> {
        let transparent_in = self
            .vin
            .iter()
            .try_fold(0_i64, |acc, input| acc.checked_add(i64::try_from(input.value).ok()?))?;
        let transparent_out = self
            .vout
            .iter()
            .try_fold(0_i64, |acc, output| acc.checked_add(i64::try_from(output.value).ok()?))?;
        transparent_in
            .checked_add(self.value_balance)?
            .checked_sub(transparent_out)
    }
}

/// A balanced transaction waiting for proofs.
pub struct UnprovenTransaction {
    /// Height the transaction is built for.
    pub target_height: u32,
    /// Last height at which the transaction may be mined.
    pub expiry_height: u32,
    /// Anchor shared by every spend, if there are any.
    pub anchor: Option<SaplingNode>,
    /// Transparent coins spent.
    pub vin: Vec<TxIn>,
    /// Transparent outputs, change included.
    pub vout: Vec<TxOut>,
    /// Shielded spends in insertion order.
    pub spends: Vec<SpendDescriptionInfo>,
    /// Shielded outputs in insertion order, change included.
    pub outputs: Vec<OutputDescriptionInfo>,
    /// Net value leaving the shielded pool.
    pub value_balance: i64,
    /// Fee paid by the transaction.
    pub fee: u64,
}

impl UnprovenTransaction {
    /// The anchor as raw bytes, or the empty Sapling root without spends.
    #[must_use]
    pub fn anchor_bytes(&self) -> [u8; 32] {
        self.anchor
            .unwrap_or_else(zshield_tree::SaplingTree::empty_root)
            .to_bytes()
    }

    /// Attach proven descriptions and the binding signature.
    #[must_use]
    pub fn into_transaction(
        self,
        spends: Vec<SpendDescription>,
        outputs: Vec<OutputDescription>,
        binding_sig: [u8; 64],
    ) -> Transaction {
        Transaction {
            vin: self.vin,
            vout: self.vout,
            expiry_height: self.expiry_height,
            value_balance: self.value_balance,
            spends,
            outputs,
            binding_sig,
        }
    }
}
