//! Assembles a balanced transaction from transparent and shielded parts.

use rand::RngCore as _;
use rand::rngs::OsRng;
use sapling::keys::{ExpandedSpendingKey, FullViewingKey, OutgoingViewingKey};
use sapling::value::NoteValue;
use sapling::{Note, PaymentAddress, Rseed};
use tracing::{debug, info, instrument, warn};
use zshield_core::base::{money_range, reversed_hex};
use zshield_core::schema::config::ValidatedNetworkParams;
use zshield_tree::{MerklePath, SaplingNode, TreeError, TreeNode};

use crate::error::BuilderError;
use crate::prover::TxProver;
use crate::types::{
    Memo, OutPoint, OutputDescriptionInfo, Script, SpendDescriptionInfo, Transaction,
    TransparentInputInfo, TxIn, TxOut, UnprovenTransaction,
};

/// Where surplus value goes.
enum ChangeDestination {
    Sapling {
        ovk: OutgoingViewingKey,
        to: PaymentAddress,
    },
    Transparent(Script),
}

/// Collects the parts of one transaction and hands them to a prover.
///
/// Every shielded spend must reference the same anchor: the first spend
/// fixes it and later spends with a different anchor are rejected.
/// [`TransactionBuilder::build`] consumes the builder; a failed build is
/// retried by constructing a new one.
pub struct TransactionBuilder {
    params: ValidatedNetworkParams,
    target_height: u32,
    expiry_height: u32,
    fee: u64,
    anchor: Option<SaplingNode>,
    spends: Vec<SpendDescriptionInfo>,
    outputs: Vec<OutputDescriptionInfo>,
    transparent_inputs: Vec<TransparentInputInfo>,
    transparent_outputs: Vec<TxOut>,
    change: Option<ChangeDestination>,
}

impl TransactionBuilder {
    /// An empty builder for a transaction to be mined at `target_height`.
    ///
    /// The fee defaults to the network's default fee and the expiry height to
    /// `target_height` plus the configured expiry delta.
    #[must_use]
    pub fn new(params: ValidatedNetworkParams, target_height: u32) -> Self {
        let expiry_height = params.expiry_height(target_height);
        let fee = params.default_fee;
        Self {
            params,
            target_height,
            expiry_height,
            fee,
            anchor: None,
            spends: Vec::new(),
            outputs: Vec::new(),
            transparent_inputs: Vec::new(),
            transparent_outputs: Vec::new(),
            change: None,
        }
    }

    /// Height the transaction is built for.
    #[must_use]
    pub const fn target_height(&self) -> u32 {
        self.target_height
    }

    /// Last height at which the transaction may be mined.
    #[must_use]
    pub const fn expiry_height(&self) -> u32 {
        self.expiry_height
    }

    /// Fee the transaction will pay.
    #[must_use]
    pub const fn fee(&self) -> u64 {
        self.fee
    }

    /// Anchor fixed by the first spend.
    #[must_use]
    pub const fn anchor(&self) -> Option<&SaplingNode> {
        self.anchor.as_ref()
    }

    /// Override the fee.
    ///
    /// # Errors
    /// [`BuilderError::ValueOutOfRange`] if `fee` exceeds the money supply.
    pub fn set_fee(&mut self, fee: u64) -> Result<(), BuilderError> {
        if !money_range(fee) {
            return Err(BuilderError::ValueOutOfRange(fee));
        }
        self.fee = fee;
        Ok(())
    }

    /// Override the expiry height.
    pub const fn set_expiry_height(&mut self, expiry_height: u32) {
        self.expiry_height = expiry_height;
    }

    /// Spend a shielded note.
    ///
    /// `path` must lead from the note's commitment to `anchor`.
    ///
    /// # Errors
    /// - [`BuilderError::AnchorMismatch`] if an earlier spend used another anchor.
    /// - [`BuilderError::SaplingNotActive`] below the activation height.
    /// - [`BuilderError::PathMismatch`] if `path` does not reach `anchor`.
    /// - [`BuilderError::Tree`] if the path is not a full Sapling path.
    /// - [`BuilderError::ValueOutOfRange`] for a note above the money supply.
    pub fn add_sapling_spend(
        &mut self,
        expsk: ExpandedSpendingKey,
        note: Note,
        anchor: SaplingNode,
        path: MerklePath<SaplingNode>,
    ) -> Result<(), BuilderError> {
        if let Some(expected) = self.anchor
            && expected != anchor
        {
            let expected = reversed_hex(&expected.to_bytes());
            let found = reversed_hex(&anchor.to_bytes());
            warn!(%expected, %found, "Rejected spend with mismatched anchor");
            return Err(BuilderError::AnchorMismatch { expected, found });
        }
        self.require_sapling()?;

        let cmu = SaplingNode::from_cmu(&note.cmu()).ok_or(TreeError::InvalidNode)?;
        if path.root(cmu) != anchor {
            return Err(BuilderError::PathMismatch);
        }
        path.to_sapling()?;

        let value = note.value().inner();
        if !money_range(value) {
            return Err(BuilderError::ValueOutOfRange(value));
        }

        debug!(position = path.position(), value, "Added Sapling spend");
        self.anchor = Some(anchor);
        self.spends
            .push(SpendDescriptionInfo::new(expsk, note, anchor, path));
        Ok(())
    }

    /// Create a shielded note for `to`.
    ///
    /// Without a memo the "no memo" marker is sent.
    ///
    /// # Errors
    /// - [`BuilderError::SaplingNotActive`] below the activation height.
    /// - [`BuilderError::ValueOutOfRange`] for a value above the money supply.
    pub fn add_sapling_output(
        &mut self,
        ovk: Option<OutgoingViewingKey>,
        to: PaymentAddress,
        value: u64,
        memo: Option<Memo>,
    ) -> Result<(), BuilderError> {
        self.require_sapling()?;
        if !money_range(value) {
            return Err(BuilderError::ValueOutOfRange(value));
        }

        let mut rseed = [0_u8; 32];
        OsRng.fill_bytes(&mut rseed);
        let note = Note::from_parts(to, NoteValue::from_raw(value), Rseed::AfterZip212(rseed));

        debug!(value, "Added Sapling output");
        self.outputs.push(OutputDescriptionInfo {
            ovk,
            to,
            note,
            memo: memo.unwrap_or_default(),
        });
        Ok(())
    }

    /// Spend a transparent coin.
    ///
    /// The coin is assumed to exist and be spendable.
    ///
    /// # Errors
    /// [`BuilderError::ValueOutOfRange`] for a value above the money supply.
    pub fn add_transparent_input(
        &mut self,
        outpoint: OutPoint,
        script_pubkey: Script,
        value: u64,
    ) -> Result<(), BuilderError> {
        if !money_range(value) {
            return Err(BuilderError::ValueOutOfRange(value));
        }
        self.transparent_inputs.push(TransparentInputInfo {
            outpoint,
            script_pubkey,
            value,
        });
        Ok(())
    }

    /// Pay `value` to a transparent script.
    ///
    /// # Errors
    /// [`BuilderError::ValueOutOfRange`] for a value above the money supply.
    pub fn add_transparent_output(
        &mut self,
        script_pubkey: Script,
        value: u64,
    ) -> Result<(), BuilderError> {
        if !money_range(value) {
            return Err(BuilderError::ValueOutOfRange(value));
        }
        self.transparent_outputs.push(TxOut {
            value,
            script_pubkey,
        });
        Ok(())
    }

    /// Send change to a shielded address. Replaces any earlier choice.
    pub fn send_change_to_sapling(&mut self, ovk: OutgoingViewingKey, to: PaymentAddress) {
        self.change = Some(ChangeDestination::Sapling { ovk, to });
    }

    /// Send change to a transparent script. Replaces any earlier choice.
    pub fn send_change_to_transparent(&mut self, script_pubkey: Script) {
        self.change = Some(ChangeDestination::Transparent(script_pubkey));
    }

    /// Balance the transaction and have `prover` prove it.
    ///
    /// Surplus goes to the configured change destination or, failing that,
    /// back to the address of the first spent note.
    ///
    /// # Errors
    /// - [`BuilderError::InsufficientFunds`] if inputs do not cover outputs
    ///   and fee.
    /// - [`BuilderError::NoChangeAddress`] if there is change but no
    ///   destination and no shielded spend.
    /// - [`BuilderError::ValueOutOfRange`] if a total leaves the money range.
    /// - [`BuilderError::ProvingFailure`] if the prover fails.
    #[instrument(skip_all, fields(target_height = self.target_height))]
    pub fn build(mut self, prover: &impl TxProver) -> Result<Transaction, BuilderError> {
        let available = checked_total(
            self.transparent_inputs
                .iter()
                .map(|input| input.value)
                .chain(self.spends.iter().map(|spend| spend.note.value().inner())),
        )?;
        let required = checked_total(
            self.transparent_outputs
                .iter()
                .map(|output| output.value)
                .chain(self.outputs.iter().map(|output| output.note.value().inner()))
                .chain([self.fee]),
        )?;

        let change = available
            .checked_sub(required)
            .ok_or(BuilderError::InsufficientFunds {
                required,
                available,
            })?;
        if change > 0 {
            self.add_change(change)?;
        }

        let value_balance = self.value_balance()?;
        info!(
            spends = self.spends.len(),
            outputs = self.outputs.len(),
            transparent_inputs = self.transparent_inputs.len(),
            transparent_outputs = self.transparent_outputs.len(),
            value_balance,
            fee = self.fee,
            "Proving transaction"
        );

        let unproven = UnprovenTransaction {
            target_height: self.target_height,
            expiry_height: self.expiry_height,
            anchor: self.anchor,
            vin: self.transparent_inputs.into_iter().map(TxIn::from).collect(),
            vout: self.transparent_outputs,
            spends: self.spends,
            outputs: self.outputs,
            value_balance,
            fee: self.fee,
        };

        prover.prove(unproven).map_err(|err| {
            warn!(error = %err, "Prover rejected transaction");
            BuilderError::ProvingFailure(err)
        })
    }

    fn require_sapling(&self) -> Result<(), BuilderError> {
        let activation = self.params.sapling_activation_height();
        if self.target_height < activation {
            return Err(BuilderError::SaplingNotActive {
                height: self.target_height,
                activation,
            });
        }
        Ok(())
    }

    fn add_change(&mut self, change: u64) -> Result<(), BuilderError> {
        match self.change.take() {
            Some(ChangeDestination::Sapling { ovk, to }) => {
                debug!(change, "Sending change to Sapling address");
                self.add_sapling_output(Some(ovk), to, change, None)
            }
            Some(ChangeDestination::Transparent(script_pubkey)) => {
                debug!(change, "Sending change to transparent script");
                self.add_transparent_output(script_pubkey, change)
            }
            None => {
                let (ovk, to) = self
                    .spends
                    .first()
                    .map(|spend| {
                        (
                            FullViewingKey::from_expanded_spending_key(&spend.expsk).ovk,
                            spend.note.recipient(),
                        )
                    })
                    .ok_or(BuilderError::NoChangeAddress)?;
                debug!(change, "Returning change to first spent note's address");
                self.add_sapling_output(Some(ovk), to, change, None)
            }
        }
    }

    fn value_balance(&self) -> Result<i64, BuilderError> {
        let spent = checked_total(self.spends.iter().map(|spend| spend.note.value().inner()))?;
        let created = checked_total(self.outputs.iter().map(|output| output.note.value().inner()))?;
        let spent = i64::try_from(spent).map_err(|_| BuilderError::ValueOutOfRange(spent))?;
        let created = i64::try_from(created).map_err(|_| BuilderError::ValueOutOfRange(created))?;
        spent
            .checked_sub(created)
            .ok_or(BuilderError::ValueOutOfRange(u64::MAX))
    }
}

/// Sum `values`, failing as soon as the running total leaves the money range.
///
/// The error carries the total that was attempted, saturated at `u64::MAX`.
fn checked_total(values: impl IntoIterator<Item = u64>) -> Result<u64, BuilderError> {
    values.into_iter().try_fold(0_u64, |acc, value| {
        let total = acc.saturating_add(value);
        if money_range(total) {
            Ok(total)
        } else {
            Err(BuilderError::ValueOutOfRange(total))
        }
    })
}
