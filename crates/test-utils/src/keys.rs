use sapling::keys::{ExpandedSpendingKey, FullViewingKey, OutgoingViewingKey};
use sapling::value::NoteValue;
use sapling::{Diversifier, Note, PaymentAddress, Rseed};

/// A deterministic Sapling account for tests.
pub struct TestAccount {
    seed: u8,
    /// First valid payment address of the account.
    pub address: PaymentAddress,
    /// Outgoing viewing key of the account.
    pub ovk: OutgoingViewingKey,
}

impl TestAccount {
    /// Derive an account from a one-byte seed.
    ///
    /// # Panics
    /// If none of the 256 candidate diversifiers yields an address.
    #[must_use]
    #[allow(clippy::expect_used, reason = "Test helper")]
    pub fn new(seed: u8) -> Self {
        let expsk = ExpandedSpendingKey::from_spending_key(&[seed; 32]);
        let viewing_key = expsk.proof_generation_key().to_viewing_key();
        let address = (0_u8..=u8::MAX)
            .find_map(|i| viewing_key.to_payment_address(Diversifier([i; 11])))
            .expect("some diversifier is valid");
        let ovk = FullViewingKey::from_expanded_spending_key(&expsk).ovk;
        Self { seed, address, ovk }
    }

    /// The spending key of this account, derived afresh.
    #[must_use]
    pub fn expsk(&self) -> ExpandedSpendingKey {
        ExpandedSpendingKey::from_spending_key(&[self.seed; 32])
    }

    /// A note of `value` zatoshi paid to this account.
    #[must_use]
    pub fn note(&self, value: u64, rseed: u8) -> Note {
        test_note(self.address, value, rseed)
    }
}

/// A note of `value` zatoshi paid to `address`.
#[must_use]
pub fn test_note(address: PaymentAddress, value: u64, rseed: u8) -> Note {
    Note::from_parts(
        address,
        NoteValue::from_raw(value),
        Rseed::AfterZip212([rseed; 32]),
    )
}
