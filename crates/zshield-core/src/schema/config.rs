use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::base::money_range;

/// Default number of blocks after the target height at which a transaction expires.
pub const DEFAULT_TX_EXPIRY_DELTA: u32 = 20;

/// Transactions expiring within this many blocks of the tip are not relayed.
pub const TX_EXPIRING_SOON_THRESHOLD: u32 = 3;

/// Largest expiry height a transaction may carry.
pub const TX_EXPIRY_HEIGHT_THRESHOLD: u32 = 499_999_999;

/// Default transaction fee in zatoshi.
pub const DEFAULT_FEE: u64 = 10_000;

/// Network identifier.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network.
    Mainnet,
    /// Public test network.
    Testnet,
    /// Local regression-test network.
    Regtest,
}

impl Network {
    /// Height at which Sapling shielded components become valid.
    #[must_use]
    pub const fn sapling_activation_height(self) -> u32 {
        match self {
            Self::Mainnet => 419_200,
            Self::Testnet => 280_000,
            Self::Regtest => 1,
        }
    }
}

/// Errors produced when validating [`NetworkParams`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Expiry delta too small for the transaction to be relayed.
    #[error("Expiry delta {0} is too low for the transaction to be relayed.")]
    ExpiryDeltaTooLow(u32),
    /// Expiry delta pushes expiry heights past the consensus limit.
    #[error("Expiry delta {0} exceeds the maximum expiry height.")]
    ExpiryDeltaTooHigh(u32),
    /// Default fee outside the valid money range.
    #[error("Default fee {0} is above the maximum money supply.")]
    FeeOutOfRange(u64),
}

/// Consensus and policy parameters the transaction builder runs against.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct NetworkParams {
    /// Network these parameters describe.
    pub network: Network,
    /// Height at which Sapling activates. Defaults to the network's activation height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sapling_activation_height: Option<u32>,
    /// Blocks after the target height at which built transactions expire.
    #[serde(default = "default_expiry_delta")]
    pub tx_expiry_delta: u32,
    /// Fee used when the caller does not set one.
    #[serde(default = "default_fee")]
    pub default_fee: u64,
}

const fn default_expiry_delta() -> u32 {
    DEFAULT_TX_EXPIRY_DELTA
}

const fn default_fee() -> u64 {
    DEFAULT_FEE
}

/// Validated network parameters.
///
/// Only this type is accepted by the builder; [`NetworkParams`] is the raw,
/// deserializable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedNetworkParams {
    inner: NetworkParams,
}

impl std::ops::Deref for ValidatedNetworkParams {
    type Target = NetworkParams;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl ValidatedNetworkParams {
    /// Height at which Sapling activates on this network.
    #[must_use]
    pub fn sapling_activation_height(&self) -> u32 {
        self.inner
            .sapling_activation_height
            .unwrap_or_else(|| self.inner.network.sapling_activation_height())
    }

    /// Expiry height for a transaction targeting `target_height`.
    #[must_use]
    pub fn expiry_height(&self, target_height: u32) -> u32 {
        target_height
            .saturating_add(self.inner.tx_expiry_delta)
            .min(TX_EXPIRY_HEIGHT_THRESHOLD)
    }
}

impl NetworkParams {
    /// Default parameters for `network`.
    #[must_use]
    pub const fn new(network: Network) -> Self {
        Self {
            network,
            sapling_activation_height: None,
            tx_expiry_delta: DEFAULT_TX_EXPIRY_DELTA,
            default_fee: DEFAULT_FEE,
        }
    }

    /// Validates the parameters.
    ///
    /// # Errors
    /// - `tx_expiry_delta` is not above [`TX_EXPIRING_SOON_THRESHOLD`] or above
    ///   [`TX_EXPIRY_HEIGHT_THRESHOLD`].
    /// - `default_fee` is above [`MAX_MONEY`](crate::base::MAX_MONEY).
    pub fn validate(self) -> Result<ValidatedNetworkParams, ConfigError> {
        if self.tx_expiry_delta <= TX_EXPIRING_SOON_THRESHOLD {
            return Err(ConfigError::ExpiryDeltaTooLow(self.tx_expiry_delta));
        }
        if self.tx_expiry_delta > TX_EXPIRY_HEIGHT_THRESHOLD {
            return Err(ConfigError::ExpiryDeltaTooHigh(self.tx_expiry_delta));
        }
        if !money_range(self.default_fee) {
            return Err(ConfigError::FeeOutOfRange(self.default_fee));
        }
        Ok(ValidatedNetworkParams { inner: self })
    }
}
