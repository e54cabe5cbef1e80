//! Foundational primitive types and byte/serde helpers.

mod amount;
mod utils;

pub use amount::{COIN, MAX_MONEY, money_range};
pub use utils::{ReversedHex, reversed_hex};
