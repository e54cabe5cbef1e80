//! Monetary amounts in zatoshi.

/// Number of zatoshi in one coin.
pub const COIN: u64 = 100_000_000;

/// Upper bound on any single amount, and on any sum of amounts, in zatoshi.
pub const MAX_MONEY: u64 = 21_000_000 * COIN;

/// Returns `true` when `value` is a valid amount (`0..=MAX_MONEY`).
#[must_use]
pub const fn money_range(value: u64) -> bool {
    value <= MAX_MONEY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_range_bounds() {
        assert!(money_range(0));
        assert!(money_range(MAX_MONEY));
        assert!(!money_range(MAX_MONEY.saturating_add(1)));
    }

    #[test]
    fn max_money_fits_signed_balance() {
        assert!(i64::try_from(MAX_MONEY).is_ok());
    }
}
