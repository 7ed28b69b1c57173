//! Share/amount conversion.
//!
//! An account stores one signed share integer per fungible asset:
//!
//! - `shares > 0`: collateral shares, worth `shares * collateral_index`;
//! - `shares < 0`: debt shares, owing `|shares| * debt_index`;
//! - `shares == 0`: no position (the entry is removed).
//!
//! Collateral conversions round down and debt conversions round up, in both
//! directions. Rounding therefore never credits a user more than they put in
//! or lets them owe less than they borrowed.

use crate::interest::PoolState;
use crate::math::{mul_div_ceil, mul_div_floor, to_negative, to_signed, MathError, Wad, WAD};

/// Collateral shares to amount, rounded down.
pub fn collateral_amount(shares: u128, index: Wad) -> Result<u128, MathError> {
    mul_div_floor(shares, index.raw(), WAD)
}

/// Collateral amount to shares, rounded down.
pub fn collateral_shares(amount: u128, index: Wad) -> Result<u128, MathError> {
    mul_div_floor(amount, WAD, index.raw())
}

/// Debt shares to amount, rounded up.
pub fn debt_amount(shares: u128, index: Wad) -> Result<u128, MathError> {
    mul_div_ceil(shares, index.raw(), WAD)
}

/// Debt amount to shares, rounded up.
pub fn debt_shares(amount: u128, index: Wad) -> Result<u128, MathError> {
    mul_div_ceil(amount, WAD, index.raw())
}

/// Signed shares to a signed amount at the pool's current indices.
pub fn to_amount(shares: i128, pool: &PoolState) -> Result<i128, MathError> {
    let magnitude = shares.unsigned_abs();
    if shares >= 0 {
        to_signed(collateral_amount(magnitude, pool.collateral_index)?)
    } else {
        to_negative(debt_amount(magnitude, pool.debt_index)?)
    }
}

/// Signed amount to signed shares at the pool's current indices.
pub fn to_shares(amount: i128, pool: &PoolState) -> Result<i128, MathError> {
    let magnitude = amount.unsigned_abs();
    if amount >= 0 {
        to_signed(collateral_shares(magnitude, pool.collateral_index)?)
    } else {
        to_negative(debt_shares(magnitude, pool.debt_index)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(ci: &str, di: &str) -> PoolState {
        PoolState {
            collateral_index: ci.parse().unwrap(),
            debt_index: di.parse().unwrap(),
            ..PoolState::new(0)
        }
    }

    #[test]
    fn identity_at_unit_index() {
        let p = pool("1", "1");
        assert_eq!(to_shares(1_000, &p).unwrap(), 1_000);
        assert_eq!(to_shares(-1_000, &p).unwrap(), -1_000);
        assert_eq!(to_amount(-1_000, &p).unwrap(), -1_000);
    }

    #[test]
    fn collateral_rounds_down_debt_rounds_up() {
        let p = pool("1.5", "1.5");
        // 10 / 1.5 = 6.67
        assert_eq!(to_shares(10, &p).unwrap(), 6);
        assert_eq!(to_shares(-10, &p).unwrap(), -7);
        // 7 * 1.5 = 10.5
        assert_eq!(to_amount(7, &p).unwrap(), 10);
        assert_eq!(to_amount(-7, &p).unwrap(), -11);
    }

    #[test]
    fn zero_is_zero() {
        let p = pool("2", "3");
        assert_eq!(to_shares(0, &p).unwrap(), 0);
        assert_eq!(to_amount(0, &p).unwrap(), 0);
    }

    #[test]
    fn huge_values_error_instead_of_wrapping() {
        let p = pool("2", "2");
        assert_eq!(to_amount(i128::MAX, &p), Err(MathError::Overflow));
    }
}
