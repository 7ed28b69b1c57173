//! # Fixed-Point Math
//!
//! Every factor, rate, index and valuation in Tessera is an 18-decimal
//! fixed-point number ([`Wad`]). Token amounts stay plain `u128` integers in
//! the token's smallest unit, and signed ledger quantities are `i128`.
//!
//! Nothing in this module wraps. Every operation that can overflow,
//! underflow or divide by zero returns a [`MathError`], and the ledger
//! propagates it to the top-level caller as a reverted batch.

pub mod wad;

pub use wad::{Wad, HALF_WAD, SCALE, WAD};

use primitive_types::U256;
use thiserror::Error;

/// Arithmetic failures. Surfaced as `LedgerError::Math`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    /// A result exceeded the representable range.
    #[error("math overflow")]
    Overflow,

    /// A subtraction went below zero on an unsigned quantity.
    #[error("math underflow")]
    Underflow,

    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// An unsigned value did not fit the signed range (or vice versa).
    #[error("signed/unsigned conversion out of range")]
    SignedCast,

    /// A decimal string could not be parsed into a [`Wad`].
    #[error("invalid decimal: {0}")]
    InvalidDecimal(String),
}

/// Try to add, return an error on overflow.
pub trait TryAdd: Sized {
    /// Add.
    fn try_add(self, rhs: Self) -> Result<Self, MathError>;
}

/// Try to subtract, return an error on underflow.
pub trait TrySub: Sized {
    /// Subtract.
    fn try_sub(self, rhs: Self) -> Result<Self, MathError>;
}

/// Try to multiply, return an error on overflow.
pub trait TryMul<Rhs = Self>: Sized {
    /// Multiply.
    fn try_mul(self, rhs: Rhs) -> Result<Self, MathError>;
}

/// Try to divide, return an error on overflow or divide by zero.
pub trait TryDiv<Rhs = Self>: Sized {
    /// Divide.
    fn try_div(self, rhs: Rhs) -> Result<Self, MathError>;
}

impl TryAdd for u128 {
    fn try_add(self, rhs: Self) -> Result<Self, MathError> {
        self.checked_add(rhs).ok_or(MathError::Overflow)
    }
}

impl TrySub for u128 {
    fn try_sub(self, rhs: Self) -> Result<Self, MathError> {
        self.checked_sub(rhs).ok_or(MathError::Underflow)
    }
}

/// Widens `a * b` to 256 bits and divides by `d`. The remainder is returned
/// alongside the quotient so callers can round either way.
fn wide_mul_div(a: u128, b: u128, d: u128) -> Result<(U256, bool), MathError> {
    if d == 0 {
        return Err(MathError::DivisionByZero);
    }
    // Two 128-bit factors always fit in 256 bits.
    let product = U256::from(a) * U256::from(b);
    let divisor = U256::from(d);
    Ok((product / divisor, !(product % divisor).is_zero()))
}

fn narrow(value: U256) -> Result<u128, MathError> {
    if value > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    Ok(value.low_u128())
}

/// `a * b / d`, rounded down. The intermediate product is 256 bits wide,
/// so only a final result above `u128::MAX` overflows.
pub fn mul_div_floor(a: u128, b: u128, d: u128) -> Result<u128, MathError> {
    let (quotient, _) = wide_mul_div(a, b, d)?;
    narrow(quotient)
}

/// `a * b / d`, rounded up.
pub fn mul_div_ceil(a: u128, b: u128, d: u128) -> Result<u128, MathError> {
    let (quotient, inexact) = wide_mul_div(a, b, d)?;
    let quotient = narrow(quotient)?;
    if inexact {
        quotient.checked_add(1).ok_or(MathError::Overflow)
    } else {
        Ok(quotient)
    }
}

/// Converts an unsigned magnitude into a signed value, refusing to wrap.
pub fn to_signed(value: u128) -> Result<i128, MathError> {
    i128::try_from(value).map_err(|_| MathError::SignedCast)
}

/// Negates an unsigned magnitude into a signed value, refusing to wrap.
pub fn to_negative(value: u128) -> Result<i128, MathError> {
    to_signed(value)?.checked_neg().ok_or(MathError::SignedCast)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_rounding() {
        assert_eq!(mul_div_floor(10, 3, 4).unwrap(), 7);
        assert_eq!(mul_div_ceil(10, 3, 4).unwrap(), 8);
        assert_eq!(mul_div_ceil(8, 3, 4).unwrap(), 6);
    }

    #[test]
    fn mul_div_rejects_zero_divisor() {
        assert_eq!(mul_div_floor(1, 1, 0), Err(MathError::DivisionByZero));
        assert_eq!(mul_div_ceil(1, 1, 0), Err(MathError::DivisionByZero));
    }

    #[test]
    fn mul_div_overflow_is_an_error() {
        assert_eq!(mul_div_floor(u128::MAX, 2, 1), Err(MathError::Overflow));
        assert_eq!(mul_div_ceil(u128::MAX, 3, 2), Err(MathError::Overflow));
    }

    #[test]
    fn mul_div_survives_wide_intermediates() {
        // 10,000 tokens at 18 decimals times a 90% factor: the raw product
        // is ~9e39, past u128::MAX, while the result is small.
        let amount = 10_000 * WAD;
        let factor = 9 * WAD / 10;
        assert_eq!(mul_div_floor(amount, factor, WAD).unwrap(), 9_000 * WAD);
        assert_eq!(mul_div_ceil(amount, factor, WAD).unwrap(), 9_000 * WAD);

        // A 1e22 price scaled by itself still fits after the division.
        let big = 10u128.pow(22);
        assert_eq!(mul_div_floor(big, big, WAD).unwrap(), 10u128.pow(26));

        // Rounding still applies on the wide path.
        assert_eq!(mul_div_floor(u128::MAX, 2, 7).unwrap(), u128::MAX / 7 * 2);
        assert_eq!(
            mul_div_ceil(u128::MAX, 2, 7).unwrap(),
            u128::MAX / 7 * 2 + 1
        );

        // A result of exactly u128::MAX is not an overflow.
        assert_eq!(mul_div_floor(u128::MAX, WAD, WAD).unwrap(), u128::MAX);
    }

    #[test]
    fn signed_casts_refuse_to_wrap() {
        assert_eq!(to_signed(u128::MAX), Err(MathError::SignedCast));
        assert_eq!(to_negative(5).unwrap(), -5);
        assert_eq!(to_signed(i128::MAX as u128).unwrap(), i128::MAX);
    }
}
