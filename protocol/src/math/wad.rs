//! 18-decimal unsigned fixed point.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{mul_div_ceil, mul_div_floor, MathError, TryAdd, TryDiv, TryMul, TrySub};

/// Scale of precision.
pub const SCALE: usize = 18;
/// Identity.
pub const WAD: u128 = 1_000_000_000_000_000_000;
/// Half of identity.
pub const HALF_WAD: u128 = 500_000_000_000_000_000;
/// Scale for percentages.
const PERCENT_SCALER: u128 = 10_000_000_000_000_000;
/// Scale for basis points.
const BPS_SCALER: u128 = 100_000_000_000_000;

/// Unsigned fixed-point number with 18 decimals (`1.0 == 10^18`).
///
/// Used for risk factors, interest rates, share indices and oracle values.
/// Serialized as a decimal string (`"0.9"`) so configuration files stay
/// readable and values above `u64::MAX` survive JSON.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wad(u128);

impl Wad {
    /// Zero.
    pub const ZERO: Wad = Wad(0);
    /// One.
    pub const ONE: Wad = Wad(WAD);

    /// Wraps a raw scaled value.
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Returns the raw scaled value.
    pub const fn raw(self) -> u128 {
        self.0
    }

    /// Whole number `n` as a fixed-point value.
    pub fn from_int(n: u128) -> Result<Self, MathError> {
        n.checked_mul(WAD).map(Self).ok_or(MathError::Overflow)
    }

    /// `percent`% as a fixed-point value (`from_percent(90) == 0.9`).
    pub fn from_percent(percent: u8) -> Self {
        Self(percent as u128 * PERCENT_SCALER)
    }

    /// Basis points as a fixed-point value (`from_bps(250) == 0.025`).
    pub fn from_bps(bps: u32) -> Self {
        Self(bps as u128 * BPS_SCALER)
    }

    /// Returns `true` if this value is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Multiplies an integer amount by this factor, rounding down.
    pub fn mul_floor(self, amount: u128) -> Result<u128, MathError> {
        mul_div_floor(amount, self.0, WAD)
    }

    /// Multiplies an integer amount by this factor, rounding up.
    pub fn mul_ceil(self, amount: u128) -> Result<u128, MathError> {
        mul_div_ceil(amount, self.0, WAD)
    }

    /// Divides an integer amount by this factor, rounding down.
    pub fn div_floor(self, amount: u128) -> Result<u128, MathError> {
        mul_div_floor(amount, WAD, self.0)
    }

    /// Divides an integer amount by this factor, rounding up.
    pub fn div_ceil(self, amount: u128) -> Result<u128, MathError> {
        mul_div_ceil(amount, WAD, self.0)
    }

    /// Ratio `numerator / denominator` of two integers as a fixed-point value.
    pub fn ratio(numerator: u128, denominator: u128) -> Result<Self, MathError> {
        mul_div_floor(numerator, WAD, denominator).map(Self)
    }

    /// Rounds to the nearest integer.
    pub fn round_int(self) -> u128 {
        self.0.saturating_add(HALF_WAD) / WAD
    }

    /// Truncates to an integer.
    pub fn floor_int(self) -> u128 {
        self.0 / WAD
    }

    /// Signed raw value, for totals that may go negative.
    pub fn to_signed_raw(self) -> Result<i128, MathError> {
        super::to_signed(self.0)
    }
}

impl TryAdd for Wad {
    fn try_add(self, rhs: Self) -> Result<Self, MathError> {
        self.0.checked_add(rhs.0).map(Self).ok_or(MathError::Overflow)
    }
}

impl TrySub for Wad {
    fn try_sub(self, rhs: Self) -> Result<Self, MathError> {
        self.0.checked_sub(rhs.0).map(Self).ok_or(MathError::Underflow)
    }
}

impl TryMul<Wad> for Wad {
    fn try_mul(self, rhs: Self) -> Result<Self, MathError> {
        mul_div_floor(self.0, rhs.0, WAD).map(Self)
    }
}

impl TryMul<u128> for Wad {
    fn try_mul(self, rhs: u128) -> Result<Self, MathError> {
        self.0.checked_mul(rhs).map(Self).ok_or(MathError::Overflow)
    }
}

impl TryDiv<Wad> for Wad {
    fn try_div(self, rhs: Self) -> Result<Self, MathError> {
        mul_div_floor(self.0, WAD, rhs.0).map(Self)
    }
}

impl TryDiv<u128> for Wad {
    fn try_div(self, rhs: u128) -> Result<Self, MathError> {
        if rhs == 0 {
            return Err(MathError::DivisionByZero);
        }
        Ok(Self(self.0 / rhs))
    }
}

impl fmt::Display for Wad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let int = self.0 / WAD;
        let frac = self.0 % WAD;
        if frac == 0 {
            return write!(f, "{}", int);
        }
        let digits = format!("{:018}", frac);
        write!(f, "{}.{}", int, digits.trim_end_matches('0'))
    }
}

impl FromStr for Wad {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MathError::InvalidDecimal(s.to_string());
        let trimmed = s.trim();
        let (int_part, frac_part) = match trimmed.split_once('.') {
            Some((i, f)) => (i, f),
            None => (trimmed, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if frac_part.len() > SCALE {
            return Err(invalid());
        }
        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(int_part) || !all_digits(frac_part) {
            return Err(invalid());
        }

        let int: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };
        let frac: u128 = if frac_part.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac_part, width = SCALE);
            padded.parse().map_err(|_| invalid())?
        };

        int.checked_mul(WAD)
            .and_then(|v| v.checked_add(frac))
            .map(Self)
            .ok_or(MathError::Overflow)
    }
}

impl Serialize for Wad {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Wad {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_and_bps_scaling() {
        assert_eq!(Wad::from_percent(5).raw(), 50_000_000_000_000_000);
        assert_eq!(Wad::from_bps(250), "0.025".parse().unwrap());
        assert_eq!(Wad::from_percent(100), Wad::ONE);
    }

    #[test]
    fn multiply_and_divide() {
        let half: Wad = "0.5".parse().unwrap();
        let three = Wad::from_int(3).unwrap();
        assert_eq!(three.try_mul(half).unwrap(), "1.5".parse().unwrap());
        assert_eq!(three.try_div(half).unwrap(), Wad::from_int(6).unwrap());
        assert_eq!(half.mul_floor(7).unwrap(), 3);
        assert_eq!(half.mul_ceil(7).unwrap(), 4);
    }

    #[test]
    fn realistic_magnitudes_do_not_overflow() {
        let balance = 10_000 * WAD;
        let price = Wad::from_int(2_000).unwrap();
        assert_eq!(
            price.mul_floor(balance).unwrap(),
            20_000_000 * WAD
        );
        assert_eq!(
            Wad::from_int(10_000)
                .unwrap()
                .try_mul(Wad::from_percent(90))
                .unwrap(),
            Wad::from_int(9_000).unwrap()
        );
        let value = Wad::from_int(1_000_000).unwrap();
        assert_eq!(
            value.try_div(Wad::from_int(4).unwrap()).unwrap(),
            Wad::from_int(250_000).unwrap()
        );
        assert_eq!(Wad::ratio(balance, 4 * balance).unwrap(), Wad::from_percent(25));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(Wad::ONE.try_div(Wad::ZERO), Err(MathError::DivisionByZero));
        assert_eq!(Wad::ZERO.div_floor(10), Err(MathError::DivisionByZero));
    }

    #[test]
    fn subtraction_underflow_is_an_error() {
        assert_eq!(Wad::ZERO.try_sub(Wad::ONE), Err(MathError::Underflow));
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(Wad::from_percent(90).to_string(), "0.9");
        assert_eq!(Wad::from_int(10_000).unwrap().to_string(), "10000");
        assert_eq!(Wad::from_raw(1).to_string(), "0.000000000000000001");
    }

    #[test]
    fn parse_accepts_plain_and_fractional_forms() {
        assert_eq!("2".parse::<Wad>().unwrap(), Wad::from_int(2).unwrap());
        assert_eq!("0.05".parse::<Wad>().unwrap(), Wad::from_percent(5));
        assert_eq!(".5".parse::<Wad>().unwrap(), Wad::from_percent(50));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<Wad>().is_err());
        assert!("1.2.3".parse::<Wad>().is_err());
        assert!("-1".parse::<Wad>().is_err());
        assert!("0.0000000000000000001".parse::<Wad>().is_err());
    }

    #[test]
    fn serde_uses_decimal_strings() {
        let json = serde_json::to_string(&Wad::from_percent(90)).unwrap();
        assert_eq!(json, "\"0.9\"");
        let back: Wad = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Wad::from_percent(90));
    }

    #[test]
    fn round_and_floor() {
        let v: Wad = "2.5".parse().unwrap();
        assert_eq!(v.round_int(), 3);
        assert_eq!(v.floor_int(), 2);
    }
}
