//! # Interest Rate Model
//!
//! Every fungible asset carries a pool: total collateral shares, total debt
//! shares and the two indices that turn shares into amounts. Interest is
//! accrued lazily. Nothing happens on a timer; the first operation that
//! touches an asset after time has passed grows its indices.
//!
//! ## The curve
//!
//! A two-slope ("kinked") yearly borrow rate driven by utilization:
//!
//! ```text
//!            u <= target:  base + slope1 * u / target
//!            u >  target:  base + slope1 + slope2 * (u - target) / (1 - target)
//! ```
//!
//! Continuous at the kink and non-decreasing in `u`.
//!
//! ## Accrual
//!
//! Over `elapsed` seconds the debt index grows by `1 + rate * elapsed / YEAR`
//! (simple interest per accrual step, compounding across steps). The
//! resulting interest is split: the treasury's fraction becomes collateral
//! in the treasury account, the rest is paid to suppliers by growing the
//! collateral index. Because the treasury credit is added after the index
//! moves, it does not earn interest on itself for the current step.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, SECONDS_PER_YEAR};
use crate::ledger::shares;
use crate::math::{mul_div_floor, MathError, TryAdd, TryMul, TrySub, Wad};

// ---------------------------------------------------------------------------
// RateCurve
// ---------------------------------------------------------------------------

/// Yearly borrow-rate curve of one asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCurve {
    /// Rate at zero utilization.
    pub base_rate: Wad,
    /// Rate added between zero and target utilization.
    pub slope1: Wad,
    /// Rate added between target and full utilization.
    pub slope2: Wad,
    /// The kink, strictly between 0 and 1.
    pub target_utilization: Wad,
}

impl Default for RateCurve {
    /// 0% base, 4% at an 80% kink, 100% more above it.
    fn default() -> Self {
        Self {
            base_rate: Wad::ZERO,
            slope1: Wad::from_percent(4),
            slope2: Wad::from_percent(100),
            target_utilization: Wad::from_percent(80),
        }
    }
}

impl RateCurve {
    /// Rejects kinks outside `(0, 1)`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_utilization.is_zero() || self.target_utilization >= Wad::ONE {
            return Err(ConfigError::TargetUtilizationOutOfRange(
                self.target_utilization,
            ));
        }
        Ok(())
    }

    /// Yearly borrow rate at `utilization` (clamped to `[0, 1]`).
    pub fn borrow_rate(&self, utilization: Wad) -> Result<Wad, MathError> {
        let u = utilization.min(Wad::ONE);
        let target = self.target_utilization;
        if u <= target {
            let ramp = mul_div_floor(self.slope1.raw(), u.raw(), target.raw())?;
            return self.base_rate.try_add(Wad::from_raw(ramp));
        }
        let excess = u.try_sub(target)?;
        let headroom = Wad::ONE.try_sub(target)?;
        let ramp = mul_div_floor(self.slope2.raw(), excess.raw(), headroom.raw())?;
        self.base_rate
            .try_add(self.slope1)?
            .try_add(Wad::from_raw(ramp))
    }
}

// ---------------------------------------------------------------------------
// PoolState
// ---------------------------------------------------------------------------

/// Share totals and indices of one fungible asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// Sum of all positive account shares.
    #[serde(with = "crate::types::u128_string")]
    pub total_collateral_shares: u128,
    /// Sum of the magnitudes of all negative account shares.
    #[serde(with = "crate::types::u128_string")]
    pub total_debt_shares: u128,
    /// Collateral amount per share. Starts at 1, never decreases.
    pub collateral_index: Wad,
    /// Debt amount per share. Starts at 1, never decreases.
    pub debt_index: Wad,
    /// Timestamp of the last accrual, in seconds.
    pub last_accrual: u64,
}

impl PoolState {
    /// Empty pool with both indices at one.
    pub fn new(now: u64) -> Self {
        Self {
            total_collateral_shares: 0,
            total_debt_shares: 0,
            collateral_index: Wad::ONE,
            debt_index: Wad::ONE,
            last_accrual: now,
        }
    }

    /// Total supplied amount, rounded down.
    pub fn total_collateral_amount(&self) -> Result<u128, MathError> {
        shares::collateral_amount(self.total_collateral_shares, self.collateral_index)
    }

    /// Total borrowed amount, rounded up.
    pub fn total_debt_amount(&self) -> Result<u128, MathError> {
        shares::debt_amount(self.total_debt_shares, self.debt_index)
    }

    /// Debt over collateral, `0` without collateral, capped at `1`.
    pub fn utilization(&self) -> Result<Wad, MathError> {
        let collateral = self.total_collateral_amount()?;
        if collateral == 0 {
            return Ok(Wad::ZERO);
        }
        let debt = self.total_debt_amount()?;
        if debt >= collateral {
            return Ok(Wad::ONE);
        }
        Wad::ratio(debt, collateral)
    }

    /// Adds a signed share balance to the matching total.
    pub(crate) fn add_shares(&mut self, signed: i128) -> Result<(), MathError> {
        let magnitude = signed.unsigned_abs();
        if signed > 0 {
            self.total_collateral_shares = self.total_collateral_shares.try_add(magnitude)?;
        } else if signed < 0 {
            self.total_debt_shares = self.total_debt_shares.try_add(magnitude)?;
        }
        Ok(())
    }

    /// Removes a signed share balance from the matching total.
    pub(crate) fn remove_shares(&mut self, signed: i128) -> Result<(), MathError> {
        let magnitude = signed.unsigned_abs();
        if signed > 0 {
            self.total_collateral_shares = self.total_collateral_shares.try_sub(magnitude)?;
        } else if signed < 0 {
            self.total_debt_shares = self.total_debt_shares.try_sub(magnitude)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Accrual
// ---------------------------------------------------------------------------

/// What one accrual step produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Accrual {
    /// Seconds covered.
    pub elapsed: u64,
    /// Yearly rate applied.
    pub borrow_rate: Wad,
    /// Growth of the total debt amount.
    pub interest: u128,
    /// Part of `interest` paid to suppliers through the collateral index.
    pub supplier_amount: u128,
    /// Part of `interest` to credit to the treasury account.
    pub treasury_amount: u128,
}

/// Grows the pool's indices up to `now`.
///
/// Returns `None` when no time has passed (or the clock went backwards), in
/// which case the pool is untouched. The caller credits
/// [`Accrual::treasury_amount`] to the treasury account.
pub fn accrue(
    pool: &mut PoolState,
    curve: &RateCurve,
    now: u64,
    treasury_fraction: Wad,
) -> Result<Option<Accrual>, MathError> {
    if now <= pool.last_accrual {
        return Ok(None);
    }
    let elapsed = now - pool.last_accrual;
    let borrow_rate = curve.borrow_rate(pool.utilization()?)?;

    let old_debt = pool.total_debt_amount()?;
    let collateral = pool.total_collateral_amount()?;

    let growth = mul_div_floor(borrow_rate.raw(), elapsed as u128, SECONDS_PER_YEAR as u128)?;
    let factor = Wad::ONE.try_add(Wad::from_raw(growth))?;
    let debt_index = pool.debt_index.try_mul(factor)?;

    let mut next = pool.clone();
    next.debt_index = debt_index;
    next.last_accrual = now;
    let interest = next.total_debt_amount()?.try_sub(old_debt)?;

    let (supplier_amount, treasury_amount) = if collateral == 0 {
        (0, interest)
    } else {
        let treasury = treasury_fraction.mul_floor(interest)?;
        let supplier = interest - treasury;
        next.collateral_index = Wad::from_raw(mul_div_floor(
            pool.collateral_index.raw(),
            collateral.try_add(supplier)?,
            collateral,
        )?);
        (supplier, treasury)
    };

    *pool = next;
    Ok(Some(Accrual {
        elapsed,
        borrow_rate,
        interest,
        supplier_amount,
        treasury_amount,
    }))
}
