//! # Risk-Adjusted Valuation
//!
//! Turns an account's positions into three numbers, all in the oracle's
//! quote unit:
//!
//! - `total`: signed net market value (positives minus negatives);
//! - `collateral`: positive values, each scaled down by its collateral
//!   factor;
//! - `debt`: negative values, each scaled up by its borrow factor.
//!
//! An account is solvent while `collateral >= debt`.
//!
//! NFTs are decomposed by their collection's assessor into underlying
//! fungible positions, each valued with that asset's own oracle and
//! collateral factor. NFTs only ever count as collateral.
//!
//! Valuation reads the stored indices and never accrues. Callers that need
//! current numbers accrue the account's assets first.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::ledger::{shares, Account};
use crate::math::{mul_div_ceil, to_signed, MathError, TryAdd, TryMul, Wad, WAD};
use crate::registry::AssetRegistry;
use crate::types::{i128_string, AssetId, NftId};

/// The three headline numbers of an account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionValues {
    /// Net market value, WAD-scaled, may be negative.
    #[serde(with = "i128_string")]
    pub total: i128,
    /// Risk-adjusted collateral.
    pub collateral: Wad,
    /// Risk-adjusted debt.
    pub debt: Wad,
}

impl PositionValues {
    /// `collateral >= debt`.
    pub fn is_liquid(&self) -> bool {
        self.collateral >= self.debt
    }

    /// `debt > 0 && debt > collateral`.
    pub fn is_liquidatable(&self) -> bool {
        !self.debt.is_zero() && self.debt > self.collateral
    }
}

/// Where a valued position came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PositionSource {
    /// Positive fungible balance.
    Collateral,
    /// Negative fungible balance.
    Debt,
    /// Underlying position of a held NFT.
    Nft {
        /// The NFT.
        nft: NftId,
    },
}

/// One valued position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionValue {
    /// Fungible asset the value is denominated in.
    pub asset: AssetId,
    /// Signed token amount.
    #[serde(with = "i128_string")]
    pub amount: i128,
    /// Origin of the position.
    pub source: PositionSource,
    /// Market value of `|amount|`.
    pub value: Wad,
    /// Contribution to collateral (or debt, for debt positions).
    pub risk_adjusted: Wad,
}

/// Headline numbers plus the per-position breakdown behind them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valuation {
    /// Totals.
    pub values: PositionValues,
    /// Breakdown, fungible positions first (by asset id), then NFTs.
    pub positions: Vec<PositionValue>,
}

/// Values every position of `account`.
pub fn value_account(registry: &AssetRegistry, account: &Account) -> Result<Valuation, LedgerError> {
    let mut valuation = Valuation::default();

    for (asset, held) in account.positions() {
        let fungible = registry.fungible(asset)?;
        let amount = shares::to_amount(held, &fungible.pool)?;
        if amount == 0 {
            continue;
        }
        let value = fungible.oracle.calc_value(asset, amount.unsigned_abs())?;
        let values = &mut valuation.values;
        let (source, risk_adjusted) = if amount > 0 {
            let adjusted = value.try_mul(fungible.risk.collateral_factor)?;
            values.total = values
                .total
                .checked_add(to_signed(value.raw())?)
                .ok_or(MathError::Overflow)?;
            values.collateral = values.collateral.try_add(adjusted)?;
            (PositionSource::Collateral, adjusted)
        } else {
            let factor = fungible
                .risk
                .borrow_factor
                .ok_or(LedgerError::BorrowNotAllowed(asset))?;
            let adjusted = Wad::from_raw(mul_div_ceil(value.raw(), factor.raw(), WAD)?);
            values.total = values
                .total
                .checked_sub(to_signed(value.raw())?)
                .ok_or(MathError::Underflow)?;
            values.debt = values.debt.try_add(adjusted)?;
            (PositionSource::Debt, adjusted)
        };
        valuation.positions.push(PositionValue {
            asset,
            amount,
            source,
            value,
            risk_adjusted,
        });
    }

    for nft in account.nfts().iter() {
        let collection = registry.collection(nft.collection)?;
        for underlying in collection.assessor.underlying(nft.collection, nft.token_id)? {
            let fungible = registry.fungible(underlying.asset)?;
            let value = fungible.oracle.calc_value(underlying.asset, underlying.amount)?;
            let adjusted = value.try_mul(fungible.risk.collateral_factor)?;
            let values = &mut valuation.values;
            values.total = values
                .total
                .checked_add(to_signed(value.raw())?)
                .ok_or(MathError::Overflow)?;
            values.collateral = values.collateral.try_add(adjusted)?;
            valuation.positions.push(PositionValue {
                asset: underlying.asset,
                amount: to_signed(underlying.amount)?,
                source: PositionSource::Nft { nft: *nft },
                value,
                risk_adjusted: adjusted,
            });
        }
    }

    Ok(valuation)
}

/// Headline numbers only.
pub fn risk_adjusted_position_values(
    registry: &AssetRegistry,
    account: &Account,
) -> Result<PositionValues, LedgerError> {
    Ok(value_account(registry, account)?.values)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::external::{
        BundleAssessor, FixedPriceOracle, InMemoryCollection, InMemoryToken, UnderlyingPosition,
    };
    use crate::interest::RateCurve;
    use crate::registry::{CollectionParams, FungibleParams, RiskParams};
    use crate::types::Address;

    struct Fixture {
        registry: AssetRegistry,
        usdc: AssetId,
        weth: AssetId,
        gov: AssetId,
        lp: AssetId,
    }

    fn fixture() -> Fixture {
        let mut registry = AssetRegistry::new();
        let mut add = |symbol: &str, price: u128, cf: u8, bf: Option<&str>| {
            registry
                .register_fungible(
                    FungibleParams {
                        symbol: symbol.into(),
                        token: Arc::new(InMemoryToken::new()),
                        oracle: Arc::new(FixedPriceOracle::new(Wad::from_int(price).unwrap())),
                        risk: RiskParams {
                            collateral_factor: Wad::from_percent(cf),
                            borrow_factor: bf.map(|b| b.parse().unwrap()),
                        },
                        curve: RateCurve::default(),
                    },
                    0,
                )
                .unwrap()
        };
        let usdc = add("USDC", 1, 90, Some("1"));
        let weth = add("WETH", 2_000, 80, Some("1.25"));
        let gov = add("GOV", 10, 50, None);
        let lp = registry
            .register_collection(CollectionParams {
                symbol: "LP".into(),
                collection: Arc::new(InMemoryCollection::new()),
                assessor: Arc::new(BundleAssessor::uniform(vec![
                    UnderlyingPosition { asset: usdc, amount: 1_000 },
                    UnderlyingPosition { asset: weth, amount: 1 },
                ])),
            })
            .unwrap();
        Fixture { registry, usdc, weth, gov, lp }
    }

    fn wad(n: u128) -> Wad {
        Wad::from_int(n).unwrap()
    }

    #[test]
    fn single_collateral_position() {
        let f = fixture();
        let mut account = Account::new(Address::new("alice"));
        account.set_shares(f.usdc, 10_000).unwrap();
        let v = risk_adjusted_position_values(&f.registry, &account).unwrap();
        assert_eq!(v.collateral, wad(9_000));
        assert_eq!(v.debt, Wad::ZERO);
        assert_eq!(v.total, wad(10_000).raw() as i128);
        assert!(v.is_liquid());
    }

    #[test]
    fn debt_is_marked_up_by_borrow_factor() {
        let f = fixture();
        let mut account = Account::new(Address::new("alice"));
        account.set_shares(f.usdc, 5_000).unwrap();
        account.set_shares(f.weth, -2).unwrap();
        let v = risk_adjusted_position_values(&f.registry, &account).unwrap();
        assert_eq!(v.collateral, wad(4_500));
        assert_eq!(v.debt, wad(5_000));
        assert_eq!(v.total, wad(1_000).raw() as i128);
        assert!(v.is_liquidatable());
    }

    #[test]
    fn borrow_factor_is_a_markup_on_each_debt_position() {
        let f = fixture();
        let mut account = Account::new(Address::new("alice"));
        account.set_shares(f.weth, -3).unwrap();
        let valuation = value_account(&f.registry, &account).unwrap();
        let debt = &valuation.positions[0];
        assert_eq!(debt.source, PositionSource::Debt);
        assert_eq!(debt.value, wad(6_000));
        // 6,000 * 1.25, never discounted.
        assert_eq!(debt.risk_adjusted, wad(7_500));
        assert!(debt.risk_adjusted > debt.value);
        assert_eq!(valuation.values.debt, wad(7_500));
    }

    #[test]
    fn borrowing_a_non_borrowable_asset_fails() {
        let f = fixture();
        let mut account = Account::new(Address::new("alice"));
        account.set_shares(f.gov, -1).unwrap();
        assert!(matches!(
            risk_adjusted_position_values(&f.registry, &account),
            Err(LedgerError::BorrowNotAllowed(id)) if id == f.gov
        ));
    }

    #[test]
    fn nfts_count_as_underlying_collateral() {
        let f = fixture();
        let mut account = Account::new(Address::new("alice"));
        account.nfts_mut().insert(NftId::new(f.lp, 1));
        let valuation = value_account(&f.registry, &account).unwrap();
        // 1000 USDC * 0.9 + 1 WETH * 2000 * 0.8
        assert_eq!(valuation.values.collateral, wad(2_500));
        assert_eq!(valuation.values.total, wad(3_000).raw() as i128);
        assert_eq!(valuation.positions.len(), 2);
        assert!(matches!(valuation.positions[0].source, PositionSource::Nft { .. }));
    }

    #[test]
    fn empty_account_is_liquid_and_not_liquidatable() {
        let f = fixture();
        let account = Account::new(Address::new("alice"));
        let v = risk_adjusted_position_values(&f.registry, &account).unwrap();
        assert_eq!(v, PositionValues::default());
        assert!(v.is_liquid());
        assert!(!v.is_liquidatable());
    }
}
