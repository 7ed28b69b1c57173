//! # Liquidation
//!
//! All-or-nothing repossession of an under-collateralized account.
//!
//! ```text
//! Evaluating ──(debt <= collateral)──▶ Rejected
//!     │
//!     └─(debt > collateral)──▶ Transferring ──▶ Settled
//! ```
//!
//! The liquidator's account absorbs every fungible position and every NFT of
//! the target, debt included. In return the target's owner receives a
//! refund worth
//!
//! ```text
//! max(total, 0) * liq_fraction * (collateral / debt)
//! ```
//!
//! paid out of the collateral that was just moved, pro-rata across the
//! fungible collateral assets and never more than their full value. The
//! deeper underwater the account was, the smaller the refund.
//!
//! The liquidator must be solvent afterwards. A standalone liquidation is a
//! one-call batch, so the batch-end solvency check on the liquidator covers
//! it. There is no partial liquidation.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::LedgerError;
use crate::events::LedgerEvent;
use crate::ledger::tx::LedgerTx;
use crate::math::{to_negative, TryAdd, TryDiv, TryMul, Wad};
use crate::types::{u128_string, Address, AssetId};
use crate::valuation::{value_account, PositionSource, PositionValues};

/// Tokens paid back to the liquidated owner in one asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    /// The asset.
    pub asset: AssetId,
    /// Token units paid.
    #[serde(with = "u128_string")]
    pub amount: u128,
}

/// What a settled liquidation did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationReport {
    /// Account that absorbed the positions.
    pub liquidator: Address,
    /// Account that was emptied.
    pub target: Address,
    /// Target valuation before the move.
    pub before: PositionValues,
    /// `collateral / debt` before the move.
    pub percent_underwater: Wad,
    /// Value owed to the target's owner.
    pub refund_value: Wad,
    /// Tokens actually paid.
    pub refunds: Vec<Refund>,
    /// Fungible positions moved.
    pub positions_moved: usize,
    /// NFTs moved.
    pub nfts_moved: usize,
}

impl LedgerTx<'_> {
    /// Repossesses `target` into `liquidator`.
    pub(crate) fn liquidate(
        &mut self,
        liquidator: &Address,
        target: &Address,
    ) -> Result<LiquidationReport, LedgerError> {
        if liquidator == target {
            return Err(LedgerError::SelfLiquidation(target.clone()));
        }
        let target_owner = self.state.account(target)?.owner().clone();
        self.state.account(liquidator)?;

        self.accrue_account(target)?;
        self.accrue_account(liquidator)?;

        // Evaluating
        let valuation = value_account(&self.state.registry, self.state.account(target)?)?;
        let before = valuation.values;
        if !before.is_liquidatable() {
            return Err(LedgerError::NotLiquidatable {
                account: target.clone(),
                collateral: before.collateral,
                debt: before.debt,
            });
        }
        let percent_underwater = before.collateral.try_div(before.debt)?;

        let moved_collateral: Vec<(AssetId, u128, Wad)> = valuation
            .positions
            .iter()
            .filter(|p| p.source == PositionSource::Collateral)
            .map(|p| (p.asset, p.amount.unsigned_abs(), p.value))
            .collect();

        // Transferring
        let assets = self.state.account(target)?.assets();
        for asset in &assets {
            let moved = self.state.take_position(target, *asset)?;
            self.state.merge_position(liquidator, *asset, moved)?;
        }
        let nfts = self.state.account_mut(target)?.nfts_mut().drain();
        for nft in &nfts {
            self.state.nft_holders.remove(nft);
            self.state.insert_nft(liquidator, *nft, None)?;
        }
        self.state.ensure_storage(liquidator, self.storage)?;

        // Settled: refund the target's owner out of the moved collateral.
        let refund_value = if before.total > 0 {
            Wad::from_raw(before.total.unsigned_abs())
                .try_mul(self.config.liq_fraction)?
                .try_mul(percent_underwater)?
        } else {
            Wad::ZERO
        };
        let collateral_value = moved_collateral
            .iter()
            .try_fold(Wad::ZERO, |acc, (_, _, v)| acc.try_add(*v))?;

        let mut refunds = Vec::new();
        if !refund_value.is_zero() && !collateral_value.is_zero() {
            let ratio = refund_value.try_div(collateral_value)?.min(Wad::ONE);
            let custody = self.custody.clone();
            for (asset, amount, _) in &moved_collateral {
                let refund = ratio.mul_floor(*amount)?;
                if refund == 0 {
                    continue;
                }
                self.state
                    .apply_delta(liquidator, *asset, to_negative(refund)?, None)?;
                self.send_tokens(*asset, &custody, &target_owner, refund)?;
                self.check_reserve(*asset)?;
                refunds.push(Refund {
                    asset: *asset,
                    amount: refund,
                });
            }
        }

        info!(
            %liquidator,
            %target,
            collateral = %before.collateral,
            debt = %before.debt,
            refund = %refund_value,
            positions = assets.len(),
            nfts = nfts.len(),
            "account liquidated"
        );
        let at = self.at();
        self.emit(LedgerEvent::Liquidated {
            liquidator: liquidator.clone(),
            target: target.clone(),
            collateral: before.collateral,
            debt: before.debt,
            total: before.total,
            refund_value,
            positions: assets.len(),
            nfts: nfts.len(),
            at,
        });

        Ok(LiquidationReport {
            liquidator: liquidator.clone(),
            target: target.clone(),
            before,
            percent_underwater,
            refund_value,
            refunds,
            positions_moved: assets.len(),
            nfts_moved: nfts.len(),
        })
    }
}
