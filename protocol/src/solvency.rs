//! # Solvency Guard
//!
//! The single invariant every committed batch must leave behind: the
//! account's risk-adjusted collateral covers its risk-adjusted debt.
//!
//! Operations inside a batch may pass through insolvent states (borrow
//! first, post collateral second). The guard runs once, after the last
//! call, and its failure reverts the whole batch.
//!
//! Valuation cost grows with the number of positions, so the check is
//! bounded up front: if an account holds too much to be valued within
//! `max_solvency_check_cost`, the check refuses to run at all.

use tracing::debug;

use crate::config::{solvency_check_cost, Config};
use crate::error::LedgerError;
use crate::ledger::{Account, LedgerState};
use crate::types::Address;
use crate::valuation::{risk_adjusted_position_values, PositionValues};

/// Estimated cost of valuing `account`, refused if above the configured limit.
pub fn check_cost(address: &Address, account: &Account, config: &Config) -> Result<u64, LedgerError> {
    let cost = solvency_check_cost(account.token_storage() as usize, account.nfts().len());
    if cost > config.max_solvency_check_cost {
        return Err(LedgerError::SolvencyCheckTooExpensive {
            account: address.clone(),
            cost,
            limit: config.max_solvency_check_cost,
        });
    }
    Ok(cost)
}

/// Values `address` after the cost check.
pub fn bounded_values(
    state: &LedgerState,
    address: &Address,
    config: &Config,
) -> Result<PositionValues, LedgerError> {
    let account = state.account(address)?;
    check_cost(address, account, config)?;
    risk_adjusted_position_values(state.registry(), account)
}

/// `collateral >= debt` for `address`.
pub fn is_liquid(state: &LedgerState, address: &Address, config: &Config) -> Result<bool, LedgerError> {
    Ok(bounded_values(state, address, config)?.is_liquid())
}

/// Fails with [`LedgerError::Insolvent`] unless `address` is liquid.
pub fn ensure_solvent(
    state: &LedgerState,
    address: &Address,
    config: &Config,
) -> Result<PositionValues, LedgerError> {
    let values = bounded_values(state, address, config)?;
    debug!(
        account = %address,
        collateral = %values.collateral,
        debt = %values.debt,
        "solvency check"
    );
    if !values.is_liquid() {
        return Err(LedgerError::Insolvent {
            account: address.clone(),
            collateral: values.collateral,
            debt: values.debt,
        });
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FUNGIBLE_VALUATION_COST, NFT_VALUATION_COST};
    use crate::types::{AssetId, NftId};

    #[test]
    fn cost_counts_positions() {
        let mut account = Account::new(Address::new("o"));
        account.set_shares(AssetId(0), 1).unwrap();
        account.set_shares(AssetId(1), -1).unwrap();
        account.nfts_mut().insert(NftId::new(AssetId(2), 1));
        let config = Config::default();
        assert_eq!(
            check_cost(&Address::new("a"), &account, &config).unwrap(),
            2 * FUNGIBLE_VALUATION_COST + NFT_VALUATION_COST
        );
    }

    #[test]
    fn cost_above_limit_is_refused() {
        let mut account = Account::new(Address::new("o"));
        account.set_shares(AssetId(0), 1).unwrap();
        let config = Config {
            max_solvency_check_cost: FUNGIBLE_VALUATION_COST - 1,
            ..Config::default()
        };
        assert!(matches!(
            check_cost(&Address::new("a"), &account, &config),
            Err(LedgerError::SolvencyCheckTooExpensive { .. })
        ));
    }
}
