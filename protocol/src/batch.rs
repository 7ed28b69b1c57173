//! # Batches
//!
//! A batch is an ordered list of [`Call`]s against one credit account. Calls
//! run strictly in order; the solvency guard runs once after the last one;
//! the batch commits only if every call and the guard succeed.
//!
//! Single-operation entry points on the ledger are one-call batches, so
//! there is exactly one code path that mutates state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::tx::LedgerTx;
use crate::liquidation::LiquidationReport;
use crate::types::{u128_string, Address, Amount, AssetId, NftId};
use crate::valuation::PositionValues;

/// One operation inside a batch. Every call acts on the batch's account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Call {
    /// Pull tokens from the owner wallet.
    Deposit {
        /// The asset.
        asset: AssetId,
        /// How much.
        amount: Amount,
    },
    /// Pay tokens to the owner wallet, borrowing if needed.
    Withdraw {
        /// The asset.
        asset: AssetId,
        /// How much.
        amount: Amount,
    },
    /// Move value to another account.
    Transfer {
        /// Recipient account.
        to: Address,
        /// The asset.
        asset: AssetId,
        /// How much.
        amount: Amount,
    },
    /// Pull an NFT from the owner wallet.
    DepositNft {
        /// The NFT.
        nft: NftId,
    },
    /// Send an NFT to the owner wallet.
    WithdrawNft {
        /// The NFT.
        nft: NftId,
    },
    /// Move an NFT to another account.
    TransferNft {
        /// Recipient account.
        to: Address,
        /// The NFT.
        nft: NftId,
    },
    /// Absorb an under-collateralized account into this one.
    Liquidate {
        /// The account to repossess.
        target: Address,
    },
    /// Record how much of an asset should not be lent out.
    SetLendingElection {
        /// The asset.
        asset: AssetId,
        /// Amount withheld from lending.
        #[serde(with = "u128_string")]
        no_lend_amount: u128,
    },
    /// Register (or clear) a liquidation strategy.
    SetLiquidationStrategy {
        /// Strategy address, `None` to clear.
        strategy: Option<Address>,
    },
}

/// Result of one call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallOutcome {
    /// Tokens moved (deposit, withdraw, transfer).
    Moved {
        /// Token units actually moved; `0` for a no-op.
        #[serde(with = "u128_string")]
        amount: u128,
    },
    /// Call had no amount to report.
    Done,
    /// A liquidation settled.
    Liquidated(LiquidationReport),
}

/// Proof of a committed batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceipt {
    /// Unique id, also carried by the `BatchExecuted` event.
    pub batch_id: Uuid,
    /// The account the batch ran on.
    pub account: Address,
    /// Timestamp the batch observed.
    pub timestamp: u64,
    /// One outcome per call, in order.
    pub outcomes: Vec<CallOutcome>,
    /// Account valuation at the end of the batch.
    pub values: PositionValues,
}

impl LedgerTx<'_> {
    /// Dispatches one call.
    pub(crate) fn run_call(&mut self, account: &Address, call: &Call) -> Result<CallOutcome, LedgerError> {
        let outcome = match call {
            Call::Deposit { asset, amount } => CallOutcome::Moved {
                amount: self.deposit(account, *asset, *amount)?,
            },
            Call::Withdraw { asset, amount } => CallOutcome::Moved {
                amount: self.withdraw(account, *asset, *amount)?,
            },
            Call::Transfer { to, asset, amount } => CallOutcome::Moved {
                amount: self.transfer(account, to, *asset, *amount)?,
            },
            Call::DepositNft { nft } => {
                self.deposit_nft(account, *nft)?;
                CallOutcome::Done
            }
            Call::WithdrawNft { nft } => {
                self.withdraw_nft(account, *nft)?;
                CallOutcome::Done
            }
            Call::TransferNft { to, nft } => {
                self.transfer_nft(account, to, *nft)?;
                CallOutcome::Done
            }
            Call::Liquidate { target } => CallOutcome::Liquidated(self.liquidate(account, target)?),
            Call::SetLendingElection {
                asset,
                no_lend_amount,
            } => {
                self.set_lending_election(account, *asset, *no_lend_amount)?;
                CallOutcome::Done
            }
            Call::SetLiquidationStrategy { strategy } => {
                self.set_liquidation_strategy(account, strategy.clone())?;
                CallOutcome::Done
            }
        };
        Ok(outcome)
    }
}
