//! Ledger events.
//!
//! Operations append events to the batch's working copy. They reach the
//! ledger's event log only if the batch commits, and are drained with
//! `CreditLedger::take_events`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::math::Wad;
use crate::types::{i128_string, u128_string, Address, AssetId, NftId};

/// Converts a ledger timestamp (seconds) into an event timestamp.
pub fn timestamp(secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .unwrap_or_default()
}

/// Something that changed the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A new asset was registered.
    AssetRegistered {
        /// The new id.
        asset: AssetId,
        /// Ticker.
        symbol: String,
        /// When.
        at: DateTime<Utc>,
    },

    /// A credit account was opened.
    AccountOpened {
        /// The account.
        account: Address,
        /// Its owner.
        owner: Address,
        /// When.
        at: DateTime<Utc>,
    },

    /// Tokens moved from the owner wallet into the account.
    Deposited {
        /// The account.
        account: Address,
        /// The asset.
        asset: AssetId,
        /// Token units.
        #[serde(with = "u128_string")]
        amount: u128,
        /// When.
        at: DateTime<Utc>,
    },

    /// Tokens moved from the account to the owner wallet.
    Withdrawn {
        /// The account.
        account: Address,
        /// The asset.
        asset: AssetId,
        /// Token units.
        #[serde(with = "u128_string")]
        amount: u128,
        /// When.
        at: DateTime<Utc>,
    },

    /// Value moved between two accounts inside the ledger.
    Transferred {
        /// Sender account.
        from: Address,
        /// Recipient account.
        to: Address,
        /// The asset.
        asset: AssetId,
        /// Token units.
        #[serde(with = "u128_string")]
        amount: u128,
        /// When.
        at: DateTime<Utc>,
    },

    /// An NFT entered the account.
    NftDeposited {
        /// The account.
        account: Address,
        /// The NFT.
        nft: NftId,
        /// When.
        at: DateTime<Utc>,
    },

    /// An NFT left the account to the owner wallet.
    NftWithdrawn {
        /// The account.
        account: Address,
        /// The NFT.
        nft: NftId,
        /// When.
        at: DateTime<Utc>,
    },

    /// An NFT moved between two accounts.
    NftTransferred {
        /// Sender account.
        from: Address,
        /// Recipient account.
        to: Address,
        /// The NFT.
        nft: NftId,
        /// When.
        at: DateTime<Utc>,
    },

    /// An asset's indices grew.
    InterestAccrued {
        /// The asset.
        asset: AssetId,
        /// Yearly rate applied.
        borrow_rate: Wad,
        /// Debt growth.
        #[serde(with = "u128_string")]
        interest: u128,
        /// Treasury share of `interest`.
        #[serde(with = "u128_string")]
        treasury_amount: u128,
        /// New debt index.
        debt_index: Wad,
        /// New collateral index.
        collateral_index: Wad,
        /// When.
        at: DateTime<Utc>,
    },

    /// An account was repossessed.
    Liquidated {
        /// Account that absorbed the positions.
        liquidator: Address,
        /// Account that was emptied.
        target: Address,
        /// Target's risk-adjusted collateral before.
        collateral: Wad,
        /// Target's risk-adjusted debt before.
        debt: Wad,
        /// Target's net value before, WAD-scaled, may be negative.
        #[serde(with = "i128_string")]
        total: i128,
        /// Value paid back to the target's owner.
        refund_value: Wad,
        /// Fungible positions moved.
        positions: usize,
        /// NFTs moved.
        nfts: usize,
        /// When.
        at: DateTime<Utc>,
    },

    /// A batch committed.
    BatchExecuted {
        /// Batch id.
        batch_id: Uuid,
        /// The account it ran on.
        account: Address,
        /// Number of calls.
        calls: usize,
        /// When.
        at: DateTime<Utc>,
    },
}

impl LedgerEvent {
    /// Short name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::AssetRegistered { .. } => "asset_registered",
            LedgerEvent::AccountOpened { .. } => "account_opened",
            LedgerEvent::Deposited { .. } => "deposited",
            LedgerEvent::Withdrawn { .. } => "withdrawn",
            LedgerEvent::Transferred { .. } => "transferred",
            LedgerEvent::NftDeposited { .. } => "nft_deposited",
            LedgerEvent::NftWithdrawn { .. } => "nft_withdrawn",
            LedgerEvent::NftTransferred { .. } => "nft_transferred",
            LedgerEvent::InterestAccrued { .. } => "interest_accrued",
            LedgerEvent::Liquidated { .. } => "liquidated",
            LedgerEvent::BatchExecuted { .. } => "batch_executed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_in_json() {
        let event = LedgerEvent::Deposited {
            account: Address::new("acct:a"),
            asset: AssetId(0),
            amount: 10,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "deposited");
        assert_eq!(json["amount"], "10");
        assert_eq!(event.name(), "deposited");
    }
}
