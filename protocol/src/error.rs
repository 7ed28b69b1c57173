//! # Ledger Errors
//!
//! Every failure a batch can hit, in one enum. Module-level errors convert
//! into it with `?`: math, token, oracle and auth failures are wrapped,
//! registry lookups are flattened into the matching validation variant so
//! callers can match on `UnknownAsset` without caring where it came from.
//!
//! Any error aborts the whole batch. Nothing is retried internally.

use thiserror::Error;

use crate::config::ConfigError;
use crate::crypto::DigestError;
use crate::external::{AuthError, OracleError, TokenError};
use crate::math::{MathError, Wad};
use crate::registry::{InfoError, RegistryError};
use crate::types::{Address, AssetClass, AssetId, NftId};

/// Errors returned by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // -- validation ---------------------------------------------------------
    /// No asset with this id.
    #[error("unknown asset {0}")]
    UnknownAsset(AssetId),

    /// No NFT collection with this id.
    #[error("unknown collection {0}")]
    UnknownCollection(AssetId),

    /// No credit account at this address.
    #[error("unknown account {0}")]
    UnknownAccount(Address),

    /// An account is already open at this address.
    #[error("account {0} already exists")]
    AccountExists(Address),

    /// The account does not hold this NFT in the ledger.
    #[error("{account} does not hold {nft}")]
    NotNftOwner {
        /// Account that was asked to release the NFT.
        account: Address,
        /// The NFT.
        nft: NftId,
    },

    /// The NFT is already held by a credit account.
    #[error("{0} is already deposited")]
    NftAlreadyDeposited(NftId),

    /// The caller is not the account owner.
    #[error("{caller} may not act on {account}")]
    Unauthorized {
        /// Who called.
        caller: Address,
        /// The account they tried to use.
        account: Address,
    },

    /// A configuration or risk parameter is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The asset exists but is of the other class.
    #[error("{asset} is not {expected:?}")]
    WrongAssetClass {
        /// The asset.
        asset: AssetId,
        /// The class the operation needs.
        expected: AssetClass,
    },

    /// All asset ids are taken.
    #[error("asset registry is full")]
    RegistryFull,

    // -- invariant violations -----------------------------------------------
    /// The account's risk-adjusted collateral is below its debt.
    #[error("account {account} is insolvent: collateral {collateral} < debt {debt}")]
    Insolvent {
        /// The account.
        account: Address,
        /// Risk-adjusted collateral.
        collateral: Wad,
        /// Risk-adjusted debt.
        debt: Wad,
    },

    /// The account would carry too many positions.
    #[error("account {account} token storage {used} exceeds {max}")]
    TokenStorageExceeded {
        /// The account.
        account: Address,
        /// Storage the operation would leave.
        used: u64,
        /// Configured ceiling.
        max: u32,
    },

    /// Total debt of the asset exceeds the leveraged custody balance.
    #[error("{asset} debt {total_debt} exceeds reserve limit {limit}")]
    FractionalReserveExceeded {
        /// The asset.
        asset: AssetId,
        /// Total debt after the withdrawal.
        total_debt: u128,
        /// `custody_balance * leverage`.
        limit: u128,
    },

    /// Valuing the account would cost more than allowed.
    #[error("solvency check for {account} costs {cost}, limit {limit}")]
    SolvencyCheckTooExpensive {
        /// The account.
        account: Address,
        /// Estimated cost.
        cost: u64,
        /// Configured ceiling.
        limit: u64,
    },

    /// A negative balance in an asset that may not be borrowed.
    #[error("{0} cannot be borrowed")]
    BorrowNotAllowed(AssetId),

    /// The token delivered a different amount than requested.
    #[error("{asset} transfer delivered {received}, expected {expected}")]
    TransferAmountMismatch {
        /// The asset.
        asset: AssetId,
        /// Requested amount.
        expected: u128,
        /// Observed custody balance change.
        received: u128,
    },

    /// Custody does not own the NFT after the transfer.
    #[error("{0} was not received by custody")]
    NftNotReceived(NftId),

    // -- domain rejections --------------------------------------------------
    /// The target's collateral covers its debt.
    #[error("account {account} is not liquidatable: collateral {collateral}, debt {debt}")]
    NotLiquidatable {
        /// The target.
        account: Address,
        /// Risk-adjusted collateral.
        collateral: Wad,
        /// Risk-adjusted debt.
        debt: Wad,
    },

    /// An account tried to liquidate itself.
    #[error("account {0} cannot liquidate itself")]
    SelfLiquidation(Address),

    // -- numeric ------------------------------------------------------------
    /// Checked arithmetic failed.
    #[error("math error: {0}")]
    Math(#[from] MathError),

    // -- collaborators ------------------------------------------------------
    /// An external token transfer failed.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// An oracle or assessor failed.
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    // -- runtime ------------------------------------------------------------
    /// The protocol is paused.
    #[error("protocol is paused")]
    Paused,

    /// The signed batch's deadline has passed.
    #[error("deadline {deadline} passed at {now}")]
    DeadlineExpired {
        /// Batch deadline.
        deadline: u64,
        /// Current time.
        now: u64,
    },

    /// The nonce was already consumed for this account.
    #[error("nonce {nonce} already used for {account}")]
    NonceAlreadyUsed {
        /// The account.
        account: Address,
        /// The nonce.
        nonce: u64,
    },

    /// The batch signature did not verify.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// The batch authorization could not be digested.
    #[error(transparent)]
    Digest(#[from] DigestError),
}

impl From<RegistryError> for LedgerError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownAsset(id) => LedgerError::UnknownAsset(id),
            RegistryError::UnknownCollection(id) => LedgerError::UnknownCollection(id),
            RegistryError::WrongAssetClass { asset, expected } => {
                LedgerError::WrongAssetClass { asset, expected }
            }
            RegistryError::InvalidParams(e) => LedgerError::InvalidConfig(e),
            RegistryError::Full => LedgerError::RegistryFull,
        }
    }
}

impl From<InfoError> for LedgerError {
    fn from(err: InfoError) -> Self {
        match err {
            InfoError::Registry(e) => e.into(),
            InfoError::Math(e) => e.into(),
        }
    }
}

impl LedgerError {
    /// Short machine-readable kind, used for metrics labels and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::UnknownAsset(_) => "unknown_asset",
            LedgerError::UnknownCollection(_) => "unknown_collection",
            LedgerError::UnknownAccount(_) => "unknown_account",
            LedgerError::AccountExists(_) => "account_exists",
            LedgerError::NotNftOwner { .. } => "not_nft_owner",
            LedgerError::NftAlreadyDeposited(_) => "nft_already_deposited",
            LedgerError::Unauthorized { .. } => "unauthorized",
            LedgerError::InvalidConfig(_) => "invalid_config",
            LedgerError::WrongAssetClass { .. } => "wrong_asset_class",
            LedgerError::RegistryFull => "registry_full",
            LedgerError::Insolvent { .. } => "insolvent",
            LedgerError::TokenStorageExceeded { .. } => "token_storage_exceeded",
            LedgerError::FractionalReserveExceeded { .. } => "fractional_reserve_exceeded",
            LedgerError::SolvencyCheckTooExpensive { .. } => "solvency_check_too_expensive",
            LedgerError::BorrowNotAllowed(_) => "borrow_not_allowed",
            LedgerError::TransferAmountMismatch { .. } => "transfer_amount_mismatch",
            LedgerError::NftNotReceived(_) => "nft_not_received",
            LedgerError::NotLiquidatable { .. } => "not_liquidatable",
            LedgerError::SelfLiquidation(_) => "self_liquidation",
            LedgerError::Math(_) => "math",
            LedgerError::Token(_) => "token",
            LedgerError::Oracle(_) => "oracle",
            LedgerError::Paused => "paused",
            LedgerError::DeadlineExpired { .. } => "deadline_expired",
            LedgerError::NonceAlreadyUsed { .. } => "nonce_already_used",
            LedgerError::Auth(_) => "auth",
            LedgerError::Digest(_) => "digest",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_errors_flatten() {
        let err: LedgerError = RegistryError::UnknownAsset(AssetId(7)).into();
        assert!(matches!(err, LedgerError::UnknownAsset(AssetId(7))));
        let err: LedgerError = RegistryError::InvalidParams(ConfigError::ZeroValue("x")).into();
        assert_eq!(err.kind(), "invalid_config");
    }

    #[test]
    fn messages_are_readable() {
        let err = LedgerError::Insolvent {
            account: Address::new("acct:alice"),
            collateral: Wad::from_int(5).unwrap(),
            debt: Wad::from_int(6).unwrap(),
        };
        assert_eq!(err.to_string(), "account acct:alice is insolvent: collateral 5 < debt 6");
        assert_eq!(LedgerError::from(MathError::Overflow).kind(), "math");
    }
}
