//! # External Collaborators
//!
//! The ledger never talks to a token contract, price feed or signer
//! directly. It talks to these traits. Each one is a narrow, synchronous
//! contract; the registry stores `Arc<dyn Trait>` handles so one collaborator
//! can back several assets.
//!
//! In-memory reference implementations live in [`memory`]. They are what the
//! tests, benches and the demo node run against.

pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::Signature;
use crate::math::{MathError, Wad};
use crate::types::{Address, AssetId};

pub use memory::{
    BundleAssessor, Ed25519AuthProvider, FixedPriceOracle, InMemoryCollection, InMemoryToken,
    ManualClock, PauseFlag, SystemClock,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A price or NFT assessment could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// The oracle has no price for this asset.
    #[error("no price available for {0}")]
    PriceUnavailable(AssetId),

    /// The assessor does not know this NFT.
    #[error("no assessment for {collection} token {token_id}")]
    UnknownNft {
        /// Collection id.
        collection: AssetId,
        /// Token id.
        token_id: u64,
    },

    /// Valuation arithmetic failed.
    #[error(transparent)]
    Math(#[from] MathError),
}

/// An external token or NFT transfer was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The sender does not hold enough tokens.
    #[error("{holder} holds {available}, needs {needed}")]
    InsufficientBalance {
        /// Sending address.
        holder: Address,
        /// Requested amount.
        needed: u128,
        /// Current balance.
        available: u128,
    },

    /// The sender does not own the NFT.
    #[error("{holder} does not own token {token_id}")]
    NotOwner {
        /// Sending address.
        holder: Address,
        /// Token id.
        token_id: u64,
    },

    /// A balance would overflow.
    #[error("token balance overflow")]
    Overflow,
}

/// A batch signature could not be verified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No public key is registered for the signer.
    #[error("no key registered for {0}")]
    UnknownSigner(Address),

    /// The signature does not match the digest and key.
    #[error("invalid signature")]
    BadSignature,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Values token amounts in the quote unit (e.g. USD) as 18-decimal fixed point.
pub trait PriceOracle: Send + Sync {
    /// Value of `amount` base units of `asset`.
    fn calc_value(&self, asset: AssetId, amount: u128) -> Result<Wad, OracleError>;
}

/// One fungible position an NFT is equivalent to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderlyingPosition {
    /// Registered fungible asset.
    pub asset: AssetId,
    /// Amount in that asset's base units.
    #[serde(with = "crate::types::u128_string")]
    pub amount: u128,
}

/// Decomposes an NFT (an LP position, a vault receipt) into the fungible
/// assets it is worth.
pub trait NftAssessor: Send + Sync {
    /// Underlying positions of `token_id` in `collection`.
    fn underlying(
        &self,
        collection: AssetId,
        token_id: u64,
    ) -> Result<Vec<UnderlyingPosition>, OracleError>;
}

/// An external fungible token contract.
pub trait FungibleToken: Send + Sync {
    /// Balance held by `holder`.
    fn balance_of(&self, holder: &Address) -> u128;

    /// Moves `amount` from `from` to `to`.
    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<(), TokenError>;
}

/// An external NFT collection contract.
pub trait NonFungibleToken: Send + Sync {
    /// Current owner of `token_id`, if it exists.
    fn owner_of(&self, token_id: u64) -> Option<Address>;

    /// Moves `token_id` from `from` to `to`.
    fn transfer(&self, from: &Address, to: &Address, token_id: u64) -> Result<(), TokenError>;
}

/// Global circuit breaker.
pub trait PauseSource: Send + Sync {
    /// `true` while the protocol is halted.
    fn is_paused(&self) -> bool;
}

/// Source of the current timestamp, in seconds.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now(&self) -> u64;
}

/// Verifies that `owner` signed `digest`.
pub trait AuthProvider: Send + Sync {
    /// `Ok(())` if the signature is valid for the owner's registered key.
    fn verify(&self, owner: &Address, digest: &[u8; 32], signature: &Signature)
        -> Result<(), AuthError>;
}
