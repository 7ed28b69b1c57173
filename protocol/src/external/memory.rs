//! In-memory collaborators.
//!
//! Interior mutability throughout (`parking_lot` locks and atomics) so a
//! single `Arc` handle can be shared between the registry and the test or
//! node that drives it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{
    AuthError, AuthProvider, Clock, FungibleToken, NftAssessor, NonFungibleToken, OracleError,
    PauseSource, PriceOracle, TokenError, UnderlyingPosition,
};
use crate::crypto::{PublicKey, Signature};
use crate::math::{mul_div_floor, Wad};
use crate::types::{Address, AssetId};

// ---------------------------------------------------------------------------
// FixedPriceOracle
// ---------------------------------------------------------------------------

/// Oracle quoting a single settable price per whole token.
///
/// `value = amount * price / 10^decimals`. With `decimals = 0` one base unit
/// is one whole token, which keeps test arithmetic readable.
#[derive(Debug)]
pub struct FixedPriceOracle {
    price: RwLock<Option<Wad>>,
    decimals: u8,
}

impl FixedPriceOracle {
    /// Oracle for a token with no decimals.
    pub fn new(price: Wad) -> Self {
        Self::with_decimals(price, 0)
    }

    /// Oracle for a token with `decimals` decimals.
    pub fn with_decimals(price: Wad, decimals: u8) -> Self {
        Self {
            price: RwLock::new(Some(price)),
            decimals,
        }
    }

    /// Replaces the quoted price.
    pub fn set_price(&self, price: Wad) {
        *self.price.write() = Some(price);
    }

    /// Simulates a feed outage; every valuation fails until a price is set.
    pub fn clear_price(&self) {
        *self.price.write() = None;
    }

    /// Current price, if any.
    pub fn price(&self) -> Option<Wad> {
        *self.price.read()
    }
}

impl PriceOracle for FixedPriceOracle {
    fn calc_value(&self, asset: AssetId, amount: u128) -> Result<Wad, OracleError> {
        let price = self.price().ok_or(OracleError::PriceUnavailable(asset))?;
        let unit = 10u128
            .checked_pow(self.decimals as u32)
            .ok_or(crate::math::MathError::Overflow)?;
        Ok(Wad::from_raw(mul_div_floor(amount, price.raw(), unit)?))
    }
}

// ---------------------------------------------------------------------------
// BundleAssessor
// ---------------------------------------------------------------------------

/// Assessor mapping each NFT to a fixed bundle of fungible positions.
///
/// Tokens without an explicit bundle fall back to the default bundle, if one
/// was configured (a floor-price style valuation).
#[derive(Debug, Default)]
pub struct BundleAssessor {
    default_bundle: Option<Vec<UnderlyingPosition>>,
    bundles: RwLock<HashMap<u64, Vec<UnderlyingPosition>>>,
}

impl BundleAssessor {
    /// Assessor with no bundles; every lookup fails until one is set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assessor valuing every token in the collection as `bundle`.
    pub fn uniform(bundle: Vec<UnderlyingPosition>) -> Self {
        Self {
            default_bundle: Some(bundle),
            bundles: RwLock::new(HashMap::new()),
        }
    }

    /// Sets the bundle for one token.
    pub fn set_bundle(&self, token_id: u64, bundle: Vec<UnderlyingPosition>) {
        self.bundles.write().insert(token_id, bundle);
    }
}

impl NftAssessor for BundleAssessor {
    fn underlying(
        &self,
        collection: AssetId,
        token_id: u64,
    ) -> Result<Vec<UnderlyingPosition>, OracleError> {
        if let Some(bundle) = self.bundles.read().get(&token_id) {
            return Ok(bundle.clone());
        }
        self.default_bundle
            .clone()
            .ok_or(OracleError::UnknownNft {
                collection,
                token_id,
            })
    }
}

// ---------------------------------------------------------------------------
// InMemoryToken
// ---------------------------------------------------------------------------

/// Balance-map token contract.
///
/// An optional transfer fee (in basis points, burned) turns it into a
/// fee-on-transfer token, which the ledger must detect and reject.
#[derive(Debug, Default)]
pub struct InMemoryToken {
    balances: Mutex<HashMap<Address, u128>>,
    fee_bps: u32,
}

impl InMemoryToken {
    /// Plain token with no balances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that burns `fee_bps` of every transfer.
    pub fn with_transfer_fee(fee_bps: u32) -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            fee_bps,
        }
    }

    /// Credits `amount` to `holder` out of thin air.
    pub fn mint(&self, holder: &Address, amount: u128) {
        let mut balances = self.balances.lock();
        let entry = balances.entry(holder.clone()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }
}

impl FungibleToken for InMemoryToken {
    fn balance_of(&self, holder: &Address) -> u128 {
        self.balances.lock().get(holder).copied().unwrap_or(0)
    }

    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<(), TokenError> {
        let mut balances = self.balances.lock();
        let available = balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                holder: from.clone(),
                needed: amount,
                available,
            });
        }
        let fee = amount.saturating_mul(self.fee_bps as u128) / 10_000;
        let received = amount - fee;
        let to_balance = balances.get(to).copied().unwrap_or(0);
        let credited = if from == to {
            available - fee
        } else {
            to_balance.checked_add(received).ok_or(TokenError::Overflow)?
        };
        if from != to {
            balances.insert(from.clone(), available - amount);
        }
        balances.insert(to.clone(), credited);
        debug!(%from, %to, amount, fee, "token transfer");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InMemoryCollection
// ---------------------------------------------------------------------------

/// Owner-map NFT collection.
#[derive(Debug, Default)]
pub struct InMemoryCollection {
    owners: Mutex<HashMap<u64, Address>>,
}

impl InMemoryCollection {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or reassigns) `token_id` to `owner`.
    pub fn mint(&self, owner: &Address, token_id: u64) {
        self.owners.lock().insert(token_id, owner.clone());
    }
}

impl NonFungibleToken for InMemoryCollection {
    fn owner_of(&self, token_id: u64) -> Option<Address> {
        self.owners.lock().get(&token_id).cloned()
    }

    fn transfer(&self, from: &Address, to: &Address, token_id: u64) -> Result<(), TokenError> {
        let mut owners = self.owners.lock();
        match owners.get(&token_id) {
            Some(owner) if owner == from => {
                owners.insert(token_id, to.clone());
                debug!(%from, %to, token_id, "nft transfer");
                Ok(())
            }
            _ => Err(TokenError::NotOwner {
                holder: from.clone(),
                token_id,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// PauseFlag / clocks
// ---------------------------------------------------------------------------

/// Atomic pause switch.
#[derive(Debug, Default)]
pub struct PauseFlag(AtomicBool);

impl PauseFlag {
    /// Unpaused flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the switch.
    pub fn set(&self, paused: bool) {
        self.0.store(paused, Ordering::SeqCst);
    }
}

impl PauseSource for PauseFlag {
    fn is_paused(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    /// Clock frozen at `now`.
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    /// Jumps to `now`.
    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }

    /// Moves forward by `seconds`.
    pub fn advance(&self, seconds: u64) {
        self.0.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

// ---------------------------------------------------------------------------
// Ed25519AuthProvider
// ---------------------------------------------------------------------------

/// Maps owner addresses to Ed25519 public keys.
#[derive(Debug, Default)]
pub struct Ed25519AuthProvider {
    keys: RwLock<HashMap<Address, PublicKey>>,
}

impl Ed25519AuthProvider {
    /// Provider with no registered signers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or rotates) the key for `owner`.
    pub fn register(&self, owner: Address, key: PublicKey) {
        self.keys.write().insert(owner, key);
    }

    /// Key registered for `owner`.
    pub fn key_of(&self, owner: &Address) -> Option<PublicKey> {
        self.keys.read().get(owner).copied()
    }
}

impl AuthProvider for Ed25519AuthProvider {
    fn verify(
        &self,
        owner: &Address,
        digest: &[u8; 32],
        signature: &Signature,
    ) -> Result<(), AuthError> {
        let key = self
            .key_of(owner)
            .ok_or_else(|| AuthError::UnknownSigner(owner.clone()))?;
        if key.verify(digest, signature) {
            Ok(())
        } else {
            Err(AuthError::BadSignature)
        }
    }
}
