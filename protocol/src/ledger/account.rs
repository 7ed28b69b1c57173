//! # Credit Accounts
//!
//! A credit account is a bag of signed fungible share balances plus a set of
//! NFTs, owned by one external address. Accounts are opened once and never
//! closed; an empty account simply holds nothing.

use std::collections::{BTreeMap, HashMap};

use crate::math::MathError;
use crate::types::{Address, AssetId, NftId};

// ---------------------------------------------------------------------------
// NftSet
// ---------------------------------------------------------------------------

/// NFT membership set with O(1) insert, lookup and removal.
///
/// Items live in a dense arena; `positions` maps each item back to its slot.
/// Removal swaps the last item into the freed slot, so iteration order is not
/// insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NftSet {
    items: Vec<NftId>,
    positions: HashMap<NftId, usize>,
}

impl NftSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of NFTs held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` if no NFT is held.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Membership test.
    pub fn contains(&self, nft: &NftId) -> bool {
        self.positions.contains_key(nft)
    }

    /// Adds `nft`. Returns `false` if it was already present.
    pub fn insert(&mut self, nft: NftId) -> bool {
        if self.positions.contains_key(&nft) {
            return false;
        }
        self.positions.insert(nft, self.items.len());
        self.items.push(nft);
        true
    }

    /// Removes `nft`. Returns `false` if it was not present.
    pub fn remove(&mut self, nft: &NftId) -> bool {
        let Some(slot) = self.positions.remove(nft) else {
            return false;
        };
        self.items.swap_remove(slot);
        if let Some(moved) = self.items.get(slot) {
            self.positions.insert(*moved, slot);
        }
        true
    }

    /// Iterates over held NFTs in arena order.
    pub fn iter(&self) -> impl Iterator<Item = &NftId> {
        self.items.iter()
    }

    /// Empties the set, returning every item.
    pub fn drain(&mut self) -> Vec<NftId> {
        self.positions.clear();
        std::mem::take(&mut self.items)
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// How a balance write changed the set of nonzero positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Zero before and after, or nonzero before and after.
    Unchanged,
    /// Went from zero to nonzero.
    Opened,
    /// Went from nonzero to zero.
    Closed,
}

/// One credit account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    owner: Address,
    shares: BTreeMap<AssetId, i128>,
    nfts: NftSet,
    token_storage: u32,
    lending_elections: BTreeMap<AssetId, u128>,
    liquidation_strategy: Option<Address>,
}

impl Account {
    /// Empty account owned by `owner`.
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            shares: BTreeMap::new(),
            nfts: NftSet::new(),
            token_storage: 0,
            lending_elections: BTreeMap::new(),
            liquidation_strategy: None,
        }
    }

    /// External address allowed to act on this account.
    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Signed shares held in `asset` (zero if none).
    pub fn shares(&self, asset: AssetId) -> i128 {
        self.shares.get(&asset).copied().unwrap_or(0)
    }

    /// Every nonzero share balance, ordered by asset id.
    pub fn positions(&self) -> impl Iterator<Item = (AssetId, i128)> + '_ {
        self.shares.iter().map(|(a, s)| (*a, *s))
    }

    /// Assets with a nonzero balance.
    pub fn assets(&self) -> Vec<AssetId> {
        self.shares.keys().copied().collect()
    }

    /// Number of nonzero fungible balances.
    pub fn token_storage(&self) -> u32 {
        self.token_storage
    }

    /// Held NFTs.
    pub fn nfts(&self) -> &NftSet {
        &self.nfts
    }

    pub(crate) fn nfts_mut(&mut self) -> &mut NftSet {
        &mut self.nfts
    }

    /// Overwrites the share balance of `asset`, keeping the storage counter
    /// in step with zero/nonzero transitions.
    pub(crate) fn set_shares(&mut self, asset: AssetId, shares: i128) -> Result<Transition, MathError> {
        let had = self.shares.contains_key(&asset);
        let transition = match (had, shares != 0) {
            (false, true) => {
                self.token_storage = self.token_storage.checked_add(1).ok_or(MathError::Overflow)?;
                Transition::Opened
            }
            (true, false) => {
                self.token_storage = self.token_storage.checked_sub(1).ok_or(MathError::Underflow)?;
                Transition::Closed
            }
            _ => Transition::Unchanged,
        };
        if shares == 0 {
            self.shares.remove(&asset);
        } else {
            self.shares.insert(asset, shares);
        }
        Ok(transition)
    }

    /// Amount of `asset` the owner asked not to be lent out.
    pub fn lending_election(&self, asset: AssetId) -> u128 {
        self.lending_elections.get(&asset).copied().unwrap_or(0)
    }

    pub(crate) fn set_lending_election(&mut self, asset: AssetId, no_lend_amount: u128) {
        if no_lend_amount == 0 {
            self.lending_elections.remove(&asset);
        } else {
            self.lending_elections.insert(asset, no_lend_amount);
        }
    }

    /// Liquidation strategy registered by the owner, if any.
    pub fn liquidation_strategy(&self) -> Option<&Address> {
        self.liquidation_strategy.as_ref()
    }

    pub(crate) fn set_liquidation_strategy(&mut self, strategy: Option<Address>) {
        self.liquidation_strategy = strategy;
    }
}
