//! # Credit Account Ledger
//!
//! The ledger state is everything a batch can change: the asset registry
//! (pool totals and indices live there), every credit account, which
//! account holds which NFT, and the consumed batch nonces.
//!
//! ## Balance updates
//!
//! Every fungible balance change follows extract-then-insert:
//!
//! 1. read the account's signed shares and convert them to a signed amount;
//! 2. apply the signed delta to the amount;
//! 3. re-encode the new amount as shares at the current indices;
//! 4. swap the old shares out of the pool totals and the new ones in.
//!
//! A balance that crosses zero therefore moves from the collateral pool to
//! the debt pool (or back) in one step, and the account's token storage
//! counter changes only when a balance opens or closes.
//!
//! ## Working copies
//!
//! [`LedgerState`] is `Clone`. A batch runs against a clone inside a
//! [`tx::LedgerTx`] and the engine swaps it in only if the whole batch
//! succeeds. Collaborator handles are `Arc`s, so a clone copies account
//! maps and pool numbers, never token contracts.

pub mod account;
pub mod shares;
pub(crate) mod tx;

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::{Config, TokenStorageConfig};
use crate::error::LedgerError;
use crate::interest::{self, Accrual};
use crate::math::{to_signed, MathError, TryAdd};
use crate::registry::AssetRegistry;
use crate::types::{Address, AssetId, NftId};

pub use account::{Account, NftSet, Transition};

/// Everything a batch can mutate.
#[derive(Clone, Default)]
pub struct LedgerState {
    pub(crate) registry: AssetRegistry,
    pub(crate) accounts: HashMap<Address, Account>,
    pub(crate) nft_holders: HashMap<NftId, Address>,
    pub(crate) used_nonces: HashSet<(Address, u64)>,
}

impl LedgerState {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered assets.
    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// Looks up an account.
    pub fn account(&self, address: &Address) -> Result<&Account, LedgerError> {
        self.accounts
            .get(address)
            .ok_or_else(|| LedgerError::UnknownAccount(address.clone()))
    }

    pub(crate) fn account_mut(&mut self, address: &Address) -> Result<&mut Account, LedgerError> {
        self.accounts
            .get_mut(address)
            .ok_or_else(|| LedgerError::UnknownAccount(address.clone()))
    }

    /// Every open account.
    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    /// Number of open accounts.
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Account currently holding `nft`, if deposited.
    pub fn holder_of(&self, nft: &NftId) -> Option<&Address> {
        self.nft_holders.get(nft)
    }

    /// `true` if `nonce` was consumed by a committed batch on `account`.
    pub fn nonce_used(&self, account: &Address, nonce: u64) -> bool {
        self.used_nonces.contains(&(account.clone(), nonce))
    }

    /// Signed amount of `asset` in `account` at the stored indices.
    ///
    /// Does not accrue. Between accruals the value lags by the interest
    /// accumulated since the asset was last touched.
    pub fn balance_of(&self, asset: AssetId, account: &Address) -> Result<i128, LedgerError> {
        let pool = &self.registry.fungible(asset)?.pool;
        let held = self.account(account)?.shares(asset);
        Ok(shares::to_amount(held, pool)?)
    }

    pub(crate) fn open_account(&mut self, address: Address, owner: Address) -> Result<(), LedgerError> {
        if self.accounts.contains_key(&address) {
            return Err(LedgerError::AccountExists(address));
        }
        debug!(account = %address, owner = %owner, "account opened");
        self.accounts.insert(address, Account::new(owner));
        Ok(())
    }

    /// Adds `delta` to the signed balance of `asset` in `account` and returns
    /// the new signed amount. With `storage` set, opening a new position is
    /// refused if it would exceed the account's token storage.
    pub(crate) fn apply_delta(
        &mut self,
        account: &Address,
        asset: AssetId,
        delta: i128,
        storage: Option<&TokenStorageConfig>,
    ) -> Result<i128, LedgerError> {
        let pool = &mut self.registry.fungible_mut(asset)?.pool;
        let holder = self
            .accounts
            .get_mut(account)
            .ok_or_else(|| LedgerError::UnknownAccount(account.clone()))?;

        let old_shares = holder.shares(asset);
        let old_amount = shares::to_amount(old_shares, pool)?;
        let new_amount = old_amount
            .checked_add(delta)
            .ok_or(MathError::Overflow)?;
        let new_shares = shares::to_shares(new_amount, pool)?;

        if old_shares == 0 && new_shares != 0 {
            if let Some(cfg) = storage {
                check_storage(account, holder, cfg, 1, 0)?;
            }
        }

        pool.remove_shares(old_shares)?;
        pool.add_shares(new_shares)?;
        holder.set_shares(asset, new_shares)?;
        Ok(shares::to_amount(new_shares, pool)?)
    }

    /// Removes the whole position of `asset` from `account` without touching
    /// pool totals. Returns the shares removed.
    pub(crate) fn take_position(&mut self, account: &Address, asset: AssetId) -> Result<i128, LedgerError> {
        let holder = self.account_mut(account)?;
        let shares = holder.shares(asset);
        holder.set_shares(asset, 0)?;
        Ok(shares)
    }

    /// Adds `moved` shares of `asset` to `account`.
    ///
    /// Same-sign (or empty) destinations keep the shares verbatim, so the
    /// pool totals are untouched. Opposite signs are netted through amounts
    /// and re-encoded.
    pub(crate) fn merge_position(
        &mut self,
        account: &Address,
        asset: AssetId,
        moved: i128,
    ) -> Result<(), LedgerError> {
        if moved == 0 {
            return Ok(());
        }
        let pool = &mut self.registry.fungible_mut(asset)?.pool;
        let holder = self
            .accounts
            .get_mut(account)
            .ok_or_else(|| LedgerError::UnknownAccount(account.clone()))?;

        let existing = holder.shares(asset);
        if existing == 0 || (existing > 0) == (moved > 0) {
            let merged = existing
                .checked_add(moved)
                .ok_or(MathError::Overflow)?;
            holder.set_shares(asset, merged)?;
            return Ok(());
        }

        let net = shares::to_amount(existing, pool)?
            .checked_add(shares::to_amount(moved, pool)?)
            .ok_or(MathError::Overflow)?;
        let new_shares = shares::to_shares(net, pool)?;
        pool.remove_shares(existing)?;
        pool.remove_shares(moved)?;
        pool.add_shares(new_shares)?;
        holder.set_shares(asset, new_shares)?;
        Ok(())
    }

    /// Records `nft` as held by `account`.
    pub(crate) fn insert_nft(
        &mut self,
        account: &Address,
        nft: NftId,
        storage: Option<&TokenStorageConfig>,
    ) -> Result<(), LedgerError> {
        if self.nft_holders.contains_key(&nft) {
            return Err(LedgerError::NftAlreadyDeposited(nft));
        }
        let holder = self
            .accounts
            .get_mut(account)
            .ok_or_else(|| LedgerError::UnknownAccount(account.clone()))?;
        if let Some(cfg) = storage {
            check_storage(account, holder, cfg, 0, 1)?;
        }
        holder.nfts_mut().insert(nft);
        self.nft_holders.insert(nft, account.clone());
        Ok(())
    }

    /// Releases `nft` from `account`.
    pub(crate) fn remove_nft(&mut self, account: &Address, nft: NftId) -> Result<(), LedgerError> {
        let holder = self.account_mut(account)?;
        if !holder.nfts_mut().remove(&nft) {
            return Err(LedgerError::NotNftOwner {
                account: account.clone(),
                nft,
            });
        }
        self.nft_holders.remove(&nft);
        Ok(())
    }

    /// Refuses if `account` already exceeds its token storage.
    pub(crate) fn ensure_storage(
        &self,
        account: &Address,
        storage: &TokenStorageConfig,
    ) -> Result<(), LedgerError> {
        check_storage(account, self.account(account)?, storage, 0, 0)
    }

    /// Accrues `asset` up to `now` and credits the treasury's share.
    pub(crate) fn accrue(
        &mut self,
        asset: AssetId,
        now: u64,
        config: &Config,
    ) -> Result<Option<Accrual>, LedgerError> {
        let fungible = self.registry.fungible_mut(asset)?;
        let accrual = interest::accrue(
            &mut fungible.pool,
            &fungible.curve,
            now,
            config.treasury_interest_fraction,
        )?;
        let Some(accrual) = accrual else {
            return Ok(None);
        };
        if accrual.treasury_amount > 0 {
            self.apply_delta(
                &config.treasury_account,
                asset,
                to_signed(accrual.treasury_amount)?,
                None,
            )?;
        }
        Ok(Some(accrual))
    }

    /// Sums of every account's collateral and debt shares of `asset`. Always
    /// equal to the pool totals.
    pub fn share_sums(&self, asset: AssetId) -> Result<(u128, u128), LedgerError> {
        self.registry.fungible(asset)?;
        let mut collateral = 0u128;
        let mut debt = 0u128;
        for account in self.accounts.values() {
            let held = account.shares(asset);
            if held > 0 {
                collateral = collateral.try_add(held.unsigned_abs())?;
            } else if held < 0 {
                debt = debt.try_add(held.unsigned_abs())?;
            }
        }
        Ok((collateral, debt))
    }
}

fn check_storage(
    address: &Address,
    account: &Account,
    cfg: &TokenStorageConfig,
    extra_fungible: u32,
    extra_nfts: u32,
) -> Result<(), LedgerError> {
    let nfts = u32::try_from(account.nfts().len()).unwrap_or(u32::MAX);
    let used = cfg.usage(
        account.token_storage().saturating_add(extra_fungible),
        nfts.saturating_add(extra_nfts),
    );
    if used > cfg.max_token_storage as u64 {
        return Err(LedgerError::TokenStorageExceeded {
            account: address.clone(),
            used,
            max: cfg.max_token_storage,
        });
    }
    Ok(())
}
