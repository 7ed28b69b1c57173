//! Batch working copy.
//!
//! A [`LedgerTx`] owns a clone of the ledger state for the duration of one
//! batch. Ledger mutations land on the clone. External token and NFT
//! transfers cannot be cloned, so each one that succeeds is appended to a
//! journal; if the batch fails the journal is replayed backwards with the
//! direction of every transfer reversed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use super::LedgerState;
use crate::config::{Config, TokenStorageConfig};
use crate::error::LedgerError;
use crate::events::{timestamp, LedgerEvent};
use crate::external::{FungibleToken, NonFungibleToken};
use crate::math::{to_negative, to_signed, MathError};
use crate::types::{Address, Amount, AssetId, NftId};

/// An external transfer performed by the batch.
pub(crate) enum ExternalEffect {
    Token {
        asset: AssetId,
        token: Arc<dyn FungibleToken>,
        from: Address,
        to: Address,
        amount: u128,
    },
    Nft {
        nft: NftId,
        collection: Arc<dyn NonFungibleToken>,
        from: Address,
        to: Address,
    },
}

pub(crate) struct LedgerTx<'a> {
    pub(crate) state: LedgerState,
    pub(crate) config: &'a Config,
    pub(crate) storage: &'a TokenStorageConfig,
    pub(crate) custody: &'a Address,
    pub(crate) now: u64,
    journal: Vec<ExternalEffect>,
    events: Vec<LedgerEvent>,
}

impl<'a> LedgerTx<'a> {
    pub(crate) fn new(
        state: LedgerState,
        config: &'a Config,
        storage: &'a TokenStorageConfig,
        custody: &'a Address,
        now: u64,
    ) -> Self {
        Self {
            state,
            config,
            storage,
            custody,
            now,
            journal: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Event timestamp for this batch.
    pub(crate) fn at(&self) -> DateTime<Utc> {
        timestamp(self.now)
    }

    pub(crate) fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    /// Keeps the working state and events; the journal is discarded.
    pub(crate) fn commit(self) -> (LedgerState, Vec<LedgerEvent>) {
        (self.state, self.events)
    }

    /// Drops the working state and reverses every external transfer.
    pub(crate) fn rollback(self) {
        for effect in self.journal.into_iter().rev() {
            match effect {
                ExternalEffect::Token {
                    asset,
                    token,
                    from,
                    to,
                    amount,
                } => {
                    if let Err(e) = token.transfer(&to, &from, amount) {
                        error!(%asset, %from, %to, amount, error = %e, "failed to reverse token transfer");
                    }
                }
                ExternalEffect::Nft {
                    nft,
                    collection,
                    from,
                    to,
                } => {
                    if let Err(e) = collection.transfer(&to, &from, nft.token_id) {
                        error!(%nft, %from, %to, error = %e, "failed to reverse nft transfer");
                    }
                }
            }
        }
    }

    fn owner_of(&self, account: &Address) -> Result<Address, LedgerError> {
        Ok(self.state.account(account)?.owner().clone())
    }

    fn token(&self, asset: AssetId) -> Result<Arc<dyn FungibleToken>, LedgerError> {
        Ok(self.state.registry.fungible(asset)?.token.clone())
    }

    fn collection(&self, nft: NftId) -> Result<Arc<dyn NonFungibleToken>, LedgerError> {
        Ok(self.state.registry.collection(nft.collection)?.collection.clone())
    }

    // -----------------------------------------------------------------------
    // Interest
    // -----------------------------------------------------------------------

    /// Brings `asset` up to the batch timestamp.
    pub(crate) fn accrue(&mut self, asset: AssetId) -> Result<(), LedgerError> {
        let Some(accrual) = self.state.accrue(asset, self.now, self.config)? else {
            return Ok(());
        };
        let pool = &self.state.registry.fungible(asset)?.pool;
        let (debt_index, collateral_index) = (pool.debt_index, pool.collateral_index);
        debug!(
            %asset,
            elapsed = accrual.elapsed,
            rate = %accrual.borrow_rate,
            interest = accrual.interest,
            "interest accrued"
        );
        let at = self.at();
        self.emit(LedgerEvent::InterestAccrued {
            asset,
            borrow_rate: accrual.borrow_rate,
            interest: accrual.interest,
            treasury_amount: accrual.treasury_amount,
            debt_index,
            collateral_index,
            at,
        });
        Ok(())
    }

    /// Accrues every fungible asset `account` holds.
    pub(crate) fn accrue_account(&mut self, account: &Address) -> Result<(), LedgerError> {
        for asset in self.state.account(account)?.assets() {
            self.accrue(asset)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // External transfers
    // -----------------------------------------------------------------------

    /// Moves tokens externally and journals the move.
    pub(crate) fn send_tokens(
        &mut self,
        asset: AssetId,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let token = self.token(asset)?;
        token.transfer(from, to, amount)?;
        self.journal.push(ExternalEffect::Token {
            asset,
            token,
            from: from.clone(),
            to: to.clone(),
            amount,
        });
        Ok(())
    }

    fn send_nft(&mut self, nft: NftId, from: &Address, to: &Address) -> Result<(), LedgerError> {
        let collection = self.collection(nft)?;
        collection.transfer(from, to, nft.token_id)?;
        self.journal.push(ExternalEffect::Nft {
            nft,
            collection,
            from: from.clone(),
            to: to.clone(),
        });
        Ok(())
    }

    /// `total_debt <= custody_balance * leverage` for `asset`.
    pub(crate) fn check_reserve(&self, asset: AssetId) -> Result<(), LedgerError> {
        let fungible = self.state.registry.fungible(asset)?;
        let total_debt = fungible.pool.total_debt_amount()?;
        let custody_balance = fungible.token.balance_of(self.custody);
        let limit = custody_balance
            .checked_mul(self.config.fractional_reserve_leverage as u128)
            .ok_or(MathError::Overflow)?;
        if total_debt > limit {
            return Err(LedgerError::FractionalReserveExceeded {
                asset,
                total_debt,
                limit,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Fungible operations
    // -----------------------------------------------------------------------

    /// Pulls tokens from the owner wallet into custody and credits them.
    pub(crate) fn deposit(
        &mut self,
        account: &Address,
        asset: AssetId,
        amount: Amount,
    ) -> Result<u128, LedgerError> {
        let owner = self.owner_of(account)?;
        let token = self.token(asset)?;
        self.accrue(asset)?;

        let n = match amount {
            Amount::Exact(n) => n,
            Amount::Max => token.balance_of(&owner),
        };
        if n == 0 {
            return Ok(0);
        }

        let before = token.balance_of(self.custody);
        token.transfer(&owner, self.custody, n)?;
        let received = token.balance_of(self.custody).saturating_sub(before);
        self.journal.push(ExternalEffect::Token {
            asset,
            token,
            from: owner,
            to: self.custody.clone(),
            amount: received,
        });
        if received != n {
            return Err(LedgerError::TransferAmountMismatch {
                asset,
                expected: n,
                received,
            });
        }

        self.state
            .apply_delta(account, asset, to_signed(n)?, Some(self.storage))?;
        debug!(%account, %asset, amount = n, "deposit");
        let at = self.at();
        self.emit(LedgerEvent::Deposited {
            account: account.clone(),
            asset,
            amount: n,
            at,
        });
        Ok(n)
    }

    /// Debits the account (possibly into debt) and pays the owner wallet.
    pub(crate) fn withdraw(
        &mut self,
        account: &Address,
        asset: AssetId,
        amount: Amount,
    ) -> Result<u128, LedgerError> {
        let owner = self.owner_of(account)?;
        self.accrue(asset)?;

        let n = match amount {
            Amount::Exact(n) => n,
            Amount::Max => {
                let current = self.state.balance_of(asset, account)?;
                if current <= 0 {
                    return Ok(0);
                }
                current.unsigned_abs()
            }
        };
        if n == 0 {
            return Ok(0);
        }

        self.state
            .apply_delta(account, asset, to_negative(n)?, Some(self.storage))?;
        let custody = self.custody.clone();
        self.send_tokens(asset, &custody, &owner, n)?;
        self.check_reserve(asset)?;

        debug!(%account, %asset, amount = n, "withdraw");
        let at = self.at();
        self.emit(LedgerEvent::Withdrawn {
            account: account.clone(),
            asset,
            amount: n,
            at,
        });
        Ok(n)
    }

    /// Moves value between two accounts without touching the token.
    pub(crate) fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        asset: AssetId,
        amount: Amount,
    ) -> Result<u128, LedgerError> {
        self.state.account(from)?;
        self.state.account(to)?;
        self.accrue(asset)?;

        let n = match amount {
            Amount::Exact(n) => n,
            Amount::Max => {
                // Max only tops up a recipient that already holds a
                // positive position, and never moves more than `from` has.
                if self.state.balance_of(asset, to)? <= 0 {
                    return Ok(0);
                }
                let current = self.state.balance_of(asset, from)?;
                if current <= 0 {
                    return Ok(0);
                }
                current.unsigned_abs()
            }
        };
        if n == 0 || from == to {
            return Ok(n);
        }

        self.state
            .apply_delta(from, asset, to_negative(n)?, Some(self.storage))?;
        self.state
            .apply_delta(to, asset, to_signed(n)?, Some(self.storage))?;

        debug!(%from, %to, %asset, amount = n, "transfer");
        let at = self.at();
        self.emit(LedgerEvent::Transferred {
            from: from.clone(),
            to: to.clone(),
            asset,
            amount: n,
            at,
        });
        Ok(n)
    }

    // -----------------------------------------------------------------------
    // NFT operations
    // -----------------------------------------------------------------------

    /// Pulls an NFT from the owner wallet into custody and records it.
    pub(crate) fn deposit_nft(&mut self, account: &Address, nft: NftId) -> Result<(), LedgerError> {
        let owner = self.owner_of(account)?;
        let collection = self.collection(nft)?;
        if self.state.holder_of(&nft).is_some() {
            return Err(LedgerError::NftAlreadyDeposited(nft));
        }
        // Refuse before moving anything external.
        self.state.insert_nft(account, nft, Some(self.storage))?;

        let custody = self.custody.clone();
        self.send_nft(nft, &owner, &custody)?;
        if collection.owner_of(nft.token_id).as_ref() != Some(&custody) {
            return Err(LedgerError::NftNotReceived(nft));
        }

        debug!(%account, %nft, "nft deposit");
        let at = self.at();
        self.emit(LedgerEvent::NftDeposited {
            account: account.clone(),
            nft,
            at,
        });
        Ok(())
    }

    /// Releases an NFT from the account to the owner wallet.
    pub(crate) fn withdraw_nft(&mut self, account: &Address, nft: NftId) -> Result<(), LedgerError> {
        let owner = self.owner_of(account)?;
        self.collection(nft)?;
        self.state.remove_nft(account, nft)?;
        let custody = self.custody.clone();
        self.send_nft(nft, &custody, &owner)?;

        debug!(%account, %nft, "nft withdraw");
        let at = self.at();
        self.emit(LedgerEvent::NftWithdrawn {
            account: account.clone(),
            nft,
            at,
        });
        Ok(())
    }

    /// Moves an NFT between two accounts inside the ledger.
    pub(crate) fn transfer_nft(
        &mut self,
        from: &Address,
        to: &Address,
        nft: NftId,
    ) -> Result<(), LedgerError> {
        self.collection(nft)?;
        self.state.account(to)?;
        self.state.remove_nft(from, nft)?;
        self.state.insert_nft(to, nft, Some(self.storage))?;

        debug!(%from, %to, %nft, "nft transfer");
        let at = self.at();
        self.emit(LedgerEvent::NftTransferred {
            from: from.clone(),
            to: to.clone(),
            nft,
            at,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Account settings
    // -----------------------------------------------------------------------

    pub(crate) fn set_lending_election(
        &mut self,
        account: &Address,
        asset: AssetId,
        no_lend_amount: u128,
    ) -> Result<(), LedgerError> {
        self.state.registry.fungible(asset)?;
        self.state
            .account_mut(account)?
            .set_lending_election(asset, no_lend_amount);
        Ok(())
    }

    pub(crate) fn set_liquidation_strategy(
        &mut self,
        account: &Address,
        strategy: Option<Address>,
    ) -> Result<(), LedgerError> {
        self.state
            .account_mut(account)?
            .set_liquidation_strategy(strategy);
        Ok(())
    }

    /// Marks `nonce` as used for `account`.
    pub(crate) fn consume_nonce(&mut self, account: &Address, nonce: u64) -> Result<(), LedgerError> {
        if !self.state.used_nonces.insert((account.clone(), nonce)) {
            return Err(LedgerError::NonceAlreadyUsed {
                account: account.clone(),
                nonce,
            });
        }
        Ok(())
    }
}
