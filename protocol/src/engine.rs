//! # Credit Ledger
//!
//! [`CreditLedger`] is the one object embedders talk to. It owns the ledger
//! state and the configuration, and reaches the outside world (tokens,
//! oracles, the pause switch, the clock, signature checks) only through the
//! traits in [`crate::external`].
//!
//! ## Write path
//!
//! Every state change goes through a batch:
//!
//! 1. Reject if paused, unauthorized, or (signed batches) expired.
//! 2. Clone the state into a [`LedgerTx`].
//! 3. Run the calls in order against the clone.
//! 4. Run the solvency guard on the batch account.
//! 5. Commit the clone, or drop it and reverse the external transfers.
//!
//! Single operations (`deposit`, `withdraw`, ...) are one-call batches.
//! Only the batch account is checked for solvency: every effect a batch can
//! have on another account (a transfer in, an NFT in) only adds value.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::SignedBatch;
use crate::batch::{BatchReceipt, Call, CallOutcome};
use crate::config::{Config, TokenStorageConfig};
use crate::error::LedgerError;
use crate::events::{timestamp, LedgerEvent};
use crate::external::{AuthProvider, Clock, PauseSource};
use crate::interest::RateCurve;
use crate::ledger::tx::LedgerTx;
use crate::ledger::LedgerState;
use crate::liquidation::LiquidationReport;
use crate::math::Wad;
use crate::registry::{AssetInfo, CollectionParams, FungibleParams, RiskParams};
use crate::solvency;
use crate::types::{Address, Amount, AssetClass, AssetId, NftId};
use crate::valuation::{self, PositionValues, Valuation};

/// The ledger's view of the outside world.
#[derive(Clone)]
pub struct Environment {
    /// Address that holds every deposited token and NFT.
    pub custody: Address,
    /// Global pause switch.
    pub pause: Arc<dyn PauseSource>,
    /// Source of timestamps for accrual, deadlines and events.
    pub clock: Arc<dyn Clock>,
    /// Checks owner signatures on signed batches.
    pub auth: Arc<dyn AuthProvider>,
}

/// The credit-account engine.
pub struct CreditLedger {
    state: LedgerState,
    config: Config,
    token_storage: TokenStorageConfig,
    env: Environment,
    events: Vec<LedgerEvent>,
}

impl CreditLedger {
    /// Creates an empty ledger and opens the treasury account.
    pub fn new(
        config: Config,
        token_storage: TokenStorageConfig,
        env: Environment,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        token_storage.validate()?;
        let mut ledger = Self {
            state: LedgerState::new(),
            config,
            token_storage,
            env,
            events: Vec::new(),
        };
        ledger.ensure_treasury()?;
        info!(
            custody = %ledger.env.custody,
            treasury = %ledger.config.treasury_account,
            "credit ledger ready"
        );
        Ok(ledger)
    }

    /// Current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current token storage limits.
    pub fn token_storage_config(&self) -> &TokenStorageConfig {
        &self.token_storage
    }

    /// Custody address.
    pub fn custody(&self) -> &Address {
        &self.env.custody
    }

    /// Read-only view of the committed state.
    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// `true` while the pause switch is on.
    pub fn is_paused(&self) -> bool {
        self.env.pause.is_paused()
    }

    /// Clock reading.
    pub fn now(&self) -> u64 {
        self.env.clock.now()
    }

    fn ensure_treasury(&mut self) -> Result<(), LedgerError> {
        let treasury = self.config.treasury_account.clone();
        if self.state.account(&treasury).is_err() {
            self.open_account(treasury.clone(), treasury)?;
        }
        Ok(())
    }

    /// Runs `f` against a working copy and commits it on success.
    fn in_tx<T>(
        &mut self,
        now: u64,
        f: impl FnOnce(&mut LedgerTx<'_>) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut tx = LedgerTx::new(
            self.state.clone(),
            &self.config,
            &self.token_storage,
            &self.env.custody,
            now,
        );
        match f(&mut tx) {
            Ok(value) => {
                let (state, events) = tx.commit();
                self.state = state;
                self.events.extend(events);
                Ok(value)
            }
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Governance
    // -----------------------------------------------------------------------

    /// Registers a fungible asset. Its pool starts accruing now.
    pub fn register_fungible(&mut self, params: FungibleParams) -> Result<AssetId, LedgerError> {
        let now = self.now();
        let symbol = params.symbol.clone();
        let asset = self.state.registry.register_fungible(params, now)?;
        self.events.push(LedgerEvent::AssetRegistered {
            asset,
            symbol,
            at: timestamp(now),
        });
        Ok(asset)
    }

    /// Registers an NFT collection.
    pub fn register_collection(&mut self, params: CollectionParams) -> Result<AssetId, LedgerError> {
        let symbol = params.symbol.clone();
        let asset = self.state.registry.register_collection(params)?;
        self.events.push(LedgerEvent::AssetRegistered {
            asset,
            symbol,
            at: timestamp(self.now()),
        });
        Ok(asset)
    }

    /// Replaces the risk parameters of a fungible asset.
    ///
    /// Applies to every account at its next valuation; no account is
    /// re-checked here.
    pub fn set_risk_params(&mut self, asset: AssetId, risk: RiskParams) -> Result<(), LedgerError> {
        self.state.registry.set_risk_params(asset, risk)?;
        Ok(())
    }

    /// Replaces the rate curve of a fungible asset.
    ///
    /// Interest up to now is accrued under the old curve first. While paused
    /// the curve is swapped without accruing.
    pub fn set_rate_curve(&mut self, asset: AssetId, curve: RateCurve) -> Result<(), LedgerError> {
        curve.validate()?;
        self.state.registry.fungible(asset)?;
        if !self.is_paused() {
            let now = self.now();
            self.in_tx(now, |tx| tx.accrue(asset))?;
        }
        self.state.registry.set_rate_curve(asset, curve)?;
        Ok(())
    }

    /// Replaces the configuration. Opens the new treasury account if needed.
    pub fn set_config(&mut self, config: Config) -> Result<(), LedgerError> {
        config.validate()?;
        if !self.is_paused() {
            let now = self.now();
            let assets: Vec<AssetId> = self
                .state
                .registry
                .iter()
                .filter(|a| a.class() == AssetClass::Fungible)
                .map(|a| a.id)
                .collect();
            self.in_tx(now, |tx| assets.iter().try_for_each(|a| tx.accrue(*a)))?;
        }
        self.config = config;
        self.ensure_treasury()?;
        info!(
            treasury = %self.config.treasury_account,
            liq_fraction = %self.config.liq_fraction,
            leverage = self.config.fractional_reserve_leverage,
            "configuration updated"
        );
        Ok(())
    }

    /// Replaces the token storage limits.
    ///
    /// Accounts already above a lowered limit keep their positions but
    /// cannot open new ones.
    pub fn set_token_storage_config(&mut self, storage: TokenStorageConfig) -> Result<(), LedgerError> {
        storage.validate()?;
        info!(max = storage.max_token_storage, "token storage limits updated");
        self.token_storage = storage;
        Ok(())
    }

    /// Opens a credit account controlled by `owner`.
    pub fn open_account(&mut self, address: Address, owner: Address) -> Result<(), LedgerError> {
        self.state.open_account(address.clone(), owner.clone())?;
        self.events.push(LedgerEvent::AccountOpened {
            account: address,
            owner,
            at: timestamp(self.now()),
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Batches
    // -----------------------------------------------------------------------

    /// Runs `calls` on `account` on behalf of `caller`, who must be its owner.
    pub fn execute_batch(
        &mut self,
        caller: &Address,
        account: &Address,
        calls: &[Call],
    ) -> Result<BatchReceipt, LedgerError> {
        if self.is_paused() {
            return Err(LedgerError::Paused);
        }
        let owner = self.state.account(account)?.owner();
        if owner != caller {
            return Err(LedgerError::Unauthorized {
                caller: caller.clone(),
                account: account.clone(),
            });
        }
        self.run_batch(account, calls, None)
    }

    /// Runs a batch authorized by the account owner's signature.
    ///
    /// The deadline is checked first, then the pause switch, then the
    /// signature. The nonce is consumed inside the batch.
    pub fn execute_signed_batch(&mut self, batch: &SignedBatch) -> Result<BatchReceipt, LedgerError> {
        let auth = &batch.authorization;
        let now = self.now();
        if now > auth.deadline {
            return Err(LedgerError::DeadlineExpired {
                deadline: auth.deadline,
                now,
            });
        }
        if self.is_paused() {
            return Err(LedgerError::Paused);
        }
        let owner = self.state.account(&auth.account)?.owner();
        let digest = auth.digest()?;
        self.env.auth.verify(owner, &digest, &batch.signature)?;
        self.run_batch(&auth.account, &auth.calls, Some(auth.nonce))
    }

    fn run_batch(
        &mut self,
        account: &Address,
        calls: &[Call],
        nonce: Option<u64>,
    ) -> Result<BatchReceipt, LedgerError> {
        let batch_id = Uuid::new_v4();
        let now = self.now();
        let result = self.in_tx(now, |tx| {
            if let Some(nonce) = nonce {
                tx.consume_nonce(account, nonce)?;
            }
            let mut outcomes = Vec::with_capacity(calls.len());
            for call in calls {
                outcomes.push(tx.run_call(account, call)?);
            }
            // Debt the calls never touched still carries interest up to now.
            tx.accrue_account(account)?;
            let values = solvency::ensure_solvent(&tx.state, account, tx.config)?;
            let at = tx.at();
            tx.emit(LedgerEvent::BatchExecuted {
                batch_id,
                account: account.clone(),
                calls: calls.len(),
                at,
            });
            Ok((outcomes, values))
        });

        match result {
            Ok((outcomes, values)) => {
                info!(
                    %batch_id,
                    %account,
                    calls = calls.len(),
                    collateral = %values.collateral,
                    debt = %values.debt,
                    "batch committed"
                );
                Ok(BatchReceipt {
                    batch_id,
                    account: account.clone(),
                    timestamp: now,
                    outcomes,
                    values,
                })
            }
            Err(e) => {
                warn!(%batch_id, %account, kind = e.kind(), error = %e, "batch reverted");
                Err(e)
            }
        }
    }

    fn single(&mut self, caller: &Address, account: &Address, call: Call) -> Result<CallOutcome, LedgerError> {
        let mut receipt = self.execute_batch(caller, account, std::slice::from_ref(&call))?;
        Ok(receipt.outcomes.pop().unwrap_or(CallOutcome::Done))
    }

    fn moved(outcome: CallOutcome) -> u128 {
        match outcome {
            CallOutcome::Moved { amount } => amount,
            _ => 0,
        }
    }

    // -----------------------------------------------------------------------
    // Single operations
    // -----------------------------------------------------------------------

    /// Deposits tokens from the owner wallet. Returns the amount moved.
    pub fn deposit(
        &mut self,
        caller: &Address,
        account: &Address,
        asset: AssetId,
        amount: Amount,
    ) -> Result<u128, LedgerError> {
        self.single(caller, account, Call::Deposit { asset, amount })
            .map(Self::moved)
    }

    /// Withdraws (or borrows) tokens to the owner wallet.
    pub fn withdraw(
        &mut self,
        caller: &Address,
        account: &Address,
        asset: AssetId,
        amount: Amount,
    ) -> Result<u128, LedgerError> {
        self.single(caller, account, Call::Withdraw { asset, amount })
            .map(Self::moved)
    }

    /// Moves value from `from` to `to`.
    pub fn transfer(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        asset: AssetId,
        amount: Amount,
    ) -> Result<u128, LedgerError> {
        let call = Call::Transfer {
            to: to.clone(),
            asset,
            amount,
        };
        self.single(caller, from, call).map(Self::moved)
    }

    /// Pulls an NFT from the owner wallet into custody and records it as
    /// collateral of `account`.
    pub fn deposit_nft(&mut self, caller: &Address, account: &Address, nft: NftId) -> Result<(), LedgerError> {
        self.single(caller, account, Call::DepositNft { nft })?;
        Ok(())
    }

    /// Returns a held NFT to the owner wallet. Fails with `NotNftOwner`
    /// unless `account` currently holds it.
    pub fn withdraw_nft(&mut self, caller: &Address, account: &Address, nft: NftId) -> Result<(), LedgerError> {
        self.single(caller, account, Call::WithdrawNft { nft })?;
        Ok(())
    }

    /// Moves a held NFT between two ledger accounts without touching
    /// custody.
    pub fn transfer_nft(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        nft: NftId,
    ) -> Result<(), LedgerError> {
        self.single(caller, from, Call::TransferNft { to: to.clone(), nft })?;
        Ok(())
    }

    /// Liquidates `target` into `liquidator`, an account owned by `caller`.
    pub fn liquidate(
        &mut self,
        caller: &Address,
        liquidator: &Address,
        target: &Address,
    ) -> Result<LiquidationReport, LedgerError> {
        let outcome = self.single(
            caller,
            liquidator,
            Call::Liquidate {
                target: target.clone(),
            },
        )?;
        match outcome {
            CallOutcome::Liquidated(report) => Ok(report),
            _ => unreachable!("a liquidate call settles with a liquidation report"),
        }
    }

    /// Records how much of `asset` the account withholds from lending.
    pub fn set_lending_election(
        &mut self,
        caller: &Address,
        account: &Address,
        asset: AssetId,
        no_lend_amount: u128,
    ) -> Result<(), LedgerError> {
        self.single(
            caller,
            account,
            Call::SetLendingElection {
                asset,
                no_lend_amount,
            },
        )?;
        Ok(())
    }

    /// Records the strategy a liquidator is expected to use on `account`.
    /// `None` clears it.
    pub fn set_liquidation_strategy(
        &mut self,
        caller: &Address,
        account: &Address,
        strategy: Option<Address>,
    ) -> Result<(), LedgerError> {
        self.single(caller, account, Call::SetLiquidationStrategy { strategy })?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Signed token balance: positive is collateral, negative is debt.
    ///
    /// Reads committed indices; interest since the last touch is not
    /// included.
    pub fn balance_of(&self, asset: AssetId, account: &Address) -> Result<i128, LedgerError> {
        self.state.balance_of(asset, account)
    }

    /// Risk-adjusted totals for `account`.
    pub fn risk_adjusted_position_values(&self, account: &Address) -> Result<PositionValues, LedgerError> {
        valuation::risk_adjusted_position_values(&self.state.registry, self.state.account(account)?)
    }

    /// Per-position breakdown behind [`Self::risk_adjusted_position_values`].
    pub fn valuation(&self, account: &Address) -> Result<Valuation, LedgerError> {
        valuation::value_account(&self.state.registry, self.state.account(account)?)
    }

    /// Whether `account` would pass the solvency guard right now.
    pub fn is_liquid(&self, account: &Address) -> Result<bool, LedgerError> {
        solvency::is_liquid(&self.state, account, &self.config)
    }

    /// NFTs held by `account`.
    pub fn held_nfts(&self, account: &Address) -> Result<Vec<NftId>, LedgerError> {
        Ok(self.state.account(account)?.nfts().iter().copied().collect())
    }

    /// Owner of `account`.
    pub fn owner_of(&self, account: &Address) -> Result<Address, LedgerError> {
        Ok(self.state.account(account)?.owner().clone())
    }

    /// Registry entry and pool state of one asset.
    pub fn asset_info(&self, asset: AssetId) -> Result<AssetInfo, LedgerError> {
        Ok(self.state.registry.info(asset)?)
    }

    /// Snapshot of every registered asset.
    pub fn assets(&self) -> Result<Vec<AssetInfo>, LedgerError> {
        self.state
            .registry
            .iter()
            .map(|a| self.asset_info(a.id))
            .collect()
    }

    /// `debt / collateral` of a fungible pool.
    pub fn utilization(&self, asset: AssetId) -> Result<Wad, LedgerError> {
        Ok(self.state.registry.fungible(asset)?.pool.utilization()?)
    }

    /// Yearly borrow rate at the pool's current utilization.
    pub fn borrow_rate(&self, asset: AssetId) -> Result<Wad, LedgerError> {
        let fungible = self.state.registry.fungible(asset)?;
        Ok(fungible.curve.borrow_rate(fungible.pool.utilization()?)?)
    }

    /// Amount of `asset` that `account` withholds from lending.
    pub fn lending_election(&self, account: &Address, asset: AssetId) -> Result<u128, LedgerError> {
        self.state.registry.fungible(asset)?;
        Ok(self.state.account(account)?.lending_election(asset))
    }

    /// Strategy recorded by [`Self::set_liquidation_strategy`].
    pub fn liquidation_strategy(&self, account: &Address) -> Result<Option<Address>, LedgerError> {
        Ok(self.state.account(account)?.liquidation_strategy().cloned())
    }

    /// Whether a signed batch already consumed `nonce` for `account`.
    pub fn nonce_used(&self, account: &Address, nonce: u64) -> bool {
        self.state.nonce_used(account, nonce)
    }

    /// Number of open accounts.
    pub fn account_count(&self) -> usize {
        self.state.account_count()
    }

    /// Drains the committed event log.
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::BatchAuthorization;
    use crate::crypto::Keypair;
    use crate::external::{
        Ed25519AuthProvider, FixedPriceOracle, FungibleToken, InMemoryToken, ManualClock, PauseFlag,
    };

    struct Harness {
        ledger: CreditLedger,
        token: Arc<InMemoryToken>,
        pause: Arc<PauseFlag>,
        clock: Arc<ManualClock>,
        usdc: AssetId,
        alice: Address,
        acct: Address,
    }

    fn harness() -> Harness {
        let token = Arc::new(InMemoryToken::new());
        let pause = Arc::new(PauseFlag::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let env = Environment {
            custody: Address::new("custody"),
            pause: pause.clone(),
            clock: clock.clone(),
            auth: Arc::new(Ed25519AuthProvider::new()),
        };
        let mut ledger =
            CreditLedger::new(Config::default(), TokenStorageConfig::default(), env).unwrap();
        let usdc = ledger
            .register_fungible(FungibleParams {
                symbol: "USDC".into(),
                token: token.clone(),
                oracle: Arc::new(FixedPriceOracle::new(Wad::ONE)),
                risk: RiskParams {
                    collateral_factor: Wad::from_percent(90),
                    borrow_factor: Some(Wad::ONE),
                },
                curve: RateCurve::default(),
            })
            .unwrap();
        let alice = Address::new("alice");
        let acct = Address::new("acct:alice");
        ledger.open_account(acct.clone(), alice.clone()).unwrap();
        token.mint(&alice, 10_000);
        Harness {
            ledger,
            token,
            pause,
            clock,
            usdc,
            alice,
            acct,
        }
    }

    #[test]
    fn new_opens_treasury() {
        let h = harness();
        let treasury = h.ledger.config().treasury_account.clone();
        assert_eq!(h.ledger.owner_of(&treasury).unwrap(), treasury);
    }

    #[test]
    fn deposit_then_withdraw() {
        let mut h = harness();
        let n = h
            .ledger
            .deposit(&h.alice, &h.acct, h.usdc, Amount::Exact(4_000))
            .unwrap();
        assert_eq!(n, 4_000);
        assert_eq!(h.ledger.balance_of(h.usdc, &h.acct).unwrap(), 4_000);
        assert_eq!(h.token.balance_of(&h.alice), 6_000);

        let back = h.ledger.withdraw(&h.alice, &h.acct, h.usdc, Amount::Max).unwrap();
        assert_eq!(back, 4_000);
        assert_eq!(h.token.balance_of(&h.alice), 10_000);
        assert_eq!(h.ledger.balance_of(h.usdc, &h.acct).unwrap(), 0);
    }

    #[test]
    fn only_owner_runs_batches() {
        let mut h = harness();
        let err = h
            .ledger
            .deposit(&Address::new("mallory"), &h.acct, h.usdc, Amount::Exact(1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized { .. }));
    }

    #[test]
    fn paused_ledger_rejects_batches() {
        let mut h = harness();
        h.pause.set(true);
        let err = h
            .ledger
            .deposit(&h.alice, &h.acct, h.usdc, Amount::Exact(1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Paused));
        assert_eq!(h.token.balance_of(&h.alice), 10_000);
    }

    #[test]
    fn insolvent_batch_reverts_external_transfers() {
        let mut h = harness();
        // Fill custody from someone else so the reserve check is not what fails.
        let bob = Address::new("bob");
        let bob_acct = Address::new("acct:bob");
        h.ledger.open_account(bob_acct.clone(), bob.clone()).unwrap();
        h.token.mint(&bob, 50_000);
        h.ledger
            .deposit(&bob, &bob_acct, h.usdc, Amount::Exact(50_000))
            .unwrap();
        h.ledger.take_events();

        let calls = [
            Call::Deposit {
                asset: h.usdc,
                amount: Amount::Exact(1_000),
            },
            Call::Withdraw {
                asset: h.usdc,
                amount: Amount::Exact(5_000),
            },
        ];
        let err = h.ledger.execute_batch(&h.alice, &h.acct, &calls).unwrap_err();
        assert!(matches!(err, LedgerError::Insolvent { .. }));
        assert_eq!(h.token.balance_of(&h.alice), 10_000);
        assert_eq!(h.ledger.balance_of(h.usdc, &h.acct).unwrap(), 0);
        assert!(h.ledger.take_events().is_empty());
    }

    #[test]
    fn committed_batch_emits_events() {
        let mut h = harness();
        h.ledger.take_events();
        let receipt = h
            .ledger
            .execute_batch(
                &h.alice,
                &h.acct,
                &[Call::Deposit {
                    asset: h.usdc,
                    amount: Amount::Exact(100),
                }],
            )
            .unwrap();
        let events = h.ledger.take_events();
        let names: Vec<_> = events.iter().map(LedgerEvent::name).collect();
        assert_eq!(names, vec!["deposited", "batch_executed"]);
        assert_eq!(receipt.outcomes, vec![CallOutcome::Moved { amount: 100 }]);
        assert_eq!(receipt.values.collateral, Wad::from_int(90).unwrap());
    }

    #[test]
    fn signed_batch_checks_deadline_nonce_and_key() {
        let mut h = harness();
        let kp = Keypair::from_seed(&[9u8; 32]);
        let auth = Arc::new(Ed25519AuthProvider::new());
        auth.register(h.alice.clone(), kp.public_key());
        h.ledger.env.auth = auth;

        let authorization = |nonce, deadline| BatchAuthorization {
            account: h.acct.clone(),
            calls: vec![Call::Deposit {
                asset: h.usdc,
                amount: Amount::Exact(10),
            }],
            nonce,
            deadline,
        };

        let signed = authorization(1, 2_000).sign(&kp).unwrap();
        h.ledger.execute_signed_batch(&signed).unwrap();
        assert!(h.ledger.nonce_used(&h.acct, 1));
        assert!(matches!(
            h.ledger.execute_signed_batch(&signed),
            Err(LedgerError::NonceAlreadyUsed { nonce: 1, .. })
        ));

        let stranger = Keypair::from_seed(&[1u8; 32]);
        let forged = authorization(2, 2_000).sign(&stranger).unwrap();
        assert!(matches!(
            h.ledger.execute_signed_batch(&forged),
            Err(LedgerError::Auth(_))
        ));

        h.clock.set(2_001);
        let late = authorization(3, 2_000).sign(&kp).unwrap();
        assert!(matches!(
            h.ledger.execute_signed_batch(&late),
            Err(LedgerError::DeadlineExpired { .. })
        ));
        assert!(!h.ledger.nonce_used(&h.acct, 3));
    }

    #[test]
    fn rate_curve_change_accrues_first() {
        let mut h = harness();
        h.ledger.take_events();
        h.clock.advance(crate::config::SECONDS_PER_YEAR);
        h.ledger.set_rate_curve(h.usdc, RateCurve::default()).unwrap();

        let pool = &h.ledger.state().registry().fungible(h.usdc).unwrap().pool;
        assert_eq!(pool.last_accrual, 1_000 + crate::config::SECONDS_PER_YEAR);
        let events = h.ledger.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "interest_accrued");
    }

    #[test]
    fn paused_rate_curve_change_skips_accrual() {
        let mut h = harness();
        h.pause.set(true);
        h.clock.advance(60);
        let curve = RateCurve {
            base_rate: Wad::from_percent(1),
            ..RateCurve::default()
        };
        h.ledger.set_rate_curve(h.usdc, curve).unwrap();
        let fungible = h.ledger.state().registry().fungible(h.usdc).unwrap();
        assert_eq!(fungible.pool.last_accrual, 1_000);
        assert_eq!(fungible.curve, curve);
    }

    #[test]
    fn set_config_opens_new_treasury() {
        let mut h = harness();
        let config = Config {
            treasury_account: Address::new("treasury:v2"),
            ..Config::default()
        };
        h.ledger.set_config(config).unwrap();
        assert!(h.ledger.owner_of(&Address::new("treasury:v2")).is_ok());
    }
}
