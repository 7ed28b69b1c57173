// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tessera Protocol: Core Library
//!
//! Tessera keeps margin credit accounts. An account holds signed balances
//! per asset (positive is collateral, negative is debt) plus a set of NFTs,
//! and every batch of operations must leave it solvent: risk-adjusted
//! collateral at least equal to risk-adjusted debt.
//!
//! ## Architecture
//!
//! - **math**: Checked 18-decimal fixed point. Nothing here wraps.
//! - **registry**: Assets, their risk parameters, rate curves and pools.
//! - **interest**: Kinked rate curve and index accrual.
//! - **ledger**: Accounts, shares, and the batch working copy.
//! - **valuation**: Risk-adjusted collateral and debt via oracles.
//! - **solvency**: The end-of-batch guard and its cost bound.
//! - **liquidation**: Repossession of underwater accounts.
//! - **batch** / **auth**: Call lists, plain and owner-signed.
//! - **engine**: [`CreditLedger`], the facade tying it together.
//! - **external**: Traits for tokens, oracles, clock, pause and signatures,
//!   with in-memory implementations.
//! - **config**: Protocol constants and tunable parameters.
//!
//! ## Ground rules
//!
//! 1. Collateral rounds down, debt rounds up. The ledger never owes more
//!    than it holds.
//! 2. A failed batch leaves no trace: state, events and external transfers
//!    all revert.
//! 3. If it touches money, it has tests.

#![warn(missing_docs)]

pub mod auth;
pub mod batch;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod events;
pub mod external;
pub mod interest;
pub mod ledger;
pub mod liquidation;
pub mod math;
pub mod registry;
pub mod solvency;
pub mod types;
pub mod valuation;

pub use auth::{BatchAuthorization, SignedBatch};
pub use batch::{BatchReceipt, Call, CallOutcome};
pub use config::{Config, TokenStorageConfig};
pub use engine::{CreditLedger, Environment};
pub use error::LedgerError;
pub use events::LedgerEvent;
pub use math::Wad;
pub use types::{Address, Amount, AssetClass, AssetId, NftId};
