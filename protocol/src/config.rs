//! # Protocol Configuration & Constants
//!
//! Every magic number in Tessera lives here, next to the two runtime
//! configuration records governance can change: [`Config`] (treasury,
//! liquidation and reserve parameters) and [`TokenStorageConfig`] (how many
//! positions a single credit account may carry).
//!
//! Both records are validated before they are accepted. A config that
//! would let the ledger divide by zero or hand out more than 100% of an
//! account's value is rejected up front, not discovered mid-liquidation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::Wad;
use crate::types::Address;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full version string.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Seconds per year used to convert yearly rates into per-second growth.
/// 365 days, no leap years. Interest curves are quoted against this.
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

// ---------------------------------------------------------------------------
// Solvency Check Cost Model
// ---------------------------------------------------------------------------

/// Estimated cost of valuing one nonzero fungible balance (one oracle call).
pub const FUNGIBLE_VALUATION_COST: u64 = 20_000;

/// Estimated cost of valuing one NFT (assessor call plus underlying oracle
/// calls). NFTs are more expensive because one token can decompose into
/// several underlying positions.
pub const NFT_VALUATION_COST: u64 = 50_000;

/// Default ceiling for a single solvency check.
pub const DEFAULT_MAX_SOLVENCY_CHECK_COST: u64 = 5_000_000;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default treasury account address.
pub const DEFAULT_TREASURY_ACCOUNT: &str = "tessera:treasury";

/// Default address that holds all deposited tokens and NFTs.
pub const DEFAULT_CUSTODY_ADDRESS: &str = "tessera:custody";

/// Default share of interest routed to the treasury, in basis points (5%).
pub const DEFAULT_TREASURY_INTEREST_BPS: u32 = 500;

/// Default liquidation fraction, in basis points (80%).
pub const DEFAULT_LIQ_FRACTION_BPS: u32 = 8_000;

/// Default fractional reserve leverage: total debt may reach 9x custody.
pub const DEFAULT_FRACTIONAL_RESERVE_LEVERAGE: u32 = 9;

/// Default token storage ceiling per account.
pub const DEFAULT_MAX_TOKEN_STORAGE: u32 = 250;

/// Default storage weight of one nonzero fungible balance.
pub const DEFAULT_ERC20_MULTIPLIER: u32 = 5;

/// Default storage weight of one held NFT.
pub const DEFAULT_ERC721_MULTIPLIER: u32 = 2;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A configuration or risk parameter is out of range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A fraction parameter must be strictly below one.
    #[error("{name} must be < 1, got {value}")]
    FractionTooLarge {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: Wad,
    },

    /// A fraction parameter must be at most one.
    #[error("{name} must be <= 1, got {value}")]
    FractionAboveOne {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: Wad,
    },

    /// Borrow factors are markups and must be at least one.
    #[error("borrow factor must be >= 1, got {0}")]
    BorrowFactorBelowOne(Wad),

    /// The utilization kink must lie strictly between 0 and 1.
    #[error("target utilization must be in (0, 1), got {0}")]
    TargetUtilizationOutOfRange(Wad),

    /// A multiplier or ceiling that must be positive was zero.
    #[error("{0} must be positive")]
    ZeroValue(&'static str),
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Global ledger configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Credit account that receives the treasury's cut of interest.
    pub treasury_account: Address,
    /// Fraction of accrued interest routed to the treasury, in `[0, 1]`.
    pub treasury_interest_fraction: Wad,
    /// Upper bound on the estimated cost of one solvency check.
    pub max_solvency_check_cost: u64,
    /// Fraction of a liquidated account's net value preserved for its owner
    /// (further scaled by how deep underwater the account was). `< 1`.
    pub liq_fraction: Wad,
    /// Total debt of an asset may not exceed custody times this factor.
    pub fractional_reserve_leverage: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            treasury_account: Address::new(DEFAULT_TREASURY_ACCOUNT),
            treasury_interest_fraction: Wad::from_bps(DEFAULT_TREASURY_INTEREST_BPS),
            max_solvency_check_cost: DEFAULT_MAX_SOLVENCY_CHECK_COST,
            liq_fraction: Wad::from_bps(DEFAULT_LIQ_FRACTION_BPS),
            fractional_reserve_leverage: DEFAULT_FRACTIONAL_RESERVE_LEVERAGE,
        }
    }
}

impl Config {
    /// Checks every parameter against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.treasury_interest_fraction > Wad::ONE {
            return Err(ConfigError::FractionAboveOne {
                name: "treasury_interest_fraction",
                value: self.treasury_interest_fraction,
            });
        }
        if self.liq_fraction >= Wad::ONE {
            return Err(ConfigError::FractionTooLarge {
                name: "liq_fraction",
                value: self.liq_fraction,
            });
        }
        if self.max_solvency_check_cost == 0 {
            return Err(ConfigError::ZeroValue("max_solvency_check_cost"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TokenStorageConfig
// ---------------------------------------------------------------------------

/// Bounds how many positions one account can carry, which in turn bounds
/// the cost of valuing it.
///
/// `erc20_multiplier * nonzero_fungible + erc721_multiplier * nft_count`
/// must stay `<= max_token_storage`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStorageConfig {
    /// Storage ceiling per account.
    pub max_token_storage: u32,
    /// Weight of one nonzero fungible balance.
    pub erc20_multiplier: u32,
    /// Weight of one held NFT.
    pub erc721_multiplier: u32,
}

impl Default for TokenStorageConfig {
    fn default() -> Self {
        Self {
            max_token_storage: DEFAULT_MAX_TOKEN_STORAGE,
            erc20_multiplier: DEFAULT_ERC20_MULTIPLIER,
            erc721_multiplier: DEFAULT_ERC721_MULTIPLIER,
        }
    }
}

impl TokenStorageConfig {
    /// Checks that the weights are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.erc20_multiplier == 0 {
            return Err(ConfigError::ZeroValue("erc20_multiplier"));
        }
        if self.erc721_multiplier == 0 {
            return Err(ConfigError::ZeroValue("erc721_multiplier"));
        }
        Ok(())
    }

    /// Storage used by an account holding `fungible` nonzero balances and
    /// `nfts` NFTs. Saturates rather than wrapping; a saturated value is
    /// always over any ceiling.
    pub fn usage(&self, fungible: u32, nfts: u32) -> u64 {
        (self.erc20_multiplier as u64)
            .saturating_mul(fungible as u64)
            .saturating_add((self.erc721_multiplier as u64).saturating_mul(nfts as u64))
    }
}

/// Estimated cost of a solvency check over the given position counts.
pub fn solvency_check_cost(fungible: usize, nfts: usize) -> u64 {
    FUNGIBLE_VALUATION_COST
        .saturating_mul(fungible as u64)
        .saturating_add(NFT_VALUATION_COST.saturating_mul(nfts as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
        TokenStorageConfig::default().validate().unwrap();
    }

    #[test]
    fn liq_fraction_of_one_is_rejected() {
        let config = Config {
            liq_fraction: Wad::ONE,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FractionTooLarge { name: "liq_fraction", .. })
        ));
    }

    #[test]
    fn treasury_fraction_may_be_exactly_one() {
        let config = Config {
            treasury_interest_fraction: Wad::ONE,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_multiplier_is_rejected() {
        let storage = TokenStorageConfig {
            erc721_multiplier: 0,
            ..TokenStorageConfig::default()
        };
        assert_eq!(
            storage.validate(),
            Err(ConfigError::ZeroValue("erc721_multiplier"))
        );
    }

    #[test]
    fn storage_usage_is_weighted() {
        let storage = TokenStorageConfig {
            max_token_storage: 10,
            erc20_multiplier: 3,
            erc721_multiplier: 2,
        };
        assert_eq!(storage.usage(2, 2), 10);
    }

    #[test]
    fn check_cost_scales_with_positions() {
        assert_eq!(solvency_check_cost(0, 0), 0);
        assert_eq!(
            solvency_check_cost(2, 1),
            2 * FUNGIBLE_VALUATION_COST + NFT_VALUATION_COST
        );
    }

    #[test]
    fn config_json_roundtrip() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("\"liq_fraction\":\"0.8\""));
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Config::default());
    }
}
