//! # Asset Registry
//!
//! Every asset the ledger knows about, indexed by a small sequential
//! [`AssetId`]. Fungible tokens and NFT collections share the id space.
//!
//! Registration is append-only: ids are never reused and assets are never
//! removed. Risk parameters and rate curves can be changed afterwards;
//! token, oracle, collection and assessor handles cannot.
//!
//! ## Risk parameters
//!
//! - `collateral_factor` in `[0, 1)`: haircut applied to positive balances.
//! - `borrow_factor`: markup `>= 1` applied to debt, or `None` for an asset
//!   that may not be borrowed at all.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::ConfigError;
use crate::external::{FungibleToken, NftAssessor, NonFungibleToken, PriceOracle};
use crate::interest::{PoolState, RateCurve};
use crate::math::{MathError, Wad};
use crate::types::{AssetClass, AssetId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Registry lookups and updates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No asset with this id.
    #[error("unknown asset {0}")]
    UnknownAsset(AssetId),

    /// No NFT collection with this id.
    #[error("unknown collection {0}")]
    UnknownCollection(AssetId),

    /// The asset exists but is of the other class.
    #[error("{asset} is not {expected:?}")]
    WrongAssetClass {
        /// The asset.
        asset: AssetId,
        /// The class the caller needed.
        expected: AssetClass,
    },

    /// Parameters rejected.
    #[error("invalid asset parameters: {0}")]
    InvalidParams(#[from] ConfigError),

    /// All `u16` ids are taken.
    #[error("asset id space exhausted")]
    Full,
}

// ---------------------------------------------------------------------------
// Asset types
// ---------------------------------------------------------------------------

/// Collateral and borrow factors of a fungible asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskParams {
    /// Haircut on positive balances, in `[0, 1)`.
    pub collateral_factor: Wad,
    /// Markup on debt (`>= 1`); `None` forbids borrowing.
    pub borrow_factor: Option<Wad>,
}

impl RiskParams {
    /// Range checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collateral_factor >= Wad::ONE {
            return Err(ConfigError::FractionTooLarge {
                name: "collateral_factor",
                value: self.collateral_factor,
            });
        }
        if let Some(bf) = self.borrow_factor {
            if bf < Wad::ONE {
                return Err(ConfigError::BorrowFactorBelowOne(bf));
            }
        }
        Ok(())
    }
}

/// Registration request for a fungible asset.
#[derive(Clone)]
pub struct FungibleParams {
    /// Ticker.
    pub symbol: String,
    /// External token contract.
    pub token: Arc<dyn FungibleToken>,
    /// Price feed.
    pub oracle: Arc<dyn PriceOracle>,
    /// Collateral and borrow factors.
    pub risk: RiskParams,
    /// Borrow-rate curve.
    pub curve: RateCurve,
}

/// Registration request for an NFT collection.
#[derive(Clone)]
pub struct CollectionParams {
    /// Ticker.
    pub symbol: String,
    /// External collection contract.
    pub collection: Arc<dyn NonFungibleToken>,
    /// Maps items to underlying fungible positions.
    pub assessor: Arc<dyn NftAssessor>,
}

/// A registered fungible asset and its interest pool.
#[derive(Clone)]
pub struct FungibleAsset {
    /// Ticker.
    pub symbol: String,
    /// External token contract.
    pub token: Arc<dyn FungibleToken>,
    /// Price feed.
    pub oracle: Arc<dyn PriceOracle>,
    /// Current risk parameters.
    pub risk: RiskParams,
    /// Current rate curve.
    pub curve: RateCurve,
    /// Share totals and indices.
    pub pool: PoolState,
}

/// A registered NFT collection.
#[derive(Clone)]
pub struct CollectionAsset {
    /// Ticker.
    pub symbol: String,
    /// External collection contract.
    pub collection: Arc<dyn NonFungibleToken>,
    /// Maps items to underlying fungible positions.
    pub assessor: Arc<dyn NftAssessor>,
}

/// Class-specific data of a registered asset.
#[derive(Clone)]
pub enum AssetKind {
    /// Divisible token.
    Fungible(FungibleAsset),
    /// NFT collection.
    NonFungible(CollectionAsset),
}

/// A registered asset.
#[derive(Clone)]
pub struct Asset {
    /// Immutable id.
    pub id: AssetId,
    /// Class-specific data.
    pub kind: AssetKind,
}

impl Asset {
    /// Fungible or non-fungible.
    pub fn class(&self) -> AssetClass {
        match self.kind {
            AssetKind::Fungible(_) => AssetClass::Fungible,
            AssetKind::NonFungible(_) => AssetClass::NonFungible,
        }
    }

    /// Ticker.
    pub fn symbol(&self) -> &str {
        match &self.kind {
            AssetKind::Fungible(f) => &f.symbol,
            AssetKind::NonFungible(c) => &c.symbol,
        }
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Asset");
        s.field("id", &self.id).field("symbol", &self.symbol());
        if let AssetKind::Fungible(fa) = &self.kind {
            s.field("risk", &fa.risk).field("pool", &fa.pool);
        }
        s.finish_non_exhaustive()
    }
}

/// Serializable snapshot of a registered asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Id.
    pub id: AssetId,
    /// Ticker.
    pub symbol: String,
    /// Class.
    pub class: AssetClass,
    /// Pool data, for fungible assets only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fungible: Option<FungibleInfo>,
}

/// Pool snapshot of a fungible asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FungibleInfo {
    /// Risk parameters.
    pub risk: RiskParams,
    /// Rate curve.
    pub curve: RateCurve,
    /// Raw pool state.
    pub pool: PoolState,
    /// Total supplied amount.
    #[serde(with = "crate::types::u128_string")]
    pub total_collateral: u128,
    /// Total borrowed amount.
    #[serde(with = "crate::types::u128_string")]
    pub total_debt: u128,
    /// Current utilization.
    pub utilization: Wad,
    /// Current yearly borrow rate.
    pub borrow_rate: Wad,
}

// ---------------------------------------------------------------------------
// AssetRegistry
// ---------------------------------------------------------------------------

/// Append-only list of assets; the position in the list is the id.
#[derive(Clone, Default)]
pub struct AssetRegistry {
    assets: Vec<Asset>,
}

impl AssetRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// `true` before the first registration.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// All assets in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter()
    }

    fn next_id(&self) -> Result<AssetId, RegistryError> {
        u16::try_from(self.assets.len())
            .map(AssetId)
            .map_err(|_| RegistryError::Full)
    }

    /// Registers a fungible asset whose pool starts accruing at `now`.
    pub fn register_fungible(
        &mut self,
        params: FungibleParams,
        now: u64,
    ) -> Result<AssetId, RegistryError> {
        params.risk.validate()?;
        params.curve.validate()?;
        let id = self.next_id()?;
        info!(
            asset = %id,
            symbol = %params.symbol,
            collateral_factor = %params.risk.collateral_factor,
            "registered fungible asset"
        );
        self.assets.push(Asset {
            id,
            kind: AssetKind::Fungible(FungibleAsset {
                symbol: params.symbol,
                token: params.token,
                oracle: params.oracle,
                risk: params.risk,
                curve: params.curve,
                pool: PoolState::new(now),
            }),
        });
        Ok(id)
    }

    /// Registers an NFT collection.
    pub fn register_collection(&mut self, params: CollectionParams) -> Result<AssetId, RegistryError> {
        let id = self.next_id()?;
        info!(asset = %id, symbol = %params.symbol, "registered nft collection");
        self.assets.push(Asset {
            id,
            kind: AssetKind::NonFungible(CollectionAsset {
                symbol: params.symbol,
                collection: params.collection,
                assessor: params.assessor,
            }),
        });
        Ok(id)
    }

    /// Looks up any asset.
    pub fn get(&self, id: AssetId) -> Result<&Asset, RegistryError> {
        self.assets
            .get(id.0 as usize)
            .ok_or(RegistryError::UnknownAsset(id))
    }

    /// Looks up a fungible asset.
    pub fn fungible(&self, id: AssetId) -> Result<&FungibleAsset, RegistryError> {
        match &self.get(id)?.kind {
            AssetKind::Fungible(f) => Ok(f),
            AssetKind::NonFungible(_) => Err(RegistryError::WrongAssetClass {
                asset: id,
                expected: AssetClass::Fungible,
            }),
        }
    }

    /// Mutable lookup of a fungible asset.
    pub fn fungible_mut(&mut self, id: AssetId) -> Result<&mut FungibleAsset, RegistryError> {
        match self.assets.get_mut(id.0 as usize).map(|a| &mut a.kind) {
            Some(AssetKind::Fungible(f)) => Ok(f),
            Some(AssetKind::NonFungible(_)) => Err(RegistryError::WrongAssetClass {
                asset: id,
                expected: AssetClass::Fungible,
            }),
            None => Err(RegistryError::UnknownAsset(id)),
        }
    }

    /// Looks up an NFT collection.
    pub fn collection(&self, id: AssetId) -> Result<&CollectionAsset, RegistryError> {
        match self.assets.get(id.0 as usize).map(|a| &a.kind) {
            Some(AssetKind::NonFungible(c)) => Ok(c),
            _ => Err(RegistryError::UnknownCollection(id)),
        }
    }

    /// Replaces the risk parameters of a fungible asset.
    pub fn set_risk_params(&mut self, id: AssetId, risk: RiskParams) -> Result<(), RegistryError> {
        risk.validate()?;
        let asset = self.fungible_mut(id)?;
        asset.risk = risk;
        info!(asset = %id, collateral_factor = %risk.collateral_factor, "risk parameters updated");
        Ok(())
    }

    /// Replaces the rate curve of a fungible asset. Callers accrue first so
    /// elapsed time is charged at the old curve.
    pub fn set_rate_curve(&mut self, id: AssetId, curve: RateCurve) -> Result<(), RegistryError> {
        curve.validate()?;
        self.fungible_mut(id)?.curve = curve;
        info!(asset = %id, "rate curve updated");
        Ok(())
    }

    /// Serializable snapshot of one asset.
    pub fn info(&self, id: AssetId) -> Result<AssetInfo, InfoError> {
        let asset = self.get(id)?;
        let fungible = match &asset.kind {
            AssetKind::Fungible(f) => {
                let utilization = f.pool.utilization()?;
                Some(FungibleInfo {
                    risk: f.risk,
                    curve: f.curve,
                    pool: f.pool.clone(),
                    total_collateral: f.pool.total_collateral_amount()?,
                    total_debt: f.pool.total_debt_amount()?,
                    utilization,
                    borrow_rate: f.curve.borrow_rate(utilization)?,
                })
            }
            AssetKind::NonFungible(_) => None,
        };
        Ok(AssetInfo {
            id,
            symbol: asset.symbol().to_string(),
            class: asset.class(),
            fungible,
        })
    }
}

/// Failure building an [`AssetInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InfoError {
    /// Lookup failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Pool arithmetic failed.
    #[error(transparent)]
    Math(#[from] MathError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{BundleAssessor, FixedPriceOracle, InMemoryCollection, InMemoryToken};

    fn fungible(symbol: &str, cf: u8, bf: Option<u8>) -> FungibleParams {
        FungibleParams {
            symbol: symbol.to_string(),
            token: Arc::new(InMemoryToken::new()),
            oracle: Arc::new(FixedPriceOracle::new(Wad::ONE)),
            risk: RiskParams {
                collateral_factor: Wad::from_percent(cf),
                borrow_factor: bf.map(|b| Wad::from_percent(b)),
            },
            curve: RateCurve::default(),
        }
    }

    fn collection() -> CollectionParams {
        CollectionParams {
            symbol: "LP".to_string(),
            collection: Arc::new(InMemoryCollection::new()),
            assessor: Arc::new(BundleAssessor::new()),
        }
    }

    #[test]
    fn ids_are_sequential_across_classes() {
        let mut reg = AssetRegistry::new();
        assert_eq!(reg.register_fungible(fungible("USDC", 90, Some(100)), 0).unwrap(), AssetId(0));
        assert_eq!(reg.register_collection(collection()).unwrap(), AssetId(1));
        assert_eq!(reg.register_fungible(fungible("WETH", 80, Some(110)), 0).unwrap(), AssetId(2));
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn class_mismatch_is_reported() {
        let mut reg = AssetRegistry::new();
        let usdc = reg.register_fungible(fungible("USDC", 90, Some(100)), 0).unwrap();
        let lp = reg.register_collection(collection()).unwrap();
        assert!(matches!(
            reg.fungible(lp),
            Err(RegistryError::WrongAssetClass { expected: AssetClass::Fungible, .. })
        ));
        assert_eq!(reg.collection(usdc).err(), Some(RegistryError::UnknownCollection(usdc)));
        assert_eq!(reg.get(AssetId(9)).err().map(|e| e.to_string()), Some("unknown asset asset#9".into()));
    }

    #[test]
    fn invalid_risk_params_are_rejected() {
        let mut reg = AssetRegistry::new();
        assert!(reg.register_fungible(fungible("BAD", 100, Some(100)), 0).is_err());
        assert!(reg.register_fungible(fungible("BAD", 50, Some(90)), 0).is_err());
        assert!(reg.is_empty());
        assert!(reg.register_fungible(fungible("NOBORROW", 50, None), 0).is_ok());
    }

    #[test]
    fn risk_params_can_be_updated() {
        let mut reg = AssetRegistry::new();
        let id = reg.register_fungible(fungible("USDC", 90, Some(100)), 0).unwrap();
        let risk = RiskParams {
            collateral_factor: Wad::from_percent(50),
            borrow_factor: None,
        };
        reg.set_risk_params(id, risk).unwrap();
        assert_eq!(reg.fungible(id).unwrap().risk, risk);
    }

    #[test]
    fn info_reports_pool() {
        let mut reg = AssetRegistry::new();
        let id = reg.register_fungible(fungible("USDC", 90, Some(100)), 42).unwrap();
        let info = reg.info(id).unwrap();
        assert_eq!(info.class, AssetClass::Fungible);
        let f = info.fungible.unwrap();
        assert_eq!(f.pool.last_accrual, 42);
        assert_eq!(f.utilization, Wad::ZERO);
        assert_eq!(f.total_debt, 0);
    }
}
