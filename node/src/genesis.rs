//! # Genesis
//!
//! The node's starting state, read from a JSON file: assets with their
//! prices and risk parameters, NFT collections, wallet balances, credit
//! accounts, and the Ed25519 keys that may sign batches for each owner.
//!
//! Prices are served by in-memory [`FixedPriceOracle`]s that stay reachable
//! after boot, so operators can move them through the admin API.
//!
//! ```json
//! {
//!   "assets": [{ "symbol": "USDC", "price": "1", "collateral_factor": "0.9",
//!                "borrow_factor": "1", "balances": [{ "holder": "alice", "amount": "100000" }] }],
//!   "accounts": [{ "address": "acct:alice", "owner": "alice" }],
//!   "signers": [{ "owner": "alice", "public_key": "<hex>" }]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use tessera_protocol::config::{Config, TokenStorageConfig, DEFAULT_CUSTODY_ADDRESS};
use tessera_protocol::crypto::{Keypair, PublicKey};
use tessera_protocol::external::{
    BundleAssessor, Clock, Ed25519AuthProvider, FixedPriceOracle, InMemoryCollection,
    InMemoryToken, PauseFlag, UnderlyingPosition,
};
use tessera_protocol::interest::RateCurve;
use tessera_protocol::registry::{CollectionParams, FungibleParams, RiskParams};
use tessera_protocol::types::u128_string;
use tessera_protocol::{Address, AssetId, CreditLedger, Environment, Wad};

/// Devnet owners and the seeds their keys derive from. Never use outside
/// a devnet.
pub const DEVNET_SIGNERS: [(&str, u8); 2] = [("alice", 1), ("bob", 2)];

/// Complete genesis document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genesis {
    /// Custody address for deposited tokens and NFTs.
    #[serde(default = "default_custody")]
    pub custody: Address,
    /// Ledger configuration.
    #[serde(default)]
    pub config: Config,
    /// Token storage limits.
    #[serde(default)]
    pub token_storage: TokenStorageConfig,
    /// Fungible assets, registered in order.
    #[serde(default)]
    pub assets: Vec<GenesisAsset>,
    /// NFT collections, registered after the fungible assets.
    #[serde(default)]
    pub collections: Vec<GenesisCollection>,
    /// Credit accounts to open.
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
    /// Owner keys.
    #[serde(default)]
    pub signers: Vec<GenesisSigner>,
}

fn default_custody() -> Address {
    Address::new(DEFAULT_CUSTODY_ADDRESS)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAsset {
    pub symbol: String,
    /// Quote value of one whole token.
    pub price: Wad,
    #[serde(default)]
    pub decimals: u8,
    pub collateral_factor: Wad,
    /// Omit to make the asset collateral-only.
    #[serde(default)]
    pub borrow_factor: Option<Wad>,
    #[serde(default)]
    pub curve: RateCurve,
    /// Initial wallet balances.
    #[serde(default)]
    pub balances: Vec<GenesisBalance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisBalance {
    pub holder: Address,
    #[serde(with = "u128_string")]
    pub amount: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisCollection {
    pub symbol: String,
    /// What each item of the collection is worth, by asset symbol.
    pub bundle: Vec<GenesisBundleItem>,
    /// Items minted to wallets.
    #[serde(default)]
    pub items: Vec<GenesisNft>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisBundleItem {
    pub asset: String,
    #[serde(with = "u128_string")]
    pub amount: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisNft {
    pub owner: Address,
    pub token_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: Address,
    pub owner: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisSigner {
    pub owner: Address,
    pub public_key: PublicKey,
}

/// A ledger built from genesis plus the handles the node keeps driving.
pub struct GenesisLedger {
    pub ledger: CreditLedger,
    /// Oracles by asset, for price updates.
    pub oracles: HashMap<AssetId, Arc<FixedPriceOracle>>,
    /// Protocol pause switch.
    pub pause: Arc<PauseFlag>,
}

impl Genesis {
    /// Reads and parses a genesis file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read genesis file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse genesis file {}", path.display()))
    }

    /// Two stablecoin-and-ether wallets with one collection, signed by the
    /// [`DEVNET_SIGNERS`] keys.
    pub fn devnet() -> Self {
        let wad = |s: &str| s.parse::<Wad>().unwrap_or(Wad::ZERO);
        let mut accounts = Vec::new();
        let mut signers = Vec::new();
        let mut usdc_balances = Vec::new();
        let mut weth_balances = Vec::new();
        let mut items = Vec::new();
        for (i, (owner, seed)) in DEVNET_SIGNERS.iter().enumerate() {
            let owner = Address::new(*owner);
            accounts.push(GenesisAccount {
                address: Address::new(format!("acct:{owner}")),
                owner: owner.clone(),
            });
            signers.push(GenesisSigner {
                owner: owner.clone(),
                public_key: Keypair::from_seed(&[*seed; 32]).public_key(),
            });
            usdc_balances.push(GenesisBalance {
                holder: owner.clone(),
                amount: 1_000_000,
            });
            weth_balances.push(GenesisBalance {
                holder: owner.clone(),
                amount: 100,
            });
            items.push(GenesisNft {
                owner,
                token_id: i as u64 + 1,
            });
        }

        Self {
            custody: default_custody(),
            config: Config::default(),
            token_storage: TokenStorageConfig::default(),
            assets: vec![
                GenesisAsset {
                    symbol: "USDC".into(),
                    price: Wad::ONE,
                    decimals: 0,
                    collateral_factor: wad("0.9"),
                    borrow_factor: Some(Wad::ONE),
                    curve: RateCurve::default(),
                    balances: usdc_balances,
                },
                GenesisAsset {
                    symbol: "WETH".into(),
                    price: wad("2000"),
                    decimals: 0,
                    collateral_factor: wad("0.8"),
                    borrow_factor: Some(wad("1.1")),
                    curve: RateCurve::default(),
                    balances: weth_balances,
                },
            ],
            collections: vec![GenesisCollection {
                symbol: "PASS".into(),
                bundle: vec![GenesisBundleItem {
                    asset: "USDC".into(),
                    amount: 500,
                }],
                items,
            }],
            accounts,
            signers,
        }
    }

    /// Builds the ledger. Registrations happen at the clock's current time.
    pub fn build(self, clock: Arc<dyn Clock>) -> Result<GenesisLedger> {
        let pause = Arc::new(PauseFlag::new());
        let auth = Arc::new(Ed25519AuthProvider::new());
        for signer in &self.signers {
            auth.register(signer.owner.clone(), signer.public_key);
        }
        let env = Environment {
            custody: self.custody.clone(),
            pause: pause.clone(),
            clock,
            auth,
        };
        let mut ledger = CreditLedger::new(self.config, self.token_storage, env)
            .context("invalid ledger configuration")?;

        let mut by_symbol = HashMap::new();
        let mut oracles = HashMap::new();
        for asset in self.assets {
            let token = Arc::new(InMemoryToken::new());
            for balance in &asset.balances {
                token.mint(&balance.holder, balance.amount);
            }
            let oracle = Arc::new(FixedPriceOracle::with_decimals(asset.price, asset.decimals));
            let id = ledger
                .register_fungible(FungibleParams {
                    symbol: asset.symbol.clone(),
                    token,
                    oracle: oracle.clone(),
                    risk: RiskParams {
                        collateral_factor: asset.collateral_factor,
                        borrow_factor: asset.borrow_factor,
                    },
                    curve: asset.curve,
                })
                .with_context(|| format!("failed to register asset {}", asset.symbol))?;
            if by_symbol.insert(asset.symbol.clone(), id).is_some() {
                bail!("duplicate asset symbol {}", asset.symbol);
            }
            oracles.insert(id, oracle);
        }

        for collection in self.collections {
            let mut bundle = Vec::with_capacity(collection.bundle.len());
            for item in &collection.bundle {
                let Some(asset) = by_symbol.get(&item.asset) else {
                    bail!(
                        "collection {} references unknown asset {}",
                        collection.symbol,
                        item.asset
                    );
                };
                bundle.push(UnderlyingPosition {
                    asset: *asset,
                    amount: item.amount,
                });
            }
            let nft = Arc::new(InMemoryCollection::new());
            for item in &collection.items {
                nft.mint(&item.owner, item.token_id);
            }
            ledger
                .register_collection(CollectionParams {
                    symbol: collection.symbol.clone(),
                    collection: nft,
                    assessor: Arc::new(BundleAssessor::uniform(bundle)),
                })
                .with_context(|| format!("failed to register collection {}", collection.symbol))?;
        }

        for account in self.accounts {
            ledger
                .open_account(account.address.clone(), account.owner)
                .with_context(|| format!("failed to open account {}", account.address))?;
        }

        tracing::info!(
            assets = by_symbol.len(),
            accounts = ledger.account_count(),
            "genesis applied"
        );
        Ok(GenesisLedger {
            ledger,
            oracles,
            pause,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_protocol::external::ManualClock;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::new(1_700_000_000))
    }

    #[test]
    fn devnet_builds() {
        let built = Genesis::devnet().build(clock()).unwrap();
        assert_eq!(built.oracles.len(), 2);
        // Two owners plus the treasury.
        assert_eq!(built.ledger.account_count(), 3);
        assert_eq!(built.ledger.assets().unwrap().len(), 3);
    }

    #[test]
    fn genesis_round_trips_through_json() {
        let json = serde_json::to_string(&Genesis::devnet()).unwrap();
        let parsed: Genesis = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.assets.len(), 2);
        assert_eq!(parsed.signers[0].public_key, Genesis::devnet().signers[0].public_key);
    }

    #[test]
    fn minimal_file_uses_defaults() {
        let parsed: Genesis = serde_json::from_str(
            r#"{ "assets": [{ "symbol": "DAI", "price": "1", "collateral_factor": "0.75" }] }"#,
        )
        .unwrap();
        assert_eq!(parsed.custody, Address::new(DEFAULT_CUSTODY_ADDRESS));
        assert_eq!(parsed.config, Config::default());
        assert!(parsed.assets[0].borrow_factor.is_none());
        parsed.build(clock()).unwrap();
    }

    #[test]
    fn unknown_bundle_asset_is_rejected() {
        let mut genesis = Genesis::devnet();
        genesis.collections[0].bundle[0].asset = "NOPE".into();
        let err = genesis.build(clock()).err().unwrap();
        assert!(err.to_string().contains("unknown asset NOPE"));
    }
}
