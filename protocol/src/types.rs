//! Core identifier types shared across the ledger.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// An opaque address: a wallet, a credit account, a token contract or the
/// protocol's custody address.
///
/// The ledger never interprets the contents. Equality is byte equality.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wraps any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// Immutable identifier handed out at registration time.
///
/// Fungible assets and NFT collections share the id space; the class is
/// recorded on the registry entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u16);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset#{}", self.0)
    }
}

/// Whether an asset is a fungible token or an NFT collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    /// Divisible token tracked as signed shares.
    Fungible,
    /// Collection whose items are held as a set membership.
    NonFungible,
}

// ---------------------------------------------------------------------------
// NftId
// ---------------------------------------------------------------------------

/// A single NFT: its registered collection and token id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NftId {
    /// Registry id of the collection.
    pub collection: AssetId,
    /// Token id within the collection.
    pub token_id: u64,
}

impl NftId {
    /// Shorthand constructor.
    pub fn new(collection: AssetId, token_id: u64) -> Self {
        Self {
            collection,
            token_id,
        }
    }
}

impl fmt::Display for NftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.token_id)
    }
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A requested amount: exact, or "everything available".
///
/// What `Max` resolves to depends on the operation. Deposits take the full
/// external wallet balance; withdrawals and transfers take only the
/// currently positive ledger balance and never create debt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amount {
    /// Exactly this many token units.
    Exact(#[serde(with = "u128_string")] u128),
    /// Everything available for the operation.
    Max,
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Amount::Exact(value)
    }
}

/// Serializes `u128` as a decimal string so JSON readers that parse numbers
/// as `f64` cannot silently lose precision.
pub mod u128_string {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize.
    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    /// Deserialize.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Same as [`u128_string`] for signed values.
pub mod i128_string {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize.
    pub fn serialize<S: Serializer>(value: &i128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    /// Deserialize.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_serializes_exact_as_string() {
        let json = serde_json::to_string(&Amount::Exact(u128::MAX)).unwrap();
        assert_eq!(json, format!("{{\"exact\":\"{}\"}}", u128::MAX));
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Amount::Exact(u128::MAX));
        assert_eq!(serde_json::to_string(&Amount::Max).unwrap(), "\"max\"");
    }

    #[test]
    fn address_is_transparent_in_json() {
        let a = Address::new("acct:alice");
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"acct:alice\"");
    }

    #[test]
    fn nft_id_display() {
        assert_eq!(NftId::new(AssetId(3), 42).to_string(), "asset#3/42");
    }
}
