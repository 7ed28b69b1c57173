//! # Hashing
//!
//! BLAKE3 is the only hash function in Tessera. It digests the canonical
//! JSON encoding of a batch authorization before that digest is signed.
//!
//! "Canonical" here means `serde_json` output of a struct with a fixed
//! field order and no maps, so signer and verifier always produce the
//! same bytes for the same authorization.

use serde::Serialize;
use thiserror::Error;

/// A value could not be encoded for digesting.
#[derive(Debug, Error)]
#[error("cannot encode value for digest: {0}")]
pub struct DigestError(#[from] serde_json::Error);

/// Compute the BLAKE3 hash of the input data.
///
/// Returns a 32-byte digest. Uses SIMD where the platform supports it.
///
/// # Example
///
/// ```
/// use tessera_protocol::crypto::blake3_hash;
///
/// let hash = blake3_hash(b"tessera");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3 digest of the canonical JSON encoding of `value`.
pub fn canonical_digest<T: Serialize>(value: &T) -> Result<[u8; 32], DigestError> {
    let bytes = serde_json::to_vec(value)?;
    Ok(blake3_hash(&bytes))
}
