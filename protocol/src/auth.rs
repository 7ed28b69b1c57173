//! # Signed Batches
//!
//! Off-band authorization for batches. The account owner signs the BLAKE3
//! digest of a [`BatchAuthorization`] (account, calls, nonce, deadline) with
//! their Ed25519 key; anyone can then submit the resulting [`SignedBatch`].
//!
//! ## Replay protection
//!
//! - `deadline`: checked before anything else. Expired batches are rejected
//!   without touching state.
//! - `nonce`: any `u64`, usable once per account. Nonces are recorded in the
//!   ledger state by the batch itself, so a batch that fails leaves its
//!   nonce unused and can be resubmitted.

use serde::{Deserialize, Serialize};

use crate::batch::Call;
use crate::crypto::{canonical_digest, DigestError, Keypair, Signature};
use crate::types::Address;

/// What the owner signs.
///
/// Field order is part of the signed encoding. Do not reorder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAuthorization {
    /// Credit account the batch runs on.
    pub account: Address,
    /// Calls, in execution order.
    pub calls: Vec<Call>,
    /// Single-use number chosen by the signer.
    pub nonce: u64,
    /// Last second (inclusive) at which the batch may execute.
    pub deadline: u64,
}

impl BatchAuthorization {
    /// BLAKE3 digest of the canonical JSON encoding.
    pub fn digest(&self) -> Result<[u8; 32], DigestError> {
        canonical_digest(self)
    }

    /// Signs the authorization.
    pub fn sign(self, keypair: &Keypair) -> Result<SignedBatch, DigestError> {
        let signature = keypair.sign(&self.digest()?);
        Ok(SignedBatch {
            authorization: self,
            signature,
        })
    }
}

/// An authorization plus the owner's signature over its digest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBatch {
    /// The signed content.
    pub authorization: BatchAuthorization,
    /// Ed25519 signature over [`BatchAuthorization::digest`].
    pub signature: Signature,
}
