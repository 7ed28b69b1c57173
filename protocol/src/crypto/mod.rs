//! # Cryptographic Primitives
//!
//! Everything that authenticates a batch flows through here: Ed25519 keys
//! for signing batch authorizations and BLAKE3 for digesting them.
//!
//! Nothing here is novel. Both are thin, type-safe wrappers around audited
//! implementations (`ed25519-dalek` and `blake3`). If you're tempted to
//! optimize these functions, please reconsider.

pub mod hash;
pub mod keys;

pub use hash::{blake3_hash, canonical_digest, DigestError};
pub use keys::{KeyError, Keypair, PublicKey, Signature};
