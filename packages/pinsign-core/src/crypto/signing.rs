//! # Digital Signatures Module
//!
//! Ed25519 signatures over document digests.
//!
//! ## Signature Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     DIGEST-THEN-SIGN / VERIFY                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  SIGN                                                                  │
//! │    content bytes ──► SHA-256 ──► digest (32 B)                          │
//! │                                     │                                   │
//! │    unwrapped private key ──► Ed25519 Sign ──► signature (64 B)          │
//! │                                                                         │
//! │  VERIFY                                                                │
//! │    content bytes ──► SHA-256 ──► digest (32 B)                          │
//! │                                     │                                   │
//! │    signer's public key ──► Ed25519 Verify ──► valid / invalid           │
//! │                                                                         │
//! │  Both sides must hash exactly the same bytes.                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use ed25519_dalek::{Signature as Ed25519Signature, Signer, Verifier};
use serde::{Deserialize, Serialize};

use crate::crypto::{PublicKey, SigningKeyPair};
use crate::error::Result;

/// Size of an Ed25519 signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// An Ed25519 digital signature
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "signature_bytes")] pub [u8; SIGNATURE_SIZE]);

/// Sign a message using Ed25519
///
/// Ed25519 is deterministic: the same key and message always produce the
/// same signature.
pub fn sign(keypair: &SigningKeyPair, message: &[u8]) -> Signature {
    let sig = keypair.signing_key().sign(message);
    Signature(sig.to_bytes())
}

/// Verify an Ed25519 signature
///
/// `Ok(false)` means the signature does not verify; `Err` means the public
/// key itself is unusable.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> Result<bool> {
    let verifying_key = public_key.verifying_key()?;
    let sig = Ed25519Signature::from_bytes(&signature.0);

    Ok(verifying_key.verify(message, &sig).is_ok())
}

/// Serde helper for signature bytes
mod signature_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 64], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<[u8; 64], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("Invalid signature length"))
    }
}

// ============================================================================
// TESTS
// ============================================================================
