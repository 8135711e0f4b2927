//! # Cryptography Module
//!
//! This module provides all cryptographic primitives used by PinSign Core.
//!
//! ## Security Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    KEY CUSTODY                                  │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  PIN ──► SHA-256 ──► wrapping key (AES-256)                    │   │
//! │  │                          │                                      │   │
//! │  │                          ▼                                      │   │
//! │  │  container = nonce(12) || tag(16) || AES-GCM(pad(PKCS#8 PEM))  │   │
//! │  │                          │                                      │   │
//! │  │                          ▼                                      │   │
//! │  │              Ed25519 signing key (in memory only)               │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 SIGNATURE SCHEME                                │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  digest    = SHA-256(document content)                         │   │
//! │  │  signature = Ed25519(private key, digest)                      │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm Choices
//!
//! | Algorithm | Purpose |
//! |-----------|---------|
//! | SHA-256 | PIN → wrapping key, document digest |
//! | AES-256-GCM | Key container (authenticated) |
//! | Ed25519 | Document and identity signatures |
//!
//! ## Security Considerations
//!
//! 1. **Key Zeroization**: Wrapping keys, decrypted plaintext and signing
//!    keys are zeroized when dropped
//! 2. **Authenticated Unwrap**: A wrong PIN fails the GCM tag check before
//!    any plaintext is released
//! 3. **Secure Random**: `rand::rngs::OsRng` for nonces and key generation

mod digest;
mod encryption;
mod kdf;
mod keys;
mod signing;

pub use digest::DigestAlgorithm;
pub use encryption::{open, seal, EncryptionKey, Nonce, SealedBox, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use kdf::{compute_key_fingerprint, derive_key_from_pin, validate_pin};
pub use keys::{PublicKey, SigningKeyPair};
pub use signing::{sign, verify, Signature, SIGNATURE_SIZE};

/// AES block size used for the enrollment padding
pub const PADDING_BLOCK_SIZE: usize = 16;
