//! # Encryption Module
//!
//! Provides AES-256-GCM sealing for the on-device key container.
//!
//! ## Container Sealing
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      CONTAINER SEAL / OPEN                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  SEAL (enrollment)                                                     │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  AES-256-GCM(                                                │       │
//! │  │    key       = SHA-256(PIN),                                 │       │
//! │  │    nonce     = random 12 bytes,                              │       │
//! │  │    plaintext = pad(private key PEM),                         │       │
//! │  │    aad       = empty                                         │       │
//! │  │  )                                                          │       │
//! │  │           ↓                                                  │       │
//! │  │  (nonce, detached 16-byte tag, ciphertext)                   │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  OPEN (unlock)                                                         │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  tag verified first; a mismatch yields no plaintext at all  │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//!
//! | Property | Guarantee |
//! |----------|-----------|
//! | Confidentiality | Key bytes unreadable without the PIN-derived key |
//! | Integrity | Any modification of nonce, tag or ciphertext is detected |
//! | Wrong-key detection | A wrong PIN fails the tag check deterministically |

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce as AesNonce, Tag,
};
use rand::RngCore;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::error::{Error, Result};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of the encryption key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// A nonce (number used once) for AES-GCM encryption
///
/// **NEVER reuse a nonce with the same key!** Every enrollment draws a
/// fresh random nonce; a container is sealed exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce(pub [u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a cryptographically random nonce
    pub fn random() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from existing bytes
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// An AES-256-GCM encryption key
///
/// Zeroized when dropped.
#[derive(ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get a copy of the raw key bytes
    pub fn as_inner(&self) -> [u8; KEY_SIZE] {
        self.0
    }
}

/// Output of [`seal`]: the three parts of a container, kept apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBox {
    /// Random per-seal nonce
    pub nonce: Nonce,
    /// Detached GCM authentication tag
    pub tag: [u8; TAG_SIZE],
    /// Ciphertext, same length as the plaintext
    pub ciphertext: Vec<u8>,
}

/// Encrypt `plaintext` under `key` with a fresh nonce and a detached tag.
pub fn seal(key: &EncryptionKey, plaintext: &[u8]) -> Result<SealedBox> {
    let nonce = Nonce::random();
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| Error::Crypto(format!("Invalid key: {}", e)))?;

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(AesNonce::from_slice(&nonce.0), &[], &mut buffer)
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(SealedBox {
        nonce,
        tag: tag_bytes,
        ciphertext: buffer,
    })
}

/// Authenticate and decrypt a sealed box.
///
/// Returns `Ok(None)` when the authentication tag does not verify (wrong
/// key or tampered data). No plaintext is ever released in that case.
pub fn open(
    key: &EncryptionKey,
    nonce: &Nonce,
    tag: &[u8; TAG_SIZE],
    ciphertext: &[u8],
) -> Result<Option<Zeroizing<Vec<u8>>>> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| Error::Crypto(format!("Invalid key: {}", e)))?;

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    match cipher.decrypt_in_place_detached(
        AesNonce::from_slice(&nonce.0),
        &[],
        buffer.as_mut_slice(),
        Tag::from_slice(tag),
    ) {
        Ok(()) => Ok(Some(buffer)),
        Err(_) => Ok(None),
    }
}

// ============================================================================
// TESTS
// ============================================================================
