//! # Key Custody
//!
//! Turns a PIN plus the on-device key container into an in-memory signing
//! key, or a classified failure.
//!
//! ## Container Layout
//!
//! ```text
//! ┌────────────┬──────────────┬──────────────────────────────────────────┐
//! │ nonce (12) │  tag (16)    │ ciphertext (N) = AES-GCM(pad(PKCS#8 PEM)) │
//! └────────────┴──────────────┴──────────────────────────────────────────┘
//!   0          12             28                                    28 + N
//! ```
//!
//! ## Unwrap Classification
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  empty PIN ─────────────────────────────────────────► InvalidInput     │
//! │  container ≤ 28 bytes ──────────────────────────────► MalformedContainer│
//! │  GCM tag check fails ───────────────────────────────► WrongPin         │
//! │  tag ok, padding or PKCS#8 parse fails ─────────────► CorruptKeyMaterial│
//! │  tag ok, key parses ────────────────────────────────► UnwrappedKey     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Plaintext rejected by the tag check is never looked at.

use std::path::Path;

use zeroize::Zeroizing;

use crate::crypto::{
    derive_key_from_pin, open, validate_pin, Nonce, PublicKey, SigningKeyPair, NONCE_SIZE,
    PADDING_BLOCK_SIZE, TAG_SIZE,
};
use crate::error::{Error, Result};
use crate::progress::{Progress, ProgressReporter};

/// Length of the fixed header (nonce + tag). A container must be longer.
pub const CONTAINER_HEADER_LEN: usize = NONCE_SIZE + TAG_SIZE;

/// Parsed key container: `nonce || tag || ciphertext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyContainer {
    /// AES-GCM nonce
    pub nonce: Nonce,
    /// Detached authentication tag
    pub tag: [u8; TAG_SIZE],
    /// Encrypted, padded private key encoding
    pub ciphertext: Vec<u8>,
}

impl KeyContainer {
    /// Whether a file of `len` bytes can hold a container at all.
    pub fn is_plausible_len(len: u64) -> bool {
        len > CONTAINER_HEADER_LEN as u64
    }

    /// Split raw container bytes at the fixed offsets.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if !Self::is_plausible_len(bytes.len() as u64) {
            return Err(Error::MalformedContainer(format!(
                "{} bytes, expected more than {}",
                bytes.len(),
                CONTAINER_HEADER_LEN
            )));
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[..NONCE_SIZE]);

        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&bytes[NONCE_SIZE..CONTAINER_HEADER_LEN]);

        Ok(Self {
            nonce: Nonce::from_bytes(nonce),
            tag,
            ciphertext: bytes[CONTAINER_HEADER_LEN..].to_vec(),
        })
    }

    /// Serialize back to `nonce || tag || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CONTAINER_HEADER_LEN + self.ciphertext.len());
        out.extend_from_slice(self.nonce.as_bytes());
        out.extend_from_slice(&self.tag);
        out.extend_from_slice(&self.ciphertext);
        out
    }
}

/// Decrypted private key plus its public key.
///
/// Lives for one signing operation. The secret half is zeroized on drop.
#[derive(Debug)]
pub struct UnwrappedKey {
    keypair: SigningKeyPair,
    public_key: PublicKey,
}

impl UnwrappedKey {
    /// Wrap an already parsed key pair
    pub fn new(keypair: SigningKeyPair) -> Self {
        let public_key = keypair.public_key();
        Self {
            keypair,
            public_key,
        }
    }

    /// The signing key pair
    pub fn keypair(&self) -> &SigningKeyPair {
        &self.keypair
    }

    /// The derived public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

/// Unlock the container at `container_path` with `pin`.
pub fn unwrap(pin: &str, container_path: &Path) -> Result<UnwrappedKey> {
    unwrap_with_progress(pin, container_path, &ProgressReporter::silent())
}

/// [`unwrap`], reporting each step to `progress`.
pub fn unwrap_with_progress(
    pin: &str,
    container_path: &Path,
    progress: &ProgressReporter,
) -> Result<UnwrappedKey> {
    validate_pin(pin)?;

    progress.report(Progress::HashingPin);
    let wrapping_key = derive_key_from_pin(pin)?;

    progress.report(Progress::DecryptingKey);
    let bytes = std::fs::read(container_path).map_err(|e| {
        Error::Io(format!(
            "Cannot read key container {}: {}",
            container_path.display(),
            e
        ))
    })?;
    let container = KeyContainer::parse(&bytes)?;

    let key = unwrap_container(&wrapping_key, &container)?;

    tracing::info!(
        fingerprint = %key.public_key().fingerprint(),
        "Key container unlocked"
    );
    progress.report(Progress::KeyDecrypted);
    Ok(key)
}

/// Authenticate, decrypt, unpad and parse a container.
pub(crate) fn unwrap_container(
    wrapping_key: &crate::crypto::EncryptionKey,
    container: &KeyContainer,
) -> Result<UnwrappedKey> {
    let padded = open(
        wrapping_key,
        &container.nonce,
        &container.tag,
        &container.ciphertext,
    )?
    .ok_or(Error::WrongPin)?;

    let plaintext = unpad(&padded)?;
    let pem = std::str::from_utf8(plaintext)
        .map_err(|_| Error::CorruptKeyMaterial("Key encoding is not valid UTF-8".into()))?;

    let keypair = SigningKeyPair::from_pkcs8_pem(pem)?;
    Ok(UnwrappedKey::new(keypair))
}

// ============================================================================
// PADDING
// ============================================================================

/// PKCS#7 pad to the AES block size.
pub(crate) fn pad(data: &[u8]) -> Zeroizing<Vec<u8>> {
    let pad_len = PADDING_BLOCK_SIZE - (data.len() % PADDING_BLOCK_SIZE);
    let mut out = Zeroizing::new(Vec::with_capacity(data.len() + pad_len));
    out.extend_from_slice(data);
    out.extend(std::iter::repeat(pad_len as u8).take(pad_len));
    out
}

/// Strip PKCS#7 padding.
pub(crate) fn unpad(data: &[u8]) -> Result<&[u8]> {
    let corrupt = |why: &str| Error::CorruptKeyMaterial(format!("Bad padding: {}", why));

    if data.is_empty() || data.len() % PADDING_BLOCK_SIZE != 0 {
        return Err(corrupt("length is not a whole number of blocks"));
    }

    let pad_len = data[data.len() - 1] as usize;
    if pad_len == 0 || pad_len > PADDING_BLOCK_SIZE {
        return Err(corrupt("pad byte out of range"));
    }

    let (body, padding) = data.split_at(data.len() - pad_len);
    if padding.iter().any(|&b| b as usize != pad_len) {
        return Err(corrupt("inconsistent pad bytes"));
    }

    Ok(body)
}

// ============================================================================
// TESTS
// ============================================================================
