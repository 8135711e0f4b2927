//! # PIN Key Derivation
//!
//! Turns the user's PIN into the 256-bit key that wraps the private key
//! inside the on-device container.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       PIN → WRAPPING KEY                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   PIN ("1234")                                                          │
//! │     │  UTF-8 bytes                                                      │
//! │     ▼                                                                   │
//! │   SHA-256  ──►  32-byte AES-256-GCM key (zeroized on drop)              │
//! │                                                                         │
//! │  The enrollment step and the unlock step must use the same function,   │
//! │  so this derivation is part of the container format.                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sha2::{Digest, Sha256};

use crate::crypto::EncryptionKey;
use crate::error::{Error, Result};

/// Reject PINs that are empty or only whitespace.
pub fn validate_pin(pin: &str) -> Result<()> {
    if pin.trim().is_empty() {
        return Err(Error::InvalidInput("PIN cannot be empty".into()));
    }
    Ok(())
}

/// Derive the container wrapping key from a PIN.
///
/// Deterministic: the same PIN always yields the same key.
pub fn derive_key_from_pin(pin: &str) -> Result<EncryptionKey> {
    validate_pin(pin)?;

    let digest = Sha256::digest(pin.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);

    Ok(EncryptionKey::from_bytes(key))
}

/// Fingerprint of a raw public key: hex SHA-256.
pub fn compute_key_fingerprint(public_key: &[u8; 32]) -> String {
    hex::encode(Sha256::digest(public_key))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_deterministic() {
        let k1 = derive_key_from_pin("1234").unwrap();
        let k2 = derive_key_from_pin("1234").unwrap();
        assert_eq!(k1.as_inner(), k2.as_inner());
    }

    #[test]
    fn test_different_pins_different_keys() {
        let k1 = derive_key_from_pin("1234").unwrap();
        let k2 = derive_key_from_pin("0000").unwrap();
        assert_ne!(k1.as_inner(), k2.as_inner());
    }

    #[test]
    fn test_matches_plain_sha256() {
        let key = derive_key_from_pin("1234").unwrap();
        let expected = Sha256::digest(b"1234");
        assert_eq!(&key.as_inner()[..], &expected[..]);
    }

    #[test]
    fn test_empty_and_whitespace_pins_rejected() {
        assert!(matches!(derive_key_from_pin(""), Err(Error::InvalidInput(_))));
        assert!(matches!(derive_key_from_pin("   \t"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fp = compute_key_fingerprint(&[7u8; 32]);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
