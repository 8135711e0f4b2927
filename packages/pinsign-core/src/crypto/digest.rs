//! Content digest algorithms.
//!
//! The algorithm is fixed per signature format version; the identifier is
//! written into every signature envelope so a verifier can refuse anything
//! it does not understand.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Digest algorithm used for the signed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// SHA-256, 32-byte output
    Sha256,
}

impl DigestAlgorithm {
    /// Algorithm used by the current format version
    pub const CURRENT: DigestAlgorithm = DigestAlgorithm::Sha256;

    /// Identifier stored in the envelope
    pub fn id(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
        }
    }

    /// Parse an envelope identifier
    pub fn from_id(id: &str) -> Result<Self> {
        match id {
            "sha256" => Ok(DigestAlgorithm::Sha256),
            other => Err(Error::InvalidInput(format!(
                "Unsupported digest algorithm: {}",
                other
            ))),
        }
    }

    /// Hash `content`
    pub fn digest(&self, content: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha256 => Sha256::digest(content).to_vec(),
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip() {
        let alg = DigestAlgorithm::from_id(DigestAlgorithm::CURRENT.id()).unwrap();
        assert_eq!(alg, DigestAlgorithm::Sha256);
    }

    #[test]
    fn test_unknown_id_rejected() {
        assert!(DigestAlgorithm::from_id("md5").is_err());
    }

    #[test]
    fn test_sha256_known_value() {
        let digest = DigestAlgorithm::Sha256.digest(b"abc");
        assert_eq!(
            hex::encode(digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
