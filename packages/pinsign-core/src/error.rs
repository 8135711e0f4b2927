//! # Error Handling
//!
//! This module provides the classified error type for PinSign Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Input Errors (100)                                                │
//! │  │   └── InvalidInput          - Empty PIN, bad path, not a PDF        │
//! │  │                                                                      │
//! │  ├── Device Errors (200)                                               │
//! │  │   └── NoDevice              - No device / no key container found    │
//! │  │                                                                      │
//! │  ├── Key Custody Errors (300)                                          │
//! │  │   ├── WrongPin              - AEAD tag verification failed          │
//! │  │   ├── CorruptKeyMaterial    - Decrypted, but key did not parse      │
//! │  │   └── MalformedContainer    - Container shorter than nonce + tag    │
//! │  │                                                                      │
//! │  ├── Signature Errors (400)                                            │
//! │  │   └── InvalidPublicKey      - Supplied public key file unusable     │
//! │  │                                                                      │
//! │  ├── I/O Errors (500)                                                  │
//! │  │   └── Io                    - File read/write failure               │
//! │  │                                                                      │
//! │  └── Internal Errors (900)                                             │
//! │      ├── Crypto                - Unexpected primitive failure          │
//! │      └── Serialization         - Envelope / config encoding failure    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! "No signature", "signature invalid" and "key mismatch" are not errors:
//! they are [`VerificationOutcome`](crate::verifier::VerificationOutcome)
//! variants, each with its own message.
//!
//! ## Error Handling Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Core (Rust)                  Shell boundary             User           │
//! │  ──────────────────────────────────────────────────────────────────     │
//! │                                                                         │
//! │  Result<T, Error>  ──────►  code + message + Remedy  ──►  "Re-enter    │
//! │                                                             your PIN"   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for PinSign Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for PinSign Core
///
/// Every variant renders a distinct message so the shell never has to fall
/// back to a generic "an error occurred".
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Input Errors (100-199)
    // ========================================================================

    /// Caller supplied something unusable (empty PIN, malformed path, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // Device Errors (200-299)
    // ========================================================================

    /// No removable device with a key container is present
    #[error("No signing device found. Insert the device holding your key container.")]
    NoDevice,

    // ========================================================================
    // Key Custody Errors (300-399)
    // ========================================================================

    /// Authenticated decryption rejected the container: the PIN is wrong
    #[error("Incorrect PIN. The key container could not be unlocked.")]
    WrongPin,

    /// Decryption succeeded but the plaintext is not a usable private key
    #[error("Key material on the device is corrupt: {0}")]
    CorruptKeyMaterial(String),

    /// The container does not have the nonce || tag || ciphertext layout
    #[error("Key container is malformed: {0}")]
    MalformedContainer(String),

    // ========================================================================
    // Signature Errors (400-499)
    // ========================================================================

    /// The externally supplied public key file cannot be used
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    // ========================================================================
    // I/O Errors (500-599)
    // ========================================================================

    /// File read or write failed
    #[error("I/O failure: {0}")]
    Io(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// A cryptographic primitive failed unexpectedly
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    /// Serialization or deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// What the user should do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remedy {
    /// Type the PIN again
    ReenterPin,
    /// Plug the credential device (back) in
    ReinsertDevice,
    /// The key on the device must be provisioned again
    ReprovisionKey,
    /// Fix the supplied file, path or argument
    CheckInput,
    /// Transient failure; trying again may help
    Retry,
    /// Nothing the user can do
    None,
}

impl Error {
    /// Get the numeric error code for the shell
    ///
    /// Error codes are organized by category:
    /// - 100-199: Input
    /// - 200-299: Device
    /// - 300-399: Key custody
    /// - 400-499: Signature
    /// - 500-599: I/O
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidInput(_) => 100,

            Error::NoDevice => 200,

            Error::WrongPin => 300,
            Error::CorruptKeyMaterial(_) => 301,
            Error::MalformedContainer(_) => 302,

            Error::InvalidPublicKey(_) => 400,

            Error::Io(_) => 500,

            Error::Crypto(_) => 900,
            Error::Serialization(_) => 901,
        }
    }

    /// Map the failure class onto the action the user has to take.
    pub fn remedy(&self) -> Remedy {
        match self {
            Error::WrongPin => Remedy::ReenterPin,
            Error::NoDevice => Remedy::ReinsertDevice,
            Error::CorruptKeyMaterial(_) | Error::MalformedContainer(_) => Remedy::ReprovisionKey,
            Error::InvalidInput(_) | Error::InvalidPublicKey(_) => Remedy::CheckInput,
            Error::Io(_) => Remedy::Retry,
            Error::Crypto(_) | Error::Serialization(_) => Remedy::None,
        }
    }

    /// Check if this error requires user action
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self.remedy(),
            Remedy::ReenterPin | Remedy::ReinsertDevice | Remedy::ReprovisionKey | Remedy::CheckInput
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
