//! # PinSign Core
//!
//! PIN-protected document signing with a key that lives, encrypted, on a
//! removable device and is only ever decrypted in memory for the duration
//! of one signature.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         PINSIGN CORE MODULES                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │          shell (CLI / GUI): status, progress, file pickers             │
//! │              │                    │                    │                │
//! │              ▼                    ▼                    ▼                │
//! │  ┌───────────────────┐  ┌───────────────────┐  ┌───────────────────┐   │
//! │  │  Device Monitor   │  │  Signing Engine   │  │ Verification Eng. │   │
//! │  │                   │  │                   │  │                   │   │
//! │  │ - mount scan      │◄─┤ - state snapshot  │  │ - slot extract    │   │
//! │  │ - watch publish   │  │ - identity issue  │  │ - digest + verify │   │
//! │  │ - poll loop       │  │ - staging guard   │  │ - key compare     │   │
//! │  └───────────────────┘  └─────────┬─────────┘  └─────────┬─────────┘   │
//! │                                   │                      │             │
//! │                         ┌─────────▼─────────┐            │             │
//! │                         │   Key Custody     │            │             │
//! │                         │                   │            │             │
//! │                         │ - PIN → key       │            │             │
//! │                         │ - AES-GCM unwrap  │            │             │
//! │                         │ - classify errors │            │             │
//! │                         └─────────┬─────────┘            │             │
//! │                                   │                      │             │
//! │  ┌────────────────────────────────▼──────────────────────▼───────────┐ │
//! │  │ crypto (SHA-256, AES-256-GCM, Ed25519)  ·  document (slot format) │ │
//! │  └───────────────────────────────────────────────────────────────────┘ │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Classified error type and user remedies
//! - [`config`] - Mount points, file names, identity defaults
//! - [`crypto`] - Hashing, authenticated encryption, signatures, keys
//! - [`device`] - Device Monitor: presence polling and state publication
//! - [`custody`] - Key Custody: PIN-based container unwrap
//! - [`enrollment`] - Device provisioning (the inverse of custody)
//! - [`identity`] - Ephemeral self-signed identity
//! - [`credentials`] - Scoped staging of key and identity during signing
//! - [`document`] - Signed artifact format and atomic output
//! - [`signer`] - Signing Engine
//! - [`verifier`] - Verification Engine
//! - [`progress`] - Progress events for the shell
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use pinsign_core::{DeviceMonitor, SignerConfig, SigningEngine};
//!
//! let config = Arc::new(SignerConfig::default());
//! let monitor = Arc::new(DeviceMonitor::new(config.clone()));
//! let _poller = monitor.spawn();
//!
//! let engine = SigningEngine::new(config, monitor.handle());
//! let artifact = engine.sign("contract.pdf".as_ref(), "1234")?;
//!
//! let report = pinsign_core::verify(&artifact.path, "signer_public_key.pem".as_ref())?;
//! println!("{}", report.summary());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod config;
pub mod credentials;
pub mod crypto;
pub mod custody;
pub mod device;
pub mod document;
pub mod enrollment;
pub mod error;
pub mod identity;
pub mod progress;
pub mod signer;
/// Timestamp helpers for identities and envelopes.
pub mod time;
pub mod verifier;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::SignerConfig;
pub use credentials::CredentialStaging;
pub use crypto::{PublicKey, SigningKeyPair};
pub use custody::{unwrap, UnwrappedKey};
pub use device::{DeviceHandle, DeviceMonitor, DeviceState};
pub use enrollment::{enroll, wrap, EnrollmentReport};
pub use error::{Error, Remedy, Result};
pub use identity::EphemeralIdentity;
pub use progress::{Progress, ProgressReporter};
pub use signer::{SignedArtifact, SigningEngine};
pub use verifier::{verify, VerificationOutcome, VerificationReport};
