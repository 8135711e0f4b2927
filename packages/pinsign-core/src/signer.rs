//! # Signing Engine
//!
//! Produces a signed artifact from a source document and a PIN, end to end.
//!
//! ## Signing Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            SIGN (all-or-nothing)                        │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  1. Snapshot device state ── not PresentWithKey ──► NoDevice           │
//! │  2. Read document, require %PDF- ... %%EOF, no existing slot           │
//! │  3. unwrap(pin, container) ── WrongPin / CorruptKeyMaterial / ...      │
//! │  4. Issue EphemeralIdentity (now .. now + validity_days)               │
//! │  5. Stage credentials  ┐                                               │
//! │  6. digest = SHA-256(original bytes)                                   │
//! │  7. signature = Ed25519(key, digest)                                   │
//! │  8. Drop staging guard ┘ key zeroized, temp files removed              │
//! │  9. Write original || slot to temp file beside output, then rename     │
//! │                                                                         │
//! │  Any failure before step 9 completes leaves no output file behind.     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The device state is read once. If the device is pulled mid-operation the
//! container read fails with an I/O error rather than the engine re-polling.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::SignerConfig;
use crate::credentials::StagedCredentials;
use crate::crypto::{self, DigestAlgorithm};
use crate::custody;
use crate::device::DeviceHandle;
use crate::document::{self, SignatureEnvelope};
use crate::error::{Error, Result};
use crate::identity::EphemeralIdentity;
use crate::progress::{Progress, ProgressReporter};

/// A successfully written signed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedArtifact {
    /// Where the signed document was written
    pub path: PathBuf,
    /// Identity embedded in the signature
    pub identity: EphemeralIdentity,
    /// Signing time recorded in the envelope
    pub signed_at: DateTime<Utc>,
    /// Digest algorithm used
    pub digest_algorithm: DigestAlgorithm,
}

/// Signs documents with the key on the monitored device.
#[derive(Debug, Clone)]
pub struct SigningEngine {
    config: Arc<SignerConfig>,
    device: DeviceHandle,
}

impl SigningEngine {
    /// Create an engine reading device state through `device`
    pub fn new(config: Arc<SignerConfig>, device: DeviceHandle) -> Self {
        Self { config, device }
    }

    /// Sign `document_path` with the device key unlocked by `pin`.
    pub fn sign(&self, document_path: &Path, pin: &str) -> Result<SignedArtifact> {
        self.sign_with_progress(document_path, pin, &ProgressReporter::silent())
    }

    /// [`sign`](Self::sign), reporting steps to `progress`.
    pub fn sign_with_progress(
        &self,
        document_path: &Path,
        pin: &str,
        progress: &ProgressReporter,
    ) -> Result<SignedArtifact> {
        progress.report(Progress::CheckingDevice);
        let state = self.device.state();
        let container_path = state
            .container_path()
            .map(Path::to_path_buf)
            .ok_or(Error::NoDevice)?;

        let original = document::read_document(document_path)?;
        document::ensure_signable(&original)?;
        let output_path = document::signed_output_path(document_path, &self.config.output_suffix)?;

        let key = custody::unwrap_with_progress(pin, &container_path, progress)?;

        progress.report(Progress::GeneratingIdentity);
        let signed_at = crate::time::now();
        let identity = EphemeralIdentity::issue(
            key.keypair(),
            &self.config.display_name,
            self.config.organisation.as_deref(),
            signed_at,
            self.config.validity_days,
        )?;

        progress.report(Progress::StagingCredentials);
        let staged = StagedCredentials::stage(
            self.config.credential_staging,
            self.config.staging_dir.as_deref(),
            key,
            identity,
        )?;

        let algorithm = DigestAlgorithm::CURRENT;
        let envelope = staged.with_credentials(|keypair, identity| {
            progress.report(Progress::HashingDocument);
            let digest = algorithm.digest(&original);

            progress.report(Progress::Signing);
            let signature = crypto::sign(keypair, &digest);
            Ok(SignatureEnvelope::new(
                algorithm,
                signature,
                signed_at,
                identity.clone(),
            ))
        });
        drop(staged);
        let envelope = envelope?;

        progress.report(Progress::WritingArtifact);
        let slot = envelope.to_slot()?;
        document::write_atomic(&output_path, &[&original, &slot])?;

        tracing::info!(
            document = %document_path.display(),
            output = %output_path.display(),
            serial = %envelope.identity.serial,
            "Document signed"
        );
        progress.report(Progress::Signed {
            path: output_path.clone(),
        });

        Ok(SignedArtifact {
            path: output_path,
            identity: envelope.identity,
            signed_at,
            digest_algorithm: algorithm,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
