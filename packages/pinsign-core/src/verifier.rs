//! # Verification Engine
//!
//! Decides whether a signed artifact's embedded signature is genuine, and
//! whether it was made by the holder of a specific public key.
//!
//! ## Two-Stage Check
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  no slot marker ──────────────────────────────► NoSignaturePresent     │
//! │                                                                         │
//! │  Stage 1: is the signature genuine?                                    │
//! │    envelope decodes, version + algorithm known                         │
//! │    identity self-signature valid                                       │
//! │    signed_at inside identity validity                                  │
//! │    Ed25519 verify(identity key, digest(content))                       │
//! │      any failure ─────────────────────────────► SignatureInvalid       │
//! │                                                                         │
//! │  Stage 2: is it the signer we expected?                                │
//! │    identity key == supplied key (decoded point)                        │
//! │      no  ─────────────────────────────────────► ValidKeyMismatch       │
//! │      yes ─────────────────────────────────────► ValidMatch             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stage 1 uses the key the artifact claims, never the caller's key, so a
//! document validly signed by someone else is reported as such rather than
//! as a broken signature.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{self, DigestAlgorithm, PublicKey};
use crate::document::{self, SignatureEnvelope, FORMAT_VERSION};
use crate::error::Result;
use crate::identity::EphemeralIdentity;
use crate::progress::{Progress, ProgressReporter};

/// Result of verifying one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// The document carries no signature slot
    NoSignaturePresent,
    /// A slot exists but does not verify
    SignatureInvalid,
    /// Genuinely signed, by a different key than the one supplied
    ValidKeyMismatch,
    /// Genuinely signed by the supplied key
    ValidMatch,
}

impl VerificationOutcome {
    /// Distinct user-facing message
    pub fn message(&self) -> &'static str {
        match self {
            VerificationOutcome::NoSignaturePresent => "No signature found in this document.",
            VerificationOutcome::SignatureInvalid => {
                "Signature is invalid: the document was modified or the signature is damaged."
            }
            VerificationOutcome::ValidKeyMismatch => {
                "Signature is valid, but it was not made with the supplied public key."
            }
            VerificationOutcome::ValidMatch => "Signature valid!",
        }
    }

    /// Whether the signature itself verified
    pub fn is_cryptographically_valid(&self) -> bool {
        matches!(
            self,
            VerificationOutcome::ValidKeyMismatch | VerificationOutcome::ValidMatch
        )
    }
}

impl std::fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome plus whatever identity metadata could be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// The verdict
    pub outcome: VerificationOutcome,
    /// Claimed signer, when the envelope decoded
    pub identity: Option<EphemeralIdentity>,
    /// Claimed signing time, when the envelope decoded
    pub signed_at: Option<DateTime<Utc>>,
}

impl VerificationReport {
    fn bare(outcome: VerificationOutcome) -> Self {
        Self {
            outcome,
            identity: None,
            signed_at: None,
        }
    }

    /// Multi-line status text for display
    pub fn summary(&self) -> String {
        let mut out = self.outcome.message().to_string();
        if !self.outcome.is_cryptographically_valid() {
            return out;
        }
        if let Some(identity) = &self.identity {
            out.push_str(&format!("\nSigner: {}", identity.display_name));
            if let Some(org) = &identity.organisation {
                out.push_str(&format!("\nOrganisation: {}", org));
            }
            out.push_str(&format!("\nKey fingerprint: {}", identity.public_key.fingerprint()));
        }
        if let Some(at) = &self.signed_at {
            out.push_str(&format!("\nSigned at: {}", at.to_rfc3339()));
        }
        out
    }
}

/// Verify the document at `document_path` against the public key file at
/// `public_key_path` (`.pem` or `.der`).
pub fn verify(document_path: &Path, public_key_path: &Path) -> Result<VerificationReport> {
    verify_with_progress(document_path, public_key_path, &ProgressReporter::silent())
}

/// [`verify`], reporting steps to `progress`.
pub fn verify_with_progress(
    document_path: &Path,
    public_key_path: &Path,
    progress: &ProgressReporter,
) -> Result<VerificationReport> {
    progress.report(Progress::Verifying);

    let expected = PublicKey::from_file(public_key_path)?;
    let bytes = document::read_document(document_path)?;
    let report = verify_bytes(&bytes, &expected);

    tracing::info!(
        document = %document_path.display(),
        outcome = ?report.outcome,
        "Verification finished"
    );
    progress.report(Progress::Verified {
        outcome: report.outcome,
    });
    Ok(report)
}

/// Verify artifact bytes already in memory.
pub fn verify_bytes(bytes: &[u8], expected: &PublicKey) -> VerificationReport {
    let parts = document::split(bytes);
    let Some(slot_body) = parts.slot_body else {
        return VerificationReport::bare(VerificationOutcome::NoSignaturePresent);
    };

    let envelope = match SignatureEnvelope::from_slot_body(slot_body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(error = %e, "Signature slot did not decode");
            return VerificationReport::bare(VerificationOutcome::SignatureInvalid);
        }
    };

    let outcome = if check_envelope(parts.content, &envelope) {
        if envelope.identity.public_key == *expected {
            VerificationOutcome::ValidMatch
        } else {
            VerificationOutcome::ValidKeyMismatch
        }
    } else {
        VerificationOutcome::SignatureInvalid
    };

    VerificationReport {
        outcome,
        signed_at: Some(envelope.signed_at),
        identity: Some(envelope.identity),
    }
}

/// Stage 1: everything except the comparison with the supplied key.
fn check_envelope(content: &[u8], envelope: &SignatureEnvelope) -> bool {
    if envelope.version != FORMAT_VERSION {
        tracing::debug!(version = envelope.version, "Unknown envelope version");
        return false;
    }

    let algorithm = match DigestAlgorithm::from_id(&envelope.digest_algorithm) {
        Ok(algorithm) => algorithm,
        Err(e) => {
            tracing::debug!(error = %e, "Unsupported digest algorithm");
            return false;
        }
    };

    let identity = &envelope.identity;
    if !matches!(identity.verify_self_signature(), Ok(true)) {
        tracing::debug!(serial = %identity.serial, "Identity self-signature does not verify");
        return false;
    }
    if !identity.is_valid_at(envelope.signed_at) {
        tracing::debug!(serial = %identity.serial, "Signing time outside identity validity");
        return false;
    }

    let digest = algorithm.digest(content);
    matches!(
        crypto::verify(&identity.public_key, &digest, &envelope.signature),
        Ok(true)
    )
}

// ============================================================================
// TESTS
// ============================================================================
