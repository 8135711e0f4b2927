//! Progress reporting for long-running operations.
//!
//! Engines report each step through a [`ProgressReporter`]. The shell holds
//! the receiving end of an unbounded channel and renders messages as they
//! arrive. A receiver that has gone away is not an error.

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::verifier::VerificationOutcome;

/// One step of a signing, verification or enrollment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    // Signing
    /// Reading the device state snapshot
    CheckingDevice,
    /// Deriving the wrapping key from the PIN
    HashingPin,
    /// Reading and decrypting the key container
    DecryptingKey,
    /// Container unlocked
    KeyDecrypted,
    /// Issuing the ephemeral identity
    GeneratingIdentity,
    /// Staging key and identity
    StagingCredentials,
    /// Digesting the document content
    HashingDocument,
    /// Producing the signature
    Signing,
    /// Writing the output document
    WritingArtifact,
    /// Output written
    Signed {
        /// Output location
        path: PathBuf,
    },

    // Verification
    /// Verification started
    Verifying,
    /// Verification finished
    Verified {
        /// The verdict
        outcome: VerificationOutcome,
    },

    // Enrollment
    /// Generating a new signing key
    GeneratingKey,
    /// Sealing the key under the PIN
    EncryptingKey,
    /// Writing the key container to the device
    WritingContainer,
    /// Exporting the public key
    SavingPublicKey,
    /// Unwrapping the new container as a check
    SelfChecking,
    /// Enrollment complete
    Enrolled {
        /// Written container
        container_path: PathBuf,
    },
}

impl Progress {
    /// Human-readable status line
    pub fn message(&self) -> String {
        match self {
            Progress::CheckingDevice => "Checking for signing device...".into(),
            Progress::HashingPin => "Hashing PIN...".into(),
            Progress::DecryptingKey => "Decrypting private key...".into(),
            Progress::KeyDecrypted => "Private key decrypted.".into(),
            Progress::GeneratingIdentity => "Generating signing identity...".into(),
            Progress::StagingCredentials => "Preparing credentials...".into(),
            Progress::HashingDocument => "Hashing document...".into(),
            Progress::Signing => "Signing...".into(),
            Progress::WritingArtifact => "Writing signed document...".into(),
            Progress::Signed { path } => format!("Signed document saved to {}", path.display()),
            Progress::Verifying => "Verifying signature...".into(),
            Progress::Verified { outcome } => outcome.message().into(),
            Progress::GeneratingKey => "Generating signing key...".into(),
            Progress::EncryptingKey => "Encrypting signing key...".into(),
            Progress::WritingContainer => "Writing key container...".into(),
            Progress::SavingPublicKey => "Saving public key...".into(),
            Progress::SelfChecking => "Checking the new container...".into(),
            Progress::Enrolled { container_path } => {
                format!("Done. Key container written to {}", container_path.display())
            }
        }
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// Sending half of a progress channel.
pub type ProgressSender = mpsc::UnboundedSender<Progress>;

/// Receiving half of a progress channel.
pub type ProgressReceiver = mpsc::UnboundedReceiver<Progress>;

/// Best-effort progress sink handed to the engines.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<ProgressSender>,
}

impl ProgressReporter {
    /// Report into `tx`
    pub fn new(tx: ProgressSender) -> Self {
        Self { tx: Some(tx) }
    }

    /// Report nowhere
    pub fn silent() -> Self {
        Self { tx: None }
    }

    /// Create a reporter together with its receiver
    pub fn channel() -> (Self, ProgressReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Emit one step
    pub fn report(&self, step: Progress) {
        tracing::debug!(step = ?step, "progress");
        if let Some(tx) = &self.tx {
            // Receiver gone: nobody is listening any more.
            let _ = tx.send(step);
        }
    }
}
