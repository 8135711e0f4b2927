//! # Enrollment
//!
//! Provisions a credential device: generates a signing key, seals it under
//! the PIN into the key container and exports the public key for verifiers.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            ENROLLMENT                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  PIN ──► SHA-256 ──► wrapping key                                      │
//! │                          │                                              │
//! │  Ed25519 keygen ──► PKCS#8 PEM ──► pad ──► AES-256-GCM                  │
//! │                                              │                          │
//! │                      <device>/encrypted_private_key.bin                 │
//! │                                                                         │
//! │  public key ──► SPKI .pem / .der ──► handed to verifiers               │
//! │                                                                         │
//! │  self-check: unwrap the written container with the same PIN           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};

use crate::config::SignerConfig;
use crate::crypto::{derive_key_from_pin, seal, validate_pin, EncryptionKey, PublicKey, SigningKeyPair};
use crate::custody::{self, pad, KeyContainer};
use crate::document::{write_atomic, write_new};
use crate::error::{Error, Result};
use crate::progress::{Progress, ProgressReporter};

/// What enrollment produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentReport {
    /// Written key container
    pub container_path: PathBuf,
    /// Written public key file
    pub public_key_path: PathBuf,
    /// The new public key
    pub public_key: PublicKey,
    /// Hex SHA-256 of the raw public key
    pub fingerprint: String,
}

/// Seal a PKCS#8 PEM private key under `pin` into container bytes.
pub fn wrap(pin: &str, private_key_pem: &str) -> Result<Vec<u8>> {
    let wrapping_key = derive_key_from_pin(pin)?;
    Ok(seal_container(&wrapping_key, private_key_pem)?.to_bytes())
}

fn seal_container(wrapping_key: &EncryptionKey, private_key_pem: &str) -> Result<KeyContainer> {
    let padded = pad(private_key_pem.as_bytes());
    let sealed = seal(wrapping_key, &padded)?;
    Ok(KeyContainer {
        nonce: sealed.nonce,
        tag: sealed.tag,
        ciphertext: sealed.ciphertext,
    })
}

/// Provision `device_root` with a fresh key protected by `pin`.
pub fn enroll(
    pin: &str,
    device_root: &Path,
    public_key_out: &Path,
    config: &SignerConfig,
) -> Result<EnrollmentReport> {
    enroll_with_progress(pin, device_root, public_key_out, config, &ProgressReporter::silent())
}

/// [`enroll`], reporting steps to `progress`.
pub fn enroll_with_progress(
    pin: &str,
    device_root: &Path,
    public_key_out: &Path,
    config: &SignerConfig,
    progress: &ProgressReporter,
) -> Result<EnrollmentReport> {
    validate_pin(pin)?;

    if !device_root.is_dir() {
        return Err(Error::InvalidInput(format!(
            "{} is not a directory",
            device_root.display()
        )));
    }
    let container_path = config.container_path(device_root);
    if container_path.exists() {
        return Err(Error::InvalidInput(format!(
            "{} already holds a key container",
            device_root.display()
        )));
    }
    let public_key_format = PublicKeyFormat::from_path(public_key_out)?;

    progress.report(Progress::HashingPin);
    let wrapping_key = derive_key_from_pin(pin)?;

    progress.report(Progress::GeneratingKey);
    let keypair = SigningKeyPair::generate();
    let public_key = keypair.public_key();

    progress.report(Progress::EncryptingKey);
    let container = {
        let pem = keypair.to_pkcs8_pem()?;
        seal_container(&wrapping_key, &pem)?
    };
    drop(keypair);

    progress.report(Progress::WritingContainer);
    write_new(&container_path, &[&container.to_bytes()]).map_err(|e| match e {
        Error::InvalidInput(_) => Error::InvalidInput(format!(
            "{} already holds a key container",
            device_root.display()
        )),
        other => other,
    })?;
    let written = ContainerRollback::new(&container_path);

    progress.report(Progress::SavingPublicKey);
    let encoded = match public_key_format {
        PublicKeyFormat::Pem => public_key.to_pem()?.into_bytes(),
        PublicKeyFormat::Der => public_key.to_der()?,
    };
    write_atomic(public_key_out, &[&encoded])?;

    progress.report(Progress::SelfChecking);
    self_check(pin, &container_path, &public_key)?;
    written.keep();

    let fingerprint = public_key.fingerprint();
    tracing::info!(
        container = %container_path.display(),
        public_key = %public_key_out.display(),
        fingerprint = %fingerprint,
        "Device enrolled"
    );
    progress.report(Progress::Enrolled {
        container_path: container_path.clone(),
    });

    Ok(EnrollmentReport {
        container_path,
        public_key_path: public_key_out.to_path_buf(),
        public_key,
        fingerprint,
    })
}

fn self_check(pin: &str, container_path: &Path, expected: &PublicKey) -> Result<()> {
    let key = custody::unwrap(pin, container_path)?;
    if key.public_key() != expected {
        return Err(Error::Crypto(
            "Container decrypts to a different key than was generated".into(),
        ));
    }
    Ok(())
}

/// Removes a freshly written container unless enrollment runs to the end.
struct ContainerRollback<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> ContainerRollback<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerRollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!(container = %self.path.display(), "Enrollment incomplete, removing container");
        if let Err(e) = std::fs::remove_file(self.path) {
            tracing::error!(
                container = %self.path.display(),
                error = %e,
                "Could not remove incomplete key container"
            );
        }
    }
}

enum PublicKeyFormat {
    Pem,
    Der,
}

impl PublicKeyFormat {
    fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("pem") => Ok(PublicKeyFormat::Pem),
            Some("der") => Ok(PublicKeyFormat::Der),
            _ => Err(Error::InvalidInput(format!(
                "Public key output {} must end in .pem or .der",
                path.display()
            ))),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_layout() {
        let pem = SigningKeyPair::generate().to_pkcs8_pem().unwrap();
        let bytes = wrap("1234", &pem).unwrap();

        // nonce + tag + padded PEM
        let padded_len = (pem.len() / 16 + 1) * 16;
        assert_eq!(bytes.len(), 12 + 16 + padded_len);
        assert!(KeyContainer::is_plausible_len(bytes.len() as u64));
    }

    #[test]
    fn test_wrap_rejects_empty_pin() {
        let pem = SigningKeyPair::generate().to_pkcs8_pem().unwrap();
        assert!(matches!(wrap("", &pem), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_enroll_writes_container_and_public_key() {
        let device = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let public_key_path = out.path().join("signer_public_key.pem");

        let (reporter, mut rx) = ProgressReporter::channel();
        let report = enroll_with_progress(
            "1234",
            device.path(),
            &public_key_path,
            &SignerConfig::default(),
            &reporter,
        )
        .unwrap();

        assert_eq!(
            report.container_path,
            device.path().join("encrypted_private_key.bin")
        );
        assert_eq!(PublicKey::from_file(&public_key_path).unwrap(), report.public_key);
        assert_eq!(report.fingerprint.len(), 64);

        let key = custody::unwrap("1234", &report.container_path).unwrap();
        assert_eq!(key.public_key(), &report.public_key);

        let mut steps = Vec::new();
        while let Ok(step) = rx.try_recv() {
            steps.push(step);
        }
        assert_eq!(steps.first(), Some(&Progress::HashingPin));
        assert!(matches!(steps.last(), Some(Progress::Enrolled { .. })));
    }

    #[test]
    fn test_enroll_der_public_key() {
        let device = tempfile::tempdir().unwrap();
        let public_key_path = device.path().join("signer_public_key.der");

        let report = enroll("1234", device.path(), &public_key_path, &SignerConfig::default())
            .unwrap();
        assert_eq!(PublicKey::from_file(&public_key_path).unwrap(), report.public_key);
    }

    #[test]
    fn test_enroll_refuses_to_overwrite() {
        let device = tempfile::tempdir().unwrap();
        let public_key_path = device.path().join("pub.pem");
        let config = SignerConfig::default();

        let first = enroll("1234", device.path(), &public_key_path, &config).unwrap();
        let before = std::fs::read(&first.container_path).unwrap();

        let second = enroll("5678", device.path(), &public_key_path, &config);
        assert!(matches!(second, Err(Error::InvalidInput(_))));
        assert_eq!(std::fs::read(&first.container_path).unwrap(), before);
    }

    #[test]
    fn test_enroll_input_checks() {
        let device = tempfile::tempdir().unwrap();
        let config = SignerConfig::default();

        assert!(matches!(
            enroll(" ", device.path(), &device.path().join("k.pem"), &config),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            enroll("1234", device.path(), &device.path().join("k.txt"), &config),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            enroll(
                "1234",
                &device.path().join("missing"),
                &device.path().join("k.pem"),
                &config
            ),
            Err(Error::InvalidInput(_))
        ));
        assert!(!device.path().join("encrypted_private_key.bin").exists());
    }

    #[test]
    fn test_failed_public_key_export_leaves_device_clean() {
        let device = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let config = SignerConfig::default();
        let unwritable = out.path().join("missing").join("signer_public_key.pem");

        let result = enroll("1234", device.path(), &unwritable, &config);
        assert!(matches!(result, Err(Error::Io(_))));
        assert!(!config.container_path(device.path()).exists());

        // The device can be enrolled again straight away.
        let retry = out.path().join("signer_public_key.pem");
        let report = enroll("1234", device.path(), &retry, &config).unwrap();
        assert_eq!(PublicKey::from_file(&retry).unwrap(), report.public_key);
    }
}
