//! # Credential Staging
//!
//! Holds the decrypted private key and the ephemeral identity for the
//! duration of one signing call, and guarantees both are gone afterwards.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STAGING MODES                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  in_memory (default)                                                   │
//! │    CredentialPair ── key zeroized on drop                               │
//! │                                                                         │
//! │  temp_files                                                            │
//! │    <tmp>/.pinsign-XXXXXX/        (0700, unique per call)                │
//! │      ├── key.pem                 (0600, PKCS#8)                         │
//! │      └── identity.json           (0600)                                 │
//! │    key reloaded from key.pem for the signing step                       │
//! │    on drop: key.pem overwritten, then the directory is removed          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Either way the guard is dropped on every exit path of `sign`, so cleanup
//! does not depend on the caller remembering to do it.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use zeroize::Zeroizing;

use crate::crypto::SigningKeyPair;
use crate::custody::UnwrappedKey;
use crate::error::{Error, Result};
use crate::identity::EphemeralIdentity;

/// Staged private key file name
pub const STAGED_KEY_FILE: &str = "key.pem";

/// Staged identity file name
pub const STAGED_IDENTITY_FILE: &str = "identity.json";

/// Where credentials live while a signature is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStaging {
    /// Zeroizing in-memory handles only
    #[default]
    InMemory,
    /// Private single-use temporary files
    TempFiles,
}

/// The private key plus the identity that vouches for it.
#[derive(Debug)]
pub struct CredentialPair {
    key: UnwrappedKey,
    identity: EphemeralIdentity,
}

impl CredentialPair {
    /// Pair an unwrapped key with its identity
    pub fn new(key: UnwrappedKey, identity: EphemeralIdentity) -> Self {
        Self { key, identity }
    }

    /// The signing key
    pub fn keypair(&self) -> &SigningKeyPair {
        self.key.keypair()
    }

    /// The identity
    pub fn identity(&self) -> &EphemeralIdentity {
        &self.identity
    }
}

/// Scope guard over staged credentials.
#[derive(Debug)]
pub enum StagedCredentials {
    /// Held in memory
    InMemory(CredentialPair),
    /// Written to a private temporary directory
    TempFiles(TempCredentialFiles),
}

impl StagedCredentials {
    /// Stage `key` and `identity` according to `mode`.
    ///
    /// Temporary files go under `root`, or the system temporary directory
    /// when it is `None`.
    pub fn stage(
        mode: CredentialStaging,
        root: Option<&Path>,
        key: UnwrappedKey,
        identity: EphemeralIdentity,
    ) -> Result<Self> {
        match mode {
            CredentialStaging::InMemory => {
                Ok(StagedCredentials::InMemory(CredentialPair::new(key, identity)))
            }
            CredentialStaging::TempFiles => {
                // The in-memory key is dropped (and zeroized) once written.
                let files = TempCredentialFiles::write(root, &key, &identity)?;
                Ok(StagedCredentials::TempFiles(files))
            }
        }
    }

    /// Run `f` with the staged key and identity.
    pub fn with_credentials<T>(
        &self,
        f: impl FnOnce(&SigningKeyPair, &EphemeralIdentity) -> Result<T>,
    ) -> Result<T> {
        match self {
            StagedCredentials::InMemory(pair) => f(pair.keypair(), pair.identity()),
            StagedCredentials::TempFiles(files) => {
                let pair = files.load()?;
                f(pair.keypair(), pair.identity())
            }
        }
    }

    /// Staging directory, if files were used
    pub fn staging_dir(&self) -> Option<&Path> {
        match self {
            StagedCredentials::InMemory(_) => None,
            StagedCredentials::TempFiles(files) => Some(files.dir()),
        }
    }
}

/// Credential files in a private temporary directory, removed on drop.
#[derive(Debug)]
pub struct TempCredentialFiles {
    dir: TempDir,
    key_path: PathBuf,
    identity_path: PathBuf,
}

impl TempCredentialFiles {
    fn write(root: Option<&Path>, key: &UnwrappedKey, identity: &EphemeralIdentity) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(".pinsign-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| Error::Io(format!("Cannot create staging directory: {}", e)))?;
        restrict_dir(dir.path())?;

        let key_path = dir.path().join(STAGED_KEY_FILE);
        let identity_path = dir.path().join(STAGED_IDENTITY_FILE);

        let pem = key.keypair().to_pkcs8_pem()?;
        write_private(&key_path, pem.as_bytes())?;
        write_private(&identity_path, &serde_json::to_vec(identity)?)?;

        tracing::debug!(dir = %dir.path().display(), "Staged credentials to temporary files");

        Ok(Self {
            dir,
            key_path,
            identity_path,
        })
    }

    fn load(&self) -> Result<CredentialPair> {
        let pem = Zeroizing::new(std::fs::read_to_string(&self.key_path)?);
        let keypair = SigningKeyPair::from_pkcs8_pem(&pem)?;
        let identity: EphemeralIdentity =
            serde_json::from_slice(&std::fs::read(&self.identity_path)?)?;
        Ok(CredentialPair::new(UnwrappedKey::new(keypair), identity))
    }

    /// The staging directory
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

impl Drop for TempCredentialFiles {
    fn drop(&mut self) {
        // Overwrite the key before the directory itself is removed.
        if let Ok(meta) = std::fs::metadata(&self.key_path) {
            let zeros = vec![0u8; meta.len() as usize];
            if let Err(e) = std::fs::write(&self.key_path, zeros) {
                tracing::warn!(error = %e, "Could not overwrite staged key");
            }
        }
        tracing::debug!(dir = %self.dir.path().display(), "Removing staged credentials");
    }
}

fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .map_err(|e| Error::Io(format!("Cannot create {}: {}", path.display(), e)))?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(unix)]
fn restrict_dir(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_dir(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fresh() -> (UnwrappedKey, EphemeralIdentity) {
        let keypair = SigningKeyPair::generate();
        let identity =
            EphemeralIdentity::issue(&keypair, "User Certificate", None, Utc::now(), 365)
                .unwrap();
        (UnwrappedKey::new(keypair), identity)
    }

    #[test]
    fn test_in_memory_staging() {
        let (key, identity) = fresh();
        let expected = *key.public_key();

        let staged =
            StagedCredentials::stage(CredentialStaging::InMemory, None, key, identity).unwrap();
        assert!(staged.staging_dir().is_none());

        let public = staged
            .with_credentials(|kp, id| {
                assert_eq!(id.public_key, kp.public_key());
                Ok(kp.public_key())
            })
            .unwrap();
        assert_eq!(public, expected);
    }

    #[test]
    fn test_temp_files_reload_and_cleanup() {
        let (key, identity) = fresh();
        let expected = *key.public_key();

        let staged =
            StagedCredentials::stage(CredentialStaging::TempFiles, None, key, identity.clone())
                .unwrap();
        let dir = staged.staging_dir().unwrap().to_path_buf();
        assert!(dir.join(STAGED_KEY_FILE).is_file());
        assert!(dir.join(STAGED_IDENTITY_FILE).is_file());

        staged
            .with_credentials(|kp, id| {
                assert_eq!(kp.public_key(), expected);
                assert_eq!(id, &identity);
                Ok(())
            })
            .unwrap();

        drop(staged);
        assert!(!dir.exists());
    }

    #[test]
    fn test_temp_files_removed_on_error_path() {
        let (key, identity) = fresh();
        let staged =
            StagedCredentials::stage(CredentialStaging::TempFiles, None, key, identity).unwrap();
        let dir = staged.staging_dir().unwrap().to_path_buf();

        let result: Result<()> =
            staged.with_credentials(|_, _| Err(Error::Io("disk full".into())));
        assert!(result.is_err());

        drop(staged);
        assert!(!dir.exists());
    }

    #[test]
    fn test_concurrent_stagings_use_distinct_dirs() {
        let (k1, i1) = fresh();
        let (k2, i2) = fresh();
        let a = StagedCredentials::stage(CredentialStaging::TempFiles, None, k1, i1).unwrap();
        let b = StagedCredentials::stage(CredentialStaging::TempFiles, None, k2, i2).unwrap();
        assert_ne!(a.staging_dir(), b.staging_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_staged_files_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let (key, identity) = fresh();
        let staged =
            StagedCredentials::stage(CredentialStaging::TempFiles, None, key, identity).unwrap();
        let dir = staged.staging_dir().unwrap();

        let mode = std::fs::metadata(dir.join(STAGED_KEY_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);

        let dir_mode = std::fs::metadata(dir).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[test]
    fn test_staging_mode_serde() {
        let mode: CredentialStaging = serde_json::from_str("\"temp_files\"").unwrap();
        assert_eq!(mode, CredentialStaging::TempFiles);
        assert_eq!(CredentialStaging::default(), CredentialStaging::InMemory);
    }
}
