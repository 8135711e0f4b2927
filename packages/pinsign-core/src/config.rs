//! Signer configuration.
//!
//! Defaults reproduce the fixed behaviour of a stock installation. A TOML
//! file may override any subset of fields:
//!
//! ```toml
//! mount_points = ["/media/usb", "/run/media/alice/KEY"]
//! poll_interval_ms = 2000
//! display_name = "Alice Example"
//! organisation = "Example Ltd"
//! credential_staging = "temp_files"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::credentials::CredentialStaging;
use crate::error::{Error, Result};

/// Default key container file name on the device root
pub const DEFAULT_CONTAINER_FILE_NAME: &str = "encrypted_private_key.bin";

/// Default device poll period
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// Shortest poll period the monitor loop will run at
pub const MIN_POLL_INTERVAL_MS: u64 = 10;

/// Default suffix inserted before the extension of signed output
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_signed";

/// Default display name on the ephemeral identity
pub const DEFAULT_DISPLAY_NAME: &str = "User Certificate";

/// Default ephemeral identity lifetime
pub const DEFAULT_VALIDITY_DAYS: u32 = 365;

/// Candidate mount points scanned for the credential device, in order.
pub fn default_mount_points() -> Vec<PathBuf> {
    if cfg!(windows) {
        ["D:\\", "E:\\", "F:\\", "G:\\", "H:\\"]
            .iter()
            .map(PathBuf::from)
            .collect()
    } else {
        ["/media/usb", "/media/usb0", "/mnt/usb", "/Volumes/USB"]
            .iter()
            .map(PathBuf::from)
            .collect()
    }
}

/// Configuration shared by the device monitor and the engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignerConfig {
    /// Mount points scanned in order; the first with a valid container wins
    pub mount_points: Vec<PathBuf>,
    /// Key container file name at the device root
    pub container_file_name: String,
    /// Device poll period in milliseconds
    pub poll_interval_ms: u64,
    /// Suffix for the signed output file name
    pub output_suffix: String,
    /// Display name on the ephemeral identity
    pub display_name: String,
    /// Optional organisation on the ephemeral identity
    pub organisation: Option<String>,
    /// Ephemeral identity lifetime
    pub validity_days: u32,
    /// Where decrypted credentials live while a signature is produced
    pub credential_staging: CredentialStaging,
    /// Parent directory for `temp_files` staging; the system temporary
    /// directory when unset
    pub staging_dir: Option<PathBuf>,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            mount_points: default_mount_points(),
            container_file_name: DEFAULT_CONTAINER_FILE_NAME.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            organisation: None,
            validity_days: DEFAULT_VALIDITY_DAYS,
            credential_staging: CredentialStaging::default(),
            staging_dir: None,
        }
    }
}

impl SignerConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SignerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "Loaded signer config");
        Ok(config)
    }

    /// Device poll period, never shorter than [`MIN_POLL_INTERVAL_MS`].
    ///
    /// An unvalidated config with a zero interval still yields a usable
    /// period here.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    /// Path of the key container on a given mount point
    pub fn container_path(&self, mount_point: &Path) -> PathBuf {
        mount_point.join(&self.container_file_name)
    }

    /// Check invariants the rest of the crate relies on.
    pub fn validate(&self) -> Result<()> {
        if self.mount_points.is_empty() {
            return Err(Error::InvalidInput("No mount points configured".into()));
        }
        if self.container_file_name.is_empty()
            || self.container_file_name.contains(['/', '\\'])
        {
            return Err(Error::InvalidInput(format!(
                "Container file name must be a bare file name, got {:?}",
                self.container_file_name
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidInput("Poll interval must be positive".into()));
        }
        if self.output_suffix.is_empty() || self.output_suffix.contains(['/', '\\', '.']) {
            return Err(Error::InvalidInput(format!(
                "Output suffix must be non-empty without separators or dots, got {:?}",
                self.output_suffix
            )));
        }
        if self.display_name.trim().is_empty() {
            return Err(Error::InvalidInput("Display name cannot be empty".into()));
        }
        if self.validity_days == 0 {
            return Err(Error::InvalidInput("Validity must be at least one day".into()));
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
