//! # Device Monitor
//!
//! Answers "is a credential device present, and where is its key container?"
//! without ever blocking the caller.
//!
//! ## State Publication
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     SINGLE WRITER, MANY READERS                         │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   poll loop (every poll_interval)                                      │
//! │     │                                                                   │
//! │     │  scan mount points in order                                       │
//! │     ▼                                                                   │
//! │   DeviceState (immutable value)                                         │
//! │     │                                                                   │
//! │     │  watch::Sender::send_replace  (whole value swapped at once)       │
//! │     ▼                                                                   │
//! │   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐                │
//! │   │ DeviceHandle │   │ DeviceHandle │   │ watch::Rx    │ ...            │
//! │   │  .state()    │   │  .state()    │   │  .changed()  │                │
//! │   └──────────────┘   └──────────────┘   └──────────────┘                │
//! │     copy-on-read snapshot, never a torn value                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Classification
//!
//! | Mount point | Container file | Result |
//! |-------------|----------------|--------|
//! | exists | exists, > 28 bytes | `PresentWithKey` (first such mount wins) |
//! | exists | missing or ≤ 28 bytes | `PresentWithoutKey` (first such mount) |
//! | none exist | - | `Absent` |
//!
//! Unreadable mounts count as "not found there". Scan failures are never
//! returned to the caller; the next poll tries again.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SignerConfig;
use crate::custody::KeyContainer;

/// Presence of the credential device and its key container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeviceState {
    /// No candidate mount point exists
    Absent,
    /// A mount point exists but holds no usable container
    PresentWithoutKey {
        /// The mount point that was found
        mount_path: PathBuf,
    },
    /// A mount point holds a plausible key container
    PresentWithKey {
        /// The mount point holding the container
        mount_path: PathBuf,
        /// Full path of the container file
        container_path: PathBuf,
    },
}

impl DeviceState {
    /// Container path, if a key is present
    pub fn container_path(&self) -> Option<&Path> {
        match self {
            DeviceState::PresentWithKey { container_path, .. } => Some(container_path),
            _ => None,
        }
    }

    /// Mount path, if any device is present
    pub fn mount_path(&self) -> Option<&Path> {
        match self {
            DeviceState::Absent => None,
            DeviceState::PresentWithoutKey { mount_path }
            | DeviceState::PresentWithKey { mount_path, .. } => Some(mount_path),
        }
    }

    /// Whether signing can proceed
    pub fn has_key(&self) -> bool {
        matches!(self, DeviceState::PresentWithKey { .. })
    }
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceState::Absent => write!(f, "No device detected"),
            DeviceState::PresentWithoutKey { mount_path } => {
                write!(f, "Device at {} has no key container", mount_path.display())
            }
            DeviceState::PresentWithKey { container_path, .. } => {
                write!(f, "Key container found at {}", container_path.display())
            }
        }
    }
}

/// Read-only view of the published device state.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    state_rx: watch::Receiver<DeviceState>,
}

impl DeviceHandle {
    /// Latest published state snapshot
    pub fn state(&self) -> DeviceState {
        self.state_rx.borrow().clone()
    }
}

/// Background poller over the configured mount points.
pub struct DeviceMonitor {
    config: Arc<SignerConfig>,
    state_tx: watch::Sender<DeviceState>,
    /// Serializes scans so published states stay totally ordered
    poll_lock: Mutex<()>,
}

impl DeviceMonitor {
    /// Create a monitor in the `Absent` state. Nothing is scanned yet.
    pub fn new(config: Arc<SignerConfig>) -> Self {
        let (state_tx, _) = watch::channel(DeviceState::Absent);
        Self {
            config,
            state_tx,
            poll_lock: Mutex::new(()),
        }
    }

    /// Scan once, publish and return the result.
    pub fn poll_once(&self) -> DeviceState {
        let _guard = self.poll_lock.lock();

        let state = scan(&self.config);
        let previous = self.state_tx.send_replace(state.clone());

        if previous != state {
            tracing::info!(
                from = %previous,
                to = %state,
                "Device state changed"
            );
        }

        state
    }

    /// Last published state. Never blocks on a scan in progress.
    pub fn get_state(&self) -> DeviceState {
        self.state_tx.borrow().clone()
    }

    /// Cloneable reader for other tasks and threads
    pub fn handle(&self) -> DeviceHandle {
        DeviceHandle {
            state_rx: self.state_tx.subscribe(),
        }
    }

    /// Receiver that wakes on each state change
    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.state_tx.subscribe()
    }

    /// Configuration in use
    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    /// Start the polling loop. It runs until the runtime shuts down or the
    /// handle is aborted.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let period = monitor.config.poll_interval();
            tracing::info!(
                period_ms = period.as_millis() as u64,
                mounts = monitor.config.mount_points.len(),
                "Device monitor started"
            );

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let worker = Arc::clone(&monitor);
                if let Err(e) = tokio::task::spawn_blocking(move || worker.poll_once()).await {
                    tracing::warn!(error = %e, "Device poll task failed");
                }
            }
        })
    }
}

/// Classify the configured mount points.
fn scan(config: &SignerConfig) -> DeviceState {
    let mut first_without_key: Option<PathBuf> = None;

    for mount in &config.mount_points {
        if !is_dir(mount) {
            continue;
        }

        let container_path = config.container_path(mount);
        if has_plausible_container(&container_path) {
            return DeviceState::PresentWithKey {
                mount_path: mount.clone(),
                container_path,
            };
        }

        if first_without_key.is_none() {
            first_without_key = Some(mount.clone());
        }
    }

    match first_without_key {
        Some(mount_path) => DeviceState::PresentWithoutKey { mount_path },
        None => DeviceState::Absent,
    }
}

fn is_dir(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_dir(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Mount point not accessible");
            false
        }
    }
}

/// Existence and size only; the container is not opened.
fn has_plausible_container(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && KeyContainer::is_plausible_len(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Key container not accessible");
            false
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const NAME: &str = "encrypted_private_key.bin";

    fn config_for(mounts: &[&Path]) -> Arc<SignerConfig> {
        Arc::new(SignerConfig {
            mount_points: mounts.iter().map(|p| p.to_path_buf()).collect(),
            poll_interval_ms: 10,
            ..SignerConfig::default()
        })
    }

    #[test]
    fn test_absent_when_no_mount_exists() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-mounted");
        let monitor = DeviceMonitor::new(config_for(&[&missing]));

        assert_eq!(monitor.poll_once(), DeviceState::Absent);
        assert_eq!(monitor.get_state(), DeviceState::Absent);
    }

    #[test]
    fn test_short_container_is_present_without_key() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(NAME), [0u8; 28]).unwrap();
        let monitor = DeviceMonitor::new(config_for(&[dir.path()]));

        assert_eq!(
            monitor.poll_once(),
            DeviceState::PresentWithoutKey {
                mount_path: dir.path().to_path_buf()
            }
        );
    }

    #[test]
    fn test_valid_container_is_present_with_key() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(NAME), [0u8; 29]).unwrap();
        let monitor = DeviceMonitor::new(config_for(&[dir.path()]));

        let state = monitor.poll_once();
        assert!(state.has_key());
        assert_eq!(state.container_path(), Some(dir.path().join(NAME).as_path()));
    }

    #[test]
    fn test_first_valid_container_wins_over_earlier_empty_mount() {
        let empty = tempfile::tempdir().unwrap();
        let keyed_a = tempfile::tempdir().unwrap();
        let keyed_b = tempfile::tempdir().unwrap();
        std::fs::write(keyed_a.path().join(NAME), [1u8; 64]).unwrap();
        std::fs::write(keyed_b.path().join(NAME), [1u8; 64]).unwrap();

        let monitor =
            DeviceMonitor::new(config_for(&[empty.path(), keyed_a.path(), keyed_b.path()]));

        assert_eq!(
            monitor.poll_once().mount_path(),
            Some(keyed_a.path())
        );
    }

    #[test]
    fn test_container_directory_is_not_a_key() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(NAME)).unwrap();
        let monitor = DeviceMonitor::new(config_for(&[dir.path()]));

        assert!(matches!(
            monitor.poll_once(),
            DeviceState::PresentWithoutKey { .. }
        ));
    }

    #[test]
    fn test_state_follows_removal() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join(NAME);
        std::fs::write(&container, [1u8; 64]).unwrap();
        let monitor = DeviceMonitor::new(config_for(&[dir.path()]));
        let handle = monitor.handle();

        assert!(monitor.poll_once().has_key());
        assert!(handle.state().has_key());

        std::fs::remove_file(&container).unwrap();
        monitor.poll_once();
        assert!(!handle.state().has_key());
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_state() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join(NAME);
        let monitor = Arc::new(DeviceMonitor::new(config_for(&[dir.path()])));
        let expected_container = container.clone();
        let mount = dir.path().to_path_buf();

        let readers: Vec<_> = (0..50)
            .map(|_| {
                let handle = monitor.handle();
                let mount = mount.clone();
                let expected_container = expected_container.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        match handle.state() {
                            DeviceState::Absent => {}
                            DeviceState::PresentWithoutKey { mount_path } => {
                                assert_eq!(mount_path, mount)
                            }
                            DeviceState::PresentWithKey {
                                mount_path,
                                container_path,
                            } => {
                                assert_eq!(mount_path, mount);
                                assert_eq!(container_path, expected_container);
                            }
                        }
                    }
                })
            })
            .collect();

        for i in 0..100 {
            if i % 2 == 0 {
                std::fs::write(&container, [7u8; 64]).unwrap();
            } else {
                let _ = std::fs::remove_file(&container);
            }
            monitor.poll_once();
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[tokio::test]
    async fn test_spawned_loop_publishes_changes() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = Arc::new(DeviceMonitor::new(config_for(&[dir.path()])));
        let mut rx = monitor.subscribe();
        let task = monitor.spawn();

        // Empty mount first.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if matches!(*rx.borrow_and_update(), DeviceState::PresentWithoutKey { .. }) {
                    break;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        std::fs::write(dir.path().join(NAME), [9u8; 64]).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if rx.borrow_and_update().has_key() {
                    break;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        task.abort();
    }

    #[tokio::test]
    async fn test_zero_interval_loop_keeps_running() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(SignerConfig {
            mount_points: vec![dir.path().to_path_buf()],
            poll_interval_ms: 0,
            ..SignerConfig::default()
        });
        let monitor = Arc::new(DeviceMonitor::new(config));
        let mut rx = monitor.subscribe();
        let task = monitor.spawn();

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if matches!(*rx.borrow_and_update(), DeviceState::PresentWithoutKey { .. }) {
                    break;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());
        task.abort();
    }
}
