//! # Device Watch Demo
//!
//! Runs the device monitor loop against a temporary "mount point" and
//! simulates inserting and pulling a credential stick.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example device_watch
//! ```

use std::sync::Arc;
use std::time::Duration;

use pinsign_core::{DeviceMonitor, SignerConfig};

#[tokio::main]
async fn main() {
    println!("=== PinSign Core: Device Watch Demo ===\n");

    let workdir = tempfile::tempdir().expect("Failed to create temp dir");
    let usb = workdir.path().join("usb");

    let config = Arc::new(SignerConfig {
        mount_points: vec![usb.clone()],
        poll_interval_ms: 100,
        ..SignerConfig::default()
    });
    let container = config.container_path(&usb);

    let monitor = Arc::new(DeviceMonitor::new(config));
    let mut changes = monitor.subscribe();
    let poller = monitor.spawn();

    let printer = tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let state = changes.borrow_and_update().clone();
            println!("  [state] {}", state);
        }
    });

    let pause = Duration::from_millis(400);

    println!("Step 1: Nothing mounted");
    tokio::time::sleep(pause).await;

    println!("Step 2: Empty stick mounted");
    std::fs::create_dir(&usb).expect("Failed to create mount point");
    tokio::time::sleep(pause).await;

    println!("Step 3: Key container copied on");
    std::fs::write(&container, [0xA5u8; 96]).expect("Failed to write container");
    tokio::time::sleep(pause).await;

    println!("Step 4: Stick pulled");
    std::fs::remove_dir_all(&usb).expect("Failed to remove mount point");
    tokio::time::sleep(pause).await;

    poller.abort();
    printer.abort();
    println!();
    println!("=== Example Complete ===");
}
