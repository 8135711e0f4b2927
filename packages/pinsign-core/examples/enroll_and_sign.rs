//! # Enroll and Sign Demo
//!
//! Provisions a simulated USB stick in a temporary directory, signs a small
//! PDF with the PIN, then verifies it three ways.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example enroll_and_sign
//! ```

use std::sync::Arc;

use pinsign_core::{
    enroll, verify, DeviceMonitor, Error, ProgressReporter, SignerConfig, SigningEngine,
    SigningKeyPair,
};

const PIN: &str = "1234";
const PDF: &[u8] = b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n";

fn main() {
    println!("=== PinSign Core: Enroll and Sign Demo ===\n");

    let workdir = tempfile::tempdir().expect("Failed to create temp dir");
    let usb = workdir.path().join("usb");
    std::fs::create_dir(&usb).expect("Failed to create fake mount point");

    let config = Arc::new(SignerConfig {
        mount_points: vec![usb.clone()],
        ..SignerConfig::default()
    });

    // Step 1: Enroll
    println!("Step 1: Enrolling the device with PIN \"{}\"...", PIN);
    let public_key_path = workdir.path().join("signer_public_key.pem");
    let report = enroll(PIN, &usb, &public_key_path, &config).expect("Enrollment failed");
    println!("  Container:   {}", report.container_path.display());
    println!("  Public key:  {}", report.public_key_path.display());
    println!("  Fingerprint: {}", report.fingerprint);
    println!();

    // Step 2: Detect
    println!("Step 2: Polling for the device...");
    let monitor = DeviceMonitor::new(config.clone());
    println!("  {}", monitor.poll_once());
    println!();

    println!("  ┌─────────────────────────────────────────────────────────────┐");
    println!("  │                      SIGNING FLOW                           │");
    println!("  ├─────────────────────────────────────────────────────────────┤");
    println!("  │                                                             │");
    println!("  │  PIN ──► SHA-256 ──► AES-256-GCM unwrap ──► Ed25519 key    │");
    println!("  │                                                │            │");
    println!("  │  document ──► SHA-256 ──────────────► Ed25519 sign          │");
    println!("  │                                                │            │");
    println!("  │  document || %PINSIGN-SIGNATURE-V1 slot ──► doc_signed.pdf  │");
    println!("  │                                                             │");
    println!("  └─────────────────────────────────────────────────────────────┘");
    println!();

    // Step 3: Sign with the wrong PIN
    let doc = workdir.path().join("doc.pdf");
    std::fs::write(&doc, PDF).expect("Failed to write document");
    let engine = SigningEngine::new(config.clone(), monitor.handle());

    println!("Step 3: Signing with the wrong PIN...");
    match engine.sign(&doc, "0000") {
        Err(Error::WrongPin) => println!("  [OK] Rejected: {}", Error::WrongPin),
        other => println!("  [FAILED] Unexpected result: {:?}", other),
    }
    println!();

    // Step 4: Sign with the right PIN
    println!("Step 4: Signing with the right PIN...");
    let (reporter, mut rx) = ProgressReporter::channel();
    let artifact = engine
        .sign_with_progress(&doc, PIN, &reporter)
        .expect("Signing failed");
    while let Ok(step) = rx.try_recv() {
        println!("  {}", step);
    }
    println!();

    // Step 5: Verify
    println!("Step 5: Verifying...");
    let verdict = verify(&artifact.path, &public_key_path).expect("Verification failed");
    println!("  With the signer's key:");
    for line in verdict.summary().lines() {
        println!("    {}", line);
    }

    let stranger = workdir.path().join("stranger.pem");
    std::fs::write(
        &stranger,
        SigningKeyPair::generate()
            .public_key()
            .to_pem()
            .expect("Failed to encode key"),
    )
    .expect("Failed to write key");
    let verdict = verify(&artifact.path, &stranger).expect("Verification failed");
    println!("  With an unrelated key:\n    {}", verdict.summary());

    let verdict = verify(&doc, &public_key_path).expect("Verification failed");
    println!("  The unsigned original:\n    {}", verdict.summary());
    println!();

    println!("=== Example Complete ===");
}
