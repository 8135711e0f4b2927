//! Enroll a device, detect it, sign with the PIN, verify with the exported
//! public key.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pinsign_core::{
    enroll, unwrap, verify, DeviceMonitor, DeviceState, Error, SignerConfig, SigningEngine,
    SigningKeyPair, VerificationOutcome,
};
use tempfile::TempDir;

const DOC: &[u8] = b"%PDF-1.7\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n\
trailer\n<< /Root 1 0 R >>\n%%EOF\n";

struct Workspace {
    _root: TempDir,
    device: PathBuf,
    docs: PathBuf,
    public_key: PathBuf,
    config: Arc<SignerConfig>,
}

fn workspace() -> Workspace {
    let root = tempfile::tempdir().unwrap();
    let device = root.path().join("usb");
    let docs = root.path().join("docs");
    std::fs::create_dir(&device).unwrap();
    std::fs::create_dir(&docs).unwrap();

    let config = Arc::new(SignerConfig {
        mount_points: vec![root.path().join("not-mounted"), device.clone()],
        ..SignerConfig::default()
    });

    Workspace {
        public_key: docs.join("signer_public_key.pem"),
        _root: root,
        device,
        docs,
        config,
    }
}

fn write(path: &Path, bytes: &[u8]) -> PathBuf {
    std::fs::write(path, bytes).unwrap();
    path.to_path_buf()
}

#[test]
fn scenario_enroll_sign_verify() {
    let ws = workspace();
    let monitor = DeviceMonitor::new(ws.config.clone());

    // Empty stick.
    assert_eq!(
        monitor.poll_once(),
        DeviceState::PresentWithoutKey {
            mount_path: ws.device.clone()
        }
    );

    let report = enroll("1234", &ws.device, &ws.public_key, &ws.config).unwrap();
    assert!(monitor.poll_once().has_key());
    assert_eq!(monitor.get_state().container_path(), Some(report.container_path.as_path()));

    let engine = SigningEngine::new(ws.config.clone(), monitor.handle());
    let doc = write(&ws.docs.join("doc.pdf"), DOC);

    // Wrong PIN: classified, no output.
    assert!(matches!(engine.sign(&doc, "0000"), Err(Error::WrongPin)));
    assert!(!ws.docs.join("doc_signed.pdf").exists());

    let artifact = engine.sign(&doc, "1234").unwrap();
    assert_eq!(artifact.path, ws.docs.join("doc_signed.pdf"));

    let verdict = verify(&artifact.path, &ws.public_key).unwrap();
    assert_eq!(verdict.outcome, VerificationOutcome::ValidMatch);
    assert_eq!(
        verdict.identity.unwrap().display_name,
        ws.config.display_name
    );
}

#[test]
fn unrelated_key_is_a_mismatch() {
    let ws = workspace();
    enroll("1234", &ws.device, &ws.public_key, &ws.config).unwrap();
    let monitor = DeviceMonitor::new(ws.config.clone());
    monitor.poll_once();

    let doc = write(&ws.docs.join("doc.pdf"), DOC);
    let artifact = SigningEngine::new(ws.config.clone(), monitor.handle())
        .sign(&doc, "1234")
        .unwrap();

    let stranger = ws.docs.join("stranger.der");
    std::fs::write(
        &stranger,
        SigningKeyPair::generate().public_key().to_der().unwrap(),
    )
    .unwrap();

    assert_eq!(
        verify(&artifact.path, &stranger).unwrap().outcome,
        VerificationOutcome::ValidKeyMismatch
    );
}

#[test]
fn single_byte_mutation_is_invalid() {
    let ws = workspace();
    enroll("1234", &ws.device, &ws.public_key, &ws.config).unwrap();
    let monitor = DeviceMonitor::new(ws.config.clone());
    monitor.poll_once();

    let doc = write(&ws.docs.join("doc.pdf"), DOC);
    let artifact = SigningEngine::new(ws.config.clone(), monitor.handle())
        .sign(&doc, "1234")
        .unwrap();

    let mut bytes = std::fs::read(&artifact.path).unwrap();
    // Inside "/Count 0"
    let at = DOC.windows(8).position(|w| w == b"/Count 0").unwrap() + 7;
    bytes[at] = b'1';
    let tampered = write(&ws.docs.join("tampered.pdf"), &bytes);

    assert_eq!(
        verify(&tampered, &ws.public_key).unwrap().outcome,
        VerificationOutcome::SignatureInvalid
    );
}

#[test]
fn unsigned_document_has_no_signature() {
    let ws = workspace();
    enroll("1234", &ws.device, &ws.public_key, &ws.config).unwrap();
    let doc = write(&ws.docs.join("plain.pdf"), DOC);

    assert_eq!(
        verify(&doc, &ws.public_key).unwrap().outcome,
        VerificationOutcome::NoSignaturePresent
    );
}

#[test]
fn round_trip_and_wrong_pin_through_custody() {
    let ws = workspace();
    let report = enroll("correct horse", &ws.device, &ws.public_key, &ws.config).unwrap();

    let key = unwrap("correct horse", &report.container_path).unwrap();
    assert_eq!(key.public_key(), &report.public_key);

    for pin in ["1234", "correct hors", "Correct horse"] {
        assert!(matches!(
            unwrap(pin, &report.container_path),
            Err(Error::WrongPin)
        ));
    }
}

#[test]
fn device_removed_between_polls_reports_no_device() {
    let ws = workspace();
    enroll("1234", &ws.device, &ws.public_key, &ws.config).unwrap();
    let monitor = DeviceMonitor::new(ws.config.clone());
    monitor.poll_once();

    std::fs::remove_dir_all(&ws.device).unwrap();
    assert_eq!(monitor.poll_once(), DeviceState::Absent);

    let doc = write(&ws.docs.join("doc.pdf"), DOC);
    let result = SigningEngine::new(ws.config.clone(), monitor.handle()).sign(&doc, "1234");
    assert!(matches!(result, Err(Error::NoDevice)));
    assert_eq!(result.unwrap_err().remedy(), pinsign_core::Remedy::ReinsertDevice);
}
