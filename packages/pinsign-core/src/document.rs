//! # Signed Document Format
//!
//! A signed artifact is the original document followed by one signature
//! slot. Everything before the slot marker is the signed content.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SIGNED ARTIFACT                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  %PDF-1.7                                     ┐                         │
//! │  ... original objects ...                     │  content                │
//! │  %%EOF                                        ┘  (digested)             │
//! │  \n%PINSIGN-SIGNATURE-V1 <base64(json)>\n     ── signature slot         │
//! │                                                                         │
//! │  json = {                                                               │
//! │    "version": 1,                                                        │
//! │    "digest_algorithm": "sha256",                                        │
//! │    "signature": "<hex Ed25519 over SHA-256(content)>",                 │
//! │    "signed_at": "...",                                                  │
//! │    "identity": { EphemeralIdentity }                                    │
//! │  }                                                                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! PDF readers ignore data after the final `%%EOF` comment, so the signed
//! file still opens normally.

use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{DigestAlgorithm, Signature};
use crate::error::{Error, Result};
use crate::identity::EphemeralIdentity;

/// Current envelope format version
pub const FORMAT_VERSION: u32 = 1;

/// Opens the signature slot
pub const SIGNATURE_MARKER: &[u8] = b"\n%PINSIGN-SIGNATURE-V1 ";

const PDF_HEADER: &[u8] = b"%PDF-";
const PDF_EOF: &[u8] = b"%%EOF";

/// Contents of the signature slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEnvelope {
    /// Format version, [`FORMAT_VERSION`] when written
    pub version: u32,
    /// Digest algorithm identifier
    pub digest_algorithm: String,
    /// Signature over the content digest
    pub signature: Signature,
    /// Signing time
    pub signed_at: DateTime<Utc>,
    /// Who claims to have signed
    pub identity: EphemeralIdentity,
}

impl SignatureEnvelope {
    /// Build a current-version envelope
    pub fn new(
        algorithm: DigestAlgorithm,
        signature: Signature,
        signed_at: DateTime<Utc>,
        identity: EphemeralIdentity,
    ) -> Self {
        Self {
            version: FORMAT_VERSION,
            digest_algorithm: algorithm.id().to_string(),
            signature,
            signed_at,
            identity,
        }
    }

    /// Encode as a complete slot, marker included
    pub fn to_slot(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        let mut slot = Vec::with_capacity(SIGNATURE_MARKER.len() + json.len() * 4 / 3 + 8);
        slot.extend_from_slice(SIGNATURE_MARKER);
        slot.extend_from_slice(BASE64.encode(json).as_bytes());
        slot.push(b'\n');
        Ok(slot)
    }

    /// Decode the bytes following the marker.
    ///
    /// Exactly one base64 line, optionally newline-terminated.
    pub fn from_slot_body(body: &[u8]) -> Result<Self> {
        let line = body.strip_suffix(b"\n").unwrap_or(body);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.contains(&b'\n') {
            return Err(Error::Serialization(
                "Unexpected data after the signature slot".into(),
            ));
        }

        let json = BASE64
            .decode(line)
            .map_err(|e| Error::Serialization(format!("Signature slot is not base64: {}", e)))?;
        Ok(serde_json::from_slice(&json)?)
    }
}

/// A document split at the signature marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitDocument<'a> {
    /// Bytes that are (or will be) signed
    pub content: &'a [u8],
    /// Bytes after the marker, if a slot exists
    pub slot_body: Option<&'a [u8]>,
}

/// Split at the first signature marker.
pub fn split(bytes: &[u8]) -> SplitDocument<'_> {
    match find(bytes, SIGNATURE_MARKER) {
        Some(at) => SplitDocument {
            content: &bytes[..at],
            slot_body: Some(&bytes[at + SIGNATURE_MARKER.len()..]),
        },
        None => SplitDocument {
            content: bytes,
            slot_body: None,
        },
    }
}

/// Offset of the last `%%EOF` comment
pub fn find_eof_offset(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(PDF_EOF.len())
        .rposition(|window| window == PDF_EOF)
}

/// Check that `bytes` look like an unsigned PDF.
pub fn ensure_signable(bytes: &[u8]) -> Result<()> {
    if !bytes.starts_with(PDF_HEADER) {
        return Err(Error::InvalidInput(
            "Document is not a PDF (missing %PDF- header)".into(),
        ));
    }
    if find_eof_offset(bytes).is_none() {
        return Err(Error::InvalidInput(
            "Document is not a complete PDF (missing %%EOF)".into(),
        ));
    }
    if split(bytes).slot_body.is_some() {
        return Err(Error::InvalidInput("Document is already signed".into()));
    }
    Ok(())
}

/// Read a whole document.
pub fn read_document(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::Io(format!("Cannot read {}: {}", path.display(), e)))
}

/// `dir/report.pdf` → `dir/report<suffix>.pdf`
pub fn signed_output_path(input: &Path, suffix: &str) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            Error::InvalidInput(format!("{} has no usable file name", input.display()))
        })?;

    let file_name = match input.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext),
        None => format!("{}{}", stem, suffix),
    };
    Ok(input.with_file_name(file_name))
}

/// Write `parts` to `path` via a temporary file in the same directory.
///
/// On any error the temporary file is removed and `path` is untouched.
pub fn write_atomic(path: &Path, parts: &[&[u8]]) -> Result<()> {
    let tmp = write_temp(path, parts)?;
    tmp.persist(path)
        .map_err(|e| Error::Io(format!("Cannot write {}: {}", path.display(), e.error)))?;
    Ok(())
}

/// [`write_atomic`], but never replaces an existing file.
///
/// A file that appears at `path` while the temporary is being written is
/// left as it is and reported as [`Error::InvalidInput`].
pub fn write_new(path: &Path, parts: &[&[u8]]) -> Result<()> {
    let tmp = write_temp(path, parts)?;
    tmp.persist_noclobber(path).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            Error::InvalidInput(format!("{} already exists", path.display()))
        } else {
            Error::Io(format!("Cannot write {}: {}", path.display(), e.error))
        }
    })?;
    Ok(())
}

fn write_temp(path: &Path, parts: &[&[u8]]) -> Result<tempfile::NamedTempFile> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| Error::Io(format!("Cannot create temporary file in {}: {}", dir.display(), e)))?;
    for part in parts {
        tmp.write_all(part)?;
    }
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{sign, SigningKeyPair};

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n<< >>\n%%EOF\n";

    fn envelope() -> SignatureEnvelope {
        let keypair = SigningKeyPair::generate();
        let identity =
            EphemeralIdentity::issue(&keypair, "User Certificate", None, Utc::now(), 365)
                .unwrap();
        let digest = DigestAlgorithm::CURRENT.digest(PDF);
        SignatureEnvelope::new(
            DigestAlgorithm::CURRENT,
            sign(&keypair, &digest),
            crate::time::now(),
            identity,
        )
    }

    #[test]
    fn test_split_unsigned() {
        let split = split(PDF);
        assert_eq!(split.content, PDF);
        assert!(split.slot_body.is_none());
    }

    #[test]
    fn test_slot_round_trip() {
        let env = envelope();
        let slot = env.to_slot().unwrap();

        let mut signed = PDF.to_vec();
        signed.extend_from_slice(&slot);

        let parts = split(&signed);
        assert_eq!(parts.content, PDF);
        let decoded = SignatureEnvelope::from_slot_body(parts.slot_body.unwrap()).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn test_garbage_slot_rejected() {
        assert!(SignatureEnvelope::from_slot_body(b"!!!not base64!!!\n").is_err());
        let not_json = BASE64.encode(b"{ nope");
        assert!(SignatureEnvelope::from_slot_body(not_json.as_bytes()).is_err());
    }

    #[test]
    fn test_trailing_data_after_slot_rejected() {
        let slot = envelope().to_slot().unwrap();
        let mut body = slot[SIGNATURE_MARKER.len()..].to_vec();
        body.extend_from_slice(b"appended\n");
        assert!(SignatureEnvelope::from_slot_body(&body).is_err());
    }

    #[test]
    fn test_ensure_signable() {
        assert!(ensure_signable(PDF).is_ok());
        assert!(matches!(
            ensure_signable(b"hello world %%EOF"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            ensure_signable(b"%PDF-1.4 truncated"),
            Err(Error::InvalidInput(_))
        ));

        let mut signed = PDF.to_vec();
        signed.extend_from_slice(&envelope().to_slot().unwrap());
        assert!(matches!(ensure_signable(&signed), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_find_eof_offset_uses_last() {
        let bytes = b"%PDF-1.4\n%%EOF\nupdate\n%%EOF\n";
        assert_eq!(find_eof_offset(bytes), Some(22));
        assert_eq!(find_eof_offset(b"%PDF-"), None);
    }

    #[test]
    fn test_signed_output_path() {
        assert_eq!(
            signed_output_path(Path::new("/docs/report.pdf"), "_signed").unwrap(),
            PathBuf::from("/docs/report_signed.pdf")
        );
        assert_eq!(
            signed_output_path(Path::new("doc.v2.pdf"), "_signed").unwrap(),
            PathBuf::from("doc.v2_signed.pdf")
        );
        assert_eq!(
            signed_output_path(Path::new("README"), "_signed").unwrap(),
            PathBuf::from("README_signed")
        );
        assert!(signed_output_path(Path::new("/"), "_signed").is_err());
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");

        write_atomic(&path, &[b"%PDF-", b"rest"]).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-rest");

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_write_atomic_into_missing_dir_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.pdf");
        assert!(matches!(write_atomic(&path, &[b"x"]), Err(Error::Io(_))));
    }

    #[test]
    fn test_write_new_never_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("container.bin");

        write_new(&path, &[b"first"]).unwrap();
        assert!(matches!(
            write_new(&path, &[b"second"]),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        // Only the target remains; the rejected temporary is gone.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
