//! # Ephemeral Identity
//!
//! A self-issued, time-bounded binding of a public key to a display name.
//! One is generated per signing operation and travels inside the signed
//! artifact so a verifier can see who claims to have signed.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       EPHEMERAL IDENTITY                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  body (canonical JSON, fixed field order)                              │
//! │  ┌───────────────────────────────────────────────────────────────┐     │
//! │  │ serial        UUID v4                                          │     │
//! │  │ display_name  "User Certificate"                               │     │
//! │  │ organisation  optional                                         │     │
//! │  │ public_key    hex Ed25519 point                                │     │
//! │  │ not_before    signing time                                     │     │
//! │  │ not_after     signing time + validity_days                     │     │
//! │  └───────────────────────────────────────────────────────────────┘     │
//! │                          │                                              │
//! │                          ▼                                              │
//! │  self_signature = Ed25519(private key, body)                           │
//! │                                                                         │
//! │  No issuer, no chain: the binding proves possession, not authority.    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{self, PublicKey, Signature, SigningKeyPair};
use crate::error::Result;
use crate::time::validity_window;

/// Self-signed binding of a public key to a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EphemeralIdentity {
    /// Unique per issuance
    pub serial: Uuid,
    /// Name shown to the verifier
    pub display_name: String,
    /// Optional organisation shown next to the name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organisation: Option<String>,
    /// The signer's public key
    pub public_key: PublicKey,
    /// Start of validity
    pub not_before: DateTime<Utc>,
    /// End of validity
    pub not_after: DateTime<Utc>,
    /// Signature over the canonical body by the matching private key
    pub self_signature: Signature,
}

/// Signed portion of an identity. Field order is the canonical order.
#[derive(Serialize)]
struct IdentityBody<'a> {
    serial: &'a Uuid,
    display_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    organisation: Option<&'a str>,
    public_key: &'a PublicKey,
    not_before: &'a DateTime<Utc>,
    not_after: &'a DateTime<Utc>,
}

impl EphemeralIdentity {
    /// Issue a fresh identity for `keypair`, valid from `now` for
    /// `validity_days` days.
    pub fn issue(
        keypair: &SigningKeyPair,
        display_name: &str,
        organisation: Option<&str>,
        now: DateTime<Utc>,
        validity_days: u32,
    ) -> Result<Self> {
        let (not_before, not_after) = validity_window(now, validity_days);
        let serial = Uuid::new_v4();
        let public_key = keypair.public_key();

        let body = canonical_body(
            &serial,
            display_name,
            organisation,
            &public_key,
            &not_before,
            &not_after,
        )?;
        let self_signature = crypto::sign(keypair, &body);

        tracing::debug!(serial = %serial, not_after = %not_after, "Issued ephemeral identity");

        Ok(Self {
            serial,
            display_name: display_name.to_string(),
            organisation: organisation.map(str::to_string),
            public_key,
            not_before,
            not_after,
            self_signature,
        })
    }

    /// Check that the self-signature covers the current field values.
    pub fn verify_self_signature(&self) -> Result<bool> {
        let body = canonical_body(
            &self.serial,
            &self.display_name,
            self.organisation.as_deref(),
            &self.public_key,
            &self.not_before,
            &self.not_after,
        )?;
        crypto::verify(&self.public_key, &body, &self.self_signature)
    }

    /// Whether `at` falls inside the validity window
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }

    /// "Name (Organisation)" or just the name
    pub fn label(&self) -> String {
        match &self.organisation {
            Some(org) => format!("{} ({})", self.display_name, org),
            None => self.display_name.clone(),
        }
    }
}

fn canonical_body(
    serial: &Uuid,
    display_name: &str,
    organisation: Option<&str>,
    public_key: &PublicKey,
    not_before: &DateTime<Utc>,
    not_after: &DateTime<Utc>,
) -> Result<Vec<u8>> {
    let body = IdentityBody {
        serial,
        display_name,
        organisation,
        public_key,
        not_before,
        not_after,
    };
    Ok(serde_json::to_vec(&body)?)
}
