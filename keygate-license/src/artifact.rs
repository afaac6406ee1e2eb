//! License artifact encoding, signing, and verification.
//!
//! An artifact is a JSON file `{data, sig}` where `data` is the base64 of
//! the canonical payload bytes and `sig` is the base64 of a detached Ed25519
//! signature over exactly those bytes. The payload is serialized once at
//! issuance time; verification always operates on the decoded `data` bytes,
//! never on a re-serialization of the parsed payload.

use std::fs;
use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use tracing::debug;

use crate::error::{LicenseError, LicenseResult};
use crate::payload::LicensePayload;

/// A signed, transport-encoded license.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LicenseArtifact {
    /// base64 of the canonical payload bytes.
    pub data: String,
    /// base64 of the detached signature.
    pub sig: String,
}

impl LicenseArtifact {
    /// Signs `payload` and builds the artifact.
    ///
    /// The payload is serialized exactly once; the resulting bytes are both
    /// the signed message and the encoded `data` field.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Serialization`] if the payload cannot be
    /// serialized.
    pub fn sign(payload: &LicensePayload, key: &SigningKey) -> LicenseResult<Self> {
        let raw = serde_json::to_vec(payload)?;
        let signature = key.sign(&raw);
        Ok(Self {
            data: BASE64.encode(&raw),
            sig: BASE64.encode(signature.to_bytes()),
        })
    }

    /// Verifies this artifact and returns the trusted payload.
    ///
    /// See [`LicenseArtifact::verify_at`].
    pub fn verify(&self, key: &VerifyingKey, observed_hwid: &str) -> LicenseResult<LicensePayload> {
        self.verify_at(key, observed_hwid, Utc::now())
    }

    /// Verifies this artifact against `key` at an explicit point in time.
    ///
    /// Checks run in a fixed order and short-circuit:
    /// 1. signature over the decoded `data` bytes (no payload field is
    ///    trusted before this passes),
    /// 2. expiry against `now`,
    /// 3. hardware binding against `observed_hwid` (an unbound license,
    ///    empty payload hwid, always passes).
    ///
    /// # Errors
    ///
    /// [`LicenseError::ForgedOrCorrupt`], [`LicenseError::Expired`], or
    /// [`LicenseError::HwidMismatch`].
    pub fn verify_at(
        &self,
        key: &VerifyingKey,
        observed_hwid: &str,
        now: DateTime<Utc>,
    ) -> LicenseResult<LicensePayload> {
        let raw = BASE64
            .decode(&self.data)
            .map_err(|_| LicenseError::ForgedOrCorrupt)?;
        let sig_bytes = BASE64
            .decode(&self.sig)
            .map_err(|_| LicenseError::ForgedOrCorrupt)?;
        let signature =
            Signature::from_slice(&sig_bytes).map_err(|_| LicenseError::ForgedOrCorrupt)?;

        key.verify(&raw, &signature)
            .map_err(|_| LicenseError::ForgedOrCorrupt)?;

        // Only now are the payload bytes trusted.
        let payload: LicensePayload =
            serde_json::from_slice(&raw).map_err(|_| LicenseError::ForgedOrCorrupt)?;

        if payload.is_expired_at(now) {
            return Err(LicenseError::Expired(payload.expiry.to_rfc3339()));
        }

        if payload.is_bound() && payload.hwid != observed_hwid {
            return Err(LicenseError::HwidMismatch {
                bound: payload.hwid,
                observed: observed_hwid.to_string(),
            });
        }

        Ok(payload)
    }

    /// Serializes the artifact envelope as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Serialization`] on encoding failure.
    pub fn to_json(&self) -> LicenseResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses an artifact envelope from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidArtifact`] if the envelope is not
    /// well-formed JSON with `data` and `sig` fields.
    pub fn from_json(json: &str) -> LicenseResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| LicenseError::InvalidArtifact(format!("bad envelope: {e}")))
    }

    /// Reads an artifact file.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Io`] or [`LicenseError::InvalidArtifact`].
    pub fn read(path: &Path) -> LicenseResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Writes the artifact atomically: a temp file in the same directory is
    /// written first and then renamed over the target, so a reader can never
    /// observe a partially written artifact.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Io`] or [`LicenseError::Serialization`].
    pub fn write_atomic(&self, path: &Path) -> LicenseResult<()> {
        let json = self.to_json()?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LicenseError::InvalidArtifact(format!("bad path: {}", path.display())))?;
        let tmp = path.with_file_name(format!("{file_name}.tmp"));

        fs::write(&tmp, &json)?;
        fs::rename(&tmp, path)?;
        debug!("wrote license artifact to {}", path.display());
        Ok(())
    }
}

/// Issues a signed license for `hwid` (empty for unbound), valid for
/// `validity_days` from now.
///
/// # Errors
///
/// Returns [`LicenseError::Serialization`] if the payload cannot be encoded.
pub fn issue_license(
    hwid: &str,
    validity_days: i64,
    features: Vec<String>,
    key: &SigningKey,
) -> LicenseResult<LicenseArtifact> {
    let payload = LicensePayload::new(hwid, validity_days, features);
    LicenseArtifact::sign(&payload, key)
}
