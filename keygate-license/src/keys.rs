//! Ed25519 key generation and PEM (PKCS#8 / SPKI) file handling.

use std::fs;
use std::path::Path;

use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::{LicenseError, LicenseResult};

/// Generates a fresh Ed25519 signing key from the OS CSPRNG.
#[must_use]
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Loads a PKCS#8 PEM private key.
///
/// # Errors
///
/// Returns [`LicenseError::Key`] if the file is missing, unreadable, or not
/// a valid Ed25519 PKCS#8 PEM document. Issuance must abort on this error.
pub fn load_signing_key(path: &Path) -> LicenseResult<SigningKey> {
    let pem = fs::read_to_string(path)
        .map_err(|e| LicenseError::Key(format!("cannot read private key {}: {e}", path.display())))?;
    SigningKey::from_pkcs8_pem(&pem)
        .map_err(|e| LicenseError::Key(format!("invalid private key {}: {e}", path.display())))
}

/// Loads an SPKI PEM public key.
///
/// # Errors
///
/// Returns [`LicenseError::Key`] if the file is missing, unreadable, or not
/// a valid Ed25519 public key PEM document.
pub fn load_verifying_key(path: &Path) -> LicenseResult<VerifyingKey> {
    let pem = fs::read_to_string(path)
        .map_err(|e| LicenseError::Key(format!("cannot read public key {}: {e}", path.display())))?;
    VerifyingKey::from_public_key_pem(&pem)
        .map_err(|e| LicenseError::Key(format!("invalid public key {}: {e}", path.display())))
}

/// Writes a key pair as PEM files (private key PKCS#8, public key SPKI).
///
/// # Errors
///
/// Returns [`LicenseError::Key`] on encoding failure and [`LicenseError::Io`]
/// on write failure.
pub fn save_keypair(key: &SigningKey, private_path: &Path, public_path: &Path) -> LicenseResult<()> {
    let private_pem = key
        .to_pkcs8_pem(Default::default())
        .map_err(|e| LicenseError::Key(format!("cannot encode private key: {e}")))?;
    let public_pem = key
        .verifying_key()
        .to_public_key_pem(Default::default())
        .map_err(|e| LicenseError::Key(format!("cannot encode public key: {e}")))?;

    fs::write(private_path, private_pem.as_bytes())?;
    fs::write(public_path, public_pem.as_bytes())?;
    Ok(())
}
