//! Offline license issuance and verification for Keygate.
//!
//! This crate handles:
//! - License payload construction (hardware binding, expiry, feature set)
//! - Detached Ed25519 signatures over canonical payload bytes
//! - Transport encoding of `{data, sig}` artifact files
//! - PEM key pair generation and loading
//!
//! # Design Principles
//!
//! - **Offline issuance**: signing never touches the network
//! - **Canonical bytes**: the signature covers the exact bytes serialized at
//!   issuance time; verification decodes and checks those bytes, never a
//!   re-derived encoding
//! - **Signature first**: no payload field is trusted before the signature
//!   verifies
//! - **Atomic artifacts**: an artifact file is fully written or not present

mod artifact;
mod error;
mod keys;
mod payload;

pub use artifact::{LicenseArtifact, issue_license};
pub use error::{LicenseError, LicenseResult};
pub use keys::{generate_signing_key, load_signing_key, load_verifying_key, save_keypair};
pub use payload::LicensePayload;
