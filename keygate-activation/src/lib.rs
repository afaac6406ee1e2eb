//! Activation code issuance and one-time redemption for Keygate.
//!
//! This crate handles:
//! - Cryptographically random, human-typable activation codes
//! - The per-hardware-id pending/activated state machine over SQLite
//! - TTL expiry of unredeemed codes
//! - Best-effort operator notification (Telegram)
//!
//! # Design Principles
//!
//! - **One code, one redemption**: a code converts a device from unlicensed
//!   to licensed exactly once; the redeem transition is a single transaction
//! - **Hashed at rest**: plaintext codes are never persisted, only a SHA-256
//!   digest plus a short audit sample
//! - **Replay-bound**: the stored activation hash covers code and hardware
//!   id together, so a leaked code is useless against another device
//! - **Non-blocking delivery**: notification happens outside the store's
//!   critical section and cannot roll back an issued code

mod code;
mod error;
mod notify;
mod store;

pub use code::{CODE_ALPHABET, DEFAULT_CODE_LENGTH, activation_hash, generate_code, sha256_hex};
pub use error::{ActivationError, ActivationResult};
pub use notify::{ActivationNotice, Notifier, TelegramSink};
pub use store::{
    ActivationRecord, ActivationStore, IssuedCode, MAX_DEVICE_NAME_LEN, PendingActivation,
};
