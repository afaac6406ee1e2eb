//! Activation code generation and hashing.

use rand::{Rng, rngs::OsRng};
use sha2::{Digest, Sha256};

/// Code alphabet. Excludes visually ambiguous characters (0/O, 1/I/l).
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Default activation code length.
pub const DEFAULT_CODE_LENGTH: usize = 12;

/// Generates a random activation code of `length` characters.
///
/// Draws from [`CODE_ALPHABET`] using the OS CSPRNG. The code is the sole
/// secret protecting the activation flow, so a non-cryptographic source is
/// not acceptable here. The generator is stateless.
#[must_use]
pub fn generate_code(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Hex-encoded SHA-256 of a string.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Digest binding a redeemed code to a specific hardware id.
///
/// Hashing `code || "::" || hwid` means a leaked code cannot be replayed
/// against a different device's activation record.
#[must_use]
pub fn activation_hash(code: &str, hwid: &str) -> String {
    sha256_hex(&format!("{code}::{hwid}"))
}
