//! Cryptographic utilities for verification token generation and hashing.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes in a verification token (256 bits of entropy).
pub const SECURE_TOKEN_BYTES: usize = 32;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates a random token from the OS-seeded thread RNG, hex encoded.
///
/// The plain token is handed to the user (e.g. embedded in an email link);
/// only its [`sha256_hex`] digest should be persisted.
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; SECURE_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
