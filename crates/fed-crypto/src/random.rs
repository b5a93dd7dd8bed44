//! Cryptographically secure random generation.

use rand::Rng;

/// Generates a cryptographically secure random byte array.
///
/// Uses the thread-local random number generator, which is cryptographically
/// secure by default. Used for symmetric content keys and GCM nonces.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}
