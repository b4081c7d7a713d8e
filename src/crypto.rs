//! Secret hashing for credentials stored in the database.
//!
//! Admin API keys are high-entropy (`bp_` + 32 hex chars from a UUIDv4), so
//! a plain domain-tagged SHA-256 is sufficient: lookups are by exact hash
//! and brute force against 122 bits of entropy is not a realistic threat.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hash a secret (admin API key) for storage and lookup.
///
/// Domain-tagged so a hash from this system can never collide with a hash
/// of the same input made elsewhere.
pub fn hash_secret(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"bookperks-v1:");
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate an admin API key with the bp_ brand prefix.
///
/// The raw key is shown once at creation; only its hash is stored.
pub fn generate_admin_key() -> String {
    format!("bp_{}", Uuid::new_v4().as_simple())
}
