use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Generates a fresh reset token: the raw value handed to the user exactly
/// once, and the digest that goes to storage. Possession of the digest alone
/// is not enough to impersonate a reset request.
pub fn generate() -> (String, String) {
    let mut bytes = [0u8; 20];
    OsRng.fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);
    let digest = digest_of(&raw);
    (raw, digest)
}

/// SHA-256 digest of a raw token, hex encoded. Used both at issue time and
/// when a presented token is validated against storage.
pub fn digest_of(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}
