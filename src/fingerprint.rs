use sha2::{Digest, Sha256};

/// Deterministic digest of article content, used to detect unchanged input
/// across runs. Lowercase hex SHA-256 of the UTF-8 bytes; stable across
/// processes and machines. Empty input is valid.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
