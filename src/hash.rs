use sha2::{Digest, Sha256};

/// Compute the SHA-256 fingerprint of raw content, hex encoded
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Fingerprint of a text document. Text is hashed as UTF-8 bytes.
pub fn text_hash(text: &str) -> String {
    content_hash(text.as_bytes())
}
