//! Content fingerprints for stored embeddings.

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of the text, used as the `content_key` of a stored
/// embedding. One record per `(content_key, model)`.
pub fn content_key(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_content_key_is_sha256_hex() {
        assert_eq!(
            content_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_content_key_distinguishes_text() {
        assert_ne!(content_key("SKU-1001"), content_key("SKU-1002"));
        assert_eq!(content_key("SKU-1001").len(), 64);
    }
}
