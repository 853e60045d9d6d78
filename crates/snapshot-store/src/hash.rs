use blake3::Hasher;

/// Fast content fingerprint used to short-circuit diffing identical pages.
pub fn hash_text(prefix: &str, text: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(text.as_bytes());
    format!("{}_{}", prefix, hasher.finalize().to_hex())
}
