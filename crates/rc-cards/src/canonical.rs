// canonical.rs — Canonical serialization and SHA-256 hashing.
//
// Digests must not depend on how a YAML file was formatted, only on what it
// says. Cards are therefore hashed over their RFC 8785 (JCS) canonical JSON:
// compact separators, keys sorted at every depth, fixed number and string
// encoding. JCS is language-neutral, so any consumer can recompute a digest.
//
// All hashes are SHA-256, lowercase hex.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::card::RuleCard;

/// Hash arbitrary bytes, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hash a UTF-8 string.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Serialize any value to JCS canonical JSON bytes.
pub fn canonical_json(value: &impl Serialize) -> Result<Vec<u8>, serde_json::Error> {
    serde_jcs::to_vec(value)
}

/// Content hash of a single card: SHA-256 over its canonical JSON.
pub fn card_content_hash(card: &RuleCard) -> Result<String, serde_json::Error> {
    Ok(hash_bytes(&canonical_json(card)?))
}

/// Source digest over a set of `(id, content_hash)` pairs.
///
/// Pairs are sorted by id first, so callers may pass them in any order.
/// The hashed text is `"<id>:<content_hash>\n"` per card.
pub fn source_digest<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut pairs: Vec<(&str, &str)> = pairs.into_iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Sha256::new();
    for (id, content_hash) in pairs {
        hasher.update(id.as_bytes());
        hasher.update(b":");
        hasher.update(content_hash.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
