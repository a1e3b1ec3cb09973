//! Deterministic cache key derivation
//!
//! Keys combine the operation name, a canonicalized option set and either
//! the literal input text (small inputs, for readability when inspecting
//! the store) or a streaming SHA-256 content hash plus length (large
//! inputs, to keep key size bounded regardless of input size).

use crate::error::{CacheError, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Key namespace prefix shared by every derived key
const KEY_PREFIX: &str = "ai_cache";

/// Chunk size for streaming the content hash
const HASH_CHUNK_SIZE: usize = 8 * 1024;

/// Derives stable, collision-resistant cache keys from arbitrary-size input.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    /// Inputs at or above this length (in bytes) are content-hashed
    /// instead of embedded literally
    hashing_threshold: usize,
}

impl KeyGenerator {
    pub fn new(hashing_threshold: usize) -> Self {
        Self {
            hashing_threshold: hashing_threshold.max(1),
        }
    }

    /// Derive a cache key.
    ///
    /// Identical `(text, operation, options, extra)` always yields the
    /// identical key; any difference yields a different key. Fails only for
    /// structurally invalid arguments, never for input size.
    pub fn generate(
        &self,
        text: &str,
        operation: &str,
        options: &Map<String, Value>,
        extra: Option<&str>,
    ) -> Result<String> {
        if operation.trim().is_empty() {
            return Err(CacheError::validation(
                "operation",
                "must be a non-empty operation name",
            ));
        }

        let options_digest = digest_options(options);

        let mut key = if text.len() < self.hashing_threshold {
            format!(
                "{}:{}:len:{}:txt:{}:opt:{}",
                KEY_PREFIX,
                operation,
                text.len(),
                text,
                options_digest
            )
        } else {
            // Stream the hash so large inputs are never materialized twice.
            let mut hasher = Sha256::new();
            for chunk in text.as_bytes().chunks(HASH_CHUNK_SIZE) {
                hasher.update(chunk);
            }
            let content_hash = hex(hasher.finalize().as_slice());

            format!(
                "{}:{}:sha256:{}:len:{}:opt:{}",
                KEY_PREFIX,
                operation,
                content_hash,
                text.len(),
                options_digest
            )
        };

        if let Some(extra) = extra {
            key.push_str(":x:");
            key.push_str(extra);
        }

        Ok(key)
    }

    /// Threshold at or above which inputs are content-hashed.
    pub fn hashing_threshold(&self) -> usize {
        self.hashing_threshold
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new(1_000)
    }
}

/// Canonicalize the option map (stable key ordering, compact value
/// rendering) and digest it, so semantically identical option sets always
/// contribute identical key material of bounded length.
fn digest_options(options: &Map<String, Value>) -> String {
    if options.is_empty() {
        return "none".to_string();
    }

    let mut pairs: Vec<(&String, &Value)> = options.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    let canonical = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let digest = Sha256::digest(canonical.as_bytes());
    hex(digest.as_slice())[..16].to_string()
}

fn hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_determinism() {
        let keygen = KeyGenerator::default();
        let options = opts(&[("max_length", json!(100))]);

        let a = keygen
            .generate("Hello", "summarize", &options, None)
            .unwrap();
        let b = keygen
            .generate("Hello", "summarize", &options, None)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_any_argument_changes_the_key() {
        let keygen = KeyGenerator::default();
        let options = opts(&[("max_length", json!(100))]);
        let base = keygen
            .generate("Hello", "summarize", &options, None)
            .unwrap();

        let other_text = keygen
            .generate("Hello!", "summarize", &options, None)
            .unwrap();
        assert_ne!(base, other_text);

        let other_op = keygen
            .generate("Hello", "translate", &options, None)
            .unwrap();
        assert_ne!(base, other_op);

        let other_opts = keygen
            .generate("Hello", "summarize", &opts(&[("max_length", json!(200))]), None)
            .unwrap();
        assert_ne!(base, other_opts);

        let with_extra = keygen
            .generate("Hello", "summarize", &options, Some("v2"))
            .unwrap();
        assert_ne!(base, with_extra);
    }

    #[test]
    fn test_option_order_is_irrelevant() {
        let keygen = KeyGenerator::default();

        let ab = opts(&[("a", json!(1)), ("b", json!(2))]);
        let ba = opts(&[("b", json!(2)), ("a", json!(1))]);

        let key_ab = keygen.generate("text", "op", &ab, None).unwrap();
        let key_ba = keygen.generate("text", "op", &ba, None).unwrap();
        assert_eq!(key_ab, key_ba);
    }

    #[test]
    fn test_small_input_is_embedded() {
        let keygen = KeyGenerator::new(100);
        let key = keygen
            .generate("Hello", "summarize", &Map::new(), None)
            .unwrap();

        assert!(key.contains("txt:Hello"));
        assert!(key.starts_with("ai_cache:summarize:"));
    }

    #[test]
    fn test_large_input_is_hashed_and_bounded() {
        let keygen = KeyGenerator::new(100);

        let large_a = "x".repeat(50_000);
        let large_b = "y".repeat(50_000);

        let key_a = keygen.generate(&large_a, "op", &Map::new(), None).unwrap();
        let key_b = keygen.generate(&large_b, "op", &Map::new(), None).unwrap();

        assert_ne!(key_a, key_b);
        assert!(key_a.contains("sha256:"));
        assert!(key_a.contains("len:50000"));
        // Bounded regardless of input size.
        assert!(key_a.len() < 200);
    }

    #[test]
    fn test_small_and_large_same_args_differ() {
        let keygen = KeyGenerator::new(1_000);
        let options = opts(&[("max_length", json!(100))]);

        let small = keygen
            .generate(&"a".repeat(50), "summarize", &options, None)
            .unwrap();
        let large = keygen
            .generate(&"a".repeat(50_000), "summarize", &options, None)
            .unwrap();
        assert_ne!(small, large);
    }

    #[test]
    fn test_empty_operation_is_rejected() {
        let keygen = KeyGenerator::default();
        let result = keygen.generate("text", "  ", &Map::new(), None);
        assert!(matches!(result, Err(CacheError::Validation { .. })));
    }

    #[test]
    fn test_never_fails_on_size() {
        let keygen = KeyGenerator::new(10);
        let huge = "z".repeat(1_000_000);
        assert!(keygen.generate(&huge, "op", &Map::new(), None).is_ok());
    }
}
