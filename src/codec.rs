//! Payload encoding for the remote tier
//!
//! Every encoded payload carries a leading format tag so readers never have
//! to guess how to decode it:
//!
//! - `J:` compact JSON, small payloads (fast path)
//! - `R:` raw JSON, mid-sized payloads
//! - `Z:` LZ4-compressed JSON, large payloads
//!
//! Untagged payloads are treated as legacy plain JSON written by earlier
//! deployments and decoded as-is.

use crate::error::{CacheError, Result};
use crate::store::CacheValue;
use lz4::block::{compress, decompress, CompressionMode};
use std::time::{Duration, Instant};
use tracing::debug;

const TAG_JSON_FAST: &[u8] = b"J:";
const TAG_JSON_RAW: &[u8] = b"R:";
const TAG_COMPRESSED: &[u8] = b"Z:";

/// Wire format chosen for an encoded payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Compact JSON under the fast-path limit
    JsonFast,
    /// Raw JSON, too big for the fast path but not worth compressing
    JsonRaw,
    /// LZ4-compressed JSON
    Compressed,
}

impl PayloadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadFormat::JsonFast => "json-fast",
            PayloadFormat::JsonRaw => "json-raw",
            PayloadFormat::Compressed => "lz4",
        }
    }
}

/// Outcome of one encode pass, fed to the performance monitor
#[derive(Debug, Clone, Copy)]
pub struct EncodeStats {
    pub format: PayloadFormat,
    pub bytes_in: usize,
    pub bytes_out: usize,
    pub duration: Duration,
}

impl EncodeStats {
    /// Compression ratio (output over input); 1.0 for uncompressed formats.
    pub fn ratio(&self) -> f64 {
        if self.bytes_in == 0 {
            return 1.0;
        }
        self.bytes_out as f64 / self.bytes_in as f64
    }
}

/// Size-driven payload encoder for the remote tier.
#[derive(Debug, Clone)]
pub struct Codec {
    /// Compact JSON at or under this size takes the fast path
    json_fast_path_limit: usize,
    /// JSON above this size is compressed
    compression_threshold: usize,
    /// LZ4 high-compression level
    compression_level: i32,
}

impl Codec {
    pub fn new(
        json_fast_path_limit: usize,
        compression_threshold: usize,
        compression_level: i32,
    ) -> Self {
        Self {
            json_fast_path_limit,
            compression_threshold,
            compression_level,
        }
    }

    /// Encode a value for remote storage, choosing the format by size.
    ///
    /// `force_compression` lowers the compression threshold to the fast-path
    /// limit, used for response tiers known to carry large payloads.
    pub fn encode(&self, value: &CacheValue, force_compression: bool) -> Result<(Vec<u8>, EncodeStats)> {
        let started = Instant::now();

        let json = serde_json::to_vec(value)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        let bytes_in = json.len();

        let compress_above = if force_compression {
            self.json_fast_path_limit
        } else {
            self.compression_threshold
        };

        let (format, payload) = if bytes_in <= self.json_fast_path_limit {
            (PayloadFormat::JsonFast, tag(TAG_JSON_FAST, &json))
        } else if bytes_in > compress_above {
            match compress(
                &json,
                Some(CompressionMode::HIGHCOMPRESSION(self.compression_level)),
                true,
            ) {
                // Only keep the compressed form when it actually saves space.
                Ok(compressed) if compressed.len() < bytes_in => {
                    (PayloadFormat::Compressed, tag(TAG_COMPRESSED, &compressed))
                }
                Ok(_) => (PayloadFormat::JsonRaw, tag(TAG_JSON_RAW, &json)),
                Err(e) => {
                    debug!(error = %e, "compression failed, storing raw JSON");
                    (PayloadFormat::JsonRaw, tag(TAG_JSON_RAW, &json))
                }
            }
        } else {
            (PayloadFormat::JsonRaw, tag(TAG_JSON_RAW, &json))
        };

        let stats = EncodeStats {
            format,
            bytes_in,
            bytes_out: payload.len(),
            duration: started.elapsed(),
        };

        Ok((payload, stats))
    }

    /// Decode a payload read from the remote tier.
    ///
    /// Corrupted or unrecognized payloads return a serialization error; the
    /// caller treats that as a miss.
    pub fn decode(&self, payload: &[u8]) -> Result<CacheValue> {
        if let Some(body) = payload.strip_prefix(TAG_JSON_FAST) {
            return parse_json(body);
        }
        if let Some(body) = payload.strip_prefix(TAG_JSON_RAW) {
            return parse_json(body);
        }
        if let Some(body) = payload.strip_prefix(TAG_COMPRESSED) {
            let json = decompress(body, None)
                .map_err(|e| CacheError::Serialization(format!("lz4 decompress: {}", e)))?;
            return parse_json(&json);
        }

        // Untagged: legacy plain JSON from earlier deployments.
        parse_json(payload)
    }
}

fn tag(prefix: &[u8], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(prefix.len() + body.len());
    out.extend_from_slice(prefix);
    out.extend_from_slice(body);
    out
}

fn parse_json(bytes: &[u8]) -> Result<CacheValue> {
    serde_json::from_slice(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codec() -> Codec {
        Codec::new(512, 4 * 1024, 4)
    }

    #[test]
    fn test_small_payload_takes_fast_path() {
        let value = json!({"response": "short", "tier": "small"});
        let (payload, stats) = codec().encode(&value, false).unwrap();

        assert_eq!(stats.format, PayloadFormat::JsonFast);
        assert!(payload.starts_with(b"J:"));
        assert_eq!(codec().decode(&payload).unwrap(), value);
    }

    #[test]
    fn test_mid_size_payload_stays_raw() {
        // Over the fast-path limit but under the compression threshold.
        let value = json!({"response": "x".repeat(1_000)});
        let (payload, stats) = codec().encode(&value, false).unwrap();

        assert_eq!(stats.format, PayloadFormat::JsonRaw);
        assert!(payload.starts_with(b"R:"));
        assert_eq!(codec().decode(&payload).unwrap(), value);
    }

    #[test]
    fn test_large_payload_is_compressed() {
        // Highly repetitive, compresses well.
        let value = json!({"response": "abcdef".repeat(2_000)});
        let (payload, stats) = codec().encode(&value, false).unwrap();

        assert_eq!(stats.format, PayloadFormat::Compressed);
        assert!(payload.starts_with(b"Z:"));
        assert!(stats.bytes_out < stats.bytes_in);
        assert!(stats.ratio() < 1.0);
        assert_eq!(codec().decode(&payload).unwrap(), value);
    }

    #[test]
    fn test_force_compression_lowers_threshold() {
        // Between the fast-path limit and the compression threshold:
        // raw normally, compressed when forced.
        let value = json!({"response": "repeat-me ".repeat(100)});

        let (_, normal) = codec().encode(&value, false).unwrap();
        assert_eq!(normal.format, PayloadFormat::JsonRaw);

        let (payload, forced) = codec().encode(&value, true).unwrap();
        assert_eq!(forced.format, PayloadFormat::Compressed);
        assert_eq!(codec().decode(&payload).unwrap(), value);
    }

    #[test]
    fn test_legacy_untagged_payload_decodes() {
        let value = json!({"legacy": true});
        let raw = serde_json::to_vec(&value).unwrap();
        assert_eq!(codec().decode(&raw).unwrap(), value);
    }

    #[test]
    fn test_corrupted_payload_is_an_error() {
        assert!(codec().decode(b"Z:not-actually-lz4").is_err());
        assert!(codec().decode(b"J:{broken").is_err());
        assert!(codec().decode(b"\x00\x01\x02").is_err());
    }
}
