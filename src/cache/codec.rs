//! Value Codec
//!
//! Serializes values to JSON for the distributed tier and compresses large
//! payloads with LZ4.
//!
//! Compressed payloads start with a four byte marker (`\0LZ4`). JSON text
//! never starts with a NUL byte, so plain and compressed payloads can share a
//! keyspace and a counter stored as decimal text stays readable by `unpack`.
//!
//! # Example
//!
//! ```
//! use tiercache::cache::codec::{Codec, CompressionAlgorithm};
//!
//! let codec = Codec::new(true, 64);
//! let value = vec!["repeated".to_string(); 100];
//!
//! let packed = codec.pack(&value).unwrap();
//! assert_eq!(packed.algorithm, CompressionAlgorithm::Lz4);
//!
//! let restored: Vec<String> = codec.unpack(&packed.bytes).unwrap();
//! assert_eq!(restored, value);
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Marker prepended to compressed payloads
pub const COMPRESSED_MARKER: &[u8; 4] = b"\0LZ4";

/// Default bound on the decompressed size of a stored payload
pub const DEFAULT_MAX_UNPACKED_BYTES: usize = 64 * 1024 * 1024;

// =============================================================================
// Compression Algorithm
// =============================================================================

/// Supported compression algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionAlgorithm {
    /// Stored as plain JSON
    #[default]
    None,
    /// LZ4 block compression
    Lz4,
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CompressionAlgorithm::None => "none",
            CompressionAlgorithm::Lz4 => "lz4",
        })
    }
}

/// LZ4 high-compression level used for stored payloads
const LZ4_LEVEL: i32 = 4;

fn lz4_compress(raw: &[u8]) -> Result<Vec<u8>> {
    // Length-prefixed so decompression needs no size hint
    lz4::block::compress(
        raw,
        Some(lz4::block::CompressionMode::HIGHCOMPRESSION(LZ4_LEVEL)),
        true,
    )
    .map_err(|e| Error::CompressionFailed {
        algorithm: CompressionAlgorithm::Lz4.to_string(),
        reason: e.to_string(),
    })
}

fn lz4_decompress(block: &[u8], max_len: usize) -> Result<Vec<u8>> {
    // The block starts with the decompressed length as a little-endian i32
    let claimed = block
        .get(..4)
        .map(|header| i32::from_le_bytes([header[0], header[1], header[2], header[3]]));
    match claimed {
        Some(len) if len >= 0 && len as usize <= max_len => {}
        _ => {
            return Err(Error::DecompressionFailed {
                algorithm: CompressionAlgorithm::Lz4.to_string(),
                reason: format!("size header {:?} outside 0..={}", claimed, max_len),
            })
        }
    }

    lz4::block::decompress(block, None).map_err(|e| Error::DecompressionFailed {
        algorithm: CompressionAlgorithm::Lz4.to_string(),
        reason: e.to_string(),
    })
}

// =============================================================================
// Codec
// =============================================================================

/// Output of [`Codec::pack`]
#[derive(Debug, Clone)]
pub struct Packed {
    /// Bytes to hand to the distributed tier
    pub bytes: Bytes,
    /// Algorithm applied to the payload
    pub algorithm: CompressionAlgorithm,
    /// Length of the serialized value before compression
    pub raw_len: usize,
}

impl Packed {
    /// Stored length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the payload is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// JSON serialization with size-gated LZ4 compression
pub struct Codec {
    compression_enabled: bool,
    threshold_bytes: usize,
    max_unpacked_bytes: usize,
}

impl Codec {
    /// Create a codec. Payloads strictly larger than `threshold_bytes` are
    /// compressed when `compression_enabled` is set.
    pub fn new(compression_enabled: bool, threshold_bytes: usize) -> Self {
        Self {
            compression_enabled,
            threshold_bytes,
            max_unpacked_bytes: DEFAULT_MAX_UNPACKED_BYTES,
        }
    }

    /// Refuse compressed payloads that claim to expand past `max` bytes.
    /// Larger values are stored uncompressed.
    pub fn with_max_unpacked(mut self, max: usize) -> Self {
        self.max_unpacked_bytes = max;
        self
    }

    /// Whether a payload of `len` bytes qualifies for compression
    #[inline]
    pub fn should_compress(&self, len: usize) -> bool {
        self.compression_enabled && len > self.threshold_bytes
    }

    /// Serialize and, if large enough, compress a value
    pub fn pack<T: Serialize + ?Sized>(&self, value: &T) -> Result<Packed> {
        let raw = serde_json::to_vec(value)?;
        let raw_len = raw.len();

        if self.should_compress(raw_len) && raw_len <= self.max_unpacked_bytes {
            match lz4_compress(&raw) {
                // Keep the compressed form only when it actually saves space
                Ok(compressed) if compressed.len() + COMPRESSED_MARKER.len() < raw_len => {
                    let mut buf = BytesMut::with_capacity(COMPRESSED_MARKER.len() + compressed.len());
                    buf.put_slice(COMPRESSED_MARKER);
                    buf.put_slice(&compressed);
                    return Ok(Packed {
                        bytes: buf.freeze(),
                        algorithm: CompressionAlgorithm::Lz4,
                        raw_len,
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, raw_len, "Compression failed, storing uncompressed");
                }
            }
        }

        Ok(Packed {
            bytes: Bytes::from(raw),
            algorithm: CompressionAlgorithm::None,
            raw_len,
        })
    }

    /// Decompress if marked and deserialize
    pub fn unpack<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        match data.strip_prefix(COMPRESSED_MARKER.as_slice()) {
            Some(block) => {
                let raw = lz4_decompress(block, self.max_unpacked_bytes)?;
                Ok(serde_json::from_slice(&raw)?)
            }
            None => Ok(serde_json::from_slice(data)?),
        }
    }

    /// Check whether stored bytes carry the compression marker
    pub fn is_compressed(data: &[u8]) -> bool {
        data.starts_with(COMPRESSED_MARKER)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(true, 1024)
    }
}
