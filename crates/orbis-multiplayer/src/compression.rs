//! Wire framing for replication batches: one flag byte, then the postcard
//! body, LZ4-compressed once it grows past a threshold.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};

/// Frame flag: body stored as-is.
pub const FRAME_PLAIN: u8 = 0x00;

/// Frame flag: body is LZ4 with a prepended uncompressed size.
pub const FRAME_LZ4: u8 = 0x01;

/// When to compress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionConfig {
    /// Bodies shorter than this many bytes are sent plain.
    pub threshold: usize,
    /// Master switch.
    pub enabled: bool,
}

impl CompressionConfig {
    /// Compression on, above `threshold` bytes.
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            threshold,
            enabled: true,
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self::with_threshold(256)
    }
}

/// Prefixes `body` with its frame flag, compressing when it is large enough.
pub fn frame(body: &[u8], config: &CompressionConfig) -> Vec<u8> {
    let (flag, payload) = if config.enabled && body.len() >= config.threshold {
        (FRAME_LZ4, compress_prepend_size(body))
    } else {
        (FRAME_PLAIN, body.to_vec())
    };

    let mut framed = Vec::with_capacity(1 + payload.len());
    framed.push(flag);
    framed.extend_from_slice(&payload);
    framed
}

/// Strips the frame flag and decompresses when needed.
pub fn unframe(framed: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let Some((&flag, payload)) = framed.split_first() else {
        return Err(CompressionError::EmptyFrame);
    };

    match flag {
        FRAME_PLAIN => Ok(payload.to_vec()),
        FRAME_LZ4 => decompress_size_prepended(payload)
            .map_err(|e| CompressionError::DecompressFailed(e.to_string())),
        other => Err(CompressionError::UnknownFlag(other)),
    }
}

/// Errors raised while unframing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompressionError {
    /// Nothing was received, not even a flag byte.
    #[error("empty frame")]
    EmptyFrame,
    /// LZ4 rejected the body.
    #[error("LZ4 decompression failed: {0}")]
    DecompressFailed(String),
    /// Flag byte is neither plain nor LZ4.
    #[error("unknown frame flag: 0x{0:02X}")]
    UnknownFlag(u8),
}
