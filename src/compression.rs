//! Compression adapter
//!
//! NV items are often stored zlib-compressed. This module detects the
//! zlib header and wraps `flate2` for inflate/deflate.

use crate::error::CompressionError;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// First byte of a zlib stream (deflate, 32K window)
pub const ZLIB_MAGIC: u8 = 0x78;

/// Second bytes for the four compression levels
pub const ZLIB_LEVEL_BYTES: [u8; 4] = [0x01, 0x5E, 0x9C, 0xDA];

/// Default deflate level
pub const DEFAULT_LEVEL: u32 = 6;

/// Check if a buffer starts with a zlib header
pub fn is_zlib(data: &[u8]) -> bool {
    matches!(data, [ZLIB_MAGIC, second, ..] if ZLIB_LEVEL_BYTES.contains(second))
}

/// Inflate a zlib stream
pub fn inflate(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 4);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CompressionError::Decompress(e.to_string()))?;
    Ok(out)
}

/// Deflate into a zlib stream at `level` (0-9, clamped)
pub fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>, CompressionError> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(data.len() / 2),
        Compression::new(level.min(9)),
    );
    encoder
        .write_all(data)
        .map_err(|e| CompressionError::Compress(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CompressionError::Compress(e.to_string()))
}
