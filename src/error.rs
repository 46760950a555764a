//! Error types for NVCombo
//!
//! This module defines all error types used throughout the library.
//! Validation problems are not errors: they are reported as data by
//! [`crate::validator::ValidationReport`].

use thiserror::Error;

/// Result type alias for NVCombo operations
pub type Result<T> = std::result::Result<T, NvError>;

/// Main error type for NVCombo operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NvError {
    /// Combo text parsing error
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Decoding error
    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),

    /// Encoding error
    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    /// Compression adapter error
    #[error("Compression error: {0}")]
    Compression(#[from] CompressionError),
}

/// Errors while parsing the combo text notation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A carrier segment does not match `BAND CLASS [MIMO] [UL] [^]`
    #[error("Invalid carrier segment '{segment}': {reason}")]
    InvalidSegment { segment: String, reason: String },

    /// Nothing to parse
    #[error("Empty combo")]
    Empty,

    /// More than one carrier carries the PCell marker
    #[error("More than one PCell marker in '{0}'")]
    MultiplePcell(String),
}

impl ParseError {
    pub(crate) fn segment(segment: &str, reason: impl Into<String>) -> Self {
        ParseError::InvalidSegment {
            segment: segment.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors during decoding
///
/// All variants carry the byte offset (into the inflated stream) where
/// the problem was detected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// DL header without any carrier, or a slot with an invalid class byte
    #[error("Malformed descriptor {tag} at offset {offset}: {reason}")]
    MalformedDescriptor {
        tag: u16,
        offset: usize,
        reason: String,
    },

    /// Tag outside the six known descriptor kinds
    #[error("Unknown descriptor tag {tag} at offset {offset}")]
    UnknownDescriptorTag { tag: u16, offset: usize },

    /// Buffer ended in the middle of a field
    #[error("Unexpected end of file at offset {offset}: need {needed} bytes, {available} left")]
    UnexpectedEndOfFile {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Uplink record read before any DL header opened a group
    #[error("Uplink record {tag} at offset {offset} has no open group")]
    OrphanUplinkRecord { tag: u16, offset: usize },
}

impl DecodeError {
    /// Byte offset where decoding stopped
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::MalformedDescriptor { offset, .. }
            | DecodeError::UnknownDescriptorTag { offset, .. }
            | DecodeError::UnexpectedEndOfFile { offset, .. }
            | DecodeError::OrphanUplinkRecord { offset, .. } => *offset,
        }
    }
}

/// Fatal errors during encoding; no buffer is produced
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Nothing to encode
    #[error("No combos to encode")]
    EmptyInput,

    /// Preserve-original strategy requested without decoded groups
    #[error("Preserve-original grouping requires the groups of a prior decode")]
    MissingOriginalGroups,

    /// Header count field is a u16
    #[error("Too many descriptors: {count} exceeds maximum {max}")]
    TooManyDescriptors { count: usize, max: usize },

    /// MIMO value cannot be written in the chosen descriptor width
    #[error("MIMO {mimo} on band {band} does not fit descriptor {tag}")]
    MimoOutOfRange { band: u16, mimo: u32, tag: u16 },
}

/// Errors from the compression adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompressionError {
    /// deflate failed
    #[error("Compression failed: {0}")]
    Compress(String),

    /// inflate failed (corrupt or truncated zlib stream)
    #[error("Decompression failed: {0}")]
    Decompress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NvError::Decode(DecodeError::UnknownDescriptorTag {
            tag: 999,
            offset: 44,
        });
        let msg = format!("{}", err);
        assert!(msg.contains("999"));
        assert!(msg.contains("44"));
    }

    #[test]
    fn test_error_conversion() {
        let encode_err = EncodeError::EmptyInput;
        let nv_err: NvError = encode_err.into();
        assert!(matches!(nv_err, NvError::Encode(_)));
    }

    #[test]
    fn test_decode_error_offset() {
        let err = DecodeError::UnexpectedEndOfFile {
            offset: 30,
            needed: 2,
            available: 1,
        };
        assert_eq!(err.offset(), 30);
    }
}
