//! # NVCombo - LTE carrier-aggregation NV item codec
//!
//! Reads and writes the binary NV item that lists a modem's supported
//! LTE carrier-aggregation combinations, and works with those combos as
//! text.
//!
//! ## Key Features
//!
//! - **Resilient decoding**: a bad descriptor stops the walk, not the result
//! - **Three grouping strategies**: preserve original, auto-detect, fixed width
//! - **Validation**: device profiles with CC, uplink and band-mix limits
//! - **Transparent zlib**: compressed items are inflated on read
//!
//! ## Quick Start
//!
//! ```rust
//! use nvcombo::{decode, Combo, Encoder, EncoderConfig};
//!
//! // Parse combos from text
//! let combos: Vec<Combo> = ["3A4A-7C2", "1A2-3A2A"]
//!     .iter()
//!     .map(|t| t.parse().unwrap())
//!     .collect();
//!
//! // Encode with the default (auto-detect) strategy
//! let output = Encoder::new().encode_combos(&combos).unwrap();
//!
//! // Decode, edit, and re-encode with the original grouping
//! let decoded = decode(&output.bytes).unwrap();
//! assert_eq!(decoded.combos.len(), 2);
//!
//! let encoder = Encoder::with_config(EncoderConfig::preserving(&decoded));
//! let again = encoder.encode(&decoded.combos, Some(&decoded.groups)).unwrap();
//! assert_eq!(again.bytes, output.bytes);
//! ```
//!
//! ## Modules
//!
//! - [`band`]: E-UTRA band table and duplex modes
//! - [`combo`]: Carriers, combos and the text grammar
//! - [`validator`]: Device profiles and combo validation
//! - [`protocol`]: Descriptor layouts and wire format
//! - [`decoder`]: Stream decoding
//! - [`encoder`]: Stream encoding
//! - [`compression`]: zlib detection and inflate/deflate
//! - [`metrics`]: Descriptor and compression statistics

// Modules
pub mod band;
pub mod combo;
pub mod compression;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod validator;

// Re-exports for convenient access
pub use band::{BandInfo, BandMix, DuplexMode};
pub use combo::{parse_combo_list, parse_combo_string, BandClass, Carrier, Combo, ComboList};
pub use decoder::{decode, DecodeOutput, Decoder, DecoderConfig};
pub use encoder::{
    encode, EncodeOutput, EncodeWarning, Encoder, EncoderConfig, GroupingStrategy,
    DEFAULT_FORMAT_VERSION,
};
pub use error::{CompressionError, DecodeError, EncodeError, NvError, ParseError, Result};
pub use metrics::{CompressionStats, DescriptorStats};
pub use protocol::{ComboEntry, DescriptorGroup, DescriptorKind, DescriptorWidth, Origin};
pub use validator::{
    validate_combo, DeviceProfile, IssueCode, ValidationIssue, ValidationLimits, ValidationReport,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_basic_roundtrip() {
        let combos: Vec<Combo> = ["3A4A-7C2", "3A4-7C2A", "20A2"]
            .iter()
            .map(|t| t.parse().unwrap())
            .collect();
        let output = encode(&combos).unwrap();
        let decoded = decode(&output.bytes).unwrap();

        assert!(decoded.is_complete());
        assert_eq!(decoded.format_version, DEFAULT_FORMAT_VERSION);
        assert_eq!(decoded.declared_descriptor_count, output.descriptor_count);

        let mut texts: Vec<String> = decoded.combos.iter().map(|e| e.to_string()).collect();
        texts.sort();
        assert_eq!(texts, vec!["20A2", "3A4-7C2A", "3A4A-7C2"]);
    }

    #[test]
    fn test_preserve_is_idempotent() {
        let list = parse_combo_list("1A2A-3A2\n3A2-7A2A\n3A2A-7A2\n41C4\n");
        let first = encode(&list.combos).unwrap();
        let decoded = decode(&first.bytes).unwrap();

        let encoder = Encoder::with_config(EncoderConfig::preserving(&decoded));
        let second = encoder
            .encode(&decoded.combos, Some(&decoded.groups))
            .unwrap();
        assert_eq!(second.bytes, first.bytes);
    }
}
