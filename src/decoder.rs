//! Decoder module
//!
//! This module walks an NV item descriptor stream and rebuilds the combo
//! list together with its original grouping. Decoding is resilient: a
//! malformed, unknown or truncated descriptor stops the walk but keeps
//! every combo decoded before it.

use crate::combo::{BandClass, Carrier, Combo};
use crate::compression;
use crate::error::{DecodeError, Result};
use crate::metrics::{CompressionStats, DescriptorStats};
use crate::protocol::{
    read_dl_slots, read_ul_pairs, ByteReader, ComboEntry, DescriptorGroup, DescriptorKind,
    Origin, Slot, StreamHeader, UlPair,
};
use std::borrow::Cow;

/// Configuration for the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DecoderConfig {
    /// Inflate buffers that start with a zlib header (default: true)
    pub auto_inflate: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self { auto_inflate: true }
    }
}

/// Everything recovered from one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOutput {
    pub format_version: u16,
    /// Count from the stream header; the real count comes from the walk
    pub declared_descriptor_count: u16,
    /// Combos in stream order
    pub combos: Vec<ComboEntry>,
    /// Groups in stream order; `Origin::group_index` points here
    pub groups: Vec<DescriptorGroup>,
    pub stats: DescriptorStats,
    pub max_streams: u32,
    /// At most one error: the one that stopped the walk
    pub errors: Vec<DecodeError>,
    /// Set when the input was inflated first
    pub compression: Option<CompressionStats>,
}

impl Default for DecodeOutput {
    fn default() -> Self {
        Self {
            format_version: 0,
            declared_descriptor_count: 0,
            combos: Vec::new(),
            groups: Vec::new(),
            stats: DescriptorStats::new(),
            max_streams: 0,
            errors: Vec::new(),
            compression: None,
        }
    }
}

impl DecodeOutput {
    /// Check if the whole stream was decoded
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// One export line per combo
    pub fn export_lines(&self) -> Vec<String> {
        self.combos.iter().map(ComboEntry::export_line).collect()
    }

    /// Export lines joined with newlines
    pub fn to_text(&self) -> String {
        let mut text = self.export_lines().join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        text
    }
}

/// Decoder for NV item descriptor streams
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    /// Create a decoder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with custom configuration
    pub fn with_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a buffer
    ///
    /// Only a failed inflate is returned as `Err`. Descriptor problems end
    /// up in [`DecodeOutput::errors`] next to the combos decoded so far.
    pub fn decode(&self, data: &[u8]) -> Result<DecodeOutput> {
        let mut output = DecodeOutput::default();

        let stream: Cow<'_, [u8]> = if self.config.auto_inflate && compression::is_zlib(data) {
            let inflated = compression::inflate(data)?;
            log::debug!("inflated {} -> {} bytes", data.len(), inflated.len());
            output.compression = Some(CompressionStats::new(inflated.len(), data.len()));
            Cow::Owned(inflated)
        } else {
            Cow::Borrowed(data)
        };

        let mut reader = ByteReader::new(&stream);
        match StreamHeader::read(&mut reader) {
            Ok(header) => {
                output.format_version = header.format_version;
                output.declared_descriptor_count = header.descriptor_count;
            }
            Err(err) => {
                log::warn!("stream too short for header: {}", err);
                output.errors.push(err);
                return Ok(output);
            }
        }

        let mut current_group: Option<usize> = None;
        while !reader.is_empty() {
            if let Err(err) = self.step(&mut reader, &mut output, &mut current_group) {
                log::warn!("decoding stopped: {}", err);
                output.errors.push(err);
                break;
            }
        }

        let walked = output.stats.total();
        if walked != output.declared_descriptor_count as u64 {
            log::debug!(
                "header declares {} descriptors, stream holds {}",
                output.declared_descriptor_count,
                walked
            );
        }
        log::info!(
            "decoded {} combos in {} groups (version {}, max {} streams)",
            output.combos.len(),
            output.groups.len(),
            output.format_version,
            output.max_streams
        );

        Ok(output)
    }

    /// Read one descriptor
    fn step(
        &self,
        reader: &mut ByteReader<'_>,
        output: &mut DecodeOutput,
        current_group: &mut Option<usize>,
    ) -> std::result::Result<(), DecodeError> {
        let offset = reader.offset();
        let tag = reader.read_u16_le()?;
        let kind =
            DescriptorKind::from_tag(tag).ok_or(DecodeError::UnknownDescriptorTag { tag, offset })?;

        if kind.is_dl_header() {
            let slots = read_dl_slots(reader, kind.width())?;
            if !slots.iter().any(Slot::is_used) {
                return Err(DecodeError::MalformedDescriptor {
                    tag,
                    offset,
                    reason: "DL header has no carriers".to_string(),
                });
            }
            output.stats.record(kind);
            output.groups.push(DescriptorGroup::new(kind.width(), slots));
            *current_group = Some(output.groups.len() - 1);
            log::debug!(
                "group {} opened at offset {} ({})",
                output.groups.len() - 1,
                offset,
                kind.width()
            );
            return Ok(());
        }

        let group_index = current_group.ok_or(DecodeError::OrphanUplinkRecord { tag, offset })?;
        let pairs = read_ul_pairs(reader, kind.width())?;
        let group = &mut output.groups[group_index];
        if group.width != kind.width() {
            log::debug!(
                "uplink record {} at offset {} inside {} group {}",
                tag,
                offset,
                group.width,
                group_index
            );
        }

        let combo = build_combo(group, &pairs).map_err(|reason| {
            DecodeError::MalformedDescriptor {
                tag,
                offset,
                reason,
            }
        })?;
        let ul_pairs = pairs.iter().filter(|p| p.band != 0).count() as u8;
        output.stats.record(kind);

        output.max_streams = output.max_streams.max(combo.streams());
        group.members.push(combo.clone());
        output.combos.push(ComboEntry {
            combo,
            origin: Some(Origin {
                width: group.width,
                group_index,
                ul_pairs,
            }),
        });
        Ok(())
    }
}

/// Combine the open group's slots with one record's uplink pairs
///
/// Each pair attaches to the first carrier on its band; band 0 is empty.
fn build_combo(
    group: &DescriptorGroup,
    pairs: &[UlPair],
) -> std::result::Result<Combo, String> {
    let mut carriers: Vec<Carrier> = group.carriers();

    for pair in pairs.iter().filter(|p| p.band != 0) {
        let ul_class = BandClass::from_u8(pair.ul_class).ok_or_else(|| {
            format!(
                "band {} has invalid uplink class byte {}",
                pair.band, pair.ul_class
            )
        })?;
        match carriers.iter_mut().find(|c| c.band == pair.band) {
            Some(carrier) => carrier.ul_class = Some(ul_class),
            None => log::debug!("uplink pair on band {} matches no slot", pair.band),
        }
    }

    Ok(Combo::new(carriers))
}

/// Decode with the default configuration
pub fn decode(data: &[u8]) -> Result<DecodeOutput> {
    Decoder::new().decode(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NvError;
    use crate::protocol::DescriptorWidth;

    /// Builder for hand-written streams
    struct StreamBuilder {
        bytes: Vec<u8>,
    }

    impl StreamBuilder {
        fn new(version: u16, count: u16) -> Self {
            let mut bytes = Vec::new();
            bytes.extend_from_slice(&version.to_le_bytes());
            bytes.extend_from_slice(&count.to_le_bytes());
            Self { bytes }
        }

        fn u16(mut self, v: u16) -> Self {
            self.bytes.extend_from_slice(&v.to_le_bytes());
            self
        }

        fn u8(mut self, v: u8) -> Self {
            self.bytes.push(v);
            self
        }

        fn zeros(mut self, n: usize) -> Self {
            self.bytes.resize(self.bytes.len() + n, 0);
            self
        }

        /// 137 header with (band, class) slots
        fn narrow_header(mut self, slots: &[(u16, u8)]) -> Self {
            self = self.u16(137);
            for i in 0..6 {
                let (band, class) = slots.get(i).copied().unwrap_or((0, 0));
                self = self.u16(band).u8(class);
            }
            self
        }

        /// 138 record with two pairs
        fn narrow_record(self, pairs: [(u16, u8); 2]) -> Self {
            self.u16(138)
                .u16(pairs[0].0)
                .u8(pairs[0].1)
                .u16(pairs[1].0)
                .u8(pairs[1].1)
                .zeros(12)
        }

        fn build(self) -> Vec<u8> {
            self.bytes
        }
    }

    #[test]
    fn test_decode_narrow_group() {
        let data = StreamBuilder::new(2, 3)
            .narrow_header(&[(3, 1), (7, 2)])
            .narrow_record([(3, 1), (0, 0)])
            .narrow_record([(3, 1), (7, 1)])
            .build();

        let output = decode(&data).unwrap();
        assert!(output.is_complete());
        assert_eq!(output.format_version, 2);
        assert_eq!(output.declared_descriptor_count, 3);
        assert_eq!(output.groups.len(), 1);
        assert_eq!(output.groups[0].members.len(), 2);

        let texts: Vec<String> = output.combos.iter().map(|e| e.to_string()).collect();
        assert_eq!(texts, vec!["3A2A-7B2", "3A2A-7B2A"]);
        assert!(!output.combos[0].has_ulca());
        assert!(output.combos[1].has_ulca());
        assert_eq!(output.max_streams, 6);
        assert_eq!(output.stats.count(DescriptorKind::DlNarrow), 1);
        assert_eq!(output.stats.count(DescriptorKind::UlNarrow), 2);
    }

    #[test]
    fn test_decode_mimo_and_wide() {
        let mut data = StreamBuilder::new(1, 4).u16(201);
        data = data.u16(3).u8(1).u8(4).u16(7).u8(2).u8(2);
        data = data.zeros(4 * 4);
        data = data.u16(202).u16(7).u8(1).u8(0).u16(0).u8(0).u8(0).zeros(16);

        data = data.u16(333).u16(41).u8(3);
        data = data.u8(b'1').u8(b'0').zeros(6);
        data = data.zeros(5 * 11);
        data = data.u16(334).u16(41).u8(1).zeros(8).u16(0).u8(0).zeros(8).zeros(44);

        let output = decode(&data.build()).unwrap();
        assert!(output.is_complete(), "{:?}", output.errors);
        assert_eq!(output.combos.len(), 2);
        assert_eq!(output.combos[0].to_string(), "3A4-7B2A");
        assert_eq!(output.combos[1].to_string(), "41C10A");
        assert_eq!(output.combos[1].streams(), 30);
        assert_eq!(output.groups[1].width, DescriptorWidth::Wide);
        assert_eq!(output.max_streams, 30);
    }

    #[test]
    fn test_first_matching_slot_wins() {
        let data = StreamBuilder::new(1, 2)
            .narrow_header(&[(3, 1), (3, 1)])
            .narrow_record([(3, 1), (3, 2)])
            .build();

        let output = decode(&data).unwrap();
        let entry = &output.combos[0];
        assert_eq!(entry.to_string(), "3A2B-3A2");
        assert_eq!(entry.origin.unwrap().ul_pairs, 2);
        assert!(entry.has_ulca());
    }

    #[test]
    fn test_empty_header_is_malformed() {
        let data = StreamBuilder::new(1, 4)
            .narrow_header(&[(1, 1)])
            .narrow_record([(1, 1), (0, 0)])
            .narrow_header(&[])
            .narrow_record([(1, 1), (0, 0)])
            .build();

        let output = decode(&data).unwrap();
        assert_eq!(output.combos.len(), 1);
        assert!(matches!(
            output.errors[0],
            DecodeError::MalformedDescriptor {
                tag: 137,
                offset: 44,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_tag_keeps_prior_combos() {
        let data = StreamBuilder::new(1, 3)
            .narrow_header(&[(1, 1)])
            .narrow_record([(1, 1), (0, 0)])
            .u16(999)
            .zeros(18)
            .build();

        let output = decode(&data).unwrap();
        assert_eq!(output.combos.len(), 1);
        assert_eq!(
            output.errors,
            vec![DecodeError::UnknownDescriptorTag {
                tag: 999,
                offset: 44
            }]
        );
    }

    #[test]
    fn test_truncated_record() {
        let mut data = StreamBuilder::new(1, 3)
            .narrow_header(&[(1, 1)])
            .narrow_record([(1, 1), (0, 0)])
            .narrow_record([(1, 1), (0, 0)])
            .build();
        data.truncate(data.len() - 5);

        let output = decode(&data).unwrap();
        assert_eq!(output.combos.len(), 1);
        assert!(matches!(
            output.errors[0],
            DecodeError::UnexpectedEndOfFile { .. }
        ));
    }

    #[test]
    fn test_orphan_uplink_record() {
        let data = StreamBuilder::new(1, 1)
            .narrow_record([(1, 1), (0, 0)])
            .build();
        let output = decode(&data).unwrap();
        assert!(output.combos.is_empty());
        assert!(matches!(
            output.errors[0],
            DecodeError::OrphanUplinkRecord { tag: 138, offset: 4 }
        ));
    }

    #[test]
    fn test_short_header() {
        let output = decode(&[0x01, 0x00, 0x02]).unwrap();
        assert!(!output.is_complete());
        assert!(output.combos.is_empty());
    }

    #[test]
    fn test_compressed_input() {
        let data = StreamBuilder::new(1, 2)
            .narrow_header(&[(20, 1)])
            .narrow_record([(20, 1), (0, 0)])
            .build();
        let packed = compression::deflate(&data, 9).unwrap();

        let output = decode(&packed).unwrap();
        assert_eq!(output.combos.len(), 1);
        let stats = output.compression.unwrap();
        assert_eq!(stats.raw_bytes, data.len());
        assert_eq!(stats.compressed_bytes, packed.len());

        let raw = Decoder::with_config(DecoderConfig {
            auto_inflate: false,
        })
        .decode(&packed)
        .unwrap();
        assert!(raw.compression.is_none());
        assert_eq!(
            raw.format_version,
            u16::from_le_bytes([packed[0], packed[1]])
        );
    }

    #[test]
    fn test_corrupt_compressed_input() {
        let result = decode(&[0x78, 0x9C, 0xFF, 0xFF]);
        assert!(matches!(result, Err(NvError::Compression(_))));
    }

    #[test]
    fn test_export_text() {
        let data = StreamBuilder::new(1, 2)
            .narrow_header(&[(3, 1), (7, 2)])
            .narrow_record([(3, 1), (7, 1)])
            .build();
        let output = decode(&data).unwrap();
        assert_eq!(output.to_text(), "3A2A-7B2A 6*\n");
    }
}
