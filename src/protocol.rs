//! Protocol definitions for NVCombo
//!
//! This module defines the wire format shared by the decoder and encoder:
//! - The six descriptor kinds and their fixed layouts
//! - Byte reader/writer over little-endian fields
//! - Descriptor groups (one DL header + its uplink records)
//! - Combo entries tagged with their decoded origin
//!
//! # Wire format
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ u16 format_version │ u16 descriptor_count    │
//! ├──────────────────────────────────────────────┤
//! │ DL header (137 / 201 / 333)                  │  6 × (band, class, [mimo])
//! │   UL record (138 / 202 / 334)  × members     │  2 × (band, ul_class) + pad
//! ├──────────────────────────────────────────────┤
//! │ DL header ...                                │
//! └──────────────────────────────────────────────┘
//! ```

use crate::combo::{BandClass, Carrier, Combo, MAX_CARRIERS};
use crate::error::DecodeError;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stream header size (format version + descriptor count)
pub const HEADER_SIZE: usize = 4;

/// Positional slots in a DL header
pub const SLOT_COUNT: usize = MAX_CARRIERS;

/// (band, ul_class) pairs in an uplink record
pub const UL_PAIRS: usize = 2;

/// Digit bytes used for MIMO in wide descriptors
pub const MIMO_DIGITS: usize = 8;

/// Largest MIMO value a wide descriptor can hold
pub const MAX_DIGIT_MIMO: u32 = 99_999_999;

/// How a DL header slot stores MIMO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MimoField {
    /// Not stored; 2 for every nonzero band
    Implicit,
    /// One byte
    Byte,
    /// [`MIMO_DIGITS`] bytes, one decimal digit each
    Digits,
}

impl MimoField {
    /// Bytes taken in each slot
    pub const fn size(self) -> usize {
        match self {
            MimoField::Implicit => 0,
            MimoField::Byte => 1,
            MimoField::Digits => MIMO_DIGITS,
        }
    }

    /// Check if a MIMO value can be stored without loss
    pub fn fits(self, mimo: u32) -> bool {
        match self {
            MimoField::Implicit => mimo == crate::combo::DEFAULT_MIMO,
            MimoField::Byte => mimo <= u8::MAX as u32,
            MimoField::Digits => mimo <= MAX_DIGIT_MIMO,
        }
    }
}

/// Layout of one descriptor width: a DL header tag and its uplink record tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorSpec {
    pub dl_tag: u16,
    pub ul_tag: u16,
    /// DL header size including the tag
    pub dl_size: usize,
    /// Uplink record size including the tag
    pub ul_size: usize,
    pub mimo: MimoField,
    /// Pad bytes after each uplink pair
    pub pair_pad: usize,
    /// Reserved bytes closing an uplink record
    pub ul_tail: usize,
}

/// Descriptor table shared by decoder and encoder, indexed by width
pub static DESCRIPTOR_TABLE: [DescriptorSpec; 3] = [
    DescriptorSpec {
        dl_tag: 137,
        ul_tag: 138,
        dl_size: 20,
        ul_size: 20,
        mimo: MimoField::Implicit,
        pair_pad: 0,
        ul_tail: 12,
    },
    DescriptorSpec {
        dl_tag: 201,
        ul_tag: 202,
        dl_size: 26,
        ul_size: 26,
        mimo: MimoField::Byte,
        pair_pad: 1,
        ul_tail: 16,
    },
    DescriptorSpec {
        dl_tag: 333,
        ul_tag: 334,
        dl_size: 68,
        ul_size: 68,
        mimo: MimoField::Digits,
        pair_pad: 8,
        ul_tail: 44,
    },
];

/// Descriptor width class, pairing a DL header with its uplink record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DescriptorWidth {
    /// 137/138: no MIMO field
    Narrow,
    /// 201/202: one MIMO byte
    Mimo,
    /// 333/334: digit-encoded MIMO
    Wide,
}

impl DescriptorWidth {
    /// All widths, narrowest first
    pub const ALL: [DescriptorWidth; 3] = [
        DescriptorWidth::Narrow,
        DescriptorWidth::Mimo,
        DescriptorWidth::Wide,
    ];

    /// Layout of this width
    pub fn spec(self) -> &'static DescriptorSpec {
        &DESCRIPTOR_TABLE[self as usize]
    }

    /// DL header tag (137/201/333)
    pub fn dl_tag(self) -> u16 {
        self.spec().dl_tag
    }

    /// Uplink record tag (138/202/334)
    pub fn ul_tag(self) -> u16 {
        self.spec().ul_tag
    }

    /// Width whose DL header has this tag
    pub fn from_dl_tag(tag: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.dl_tag() == tag)
    }

    /// Narrowest width able to hold every MIMO value of the carriers
    ///
    /// 0 and 2 fit the implicit field; anything else needs a byte; values
    /// above one byte need digit encoding.
    pub fn minimum_for(carriers: &[Carrier]) -> Self {
        if carriers.iter().any(|c| c.mimo_dl > u8::MAX as u32) {
            DescriptorWidth::Wide
        } else if carriers.iter().any(|c| c.mimo_dl != 0 && c.mimo_dl != 2) {
            DescriptorWidth::Mimo
        } else {
            DescriptorWidth::Narrow
        }
    }
}

impl fmt::Display for DescriptorWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dl_tag(), self.ul_tag())
    }
}

/// The six descriptor kinds found in a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum DescriptorKind {
    DlNarrow = 137,
    UlNarrow = 138,
    DlMimo = 201,
    UlMimo = 202,
    DlWide = 333,
    UlWide = 334,
}

impl DescriptorKind {
    /// All kinds in tag order
    pub const ALL: [DescriptorKind; 6] = [
        DescriptorKind::DlNarrow,
        DescriptorKind::UlNarrow,
        DescriptorKind::DlMimo,
        DescriptorKind::UlMimo,
        DescriptorKind::DlWide,
        DescriptorKind::UlWide,
    ];

    /// Convert from a wire tag
    pub fn from_tag(tag: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }

    /// Wire tag
    pub fn tag(self) -> u16 {
        self as u16
    }

    /// DL header (as opposed to uplink record)
    pub fn is_dl_header(self) -> bool {
        matches!(
            self,
            DescriptorKind::DlNarrow | DescriptorKind::DlMimo | DescriptorKind::DlWide
        )
    }

    /// Width class of this kind
    pub fn width(self) -> DescriptorWidth {
        match self {
            DescriptorKind::DlNarrow | DescriptorKind::UlNarrow => DescriptorWidth::Narrow,
            DescriptorKind::DlMimo | DescriptorKind::UlMimo => DescriptorWidth::Mimo,
            DescriptorKind::DlWide | DescriptorKind::UlWide => DescriptorWidth::Wide,
        }
    }

    /// Encoded size including the tag
    pub fn size(self) -> usize {
        let spec = self.width().spec();
        if self.is_dl_header() {
            spec.dl_size
        } else {
            spec.ul_size
        }
    }
}

/// Little-endian cursor over a descriptor stream
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader at offset 0
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Bytes left
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Check if the cursor reached the end
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEndOfFile {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        self.take(n)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.take(n).map(|_| ())
    }
}

/// Little-endian writer over a pre-sized buffer
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Create a writer with the exact final capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u16_le(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_zeros(&mut self, n: usize) {
        self.buf.resize(self.buf.len() + n, 0);
    }

    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Stream header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamHeader {
    pub format_version: u16,
    /// Declared descriptor count (informational on read)
    pub descriptor_count: u16,
}

impl StreamHeader {
    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            format_version: reader.read_u16_le()?,
            descriptor_count: reader.read_u16_le()?,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        writer.put_u16_le(self.format_version);
        writer.put_u16_le(self.descriptor_count);
    }
}

/// One positional slot of a DL header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Slot {
    /// Band number; 0 marks an unused slot
    pub band: u16,
    pub class: Option<BandClass>,
    pub mimo: u32,
}

impl Slot {
    /// Check if the slot holds a carrier
    pub fn is_used(&self) -> bool {
        self.band != 0 && self.class.is_some()
    }

    fn from_carrier(carrier: &Carrier) -> Self {
        Self {
            band: carrier.band,
            class: Some(carrier.dl_class),
            mimo: carrier.mimo_dl,
        }
    }

    fn matches(&self, carrier: &Carrier) -> bool {
        self.band == carrier.band
            && self.class == Some(carrier.dl_class)
            && self.mimo == carrier.mimo_dl
    }
}

/// Write MIMO one decimal digit per byte, left-aligned, 0x00-padded
///
/// Digits 1-9 are stored as raw values. A zero byte is padding, so a zero
/// digit is stored as ASCII `'0'`, which [`read_mimo_digits`] also accepts.
fn write_mimo_digits(writer: &mut ByteWriter, mimo: u32) {
    let digits = mimo.to_string();
    for digit in digits.bytes() {
        match digit - b'0' {
            0 => writer.put_u8(b'0'),
            value => writer.put_u8(value),
        }
    }
    writer.put_zeros(MIMO_DIGITS - digits.len());
}

/// Accumulate digit bytes; zero bytes are padding
///
/// ASCII digits and raw digit values 1..=9 are both accepted.
fn read_mimo_digits(bytes: &[u8]) -> Option<u32> {
    let mut mimo: u32 = 0;
    for &byte in bytes {
        let digit = match byte {
            0 => continue,
            b'0'..=b'9' => byte - b'0',
            1..=9 => byte,
            _ => return None,
        };
        mimo = mimo * 10 + digit as u32;
    }
    Some(mimo)
}

/// Read the six slots of a DL header (tag already consumed)
pub fn read_dl_slots(
    reader: &mut ByteReader<'_>,
    width: DescriptorWidth,
) -> Result<[Slot; SLOT_COUNT], DecodeError> {
    let spec = width.spec();
    let mut slots = [Slot::default(); SLOT_COUNT];

    for slot in slots.iter_mut() {
        let offset = reader.offset();
        let band = reader.read_u16_le()?;
        let class_byte = reader.read_u8()?;
        let mimo = match spec.mimo {
            MimoField::Implicit => {
                if band != 0 {
                    crate::combo::DEFAULT_MIMO
                } else {
                    0
                }
            }
            MimoField::Byte => reader.read_u8()? as u32,
            MimoField::Digits => {
                let digits = reader.read_bytes(MIMO_DIGITS)?;
                read_mimo_digits(digits).ok_or_else(|| DecodeError::MalformedDescriptor {
                    tag: spec.dl_tag,
                    offset,
                    reason: format!("invalid MIMO digits {:02x?}", digits),
                })?
            }
        };

        if band == 0 {
            continue;
        }
        let class = BandClass::from_u8(class_byte).ok_or_else(|| {
            DecodeError::MalformedDescriptor {
                tag: spec.dl_tag,
                offset,
                reason: format!("band {} has invalid class byte {}", band, class_byte),
            }
        })?;
        *slot = Slot {
            band,
            class: Some(class),
            mimo,
        };
    }

    Ok(slots)
}

/// Write a DL header including its tag
pub fn write_dl_header(writer: &mut ByteWriter, width: DescriptorWidth, slots: &[Slot; SLOT_COUNT]) {
    let spec = width.spec();
    writer.put_u16_le(spec.dl_tag);
    for slot in slots {
        writer.put_u16_le(slot.band);
        writer.put_u8(slot.class.map_or(0, BandClass::cc_count));
        match spec.mimo {
            MimoField::Implicit => {}
            MimoField::Byte => writer.put_u8(slot.mimo.min(u8::MAX as u32) as u8),
            MimoField::Digits if slot.is_used() => write_mimo_digits(writer, slot.mimo),
            MimoField::Digits => writer.put_zeros(MIMO_DIGITS),
        }
    }
}

/// One (band, ul_class) pair of an uplink record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UlPair {
    pub band: u16,
    pub ul_class: u8,
}

/// Read the pairs of an uplink record (tag already consumed)
pub fn read_ul_pairs(
    reader: &mut ByteReader<'_>,
    width: DescriptorWidth,
) -> Result<[UlPair; UL_PAIRS], DecodeError> {
    let spec = width.spec();
    let mut pairs = [UlPair::default(); UL_PAIRS];
    for pair in pairs.iter_mut() {
        pair.band = reader.read_u16_le()?;
        pair.ul_class = reader.read_u8()?;
        reader.skip(spec.pair_pad)?;
    }
    reader.skip(spec.ul_tail)?;
    Ok(pairs)
}

/// Write an uplink record including its tag
pub fn write_ul_record(writer: &mut ByteWriter, width: DescriptorWidth, pairs: &[UlPair; UL_PAIRS]) {
    let spec = width.spec();
    writer.put_u16_le(spec.ul_tag);
    for pair in pairs {
        writer.put_u16_le(pair.band);
        writer.put_u8(pair.ul_class);
        writer.put_zeros(spec.pair_pad);
    }
    writer.put_zeros(spec.ul_tail);
}

/// Where a combo came from in a decoded stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Origin {
    pub width: DescriptorWidth,
    /// Index into the decoded group list
    pub group_index: usize,
    /// Uplink pairs with a nonzero band in the record
    ///
    /// Pairs whose band matched no slot count here but have no carrier in
    /// the combo, so a re-encode cannot write them back; the encoder
    /// reports them as `EncodeWarning::UplinkPairsLost`.
    pub ul_pairs: u8,
}

/// A combo plus its decoded origin, if any
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ComboEntry {
    pub combo: Combo,
    pub origin: Option<Origin>,
}

impl ComboEntry {
    /// Entry without an origin (new or generated combo)
    pub fn new(combo: Combo) -> Self {
        Self {
            combo,
            origin: None,
        }
    }

    /// Replace the combo, keeping the group it came from
    pub fn replace(&mut self, combo: Combo) {
        if let Some(origin) = self.origin.as_mut() {
            origin.ul_pairs = combo.ul_count().min(UL_PAIRS) as u8;
        }
        self.combo = combo;
    }

    /// Spatial streams
    pub fn streams(&self) -> u32 {
        self.combo.streams()
    }

    /// Uplink CA, counting every nonzero uplink pair of the decoded record
    pub fn has_ulca(&self) -> bool {
        self.combo.has_ulca() || self.origin.map_or(false, |o| o.ul_pairs > 1)
    }

    /// Line in the export format: `<text> <streams><'*' | ' '>`
    pub fn export_line(&self) -> String {
        format!(
            "{} {}{}",
            self.combo,
            self.streams(),
            if self.has_ulca() { '*' } else { ' ' }
        )
    }
}

impl From<Combo> for ComboEntry {
    fn from(combo: Combo) -> Self {
        Self::new(combo)
    }
}

impl fmt::Display for ComboEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.combo)
    }
}

/// A DL header and the combos serialized as its uplink records
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DescriptorGroup {
    pub width: DescriptorWidth,
    /// Positional slots; positions are part of the group identity
    pub slots: [Slot; SLOT_COUNT],
    /// Member combos in record order
    pub members: Vec<Combo>,
}

impl DescriptorGroup {
    /// Empty group with the given slots
    pub fn new(width: DescriptorWidth, slots: [Slot; SLOT_COUNT]) -> Self {
        Self {
            width,
            slots,
            members: Vec::new(),
        }
    }

    /// Empty group whose slots are the combo's carriers, packed from slot 0
    ///
    /// Carriers beyond [`SLOT_COUNT`] are dropped; callers reject such
    /// combos before grouping.
    pub fn for_combo(width: DescriptorWidth, combo: &Combo) -> Self {
        let mut slots = [Slot::default(); SLOT_COUNT];
        for (slot, carrier) in slots.iter_mut().zip(&combo.carriers) {
            *slot = Slot::from_carrier(carrier);
        }
        Self::new(width, slots)
    }

    /// Carriers of the used slots, in slot order, without uplink
    pub fn carriers(&self) -> Vec<Carrier> {
        self.slots
            .iter()
            .filter_map(|slot| {
                slot.class
                    .filter(|_| slot.band != 0)
                    .map(|class| Carrier::new(slot.band, class, slot.mimo))
            })
            .collect()
    }

    /// Positional key over the raw slots, gaps included
    pub fn dl_key(&self) -> String {
        let mut key = String::with_capacity(64);
        for slot in &self.slots {
            crate::combo::push_slot(&mut key, slot.band, slot.class, slot.mimo);
        }
        key
    }

    /// Key of the used slots packed from slot 0 (comparable to [`Combo::dl_key`])
    pub fn normalized_key(&self) -> String {
        crate::combo::dl_key(&self.carriers())
    }

    /// Band numbers of all slots joined with `:`
    pub fn signature(&self) -> String {
        self.slots
            .iter()
            .map(|slot| slot.band.to_string())
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Check if the combo's downlink part is exactly this group's used slots
    pub fn accepts(&self, combo: &Combo) -> bool {
        let mut used = self.slots.iter().filter(|s| s.is_used());
        combo
            .carriers
            .iter()
            .all(|carrier| used.next().map_or(false, |slot| slot.matches(carrier)))
            && used.next().is_none()
    }

    /// Uplink pairs for a member combo
    ///
    /// Returns the pairs and the number of uplink carriers that did not fit.
    pub fn ul_pairs_for(combo: &Combo) -> ([UlPair; UL_PAIRS], usize) {
        let mut pairs = [UlPair::default(); UL_PAIRS];
        let mut dropped = 0;
        let mut written = 0;
        for carrier in &combo.carriers {
            let Some(ul) = carrier.ul_class else { continue };
            if written < UL_PAIRS {
                pairs[written] = UlPair {
                    band: carrier.band,
                    ul_class: ul.cc_count(),
                };
                written += 1;
            } else {
                dropped += 1;
            }
        }
        (pairs, dropped)
    }

    /// Encoded size of the header plus all member records
    pub fn encoded_size(&self) -> usize {
        let spec = self.width.spec();
        spec.dl_size + spec.ul_size * self.members.len()
    }

    /// Number of descriptors (header + member records)
    pub fn descriptor_count(&self) -> usize {
        1 + self.members.len()
    }
}
