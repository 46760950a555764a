//! Combo model
//!
//! This module defines the canonical carrier/combo records and the
//! operations shared by the decoder, encoder and validator:
//! - class ↔ component-carrier count conversion
//! - stream count and uplink-aggregation detection
//! - the combo text notation (`3A4A^-7B2`)
//! - canonical grouping keys

use crate::error::ParseError;
use crate::protocol::MAX_DIGIT_MIMO;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of carriers (and component carriers) in one combo
pub const MAX_CARRIERS: usize = 6;

/// MIMO layers assumed when the text or the descriptor omits them
pub const DEFAULT_MIMO: u32 = 2;

/// Marker for the primary cell in the text notation
pub const PCELL_MARKER: char = '^';

/// Bandwidth class of a carrier (A..F)
///
/// The discriminant is the number of component carriers aggregated by
/// the class, which is also the value stored in descriptor class bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum BandClass {
    A = 1,
    B = 2,
    C = 3,
    D = 4,
    E = 5,
    F = 6,
}

impl BandClass {
    /// All classes in CC order
    pub const ALL: [BandClass; 6] = [
        BandClass::A,
        BandClass::B,
        BandClass::C,
        BandClass::D,
        BandClass::E,
        BandClass::F,
    ];

    /// Number of component carriers (A=1 .. F=6)
    pub fn cc_count(self) -> u8 {
        self as u8
    }

    /// Class for a CC count, clamped to [1, 6]
    pub fn from_cc_count(cc: u8) -> Self {
        Self::ALL[cc.clamp(1, 6) as usize - 1]
    }

    /// Exact conversion from a descriptor class byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1..=6 => Some(Self::ALL[value as usize - 1]),
            _ => None,
        }
    }

    /// Parse a class letter (case-insensitive)
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'A' => Some(BandClass::A),
            'B' => Some(BandClass::B),
            'C' => Some(BandClass::C),
            'D' => Some(BandClass::D),
            'E' => Some(BandClass::E),
            'F' => Some(BandClass::F),
            _ => None,
        }
    }

    /// Upper-case class letter
    pub fn letter(self) -> char {
        (b'A' + self as u8 - 1) as char
    }
}

impl fmt::Display for BandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Class letter → CC count
pub fn class_to_cc(class: BandClass) -> u8 {
    class.cc_count()
}

/// CC count → class letter, clamped to [1, 6]
pub fn cc_to_class(cc: u8) -> BandClass {
    BandClass::from_cc_count(cc)
}

/// One component of a combo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Carrier {
    /// E-UTRA band number
    pub band: u16,
    /// Downlink bandwidth class
    pub dl_class: BandClass,
    /// Downlink MIMO layers
    pub mimo_dl: u32,
    /// Uplink bandwidth class (`None` = no uplink on this carrier)
    pub ul_class: Option<BandClass>,
}

impl Carrier {
    /// Create a downlink-only carrier
    pub fn new(band: u16, dl_class: BandClass, mimo_dl: u32) -> Self {
        Self {
            band,
            dl_class,
            mimo_dl,
            ul_class: None,
        }
    }

    /// Same carrier with an uplink class
    pub fn with_ul(mut self, ul_class: BandClass) -> Self {
        self.ul_class = Some(ul_class);
        self
    }

    /// Component carriers taken by this carrier
    pub fn cc_count(&self) -> u8 {
        self.dl_class.cc_count()
    }

    /// Spatial streams contributed by this carrier (saturating)
    pub fn streams(&self) -> u32 {
        (self.cc_count() as u32).saturating_mul(self.mimo_dl)
    }

    /// Check if this carrier carries uplink
    pub fn has_ul(&self) -> bool {
        self.ul_class.is_some()
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.band, self.dl_class, self.mimo_dl)?;
        if let Some(ul) = self.ul_class {
            write!(f, "{}", ul)?;
        }
        Ok(())
    }
}

/// Σ CC(class) × MIMO over the carriers
pub fn calculate_streams(carriers: &[Carrier]) -> u32 {
    carriers
        .iter()
        .map(Carrier::streams)
        .fold(0, u32::saturating_add)
}

/// More than one carrier with an uplink class
pub fn has_ulca(carriers: &[Carrier]) -> bool {
    carriers.iter().filter(|c| c.has_ul()).count() > 1
}

/// Σ CC over the carriers
pub fn total_cc(carriers: &[Carrier]) -> u32 {
    carriers.iter().map(|c| c.cc_count() as u32).sum()
}

/// Append one `band:class:mimo` slot; an empty slot renders as `0:0:0`
pub(crate) fn push_slot(key: &mut String, band: u16, class: Option<BandClass>, mimo: u32) {
    use std::fmt::Write;

    if !key.is_empty() {
        key.push('|');
    }
    match class {
        Some(class) if band != 0 => {
            let _ = write!(key, "{}:{}:{}", band, class, mimo);
        }
        _ => key.push_str("0:0:0"),
    }
}

/// Positional downlink key
///
/// Carriers are padded to [`MAX_CARRIERS`] slots and rendered in order.
/// Uplink classes are ignored, so combos that only differ in uplink share
/// a key.
pub fn dl_key(carriers: &[Carrier]) -> String {
    let mut key = String::with_capacity(64);
    for carrier in carriers {
        push_slot(
            &mut key,
            carrier.band,
            Some(carrier.dl_class),
            carrier.mimo_dl,
        );
    }
    for _ in carriers.len()..MAX_CARRIERS {
        push_slot(&mut key, 0, None, 0);
    }
    key
}

/// Order-independent key: carriers sorted by (band, class), then keyed
pub fn combo_key(carriers: &[Carrier]) -> String {
    let mut sorted = carriers.to_vec();
    sorted.sort_by_key(|c| (c.band, c.dl_class));
    dl_key(&sorted)
}

/// A band combination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Combo {
    /// Carriers in slot order
    pub carriers: Vec<Carrier>,
    /// Index of the primary cell in `carriers`, if declared
    pub pcell_index: Option<usize>,
}

impl Combo {
    /// Create a combo without a declared primary cell
    pub fn new(carriers: Vec<Carrier>) -> Self {
        Self {
            carriers,
            pcell_index: None,
        }
    }

    /// Same combo with the primary cell at `index`
    pub fn with_pcell(mut self, index: usize) -> Self {
        self.pcell_index = (index < self.carriers.len()).then_some(index);
        self
    }

    /// Number of carriers
    pub fn len(&self) -> usize {
        self.carriers.len()
    }

    /// Check if the combo has no carriers
    pub fn is_empty(&self) -> bool {
        self.carriers.is_empty()
    }

    /// Σ CC over the carriers
    pub fn total_cc(&self) -> u32 {
        total_cc(&self.carriers)
    }

    /// Total spatial streams
    pub fn streams(&self) -> u32 {
        calculate_streams(&self.carriers)
    }

    /// Uplink carrier count
    pub fn ul_count(&self) -> usize {
        self.carriers.iter().filter(|c| c.has_ul()).count()
    }

    /// Uplink carrier aggregation
    pub fn has_ulca(&self) -> bool {
        has_ulca(&self.carriers)
    }

    /// Largest MIMO value over the carriers
    pub fn max_mimo(&self) -> u32 {
        self.carriers.iter().map(|c| c.mimo_dl).max().unwrap_or(0)
    }

    /// Positional downlink key (see [`dl_key`])
    pub fn dl_key(&self) -> String {
        dl_key(&self.carriers)
    }

    /// Order-independent key (see [`combo_key`])
    pub fn combo_key(&self) -> String {
        combo_key(&self.carriers)
    }

    /// Bands in carrier order
    pub fn bands(&self) -> impl Iterator<Item = u16> + '_ {
        self.carriers.iter().map(|c| c.band)
    }

    /// Primary cell used by the uplink rules
    ///
    /// The declared PCell if any; otherwise the first uplink carrier.
    pub fn effective_pcell(&self) -> Option<usize> {
        self.pcell_index
            .filter(|&idx| idx < self.carriers.len())
            .or_else(|| self.carriers.iter().position(Carrier::has_ul))
    }

    /// Sort carriers by (band, class), keeping the PCell on the same carrier
    pub fn sort_carriers(&mut self) {
        let mut indexed: Vec<(usize, Carrier)> =
            self.carriers.iter().copied().enumerate().collect();
        indexed.sort_by_key(|(_, c)| (c.band, c.dl_class));

        self.pcell_index = self
            .pcell_index
            .and_then(|old| indexed.iter().position(|(idx, _)| *idx == old));
        self.carriers = indexed.into_iter().map(|(_, c)| c).collect();
    }

    /// Line in the export format: `<text> <streams><'*' | ' '>`
    pub fn export_line(&self) -> String {
        format!(
            "{} {}{}",
            self,
            self.streams(),
            if self.has_ulca() { '*' } else { ' ' }
        )
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, carrier) in self.carriers.iter().enumerate() {
            if idx > 0 {
                write!(f, "-")?;
            }
            write!(f, "{}", carrier)?;
            if self.pcell_index == Some(idx) {
                write!(f, "{}", PCELL_MARKER)?;
            }
        }
        Ok(())
    }
}

impl FromStr for Combo {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_combo_string(s)
    }
}

/// Take a leading run of ASCII digits
fn take_digits(input: &str) -> (&str, &str) {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    input.split_at(end)
}

/// Parse one `BAND CLASS [MIMO] [UL] [^]` segment
fn parse_carrier(segment: &str) -> Result<(Carrier, bool), ParseError> {
    let (band_digits, rest) = take_digits(segment);
    if band_digits.is_empty() {
        return Err(ParseError::segment(segment, "missing band number"));
    }
    let band: u16 = band_digits
        .parse()
        .map_err(|_| ParseError::segment(segment, "band number out of range"))?;
    if band == 0 {
        return Err(ParseError::segment(segment, "band 0 is not a band"));
    }

    let mut chars = rest.chars();
    let dl_class = chars
        .next()
        .and_then(BandClass::from_letter)
        .ok_or_else(|| ParseError::segment(segment, "missing class letter A-F"))?;
    let rest = chars.as_str();

    let (mimo_digits, rest) = take_digits(rest);
    let mimo_dl = if mimo_digits.is_empty() {
        DEFAULT_MIMO
    } else {
        let mimo: u32 = mimo_digits
            .parse()
            .map_err(|_| ParseError::segment(segment, "MIMO out of range"))?;
        if mimo == 0 {
            return Err(ParseError::segment(segment, "MIMO must be positive"));
        }
        if mimo > MAX_DIGIT_MIMO {
            return Err(ParseError::segment(
                segment,
                format!("MIMO above {}", MAX_DIGIT_MIMO),
            ));
        }
        mimo
    };

    let mut rest = rest;
    let mut ul_class = None;
    if let Some(first) = rest.chars().next() {
        if let Some(class) = BandClass::from_letter(first) {
            ul_class = Some(class);
            rest = &rest[first.len_utf8()..];
        }
    }

    let pcell = match rest.strip_prefix(PCELL_MARKER) {
        Some(tail) => {
            rest = tail;
            true
        }
        None => false,
    };

    if !rest.is_empty() {
        return Err(ParseError::segment(
            segment,
            format!("unexpected trailing '{}'", rest),
        ));
    }

    Ok((
        Carrier {
            band,
            dl_class,
            mimo_dl,
            ul_class,
        },
        pcell,
    ))
}

/// Parse the combo text notation, e.g. `3A4A^-7B2-20A`
pub fn parse_combo_string(text: &str) -> Result<Combo, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut combo = Combo::default();
    for segment in text.split('-') {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(ParseError::segment(segment, "empty carrier segment"));
        }
        let (carrier, pcell) = parse_carrier(segment)?;
        if pcell {
            if combo.pcell_index.is_some() {
                return Err(ParseError::MultiplePcell(text.to_string()));
            }
            combo.pcell_index = Some(combo.carriers.len());
        }
        combo.carriers.push(carrier);
    }
    Ok(combo)
}

/// A line that failed to parse during bulk ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    /// 1-based line number
    pub line: usize,
    pub error: ParseError,
}

/// Result of bulk text ingestion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComboList {
    pub combos: Vec<Combo>,
    pub errors: Vec<LineError>,
}

/// Parse one combo per line
///
/// Blank lines and `#` comments are skipped. Only the first token of a
/// line is read, so export lines (`3A2A-7B4 10 `) can be fed back.
/// Lines that fail to parse are recorded and skipped.
pub fn parse_combo_list(text: &str) -> ComboList {
    let mut list = ComboList::default();

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let token = line.split_whitespace().next().unwrap_or_default();
        match parse_combo_string(token) {
            Ok(combo) => list.combos.push(combo),
            Err(error) => {
                log::debug!("skipping line {}: {}", idx + 1, error);
                list.errors.push(LineError {
                    line: idx + 1,
                    error,
                });
            }
        }
    }

    list
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_cc_bijection() {
        for (idx, class) in BandClass::ALL.iter().enumerate() {
            let cc = idx as u8 + 1;
            assert_eq!(class_to_cc(*class), cc);
            assert_eq!(cc_to_class(cc), *class);
            assert_eq!(cc_to_class(class_to_cc(*class)), *class);
        }
    }

    #[test]
    fn test_cc_to_class_clamps() {
        assert_eq!(cc_to_class(0), BandClass::A);
        assert_eq!(cc_to_class(9), BandClass::F);
        assert_eq!(BandClass::from_u8(0), None);
        assert_eq!(BandClass::from_u8(7), None);
    }

    #[test]
    fn test_mimo_ceiling() {
        let combo: Combo = "1F99999999".parse().unwrap();
        assert_eq!(combo.carriers[0].mimo_dl, MAX_DIGIT_MIMO);
        assert!(matches!(
            "1F999999999".parse::<Combo>(),
            Err(ParseError::InvalidSegment { .. })
        ));
        assert!(matches!(
            "1F99999999999".parse::<Combo>(),
            Err(ParseError::InvalidSegment { .. })
        ));
    }

    #[test]
    fn test_streams_saturate() {
        let carriers = [
            Carrier::new(1, BandClass::F, u32::MAX),
            Carrier::new(3, BandClass::A, 2),
        ];
        assert_eq!(carriers[0].streams(), u32::MAX);
        assert_eq!(calculate_streams(&carriers), u32::MAX);

        let entry = crate::protocol::ComboEntry::new(Combo::new(carriers.to_vec()));
        assert_eq!(entry.export_line(), format!("1F{}-3A2 {} ", u32::MAX, u32::MAX));
    }

    #[test]
    fn test_calculate_streams() {
        let carriers = [
            Carrier::new(3, BandClass::A, 2),
            Carrier::new(7, BandClass::B, 4),
        ];
        assert_eq!(calculate_streams(&carriers), 10);
    }

    #[test]
    fn test_has_ulca() {
        let one_ul: Combo = "3A2A-7B4".parse().unwrap();
        assert!(!one_ul.has_ulca());

        let two_ul: Combo = "3A2A-7B4A".parse().unwrap();
        assert!(two_ul.has_ulca());

        let mixed_classes: Combo = "3A2C-7B4A".parse().unwrap();
        assert!(mixed_classes.has_ulca());
    }

    #[test]
    fn test_parse_defaults_mimo() {
        let combo = parse_combo_string("3A-7C").unwrap();
        assert_eq!(combo.carriers[0].mimo_dl, DEFAULT_MIMO);
        assert_eq!(combo.carriers[1].dl_class, BandClass::C);
        assert_eq!(combo.carriers[1].ul_class, None);
    }

    #[test]
    fn test_parse_full_carrier() {
        let combo = parse_combo_string("66b4a^-2A").unwrap();
        assert_eq!(
            combo.carriers[0],
            Carrier::new(66, BandClass::B, 4).with_ul(BandClass::A)
        );
        assert_eq!(combo.pcell_index, Some(0));
        assert_eq!(combo.to_string(), "66B4A^-2A2");
    }

    #[test]
    fn test_parse_wide_mimo() {
        let combo = parse_combo_string("41C300").unwrap();
        assert_eq!(combo.carriers[0].mimo_dl, 300);
    }

    #[test]
    fn test_parse_errors_name_segment() {
        let err = parse_combo_string("3A2-X7").unwrap_err();
        match err {
            ParseError::InvalidSegment { segment, .. } => assert_eq!(segment, "X7"),
            other => panic!("unexpected error {:?}", other),
        }

        assert!(parse_combo_string("3G").is_err());
        assert!(parse_combo_string("3A0").is_err());
        assert!(parse_combo_string("3A2AB").is_err());
        assert!(parse_combo_string("3A--7A").is_err());
        assert_eq!(parse_combo_string("  "), Err(ParseError::Empty));
        assert!(matches!(
            parse_combo_string("3A^-7A^"),
            Err(ParseError::MultiplePcell(_))
        ));
    }

    #[test]
    fn test_display_roundtrip() {
        for text in ["3A2A-7B4", "1A4-3C2A^-7A2-20A2", "41C300"] {
            let combo: Combo = text.parse().unwrap();
            assert_eq!(combo.to_string(), text);
        }
    }

    #[test]
    fn test_dl_key_ignores_ul() {
        let a: Combo = "3A2A-7B4".parse().unwrap();
        let b: Combo = "3A2-7B4A".parse().unwrap();
        assert_eq!(a.dl_key(), b.dl_key());
        assert_eq!(a.dl_key(), "3:A:2|7:B:4|0:0:0|0:0:0|0:0:0|0:0:0");
    }

    #[test]
    fn test_dl_key_is_positional() {
        let a: Combo = "3A2-7B4".parse().unwrap();
        let b: Combo = "7B4-3A2".parse().unwrap();
        assert_ne!(a.dl_key(), b.dl_key());
        assert_eq!(a.combo_key(), b.combo_key());
    }

    #[test]
    fn test_sort_carriers_tracks_pcell() {
        let mut combo: Combo = "20A2-7B4A^-3A2A".parse().unwrap();
        combo.sort_carriers();
        assert_eq!(combo.to_string(), "3A2A-7B4A^-20A2");
        assert_eq!(combo.pcell_index, Some(1));
    }

    #[test]
    fn test_effective_pcell() {
        let combo: Combo = "20A2-7B4A-3A2A".parse().unwrap();
        assert_eq!(combo.effective_pcell(), Some(1));

        let combo: Combo = "20A2-7B4A-3A2A^".parse().unwrap();
        assert_eq!(combo.effective_pcell(), Some(2));

        let combo: Combo = "20A2-7B4".parse().unwrap();
        assert_eq!(combo.effective_pcell(), None);
    }

    #[test]
    fn test_export_line() {
        let combo: Combo = "3A2A-7B4A".parse().unwrap();
        assert_eq!(combo.export_line(), "3A2A-7B4A 10*");

        let combo: Combo = "3A2A-7B4".parse().unwrap();
        assert_eq!(combo.export_line(), "3A2A-7B4 10 ");
    }

    #[test]
    fn test_parse_combo_list_skips_bad_lines() {
        let text = "# header\n3A2A-7B4 10 \n\nbogus\n1A4-3A2A 10*\n";
        let list = parse_combo_list(text);
        assert_eq!(list.combos.len(), 2);
        assert_eq!(list.errors.len(), 1);
        assert_eq!(list.errors[0].line, 4);
        assert_eq!(list.combos[1].to_string(), "1A4-3A2A");
    }
}
