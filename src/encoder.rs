//! Encoder module
//!
//! This module serializes a combo list into an NV item descriptor stream.
//! Combos are first arranged into descriptor groups by one of three
//! grouping strategies, then written into a buffer sized up front.

use crate::combo::{Combo, MAX_CARRIERS};
use crate::compression;
use crate::decoder::DecodeOutput;
use crate::error::{EncodeError, Result};
use crate::metrics::CompressionStats;
use crate::protocol::{
    write_dl_header, write_ul_record, ByteWriter, ComboEntry, DescriptorGroup, DescriptorWidth,
    MimoField, StreamHeader, HEADER_SIZE, MAX_DIGIT_MIMO, UL_PAIRS,
};
use crate::validator::{validate_combo, DeviceProfile, IssueCode};
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Format version written when none is carried over from a decode
pub const DEFAULT_FORMAT_VERSION: u16 = 1;

/// How combos are arranged into descriptor groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GroupingStrategy {
    /// Reuse the groups of a prior decode
    PreserveOriginal,
    /// Narrowest descriptor width per combo
    #[default]
    AutoDetect,
    /// One width for every combo
    Fixed(DescriptorWidth),
}

/// Configuration for the encoder
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EncoderConfig {
    pub strategy: GroupingStrategy,
    /// Share one DL header between combos with the same DL key (default: true)
    pub optimize_grouping: bool,
    pub format_version: u16,
    /// Deflate the finished buffer (default: false)
    pub compress: bool,
    /// Deflate level 0-9 (default: 6)
    pub compression_level: u32,
    /// Leave out combos that fail this profile (default: none)
    pub validation: Option<DeviceProfile>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            strategy: GroupingStrategy::AutoDetect,
            optimize_grouping: true,
            format_version: DEFAULT_FORMAT_VERSION,
            compress: false,
            compression_level: compression::DEFAULT_LEVEL,
            validation: None,
        }
    }
}

impl EncoderConfig {
    /// Re-encode a decoded stream with its original grouping and version
    pub fn preserving(decoded: &DecodeOutput) -> Self {
        Self {
            strategy: GroupingStrategy::PreserveOriginal,
            format_version: decoded.format_version,
            compress: decoded.compression.is_some(),
            ..Default::default()
        }
    }
}

/// Non-fatal encoding event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeWarning {
    /// More than two uplink carriers; the extra ones were not written
    UplinkTruncated { combo: String, dropped: usize },
    /// Combo cannot be represented in six slots
    Unrepresentable { combo: String, reason: String },
    /// Combo failed the configured device profile
    ValidationFailed { combo: String, codes: Vec<IssueCode> },
    /// Group width stores no MIMO; these carriers read back as MIMO 2
    MimoDropped { combo: String, carriers: usize },
    /// Decoded uplink pairs that matched no carrier were not written back
    UplinkPairsLost { combo: String, lost: usize },
}

impl fmt::Display for EncodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeWarning::UplinkTruncated { combo, dropped } => {
                write!(f, "{}: {} uplink carrier(s) beyond two not written", combo, dropped)
            }
            EncodeWarning::Unrepresentable { combo, reason } => {
                write!(f, "{}: skipped, {}", combo, reason)
            }
            EncodeWarning::ValidationFailed { combo, codes } => {
                let codes: Vec<&str> = codes.iter().map(IssueCode::as_str).collect();
                write!(f, "{}: skipped, {}", combo, codes.join(", "))
            }
            EncodeWarning::MimoDropped { combo, carriers } => {
                write!(f, "{}: MIMO of {} carrier(s) not stored", combo, carriers)
            }
            EncodeWarning::UplinkPairsLost { combo, lost } => {
                write!(f, "{}: {} unmatched uplink pair(s) not written", combo, lost)
            }
        }
    }
}

/// Result of one encode call
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeOutput {
    /// Final bytes (compressed when configured)
    pub bytes: Vec<u8>,
    pub format_version: u16,
    /// DL headers plus member records, as written in the header
    pub descriptor_count: u16,
    /// Groups in write order
    pub groups: Vec<DescriptorGroup>,
    pub warnings: Vec<EncodeWarning>,
    /// Set when the buffer was deflated
    pub compression: Option<CompressionStats>,
}

impl EncodeOutput {
    /// Combos written
    pub fn combo_count(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }

    /// Compression ratio, 1.0 when not compressed
    pub fn compression_ratio(&self) -> f64 {
        self.compression
            .map_or(1.0, |stats| stats.compression_ratio())
    }
}

/// Encoder for NV item descriptor streams
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    config: EncoderConfig,
}

impl Encoder {
    /// Create an encoder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an encoder with custom configuration
    pub fn with_config(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encode combos
    ///
    /// `original_groups` are the groups of the decode the entries came from;
    /// they are required by [`GroupingStrategy::PreserveOriginal`] and
    /// ignored otherwise.
    pub fn encode(
        &self,
        entries: &[ComboEntry],
        original_groups: Option<&[DescriptorGroup]>,
    ) -> Result<EncodeOutput> {
        if entries.is_empty() {
            return Err(EncodeError::EmptyInput.into());
        }
        let originals: &[DescriptorGroup] = match (self.config.strategy, original_groups) {
            (GroupingStrategy::PreserveOriginal, Some(groups)) if !groups.is_empty() => groups,
            (GroupingStrategy::PreserveOriginal, _) => {
                return Err(EncodeError::MissingOriginalGroups.into())
            }
            (_, _) => &[],
        };

        let mut warnings = Vec::new();
        let accepted: Vec<&ComboEntry> = entries
            .iter()
            .filter(|entry| self.accept(&entry.combo, &mut warnings))
            .collect();
        if accepted.is_empty() {
            return Err(EncodeError::EmptyInput.into());
        }
        for entry in &accepted {
            check_unmatched_pairs(entry, &mut warnings);
        }

        let groups = match self.config.strategy {
            GroupingStrategy::PreserveOriginal => group_preserving(&accepted, originals),
            GroupingStrategy::AutoDetect => self.group_by_key(&accepted, None),
            GroupingStrategy::Fixed(width) => self.group_by_key(&accepted, Some(width)),
        };
        check_mimo_fits(&groups)?;

        let descriptor_count: usize = groups.iter().map(DescriptorGroup::descriptor_count).sum();
        if descriptor_count > u16::MAX as usize {
            return Err(EncodeError::TooManyDescriptors {
                count: descriptor_count,
                max: u16::MAX as usize,
            }
            .into());
        }
        let total_size = HEADER_SIZE
            + groups
                .iter()
                .map(DescriptorGroup::encoded_size)
                .sum::<usize>();

        let mut writer = ByteWriter::with_capacity(total_size);
        StreamHeader {
            format_version: self.config.format_version,
            descriptor_count: descriptor_count as u16,
        }
        .write(&mut writer);

        for group in &groups {
            write_dl_header(&mut writer, group.width, &group.slots);
            let mimo_field = group.width.spec().mimo;
            for member in &group.members {
                let dropped_mimo = member
                    .carriers
                    .iter()
                    .filter(|c| !mimo_field.fits(c.mimo_dl))
                    .count();
                if dropped_mimo > 0 {
                    log::warn!("{}: MIMO dropped at width {}", member, group.width);
                    warnings.push(EncodeWarning::MimoDropped {
                        combo: member.to_string(),
                        carriers: dropped_mimo,
                    });
                }
                let (pairs, dropped) = DescriptorGroup::ul_pairs_for(member);
                if dropped > 0 {
                    log::warn!("{}: {} uplink carrier(s) truncated", member, dropped);
                    warnings.push(EncodeWarning::UplinkTruncated {
                        combo: member.to_string(),
                        dropped,
                    });
                }
                write_ul_record(&mut writer, group.width, &pairs);
            }
        }
        debug_assert_eq!(writer.len(), total_size);

        let raw = writer.into_inner();
        let (bytes, compression) = if self.config.compress {
            let packed = compression::deflate(&raw, self.config.compression_level)?;
            let stats = CompressionStats::new(raw.len(), packed.len());
            log::debug!(
                "deflated {} -> {} bytes ({:.2}x)",
                raw.len(),
                packed.len(),
                stats.compression_ratio()
            );
            (packed, Some(stats))
        } else {
            (raw, None)
        };

        log::info!(
            "encoded {} combos in {} groups ({} descriptors, {} bytes)",
            accepted.len(),
            groups.len(),
            descriptor_count,
            bytes.len()
        );

        Ok(EncodeOutput {
            bytes,
            format_version: self.config.format_version,
            descriptor_count: descriptor_count as u16,
            groups,
            warnings,
            compression,
        })
    }

    /// Encode plain combos (no decode origin)
    pub fn encode_combos(&self, combos: &[Combo]) -> Result<EncodeOutput> {
        let entries: Vec<ComboEntry> = combos.iter().cloned().map(ComboEntry::new).collect();
        self.encode(&entries, None)
    }

    /// Check that a combo can be written and passes the configured profile
    fn accept(&self, combo: &Combo, warnings: &mut Vec<EncodeWarning>) -> bool {
        let reason = if combo.is_empty() {
            Some("no carriers".to_string())
        } else if combo.len() > MAX_CARRIERS {
            Some(format!("{} carriers exceed {} slots", combo.len(), MAX_CARRIERS))
        } else if combo.total_cc() > MAX_CARRIERS as u32 {
            Some(format!(
                "{} component carriers exceed {}",
                combo.total_cc(),
                MAX_CARRIERS
            ))
        } else if !matches!(self.config.strategy, GroupingStrategy::Fixed(_))
            && combo.max_mimo() > MAX_DIGIT_MIMO
        {
            // a forced width reports MimoOutOfRange instead
            Some(format!(
                "MIMO {} exceeds {}",
                combo.max_mimo(),
                MAX_DIGIT_MIMO
            ))
        } else {
            None
        };
        if let Some(reason) = reason {
            log::warn!("{}: skipped, {}", combo, reason);
            warnings.push(EncodeWarning::Unrepresentable {
                combo: combo.to_string(),
                reason,
            });
            return false;
        }

        if let Some(profile) = &self.config.validation {
            let report = validate_combo(combo, profile);
            if !report.valid {
                log::warn!("{}: failed profile {}", combo, profile.name);
                warnings.push(EncodeWarning::ValidationFailed {
                    combo: combo.to_string(),
                    codes: report.error_codes(),
                });
                return false;
            }
        }
        true
    }

    /// Group by (width, DL key), or one group per combo when not optimizing
    ///
    /// Groups come out by width (narrowest first), then by key.
    fn group_by_key(
        &self,
        entries: &[&ComboEntry],
        fixed: Option<DescriptorWidth>,
    ) -> Vec<DescriptorGroup> {
        let width_of =
            |combo: &Combo| fixed.unwrap_or_else(|| DescriptorWidth::minimum_for(&combo.carriers));

        if self.config.optimize_grouping {
            let mut buckets: BTreeMap<(DescriptorWidth, String), DescriptorGroup> = BTreeMap::new();
            for entry in entries {
                let width = width_of(&entry.combo);
                buckets
                    .entry((width, entry.combo.dl_key()))
                    .or_insert_with(|| DescriptorGroup::for_combo(width, &entry.combo))
                    .members
                    .push(entry.combo.clone());
            }
            buckets.into_values().collect()
        } else {
            let mut singles: Vec<((DescriptorWidth, String), DescriptorGroup)> = entries
                .iter()
                .map(|entry| {
                    let width = width_of(&entry.combo);
                    let mut group = DescriptorGroup::for_combo(width, &entry.combo);
                    group.members.push(entry.combo.clone());
                    ((width, entry.combo.dl_key()), group)
                })
                .collect();
            singles.sort_by(|a, b| a.0.cmp(&b.0));
            singles.into_iter().map(|(_, group)| group).collect()
        }
    }
}

/// Rebuild the original groups around the live combos
///
/// Pass 1 returns each entry to the group it was decoded from, as long as
/// its downlink part still equals that group's slots. Pass 2 places the
/// rest by normalized DL key, preferring groups that already have members,
/// and opens new groups for keys never seen.
fn group_preserving(entries: &[&ComboEntry], originals: &[DescriptorGroup]) -> Vec<DescriptorGroup> {
    let mut groups: Vec<DescriptorGroup> = originals
        .iter()
        .map(|g| DescriptorGroup::new(g.width, g.slots))
        .collect();

    let mut unmatched: Vec<&Combo> = Vec::new();
    for entry in entries {
        match entry.origin {
            Some(origin)
                if origin.group_index < groups.len()
                    && groups[origin.group_index].accepts(&entry.combo) =>
            {
                groups[origin.group_index].members.push(entry.combo.clone());
            }
            _ => unmatched.push(&entry.combo),
        }
    }

    let matched = entries.len() - unmatched.len();
    let mut keys: Vec<String> = groups.iter().map(DescriptorGroup::normalized_key).collect();
    for combo in unmatched {
        let key = combo.dl_key();
        let target = groups
            .iter()
            .zip(&keys)
            .position(|(g, k)| !g.members.is_empty() && *k == key)
            .or_else(|| keys.iter().position(|k| *k == key));

        match target {
            Some(idx) => groups[idx].members.push(combo.clone()),
            None => {
                let width = DescriptorWidth::minimum_for(&combo.carriers);
                let mut group = DescriptorGroup::for_combo(width, combo);
                group.members.push(combo.clone());
                log::debug!("new {} group for {}", width, combo);
                groups.push(group);
                keys.push(key);
            }
        }
    }
    log::debug!(
        "{} combos kept their group, {} regrouped",
        matched,
        entries.len() - matched
    );

    groups.retain(|g| !g.members.is_empty());
    for group in groups.iter_mut() {
        group.members.sort_by_cached_key(|c| c.to_string());
    }
    groups.sort_by_cached_key(DescriptorGroup::signature);
    groups
}

/// Warn when a decoded record had more uplink pairs than the combo can
/// write back (pairs whose band matched no carrier)
fn check_unmatched_pairs(entry: &ComboEntry, warnings: &mut Vec<EncodeWarning>) {
    let Some(origin) = entry.origin else { return };
    let written = entry.combo.ul_count().min(UL_PAIRS);
    let lost = (origin.ul_pairs as usize).saturating_sub(written);
    if lost > 0 {
        log::warn!("{}: {} unmatched uplink pair(s) lost", entry.combo, lost);
        warnings.push(EncodeWarning::UplinkPairsLost {
            combo: entry.combo.to_string(),
            lost,
        });
    }
}

/// Check every used slot's MIMO against its group width
///
/// Narrow groups drop MIMO by definition and are not checked.
fn check_mimo_fits(groups: &[DescriptorGroup]) -> std::result::Result<(), EncodeError> {
    for group in groups {
        let field = group.width.spec().mimo;
        if field == MimoField::Implicit {
            continue;
        }
        if let Some(slot) = group
            .slots
            .iter()
            .find(|s| s.is_used() && !field.fits(s.mimo))
        {
            return Err(EncodeError::MimoOutOfRange {
                band: slot.band,
                mimo: slot.mimo,
                tag: group.width.dl_tag(),
            });
        }
    }
    Ok(())
}

/// Encode plain combos with the default configuration
pub fn encode(combos: &[Combo]) -> Result<EncodeOutput> {
    Encoder::new().encode_combos(combos)
}
