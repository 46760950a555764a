//! Metrics for NVCombo streams
//!
//! This module provides per-tag descriptor counters and compression
//! statistics reported by the decoder and encoder.

use crate::protocol::DescriptorKind;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Descriptor counts per tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DescriptorStats {
    counts: BTreeMap<u16, u64>,
}

impl DescriptorStats {
    /// Create a collector with every known tag at zero
    pub fn new() -> Self {
        Self {
            counts: DescriptorKind::ALL.iter().map(|k| (k.tag(), 0)).collect(),
        }
    }

    /// Record one descriptor
    pub fn record(&mut self, kind: DescriptorKind) {
        *self.counts.entry(kind.tag()).or_insert(0) += 1;
    }

    /// Count for one kind
    pub fn count(&self, kind: DescriptorKind) -> u64 {
        self.counts.get(&kind.tag()).copied().unwrap_or(0)
    }

    /// Counts keyed by tag, in tag order
    pub fn counts(&self) -> &BTreeMap<u16, u64> {
        &self.counts
    }

    /// Total descriptors recorded
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// DL headers recorded
    pub fn dl_headers(&self) -> u64 {
        DescriptorKind::ALL
            .iter()
            .filter(|k| k.is_dl_header())
            .map(|k| self.count(*k))
            .sum()
    }

    /// Uplink records recorded
    pub fn ul_records(&self) -> u64 {
        self.total() - self.dl_headers()
    }

    /// Reset all counters
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Generate a human-readable report
    pub fn report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== NV Descriptor Statistics ===\n\n");
        report.push_str(&format!("DL headers: {}\n", self.dl_headers()));
        report.push_str(&format!("UL records: {}\n\n", self.ul_records()));

        let total = self.total();
        for (tag, count) in &self.counts {
            let percent = if total > 0 {
                (*count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            report.push_str(&format!("  {}: {} ({:.1}%)\n", tag, count, percent));
        }

        report
    }
}

/// Sizes around a compression step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompressionStats {
    /// Uncompressed descriptor stream size
    pub raw_bytes: usize,
    /// zlib stream size
    pub compressed_bytes: usize,
}

impl CompressionStats {
    pub fn new(raw_bytes: usize, compressed_bytes: usize) -> Self {
        Self {
            raw_bytes,
            compressed_bytes,
        }
    }

    /// Calculate compression ratio (higher = better)
    /// Returns raw_size / compressed_size
    pub fn compression_ratio(&self) -> f64 {
        if self.compressed_bytes == 0 {
            return 1.0;
        }
        self.raw_bytes as f64 / self.compressed_bytes as f64
    }

    /// Calculate space savings percentage
    /// Returns (1 - compressed/raw) * 100
    pub fn space_savings_percent(&self) -> f64 {
        if self.raw_bytes == 0 {
            return 0.0;
        }
        (1.0 - (self.compressed_bytes as f64 / self.raw_bytes as f64)) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_start_at_zero() {
        let stats = DescriptorStats::new();
        assert_eq!(stats.counts().len(), 6);
        assert_eq!(stats.total(), 0);
    }

    #[test]
    fn test_record() {
        let mut stats = DescriptorStats::new();
        stats.record(DescriptorKind::DlNarrow);
        stats.record(DescriptorKind::UlNarrow);
        stats.record(DescriptorKind::UlNarrow);
        stats.record(DescriptorKind::DlWide);

        assert_eq!(stats.count(DescriptorKind::UlNarrow), 2);
        assert_eq!(stats.dl_headers(), 2);
        assert_eq!(stats.ul_records(), 2);

        let report = stats.report();
        assert!(report.contains("138: 2 (50.0%)"));

        stats.reset();
        assert_eq!(stats.total(), 0);
    }

    #[test]
    fn test_compression_ratio() {
        let stats = CompressionStats::new(1000, 250);
        assert!((stats.compression_ratio() - 4.0).abs() < 0.001);
        assert!((stats.space_savings_percent() - 75.0).abs() < 0.001);

        assert_eq!(CompressionStats::new(0, 0).compression_ratio(), 1.0);
        assert_eq!(CompressionStats::new(0, 0).space_savings_percent(), 0.0);
    }
}
