// NVCombo - LTE carrier-aggregation NV item codec
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Band registry
//!
//! Static lookup of E-UTRA operating bands (3GPP TS 36.101, Table 5.5-1)
//! giving the duplex mode and frequency ranges of each band. The table is
//! read-only and sorted by band number.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Duplex mode of an operating band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DuplexMode {
    /// Paired spectrum
    Fdd,
    /// Time-shared unpaired spectrum
    Tdd,
    /// Supplemental downlink (no uplink)
    Sdl,
    /// Band not in the registry
    Unknown,
}

impl DuplexMode {
    /// Whether a carrier on this duplex mode may carry uplink
    pub fn has_uplink(&self) -> bool {
        matches!(self, DuplexMode::Fdd | DuplexMode::Tdd)
    }
}

impl fmt::Display for DuplexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplexMode::Fdd => write!(f, "FDD"),
            DuplexMode::Tdd => write!(f, "TDD"),
            DuplexMode::Sdl => write!(f, "SDL"),
            DuplexMode::Unknown => write!(f, "unknown"),
        }
    }
}

/// Frequency range in MHz (inclusive)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FreqRange {
    pub low: f64,
    pub high: f64,
}

impl FreqRange {
    const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Width of the range in MHz
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    /// Check if a frequency (MHz) lies in the range
    pub fn contains(&self, mhz: f64) -> bool {
        mhz >= self.low && mhz <= self.high
    }
}

/// Registry entry for one operating band
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct BandInfo {
    /// E-UTRA band number
    pub band: u16,
    /// Duplex mode
    pub duplex: DuplexMode,
    /// Downlink range
    pub dl: FreqRange,
    /// Uplink range (`None` for SDL; equal to `dl` for TDD)
    pub ul: Option<FreqRange>,
    /// Common name
    pub name: &'static str,
}

const fn fdd(band: u16, ul: (f64, f64), dl: (f64, f64), name: &'static str) -> BandInfo {
    BandInfo {
        band,
        duplex: DuplexMode::Fdd,
        dl: FreqRange::new(dl.0, dl.1),
        ul: Some(FreqRange::new(ul.0, ul.1)),
        name,
    }
}

const fn tdd(band: u16, range: (f64, f64), name: &'static str) -> BandInfo {
    BandInfo {
        band,
        duplex: DuplexMode::Tdd,
        dl: FreqRange::new(range.0, range.1),
        ul: Some(FreqRange::new(range.0, range.1)),
        name,
    }
}

const fn sdl(band: u16, dl: (f64, f64), name: &'static str) -> BandInfo {
    BandInfo {
        band,
        duplex: DuplexMode::Sdl,
        dl: FreqRange::new(dl.0, dl.1),
        ul: None,
        name,
    }
}

/// Operating bands, sorted by band number
static BANDS: &[BandInfo] = &[
    fdd(1, (1920.0, 1980.0), (2110.0, 2170.0), "2100"),
    fdd(2, (1850.0, 1910.0), (1930.0, 1990.0), "PCS 1900"),
    fdd(3, (1710.0, 1785.0), (1805.0, 1880.0), "1800+"),
    fdd(4, (1710.0, 1755.0), (2110.0, 2155.0), "AWS-1"),
    fdd(5, (824.0, 849.0), (869.0, 894.0), "850"),
    fdd(6, (830.0, 840.0), (875.0, 885.0), "UMTS 800"),
    fdd(7, (2500.0, 2570.0), (2620.0, 2690.0), "2600"),
    fdd(8, (880.0, 915.0), (925.0, 960.0), "900 GSM"),
    fdd(9, (1749.9, 1784.9), (1844.9, 1879.9), "1800"),
    fdd(10, (1710.0, 1770.0), (2110.0, 2170.0), "AWS-1+"),
    fdd(11, (1427.9, 1447.9), (1475.9, 1495.9), "1500 Lower"),
    fdd(12, (699.0, 716.0), (729.0, 746.0), "700 a"),
    fdd(13, (777.0, 787.0), (746.0, 756.0), "700 c"),
    fdd(14, (788.0, 798.0), (758.0, 768.0), "700 PS"),
    fdd(17, (704.0, 716.0), (734.0, 746.0), "700 b"),
    fdd(18, (815.0, 830.0), (860.0, 875.0), "800 Lower"),
    fdd(19, (830.0, 845.0), (875.0, 890.0), "800 Upper"),
    fdd(20, (832.0, 862.0), (791.0, 821.0), "800 DD"),
    fdd(21, (1447.9, 1462.9), (1495.9, 1510.9), "1500 Upper"),
    fdd(22, (3410.0, 3490.0), (3510.0, 3590.0), "3500"),
    fdd(23, (2000.0, 2020.0), (2180.0, 2200.0), "2000 S-band"),
    fdd(24, (1626.5, 1660.5), (1525.0, 1559.0), "1600 L-band"),
    fdd(25, (1850.0, 1915.0), (1930.0, 1995.0), "PCS 1900+"),
    fdd(26, (814.0, 849.0), (859.0, 894.0), "850+"),
    fdd(27, (807.0, 824.0), (852.0, 869.0), "800 SMR"),
    fdd(28, (703.0, 748.0), (758.0, 803.0), "700 APT"),
    sdl(29, (717.0, 728.0), "700 d"),
    fdd(30, (2305.0, 2315.0), (2350.0, 2360.0), "2300 WCS"),
    fdd(31, (452.5, 457.5), (462.5, 467.5), "450"),
    sdl(32, (1452.0, 1496.0), "1500 L-band"),
    tdd(33, (1900.0, 1920.0), "TD 1900"),
    tdd(34, (2010.0, 2025.0), "TD 2000"),
    tdd(35, (1850.0, 1910.0), "TD PCS Lower"),
    tdd(36, (1930.0, 1990.0), "TD PCS Upper"),
    tdd(37, (1910.0, 1930.0), "TD PCS Center gap"),
    tdd(38, (2570.0, 2620.0), "TD 2600"),
    tdd(39, (1880.0, 1920.0), "TD 1900+"),
    tdd(40, (2300.0, 2400.0), "TD 2300"),
    tdd(41, (2496.0, 2690.0), "TD 2500"),
    tdd(42, (3400.0, 3600.0), "TD 3500"),
    tdd(43, (3600.0, 3800.0), "TD 3700"),
    tdd(44, (703.0, 803.0), "TD 700"),
    tdd(45, (1447.0, 1467.0), "TD 1500"),
    tdd(46, (5150.0, 5925.0), "TD Unlicensed"),
    tdd(47, (5855.0, 5925.0), "TD V2X"),
    tdd(48, (3550.0, 3700.0), "TD 3600"),
    tdd(49, (3550.0, 3700.0), "TD 3600r"),
    tdd(50, (1432.0, 1517.0), "TD 1500+"),
    tdd(51, (1427.0, 1432.0), "TD 1500-"),
    tdd(52, (3300.0, 3400.0), "TD 3300"),
    tdd(53, (2483.5, 2495.0), "TD 2500 S"),
    fdd(65, (1920.0, 2010.0), (2110.0, 2200.0), "2100+"),
    fdd(66, (1710.0, 1780.0), (2110.0, 2200.0), "AWS-3"),
    sdl(67, (738.0, 758.0), "700 EU"),
    fdd(68, (698.0, 728.0), (753.0, 783.0), "700 ME"),
    sdl(69, (2570.0, 2620.0), "DL 2600"),
    fdd(70, (1695.0, 1710.0), (1995.0, 2020.0), "AWS-4"),
    fdd(71, (663.0, 698.0), (617.0, 652.0), "600"),
    fdd(72, (451.0, 456.0), (461.0, 466.0), "450 PMR/PAMR"),
    fdd(73, (450.0, 455.0), (460.0, 465.0), "450 APAC"),
    fdd(74, (1427.0, 1470.0), (1475.0, 1518.0), "L-band"),
    sdl(75, (1432.0, 1517.0), "DL 1500+"),
    sdl(76, (1427.0, 1432.0), "DL 1500-"),
    fdd(85, (698.0, 716.0), (728.0, 746.0), "700 a+"),
    fdd(87, (410.0, 415.0), (420.0, 425.0), "410"),
    fdd(88, (412.0, 417.0), (422.0, 427.0), "410+"),
    sdl(252, (5150.0, 5250.0), "U-NII-1"),
    sdl(255, (5725.0, 5850.0), "U-NII-3"),
];

/// Look up a band in the registry
pub fn lookup(band: u16) -> Option<&'static BandInfo> {
    BANDS
        .binary_search_by_key(&band, |info| info.band)
        .ok()
        .map(|idx| &BANDS[idx])
}

/// Duplex mode of a band (`Unknown` when absent from the registry)
pub fn duplex_mode_of(band: u16) -> DuplexMode {
    lookup(band).map_or(DuplexMode::Unknown, |info| info.duplex)
}

/// Whether a band carries uplink (false for SDL and unknown bands)
pub fn has_uplink(band: u16) -> bool {
    duplex_mode_of(band).has_uplink()
}

/// All registered bands
pub fn all_bands() -> &'static [BandInfo] {
    BANDS
}

/// Duplex composition of a set of bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BandMix {
    pub has_fdd: bool,
    pub has_tdd: bool,
    pub has_sdl: bool,
    /// FDD and TDD in the same set
    pub is_mixed: bool,
}

/// Analyze the duplex composition of a band set
pub fn analyze_mix<I>(bands: I) -> BandMix
where
    I: IntoIterator<Item = u16>,
{
    let mut mix = BandMix::default();
    for band in bands {
        match duplex_mode_of(band) {
            DuplexMode::Fdd => mix.has_fdd = true,
            DuplexMode::Tdd => mix.has_tdd = true,
            DuplexMode::Sdl => mix.has_sdl = true,
            DuplexMode::Unknown => {}
        }
    }
    mix.is_mixed = mix.has_fdd && mix.has_tdd;
    mix
}
