// NVCombo - LTE carrier-aggregation NV item codec
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Combo validation module
//!
//! This module checks a combo against structural rules (component carrier
//! ceilings, uplink limits, duplex mixing) and against the band/MIMO
//! restrictions of a device profile. Validation never fails: problems are
//! returned as data in a [`ValidationReport`].

use crate::band::{self, DuplexMode};
use crate::combo::Combo;
use std::collections::BTreeSet;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rule that produced an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IssueCode {
    EmptyCombo,
    FddTddMix,
    SdlWithUl,
    ExceedMaxCc,
    ExceedMaxDlCc,
    ExceedMaxUlScell,
    ExceedMaxTotalUl,
    InvalidBand,
    UnsupportedBand,
    UnsupportedMimo,
}

impl IssueCode {
    /// Stable upper-snake identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::EmptyCombo => "EMPTY_COMBO",
            IssueCode::FddTddMix => "FDD_TDD_MIX",
            IssueCode::SdlWithUl => "SDL_WITH_UL",
            IssueCode::ExceedMaxCc => "EXCEED_MAX_CC",
            IssueCode::ExceedMaxDlCc => "EXCEED_MAX_DL_CC",
            IssueCode::ExceedMaxUlScell => "EXCEED_MAX_UL_SCELL",
            IssueCode::ExceedMaxTotalUl => "EXCEED_MAX_TOTAL_UL",
            IssueCode::InvalidBand => "INVALID_BAND",
            IssueCode::UnsupportedBand => "UNSUPPORTED_BAND",
            IssueCode::UnsupportedMimo => "UNSUPPORTED_MIMO",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validation finding
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,
}

impl ValidationIssue {
    fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Outcome of validating one combo
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ValidationReport {
    /// No errors (warnings do not count)
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Check if any error or warning has this code
    pub fn has(&self, code: IssueCode) -> bool {
        self.errors
            .iter()
            .chain(&self.warnings)
            .any(|issue| issue.code == code)
    }

    /// Codes of all errors, in rule order
    pub fn error_codes(&self) -> Vec<IssueCode> {
        self.errors.iter().map(|issue| issue.code).collect()
    }
}

/// Numeric ceilings applied by the validator
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ValidationLimits {
    /// Total component carriers (default: 6, the format ceiling)
    pub max_cc: u32,
    /// Downlink component carriers (default: 5)
    pub max_dl_cc: u32,
    /// Uplink carriers other than the PCell (default: 1)
    pub max_ul_scell: usize,
    /// Uplink carriers in total (default: 2)
    pub max_total_ul: usize,
    /// Accept combos mixing FDD and TDD bands (default: false)
    pub allow_fdd_tdd_mix: bool,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_cc: 6,
            max_dl_cc: 5,
            max_ul_scell: 1,
            max_total_ul: 2,
            allow_fdd_tdd_mix: false,
        }
    }
}

/// Device-specific limits and allow-lists
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceProfile {
    pub name: String,
    pub limits: ValidationLimits,
    /// Bands the device supports (`None` = any registered band)
    pub supported_bands: Option<BTreeSet<u16>>,
    /// MIMO layer counts the device supports (`None` = any)
    pub supported_mimo: Option<BTreeSet<u32>>,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            limits: ValidationLimits::default(),
            supported_bands: None,
            supported_mimo: None,
        }
    }
}

impl DeviceProfile {
    /// Profile with custom limits and no allow-lists
    pub fn with_limits(name: impl Into<String>, limits: ValidationLimits) -> Self {
        Self {
            name: name.into(),
            limits,
            ..Default::default()
        }
    }

    /// Names accepted by [`DeviceProfile::builtin`]
    pub const BUILTIN: [&'static str; 3] = ["default", "cat6", "cat16"];

    /// Built-in profile by name
    ///
    /// - `default`: format ceilings, any band, any MIMO
    /// - `cat6`: 3 DL CC, 1 UL carrier, 2/4 layers
    /// - `cat16`: 5 DL CC, 2 UL carriers, 2/4 layers, FDD+TDD allowed
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::default()),
            "cat6" => Some(Self {
                name: "cat6".to_string(),
                limits: ValidationLimits {
                    max_cc: 4,
                    max_dl_cc: 3,
                    max_ul_scell: 0,
                    max_total_ul: 1,
                    allow_fdd_tdd_mix: false,
                },
                supported_bands: None,
                supported_mimo: Some([2, 4].into_iter().collect()),
            }),
            "cat16" => Some(Self {
                name: "cat16".to_string(),
                limits: ValidationLimits {
                    allow_fdd_tdd_mix: true,
                    ..Default::default()
                },
                supported_bands: None,
                supported_mimo: Some([2, 4].into_iter().collect()),
            }),
            _ => None,
        }
    }

    /// Validate a combo against this profile
    pub fn validate(&self, combo: &Combo) -> ValidationReport {
        validate_combo(combo, self)
    }
}

/// Validate a combo
///
/// Every rule is evaluated; only an empty combo returns early. The PCell
/// is `combo.effective_pcell()`: the declared one, else the first uplink
/// carrier.
pub fn validate_combo(combo: &Combo, profile: &DeviceProfile) -> ValidationReport {
    let limits = &profile.limits;
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if combo.is_empty() {
        errors.push(ValidationIssue::new(
            IssueCode::EmptyCombo,
            "combo has no carriers",
        ));
        return ValidationReport {
            valid: false,
            errors,
            warnings,
        };
    }

    let mix = band::analyze_mix(combo.bands());
    if mix.is_mixed && !limits.allow_fdd_tdd_mix {
        errors.push(ValidationIssue::new(
            IssueCode::FddTddMix,
            "combo mixes FDD and TDD bands",
        ));
    }

    for carrier in &combo.carriers {
        if carrier.has_ul() && band::duplex_mode_of(carrier.band) == DuplexMode::Sdl {
            errors.push(ValidationIssue::new(
                IssueCode::SdlWithUl,
                format!("band {} is downlink-only but carries uplink", carrier.band),
            ));
        }
    }

    let total_cc = combo.total_cc();
    if total_cc > limits.max_cc {
        errors.push(ValidationIssue::new(
            IssueCode::ExceedMaxCc,
            format!("{} component carriers exceed maximum {}", total_cc, limits.max_cc),
        ));
    }
    if total_cc > limits.max_dl_cc {
        errors.push(ValidationIssue::new(
            IssueCode::ExceedMaxDlCc,
            format!(
                "{} downlink component carriers exceed maximum {}",
                total_cc, limits.max_dl_cc
            ),
        ));
    }

    let pcell = combo.effective_pcell();
    let ul_scells = combo
        .carriers
        .iter()
        .enumerate()
        .filter(|(idx, c)| c.has_ul() && Some(*idx) != pcell)
        .count();
    if ul_scells > limits.max_ul_scell {
        errors.push(ValidationIssue::new(
            IssueCode::ExceedMaxUlScell,
            format!(
                "{} uplink SCells exceed maximum {}",
                ul_scells, limits.max_ul_scell
            ),
        ));
    }

    let total_ul = combo.ul_count();
    if total_ul > limits.max_total_ul {
        errors.push(ValidationIssue::new(
            IssueCode::ExceedMaxTotalUl,
            format!(
                "{} uplink carriers exceed maximum {}",
                total_ul, limits.max_total_ul
            ),
        ));
    }

    for carrier in &combo.carriers {
        if band::lookup(carrier.band).is_none() {
            warnings.push(ValidationIssue::new(
                IssueCode::InvalidBand,
                format!("band {} is not a known E-UTRA band", carrier.band),
            ));
        } else if let Some(bands) = &profile.supported_bands {
            if !bands.contains(&carrier.band) {
                warnings.push(ValidationIssue::new(
                    IssueCode::UnsupportedBand,
                    format!("band {} not supported by {}", carrier.band, profile.name),
                ));
            }
        }

        if let Some(mimo) = &profile.supported_mimo {
            if !mimo.contains(&carrier.mimo_dl) {
                warnings.push(ValidationIssue::new(
                    IssueCode::UnsupportedMimo,
                    format!(
                        "{} layers on band {} not supported by {}",
                        carrier.mimo_dl, carrier.band, profile.name
                    ),
                ));
            }
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(text: &str) -> ValidationReport {
        validate_combo(&text.parse().unwrap(), &DeviceProfile::default())
    }

    fn permissive() -> DeviceProfile {
        DeviceProfile::with_limits(
            "permissive",
            ValidationLimits {
                max_dl_cc: 6,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_valid_combo() {
        let report = check("3A4A-7B4-20A2");
        assert!(report.valid);
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_empty_combo() {
        let report = validate_combo(&Combo::default(), &DeviceProfile::default());
        assert!(!report.valid);
        assert_eq!(report.error_codes(), vec![IssueCode::EmptyCombo]);
    }

    #[test]
    fn test_fdd_tdd_mix() {
        let report = check("3A2-38A2");
        assert_eq!(report.error_codes(), vec![IssueCode::FddTddMix]);

        let profile = DeviceProfile::builtin("cat16").unwrap();
        assert!(profile.validate(&"3A2-38A2".parse().unwrap()).valid);
    }

    #[test]
    fn test_sdl_with_ul() {
        let report = check("2A2A-29A2A");
        assert!(report.has(IssueCode::SdlWithUl));
        assert!(check("2A2A-29A2").valid);
    }

    #[test]
    fn test_cc_ceilings() {
        let six = "1A2-3A2-5A2-7A2-20A2-28A2";
        let report = validate_combo(&six.parse().unwrap(), &permissive());
        assert!(report.valid);

        let seven = "1A2-3A2-5A2-7A2-20A2-28A2-8A2";
        let report = validate_combo(&seven.parse().unwrap(), &permissive());
        assert!(report.has(IssueCode::ExceedMaxCc));

        // default DL ceiling is 5
        let report = check(six);
        assert_eq!(report.error_codes(), vec![IssueCode::ExceedMaxDlCc]);
    }

    #[test]
    fn test_uplink_limits() {
        // first UL carrier is the PCell: one UL SCell is fine
        assert!(check("3A2A-7A2A").valid);

        let report = check("1A2A-3A2A-7A2A");
        assert!(report.has(IssueCode::ExceedMaxUlScell));
        assert!(report.has(IssueCode::ExceedMaxTotalUl));
    }

    #[test]
    fn test_pcell_without_ul_counts_every_ul_as_scell() {
        let report = check("3A2A-7A2A-20A2^");
        assert_eq!(report.error_codes(), vec![IssueCode::ExceedMaxUlScell]);
    }

    #[test]
    fn test_pcell_survives_sort() {
        let mut combo: Combo = "20A2-7A2A-3A2A^".parse().unwrap();
        let before = validate_combo(&combo, &DeviceProfile::default());
        combo.sort_carriers();
        let after = validate_combo(&combo, &DeviceProfile::default());
        assert_eq!(before, after);
    }

    #[test]
    fn test_band_warnings_do_not_invalidate() {
        let report = check("3A2-250A2");
        assert!(report.valid);
        assert!(report.has(IssueCode::InvalidBand));

        let profile = DeviceProfile {
            supported_bands: Some([3].into_iter().collect()),
            ..DeviceProfile::builtin("cat6").unwrap()
        };
        let report = profile.validate(&"3A8-7A2".parse().unwrap());
        assert!(report.valid);
        assert!(report.has(IssueCode::UnsupportedBand));
        assert!(report.has(IssueCode::UnsupportedMimo));
    }

    #[test]
    fn test_idempotent() {
        let combo: Combo = "1A2A-3A2A-38A2A".parse().unwrap();
        let profile = DeviceProfile::default();
        assert_eq!(
            validate_combo(&combo, &profile),
            validate_combo(&combo, &profile)
        );
    }

    #[test]
    fn test_builtin_profiles() {
        for name in DeviceProfile::BUILTIN {
            assert_eq!(DeviceProfile::builtin(name).unwrap().name, name);
        }
        assert!(DeviceProfile::builtin("cat99").is_none());
    }
}
