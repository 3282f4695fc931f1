// THEORY:
// The set of defect kinds is closed and small, so it is an enum rather than a bag of
// string labels. Everything that varies per kind (display name, operator label,
// weighting profile, default threshold, which pre-filter region localises it) is a
// method on the enum, so adding a kind is a compile-time exhaustive change.
//
// Enumeration order matters: the decision engine walks `DefectCategory::ALL` in order,
// and callers treat the first detected defect as the primary classification.

use crate::core_modules::region::BoundingBox;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Known defect kinds, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DefectCategory {
    #[serde(rename = "dark_spot", alias = "黒点")]
    DarkSpot,
    #[serde(rename = "scratch", alias = "キズ")]
    Scratch,
    /// Flash / molding defect. Shows up as surface texture rather than a localised
    /// color or shape anomaly.
    #[serde(rename = "flash", alias = "フラッシュ")]
    Flash,
}

/// Which metric bundle and weights a category is scored with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightingProfile {
    /// histogram, structural, edge, patch, color.
    Standard,
    /// texture, roughness, gloss, local variance, high frequency, edge irregularity.
    Surface,
}

/// Which pre-filter point cloud localises a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionClass {
    Dark,
    Irregular,
}

impl DefectCategory {
    pub const ALL: [DefectCategory; 3] = [
        DefectCategory::DarkSpot,
        DefectCategory::Scratch,
        DefectCategory::Flash,
    ];

    /// Stable snake_case key used in configuration files.
    pub fn key(self) -> &'static str {
        match self {
            DefectCategory::DarkSpot => "dark_spot",
            DefectCategory::Scratch => "scratch",
            DefectCategory::Flash => "flash",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            DefectCategory::DarkSpot => "Dark spot",
            DefectCategory::Scratch => "Scratch",
            DefectCategory::Flash => "Flash",
        }
    }

    /// Label operators registered samples under on the inspection floor.
    pub fn operator_label(self) -> &'static str {
        match self {
            DefectCategory::DarkSpot => "黒点",
            DefectCategory::Scratch => "キズ",
            DefectCategory::Flash => "フラッシュ",
        }
    }

    /// Parses a configuration key or operator label.
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.key() == label || c.operator_label() == label)
    }

    pub fn weighting_profile(self) -> WeightingProfile {
        match self {
            DefectCategory::DarkSpot | DefectCategory::Scratch => WeightingProfile::Standard,
            DefectCategory::Flash => WeightingProfile::Surface,
        }
    }

    /// Default similarity threshold. Lower is more sensitive.
    pub fn default_threshold(self) -> f64 {
        match self {
            DefectCategory::DarkSpot => 0.50,
            DefectCategory::Scratch => 0.55,
            DefectCategory::Flash => 0.65,
        }
    }

    pub fn region_class(self) -> RegionClass {
        match self {
            DefectCategory::DarkSpot | DefectCategory::Scratch => RegionClass::Dark,
            DefectCategory::Flash => RegionClass::Irregular,
        }
    }
}

impl fmt::Display for DefectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One detected defect in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectDetail {
    #[serde(rename = "type")]
    pub category: DefectCategory,
    /// Fused similarity to the best-matching reference, in [0, 1].
    pub confidence: f64,
    #[serde(rename = "location", skip_serializing_if = "Option::is_none", default)]
    pub bounding_box: Option<BoundingBox>,
}

/// Overall verdict for an inspected product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InspectionResult {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "NG")]
    Ng,
}

impl InspectionResult {
    pub fn from_defects(defects: &[DefectDetail]) -> Self {
        if defects.is_empty() {
            InspectionResult::Ok
        } else {
            InspectionResult::Ng
        }
    }
}

impl fmt::Display for InspectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InspectionResult::Ok => "OK",
            InspectionResult::Ng => "NG",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_keys_and_operator_labels() {
        assert_eq!(DefectCategory::parse("flash"), Some(DefectCategory::Flash));
        assert_eq!(DefectCategory::parse("黒点"), Some(DefectCategory::DarkSpot));
        assert_eq!(DefectCategory::parse("dent"), None);
    }

    #[test]
    fn serde_uses_keys_and_accepts_labels() {
        let json = serde_json::to_string(&DefectCategory::DarkSpot).unwrap();
        assert_eq!(json, "\"dark_spot\"");
        let parsed: DefectCategory = serde_json::from_str("\"キズ\"").unwrap();
        assert_eq!(parsed, DefectCategory::Scratch);
    }

    #[test]
    fn only_flash_uses_the_surface_profile() {
        for category in DefectCategory::ALL {
            let expected = if category == DefectCategory::Flash {
                WeightingProfile::Surface
            } else {
                WeightingProfile::Standard
            };
            assert_eq!(category.weighting_profile(), expected);
        }
    }

    #[test]
    fn defaults_sit_inside_the_operator_range() {
        for category in DefectCategory::ALL {
            let t = category.default_threshold();
            assert!((0.30..=0.90).contains(&t), "{category}: {t}");
        }
    }

    #[test]
    fn empty_defect_list_passes() {
        assert_eq!(InspectionResult::from_defects(&[]), InspectionResult::Ok);
        let ng = [DefectDetail {
            category: DefectCategory::Scratch,
            confidence: 0.7,
            bounding_box: None,
        }];
        assert_eq!(InspectionResult::from_defects(&ng), InspectionResult::Ng);
        assert_eq!(InspectionResult::Ng.to_string(), "NG");
        assert_eq!(
            serde_json::to_value(&ng[0]).unwrap(),
            serde_json::json!({ "type": "scratch", "confidence": 0.7 })
        );
    }
}
