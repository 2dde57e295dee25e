use serde::{Deserialize, Serialize};

// ── Gate stages (Q0) ──────────────────────────────────────────

/// One sequential classification gate in the Q0 chain.
///
/// Declaration order is execution order; `#[derive(Ord)]` relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStage {
    ContentType,
    PlantCategory,
    Genus,
    Organ,
    Completeness,
    Abnormality,
}

pub const CONTENT_TYPES: &[&str] = &["plant", "animal", "person", "object", "scenery", "other"];

pub const PLANT_CATEGORIES: &[&str] = &[
    "flower",
    "vegetable",
    "fruit_tree",
    "grain",
    "turfgrass",
    "houseplant",
    "other",
];

pub const ORGANS: &[&str] = &["leaf", "flower", "stem", "fruit", "root", "whole_plant"];

pub const COMPLETENESS_VALUES: &[&str] = &["complete", "partial", "close_up"];

pub const ABNORMALITY_VALUES: &[&str] = &["healthy", "abnormal"];

/// Content type that lets the chain continue past the first gate.
pub const ACCEPTED_CONTENT_TYPE: &str = "plant";

/// Plant category that lets the chain continue past the second gate.
pub const ACCEPTED_PLANT_CATEGORY: &str = "flower";

impl GateStage {
    /// All gates in execution order.
    pub const ALL: [GateStage; 6] = [
        Self::ContentType,
        Self::PlantCategory,
        Self::Genus,
        Self::Organ,
        Self::Completeness,
        Self::Abnormality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentType => "content_type",
            Self::PlantCategory => "plant_category",
            Self::Genus => "genus",
            Self::Organ => "organ",
            Self::Completeness => "completeness",
            Self::Abnormality => "abnormality",
        }
    }

    /// Gate that runs after this one, if any.
    pub fn next(&self) -> Option<GateStage> {
        match self {
            Self::ContentType => Some(Self::PlantCategory),
            Self::PlantCategory => Some(Self::Genus),
            Self::Genus => Some(Self::Organ),
            Self::Organ => Some(Self::Completeness),
            Self::Completeness => Some(Self::Abnormality),
            Self::Abnormality => None,
        }
    }

    /// Static allowed answers. `None` for the genus gate, whose choices come
    /// from the loaded knowledge base.
    pub fn allowed_values(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::ContentType => Some(CONTENT_TYPES),
            Self::PlantCategory => Some(PLANT_CATEGORIES),
            Self::Genus => None,
            Self::Organ => Some(ORGANS),
            Self::Completeness => Some(COMPLETENESS_VALUES),
            Self::Abnormality => Some(ABNORMALITY_VALUES),
        }
    }
}

impl std::fmt::Display for GateStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Completeness ──────────────────────────────────────────────

/// How much of the imaged organ is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completeness {
    Complete,
    Partial,
    CloseUp,
}

impl Completeness {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "complete" => Some(Self::Complete),
            "partial" => Some(Self::Partial),
            "close_up" => Some(Self::CloseUp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::CloseUp => "close_up",
        }
    }

    /// Score scaling factor, always within [0.5, 1.0].
    pub fn modifier(&self) -> f64 {
        match self {
            Self::Complete => 1.0,
            Self::Partial => 0.8,
            Self::CloseUp => 0.6,
        }
    }
}

// ── Abnormality ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbnormalityStatus {
    Healthy,
    Abnormal,
}

impl AbnormalityStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "healthy" => Some(Self::Healthy),
            "abnormal" => Some(Self::Abnormal),
            _ => None,
        }
    }
}

// ── Feature dimensions (Q1–Q6) ────────────────────────────────

/// One visual feature dimension asked after the gate chain reports "abnormal".
///
/// Declaration order is extraction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureDimension {
    SymptomType,
    ColorCenter,
    ColorBorder,
    Size,
    Location,
    Distribution,
}

pub const SYMPTOM_TYPES: &[&str] = &[
    "necrosis_spot",
    "powdery_coating",
    "chlorosis",
    "wilting",
    "deformation",
    "rust_pustule",
    "mold",
    "other",
];

pub const COLORS: &[&str] = &[
    "black",
    "dark_brown",
    "brown",
    "tan",
    "yellow",
    "orange",
    "red",
    "purple",
    "white",
    "gray",
    "green",
    "none",
];

pub const SIZES: &[&str] = &["tiny", "small", "medium", "large", "mixed"];

pub const LOCATIONS: &[&str] = &[
    "upper_surface",
    "lower_surface",
    "margin",
    "tip",
    "along_veins",
    "stem",
    "petal",
    "whole_organ",
];

pub const DISTRIBUTIONS: &[&str] = &[
    "scattered",
    "clustered",
    "concentric",
    "uniform",
    "spreading",
    "isolated",
];

/// Canonical spelling for comparing answers and table values: trimmed,
/// lowercase, spaces and hyphens folded to underscores.
pub fn normalize_value(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Value recorded for a dimension whose extraction call failed outright.
pub const UNKNOWN_VALUE: &str = "unknown";

impl FeatureDimension {
    /// All dimensions in extraction order, symptom type first.
    pub const ALL: [FeatureDimension; 6] = [
        Self::SymptomType,
        Self::ColorCenter,
        Self::ColorBorder,
        Self::Size,
        Self::Location,
        Self::Distribution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SymptomType => "symptom_type",
            Self::ColorCenter => "color_center",
            Self::ColorBorder => "color_border",
            Self::Size => "size",
            Self::Location => "location",
            Self::Distribution => "distribution",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == value)
    }

    /// Allowed answers for this dimension's schema.
    pub fn allowed_values(&self) -> &'static [&'static str] {
        match self {
            Self::SymptomType => SYMPTOM_TYPES,
            Self::ColorCenter | Self::ColorBorder => COLORS,
            Self::Size => SIZES,
            Self::Location => LOCATIONS,
            Self::Distribution => DISTRIBUTIONS,
        }
    }
}

impl std::fmt::Display for FeatureDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
