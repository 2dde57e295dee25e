//! Gate answers and the feature vector built from them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::stages::{
    ACCEPTED_CONTENT_TYPE, ACCEPTED_PLANT_CATEGORY, AbnormalityStatus, Completeness,
    FeatureDimension, GateStage,
};

// ── Gate answers ──────────────────────────────────────────────

/// `(choice, confidence)` contributed by one executed gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateAnswer {
    pub stage: GateStage,
    pub choice: String,
    pub confidence: f64,
}

/// Answers accumulated while the gate chain runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateAnswers {
    answers: Vec<GateAnswer>,
}

impl GateAnswers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: GateStage, choice: impl Into<String>, confidence: f64) {
        self.answers.push(GateAnswer {
            stage,
            choice: choice.into(),
            confidence,
        });
    }

    pub fn get(&self, stage: GateStage) -> Option<&GateAnswer> {
        self.answers.iter().find(|a| a.stage == stage)
    }

    pub fn choice(&self, stage: GateStage) -> Option<&str> {
        self.get(stage).map(|a| a.choice.as_str())
    }

    pub fn answers(&self) -> &[GateAnswer] {
        &self.answers
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Unweighted mean of executed gate confidences. Observability only;
    /// progression is decided by the categorical choices.
    pub fn mean_confidence(&self) -> Option<f64> {
        if self.answers.is_empty() {
            return None;
        }
        let sum: f64 = self.answers.iter().map(|a| a.confidence).sum();
        Some(sum / self.answers.len() as f64)
    }
}

// ── Feature readings ──────────────────────────────────────────

/// Outcome of one Q1–Q6 extraction call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DimensionReading {
    Observed {
        value: String,
        confidence: f64,
        /// Confidence fell below the low-confidence threshold.
        uncertain: bool,
    },
    /// Every provider failed for this dimension.
    Unknown { reason: String },
}

// ── Feature vector ────────────────────────────────────────────

/// Gate answers plus extracted visual features for one diagnosis request.
///
/// The pipeline builds it with [`FeatureVector::from_gates`], which refuses
/// an incomplete gate run. [`FeatureVector::new`] is a shorthand for scoring
/// outside a gate run and fills the Q0 fields with accepted defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub content_type: String,
    pub plant_category: String,
    pub genus: String,
    pub organ: String,
    pub completeness: Completeness,
    pub abnormality: AbnormalityStatus,

    pub symptom_type: Option<String>,
    pub color_center: Option<String>,
    pub color_border: Option<String>,
    pub size: Option<String>,
    pub location: Option<String>,
    pub distribution: Option<String>,

    /// Dimensions answered below the low-confidence threshold.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub uncertain: BTreeSet<FeatureDimension>,
    /// Dimensions whose extraction call failed.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub unknown: BTreeSet<FeatureDimension>,

    pub gate_confidences: BTreeMap<GateStage, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_confidences: BTreeMap<FeatureDimension, f64>,
}

impl FeatureVector {
    /// Vector for an accepted flower leaf with no features extracted yet.
    /// Content type, category and organ are defaults, not observations.
    pub fn new(genus: impl Into<String>, completeness: Completeness) -> Self {
        Self {
            content_type: ACCEPTED_CONTENT_TYPE.to_string(),
            plant_category: ACCEPTED_PLANT_CATEGORY.to_string(),
            genus: genus.into(),
            organ: "leaf".to_string(),
            completeness,
            abnormality: AbnormalityStatus::Abnormal,
            symptom_type: None,
            color_center: None,
            color_border: None,
            size: None,
            location: None,
            distribution: None,
            uncertain: BTreeSet::new(),
            unknown: BTreeSet::new(),
            gate_confidences: BTreeMap::new(),
            feature_confidences: BTreeMap::new(),
        }
    }

    /// Build from a full gate run. Returns `None` unless all six gates were
    /// answered and completeness/abnormality parse to known values.
    pub fn from_gates(answers: &GateAnswers) -> Option<Self> {
        let choice = |stage| answers.choice(stage).map(str::to_string);
        let completeness = Completeness::parse(answers.choice(GateStage::Completeness)?)?;
        let abnormality = AbnormalityStatus::parse(answers.choice(GateStage::Abnormality)?)?;

        Some(Self {
            content_type: choice(GateStage::ContentType)?,
            plant_category: choice(GateStage::PlantCategory)?,
            genus: choice(GateStage::Genus)?,
            organ: choice(GateStage::Organ)?,
            completeness,
            abnormality,
            gate_confidences: answers
                .answers()
                .iter()
                .map(|a| (a.stage, a.confidence))
                .collect(),
            ..Self::new(String::new(), completeness)
        })
    }

    /// Set one observed dimension value.
    pub fn with_dimension(mut self, dimension: FeatureDimension, value: impl Into<String>) -> Self {
        *self.slot_mut(dimension) = Some(value.into());
        self.unknown.remove(&dimension);
        self
    }

    /// Fold one extraction reading into the vector.
    pub fn with_reading(mut self, dimension: FeatureDimension, reading: &DimensionReading) -> Self {
        match reading {
            DimensionReading::Observed {
                value,
                confidence,
                uncertain,
            } => {
                self.feature_confidences.insert(dimension, *confidence);
                if *uncertain {
                    self.uncertain.insert(dimension);
                }
                self.with_dimension(dimension, value.clone())
            }
            DimensionReading::Unknown { .. } => {
                *self.slot_mut(dimension) = None;
                self.unknown.insert(dimension);
                self
            }
        }
    }

    pub fn dimension(&self, dimension: FeatureDimension) -> Option<&str> {
        match dimension {
            FeatureDimension::SymptomType => self.symptom_type.as_deref(),
            FeatureDimension::ColorCenter => self.color_center.as_deref(),
            FeatureDimension::ColorBorder => self.color_border.as_deref(),
            FeatureDimension::Size => self.size.as_deref(),
            FeatureDimension::Location => self.location.as_deref(),
            FeatureDimension::Distribution => self.distribution.as_deref(),
        }
    }

    /// Number of dimensions with an observed value.
    pub fn observed_count(&self) -> usize {
        FeatureDimension::ALL
            .iter()
            .filter(|d| self.dimension(**d).is_some())
            .count()
    }

    fn slot_mut(&mut self, dimension: FeatureDimension) -> &mut Option<String> {
        match dimension {
            FeatureDimension::SymptomType => &mut self.symptom_type,
            FeatureDimension::ColorCenter => &mut self.color_center,
            FeatureDimension::ColorBorder => &mut self.color_border,
            FeatureDimension::Size => &mut self.size,
            FeatureDimension::Location => &mut self.location,
            FeatureDimension::Distribution => &mut self.distribution,
        }
    }
}
