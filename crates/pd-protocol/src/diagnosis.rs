use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::FeatureVector;
use crate::inference::{InferenceResult, SchemaId};
use crate::knowledge::{CandidateDisease, PathogenInfo};
use crate::stages::{FeatureDimension, GateStage};

// ── Scores ────────────────────────────────────────────────────

/// Importance tier a feature was declared under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureTier {
    Major,
    Minor,
    Optional,
}

/// How an expected feature compared with the observed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Synonym,
    Miss,
}

/// Per-feature explanation attached to a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatch {
    pub tier: FeatureTier,
    pub dimension: FeatureDimension,
    pub expected: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<String>,
    pub kind: MatchKind,
    pub score: f64,
}

/// Weighted match of one feature vector against one candidate disease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisScore {
    pub total_score: f64,
    pub major_features_score: f64,
    pub minor_features_score: f64,
    pub optional_features_score: f64,
    /// Within [0.5, 1.0].
    pub completeness_modifier: f64,
    /// Never exceeds `major_total_count`.
    pub major_matched_count: usize,
    pub major_total_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<FeatureMatch>,
}

/// Candidate identity carried in results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseSummary {
    pub disease_id: String,
    pub display_name: String,
    #[serde(default)]
    pub pathogen: PathogenInfo,
}

impl From<&CandidateDisease> for DiseaseSummary {
    fn from(disease: &CandidateDisease) -> Self {
        Self {
            disease_id: disease.disease_id.clone(),
            display_name: disease.display_name.clone(),
            pathogen: disease.pathogen.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub disease: DiseaseSummary,
    pub score: DiagnosisScore,
}

// ── Outcomes ──────────────────────────────────────────────────

/// Terminal decision of one diagnosis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosisTier {
    /// A gate rejected the image before scoring.
    Rejected,
    /// Abnormality gate answered "healthy".
    Healthy,
    Confirmed,
    Suspected,
    /// Open-ended answer from outside the knowledge base.
    Fallback,
}

/// Early-exit rejection raised by the gate chain. Not a provider fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsupportedImage {
    pub stage: GateStage,
    pub answer: String,
    pub confidence: f64,
    /// Offending gate's reasoning text, when the provider gave one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackCause {
    /// Genus pruning left no candidates.
    NoKnowledgeForGenus,
    /// Top candidate missed every tier threshold.
    InsufficientScore,
}

/// Open-ended diagnosis, explicitly outside the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackReport {
    pub cause: FallbackCause,
    /// Short free-text suspected cause.
    pub suspected_cause: String,
    pub narrative: String,
    pub confidence: f64,
    pub outside_knowledge_base: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// One executed provider-backed step, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub schema: SchemaId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub from_cache: bool,
    #[serde(default)]
    pub uncertain: bool,
    /// Failure text for feature dimensions recorded as unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageRecord {
    /// Record a successful call.
    pub fn answered(schema: SchemaId, result: &InferenceResult, uncertain: bool) -> Self {
        Self {
            schema,
            choice: Some(result.choice.clone()),
            confidence: Some(result.confidence),
            provider: Some(result.provider.clone()),
            from_cache: result.from_cache,
            uncertain,
            error: None,
        }
    }

    /// Record a call that failed on every provider.
    pub fn failed(schema: SchemaId, error: impl Into<String>) -> Self {
        Self {
            schema,
            choice: None,
            confidence: None,
            provider: None,
            from_cache: false,
            uncertain: false,
            error: Some(error.into()),
        }
    }
}

/// Terminal output of one diagnosis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    /// UUIDv7 for time-sortability.
    pub diagnosis_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub tier: DiagnosisTier,
    /// Human-readable outcome line.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chosen_disease: Option<DiseaseSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<DiagnosisScore>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<RankedCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<UnsupportedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureVector>,
    #[serde(default)]
    pub stages: Vec<StageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_gate_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genus_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genus_hint_confirmed: Option<bool>,
    pub execution_time_ms: u64,
}

impl DiagnosisResult {
    pub fn new(tier: DiagnosisTier, message: impl Into<String>) -> Self {
        Self {
            diagnosis_id: Uuid::now_v7(),
            timestamp: Utc::now(),
            tier,
            message: message.into(),
            chosen_disease: None,
            score: None,
            candidates: Vec::new(),
            fallback: None,
            rejection: None,
            features: None,
            stages: Vec::new(),
            mean_gate_confidence: None,
            genus_hint: None,
            genus_hint_confirmed: None,
            execution_time_ms: 0,
        }
    }
}
