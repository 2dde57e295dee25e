//! Canonical "ask a structured question about an image" contract.
//!
//! Every provider adapter, whatever its vendor format, produces an
//! [`InferenceResult`] that conforms to the [`ResponseSchema`] named by the
//! request's [`SchemaId`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::stages::{FeatureDimension, GateStage};

// ── Schema identifiers ────────────────────────────────────────

/// Named contract for one kind of question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SchemaId {
    Gate(GateStage),
    Feature(FeatureDimension),
    OpenDiagnosis,
}

impl SchemaId {
    /// Every schema the system asks, in pipeline order.
    pub fn all() -> Vec<SchemaId> {
        GateStage::ALL
            .into_iter()
            .map(SchemaId::Gate)
            .chain(FeatureDimension::ALL.into_iter().map(SchemaId::Feature))
            .chain(std::iter::once(SchemaId::OpenDiagnosis))
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gate(GateStage::ContentType) => "q0_content_type",
            Self::Gate(GateStage::PlantCategory) => "q0_plant_category",
            Self::Gate(GateStage::Genus) => "q0_genus",
            Self::Gate(GateStage::Organ) => "q0_organ",
            Self::Gate(GateStage::Completeness) => "q0_completeness",
            Self::Gate(GateStage::Abnormality) => "q0_abnormality",
            Self::Feature(FeatureDimension::SymptomType) => "q1_symptom_type",
            Self::Feature(FeatureDimension::ColorCenter) => "q2_color_center",
            Self::Feature(FeatureDimension::ColorBorder) => "q3_color_border",
            Self::Feature(FeatureDimension::Size) => "q4_size",
            Self::Feature(FeatureDimension::Location) => "q5_location",
            Self::Feature(FeatureDimension::Distribution) => "q6_distribution",
            Self::OpenDiagnosis => "open_diagnosis",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::all().into_iter().find(|id| id.as_str() == value)
    }
}

impl std::fmt::Display for SchemaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<SchemaId> for String {
    fn from(id: SchemaId) -> Self {
        id.as_str().to_string()
    }
}

impl TryFrom<String> for SchemaId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SchemaId::parse(&value).ok_or_else(|| format!("unknown schema id: {value}"))
    }
}

// ── Response schema ───────────────────────────────────────────

/// The set of values a schema's `choice` field may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceSet {
    /// Choice must be one of these canonical values.
    Enumerated(Vec<String>),
    /// Any non-empty text; a listed value comes back in its canonical
    /// spelling, anything else is kept as answered.
    Suggested(Vec<String>),
    /// Any non-empty text (open-ended diagnosis).
    FreeText,
}

/// Canonical response contract: enumerated `choice`, `confidence` in [0,1],
/// optional free-text rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSchema {
    pub id: SchemaId,
    pub choices: ChoiceSet,
}

/// Choice appended to the genus schema so a model can decline to name a
/// genus at all.
pub const OTHER_GENUS: &str = "other";

impl ResponseSchema {
    /// Schema for a gate with a static value table. Returns `None` for the
    /// genus gate; use [`ResponseSchema::genus`] instead.
    pub fn for_gate(stage: GateStage) -> Option<Self> {
        let values = stage.allowed_values()?;
        Some(Self {
            id: SchemaId::Gate(stage),
            choices: ChoiceSet::Enumerated(values.iter().map(|v| v.to_string()).collect()),
        })
    }

    /// Genus schema suggesting the genera the knowledge base knows about.
    /// A genus outside the list is still a valid answer; pruning decides
    /// what it means.
    pub fn genus<I, S>(known_genera: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: Vec<String> = known_genera.into_iter().map(Into::into).collect();
        if !values.iter().any(|v| v == OTHER_GENUS) {
            values.push(OTHER_GENUS.to_string());
        }
        Self {
            id: SchemaId::Gate(GateStage::Genus),
            choices: ChoiceSet::Suggested(values),
        }
    }

    pub fn for_feature(dimension: FeatureDimension) -> Self {
        Self {
            id: SchemaId::Feature(dimension),
            choices: ChoiceSet::Enumerated(
                dimension
                    .allowed_values()
                    .iter()
                    .map(|v| v.to_string())
                    .collect(),
            ),
        }
    }

    pub fn open_diagnosis() -> Self {
        Self {
            id: SchemaId::OpenDiagnosis,
            choices: ChoiceSet::FreeText,
        }
    }

    /// Output-format instruction appended to prompts so every vendor is asked
    /// for the same JSON shape.
    pub fn format_instruction(&self) -> String {
        let choice = match &self.choices {
            ChoiceSet::Enumerated(values) => format!("one of [{}]", values.join(", ")),
            ChoiceSet::Suggested(values) => {
                format!("one of [{}] if it applies, otherwise the name", values.join(", "))
            }
            ChoiceSet::FreeText => "short free-text answer".to_string(),
        };
        format!(
            "Respond with ONLY a JSON object (no markdown): \
             {{\"choice\": <{choice}>, \"confidence\": <0.0-1.0>, \"rationale\": \"<short reasoning>\"}}"
        )
    }
}

// ── Request ───────────────────────────────────────────────────

/// Sampling settings passed through to adapters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CallOptions {
    /// Upper bound on generated tokens, when the vendor supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Sampling temperature, when the vendor supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// One structured question, constructed per gate/feature/fallback call.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub prompt: String,
    pub image: Option<Arc<[u8]>>,
    pub schema: ResponseSchema,
    pub options: CallOptions,
}

impl InferenceRequest {
    pub fn new(prompt: impl Into<String>, image: Option<Arc<[u8]>>, schema: ResponseSchema) -> Self {
        Self {
            prompt: prompt.into(),
            image,
            schema,
            options: CallOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn schema_id(&self) -> SchemaId {
        self.schema.id
    }

    /// Prompt text followed by the schema's output-format instruction.
    pub fn full_prompt(&self) -> String {
        format!("{}\n\n{}", self.prompt, self.schema.format_instruction())
    }
}

// ── Result ────────────────────────────────────────────────────

/// Lower-ranked answer a vendor reported alongside its main choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternateChoice {
    pub choice: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Schema-valid answer to one [`InferenceRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    /// Canonical choice (member of the schema's choice set).
    pub choice: String,
    /// Vendor-reported confidence in [0,1], never synthesised.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternates: Option<Vec<AlternateChoice>>,
    /// Provider that produced the answer.
    #[serde(default)]
    pub provider: String,
    /// Whether this copy was served from the response cache.
    #[serde(default)]
    pub from_cache: bool,
}
