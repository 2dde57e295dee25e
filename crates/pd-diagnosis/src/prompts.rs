//! Prompt text per schema, with config overrides.
//!
//! Only the question is stored here; the output-format instruction comes
//! from the response schema itself.

use std::collections::{BTreeMap, HashMap};

use pd_protocol::inference::SchemaId;
use pd_protocol::stages::{FeatureDimension, GateStage};

use crate::error::{DiagnosisError, PipelineResult};

fn default_prompt(schema: SchemaId) -> &'static str {
    match schema {
        SchemaId::Gate(GateStage::ContentType) => {
            "Classify the main subject of this image."
        }
        SchemaId::Gate(GateStage::PlantCategory) => {
            "This image shows a plant. Which category of plant is it?"
        }
        SchemaId::Gate(GateStage::Genus) => {
            "Identify the genus of this flowering plant. If it is none of the listed genera, name the genus you see, or answer \"other\" if you cannot tell."
        }
        SchemaId::Gate(GateStage::Organ) => "Which plant organ is the focus of this image?",
        SchemaId::Gate(GateStage::Completeness) => {
            "How much of the organ is visible: the complete organ, part of it, or a close-up?"
        }
        SchemaId::Gate(GateStage::Abnormality) => {
            "Does the visible tissue look healthy, or does it show abnormal symptoms?"
        }
        SchemaId::Feature(FeatureDimension::SymptomType) => {
            "What is the dominant type of symptom on the affected tissue?"
        }
        SchemaId::Feature(FeatureDimension::ColorCenter) => {
            "What colour is the centre of the lesions or affected area?"
        }
        SchemaId::Feature(FeatureDimension::ColorBorder) => {
            "What colour is the border or halo around the lesions? Answer \"none\" if there is no distinct border."
        }
        SchemaId::Feature(FeatureDimension::Size) => "How large are the individual lesions?",
        SchemaId::Feature(FeatureDimension::Location) => {
            "Where on the organ are the symptoms located?"
        }
        SchemaId::Feature(FeatureDimension::Distribution) => {
            "How are the symptoms distributed across the organ?"
        }
        SchemaId::OpenDiagnosis => {
            "Give your best open-ended diagnosis of the disease or disorder affecting this plant. \
             Put the suspected cause in \"choice\" and your reasoning in \"rationale\"."
        }
    }
}

/// Prompt lookup with defaults for every schema.
#[derive(Debug, Clone, Default)]
pub struct PromptCatalog {
    overrides: HashMap<SchemaId, String>,
}

impl PromptCatalog {
    /// Catalogue with overrides keyed by schema id string. Unknown ids and
    /// empty prompts are configuration errors.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> PipelineResult<Self> {
        let mut parsed = HashMap::with_capacity(overrides.len());
        for (id, prompt) in overrides {
            let schema = SchemaId::parse(id)
                .ok_or_else(|| DiagnosisError::Config(format!("unknown prompt schema id '{id}'")))?;
            if prompt.trim().is_empty() {
                return Err(DiagnosisError::Config(format!("prompt for '{id}' is empty")));
            }
            parsed.insert(schema, prompt.trim().to_string());
        }
        Ok(Self { overrides: parsed })
    }

    pub fn prompt(&self, schema: SchemaId) -> &str {
        self.overrides
            .get(&schema)
            .map(String::as_str)
            .unwrap_or_else(|| default_prompt(schema))
    }
}
