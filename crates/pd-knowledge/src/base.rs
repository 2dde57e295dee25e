//! Read-only knowledge-base snapshot.
//!
//! Loaded once at startup and validated before use: duplicate ids, diseases
//! without host genera and diseases without a major feature are rejected,
//! since each would silently skew genus pruning or scoring.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use pd_protocol::knowledge::CandidateDisease;
use pd_protocol::stages::normalize_value;

use crate::error::{KnowledgeError, KnowledgeResult};
use crate::ontology::FeatureOntology;

const BUNDLED: &str = include_str!("../data/knowledge_base.json");

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    /// Declaration order is the final ranking tie-break.
    pub diseases: Vec<CandidateDisease>,
    #[serde(default)]
    pub ontology: FeatureOntology,
}

impl KnowledgeBase {
    pub fn new(diseases: Vec<CandidateDisease>, ontology: FeatureOntology) -> KnowledgeResult<Self> {
        let kb = Self { diseases, ontology };
        kb.validate()?;
        Ok(kb)
    }

    pub fn from_json_str(json: &str) -> KnowledgeResult<Self> {
        let kb: Self = serde_json::from_str(json)?;
        kb.validate()?;
        Ok(kb)
    }

    pub fn from_file(path: impl AsRef<Path>) -> KnowledgeResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| KnowledgeError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let kb = Self::from_json_str(&json)?;
        tracing::info!(
            path = %path.display(),
            diseases = kb.diseases.len(),
            genera = kb.known_genera().len(),
            "knowledge base loaded"
        );
        Ok(kb)
    }

    /// Sample knowledge base compiled into the binary.
    pub fn bundled() -> KnowledgeResult<Self> {
        Self::from_json_str(BUNDLED)
    }

    pub fn validate(&self) -> KnowledgeResult<()> {
        let mut seen = HashSet::new();
        for disease in &self.diseases {
            if disease.disease_id.trim().is_empty() {
                return Err(KnowledgeError::Invalid("disease with empty id".into()));
            }
            if !seen.insert(disease.disease_id.as_str()) {
                return Err(KnowledgeError::Invalid(format!(
                    "duplicate disease id '{}'",
                    disease.disease_id
                )));
            }
            if disease.host_genera.iter().all(|g| g.trim().is_empty()) {
                return Err(KnowledgeError::Invalid(format!(
                    "disease '{}' has no host genera",
                    disease.disease_id
                )));
            }
            let importance = &disease.feature_importance;
            if importance.major.is_empty() {
                return Err(KnowledgeError::Invalid(format!(
                    "disease '{}' declares no major features",
                    disease.disease_id
                )));
            }
            let features = importance
                .major
                .iter()
                .chain(&importance.minor)
                .chain(&importance.optional);
            for feature in features {
                let allowed = feature.dimension.allowed_values();
                let value = normalize_value(&feature.value);
                if !allowed.iter().any(|a| *a == value) {
                    return Err(KnowledgeError::Invalid(format!(
                        "disease '{}': '{}' is not a known {} value",
                        disease.disease_id, feature.value, feature.dimension
                    )));
                }
            }
        }
        Ok(())
    }

    /// Every host genus, sorted and deduplicated case-insensitively. The
    /// first spelling seen wins.
    pub fn known_genera(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut genera: Vec<String> = self
            .diseases
            .iter()
            .flat_map(|d| d.host_genera.iter())
            .map(|g| g.trim())
            .filter(|g| !g.is_empty() && seen.insert(g.to_lowercase()))
            .map(str::to_string)
            .collect();
        genera.sort_by_key(|g| g.to_lowercase());
        genera
    }

    /// Diseases recorded on `genus`, in declaration order.
    pub fn candidates_for_genus<'a, 'g>(
        &'a self,
        genus: &'g str,
    ) -> impl Iterator<Item = &'a CandidateDisease> + use<'a, 'g> {
        self.diseases.iter().filter(move |d| d.hosts_genus(genus))
    }

    pub fn get(&self, disease_id: &str) -> Option<&CandidateDisease> {
        self.diseases.iter().find(|d| d.disease_id == disease_id)
    }

    pub fn len(&self) -> usize {
        self.diseases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diseases.is_empty()
    }
}
