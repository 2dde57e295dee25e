use serde::{Deserialize, Serialize};

use crate::stages::FeatureDimension;

/// One diagnostic feature a disease is expected to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureExpectation {
    pub dimension: FeatureDimension,
    pub value: String,
}

impl FeatureExpectation {
    pub fn new(dimension: FeatureDimension, value: impl Into<String>) -> Self {
        Self {
            dimension,
            value: value.into(),
        }
    }
}

/// Importance tiers, each weighted differently by the scorer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureImportance {
    #[serde(default)]
    pub major: Vec<FeatureExpectation>,
    #[serde(default)]
    pub minor: Vec<FeatureExpectation>,
    #[serde(default)]
    pub optional: Vec<FeatureExpectation>,
}

/// Causal organism details, passed through to results untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathogenInfo {
    /// e.g. "fungus", "bacterium", "oomycete", "virus".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scientific_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Read-only knowledge-base record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDisease {
    pub disease_id: String,
    pub display_name: String,
    /// Host genera this disease is recorded on (genus pruning key).
    pub host_genera: Vec<String>,
    pub feature_importance: FeatureImportance,
    #[serde(default)]
    pub pathogen: PathogenInfo,
}

impl CandidateDisease {
    /// Case-insensitive host check.
    pub fn hosts_genus(&self, genus: &str) -> bool {
        self.host_genera.iter().any(|g| g.eq_ignore_ascii_case(genus))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_candidate_with_defaults() {
        let json = r#"{
            "disease_id": "rose_black_spot",
            "display_name": "Rose black spot",
            "host_genera": ["Rosa"],
            "feature_importance": {
                "major": [
                    {"dimension": "symptom_type", "value": "necrosis_spot"},
                    {"dimension": "color_center", "value": "black"}
                ]
            }
        }"#;
        let disease: CandidateDisease = serde_json::from_str(json).unwrap();
        assert_eq!(disease.feature_importance.major.len(), 2);
        assert!(disease.feature_importance.minor.is_empty());
        assert!(disease.pathogen.kind.is_none());
        assert_eq!(
            disease.feature_importance.major[1].dimension,
            FeatureDimension::ColorCenter
        );
    }

    #[test]
    fn host_check_ignores_case() {
        let disease = CandidateDisease {
            disease_id: "d".into(),
            display_name: "D".into(),
            host_genera: vec!["Rosa".into()],
            feature_importance: FeatureImportance::default(),
            pathogen: PathogenInfo::default(),
        };
        assert!(disease.hosts_genus("rosa"));
        assert!(disease.hosts_genus("ROSA"));
        assert!(!disease.hosts_genus("Malus"));
    }
}
