//! Feature ontology: synonym groups per feature dimension.
//!
//! Two values are synonyms when they share a group for the same dimension.
//! Values are normalized on load and on lookup, so table spelling and model
//! spelling only need to agree up to case and separators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use pd_protocol::stages::{FeatureDimension, normalize_value};

/// Synonym table as written in the knowledge-base document.
pub type SynonymGroups = BTreeMap<FeatureDimension, Vec<Vec<String>>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SynonymGroups", into = "SynonymGroups")]
pub struct FeatureOntology {
    groups: SynonymGroups,
}

impl FeatureOntology {
    pub fn new(groups: SynonymGroups) -> Self {
        let groups = groups
            .into_iter()
            .map(|(dimension, groups)| {
                let groups = groups
                    .into_iter()
                    .map(|group| {
                        let mut normalized: Vec<String> =
                            group.iter().map(|v| normalize_value(v)).collect();
                        normalized.sort();
                        normalized.dedup();
                        normalized
                    })
                    .filter(|group| group.len() > 1)
                    .collect();
                (dimension, groups)
            })
            .collect();
        Self { groups }
    }

    /// Whether `a` and `b` are distinct spellings in one synonym group.
    /// Equal values are an exact match, not a synonym.
    pub fn is_synonym(&self, dimension: FeatureDimension, a: &str, b: &str) -> bool {
        let a = normalize_value(a);
        let b = normalize_value(b);
        if a == b {
            return false;
        }
        self.groups.get(&dimension).is_some_and(|groups| {
            groups
                .iter()
                .any(|group| group.contains(&a) && group.contains(&b))
        })
    }

    /// Number of synonym groups across all dimensions.
    pub fn group_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

impl From<SynonymGroups> for FeatureOntology {
    fn from(groups: SynonymGroups) -> Self {
        Self::new(groups)
    }
}

impl From<FeatureOntology> for SynonymGroups {
    fn from(ontology: FeatureOntology) -> Self {
        ontology.groups
    }
}
