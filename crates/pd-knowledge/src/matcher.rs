//! Genus pruning and weighted candidate scoring.
//!
//! Each declared feature scores 1.0 on an exact match, the synonym weight on
//! an ontology match and 0 otherwise; an unobserved dimension is a miss.
//! A tier's score is the mean of its features. Tier scores are combined with
//! the tier weights, renormalized over the tiers the candidate actually
//! declares, then scaled by the completeness modifier.

use serde::{Deserialize, Serialize};

use pd_protocol::diagnosis::{DiagnosisScore, FeatureMatch, FeatureTier, MatchKind, RankedCandidate};
use pd_protocol::features::FeatureVector;
use pd_protocol::knowledge::{CandidateDisease, FeatureExpectation};
use pd_protocol::stages::normalize_value;

use crate::base::KnowledgeBase;
use crate::error::MatchError;
use crate::ontology::FeatureOntology;

/// Fixed scoring weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub major: f64,
    pub minor: f64,
    pub optional: f64,
    /// Score for a synonym (non-exact) match.
    pub synonym_match: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            major: 0.60,
            minor: 0.30,
            optional: 0.10,
            synonym_match: 0.85,
        }
    }
}

impl ScoringWeights {
    fn tier(&self, tier: FeatureTier) -> f64 {
        match tier {
            FeatureTier::Major => self.major,
            FeatureTier::Minor => self.minor,
            FeatureTier::Optional => self.optional,
        }
    }
}

/// One candidate with its score, borrowed from the knowledge base.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate<'a> {
    pub disease: &'a CandidateDisease,
    pub score: DiagnosisScore,
}

impl From<&ScoredCandidate<'_>> for RankedCandidate {
    fn from(scored: &ScoredCandidate<'_>) -> Self {
        Self {
            disease: scored.disease.into(),
            score: scored.score.clone(),
        }
    }
}

/// Score one candidate against the feature vector.
pub fn score_candidate(
    features: &FeatureVector,
    disease: &CandidateDisease,
    ontology: &FeatureOntology,
    weights: &ScoringWeights,
) -> DiagnosisScore {
    let importance = &disease.feature_importance;
    let tiers = [
        (FeatureTier::Major, &importance.major),
        (FeatureTier::Minor, &importance.minor),
        (FeatureTier::Optional, &importance.optional),
    ];

    let mut matches = Vec::new();
    let mut tier_scores = [0.0; 3];
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;

    for (i, (tier, expected)) in tiers.into_iter().enumerate() {
        if expected.is_empty() {
            continue;
        }
        let tier_matches: Vec<FeatureMatch> = expected
            .iter()
            .map(|e| match_feature(features, e, tier, ontology, weights))
            .collect();
        let mean = tier_matches.iter().map(|m| m.score).sum::<f64>() / tier_matches.len() as f64;
        tier_scores[i] = mean;
        weighted += weights.tier(tier) * mean;
        weight_sum += weights.tier(tier);
        matches.extend(tier_matches);
    }

    let completeness_modifier = features.completeness.modifier();
    let base = if weight_sum > 0.0 {
        weighted / weight_sum
    } else {
        0.0
    };

    let major_matched_count = matches
        .iter()
        .filter(|m| m.tier == FeatureTier::Major && m.kind != MatchKind::Miss)
        .count();

    DiagnosisScore {
        total_score: (base * completeness_modifier).clamp(0.0, 1.0),
        major_features_score: tier_scores[0],
        minor_features_score: tier_scores[1],
        optional_features_score: tier_scores[2],
        completeness_modifier,
        major_matched_count,
        major_total_count: importance.major.len(),
        matches,
    }
}

fn match_feature(
    features: &FeatureVector,
    expected: &FeatureExpectation,
    tier: FeatureTier,
    ontology: &FeatureOntology,
    weights: &ScoringWeights,
) -> FeatureMatch {
    let observed = features.dimension(expected.dimension);
    let (kind, score) = match observed {
        Some(value) if normalize_value(value) == normalize_value(&expected.value) => {
            (MatchKind::Exact, 1.0)
        }
        Some(value) if ontology.is_synonym(expected.dimension, value, &expected.value) => {
            (MatchKind::Synonym, weights.synonym_match)
        }
        _ => (MatchKind::Miss, 0.0),
    };
    FeatureMatch {
        tier,
        dimension: expected.dimension,
        expected: expected.value.clone(),
        observed: observed.map(str::to_string),
        kind,
        score,
    }
}

/// Prune the knowledge base to the vector's genus and rank the survivors.
///
/// Sorted by total score descending, then major matches descending; the
/// sort is stable, so remaining ties keep declaration order.
pub fn rank<'a>(
    features: &FeatureVector,
    kb: &'a KnowledgeBase,
    weights: &ScoringWeights,
) -> Result<Vec<ScoredCandidate<'a>>, MatchError> {
    let mut scored: Vec<ScoredCandidate<'a>> = kb
        .candidates_for_genus(&features.genus)
        .map(|disease| ScoredCandidate {
            disease,
            score: score_candidate(features, disease, &kb.ontology, weights),
        })
        .collect();

    if scored.is_empty() {
        return Err(MatchError::NoKnowledgeForGenus {
            genus: features.genus.clone(),
        });
    }

    scored.sort_by(|a, b| {
        b.score
            .total_score
            .total_cmp(&a.score.total_score)
            .then_with(|| b.score.major_matched_count.cmp(&a.score.major_matched_count))
    });

    tracing::debug!(
        genus = %features.genus,
        candidates = scored.len(),
        top = %scored[0].disease.disease_id,
        top_score = scored[0].score.total_score,
        "candidates ranked"
    );
    Ok(scored)
}
