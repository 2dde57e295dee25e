//! Confidence tiering over the top-ranked candidate.
//!
//! The major-match guards keep a single incidental feature from producing a
//! confident result: with no major feature matched, every score routes to
//! the open-ended fallback.

use serde::{Deserialize, Serialize};

use pd_protocol::diagnosis::DiagnosisScore;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    #[serde(default = "default_confirmed_score")]
    pub confirmed_score: f64,
    #[serde(default = "default_suspected_score")]
    pub suspected_score: f64,
    #[serde(default = "default_confirmed_min_major")]
    pub confirmed_min_major: usize,
    #[serde(default = "default_suspected_min_major")]
    pub suspected_min_major: usize,
    /// Ranked candidates returned with a suspected result.
    #[serde(default = "default_suspected_max_candidates")]
    pub suspected_max_candidates: usize,
}

fn default_confirmed_score() -> f64 {
    0.85
}
fn default_suspected_score() -> f64 {
    0.60
}
fn default_confirmed_min_major() -> usize {
    2
}
fn default_suspected_min_major() -> usize {
    1
}
fn default_suspected_max_candidates() -> usize {
    3
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            confirmed_score: default_confirmed_score(),
            suspected_score: default_suspected_score(),
            confirmed_min_major: default_confirmed_min_major(),
            suspected_min_major: default_suspected_min_major(),
            suspected_max_candidates: default_suspected_max_candidates(),
        }
    }
}

/// Decision for the top-ranked score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierDecision {
    Confirmed,
    Suspected,
    Fallback,
}

/// Classify the top candidate's score.
pub fn classify(score: &DiagnosisScore, thresholds: &TierThresholds) -> TierDecision {
    let total = score.total_score;
    let major = score.major_matched_count;
    if total >= thresholds.confirmed_score && major >= thresholds.confirmed_min_major {
        TierDecision::Confirmed
    } else if total >= thresholds.suspected_score && major >= thresholds.suspected_min_major {
        TierDecision::Suspected
    } else {
        TierDecision::Fallback
    }
}
