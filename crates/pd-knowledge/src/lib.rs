//! Disease knowledge for the diagnosis pipeline.
//!
//! Provides:
//! - `KnowledgeBase`: validated, read-only snapshot of candidate diseases
//! - `FeatureOntology`: per-dimension synonym groups for fuzzy matching
//! - `rank` / `score_candidate`: genus pruning and weighted scoring

pub mod base;
pub mod error;
pub mod matcher;
pub mod ontology;

pub use base::KnowledgeBase;
pub use error::{KnowledgeError, KnowledgeResult, MatchError};
pub use matcher::{ScoredCandidate, ScoringWeights, rank, score_candidate};
pub use ontology::FeatureOntology;
