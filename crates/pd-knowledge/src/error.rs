//! Knowledge-base error types.

use thiserror::Error;

/// Errors raised while loading or validating a knowledge base.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("failed to read knowledge base {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("knowledge base is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid knowledge base: {0}")]
    Invalid(String),
}

/// Convenience alias for knowledge-base results.
pub type KnowledgeResult<T> = Result<T, KnowledgeError>;

/// Matcher outcome that routes the diagnosis to the open-ended fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("no knowledge-base diseases recorded for genus '{genus}'")]
    NoKnowledgeForGenus { genus: String },
}
