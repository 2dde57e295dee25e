//! Pipeline error types.
//!
//! Rejections, healthy results and knowledge gaps are outcomes, not errors;
//! only total provider failure, deadline expiry, cancellation and bad input
//! surface here.

use thiserror::Error;

use pd_inference::InferenceError;
use pd_protocol::inference::SchemaId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiagnosisError {
    /// A gate or the fallback call exhausted every provider.
    #[error("{schema} failed: {source}")]
    Inference {
        schema: SchemaId,
        #[source]
        source: InferenceError,
    },

    #[error("diagnosis exceeded its {timeout_ms}ms deadline")]
    DeadlineExceeded { timeout_ms: u64 },

    #[error("diagnosis cancelled by caller")]
    Cancelled,

    #[error("image payload is empty")]
    EmptyImage,

    #[error("invalid diagnosis configuration: {0}")]
    Config(String),
}

impl DiagnosisError {
    /// Wrap a client error raised while asking `schema`.
    pub fn from_inference(schema: SchemaId, error: InferenceError) -> Self {
        match error {
            InferenceError::Cancelled => Self::Cancelled,
            source => Self::Inference { schema, source },
        }
    }
}

/// Convenience alias for pipeline results.
pub type PipelineResult<T> = Result<T, DiagnosisError>;
