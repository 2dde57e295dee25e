//! Provider and client error taxonomy.

use thiserror::Error;

/// Failure of a single provider adapter call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// Network or HTTP failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Adapter- or client-level deadline exceeded.
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Vendor output does not conform to the canonical schema.
    #[error("schema validation failed: {0}")]
    SchemaValidation(String),
}

impl ProviderError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Timeout { .. } => "timeout",
            Self::SchemaValidation(_) => "schema_validation",
        }
    }
}

/// Convenience alias for adapter results.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// One provider's recorded failure, in try order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: ProviderError,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

/// Failure of one resilient inference call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    /// Every configured provider was tried and failed.
    #[error("all providers failed ({} attempted): {}", .failures.len(), join_failures(.failures))]
    AllProvidersFailed { failures: Vec<ProviderFailure> },

    /// The caller's cancellation token fired while a call was in flight.
    #[error("inference cancelled")]
    Cancelled,
}

fn join_failures(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "no providers configured".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
