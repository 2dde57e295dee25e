//! Resilient inference for structured image questions.
//!
//! Provides:
//! - `ProviderAdapter` trait with Ollama, OpenAI-compatible and AWS Bedrock
//!   implementations, each translating the canonical request into its
//!   vendor's wire format and validating the reply against the schema
//! - `ResponseCache`, a TTL-bounded content-addressed result store
//! - `ResilientClient`, which consults the cache and tries providers in order
//! - `MockProvider` for testing without a model endpoint

pub mod bedrock;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod schema;

// Re-export key types for convenience
pub use cache::{CacheKey, CacheStats, ResponseCache};
pub use client::ResilientClient;
pub use config::{CacheConfig, InferenceConfig, ProviderConfig, ProviderKind};
pub use error::{InferenceError, ProviderError, ProviderFailure, ProviderResult};
pub use mock::{CallLog, MockProvider};
pub use provider::ProviderAdapter;
