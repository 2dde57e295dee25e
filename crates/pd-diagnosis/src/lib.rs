//! Diagnosis orchestration over the resilient inference client.
//!
//! Provides:
//! - `gates`: the Q0 gate chain as an explicit state machine
//! - `features`: Q1–Q6 feature extraction with per-dimension failure isolation
//! - `tiering`: confirmed / suspected / fallback decision rule
//! - `fallback`: open-ended diagnosis outside the knowledge base
//! - `DiagnosisEngine`: the end-to-end pipeline with deadline and cancellation

pub mod config;
pub mod error;
pub mod fallback;
pub mod features;
pub mod gates;
pub mod pipeline;
pub mod prompts;
pub mod tiering;

pub use config::DiagnosisConfig;
pub use error::{DiagnosisError, PipelineResult};
pub use pipeline::{DiagnosisEngine, DiagnosisRequest};
pub use prompts::PromptCatalog;
pub use tiering::{TierDecision, TierThresholds};
