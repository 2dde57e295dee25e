//! Pipeline settings, deserialized from the `[diagnosis]` config section.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use pd_protocol::inference::CallOptions;

use crate::tiering::TierThresholds;

#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosisConfig {
    /// Global deadline for one diagnosis request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Issue the six feature calls concurrently instead of in order.
    #[serde(default)]
    pub parallel_features: bool,
    /// Feature answers below this confidence are marked uncertain.
    #[serde(default = "default_low_confidence_threshold")]
    pub low_confidence_threshold: f64,
    #[serde(default)]
    pub thresholds: TierThresholds,
    /// Prompt overrides keyed by schema id (e.g. `q1_symptom_type`).
    #[serde(default)]
    pub prompts: BTreeMap<String, String>,
    /// Sampling temperature sent with every call. Classification wants
    /// repeatable answers, so this defaults to 0.
    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: Option<u32>,
}

fn default_request_timeout_secs() -> u64 {
    120
}
fn default_low_confidence_threshold() -> f64 {
    0.5
}
fn default_temperature() -> Option<f32> {
    Some(0.0)
}
fn default_max_output_tokens() -> Option<u32> {
    Some(256)
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            parallel_features: false,
            low_confidence_threshold: default_low_confidence_threshold(),
            thresholds: TierThresholds::default(),
            prompts: BTreeMap::new(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl DiagnosisConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Options attached to every gate, feature and fallback request.
    pub fn call_options(&self) -> CallOptions {
        CallOptions {
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
        }
    }
}
