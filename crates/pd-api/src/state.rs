//! Shared application state for the Axum server.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use pd_diagnosis::DiagnosisEngine;
use pd_inference::ProviderConfig;
use pd_protocol::diagnosis::DiagnosisResult;

/// Provider entry as exposed over HTTP. Credentials are never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl From<&ProviderConfig> for ProviderSummary {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            name: config.display_name().to_string(),
            kind: Some(config.kind.as_str().to_string()),
            model: Some(config.model().to_string()),
            timeout_ms: Some(config.timeout_ms),
        }
    }
}

/// Shared application state, wrapped in `Arc` for Axum handler sharing.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DiagnosisEngine>,
    pub providers: Arc<Vec<ProviderSummary>>,
    /// Most recent diagnoses, newest first. Memory only.
    pub history: Arc<RwLock<VecDeque<DiagnosisResult>>>,
    pub history_capacity: usize,
    pub max_body_bytes: usize,
}

impl AppState {
    /// Provider list derived from the client's adapter names only.
    pub fn new(engine: DiagnosisEngine) -> Self {
        let providers = engine
            .client()
            .provider_names()
            .into_iter()
            .map(|name| ProviderSummary {
                name,
                kind: None,
                model: None,
                timeout_ms: None,
            })
            .collect();
        Self {
            engine: Arc::new(engine),
            providers: Arc::new(providers),
            history: Arc::new(RwLock::new(VecDeque::new())),
            history_capacity: 50,
            max_body_bytes: 20 * 1024 * 1024,
        }
    }

    /// Replace the provider list with the configured details.
    pub fn with_provider_configs(mut self, configs: &[ProviderConfig]) -> Self {
        self.providers = Arc::new(configs.iter().map(ProviderSummary::from).collect());
        self
    }

    pub fn with_limits(mut self, history_capacity: usize, max_body_bytes: usize) -> Self {
        self.history_capacity = history_capacity;
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub async fn remember(&self, result: DiagnosisResult) {
        let mut history = self.history.write().await;
        history.push_front(result);
        history.truncate(self.history_capacity);
    }

    pub async fn find(&self, id: Uuid) -> Option<DiagnosisResult> {
        let history = self.history.read().await;
        history.iter().find(|r| r.diagnosis_id == id).cloned()
    }
}
