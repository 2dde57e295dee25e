//! Provider and cache introspection.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use pd_inference::CacheStats;

use crate::state::{AppState, ProviderSummary};

/// GET /api/v1/providers — configured providers in try order.
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderSummary>> {
    Json(state.providers.as_ref().clone())
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CacheStats>,
}

/// GET /api/v1/cache/stats — response cache counters.
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    let response = match state.engine.client().cache() {
        Some(cache) => CacheStatsResponse {
            enabled: true,
            ttl_secs: Some(cache.ttl().as_secs()),
            stats: Some(cache.stats()),
        },
        None => CacheStatsResponse {
            enabled: false,
            ttl_secs: None,
            stats: None,
        },
    };
    Json(response)
}
