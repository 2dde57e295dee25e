//! Plant diagnosis HTTP service.
//!
//! Loads the knowledge base and provider list, builds the diagnosis engine
//! and serves the REST API.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use pd_api::config::ServiceConfig;
use pd_api::routes;
use pd_api::state::AppState;
use pd_diagnosis::DiagnosisEngine;
use pd_inference::{ResilientClient, ResponseCache};
use pd_knowledge::KnowledgeBase;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pd-api starting");

    let config = ServiceConfig::from_env()?;

    let kb = match &config.knowledge_base_path {
        Some(path) => KnowledgeBase::from_file(path)?,
        None => {
            tracing::warn!("knowledge_base_path not set, using bundled sample knowledge base");
            KnowledgeBase::bundled()?
        }
    };

    if config.providers.is_empty() {
        tracing::warn!("no providers configured, every diagnosis will fail");
    }
    let client = ResilientClient::from_config(&config.inference()).await?;
    if let Some(cache) = client.cache() {
        spawn_cache_purge(Arc::clone(cache));
    }

    let engine = DiagnosisEngine::new(client, Arc::new(kb), config.diagnosis.clone())?;
    let state = AppState::new(engine)
        .with_provider_configs(&config.providers)
        .with_limits(config.server.history_capacity, config.server.max_body_bytes);

    let app = routes::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Drop expired cache entries once per TTL.
fn spawn_cache_purge(cache: Arc<ResponseCache>) {
    let period = cache.ttl().max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "expired cache entries removed");
            }
        }
    });
}
