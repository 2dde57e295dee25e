//! Resilient inference client: cache lookup, then ordered provider fallback.
//!
//! Providers are tried strictly in configured order. The first schema-valid
//! answer wins; every failure is recorded so an exhausted chain reports what
//! went wrong with each provider, in try order.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use pd_protocol::inference::{InferenceRequest, InferenceResult};

use crate::bedrock::BedrockProvider;
use crate::cache::{CacheKey, ResponseCache};
use crate::config::{InferenceConfig, ProviderKind};
use crate::error::{InferenceError, ProviderError, ProviderFailure};
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::provider::ProviderAdapter;

/// Ordered provider chain with an optional shared response cache.
#[derive(Clone)]
pub struct ResilientClient {
    providers: Vec<Arc<dyn ProviderAdapter>>,
    cache: Option<Arc<ResponseCache>>,
}

impl ResilientClient {
    pub fn new(providers: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        Self {
            providers,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build every configured adapter, in order.
    pub async fn from_config(config: &InferenceConfig) -> anyhow::Result<Self> {
        let mut providers: Vec<Arc<dyn ProviderAdapter>> = Vec::with_capacity(config.providers.len());
        for provider in &config.providers {
            let adapter: Arc<dyn ProviderAdapter> = match provider.kind {
                ProviderKind::Ollama => Arc::new(OllamaProvider::new(provider)?),
                ProviderKind::Openai => Arc::new(OpenAiProvider::new(provider)?),
                ProviderKind::Bedrock => Arc::new(BedrockProvider::from_config(provider).await),
            };
            tracing::info!(
                provider = adapter.name(),
                kind = provider.kind.as_str(),
                model = provider.model(),
                timeout_ms = provider.timeout_ms,
                "provider configured"
            );
            providers.push(adapter);
        }

        let mut client = Self::new(providers);
        if config.cache.enabled {
            client = client.with_cache(Arc::new(ResponseCache::new(
                config.cache.ttl(),
                config.cache.max_entries,
            )));
        }
        Ok(client)
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    /// Ask one structured question.
    ///
    /// A fresh cache entry short-circuits the providers entirely. Otherwise
    /// each provider gets one call bounded by its own timeout; the call is
    /// abandoned if `cancel` fires.
    pub async fn infer(
        &self,
        request: &InferenceRequest,
        cancel: &CancellationToken,
    ) -> Result<InferenceResult, InferenceError> {
        if cancel.is_cancelled() {
            return Err(InferenceError::Cancelled);
        }

        let schema = request.schema_id();
        let key = self.cache_key(request);
        if let Some(cache) = &self.cache
            && let Some(key) = &key
            && let Some(mut hit) = cache.get(key)
        {
            tracing::debug!(schema = %schema, provider = %hit.provider, "cache hit");
            hit.from_cache = true;
            return Ok(hit);
        }

        let mut failures = Vec::new();
        for provider in &self.providers {
            let timeout = provider.timeout();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(schema = %schema, provider = provider.name(), "inference cancelled");
                    return Err(InferenceError::Cancelled);
                }
                outcome = tokio::time::timeout(timeout, provider.call(request)) => outcome,
            };

            let error = match outcome {
                Ok(Ok(mut result)) => {
                    result.provider = provider.name().to_string();
                    result.from_cache = false;
                    tracing::debug!(
                        schema = %schema,
                        provider = provider.name(),
                        choice = %result.choice,
                        confidence = result.confidence,
                        "provider answered"
                    );
                    if let Some(cache) = &self.cache
                        && let Some(key) = key
                    {
                        cache.insert(key, result.clone());
                    }
                    return Ok(result);
                }
                Ok(Err(error)) => error,
                Err(_) => ProviderError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                },
            };

            tracing::warn!(
                schema = %schema,
                provider = provider.name(),
                kind = error.kind(),
                error = %error,
                "provider failed, trying next"
            );
            failures.push(ProviderFailure {
                provider: provider.name().to_string(),
                error,
            });
        }

        tracing::warn!(schema = %schema, attempted = failures.len(), "all providers failed");
        Err(InferenceError::AllProvidersFailed { failures })
    }

    fn cache_key(&self, request: &InferenceRequest) -> Option<CacheKey> {
        if self.cache.is_none() {
            return None;
        }
        let image = request.image.as_deref()?;
        Some(CacheKey::compute(&request.prompt, request.schema_id(), image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{CallLog, MockProvider};
    use pd_protocol::inference::{ResponseSchema, SchemaId};
    use pd_protocol::stages::GateStage;
    use std::time::Duration;

    const CONTENT: SchemaId = SchemaId::Gate(GateStage::ContentType);

    fn request(image: &'static [u8]) -> InferenceRequest {
        InferenceRequest::new(
            "What does this image show?",
            Some(Arc::from(image)),
            ResponseSchema::for_gate(GateStage::ContentType).unwrap(),
        )
    }

    fn down(name: &str) -> MockProvider {
        MockProvider::failing(name, ProviderError::Transport("connection refused".into()))
    }

    fn cache() -> Arc<ResponseCache> {
        Arc::new(ResponseCache::new(Duration::from_secs(600), 64))
    }

    #[tokio::test]
    async fn providers_tried_in_order_until_success() {
        let log = CallLog::default();
        let client = ResilientClient::new(vec![
            Arc::new(down("a").with_call_log(log.clone())),
            Arc::new(
                MockProvider::new("b")
                    .answer(CONTENT, "plant", 0.9)
                    .with_call_log(log.clone()),
            ),
            Arc::new(
                MockProvider::new("c")
                    .answer(CONTENT, "animal", 0.9)
                    .with_call_log(log.clone()),
            ),
        ]);

        let result = client
            .infer(&request(b"img"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.choice, "plant");
        assert_eq!(result.provider, "b");
        assert_eq!(*log.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn exhausted_chain_reports_every_failure_in_order() {
        let client = ResilientClient::new(vec![
            Arc::new(down("a")),
            Arc::new(MockProvider::new("b").answer(CONTENT, "mushroom", 0.9)),
        ]);

        let err = client
            .infer(&request(b"img"), &CancellationToken::new())
            .await
            .unwrap_err();
        let InferenceError::AllProvidersFailed { failures } = err else {
            panic!("expected AllProvidersFailed");
        };
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].provider, "a");
        assert_eq!(failures[0].error.kind(), "transport");
        assert_eq!(failures[1].provider, "b");
        assert_eq!(failures[1].error.kind(), "schema_validation");
    }

    #[tokio::test]
    async fn no_providers_is_all_failed() {
        let client = ResilientClient::new(vec![]);
        let err = client
            .infer(&request(b"img"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, InferenceError::AllProvidersFailed { failures: vec![] });
    }

    #[tokio::test]
    async fn cache_hit_skips_providers() {
        let provider = Arc::new(MockProvider::new("a").answer(CONTENT, "plant", 0.9));
        let client = ResilientClient::new(vec![provider.clone()]).with_cache(cache());
        let cancel = CancellationToken::new();

        let first = client.infer(&request(b"img"), &cancel).await.unwrap();
        let second = client.infer(&request(b"img"), &cancel).await.unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(second.choice, first.choice);
        assert_eq!(second.provider, "a");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn different_image_misses_cache() {
        let provider = Arc::new(MockProvider::new("a").answer(CONTENT, "plant", 0.9));
        let client = ResilientClient::new(vec![provider.clone()]).with_cache(cache());
        let cancel = CancellationToken::new();

        client.infer(&request(b"image-one"), &cancel).await.unwrap();
        let other = client.infer(&request(b"image-two"), &cancel).await.unwrap();
        assert!(!other.from_cache);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let provider = Arc::new(down("a"));
        let client = ResilientClient::new(vec![provider.clone()]).with_cache(cache());
        let cancel = CancellationToken::new();

        assert!(client.infer(&request(b"img"), &cancel).await.is_err());
        assert!(client.infer(&request(b"img"), &cancel).await.is_err());
        assert_eq!(provider.call_count(), 2);
        assert!(client.cache().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out_then_next_answers() {
        let client = ResilientClient::new(vec![
            Arc::new(
                MockProvider::new("slow")
                    .answer(CONTENT, "plant", 0.9)
                    .with_delay(Duration::from_secs(30))
                    .with_timeout(Duration::from_secs(2)),
            ),
            Arc::new(MockProvider::new("fast").answer(CONTENT, "scenery", 0.6)),
        ]);

        let result = client
            .infer(&request(b"img"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.provider, "fast");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_in_flight_call() {
        let client = ResilientClient::new(vec![Arc::new(
            MockProvider::new("slow")
                .answer(CONTENT, "plant", 0.9)
                .with_delay(Duration::from_secs(60))
                .with_timeout(Duration::from_secs(120)),
        )]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = client.infer(&request(b"img"), &cancel).await.unwrap_err();
        assert_eq!(err, InferenceError::Cancelled);
    }

    #[tokio::test]
    async fn already_cancelled_makes_no_calls() {
        let provider = Arc::new(MockProvider::new("a").answer(CONTENT, "plant", 0.9));
        let client = ResilientClient::new(vec![provider.clone()]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client.infer(&request(b"img"), &cancel).await.unwrap_err();
        assert_eq!(err, InferenceError::Cancelled);
        assert_eq!(provider.call_count(), 0);
    }
}
