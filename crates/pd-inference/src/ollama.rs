//! Ollama vision adapter.
//!
//! Calls the Ollama HTTP API (`/api/chat`) with the image attached as a
//! base64 string in the message's `images` array and `format: "json"`, then
//! validates the returned message content against the request schema.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pd_protocol::inference::{InferenceRequest, InferenceResult};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::provider::{ProviderAdapter, encode_image, with_attempts};
use crate::schema::parse_answer;

/// Ollama chat API request body.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    format: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

/// A single message in the chat request.
#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Ollama chat API response (only fields we need).
#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Adapter for an Ollama endpoint serving a vision model (e.g. LLaVA).
pub struct OllamaProvider {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_attempts: u32,
    timeout: Duration,
}

impl OllamaProvider {
    pub fn new(config: &ProviderConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;
        let endpoint = config
            .endpoint()
            .ok_or_else(|| ProviderError::Transport("ollama endpoint not configured".into()))?
            .to_string();
        Ok(Self {
            name: config.display_name().to_string(),
            client,
            endpoint,
            model: config.model().to_string(),
            max_attempts: config.max_retries,
            timeout: config.timeout(),
        })
    }

    async fn call_once(&self, request: &InferenceRequest) -> ProviderResult<InferenceResult> {
        let url = format!("{}/api/chat", self.endpoint);
        let prompt = request.full_prompt();

        let options = (request.options.temperature.is_some()
            || request.options.max_output_tokens.is_some())
        .then(|| ChatOptions {
            temperature: request.options.temperature,
            num_predict: request.options.max_output_tokens,
        });

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
                images: request
                    .image
                    .as_deref()
                    .map(|bytes| vec![encode_image(bytes)])
                    .unwrap_or_default(),
            }],
            format: "json",
            stream: false,
            options,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!(
                "ollama returned HTTP {}",
                response.status()
            )));
        }

        let chat_resp: ChatResponse = response.json().await.map_err(|e| {
            ProviderError::SchemaValidation(format!("unreadable ollama response body: {e}"))
        })?;

        let content = chat_resp
            .message
            .map(|m| m.content)
            .ok_or_else(|| ProviderError::SchemaValidation("ollama response has no message".into()))?;

        parse_answer(&content, &request.schema, &self.name)
    }
}

#[async_trait]
impl ProviderAdapter for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call(&self, request: &InferenceRequest) -> ProviderResult<InferenceResult> {
        with_attempts(&self.name, self.max_attempts, |_| self.call_once(request)).await
    }
}

/// Map a reqwest failure onto the provider taxonomy.
pub(crate) fn transport_error(e: reqwest::Error, timeout: Duration) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        ProviderError::Transport(e.to_string())
    }
}
