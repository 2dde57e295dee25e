//! OpenAI-compatible chat completions adapter.
//!
//! The image travels as a `data:` URL inside an `image_url` content part and
//! the model is asked for a JSON object via `response_format`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pd_protocol::inference::{InferenceRequest, InferenceResult};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::ollama::transport_error;
use crate::provider::{ImageKind, ProviderAdapter, encode_image, with_attempts};
use crate::schema::parse_answer;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage>,
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct CompletionMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Adapter for any endpoint speaking the OpenAI chat completions format.
pub struct OpenAiProvider {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_attempts: u32,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;
        let endpoint = config
            .endpoint()
            .ok_or_else(|| ProviderError::Transport("openai endpoint not configured".into()))?
            .to_string();
        Ok(Self {
            name: config.display_name().to_string(),
            client,
            endpoint,
            model: config.model().to_string(),
            api_key: config.resolve_api_key(),
            max_attempts: config.max_retries,
            timeout: config.timeout(),
        })
    }

    fn build_body<'a>(&'a self, request: &InferenceRequest) -> CompletionRequest<'a> {
        let mut content = vec![ContentPart::Text {
            text: request.full_prompt(),
        }];
        if let Some(bytes) = request.image.as_deref() {
            let mime = ImageKind::sniff(bytes).mime_type();
            content.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:{mime};base64,{}", encode_image(bytes)),
                },
            });
        }

        CompletionRequest {
            model: &self.model,
            messages: vec![CompletionMessage {
                role: "user",
                content,
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            max_tokens: request.options.max_output_tokens,
            temperature: request.options.temperature,
        }
    }

    async fn call_once(&self, request: &InferenceRequest) -> ProviderResult<InferenceResult> {
        let url = format!("{}/chat/completions", self.endpoint);
        let mut builder = self.client.post(&url).json(&self.build_body(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Transport(format!(
                "openai returned HTTP {status}"
            )));
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            ProviderError::SchemaValidation(format!("unreadable openai response body: {e}"))
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                ProviderError::SchemaValidation("openai response has no message content".into())
            })?;

        parse_answer(&content, &request.schema, &self.name)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
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
