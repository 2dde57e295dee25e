//! AWS Bedrock adapter using the model-agnostic Converse API.
//!
//! The image is sent as a raw-bytes image block next to the prompt text, so
//! any Converse vision model (Nova, Claude, ...) can answer.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, ConverseOutput, ImageBlock, ImageFormat, ImageSource,
    InferenceConfiguration, Message,
};

use pd_protocol::inference::{InferenceRequest, InferenceResult};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::provider::{ImageKind, ProviderAdapter, with_attempts};
use crate::schema::parse_answer;

/// Bedrock Converse adapter.
pub struct BedrockProvider {
    name: String,
    client: BedrockClient,
    model_id: String,
    max_attempts: u32,
    timeout: Duration,
}

impl BedrockProvider {
    /// Create an adapter around a pre-built Bedrock client.
    pub fn new(client: BedrockClient, config: &ProviderConfig) -> Self {
        Self {
            name: config.display_name().to_string(),
            client,
            model_id: config.model().to_string(),
            max_attempts: config.max_retries,
            timeout: config.timeout(),
        }
    }

    /// Build the client from the default AWS credential chain.
    pub async fn from_config(config: &ProviderConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;
        Self::new(BedrockClient::new(&sdk_config), config)
    }

    async fn call_once(&self, request: &InferenceRequest) -> ProviderResult<InferenceResult> {
        let message = build_message(request)?;

        let mut converse = self
            .client
            .converse()
            .model_id(&self.model_id)
            .messages(message);
        if let Some(config) = inference_config(request) {
            converse = converse.inference_config(config);
        }

        let response = converse
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("bedrock converse error: {e}")))?;

        let text = response
            .output()
            .and_then(output_text)
            .ok_or_else(|| {
                ProviderError::SchemaValidation("bedrock response has no text block".into())
            })?;

        parse_answer(&text, &request.schema, &self.name)
    }
}

#[async_trait]
impl ProviderAdapter for BedrockProvider {
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

fn build_message(request: &InferenceRequest) -> ProviderResult<Message> {
    let mut builder = Message::builder()
        .role(ConversationRole::User)
        .content(ContentBlock::Text(request.full_prompt()));

    if let Some(bytes) = request.image.as_deref() {
        let image = ImageBlock::builder()
            .format(image_format(ImageKind::sniff(bytes)))
            .source(ImageSource::Bytes(Blob::new(bytes.to_vec())))
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build image block: {e}")))?;
        builder = builder.content(ContentBlock::Image(image));
    }

    builder
        .build()
        .map_err(|e| ProviderError::Transport(format!("failed to build message: {e}")))
}

fn inference_config(request: &InferenceRequest) -> Option<InferenceConfiguration> {
    let options = &request.options;
    if options.max_output_tokens.is_none() && options.temperature.is_none() {
        return None;
    }
    Some(
        InferenceConfiguration::builder()
            .set_max_tokens(options.max_output_tokens.map(|t| t.min(i32::MAX as u32) as i32))
            .set_temperature(options.temperature)
            .build(),
    )
}

fn image_format(kind: ImageKind) -> ImageFormat {
    match kind {
        ImageKind::Jpeg => ImageFormat::Jpeg,
        ImageKind::Png => ImageFormat::Png,
        ImageKind::Gif => ImageFormat::Gif,
        ImageKind::Webp => ImageFormat::Webp,
    }
}

/// First text block of an assistant message.
fn output_text(output: &ConverseOutput) -> Option<String> {
    match output {
        ConverseOutput::Message(msg) => msg.content().iter().find_map(|block| {
            if let ContentBlock::Text(t) = block {
                Some(t.clone())
            } else {
                None
            }
        }),
        _ => None,
    }
}
