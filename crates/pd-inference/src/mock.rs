//! Scripted provider for tests.
//!
//! Answers are scripted per schema and pass through the same schema
//! validation as real vendor output, so a scripted choice outside the
//! schema's value table fails exactly as a misbehaving model would.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use pd_protocol::inference::{CallOptions, InferenceRequest, InferenceResult, SchemaId};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::ProviderAdapter;
use crate::schema::parse_answer;

/// Shared record of which provider was called, in call order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone)]
enum Reply {
    Answer {
        choice: String,
        confidence: f64,
        rationale: Option<String>,
    },
    Raw(String),
    Fail(ProviderError),
}

/// Mock provider with per-schema scripted replies and call recording.
pub struct MockProvider {
    name: String,
    replies: HashMap<SchemaId, Reply>,
    /// Reply for schemas with nothing scripted.
    default_reply: Reply,
    delay: Duration,
    timeout: Duration,
    calls: Mutex<Vec<(SchemaId, CallOptions)>>,
    call_log: Option<CallLog>,
}

impl MockProvider {
    /// A mock with no scripted answers; unscripted schemas fail with a
    /// transport error.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            default_reply: Reply::Fail(ProviderError::Transport(format!(
                "{name}: no scripted answer"
            ))),
            name,
            replies: HashMap::new(),
            delay: Duration::ZERO,
            timeout: Duration::from_secs(5),
            calls: Mutex::new(Vec::new()),
            call_log: None,
        }
    }

    /// A mock whose every call fails with `error`.
    pub fn failing(name: impl Into<String>, error: ProviderError) -> Self {
        Self::new(name).fail_by_default(error)
    }

    /// Script the answer for one schema.
    pub fn answer(mut self, schema: SchemaId, choice: &str, confidence: f64) -> Self {
        self.replies.insert(
            schema,
            Reply::Answer {
                choice: choice.to_string(),
                confidence,
                rationale: None,
            },
        );
        self
    }

    /// Script an answer that carries a rationale.
    pub fn answer_with_rationale(
        mut self,
        schema: SchemaId,
        choice: &str,
        confidence: f64,
        rationale: &str,
    ) -> Self {
        self.replies.insert(
            schema,
            Reply::Answer {
                choice: choice.to_string(),
                confidence,
                rationale: Some(rationale.to_string()),
            },
        );
        self
    }

    /// Script raw vendor text for one schema; it is validated like real output.
    pub fn raw(mut self, schema: SchemaId, text: &str) -> Self {
        self.replies.insert(schema, Reply::Raw(text.to_string()));
        self
    }

    /// Script a failure for one schema.
    pub fn fail(mut self, schema: SchemaId, error: ProviderError) -> Self {
        self.replies.insert(schema, Reply::Fail(error));
        self
    }

    /// Failure returned for every schema without a scripted reply.
    pub fn fail_by_default(mut self, error: ProviderError) -> Self {
        self.default_reply = Reply::Fail(error);
        self
    }

    /// Sleep this long before replying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Append this provider's name to `log` on every call.
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.call_log = Some(log);
        self
    }

    /// Schemas this provider was asked about, in call order.
    pub fn calls(&self) -> Vec<SchemaId> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(schema, _)| *schema)
            .collect()
    }

    /// Sampling options received with each call, in call order.
    pub fn options_seen(&self) -> Vec<CallOptions> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, options)| *options)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of calls for one schema.
    pub fn calls_for(&self, schema: SchemaId) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(s, _)| *s == schema)
            .count()
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call(&self, request: &InferenceRequest) -> ProviderResult<InferenceResult> {
        let schema = request.schema_id();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((schema, request.options));
        if let Some(log) = &self.call_log {
            log.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(self.name.clone());
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self.replies.get(&schema).unwrap_or(&self.default_reply);
        match reply {
            Reply::Answer {
                choice,
                confidence,
                rationale,
            } => {
                let text = serde_json::json!({
                    "choice": choice,
                    "confidence": confidence,
                    "rationale": rationale,
                })
                .to_string();
                parse_answer(&text, &request.schema, &self.name)
            }
            Reply::Raw(text) => parse_answer(text, &request.schema, &self.name),
            Reply::Fail(error) => Err(error.clone()),
        }
    }
}
