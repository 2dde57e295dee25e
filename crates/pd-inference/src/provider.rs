//! Provider adapter trait and helpers shared by the vendor implementations.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use pd_protocol::inference::{InferenceRequest, InferenceResult};

use crate::error::ProviderResult;

/// Per-vendor translation of the canonical image question.
///
/// All vendor-specific request building and response parsing stays inside
/// the implementation; callers only see schema-valid results or typed errors.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name (for logging and failure reports).
    fn name(&self) -> &str;

    /// Deadline the client enforces around one `call`.
    fn timeout(&self) -> Duration;

    /// Ask the question and return a schema-valid answer.
    async fn call(&self, request: &InferenceRequest) -> ProviderResult<InferenceResult>;
}

/// Run `attempt` up to `max_attempts` times without backoff, returning the
/// first success or the last error.
pub async fn with_attempts<T, F, Fut>(
    provider: &str,
    max_attempts: u32,
    mut attempt: F,
) -> ProviderResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut n = 1;
    loop {
        match attempt(n).await {
            Ok(value) => return Ok(value),
            Err(e) if n < max_attempts => {
                tracing::debug!(
                    provider,
                    attempt = n,
                    max_attempts,
                    error = %e,
                    "provider attempt failed, retrying"
                );
                n += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Base64-encode image bytes for JSON transports.
pub fn encode_image(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Image container format, detected from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageKind {
    /// Sniff the format; unrecognised bytes are treated as JPEG.
    pub fn sniff(bytes: &[u8]) -> Self {
        match bytes {
            [0x89, b'P', b'N', b'G', ..] => Self::Png,
            [b'G', b'I', b'F', b'8', ..] => Self::Gif,
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Self::Webp,
            _ => Self::Jpeg,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }
}
