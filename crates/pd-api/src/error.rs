//! Unified API error type with Axum `IntoResponse` support.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use pd_diagnosis::DiagnosisError;

/// API error type that converts to proper HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Every provider failed, or the request was abandoned.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("deadline exceeded: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DiagnosisError> for ApiError {
    fn from(err: DiagnosisError) -> Self {
        let message = err.to_string();
        match err {
            DiagnosisError::Inference { .. } | DiagnosisError::Cancelled => {
                ApiError::Unavailable(message)
            }
            DiagnosisError::DeadlineExceeded { .. } => ApiError::Timeout(message),
            DiagnosisError::EmptyImage => ApiError::BadRequest(message),
            DiagnosisError::Config(_) => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience alias.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use pd_inference::InferenceError;
    use pd_protocol::inference::SchemaId;
    use pd_protocol::stages::GateStage;

    #[tokio::test]
    async fn not_found_response() {
        let err = ApiError::NotFound("diagnosis 0190".into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], 404);
        assert!(json["error"].as_str().unwrap().contains("0190"));
    }

    #[test]
    fn provider_outage_is_503() {
        let err: ApiError = DiagnosisError::Inference {
            schema: SchemaId::Gate(GateStage::ContentType),
            source: InferenceError::AllProvidersFailed { failures: vec![] },
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn deadline_is_504() {
        let err: ApiError = DiagnosisError::DeadlineExceeded { timeout_ms: 120_000 }.into();
        assert_eq!(err.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn empty_image_is_400() {
        let err: ApiError = DiagnosisError::EmptyImage.into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
