//! Diagnosis endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use pd_diagnosis::DiagnosisRequest;
use pd_protocol::diagnosis::{DiagnosisResult, DiagnosisTier};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Request body for a new diagnosis.
#[derive(Debug, Deserialize)]
pub struct CreateDiagnosisRequest {
    /// Image bytes, base64. A `data:` URI prefix is accepted.
    pub image_base64: String,
    /// Caller's guess at the genus; compared with the gate's answer only.
    #[serde(default)]
    pub genus_hint: Option<String>,
}

/// Summary view of a diagnosis (for list responses).
#[derive(Debug, Serialize)]
pub struct DiagnosisSummary {
    pub diagnosis_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub tier: DiagnosisTier,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disease_id: Option<String>,
}

impl From<&DiagnosisResult> for DiagnosisSummary {
    fn from(result: &DiagnosisResult) -> Self {
        Self {
            diagnosis_id: result.diagnosis_id,
            timestamp: result.timestamp,
            tier: result.tier,
            message: result.message.clone(),
            disease_id: result
                .chosen_disease
                .as_ref()
                .or_else(|| result.candidates.first().map(|c| &c.disease))
                .map(|d| d.disease_id.clone()),
        }
    }
}

fn decode_image(encoded: &str) -> ApiResult<Vec<u8>> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| ApiError::BadRequest(format!("image_base64 is not valid base64: {e}")))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("image_base64 decodes to an empty image".into()));
    }
    Ok(bytes)
}

/// POST /api/v1/diagnoses — diagnose one image.
///
/// Dropping the request (client disconnect) cancels in-flight provider calls.
pub async fn create_diagnosis(
    State(state): State<AppState>,
    Json(req): Json<CreateDiagnosisRequest>,
) -> ApiResult<Json<DiagnosisResult>> {
    let image = decode_image(&req.image_base64)?;
    let mut request = DiagnosisRequest::new(Arc::<[u8]>::from(image));
    if let Some(hint) = req.genus_hint.filter(|h| !h.trim().is_empty()) {
        request = request.with_genus_hint(hint);
    }

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let result = state.engine.diagnose(request, &cancel).await.map_err(|e| {
        tracing::warn!(error = %e, "diagnosis failed");
        ApiError::from(e)
    })?;

    state.remember(result.clone()).await;
    Ok(Json(result))
}

/// GET /api/v1/diagnoses — recent diagnoses, newest first.
pub async fn list_diagnoses(State(state): State<AppState>) -> Json<Vec<DiagnosisSummary>> {
    let history = state.history.read().await;
    Json(history.iter().map(DiagnosisSummary::from).collect())
}

/// GET /api/v1/diagnoses/:id — full result of a recent diagnosis.
pub async fn get_diagnosis(
    State(state): State<AppState>,
    Path(diagnosis_id): Path<Uuid>,
) -> ApiResult<Json<DiagnosisResult>> {
    state
        .find(diagnosis_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("diagnosis '{diagnosis_id}' not found")))
}
