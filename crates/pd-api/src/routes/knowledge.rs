//! Knowledge-base introspection.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct GeneraResponse {
    pub genera: Vec<String>,
    pub diseases: usize,
}

/// GET /api/v1/knowledge/genera — genera the genus gate can answer with.
pub async fn list_genera(State(state): State<AppState>) -> Json<GeneraResponse> {
    let kb = state.engine.knowledge();
    Json(GeneraResponse {
        genera: kb.known_genera(),
        diseases: kb.len(),
    })
}
