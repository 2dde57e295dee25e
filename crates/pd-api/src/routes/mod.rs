//! API route definitions and router builder.

pub mod diagnoses;
pub mod health;
pub mod knowledge;
pub mod providers;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route(
            "/diagnoses",
            get(diagnoses::list_diagnoses).post(diagnoses::create_diagnosis),
        )
        .route("/diagnoses/{id}", get(diagnoses::get_diagnosis))
        .route("/knowledge/genera", get(knowledge::list_genera))
        .route("/providers", get(providers::list_providers))
        .route("/cache/stats", get(providers::cache_stats));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use pd_diagnosis::{DiagnosisConfig, DiagnosisEngine};
    use pd_inference::{MockProvider, ProviderError, ResilientClient, ResponseCache};
    use pd_knowledge::KnowledgeBase;
    use pd_protocol::inference::SchemaId;
    use pd_protocol::stages::{FeatureDimension, GateStage};

    fn black_spot_mock() -> MockProvider {
        MockProvider::new("scripted")
            .answer(SchemaId::Gate(GateStage::ContentType), "plant", 0.95)
            .answer(SchemaId::Gate(GateStage::PlantCategory), "flower", 0.9)
            .answer(SchemaId::Gate(GateStage::Genus), "Rosa", 0.85)
            .answer(SchemaId::Gate(GateStage::Organ), "leaf", 0.9)
            .answer(SchemaId::Gate(GateStage::Completeness), "complete", 0.8)
            .answer(SchemaId::Gate(GateStage::Abnormality), "abnormal", 0.9)
            .answer(SchemaId::Feature(FeatureDimension::SymptomType), "necrosis_spot", 0.9)
            .answer(SchemaId::Feature(FeatureDimension::ColorCenter), "black", 0.85)
            .answer(SchemaId::Feature(FeatureDimension::ColorBorder), "yellow", 0.8)
            .answer(SchemaId::Feature(FeatureDimension::Size), "small", 0.7)
            .answer(SchemaId::Feature(FeatureDimension::Location), "upper_surface", 0.8)
            .answer(SchemaId::Feature(FeatureDimension::Distribution), "scattered", 0.75)
    }

    fn state_with(client: ResilientClient) -> AppState {
        let kb = Arc::new(KnowledgeBase::bundled().unwrap());
        AppState::new(DiagnosisEngine::new(client, kb, DiagnosisConfig::default()).unwrap())
    }

    fn app() -> Router {
        build_router(state_with(ResilientClient::new(vec![Arc::new(black_spot_mock())])))
    }

    fn diagnose_request(body: serde_json::Value) -> Request<Body> {
        Request::post("/api/v1/diagnoses")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert!(json["diseases"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn diagnosis_is_returned_and_remembered() {
        let app = app();
        let response = app
            .clone()
            .oneshot(diagnose_request(serde_json::json!({
                "image_base64": STANDARD.encode(b"rose-leaf"),
                "genus_hint": "Rosa",
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["tier"], "confirmed");
        assert_eq!(json["chosen_disease"]["disease_id"], "rose_black_spot");
        assert_eq!(json["genus_hint_confirmed"], true);
        let id = json["diagnosis_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(Request::get("/api/v1/diagnoses").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let list = json_body(response).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["disease_id"], "rose_black_spot");

        let response = app
            .oneshot(
                Request::get(format!("/api/v1/diagnoses/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["diagnosis_id"], id.as_str());
    }

    #[tokio::test]
    async fn unknown_diagnosis_is_404() {
        let response = app()
            .oneshot(
                Request::get(format!("/api/v1/diagnoses/{}", uuid::Uuid::now_v7()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_base64_is_400() {
        let response = app()
            .oneshot(diagnose_request(serde_json::json!({"image_base64": "%%%"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn provider_outage_is_503() {
        let client = ResilientClient::new(vec![Arc::new(MockProvider::failing(
            "down",
            ProviderError::Transport("connection refused".into()),
        ))]);
        let response = build_router(state_with(client))
            .oneshot(diagnose_request(serde_json::json!({
                "image_base64": STANDARD.encode(b"rose-leaf"),
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = json_body(response).await;
        assert!(json["error"].as_str().unwrap().contains("all providers failed"));
    }

    #[tokio::test]
    async fn genera_lists_knowledge_base_hosts() {
        let response = app()
            .oneshot(
                Request::get("/api/v1/knowledge/genera")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = json_body(response).await;
        let genera: Vec<&str> = json["genera"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|g| g.as_str())
            .collect();
        assert!(genera.contains(&"Rosa"));
        assert!(json["diseases"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn providers_listed_in_order() {
        let response = app()
            .oneshot(Request::get("/api/v1/providers").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json[0]["name"], "scripted");
    }

    #[tokio::test]
    async fn cache_stats_reflect_hits() {
        let client = ResilientClient::new(vec![Arc::new(black_spot_mock())])
            .with_cache(Arc::new(ResponseCache::new(Duration::from_secs(3600), 128)));
        let app = build_router(state_with(client));
        let body = serde_json::json!({"image_base64": STANDARD.encode(b"rose-leaf")});
        for _ in 0..2 {
            let response = app.clone().oneshot(diagnose_request(body.clone())).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(Request::get("/api/v1/cache/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json["enabled"], true);
        assert_eq!(json["stats"]["entries"], 12);
        assert_eq!(json["stats"]["hits"], 12);
    }

    #[tokio::test]
    async fn cache_stats_when_disabled() {
        let response = app()
            .oneshot(Request::get("/api/v1/cache/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json["enabled"], false);
        assert!(json.get("stats").is_none());
    }
}
