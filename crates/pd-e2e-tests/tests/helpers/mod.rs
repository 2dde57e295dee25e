//! Shared test harness for E2E integration tests.
//!
//! Builds the diagnosis engine and HTTP router around scripted providers,
//! and a wiremock responder that answers like a vision model would.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http_body_util::BodyExt;
use tower::ServiceExt;
use wiremock::{Respond, ResponseTemplate};

use pd_api::routes::build_router;
use pd_api::state::AppState;
use pd_diagnosis::{DiagnosisConfig, DiagnosisEngine, PromptCatalog};
use pd_inference::{MockProvider, ResilientClient};
use pd_knowledge::KnowledgeBase;
use pd_protocol::inference::SchemaId;
use pd_protocol::stages::{FeatureDimension, GateStage};

pub const ROSE_LEAF: &[u8] = b"\xff\xd8\xff\xe0rose-leaf-with-black-spots";

// ── Scripts ───────────────────────────────────────────────────

/// Gate answers for an abnormal rose leaf, whole organ in view.
pub fn rose_gates(name: &str) -> MockProvider {
    MockProvider::new(name)
        .answer(SchemaId::Gate(GateStage::ContentType), "plant", 0.96)
        .answer(SchemaId::Gate(GateStage::PlantCategory), "flower", 0.92)
        .answer(SchemaId::Gate(GateStage::Genus), "Rosa", 0.88)
        .answer(SchemaId::Gate(GateStage::Organ), "leaf", 0.93)
        .answer(SchemaId::Gate(GateStage::Completeness), "complete", 0.81)
        .answer(SchemaId::Gate(GateStage::Abnormality), "abnormal", 0.9)
}

/// Gate and feature answers matching rose black spot exactly.
pub fn black_spot(name: &str) -> MockProvider {
    rose_gates(name)
        .answer(SchemaId::Feature(FeatureDimension::SymptomType), "necrosis_spot", 0.91)
        .answer(SchemaId::Feature(FeatureDimension::ColorCenter), "black", 0.87)
        .answer(SchemaId::Feature(FeatureDimension::ColorBorder), "yellow", 0.74)
        .answer(SchemaId::Feature(FeatureDimension::Size), "small", 0.66)
        .answer(SchemaId::Feature(FeatureDimension::Location), "upper_surface", 0.79)
        .answer(SchemaId::Feature(FeatureDimension::Distribution), "scattered", 0.7)
}

/// `(schema, choice, confidence)` rows for [`ScriptedVision`].
pub fn black_spot_rows() -> Vec<(SchemaId, &'static str, f64)> {
    vec![
        (SchemaId::Gate(GateStage::ContentType), "plant", 0.96),
        (SchemaId::Gate(GateStage::PlantCategory), "flower", 0.92),
        (SchemaId::Gate(GateStage::Genus), "Rosa", 0.88),
        (SchemaId::Gate(GateStage::Organ), "leaf", 0.93),
        (SchemaId::Gate(GateStage::Completeness), "complete", 0.81),
        (SchemaId::Gate(GateStage::Abnormality), "abnormal", 0.9),
        (SchemaId::Feature(FeatureDimension::SymptomType), "necrosis_spot", 0.91),
        (SchemaId::Feature(FeatureDimension::ColorCenter), "black", 0.87),
        (SchemaId::Feature(FeatureDimension::ColorBorder), "yellow", 0.74),
        (SchemaId::Feature(FeatureDimension::Size), "small", 0.66),
        (SchemaId::Feature(FeatureDimension::Location), "upper_surface", 0.79),
        (SchemaId::Feature(FeatureDimension::Distribution), "scattered", 0.7),
    ]
}

// ── Engine & router ───────────────────────────────────────────

pub fn engine(client: ResilientClient) -> DiagnosisEngine {
    engine_with(client, DiagnosisConfig::default())
}

pub fn engine_with(client: ResilientClient, config: DiagnosisConfig) -> DiagnosisEngine {
    let kb = Arc::new(KnowledgeBase::bundled().unwrap());
    DiagnosisEngine::new(client, kb, config).unwrap()
}

/// HTTP harness over an in-memory `AppState`.
pub struct TestHarness {
    pub state: AppState,
    pub router: Router,
}

impl TestHarness {
    pub fn new(client: ResilientClient) -> Self {
        Self::with_config(client, DiagnosisConfig::default())
    }

    pub fn with_config(client: ResilientClient, config: DiagnosisConfig) -> Self {
        let state = AppState::new(engine_with(client, config));
        let router = build_router(state.clone());
        Self { state, router }
    }

    /// POST /api/v1/diagnoses. Returns (HTTP status code, response JSON body).
    pub async fn diagnose(
        &self,
        image: &[u8],
        genus_hint: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut body = serde_json::json!({ "image_base64": STANDARD.encode(image) });
        if let Some(hint) = genus_hint {
            body["genus_hint"] = hint.into();
        }

        let response = self
            .router
            .clone()
            .oneshot(
                Request::post("/api/v1/diagnoses")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        read_json(response).await
    }

    /// GET any path. Returns (HTTP status code, response JSON body).
    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = self
            .router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        read_json(response).await
    }
}

async fn read_json(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

// ── Wiremock vision model ─────────────────────────────────────

/// Wire shape of the mocked vendor reply.
#[derive(Debug, Clone, Copy)]
pub enum Dialect {
    Ollama,
    OpenAi,
}

/// Answers each request by recognising which default prompt it carries.
pub struct ScriptedVision {
    dialect: Dialect,
    rows: Vec<(String, String, f64)>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl ScriptedVision {
    pub fn new(dialect: Dialect, rows: Vec<(SchemaId, &str, f64)>) -> Self {
        let prompts = PromptCatalog::default();
        Self {
            dialect,
            rows: rows
                .into_iter()
                .map(|(schema, choice, confidence)| {
                    (prompts.prompt(schema).to_string(), choice.to_string(), confidence)
                })
                .collect(),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Choices served so far, in request order.
    pub fn served(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.seen)
    }

    fn answer_for(&self, body: &serde_json::Value) -> Option<(&str, f64)> {
        let mut texts = Vec::new();
        collect_strings(body, &mut texts);
        self.rows.iter().find_map(|(prompt, choice, confidence)| {
            texts
                .iter()
                .any(|t| t.starts_with(prompt.as_str()))
                .then_some((choice.as_str(), *confidence))
        })
    }
}

fn collect_strings<'a>(value: &'a serde_json::Value, out: &mut Vec<&'a str>) {
    match value {
        serde_json::Value::String(s) => out.push(s),
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        serde_json::Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

impl Respond for ScriptedVision {
    fn respond(&self, request: &wiremock::Request) -> ResponseTemplate {
        let body: serde_json::Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let Some((choice, confidence)) = self.answer_for(&body) else {
            return ResponseTemplate::new(500);
        };
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(choice.to_string());

        let content = serde_json::json!({
            "choice": choice,
            "confidence": confidence,
            "rationale": "scripted",
        })
        .to_string();
        let reply = match self.dialect {
            Dialect::Ollama => serde_json::json!({
                "model": "llava:13b",
                "message": { "role": "assistant", "content": content },
                "done": true,
            }),
            Dialect::OpenAi => serde_json::json!({
                "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }],
            }),
        };
        ResponseTemplate::new(200).set_body_json(reply)
    }
}
