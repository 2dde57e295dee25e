//! E2E diagnosis scenarios through the full engine: gates, features,
//! scoring, tiering and fallback.

mod helpers;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use helpers::{ROSE_LEAF, black_spot, engine, rose_gates};
use pd_diagnosis::DiagnosisRequest;
use pd_inference::{MockProvider, ProviderError, ResilientClient};
use pd_protocol::diagnosis::{DiagnosisTier, FallbackCause, MatchKind};
use pd_protocol::inference::SchemaId;
use pd_protocol::stages::{FeatureDimension, GateStage};

fn request() -> DiagnosisRequest {
    DiagnosisRequest::new(ROSE_LEAF)
}

/// Rosa with necrotic black spots and yellow halos is confirmed as black spot.
#[tokio::test]
async fn e2e_black_spot_confirmed() {
    let mock = Arc::new(black_spot("vision"));
    let result = engine(ResilientClient::new(vec![mock.clone()]))
        .diagnose(request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.tier, DiagnosisTier::Confirmed);
    assert_eq!(result.chosen_disease.as_ref().unwrap().disease_id, "rose_black_spot");
    assert_eq!(
        result.chosen_disease.as_ref().unwrap().pathogen.scientific_name.as_deref(),
        Some("Diplocarpon rosae")
    );

    let score = result.score.as_ref().unwrap();
    assert_eq!(score.major_matched_count, 2);
    assert_eq!(score.major_total_count, 2);
    assert!(score.total_score >= 0.85);
    assert!(score
        .matches
        .iter()
        .all(|m| m.kind == MatchKind::Exact));

    let features = result.features.as_ref().unwrap();
    assert_eq!(features.genus, "Rosa");
    assert_eq!(features.symptom_type.as_deref(), Some("necrosis_spot"));

    // Six gates then six features, every call attributed to the provider.
    assert_eq!(result.stages.len(), 12);
    assert!(result.stages.iter().all(|s| s.provider.as_deref() == Some("vision")));
    assert_eq!(result.stages[0].schema, SchemaId::Gate(GateStage::ContentType));
    assert_eq!(
        result.stages[11].schema,
        SchemaId::Feature(FeatureDimension::Distribution)
    );
}

/// A photo of an animal stops at the first gate.
#[tokio::test]
async fn e2e_animal_rejected_at_first_gate() {
    let mock = Arc::new(
        MockProvider::new("vision").answer_with_rationale(
            SchemaId::Gate(GateStage::ContentType),
            "animal",
            0.97,
            "a tabby cat",
        ),
    );
    let result = engine(ResilientClient::new(vec![mock.clone()]))
        .diagnose(request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.tier, DiagnosisTier::Rejected);
    let rejection = result.rejection.unwrap();
    assert_eq!(rejection.stage, GateStage::ContentType);
    assert_eq!(rejection.reasoning.as_deref(), Some("a tabby cat"));

    for stage in [
        GateStage::Genus,
        GateStage::Organ,
        GateStage::Completeness,
        GateStage::Abnormality,
    ] {
        assert_eq!(mock.calls_for(SchemaId::Gate(stage)), 0, "{stage} was invoked");
    }
}

/// A vegetable is a plant but not a flower.
#[tokio::test]
async fn e2e_non_flower_rejected_at_category_gate() {
    let mock = Arc::new(
        rose_gates("vision").answer(SchemaId::Gate(GateStage::PlantCategory), "vegetable", 0.8),
    );
    let result = engine(ResilientClient::new(vec![mock.clone()]))
        .diagnose(request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.tier, DiagnosisTier::Rejected);
    assert_eq!(result.rejection.unwrap().stage, GateStage::PlantCategory);
    assert_eq!(mock.call_count(), 2);
}

/// Healthy tissue never reaches feature extraction.
#[tokio::test]
async fn e2e_healthy_short_circuit() {
    let mock = Arc::new(
        black_spot("vision").answer(SchemaId::Gate(GateStage::Abnormality), "healthy", 0.93),
    );
    let result = engine(ResilientClient::new(vec![mock.clone()]))
        .diagnose(request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.tier, DiagnosisTier::Healthy);
    for dim in FeatureDimension::ALL {
        assert_eq!(mock.calls_for(SchemaId::Feature(dim)), 0);
    }
    assert!(result.chosen_disease.is_none());
    assert_eq!(result.stages.len(), 6);
}

/// A genus outside the knowledge base goes straight to the open-ended fallback.
#[tokio::test]
async fn e2e_unknown_genus_fallback() {
    let mock = Arc::new(
        black_spot("vision")
            .answer(SchemaId::Gate(GateStage::Genus), "other", 0.55)
            .answer_with_rationale(
                SchemaId::OpenDiagnosis,
                "Camellia leaf gall",
                0.45,
                "swollen pale tissue on new growth",
            ),
    );
    let result = engine(ResilientClient::new(vec![mock.clone()]))
        .diagnose(request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.tier, DiagnosisTier::Fallback);
    let report = result.fallback.unwrap();
    assert_eq!(report.cause, FallbackCause::NoKnowledgeForGenus);
    assert!(report.outside_knowledge_base);
    assert_eq!(report.suspected_cause, "Camellia leaf gall");
    assert!(result.candidates.is_empty());
    assert_eq!(mock.calls_for(SchemaId::OpenDiagnosis), 1);
}

/// A close-up drags an otherwise perfect match below the confirmed bar.
#[tokio::test]
async fn e2e_close_up_is_suspected() {
    let mock = Arc::new(
        black_spot("vision").answer(SchemaId::Gate(GateStage::Completeness), "close_up", 0.9),
    );
    let result = engine(ResilientClient::new(vec![mock]))
        .diagnose(request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.tier, DiagnosisTier::Suspected);
    assert!(result.candidates.len() <= 3);
    assert_eq!(result.candidates[0].disease.disease_id, "rose_black_spot");
    assert!((result.candidates[0].score.completeness_modifier - 0.6).abs() < 1e-9);
}

/// One dimension's outage is recorded as unknown; the diagnosis still completes.
#[tokio::test]
async fn e2e_feature_outage_is_isolated() {
    let mock = Arc::new(black_spot("vision").fail(
        SchemaId::Feature(FeatureDimension::Size),
        ProviderError::Timeout { timeout_ms: 30_000 },
    ));
    let result = engine(ResilientClient::new(vec![mock]))
        .diagnose(request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.tier, DiagnosisTier::Confirmed);
    let features = result.features.unwrap();
    assert!(features.unknown.contains(&FeatureDimension::Size));
    let size_stage = result
        .stages
        .iter()
        .find(|s| s.schema == SchemaId::Feature(FeatureDimension::Size))
        .unwrap();
    assert!(size_stage.error.as_deref().unwrap().contains("timed out"));
}

/// Low-confidence answers are kept but flagged.
#[tokio::test]
async fn e2e_low_confidence_feature_flagged() {
    let mock = Arc::new(
        black_spot("vision").answer(SchemaId::Feature(FeatureDimension::ColorBorder), "yellow", 0.3),
    );
    let result = engine(ResilientClient::new(vec![mock]))
        .diagnose(request(), &CancellationToken::new())
        .await
        .unwrap();

    let features = result.features.unwrap();
    assert!(features.uncertain.contains(&FeatureDimension::ColorBorder));
    assert_eq!(features.color_border.as_deref(), Some("yellow"));
    assert_eq!(result.tier, DiagnosisTier::Confirmed);
}
