//! End-to-end diagnosis pipeline.
//!
//! Gate chain, feature extraction, genus pruning and scoring, tiering, and
//! the open-ended fallback, run under one per-request deadline and the
//! caller's cancellation token.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use pd_inference::ResilientClient;
use pd_knowledge::{KnowledgeBase, MatchError, ScoringWeights, rank};
use pd_protocol::diagnosis::{
    DiagnosisResult, DiagnosisTier, FallbackCause, RankedCandidate, StageRecord,
};
use pd_protocol::features::FeatureVector;
use pd_protocol::stages::GateStage;

use crate::config::DiagnosisConfig;
use crate::error::{DiagnosisError, PipelineResult};
use crate::fallback::FallbackController;
use crate::features::FeatureExtractor;
use crate::gates::{GateChain, GateOutcome};
use crate::prompts::PromptCatalog;
use crate::tiering::{TierDecision, classify};

/// One image to diagnose.
#[derive(Debug, Clone)]
pub struct DiagnosisRequest {
    pub image: Arc<[u8]>,
    /// Caller's guess at the genus. Recorded and compared, never used to prune.
    pub genus_hint: Option<String>,
}

impl DiagnosisRequest {
    pub fn new(image: impl Into<Arc<[u8]>>) -> Self {
        Self {
            image: image.into(),
            genus_hint: None,
        }
    }

    pub fn with_genus_hint(mut self, genus: impl Into<String>) -> Self {
        self.genus_hint = Some(genus.into());
        self
    }
}

pub struct DiagnosisEngine {
    client: ResilientClient,
    kb: Arc<KnowledgeBase>,
    config: DiagnosisConfig,
    prompts: PromptCatalog,
    weights: ScoringWeights,
}

impl DiagnosisEngine {
    pub fn new(
        client: ResilientClient,
        kb: Arc<KnowledgeBase>,
        config: DiagnosisConfig,
    ) -> PipelineResult<Self> {
        let threshold = config.low_confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(DiagnosisError::Config(format!(
                "low_confidence_threshold {threshold} is outside [0, 1]"
            )));
        }
        let t = &config.thresholds;
        if t.suspected_score > t.confirmed_score {
            return Err(DiagnosisError::Config(format!(
                "suspected_score {} exceeds confirmed_score {}",
                t.suspected_score, t.confirmed_score
            )));
        }
        if config.request_timeout_secs == 0 {
            return Err(DiagnosisError::Config(
                "request_timeout_secs must be positive".into(),
            ));
        }
        let prompts = PromptCatalog::with_overrides(&config.prompts)?;

        Ok(Self {
            client,
            kb,
            config,
            prompts,
            weights: ScoringWeights::default(),
        })
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn config(&self) -> &DiagnosisConfig {
        &self.config
    }

    /// Diagnose one image.
    ///
    /// Rejections, healthy images and knowledge gaps come back as results.
    /// Errors are reserved for an exhausted gate or fallback call, the
    /// request deadline, caller cancellation and an empty payload.
    pub async fn diagnose(
        &self,
        request: DiagnosisRequest,
        cancel: &CancellationToken,
    ) -> PipelineResult<DiagnosisResult> {
        if request.image.is_empty() {
            return Err(DiagnosisError::EmptyImage);
        }

        let diagnosis_id = Uuid::now_v7();
        let started = Instant::now();
        let token = cancel.child_token();
        let timeout = self.config.request_timeout();
        let span = tracing::info_span!("diagnosis", %diagnosis_id);

        let outcome =
            tokio::time::timeout(timeout, self.run(&request, &token).instrument(span.clone()))
                .await;
        let mut result = match outcome {
            Ok(result) => result?,
            Err(_) => {
                token.cancel();
                let timeout_ms = timeout.as_millis() as u64;
                span.in_scope(|| tracing::warn!(timeout_ms, "diagnosis deadline exceeded"));
                return Err(DiagnosisError::DeadlineExceeded { timeout_ms });
            }
        };

        result.diagnosis_id = diagnosis_id;
        result.execution_time_ms = started.elapsed().as_millis() as u64;
        span.in_scope(|| {
            tracing::info!(
                tier = ?result.tier,
                chosen = result.chosen_disease.as_ref().map(|d| d.disease_id.as_str()),
                stages = result.stages.len(),
                elapsed_ms = result.execution_time_ms,
                "diagnosis complete"
            )
        });
        Ok(result)
    }

    async fn run(
        &self,
        request: &DiagnosisRequest,
        cancel: &CancellationToken,
    ) -> PipelineResult<DiagnosisResult> {
        let image = &request.image;
        let options = self.config.call_options();
        let gates = GateChain::new(&self.client, &self.prompts, self.kb.known_genera())
            .with_options(options)
            .run(image, cancel)
            .await?;

        let mut stages = gates.stages;
        let mean_gate_confidence = gates.answers.mean_confidence();
        let genus_hint_confirmed = match (&request.genus_hint, gates.answers.choice(GateStage::Genus)) {
            (Some(hint), Some(genus)) => Some(hint.trim().eq_ignore_ascii_case(genus)),
            _ => None,
        };

        let mut result = match gates.outcome {
            GateOutcome::Rejected(rejection) => {
                let mut result = DiagnosisResult::new(
                    DiagnosisTier::Rejected,
                    format!(
                        "unsupported image: {} gate answered '{}'",
                        rejection.stage, rejection.answer
                    ),
                );
                result.rejection = Some(rejection);
                result
            }
            GateOutcome::Healthy => {
                DiagnosisResult::new(DiagnosisTier::Healthy, "no disease symptoms detected")
            }
            GateOutcome::ReadyForFeatureExtraction(features) => {
                let extraction = FeatureExtractor::new(
                    &self.client,
                    &self.prompts,
                    self.config.low_confidence_threshold,
                )
                .parallel(self.config.parallel_features)
                .with_options(options)
                .extract(image, features, cancel)
                .await?;
                stages.extend(extraction.stages);
                self.score(image, extraction.features, &mut stages, cancel)
                    .await?
            }
        };

        result.stages = stages;
        result.mean_gate_confidence = mean_gate_confidence;
        result.genus_hint = request.genus_hint.clone();
        result.genus_hint_confirmed = genus_hint_confirmed;
        Ok(result)
    }

    /// Prune, rank and tier; route to the fallback when nothing qualifies.
    async fn score(
        &self,
        image: &Arc<[u8]>,
        features: FeatureVector,
        stages: &mut Vec<StageRecord>,
        cancel: &CancellationToken,
    ) -> PipelineResult<DiagnosisResult> {
        let thresholds = &self.config.thresholds;
        let cause = match rank(&features, &self.kb, &self.weights) {
            Ok(ranked) => {
                let top = &ranked[0];
                match classify(&top.score, thresholds) {
                    TierDecision::Confirmed => {
                        let mut result = DiagnosisResult::new(
                            DiagnosisTier::Confirmed,
                            format!(
                                "confirmed: {} ({:.2})",
                                top.disease.display_name, top.score.total_score
                            ),
                        );
                        result.chosen_disease = Some(top.disease.into());
                        result.score = Some(top.score.clone());
                        result.candidates = vec![RankedCandidate::from(top)];
                        result.features = Some(features);
                        return Ok(result);
                    }
                    TierDecision::Suspected => {
                        let mut result = DiagnosisResult::new(
                            DiagnosisTier::Suspected,
                            format!(
                                "suspected: {} ({:.2})",
                                top.disease.display_name, top.score.total_score
                            ),
                        );
                        result.score = Some(top.score.clone());
                        result.candidates = ranked
                            .iter()
                            .take(thresholds.suspected_max_candidates.max(1))
                            .map(RankedCandidate::from)
                            .collect();
                        result.features = Some(features);
                        return Ok(result);
                    }
                    TierDecision::Fallback => {
                        tracing::info!(
                            top = %top.disease.disease_id,
                            score = top.score.total_score,
                            major_matched = top.score.major_matched_count,
                            "no candidate reached a tier"
                        );
                        FallbackCause::InsufficientScore
                    }
                }
            }
            Err(MatchError::NoKnowledgeForGenus { genus }) => {
                tracing::info!(%genus, "no knowledge for genus");
                FallbackCause::NoKnowledgeForGenus
            }
        };

        let (report, stage) = FallbackController::new(&self.client, &self.prompts)
            .with_options(self.config.call_options())
            .run(image, cause, &features, cancel)
            .await?;
        stages.push(stage);

        let mut result = DiagnosisResult::new(
            DiagnosisTier::Fallback,
            format!("outside knowledge base: {}", report.suspected_cause),
        );
        result.fallback = Some(report);
        result.features = Some(features);
        Ok(result)
    }
}
