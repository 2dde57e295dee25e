//! Q0 gate chain.
//!
//! `ContentType → PlantCategory → Genus → Organ → Completeness → Abnormality`,
//! one inference call per stage. [`transition`] is the pure state machine;
//! [`GateChain::run`] drives it against the client. Only a categorical
//! answer moves the chain; confidences are recorded, never thresholded.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use pd_inference::ResilientClient;
use pd_protocol::diagnosis::{StageRecord, UnsupportedImage};
use pd_protocol::features::{FeatureVector, GateAnswers};
use pd_protocol::inference::{
    CallOptions, InferenceRequest, InferenceResult, ResponseSchema, SchemaId,
};
use pd_protocol::stages::{
    ACCEPTED_CONTENT_TYPE, ACCEPTED_PLANT_CATEGORY, AbnormalityStatus, GateStage,
};

use crate::error::{DiagnosisError, PipelineResult};
use crate::prompts::PromptCatalog;

/// Where the chain ended.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Rejected(UnsupportedImage),
    Healthy,
    ReadyForFeatureExtraction(FeatureVector),
}

/// Result of feeding one gate answer into the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum GateTransition {
    Continue(GateStage),
    Reject(UnsupportedImage),
    Complete(GateOutcome),
}

/// Advance the chain after `stage` answered `answer`. `answers` already
/// includes this stage.
pub fn transition(
    stage: GateStage,
    answer: &InferenceResult,
    answers: &GateAnswers,
) -> GateTransition {
    let reject = || {
        GateTransition::Reject(UnsupportedImage {
            stage,
            answer: answer.choice.clone(),
            confidence: answer.confidence,
            reasoning: answer.rationale.clone(),
        })
    };

    match stage {
        GateStage::ContentType if answer.choice != ACCEPTED_CONTENT_TYPE => reject(),
        GateStage::PlantCategory if answer.choice != ACCEPTED_PLANT_CATEGORY => reject(),
        GateStage::Abnormality => match AbnormalityStatus::parse(&answer.choice) {
            Some(AbnormalityStatus::Healthy) => GateTransition::Complete(GateOutcome::Healthy),
            Some(AbnormalityStatus::Abnormal) => match FeatureVector::from_gates(answers) {
                Some(features) => {
                    GateTransition::Complete(GateOutcome::ReadyForFeatureExtraction(features))
                }
                None => reject(),
            },
            None => reject(),
        },
        _ => match stage.next() {
            Some(next) => GateTransition::Continue(next),
            None => reject(),
        },
    }
}

/// Gate chain outcome plus everything observed on the way.
#[derive(Debug, Clone)]
pub struct GateRun {
    pub outcome: GateOutcome,
    pub answers: GateAnswers,
    pub stages: Vec<StageRecord>,
}

/// Drives the gate chain against the resilient client.
pub struct GateChain<'a> {
    client: &'a ResilientClient,
    prompts: &'a PromptCatalog,
    genus_schema: ResponseSchema,
    options: CallOptions,
}

impl<'a> GateChain<'a> {
    /// `known_genera` (plus "other") are suggested to the genus gate; any
    /// other genus is accepted as answered.
    pub fn new(
        client: &'a ResilientClient,
        prompts: &'a PromptCatalog,
        known_genera: Vec<String>,
    ) -> Self {
        Self {
            client,
            prompts,
            genus_schema: ResponseSchema::genus(known_genera),
            options: CallOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    fn schema(&self, stage: GateStage) -> ResponseSchema {
        ResponseSchema::for_gate(stage).unwrap_or_else(|| self.genus_schema.clone())
    }

    /// Run the chain. Any gate exhausting its providers fails the whole run.
    pub async fn run(
        &self,
        image: &Arc<[u8]>,
        cancel: &CancellationToken,
    ) -> PipelineResult<GateRun> {
        let mut answers = GateAnswers::new();
        let mut stages = Vec::with_capacity(GateStage::ALL.len());
        let mut stage = GateStage::ContentType;

        loop {
            let schema = SchemaId::Gate(stage);
            let request = InferenceRequest::new(
                self.prompts.prompt(schema),
                Some(Arc::clone(image)),
                self.schema(stage),
            )
            .with_options(self.options);
            let answer = self
                .client
                .infer(&request, cancel)
                .await
                .map_err(|e| DiagnosisError::from_inference(schema, e))?;

            tracing::debug!(
                stage = %stage,
                choice = %answer.choice,
                confidence = answer.confidence,
                provider = %answer.provider,
                cached = answer.from_cache,
                "gate answered"
            );
            answers.record(stage, answer.choice.clone(), answer.confidence);
            stages.push(StageRecord::answered(schema, &answer, false));

            let outcome = match transition(stage, &answer, &answers) {
                GateTransition::Continue(next) => {
                    stage = next;
                    continue;
                }
                GateTransition::Reject(rejection) => {
                    tracing::info!(
                        stage = %rejection.stage,
                        answer = %rejection.answer,
                        "image rejected by gate"
                    );
                    GateOutcome::Rejected(rejection)
                }
                GateTransition::Complete(outcome) => outcome,
            };

            return Ok(GateRun {
                outcome,
                answers,
                stages,
            });
        }
    }
}
