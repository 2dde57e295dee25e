//! Q1–Q6 feature extraction.
//!
//! One call per dimension, all six always asked once the chain reached
//! "abnormal". A dimension whose providers all fail is recorded as unknown
//! and the others still run; only cancellation aborts extraction.

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use pd_inference::{InferenceError, ResilientClient};
use pd_protocol::diagnosis::StageRecord;
use pd_protocol::features::{DimensionReading, FeatureVector};
use pd_protocol::inference::{
    CallOptions, InferenceRequest, InferenceResult, ResponseSchema, SchemaId,
};
use pd_protocol::stages::FeatureDimension;

use crate::error::{DiagnosisError, PipelineResult};
use crate::prompts::PromptCatalog;

/// Extracted vector plus the per-dimension trace.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub features: FeatureVector,
    pub readings: Vec<(FeatureDimension, DimensionReading)>,
    pub stages: Vec<StageRecord>,
}

pub struct FeatureExtractor<'a> {
    client: &'a ResilientClient,
    prompts: &'a PromptCatalog,
    low_confidence_threshold: f64,
    parallel: bool,
    options: CallOptions,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(
        client: &'a ResilientClient,
        prompts: &'a PromptCatalog,
        low_confidence_threshold: f64,
    ) -> Self {
        Self {
            client,
            prompts,
            low_confidence_threshold,
            parallel: false,
            options: CallOptions::default(),
        }
    }

    /// Issue the six calls concurrently.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn extract(
        &self,
        image: &Arc<[u8]>,
        features: FeatureVector,
        cancel: &CancellationToken,
    ) -> PipelineResult<Extraction> {
        let answers: Vec<(FeatureDimension, Result<InferenceResult, InferenceError>)> =
            if self.parallel {
                join_all(
                    FeatureDimension::ALL
                        .iter()
                        .map(|dim| self.ask(*dim, image, cancel)),
                )
                .await
            } else {
                let mut answers = Vec::with_capacity(FeatureDimension::ALL.len());
                for dim in FeatureDimension::ALL {
                    let answer = self.ask(dim, image, cancel).await;
                    if matches!(answer.1, Err(InferenceError::Cancelled)) {
                        return Err(DiagnosisError::Cancelled);
                    }
                    answers.push(answer);
                }
                answers
            };

        if answers
            .iter()
            .any(|(_, r)| matches!(r, Err(InferenceError::Cancelled)))
        {
            return Err(DiagnosisError::Cancelled);
        }

        let mut features = features;
        let mut readings = Vec::with_capacity(answers.len());
        let mut stages = Vec::with_capacity(answers.len());
        for (dim, answer) in answers {
            let schema = SchemaId::Feature(dim);
            let reading = match answer {
                Ok(answer) => {
                    let uncertain = answer.confidence < self.low_confidence_threshold;
                    stages.push(StageRecord::answered(schema, &answer, uncertain));
                    DimensionReading::Observed {
                        value: answer.choice,
                        confidence: answer.confidence,
                        uncertain,
                    }
                }
                Err(e) => {
                    tracing::warn!(dimension = %dim, error = %e, "feature unavailable, recording as unknown");
                    stages.push(StageRecord::failed(schema, e.to_string()));
                    DimensionReading::Unknown {
                        reason: e.to_string(),
                    }
                }
            };
            features = features.with_reading(dim, &reading);
            readings.push((dim, reading));
        }

        tracing::debug!(
            observed = features.observed_count(),
            uncertain = features.uncertain.len(),
            unknown = features.unknown.len(),
            "features extracted"
        );
        Ok(Extraction {
            features,
            readings,
            stages,
        })
    }

    async fn ask(
        &self,
        dim: FeatureDimension,
        image: &Arc<[u8]>,
        cancel: &CancellationToken,
    ) -> (FeatureDimension, Result<InferenceResult, InferenceError>) {
        let schema = SchemaId::Feature(dim);
        let request = InferenceRequest::new(
            self.prompts.prompt(schema),
            Some(Arc::clone(image)),
            ResponseSchema::for_feature(dim),
        )
        .with_options(self.options);
        (dim, self.client.infer(&request, cancel).await)
    }
}
