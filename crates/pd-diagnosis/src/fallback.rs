//! Open-ended fallback diagnosis.
//!
//! Used when genus pruning leaves nothing to score or the best candidate
//! misses every tier. The answer is free text and always flagged as coming
//! from outside the knowledge base.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use pd_inference::ResilientClient;
use pd_protocol::diagnosis::{FallbackCause, FallbackReport, StageRecord};
use pd_protocol::features::FeatureVector;
use pd_protocol::inference::{CallOptions, InferenceRequest, ResponseSchema, SchemaId};
use pd_protocol::stages::FeatureDimension;

use crate::error::{DiagnosisError, PipelineResult};
use crate::prompts::PromptCatalog;

pub struct FallbackController<'a> {
    client: &'a ResilientClient,
    prompts: &'a PromptCatalog,
    options: CallOptions,
}

impl<'a> FallbackController<'a> {
    pub fn new(client: &'a ResilientClient, prompts: &'a PromptCatalog) -> Self {
        Self {
            client,
            prompts,
            options: CallOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    /// Ask for an open-ended diagnosis. Exhausting every provider here is a
    /// hard failure of the request.
    pub async fn run(
        &self,
        image: &Arc<[u8]>,
        cause: FallbackCause,
        features: &FeatureVector,
        cancel: &CancellationToken,
    ) -> PipelineResult<(FallbackReport, StageRecord)> {
        let schema = SchemaId::OpenDiagnosis;
        let prompt = format!(
            "{}\n\nObservations so far:\n{}",
            self.prompts.prompt(schema),
            describe(features)
        );
        let request =
            InferenceRequest::new(prompt, Some(Arc::clone(image)), ResponseSchema::open_diagnosis())
                .with_options(self.options);

        let answer = self
            .client
            .infer(&request, cancel)
            .await
            .map_err(|e| DiagnosisError::from_inference(schema, e))?;

        tracing::info!(
            cause = ?cause,
            suspected = %answer.choice,
            confidence = answer.confidence,
            provider = %answer.provider,
            "open-ended fallback answered"
        );

        let stage = StageRecord::answered(schema, &answer, false);
        let report = FallbackReport {
            cause,
            narrative: answer
                .rationale
                .clone()
                .unwrap_or_else(|| answer.choice.clone()),
            suspected_cause: answer.choice,
            confidence: answer.confidence,
            outside_knowledge_base: true,
            suggestion: Some(suggestion(cause, &features.genus)),
        };
        Ok((report, stage))
    }
}

fn suggestion(cause: FallbackCause, genus: &str) -> String {
    match cause {
        FallbackCause::NoKnowledgeForGenus => format!(
            "The knowledge base has no diseases recorded for genus '{genus}'. \
             Add entries for this genus to get knowledge-based diagnoses."
        ),
        FallbackCause::InsufficientScore => format!(
            "No recorded disease of '{genus}' matched the observed features closely enough. \
             Consider extending the knowledge base or retaking the photo with the symptoms in focus."
        ),
    }
}

/// Plain-text summary of the gate answers and observed features.
fn describe(features: &FeatureVector) -> String {
    let mut lines = vec![
        format!("- genus: {}", features.genus),
        format!("- organ: {}", features.organ),
        format!("- view: {}", features.completeness.as_str()),
    ];
    for dim in FeatureDimension::ALL {
        let value = match features.dimension(dim) {
            Some(v) if features.uncertain.contains(&dim) => format!("{v} (uncertain)"),
            Some(v) => v.to_string(),
            None => "unknown".to_string(),
        };
        lines.push(format!("- {dim}: {value}"));
    }
    lines.join("\n")
}
