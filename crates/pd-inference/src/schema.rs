//! Canonical-schema validation of vendor output.
//!
//! Vendors return the answer as free text that should contain one JSON
//! object. The payload is extracted, parsed and checked against the
//! request's [`ResponseSchema`]; anything missing or out of range is a
//! [`ProviderError::SchemaValidation`], never silently coerced.

use serde::Deserialize;

use pd_protocol::inference::{AlternateChoice, ChoiceSet, InferenceResult, ResponseSchema};
use pd_protocol::stages::normalize_value;

use crate::error::{ProviderError, ProviderResult};

/// Expected JSON shape from the model, before validation.
#[derive(Debug, Deserialize)]
struct RawAnswer {
    #[serde(default, alias = "answer", alias = "label")]
    choice: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default, alias = "reasoning", alias = "explanation")]
    rationale: Option<String>,
    #[serde(default, alias = "alternate_choices", alias = "alternatives")]
    alternates: Option<Vec<RawAlternate>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAlternate {
    Plain(String),
    Scored {
        #[serde(alias = "answer", alias = "label")]
        choice: String,
        #[serde(default)]
        confidence: Option<f64>,
    },
}

impl From<RawAlternate> for AlternateChoice {
    fn from(raw: RawAlternate) -> Self {
        match raw {
            RawAlternate::Plain(choice) => AlternateChoice {
                choice,
                confidence: None,
            },
            RawAlternate::Scored { choice, confidence } => AlternateChoice { choice, confidence },
        }
    }
}

/// Extract JSON from model output that may be wrapped in markdown code
/// blocks or surrounded by prose.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    // Try ```json ... ``` first
    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    // Try ``` ... ```
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    // Outermost braces inside prose
    if let (Some(open), Some(close)) = (trimmed.find('{'), trimmed.rfind('}'))
        && open < close
    {
        return &trimmed[open..=close];
    }

    // Assume raw JSON
    trimmed
}

/// Parse vendor text into a schema-valid result.
pub fn parse_answer(
    text: &str,
    schema: &ResponseSchema,
    provider: &str,
) -> ProviderResult<InferenceResult> {
    let json = extract_json(text);
    let raw: RawAnswer = serde_json::from_str(json).map_err(|e| {
        ProviderError::SchemaValidation(format!(
            "{} payload is not valid JSON: {e}",
            schema.id
        ))
    })?;
    validate(raw, schema, provider)
}

fn validate(
    raw: RawAnswer,
    schema: &ResponseSchema,
    provider: &str,
) -> ProviderResult<InferenceResult> {
    let invalid = |msg: String| ProviderError::SchemaValidation(format!("{}: {msg}", schema.id));

    let choice = raw
        .choice
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| invalid("missing required field 'choice'".into()))?;

    let confidence = raw
        .confidence
        .ok_or_else(|| invalid("missing required field 'confidence'".into()))?;
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(invalid(format!("confidence {confidence} outside [0, 1]")));
    }

    let choice = match &schema.choices {
        ChoiceSet::Enumerated(values) => canonical_choice(&choice, values)
            .ok_or_else(|| invalid(format!("choice '{choice}' is not an allowed value")))?,
        ChoiceSet::Suggested(values) => canonical_choice(&choice, values).unwrap_or(choice),
        ChoiceSet::FreeText => choice,
    };

    Ok(InferenceResult {
        choice,
        confidence,
        rationale: raw
            .rationale
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
        alternates: raw
            .alternates
            .map(|alts| alts.into_iter().map(AlternateChoice::from).collect()),
        provider: provider.to_string(),
        from_cache: false,
    })
}

/// Map a model answer onto the schema's canonical spelling.
fn canonical_choice(choice: &str, allowed: &[String]) -> Option<String> {
    let wanted = normalize_value(choice);
    allowed
        .iter()
        .find(|value| normalize_value(value) == wanted)
        .cloned()
}
