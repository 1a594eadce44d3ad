//! Extracts `(score, explanation, confidence)` from a provider's chat
//! completion response body.

use serde::{Deserialize, Serialize};

use crate::error::LLMApiError;

/// Result of successfully parsing a provider response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedScore {
    pub score: f64,
    pub explanation: String,
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionBody {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct InnerScore {
    score: f64,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    confidence: f64,
}

/// Strip a leading/trailing code fence (``` or ```json) and surrounding
/// whitespace from model output.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let without_prefix = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_prefix.strip_suffix("```").unwrap_or(without_prefix).trim()
}

/// Parse a provider's raw JSON response body into a [`ParsedScore`].
///
/// Never returns a `rate_limit`-class error: every failure here is a
/// decode failure, retried (if at all) only by the ensemble
/// orchestrator's own attempt budget, never by the model router.
pub fn parse_provider_response(body: &str) -> Result<ParsedScore, LLMApiError> {
    let decoded: ChatCompletionBody =
        serde_json::from_str(body).map_err(|e| LLMApiError::decode(format!("no_choices: {e}")))?;

    let first_choice = decoded
        .choices
        .first()
        .ok_or_else(|| LLMApiError::decode("no_choices"))?;

    let inner = strip_code_fence(&first_choice.message.content);

    let parsed: InnerScore =
        serde_json::from_str(inner).map_err(|e| LLMApiError::decode(format!("inner_decode: {e}")))?;

    Ok(ParsedScore {
        score: parsed.score,
        explanation: parsed.explanation,
        confidence: parsed.confidence,
    })
}
