//! Ensemble Orchestrator: per-model retry-to-quorum loop plus
//! cross-model aggregation.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{instrument, warn};

use crate::config::CompositeScoreConfig;
use crate::error::{LLMApiError, ScoringError};
use crate::llm::{
    CancelSignal, LLMScore, ModelRouter, ParsedScore, ProviderCallConfig, ProviderClient,
    ScoreMetadata,
};

/// Minimum number of high-confidence responses required per model.
pub const MIN_VALID: usize = 5;
/// Attempt ceiling per model.
pub const MAX_ATTEMPTS: usize = 20;
/// A response is high-confidence when `confidence >= CONFIDENCE_THRESHOLD`.
pub const CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Prompt framing tried, in order, for each attempt (cycling once all
/// four have been tried).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    Default,
    LeftFocus,
    CenterFocus,
    RightFocus,
}

const PROMPT_VARIANTS: [PromptVariant; 4] = [
    PromptVariant::Default,
    PromptVariant::LeftFocus,
    PromptVariant::CenterFocus,
    PromptVariant::RightFocus,
];

impl PromptVariant {
    fn apply(&self, base_prompt: &str) -> String {
        match self {
            Self::Default => base_prompt.to_string(),
            Self::LeftFocus => format!("{base_prompt}\n\nFocus your analysis on left-leaning framing."),
            Self::CenterFocus => format!("{base_prompt}\n\nFocus your analysis on centrist framing."),
            Self::RightFocus => format!("{base_prompt}\n\nFocus your analysis on right-leaning framing."),
        }
    }
}

/// Per-model statistics over the accepted (high-confidence) attempts.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PerModelAggregation {
    pub mean: f64,
    pub weighted_mean: f64,
    pub variance: f64,
    pub count: usize,
}

fn aggregate_attempts(accepted: &[ParsedScore]) -> PerModelAggregation {
    let count = accepted.len();
    if count == 0 {
        return PerModelAggregation {
            mean: 0.0,
            weighted_mean: 0.0,
            variance: 0.0,
            count: 0,
        };
    }

    let sum: f64 = accepted.iter().map(|a| a.score).sum();
    let mean = sum / count as f64;

    let weighted_sum: f64 = accepted.iter().map(|a| a.score * a.confidence).sum();
    let confidence_sum: f64 = accepted.iter().map(|a| a.confidence).sum();
    let weighted_mean = weighted_sum / confidence_sum.max(1e-6);

    let variance = accepted
        .iter()
        .map(|a| (a.score - mean).powi(2))
        .sum::<f64>()
        / count as f64;

    PerModelAggregation {
        mean,
        weighted_mean,
        variance,
        count,
    }
}

/// Cross-model aggregation over every model's [`PerModelAggregation`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FinalAggregation {
    pub weighted_mean: f64,
    pub variance: f64,
    pub uncertainty_flag: bool,
}

fn final_aggregate(per_model: &[PerModelAggregation], num_models: usize) -> FinalAggregation {
    let count_total: f64 = per_model.iter().map(|p| p.count as f64).sum();
    let weighted_mean = if count_total <= 0.0 {
        0.0
    } else {
        per_model.iter().map(|p| p.weighted_mean * p.count as f64).sum::<f64>() / count_total
    };
    let variance = if count_total <= 0.0 {
        0.0
    } else {
        per_model.iter().map(|p| p.variance * p.count as f64).sum::<f64>() / count_total
    };

    let average_fill = if num_models == 0 {
        0.0
    } else {
        count_total / (num_models as f64 * MIN_VALID as f64)
    };
    let uncertainty_flag = variance > 0.1 || average_fill < 0.5;

    FinalAggregation {
        weighted_mean,
        variance,
        uncertainty_flag,
    }
}

/// Drives the ensemble for a single article: fan out across every
/// configured model concurrently, retry each to quorum, aggregate.
pub struct EnsembleOrchestrator {
    client: Arc<dyn ProviderClient>,
    call_cfg: ProviderCallConfig,
}

impl EnsembleOrchestrator {
    pub fn new(client: Arc<dyn ProviderClient>) -> Self {
        Self {
            client,
            call_cfg: ProviderCallConfig::default(),
        }
    }

    pub fn with_call_config(mut self, call_cfg: ProviderCallConfig) -> Self {
        self.call_cfg = call_cfg;
        self
    }

    /// Retry-to-quorum loop for one configured model. Returns both the
    /// aggregation and the accepted sub-results it was computed from, so
    /// callers can embed every sub-result in the ensemble summary.
    #[instrument(skip(self, primary_key, backup_key, cfg, prompt, cancel), fields(model = %model))]
    async fn run_model(
        &self,
        model: &str,
        primary_key: &str,
        backup_key: Option<&str>,
        cfg: &CompositeScoreConfig,
        prompt: &str,
        cancel: Option<CancelSignal>,
    ) -> Result<(PerModelAggregation, Vec<ParsedScore>), LLMApiError> {
        let mut accepted = Vec::with_capacity(MIN_VALID);

        for attempt in 0..MAX_ATTEMPTS {
            if accepted.len() >= MIN_VALID {
                break;
            }
            let variant = PROMPT_VARIANTS[attempt % PROMPT_VARIANTS.len()];
            let variant_prompt = variant.apply(prompt);

            let body = ModelRouter::route(
                self.client.as_ref(),
                primary_key,
                backup_key,
                cfg,
                model,
                &variant_prompt,
                &self.call_cfg,
                cancel.clone(),
            )
            .await?;

            match crate::llm::parse_provider_response(&body) {
                Ok(parsed) if parsed.confidence >= CONFIDENCE_THRESHOLD => {
                    accepted.push(parsed);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(%model, error = %err, "response parse failed, discarding attempt");
                }
            }
        }

        if accepted.is_empty() {
            return Err(LLMApiError::decode(format!(
                "model {model} yielded zero high-confidence responses after {MAX_ATTEMPTS} attempts"
            )));
        }

        let agg = aggregate_attempts(&accepted);
        Ok((agg, accepted))
    }

    /// Run the full ensemble, producing one [`LLMScore`] per
    /// participating model (fed to the Composite Calculator) plus the
    /// packaged ensemble summary score.
    pub async fn run(
        &self,
        article_id: i64,
        prompt: &str,
        cfg: &CompositeScoreConfig,
        primary_key: &str,
        backup_key: Option<&str>,
        cancel: Option<CancelSignal>,
    ) -> Result<(Vec<LLMScore>, LLMScore), ScoringError> {
        let futures = cfg.models.iter().map(|model_cfg| {
            let model = model_cfg.model_name.clone();
            let cancel = cancel.clone();
            async move {
                self.run_model(&model, primary_key, backup_key, cfg, prompt, cancel)
                    .await
            }
        });

        let results = join_all(futures).await;

        let mut per_model_scores = Vec::new();
        let mut per_model_aggregations = Vec::new();
        let mut sub_results = serde_json::Map::new();

        for (model_cfg, result) in cfg.models.iter().zip(results.into_iter()) {
            match result {
                Ok((agg, accepted)) => {
                    per_model_scores.push(LLMScore::new(
                        article_id,
                        model_cfg.model_name.clone(),
                        agg.weighted_mean,
                        ScoreMetadata {
                            confidence: (agg.count as f64 / MIN_VALID as f64).min(1.0),
                            explanation: None,
                            provider: None,
                        },
                    ));
                    sub_results.insert(
                        model_cfg.model_name.clone(),
                        serde_json::to_value(&accepted).unwrap_or(serde_json::Value::Null),
                    );
                    per_model_aggregations.push(agg);
                }
                Err(err) => {
                    warn!(model = %model_cfg.model_name, error = %err, "model dropped from ensemble");
                }
            }
        }

        if per_model_scores.is_empty() {
            return Err(ScoringError::AllPerspectivesInvalid);
        }

        let final_agg = final_aggregate(&per_model_aggregations, cfg.models.len());

        let metadata = serde_json::json!({
            "sub_results": sub_results,
            "per_model": per_model_aggregations,
            "final": final_agg,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let ensemble_summary = LLMScore {
            article_id,
            model: "ensemble".to_string(),
            score: final_agg.weighted_mean,
            metadata: metadata.to_string(),
            created_at: chrono::Utc::now(),
        };

        Ok((per_model_scores, ensemble_summary))
    }
}
