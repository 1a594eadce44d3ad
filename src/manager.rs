//! Score Manager: the top-level transaction gating, calculating,
//! persisting, invalidating, and reporting progress for one article.

use tracing::warn;

use crate::calculator::ScoreCalculator;
use crate::config::CompositeScoreConfig;
use crate::error::ScoringError;
use crate::llm::{CancelSignal, LLMScore, ResponseCache};
use crate::orchestrator::EnsembleOrchestrator;
use crate::progress::{ProgressRegistry, ProgressStatus};
use crate::repository::{ArticleStatus, Repository};

fn cache_keys(article_id: i64) -> [String; 4] {
    [
        format!("article:{article_id}"),
        format!("ensemble:{article_id}"),
        format!("bias:{article_id}"),
        format!("summary:{article_id}"),
    ]
}

/// Everything the Ensemble Orchestrator needs to gather scores when the
/// caller doesn't already have them.
pub struct GatherRequest {
    pub prompt: String,
    pub primary_key: String,
    pub backup_key: Option<String>,
    pub cancel: Option<CancelSignal>,
}

/// Orchestrates the six steps of §4.G against injected capabilities.
pub struct ScoreManager<'a> {
    pub calculator: &'a dyn ScoreCalculator,
    pub repository: &'a dyn Repository,
    pub cache: &'a ResponseCache,
    pub progress: &'a ProgressRegistry,
}

impl<'a> ScoreManager<'a> {
    pub fn new(
        calculator: &'a dyn ScoreCalculator,
        repository: &'a dyn Repository,
        cache: &'a ResponseCache,
        progress: &'a ProgressRegistry,
    ) -> Self {
        Self {
            calculator,
            repository,
            cache,
            progress,
        }
    }

    /// `UpdateArticleScore(articleID, scores, cfg) -> (composite, confidence, err)`.
    ///
    /// When `scores` is `None`, the manager asks `orchestrator` (and the
    /// accompanying `gather` request) to collect them first via the
    /// Model Router → Provider Client → Response Parser chain.
    pub async fn update_article_score(
        &self,
        article_id: i64,
        scores: Option<Vec<LLMScore>>,
        cfg: &CompositeScoreConfig,
        orchestrator: Option<&EnsembleOrchestrator>,
        gather: Option<GatherRequest>,
    ) -> Result<(f64, f64), ScoringError> {
        let scores = match scores {
            Some(scores) => scores,
            None => {
                let orchestrator = orchestrator.ok_or_else(|| {
                    ScoringError::Repository("no orchestrator available to gather scores".to_string())
                });
                let orchestrator = match orchestrator {
                    Ok(o) => o,
                    Err(err) => {
                        self.fail(article_id, "Gathering", &err).await;
                        return Err(err);
                    }
                };
                let gather = gather.ok_or_else(|| {
                    ScoringError::Repository("no gather request supplied to collect scores".to_string())
                });
                let gather = match gather {
                    Ok(g) => g,
                    Err(err) => {
                        self.fail(article_id, "Gathering", &err).await;
                        return Err(err);
                    }
                };
                match orchestrator
                    .run(
                        article_id,
                        &gather.prompt,
                        cfg,
                        &gather.primary_key,
                        gather.backup_key.as_deref(),
                        gather.cancel,
                    )
                    .await
                {
                    Ok((per_model, _ensemble_summary)) => per_model,
                    Err(err) => {
                        self.fail(article_id, "Gathering", &err).await;
                        return Err(err);
                    }
                }
            }
        };

        // Step 1: zero-confidence gate.
        if !scores.is_empty() && scores.iter().all(|s| s.confidence() == 0.0) {
            let err = ScoringError::ZeroConfidence(
                "all LLMs returned zero confidence".to_string(),
            );
            self.fail(article_id, "Calculating", &err).await;
            return Err(err);
        }

        // Step 2: calculate.
        let (composite, confidence) = match self.calculator.calculate(&scores, cfg) {
            Ok(result) => result,
            Err(err) => {
                self.fail(article_id, "Calculating", &err).await;
                return Err(err);
            }
        };

        // Step 3: persist.
        if let Err(message) = self
            .repository
            .update_article_score_llm(article_id, composite, confidence)
            .await
        {
            let err = ScoringError::Repository(message);
            self.fail(article_id, "Storing", &err).await;
            return Err(err);
        }

        // Step 4: best-effort status write; never blocks the success path.
        if let Err(message) = self
            .repository
            .update_article_status(article_id, ArticleStatus::Scored)
            .await
        {
            warn!(article_id, error = %message, "failed to write scored status after successful score");
        }

        // Step 5: invalidate cache keys.
        for key in cache_keys(article_id) {
            self.cache.delete(&key).await;
        }

        // Step 6: terminal progress.
        self.progress.complete(article_id, composite).await;

        Ok((composite, confidence))
    }

    async fn fail(&self, article_id: i64, step: &str, err: &ScoringError) {
        let status = err.article_status();
        let llm_err = match err {
            ScoringError::Llm(e) => Some(e),
            _ => None,
        };
        self.progress
            .update_progress(article_id, step, err.to_string(), 0, ProgressStatus::Error, llm_err)
            .await;
        if let Err(message) = self.repository.update_article_status(article_id, status).await {
            warn!(article_id, error = %message, "failed to write failure status");
        }
    }
}
