//! Progress Registry: thread-safe `articleID -> ProgressState` map with
//! periodic eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::LLMApiError;

const SUCCESS_ERROR_TTL_SECS: i64 = 300;
const IN_PROGRESS_TTL_SECS: i64 = 1800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ProgressStatus {
    InProgress,
    Success,
    Error,
}

/// Snapshot of a single article's scoring progress. Readers receive a
/// clone, never a live reference, so there is no torn-read hazard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressState {
    pub step: String,
    pub message: String,
    pub percent: u8,
    pub status: ProgressStatus,
    pub error: Option<String>,
    pub error_details: Option<serde_json::Value>,
    pub final_score: Option<f64>,
    pub last_updated: i64,
}

impl ProgressState {
    pub fn new(step: impl Into<String>, message: impl Into<String>, percent: u8) -> Self {
        Self {
            step: step.into(),
            message: message.into(),
            percent,
            status: ProgressStatus::InProgress,
            error: None,
            error_details: None,
            final_score: None,
            last_updated: now_unix(),
        }
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Thread-safe `articleID -> ProgressState` map, created empty.
pub struct ProgressRegistry {
    states: Arc<RwLock<HashMap<i64, ProgressState>>>,
}

impl ProgressRegistry {
    /// Construct with a background sweeper running on `cleanup_interval`.
    /// The sweeper runs until the registry's last `Arc` clone is
    /// dropped; there is no close method.
    pub fn new(cleanup_interval: Duration) -> Self {
        let states = Arc::new(RwLock::new(HashMap::new()));
        spawn_sweeper(Arc::downgrade(&states), cleanup_interval);
        Self { states }
    }

    /// Construct without spawning a sweeper, for tests that want to
    /// drive eviction manually via [`ProgressRegistry::sweep_once`].
    pub fn new_without_sweeper() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Fully replace the state for an article.
    pub async fn set_progress(&self, article_id: i64, mut state: ProgressState) {
        let mut guard = self.states.write().await;
        if let Some(existing) = guard.get(&article_id) {
            state.last_updated = state.last_updated.max(existing.last_updated);
        }
        guard.insert(article_id, state);
    }

    /// Create-or-mutate the state for an article, stamping
    /// `last_updated` with a monotonic `max(now, previous)` guard (P7).
    pub async fn update_progress(
        &self,
        article_id: i64,
        step: impl Into<String>,
        message: impl Into<String>,
        percent: u8,
        status: ProgressStatus,
        error: Option<&LLMApiError>,
    ) {
        let mut guard = self.states.write().await;
        let previous_updated = guard.get(&article_id).map(|s| s.last_updated).unwrap_or(0);
        let last_updated = now_unix().max(previous_updated);

        let state = ProgressState {
            step: step.into(),
            message: message.into(),
            percent,
            status,
            error: error.map(|e| e.to_string()),
            error_details: error.map(|e| e.to_details_json()),
            final_score: None,
            last_updated,
        };
        guard.insert(article_id, state);
    }

    /// Finalize a successful run.
    pub async fn complete(&self, article_id: i64, final_score: f64) {
        let mut guard = self.states.write().await;
        let previous_updated = guard.get(&article_id).map(|s| s.last_updated).unwrap_or(0);
        guard.insert(
            article_id,
            ProgressState {
                step: "Complete".to_string(),
                message: "scoring complete".to_string(),
                percent: 100,
                status: ProgressStatus::Success,
                error: None,
                error_details: None,
                final_score: Some(final_score),
                last_updated: now_unix().max(previous_updated),
            },
        );
    }

    /// A snapshot (not a live reference) of the current state.
    pub async fn get(&self, article_id: i64) -> Option<ProgressState> {
        self.states.read().await.get(&article_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    /// Run the §4.H eviction predicate once, immediately. Exposed so
    /// tests can exercise sweeper correctness without waiting on a
    /// timer.
    pub async fn sweep_once(&self) {
        sweep(&self.states).await;
    }
}

async fn sweep(states: &Arc<RwLock<HashMap<i64, ProgressState>>>) {
    let now = now_unix();
    let mut guard = states.write().await;
    let before = guard.len();
    guard.retain(|_, state| {
        let age = now - state.last_updated;
        match state.status {
            ProgressStatus::Success | ProgressStatus::Error => age <= SUCCESS_ERROR_TTL_SECS,
            ProgressStatus::InProgress => age <= IN_PROGRESS_TTL_SECS,
        }
    });
    let evicted = before - guard.len();
    if evicted > 0 {
        debug!(evicted, "progress registry sweep evicted stale entries");
    }
}

fn spawn_sweeper(states: std::sync::Weak<RwLock<HashMap<i64, ProgressState>>>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match states.upgrade() {
                Some(states) => sweep(&states).await,
                None => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn aged_state(status: ProgressStatus, age_secs: i64) -> ProgressState {
        ProgressState {
            step: "Calculating".into(),
            message: "working".into(),
            percent: 50,
            status,
            error: None,
            error_details: None,
            final_score: None,
            last_updated: now_unix() - age_secs,
        }
    }

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let registry = ProgressRegistry::new_without_sweeper();
        registry
            .set_progress(1, ProgressState::new("Start", "beginning", 0))
            .await;
        let state = registry.get(1).await.unwrap();
        assert_eq!(state.step, "Start");
    }

    #[tokio::test]
    async fn test_get_missing_article_is_none() {
        let registry = ProgressRegistry::new_without_sweeper();
        assert!(registry.get(42).await.is_none());
    }

    #[tokio::test]
    async fn test_update_progress_embeds_error_details() {
        let registry = ProgressRegistry::new_without_sweeper();
        let err = LLMApiError::rate_limit_exhausted();
        registry
            .update_progress(1, "Calculating", "rate limited", 10, ProgressStatus::Error, Some(&err))
            .await;
        let state = registry.get(1).await.unwrap();
        assert!(state.error_details.is_some());
        assert_eq!(state.error_details.unwrap()["type"], "rate_limit");
    }

    #[tokio::test]
    async fn test_p8_sweeper_evicts_stale_in_progress() {
        let registry = ProgressRegistry::new_without_sweeper();
        registry
            .set_progress(1, aged_state(ProgressStatus::InProgress, IN_PROGRESS_TTL_SECS + 1))
            .await;
        registry
            .set_progress(2, aged_state(ProgressStatus::InProgress, IN_PROGRESS_TTL_SECS - 1))
            .await;
        registry.sweep_once().await;
        assert!(registry.get(1).await.is_none());
        assert!(registry.get(2).await.is_some());
    }

    #[tokio::test]
    async fn test_p8_sweeper_evicts_stale_success_and_error() {
        let registry = ProgressRegistry::new_without_sweeper();
        registry
            .set_progress(1, aged_state(ProgressStatus::Success, SUCCESS_ERROR_TTL_SECS + 1))
            .await;
        registry
            .set_progress(2, aged_state(ProgressStatus::Error, SUCCESS_ERROR_TTL_SECS - 1))
            .await;
        registry.sweep_once().await;
        assert!(registry.get(1).await.is_none());
        assert!(registry.get(2).await.is_some());
    }

    #[tokio::test]
    async fn test_p7_last_updated_monotonic_via_set_progress() {
        let registry = ProgressRegistry::new_without_sweeper();
        let mut first = ProgressState::new("Start", "begin", 0);
        first.last_updated = now_unix() + 1000; // simulate a clock blip
        registry.set_progress(1, first.clone()).await;

        let mut second = ProgressState::new("Calculating", "working", 10);
        second.last_updated = now_unix(); // "earlier" wall clock read
        registry.set_progress(1, second).await;

        let state = registry.get(1).await.unwrap();
        assert!(state.last_updated >= first.last_updated);
    }

    proptest! {
        #[test]
        fn prop_p7_progress_monotonicity(updates in proptest::collection::vec(0u8..100, 1..20)) {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(async {
                    let registry = ProgressRegistry::new_without_sweeper();
                    let mut last_seen = 0i64;
                    for percent in updates {
                        registry
                            .update_progress(1, "Calculating", "working", percent, ProgressStatus::InProgress, None)
                            .await;
                        let state = registry.get(1).await.unwrap();
                        prop_assert!(state.last_updated >= last_seen);
                        last_seen = state.last_updated;
                    }
                    Ok(())
                })?;
        }
    }
}
