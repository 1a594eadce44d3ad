//! The `Repository` capability the Score Manager writes through.
//!
//! The concrete SQL implementation lives outside this crate; only the
//! narrow contract it needs is defined here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Terminal (and initial) lifecycle states of an article's bias record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Pending,
    Scored,
    FailedZeroConf,
    FailedAllInvalid,
    FailedError,
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Scored => "scored",
            Self::FailedZeroConf => "failed_zero_conf",
            Self::FailedAllInvalid => "failed_all_invalid",
            Self::FailedError => "failed_error",
        };
        write!(f, "{s}")
    }
}

/// Minimal persistence contract the core needs. The error channel is an
/// owned `String` since the concrete SQL error type lives outside this
/// crate.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Atomic UPDATE of `composite_score`, `confidence`, `score_source='llm'`.
    async fn update_article_score_llm(
        &self,
        id: i64,
        composite: f64,
        confidence: f64,
    ) -> Result<(), String>;

    /// UPDATE the article's lifecycle status.
    async fn update_article_status(&self, id: i64, status: ArticleStatus) -> Result<(), String>;
}

/// Base URL / path defaults for constructing an `HttpProviderClient`.
/// Not baked into the client itself, so callers may target any
/// OpenAI-compatible endpoint.
pub struct ProviderDefaults;

impl ProviderDefaults {
    pub const OPENROUTER_BASE_URL: &'static str = "https://openrouter.ai/api/v1";
    pub const OPENAI_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const CHAT_COMPLETIONS_PATH: &'static str = "/chat/completions";
}
