//! Error types for bias-score-core.

use thiserror::Error;

/// Result type alias using the crate's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a provider-side failure.
///
/// Mirrors the HTTP-status dispatch table in the spec: `RateLimit` and
/// `Streaming` are retry-eligible (transient), `Authentication` and
/// `Credits` are never retried (fatal), and `Unknown` covers everything
/// else, including decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LLMErrorKind {
    RateLimit,
    Authentication,
    Credits,
    Streaming,
    Unknown,
}

impl LLMErrorKind {
    /// Canonical lower-case name, used in error rendering and in the
    /// `error_details` payload stored by the progress registry.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Authentication => "authentication",
            Self::Credits => "credits",
            Self::Streaming => "streaming",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the model router should consider this kind eligible for
    /// key-rotation / model-fallback retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Streaming)
    }
}

impl std::fmt::Display for LLMErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed, structured error returned by a provider call.
///
/// `response_body` is always sanitized via [`crate::sanitize::redact_api_keys`]
/// before being stored here, so it is safe to log or persist verbatim.
#[derive(Debug, Clone, Error)]
#[error("LLM API Error ({error_type}): {message} (status {status_code})")]
pub struct LLMApiError {
    pub message: String,
    pub status_code: u16,
    pub response_body: String,
    pub error_type: LLMErrorKind,
    pub retry_after: Option<u64>,
}

impl LLMApiError {
    pub fn new(
        message: impl Into<String>,
        status_code: u16,
        response_body: impl Into<String>,
        error_type: LLMErrorKind,
    ) -> Self {
        Self {
            message: message.into(),
            status_code,
            response_body: response_body.into(),
            error_type,
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: u64) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// A decode/parse failure from [`crate::llm::parser`]. Never retryable
    /// by the router; the ensemble orchestrator's own attempt budget is the
    /// only thing that may retry it.
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::new(
            format!("decode: {}", reason.into()),
            0,
            String::new(),
            LLMErrorKind::Unknown,
        )
    }

    /// Synthesized error when the model router exhausts every
    /// primary/backup-key combination across every configured model.
    pub fn rate_limit_exhausted() -> Self {
        Self::new(
            "rate limit exhausted across all configured models",
            429,
            String::new(),
            LLMErrorKind::RateLimit,
        )
        .with_retry_after(30)
    }

    /// Structured `{type, status_code, retry_after?}` payload for
    /// `ProgressState.error_details`.
    pub fn to_details_json(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.error_type.as_str(),
            "status_code": self.status_code,
            "retry_after": self.retry_after,
        })
    }
}

/// Crate-wide error type for configuration, repository, and cancellation
/// failures that aren't specific to a single provider call.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("repository error: {0}")]
    Repository(String),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Llm(#[from] LLMApiError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository(message.into())
    }
}

/// Terminal outcomes of a single scoring run, mapped 1:1 onto article
/// lifecycle states by `manager::ScoreManager`.
#[derive(Debug, Clone, Error)]
pub enum ScoringError {
    /// Every perspective was dropped as invalid (or missing) under
    /// `handle_invalid = "ignore"`. Maps to `failed_all_invalid`.
    #[error("all perspectives invalid or missing")]
    AllPerspectivesInvalid,

    /// Every supplied score had confidence `0`. Maps to `failed_zero_conf`.
    #[error("all LLMs returned zero confidence: {0}")]
    ZeroConfidence(String),

    /// A `Repository` write failed. Maps to `failed_error`.
    #[error("repository error: {0}")]
    Repository(String),

    /// Cooperative cancellation of the run. Maps to `failed_error`.
    #[error("cancelled")]
    Cancelled,

    /// A provider-level failure propagated out of the ensemble orchestrator.
    /// Maps to `failed_error`.
    #[error(transparent)]
    Llm(#[from] LLMApiError),
}

impl ScoringError {
    /// The article status this error resolves to, per the state machine.
    pub fn article_status(&self) -> crate::repository::ArticleStatus {
        use crate::repository::ArticleStatus;
        match self {
            Self::AllPerspectivesInvalid => ArticleStatus::FailedAllInvalid,
            Self::ZeroConfidence(_) => ArticleStatus::FailedZeroConf,
            Self::Repository(_) | Self::Cancelled | Self::Llm(_) => ArticleStatus::FailedError,
        }
    }
}

impl From<ScoringError> for Error {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::AllPerspectivesInvalid => Error::Internal(err.to_string()),
            ScoringError::ZeroConfidence(msg) => Error::Internal(msg),
            ScoringError::Repository(msg) => Error::Repository(msg),
            ScoringError::Cancelled => Error::Cancelled,
            ScoringError::Llm(e) => Error::Llm(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_format() {
        let err = LLMApiError::new("boom", 503, "body", LLMErrorKind::Unknown);
        assert_eq!(err.to_string(), "LLM API Error (unknown): boom (status 503)");
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(LLMErrorKind::RateLimit.is_retryable());
        assert!(LLMErrorKind::Streaming.is_retryable());
        assert!(!LLMErrorKind::Authentication.is_retryable());
        assert!(!LLMErrorKind::Credits.is_retryable());
        assert!(!LLMErrorKind::Unknown.is_retryable());
    }

    #[test]
    fn test_rate_limit_exhausted_defaults() {
        let err = LLMApiError::rate_limit_exhausted();
        assert_eq!(err.status_code, 429);
        assert_eq!(err.retry_after, Some(30));
        assert_eq!(err.error_type, LLMErrorKind::RateLimit);
    }

    #[test]
    fn test_scoring_error_status_mapping() {
        use crate::repository::ArticleStatus;
        assert_eq!(
            ScoringError::AllPerspectivesInvalid.article_status(),
            ArticleStatus::FailedAllInvalid
        );
        assert_eq!(
            ScoringError::ZeroConfidence("x".into()).article_status(),
            ArticleStatus::FailedZeroConf
        );
        assert_eq!(
            ScoringError::Repository("db down".into()).article_status(),
            ArticleStatus::FailedError
        );
        assert_eq!(ScoringError::Cancelled.article_status(), ArticleStatus::FailedError);
    }
}
