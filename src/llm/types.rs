//! Score and metadata types shared across the ensemble pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Decoded `metadata` payload carried alongside every [`LLMScore`].
/// `confidence` defaults to `0.0` whenever the field is absent or the
/// JSON fails to decode — this boundary never propagates a decode error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetadata {
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

impl Default for ScoreMetadata {
    fn default() -> Self {
        Self {
            confidence: 0.0,
            explanation: None,
            provider: None,
        }
    }
}

/// A single model's judgment of an article, as stored and exchanged
/// throughout the pipeline. `metadata` is a JSON string rather than a
/// typed field so malformed or future-shaped metadata never blocks
/// storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMScore {
    pub article_id: i64,
    pub model: String,
    pub score: f64,
    pub metadata: String,
    pub created_at: DateTime<Utc>,
}

impl LLMScore {
    pub fn new(article_id: i64, model: impl Into<String>, score: f64, metadata: ScoreMetadata) -> Self {
        Self {
            article_id,
            model: model.into(),
            score,
            metadata: serde_json::to_string(&metadata).unwrap_or_else(|_| "{}".to_string()),
            created_at: Utc::now(),
        }
    }

    /// Decode `metadata` into a [`ScoreMetadata`], defaulting to
    /// `confidence: 0.0` on any decode failure. Never panics.
    pub fn decoded_metadata(&self) -> ScoreMetadata {
        serde_json::from_str(&self.metadata).unwrap_or_default()
    }

    pub fn confidence(&self) -> f64 {
        self.decoded_metadata().confidence
    }
}

/// SHA-256 hex digest of an article's content, used as the stable half
/// of a response cache fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn from_content(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
