//! Ensemble political-bias scoring core: multi-provider fan-out,
//! statistical aggregation, atomic lifecycle transitions, and a
//! concurrent progress registry for a single article at a time.
//!
//! Configuration loading, the relational store, prompt wording, the
//! front end, metrics, and log-sink configuration are all external
//! collaborators; this crate only defines the capabilities
//! ([`repository::Repository`], [`calculator::ScoreCalculator`],
//! [`llm::ProviderClient`]) it needs from them.

#![forbid(unsafe_code)]

pub mod calculator;
pub mod config;
pub mod error;
pub mod llm;
pub mod manager;
pub mod orchestrator;
pub mod perspective;
pub mod progress;
pub mod repository;
pub mod sanitize;

pub use calculator::{calculate_score, DefaultCalculator, ScoreCalculator};
pub use config::{
    CompositeScoreConfig, CompositeScoreConfigBuilder, ConfidenceMethod, Formula, HandleInvalid,
    ModelConfig,
};
pub use error::{Error, LLMApiError, LLMErrorKind, Result, ScoringError};
pub use llm::{
    parse_provider_response, CancelSignal, ContentHash, HttpProviderClient, LLMScore, ModelRouter,
    ParsedScore, ProviderCallConfig, ProviderClient, ResponseCache, ScoreMetadata,
};
pub use manager::{GatherRequest, ScoreManager};
pub use orchestrator::{
    EnsembleOrchestrator, FinalAggregation, PerModelAggregation, PromptVariant, CONFIDENCE_THRESHOLD,
    MAX_ATTEMPTS, MIN_VALID,
};
pub use perspective::{map_model_to_perspective, PerspectiveKind};
pub use progress::{ProgressRegistry, ProgressState, ProgressStatus};
pub use repository::{ArticleStatus, ProviderDefaults, Repository};
pub use sanitize::redact_api_keys;
