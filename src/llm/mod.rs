//! Provider fan-out: client, router, parser, cache, and the shared
//! score types they all operate on.

mod cache;
mod client;
mod parser;
mod router;
mod types;

pub use cache::ResponseCache;
pub use client::{
    classify_http_error, CancelSignal, HttpProviderClient, ProviderCallConfig, ProviderClient,
};
pub use parser::{parse_provider_response, ParsedScore};
pub use router::ModelRouter;
pub use types::{ContentHash, LLMScore, ScoreMetadata};
