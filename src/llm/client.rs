//! Provider Client: one HTTP POST per (model, key), classified into
//! typed errors.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::error::{LLMApiError, LLMErrorKind};
use crate::sanitize::redact_api_keys;

/// Per-call tunables independent of the target model/key.
#[derive(Debug, Clone)]
pub struct ProviderCallConfig {
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout: Duration,
}

impl Default for ProviderCallConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.2,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Cooperative cancellation signal threaded through the call chain.
pub type CancelSignal = watch::Receiver<bool>;

fn is_cancelled(cancel: Option<&CancelSignal>) -> bool {
    cancel.map(|c| *c.borrow()).unwrap_or(false)
}

/// Capability trait substituted by a fake in tests.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        key: &str,
        prompt: &str,
        cfg: &ProviderCallConfig,
        cancel: Option<CancelSignal>,
    ) -> Result<String, LLMApiError>;
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize, Default)]
struct ProviderErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    r#type: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    code: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    metadata: Option<serde_json::Value>,
}

/// Build a `reqwest::Client` honoring `timeout`; falls back to disabling
/// proxy autodetection when constructing the client panics (observed on
/// sandboxed macOS where system-proxy lookups can abort).
fn build_http_client(timeout: Duration) -> reqwest::Client {
    let attempt = catch_unwind(AssertUnwindSafe(|| {
        Client::builder().timeout(timeout).build()
    }));

    match attempt {
        Ok(Ok(client)) => client,
        _ => Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .expect("building an http client without proxy autodetection must succeed"),
    }
}

/// Classify an HTTP response into a typed [`LLMApiError`] per the §4.A
/// dispatch table. `body` is sanitized before being stored.
pub fn classify_http_error(status: u16, body: &str, retry_after: Option<u64>) -> LLMApiError {
    let sanitized_body = redact_api_keys(body);
    let message = extract_message(&sanitized_body).unwrap_or_else(|| canonical_status_text(status));

    let kind = match status {
        401 => LLMErrorKind::Authentication,
        402 => LLMErrorKind::Credits,
        429 => LLMErrorKind::RateLimit,
        _ if is_streaming_body(&sanitized_body) => LLMErrorKind::Streaming,
        _ => LLMErrorKind::Unknown,
    };

    let mut err = LLMApiError::new(message, status, sanitized_body, kind);
    if kind == LLMErrorKind::RateLimit {
        err = err.with_retry_after(retry_after.unwrap_or(0));
    }
    err
}

fn extract_message(body: &str) -> Option<String> {
    serde_json::from_str::<ProviderErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
}

fn is_streaming_body(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("stream") || lower.contains("sse")
}

fn canonical_status_text(status: u16) -> String {
    match status {
        500 => "500 Internal Server Error".to_string(),
        other => reqwest::StatusCode::from_u16(other)
            .ok()
            .and_then(|s| s.canonical_reason())
            .map(|r| format!("{other} {r}"))
            .unwrap_or_else(|| format!("HTTP {other}")),
    }
}

/// `reqwest`-backed [`ProviderClient`] implementation.
pub struct HttpProviderClient {
    http: Client,
}

impl HttpProviderClient {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            http: build_http_client(default_timeout),
        }
    }
}

impl Default for HttpProviderClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    #[instrument(skip(self, key, prompt, cancel), fields(model = %model))]
    async fn complete(
        &self,
        model: &str,
        key: &str,
        prompt: &str,
        cfg: &ProviderCallConfig,
        cancel: Option<CancelSignal>,
    ) -> Result<String, LLMApiError> {
        if is_cancelled(cancel.as_ref()) {
            return Err(LLMApiError::new("cancelled", 0, String::new(), LLMErrorKind::Unknown));
        }

        let base_url = model_base_url(model);
        let url = format!("{}{}", base_url.trim_end_matches('/'), "/chat/completions");

        let body = serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": cfg.max_tokens,
            "temperature": cfg.temperature,
        });

        debug!(%url, "sending provider request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .timeout(cfg.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %redact_api_keys(&e.to_string()), "provider request failed");
                LLMApiError::new(
                    redact_api_keys(&e.to_string()),
                    0,
                    String::new(),
                    LLMErrorKind::Unknown,
                )
            })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let text = response.text().await.unwrap_or_default();

        if (200..300).contains(&status) {
            return Ok(text);
        }

        Err(classify_http_error(status, &text, retry_after))
    }
}

/// Base URL resolution is the caller's concern in general, but the
/// well-known openrouter/openai prefixes are recognized here so tests
/// and simple callers don't need a full config round-trip.
fn model_base_url(model: &str) -> &'static str {
    if model.contains('/') {
        crate::repository::ProviderDefaults::OPENROUTER_BASE_URL
    } else {
        crate::repository::ProviderDefaults::OPENAI_BASE_URL
    }
}
