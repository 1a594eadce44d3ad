//! Model Router: key rotation plus alternative-model fallback on
//! rate-limit.

use tracing::debug;

use crate::config::CompositeScoreConfig;
use crate::error::{LLMApiError, LLMErrorKind};

use super::client::{CancelSignal, ProviderCallConfig, ProviderClient};

/// Drives the §4.B algorithm: try primary, then backup on `rate_limit`,
/// then iterate configured models (skipping the one originally
/// requested) trying primary-then-backup for each, until success or
/// total exhaustion.
pub struct ModelRouter;

impl ModelRouter {
    #[allow(clippy::too_many_arguments)]
    pub async fn route(
        client: &dyn ProviderClient,
        primary_key: &str,
        backup_key: Option<&str>,
        cfg: &CompositeScoreConfig,
        model: &str,
        prompt: &str,
        call_cfg: &ProviderCallConfig,
        cancel: Option<CancelSignal>,
    ) -> Result<String, LLMApiError> {
        match client
            .complete(model, primary_key, prompt, call_cfg, cancel.clone())
            .await
        {
            Ok(body) => return Ok(body),
            Err(err) if err.error_type != LLMErrorKind::RateLimit => return Err(err),
            Err(_) => {}
        }

        if let Some(backup) = backup_key {
            debug!(%model, "primary key rate-limited, trying backup key");
            match client
                .complete(model, backup, prompt, call_cfg, cancel.clone())
                .await
            {
                Ok(body) => return Ok(body),
                Err(err) if err.error_type != LLMErrorKind::RateLimit => return Err(err),
                Err(_) => {}
            }
        }

        for candidate in cfg.models.iter().filter(|m| m.model_name != model) {
            debug!(candidate = %candidate.model_name, "trying fallback model");
            match client
                .complete(
                    &candidate.model_name,
                    primary_key,
                    prompt,
                    call_cfg,
                    cancel.clone(),
                )
                .await
            {
                Ok(body) => return Ok(body),
                Err(err) if err.error_type != LLMErrorKind::RateLimit => return Err(err),
                Err(_) => {}
            }

            if let Some(backup) = backup_key {
                match client
                    .complete(
                        &candidate.model_name,
                        backup,
                        prompt,
                        call_cfg,
                        cancel.clone(),
                    )
                    .await
                {
                    Ok(body) => return Ok(body),
                    Err(err) if err.error_type != LLMErrorKind::RateLimit => return Err(err),
                    Err(_) => {}
                }
            }
        }

        Err(LLMApiError::rate_limit_exhausted())
    }
}
