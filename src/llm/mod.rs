pub mod gemini;

use crate::errors::AurabotError;
use crate::transcript::Turn;
use async_trait::async_trait;
use tracing::{debug, warn};

pub use gemini::GeminiClient;

/// Retry behavior for completion calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Completion backend.
///
/// `correction`, when present, rides along as a final user-side instruction
/// telling the model what was wrong with its previous output.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        transcript: &[Turn],
        system_instruction: &str,
        correction: Option<&str>,
    ) -> Result<String, AurabotError>;

    /// Completion with automatic retry on transient errors. Rate limits honor
    /// the server's retry-after hint; other transient failures back off
    /// exponentially with jitter.
    async fn complete_with_retry(
        &self,
        transcript: &[Turn],
        system_instruction: &str,
        correction: Option<&str>,
        retry_config: Option<RetryConfig>,
    ) -> Result<String, AurabotError> {
        let config = retry_config.unwrap_or_default();
        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            if attempt > 0 {
                warn!(
                    "completion retry attempt {}/{} after error: {}",
                    attempt,
                    config.max_retries,
                    last_error
                        .as_ref()
                        .map(|e: &AurabotError| e.to_string())
                        .unwrap_or_default()
                );
            }
            match self.complete(transcript, system_instruction, correction).await {
                Ok(text) => {
                    debug!("completion succeeded on attempt {attempt}");
                    return Ok(text);
                }
                Err(e) => {
                    let rate_limit_delay = match &e {
                        AurabotError::RateLimit { retry_after } => *retry_after,
                        _ => None,
                    };
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    warn!("completion failed on attempt {attempt}: {e}");
                    last_error = Some(e);
                    if attempt < config.max_retries {
                        let delay = if let Some(retry_secs) = rate_limit_delay {
                            debug!("using retry-after hint: {retry_secs}s");
                            retry_secs * 1000
                        } else {
                            let base = (config.initial_delay_ms as f64
                                * config.backoff_multiplier.powi(attempt as i32))
                            .min(config.max_delay_ms as f64)
                                as u64;
                            // Up to 25% jitter to avoid thundering herd.
                            let jitter = (base as f64 * 0.25 * fastrand::f64()) as u64;
                            base + jitter
                        };
                        tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AurabotError::Transport {
            message: "all completion attempts failed".to_string(),
            retryable: false,
        }))
    }
}
