use thiserror::Error;

/// Typed error hierarchy for aurabot.
///
/// Use at module boundaries (LLM calls, gateway sends, storage, config validation).
/// Internal/leaf functions can continue using `anyhow::Result`; the `Internal` variant
/// converts via the `?` operator.
#[derive(Debug, Error)]
pub enum AurabotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {message}")]
    Transport { message: String, retryable: bool },

    #[error("Rate limit exceeded")]
    RateLimit { retry_after: Option<u64> },

    #[error("Unparsable completion: {0}")]
    Parse(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unknown command type: {0}")]
    UnknownCommand(String),

    #[error("Business rule violated: {0}")]
    BusinessRule(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AurabotError {
    /// Whether this error is transient and the operation should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } => *retryable,
            Self::RateLimit { .. } | Self::Internal(_) => true,
            Self::Config(_)
            | Self::Parse(_)
            | Self::Validation(_)
            | Self::UnknownCommand(_)
            | Self::BusinessRule(_) => false,
        }
    }
}
