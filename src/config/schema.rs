use crate::AurabotError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Generates a `Debug` impl that redacts secret fields.
///
/// Field specifiers:
/// - `field_name`: printed normally via `&self.field_name`
/// - `redact(field_name)`: `String` field, shows `[empty]` or `[REDACTED]`
macro_rules! redact_debug {
    (@field $builder:ident, $self:ident, redact($field:ident)) => {
        $builder.field(
            stringify!($field),
            &if $self.$field.is_empty() {
                "[empty]"
            } else {
                "[REDACTED]"
            },
        );
    };
    (@field $builder:ident, $self:ident, $field:ident) => {
        $builder.field(stringify!($field), &$self.$field);
    };

    (@fields $builder:ident, $self:ident,) => {};
    (@fields $builder:ident, $self:ident, redact($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, $field:ident, $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, $field);
        redact_debug!(@fields $builder, $self, $($rest)*);
    };

    ($struct_name:ident, $($fields:tt)*) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut builder = f.debug_struct(stringify!($struct_name));
                redact_debug!(@fields builder, self, $($fields)*);
                builder.finish()
            }
        }
    };
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub shop: ShopConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub line: LineConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl Config {
    /// Reject values the engine cannot run with. Missing credentials are not
    /// checked here; the binary reports them at startup, and tests run without any.
    pub fn validate(&self) -> Result<(), AurabotError> {
        if self.shop.name.trim().is_empty() {
            return Err(AurabotError::Config("shop.name must not be empty".into()));
        }
        if self.sessions.ttl_days == 0 {
            return Err(AurabotError::Config(
                "sessions.ttlDays must be at least 1".into(),
            ));
        }
        if self.sessions.history_window == 0 {
            return Err(AurabotError::Config(
                "sessions.historyWindow must be at least 1".into(),
            ));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(AurabotError::Config(
                "llm.requestTimeoutSecs must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(AurabotError::Config(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Shop
// ---------------------------------------------------------------------------

fn default_shop_name() -> String {
    "AuraFlora".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopConfig {
    #[serde(default = "default_shop_name")]
    pub name: String,
    /// Extra lines appended verbatim to the system instruction (delivery zones,
    /// pricing notes, seasonal hours).
    #[serde(default, rename = "promptNotes")]
    pub prompt_notes: String,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            name: default_shop_name(),
            prompt_notes: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// LLM
// ---------------------------------------------------------------------------

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default, rename = "geminiApiKey")]
    pub gemini_api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens", rename = "maxTokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_request_timeout_secs", rename = "requestTimeoutSecs")]
    pub request_timeout_secs: u64,
}

redact_debug!(
    LlmConfig,
    redact(gemini_api_key),
    model,
    max_tokens,
    temperature,
    request_timeout_secs,
);

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// WhatsApp Cloud API
// ---------------------------------------------------------------------------

fn default_api_version() -> String {
    "v21.0".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default, rename = "accessToken")]
    pub access_token: String,
    #[serde(default, rename = "phoneNumberId")]
    pub phone_number_id: String,
    #[serde(default = "default_api_version", rename = "apiVersion")]
    pub api_version: String,
}

redact_debug!(
    WhatsAppConfig,
    redact(access_token),
    phone_number_id,
    api_version,
);

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            api_version: default_api_version(),
        }
    }
}

// ---------------------------------------------------------------------------
// LINE staff notifications
// ---------------------------------------------------------------------------

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct LineConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "channelToken")]
    pub channel_token: String,
    /// Group or user id the order summary is pushed to.
    #[serde(default, rename = "recipientId")]
    pub recipient_id: String,
}

redact_debug!(LineConfig, enabled, redact(channel_token), recipient_id,);

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

fn default_ttl_days() -> u64 {
    7
}

fn default_history_window() -> usize {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Inactivity window after which the next lookup mints a fresh session.
    #[serde(default = "default_ttl_days", rename = "ttlDays")]
    pub ttl_days: u64,
    /// Most recent messages considered for prompt construction and dedup.
    #[serde(default = "default_history_window", rename = "historyWindow")]
    pub history_window: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_ttl_days(),
            history_window: default_history_window(),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    /// Path to the products JSON file. Defaults to `<home>/products.json`.
    #[serde(default, rename = "productsPath")]
    pub products_path: Option<PathBuf>,
}
