use crate::store::ConversationStore;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// How many recent rows the `wa_message_id` dedup scan covers. WhatsApp
/// redelivers within minutes, so replays land well inside this window.
const DEDUP_WINDOW: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One transcript row. `system` rows are side-channel bookkeeping (recorded
/// language, dispatch report markers) and never reach the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub sender_id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_th: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wa_message_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(
        sender_id: impl Into<String>,
        session_id: impl Into<String>,
        content: impl Into<String>,
        wa_message_id: Option<String>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            session_id: session_id.into(),
            role: Role::User,
            content: content.into(),
            content_en: None,
            content_th: None,
            wa_message_id,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(
        sender_id: impl Into<String>,
        session_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            session_id: session_id.into(),
            role: Role::Assistant,
            content: content.into(),
            content_en: None,
            content_th: None,
            wa_message_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn system(
        sender_id: impl Into<String>,
        session_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            session_id: session_id.into(),
            role: Role::System,
            content: content.into(),
            content_en: None,
            content_th: None,
            wa_message_id: None,
            timestamp: Utc::now(),
        }
    }
}

/// A `{role, content}` pair as sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Append-only per-session message log over a [`ConversationStore`].
///
/// Owns message-id dedup and the two read windows (raw, and filtered for
/// prompt construction). The store primitive is a pure append; this type never
/// rewrites history.
pub struct ConversationLog {
    store: Arc<dyn ConversationStore>,
}

impl ConversationLog {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Append a message. Returns `false` (writing nothing) when the message's
    /// `wa_message_id` already appears in the recent window, so gateway
    /// redeliveries are absorbed here before any processing.
    pub async fn append(&self, message: Message) -> Result<bool> {
        if let Some(id) = message.wa_message_id.as_deref() {
            let recent = self.store.window(&message.session_id, DEDUP_WINDOW).await?;
            if recent
                .iter()
                .any(|m| m.wa_message_id.as_deref() == Some(id))
            {
                debug!(
                    session_id = %message.session_id,
                    wa_message_id = %id,
                    "duplicate message id, skipping append"
                );
                return Ok(false);
            }
        }
        self.store.append(&message).await?;
        Ok(true)
    }

    /// Most recent `limit` messages in ascending chronological order.
    pub async fn window(&self, session_id: &str, limit: usize) -> Result<Vec<Message>> {
        self.store.window(session_id, limit).await
    }

    /// Like [`window`](Self::window) but shaped for the model: `system` rows
    /// and empty-content rows are dropped and each message collapses to a
    /// plain turn. An empty result is legal here; the orchestrator
    /// substitutes a synthetic turn, because the completion call requires at
    /// least one.
    pub async fn window_for_model(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>> {
        let messages = self.store.window(session_id, limit).await?;
        Ok(messages
            .into_iter()
            .filter(|m| m.role != Role::System && !m.content.trim().is_empty())
            .map(|m| Turn {
                role: m.role,
                content: m.content,
            })
            .collect())
    }
}
