pub mod whatsapp;

use crate::errors::AurabotError;
use async_trait::async_trait;

pub use whatsapp::CloudApiGateway;

/// WhatsApp caps text messages at 4096 characters; longer replies get split.
pub const MAX_TEXT_LEN: usize = 4096;

/// Outbound messaging seam toward the end user.
///
/// `mark_read` and `send_typing_indicator` are best-effort courtesies; the
/// orchestrator logs their failures and moves on.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Send plain text. Returns the provider's message id.
    async fn send_text(&self, to: &str, text: &str) -> Result<String, AurabotError>;

    async fn send_image_with_caption(
        &self,
        to: &str,
        url: &str,
        caption: &str,
    ) -> Result<String, AurabotError>;

    async fn mark_read(&self, message_id: &str) -> Result<(), AurabotError>;

    async fn send_typing_indicator(&self, to: &str) -> Result<(), AurabotError>;
}

/// Split a message into chunks respecting UTF-8 character boundaries,
/// preferring paragraph breaks, then line breaks, then a hard cut.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while remaining.len() > limit {
        // Largest valid byte index <= limit that is a char boundary
        let mut split_at = limit;
        while split_at > 0 && !remaining.is_char_boundary(split_at) {
            split_at -= 1;
        }
        if split_at == 0 {
            // Degenerate case: single character wider than limit
            split_at = remaining
                .char_indices()
                .nth(1)
                .map_or(remaining.len(), |(i, _)| i);
        }

        if let Some(idx) = remaining[..split_at].rfind("\n\n") {
            chunks.push(remaining[..idx].trim().to_string());
            remaining = &remaining[idx + 2..];
            continue;
        }

        if let Some(idx) = remaining[..split_at].rfind('\n') {
            chunks.push(remaining[..idx].trim().to_string());
            remaining = &remaining[idx + 1..];
            continue;
        }

        chunks.push(remaining[..split_at].to_string());
        remaining = &remaining[split_at..];
    }

    if !remaining.is_empty() {
        chunks.push(remaining.trim().to_string());
    }

    chunks.into_iter().filter(|c| !c.is_empty()).collect()
}
