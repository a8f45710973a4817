pub mod file;

use crate::order::OrderAggregate;
use crate::session::SessionMeta;
use crate::transcript::Message;
use anyhow::Result;
use async_trait::async_trait;

pub use file::FileStore;

/// Persistence seam for the message log and the per-sender session pointer.
///
/// `append` must be a pure append; implementations never read-modify-write
/// the log. Dedup and windowing policy live above this trait, in
/// [`ConversationLog`](crate::transcript::ConversationLog).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn append(&self, message: &Message) -> Result<()>;

    /// Most recent `limit` messages for a session, ascending by time.
    async fn window(&self, session_id: &str, limit: usize) -> Result<Vec<Message>>;

    /// The sender's current session pointer, if one was ever recorded.
    async fn get_session_meta(&self, sender_id: &str) -> Result<Option<SessionMeta>>;

    async fn set_session_meta(&self, sender_id: &str, meta: &SessionMeta) -> Result<()>;
}

/// Persistence seam for order drafts, keyed by session id.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Load the order for a session. `sender_id` must match the stored
    /// order's sender; a mismatch reads as absent.
    async fn load(&self, session_id: &str, sender_id: &str) -> Result<Option<OrderAggregate>>;

    async fn save(&self, order: &OrderAggregate) -> Result<()>;
}
