use crate::order::OrderAggregate;
use crate::session::SessionMeta;
use crate::store::{ConversationStore, OrderStore};
use crate::transcript::Message;
use crate::utils::{atomic_write, ensure_dir, safe_filename};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// JSONL-on-disk store.
///
/// Layout under the root directory:
///
/// ```text
/// meta/{sender_id}.json        current session pointer per sender
/// messages/{session_id}.jsonl  one message per line, append-only
/// orders/{session_id}.json     order draft per session
/// ```
///
/// Message files are opened in append mode and never rewritten. Meta and
/// order files go through [`atomic_write`] so readers never observe a
/// half-written document.
pub struct FileStore {
    meta_dir: PathBuf,
    messages_dir: PathBuf,
    orders_dir: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        Ok(Self {
            meta_dir: ensure_dir(root.join("meta"))?,
            messages_dir: ensure_dir(root.join("messages"))?,
            orders_dir: ensure_dir(root.join("orders"))?,
        })
    }

    fn meta_path(&self, sender_id: &str) -> PathBuf {
        self.meta_dir
            .join(format!("{}.json", safe_filename(sender_id)))
    }

    fn messages_path(&self, session_id: &str) -> PathBuf {
        self.messages_dir
            .join(format!("{}.jsonl", safe_filename(session_id)))
    }

    fn order_path(&self, session_id: &str) -> PathBuf {
        self.orders_dir
            .join(format!("{}.json", safe_filename(session_id)))
    }
}

/// Parse a JSONL transcript, skipping lines that no longer deserialize.
/// A corrupt row costs one message, not the whole session.
fn read_messages(path: &Path) -> Result<Vec<Message>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read message log {}", path.display()))?;
    let mut messages = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Message>(line) {
            Ok(message) => messages.push(message),
            Err(e) => warn!(
                path = %path.display(),
                line = idx + 1,
                "skipping unreadable message row: {e}"
            ),
        }
    }
    Ok(messages)
}

#[async_trait]
impl ConversationStore for FileStore {
    async fn append(&self, message: &Message) -> Result<()> {
        let path = self.messages_path(&message.session_id);
        let mut line = serde_json::to_string(message).context("failed to serialize message")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open message log {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append to message log {}", path.display()))?;
        Ok(())
    }

    async fn window(&self, session_id: &str, limit: usize) -> Result<Vec<Message>> {
        let mut messages = read_messages(&self.messages_path(session_id))?;
        if messages.len() > limit {
            messages.drain(..messages.len() - limit);
        }
        Ok(messages)
    }

    async fn get_session_meta(&self, sender_id: &str) -> Result<Option<SessionMeta>> {
        let path = self.meta_path(sender_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read session meta {}", path.display()))?;
        let meta = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse session meta {}", path.display()))?;
        Ok(Some(meta))
    }

    async fn set_session_meta(&self, sender_id: &str, meta: &SessionMeta) -> Result<()> {
        let path = self.meta_path(sender_id);
        let json = serde_json::to_string_pretty(meta).context("failed to serialize session meta")?;
        atomic_write(&path, &json)
            .with_context(|| format!("failed to write session meta {}", path.display()))
    }
}

#[async_trait]
impl OrderStore for FileStore {
    async fn load(&self, session_id: &str, sender_id: &str) -> Result<Option<OrderAggregate>> {
        let path = self.order_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read order {}", path.display()))?;
        let order: OrderAggregate = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse order {}", path.display()))?;
        if order.sender_id != sender_id {
            warn!(
                session_id,
                sender_id, "order on disk belongs to a different sender, treating as absent"
            );
            return Ok(None);
        }
        Ok(Some(order))
    }

    async fn save(&self, order: &OrderAggregate) -> Result<()> {
        let path = self.order_path(&order.order_id);
        let json = serde_json::to_string_pretty(order).context("failed to serialize order")?;
        atomic_write(&path, &json)
            .with_context(|| format!("failed to write order {}", path.display()))
    }
}
