use crate::lang::Language;
use crate::store::ConversationStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const MAX_CACHED_SENDERS: usize = 64;

static MINT_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Inactive,
    Completed,
}

/// The per-sender session pointer. One of these exists per sender; it names
/// the session id all new messages and the order draft attach to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub session_id: String,
    pub sender_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_language: Option<Language>,
}

impl SessionMeta {
    pub fn new(sender_id: impl Into<String>, session_id: String) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            sender_id: sender_id.into(),
            status: SessionStatus::Active,
            created_at: now,
            last_activity: now,
            user_language: None,
        }
    }
}

/// Mint a session id: UTC timestamp to the second, microseconds, a
/// process-wide sequence counter and a random suffix. Ids sort lexically in
/// creation order and stay distinct across concurrent mints and processes.
fn generate_session_id(now: DateTime<Utc>) -> String {
    let seq = MINT_SEQ.fetch_add(1, Ordering::Relaxed) % 1000;
    format!(
        "{}_{:06}_{:03}_{:03}",
        now.format("%Y%m%d_%H%M%S"),
        now.timestamp_subsec_micros(),
        seq,
        fastrand::u32(100..1000),
    )
}

/// Maps senders to live sessions.
///
/// Sessions are never deleted: expiry is computed from `last_activity` at
/// resolve time, and rotation after a confirmed order simply points the
/// sender at a fresh id while the old transcript and order stay on disk.
/// A small LRU cache fronts the store; the store remains the source of truth.
pub struct SessionManager {
    store: Arc<dyn ConversationStore>,
    ttl_days: i64,
    cache: Mutex<LruCache<String, SessionMeta>>,
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn ConversationStore>, ttl_days: u64) -> Self {
        Self {
            store,
            ttl_days: i64::try_from(ttl_days).unwrap_or(i64::MAX),
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(MAX_CACHED_SENDERS).expect("MAX_CACHED_SENDERS must be > 0"),
            )),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Per-sender mutex so concurrent resolves for one sender cannot both
    /// mint. Different senders proceed in parallel.
    async fn gate(&self, sender_id: &str) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().await;
        gates.entry(sender_id.to_string()).or_default().clone()
    }

    /// The sender's current session id, minting a fresh session when none is
    /// recorded, the recorded one sat idle past the TTL, or its pointer is no
    /// longer active.
    ///
    /// Lookup failures fail open into a fresh session with a warning; a
    /// failure to persist a new session is returned to the caller.
    pub async fn resolve(&self, sender_id: &str) -> Result<String> {
        let gate = self.gate(sender_id).await;
        let _guard = gate.lock().await;

        let cached = {
            let mut cache = self.cache.lock().await;
            cache.get(sender_id).cloned()
        };
        let known = match cached {
            Some(meta) => Some(meta),
            None => match self.store.get_session_meta(sender_id).await {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(sender_id, "session lookup failed, starting fresh: {e:#}");
                    None
                }
            },
        };

        if let Some(meta) = known {
            if meta.status == SessionStatus::Active && !self.expire_if_stale(&meta) {
                let session_id = meta.session_id.clone();
                self.cache.lock().await.put(sender_id.to_string(), meta);
                return Ok(session_id);
            }
            debug!(
                sender_id,
                session_id = %meta.session_id,
                "session expired or closed, minting a new one"
            );
        }
        self.mint(sender_id).await
    }

    /// Point the sender at a fresh session after a confirmed order. The
    /// completed session's transcript and order remain readable under the
    /// old id.
    pub async fn renew_after_order(&self, sender_id: &str) -> Result<String> {
        let gate = self.gate(sender_id).await;
        let _guard = gate.lock().await;
        self.mint(sender_id).await
    }

    /// Whether the session has outlived the inactivity window. Pure check
    /// against `last_activity`; nothing on disk changes.
    pub fn expire_if_stale(&self, meta: &SessionMeta) -> bool {
        Utc::now() - meta.last_activity > Duration::days(self.ttl_days)
    }

    /// Refresh `last_activity` to now, keeping it monotonic. Failures are
    /// logged rather than returned: a missed touch only shortens the idle
    /// window.
    pub async fn touch(&self, sender_id: &str) {
        if let Err(e) = self.touch_inner(sender_id).await {
            warn!(sender_id, "failed to touch session: {e:#}");
        }
    }

    /// The language recorded on the sender's current session, if any.
    pub async fn language(&self, sender_id: &str) -> Option<Language> {
        match self.current_meta(sender_id).await {
            Ok(meta) => meta.and_then(|m| m.user_language),
            Err(e) => {
                warn!(sender_id, "failed to read session language: {e:#}");
                None
            }
        }
    }

    /// Record the detected language on the session. Advisory like `touch`.
    pub async fn set_language(&self, sender_id: &str, language: Language) {
        if let Err(e) = self.set_language_inner(sender_id, language).await {
            warn!(sender_id, "failed to record session language: {e:#}");
        }
    }

    async fn mint(&self, sender_id: &str) -> Result<String> {
        let meta = SessionMeta::new(sender_id, generate_session_id(Utc::now()));
        self.store
            .set_session_meta(sender_id, &meta)
            .await
            .with_context(|| format!("failed to create session for {sender_id}"))?;
        info!(sender_id, session_id = %meta.session_id, "session created");
        let session_id = meta.session_id.clone();
        self.cache.lock().await.put(sender_id.to_string(), meta);
        Ok(session_id)
    }

    async fn current_meta(&self, sender_id: &str) -> Result<Option<SessionMeta>> {
        {
            let mut cache = self.cache.lock().await;
            if let Some(meta) = cache.get(sender_id) {
                return Ok(Some(meta.clone()));
            }
        }
        self.store.get_session_meta(sender_id).await
    }

    async fn touch_inner(&self, sender_id: &str) -> Result<()> {
        let Some(mut meta) = self.current_meta(sender_id).await? else {
            return Ok(());
        };
        let now = Utc::now();
        if now > meta.last_activity {
            meta.last_activity = now;
        }
        self.store.set_session_meta(sender_id, &meta).await?;
        self.cache.lock().await.put(sender_id.to_string(), meta);
        Ok(())
    }

    async fn set_language_inner(&self, sender_id: &str, language: Language) -> Result<()> {
        let Some(mut meta) = self.current_meta(sender_id).await? else {
            return Ok(());
        };
        if meta.user_language == Some(language) {
            return Ok(());
        }
        meta.user_language = Some(language);
        self.store.set_session_meta(sender_id, &meta).await?;
        self.cache.lock().await.put(sender_id.to_string(), meta);
        Ok(())
    }
}
