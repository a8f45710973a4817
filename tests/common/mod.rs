// Shared test helpers; not every test binary uses every item.
#![allow(unused)]

use async_trait::async_trait;
use aurabot::AurabotError;
use aurabot::catalog::{CatalogCheck, CatalogProvider, Product};
use aurabot::config::Config;
use aurabot::gateway::MessageGateway;
use aurabot::llm::LlmClient;
use aurabot::notify::NotificationChannel;
use aurabot::orchestrator::{ConversationOrchestrator, InboundMessage};
use aurabot::order::OrderAggregate;
use aurabot::session::SessionMeta;
use aurabot::store::{ConversationStore, FileStore, OrderStore};
use aurabot::transcript::{Message, Turn};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// --- Scripted model ---

#[derive(Debug, Clone)]
pub struct RecordedCompletion {
    pub turns: Vec<Turn>,
    pub system_instruction: String,
    pub correction: Option<String>,
}

/// Plays back queued completions and records every call. Once the queue is
/// drained it answers with a plain text-only reply.
pub struct MockLlm {
    responses: Mutex<VecDeque<Result<String, AurabotError>>>,
    pub calls: Mutex<Vec<RecordedCompletion>>,
}

impl MockLlm {
    pub fn with_responses(responses: Vec<Result<String, AurabotError>>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(responses)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn scripted(replies: &[&str]) -> Self {
        Self::with_responses(replies.iter().map(|r| Ok((*r).to_string())).collect())
    }

    pub fn calls(&self) -> Vec<RecordedCompletion> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(
        &self,
        transcript: &[Turn],
        system_instruction: &str,
        correction: Option<&str>,
    ) -> Result<String, AurabotError> {
        self.calls.lock().unwrap().push(RecordedCompletion {
            turns: transcript.to_vec(),
            system_instruction: system_instruction.to_string(),
            correction: correction.map(str::to_string),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(r#"{"text": "Mock reply"}"#.to_string()))
    }
}

// --- Recording gateway ---

/// Captures outbound traffic instead of calling the Cloud API.
pub struct MockGateway {
    pub texts: Mutex<Vec<(String, String)>>,
    pub images: Mutex<Vec<(String, String, String)>>,
    pub read_ids: Mutex<Vec<String>>,
    counter: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            texts: Mutex::new(Vec::new()),
            images: Mutex::new(Vec::new()),
            read_ids: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
        }
    }

    fn next_id(&self) -> String {
        format!("wamid.{}", self.counter.fetch_add(1, Ordering::Relaxed))
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.texts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl MessageGateway for MockGateway {
    async fn send_text(&self, to: &str, text: &str) -> Result<String, AurabotError> {
        self.texts
            .lock()
            .unwrap()
            .push((to.to_string(), text.to_string()));
        Ok(self.next_id())
    }

    async fn send_image_with_caption(
        &self,
        to: &str,
        url: &str,
        caption: &str,
    ) -> Result<String, AurabotError> {
        self.images
            .lock()
            .unwrap()
            .push((to.to_string(), url.to_string(), caption.to_string()));
        Ok(self.next_id())
    }

    async fn mark_read(&self, message_id: &str) -> Result<(), AurabotError> {
        self.read_ids.lock().unwrap().push(message_id.to_string());
        Ok(())
    }

    async fn send_typing_indicator(&self, _to: &str) -> Result<(), AurabotError> {
        Ok(())
    }
}

// --- In-memory persistence ---

/// Conversation and order persistence over plain maps. Windowing matches the
/// on-disk store: the most recent `limit` rows in ascending order.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, SessionMeta>>,
    messages: Mutex<HashMap<String, Vec<Message>>>,
    orders: Mutex<HashMap<String, OrderAggregate>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages_for(&self, session_id: &str) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn append(&self, message: &Message) -> anyhow::Result<()> {
        self.messages
            .lock()
            .unwrap()
            .entry(message.session_id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn window(&self, session_id: &str, limit: usize) -> anyhow::Result<Vec<Message>> {
        let messages = self.messages.lock().unwrap();
        let all = messages.get(session_id).cloned().unwrap_or_default();
        let start = all.len().saturating_sub(limit);
        Ok(all[start..].to_vec())
    }

    async fn get_session_meta(&self, sender_id: &str) -> anyhow::Result<Option<SessionMeta>> {
        Ok(self.sessions.lock().unwrap().get(sender_id).cloned())
    }

    async fn set_session_meta(&self, sender_id: &str, meta: &SessionMeta) -> anyhow::Result<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(sender_id.to_string(), meta.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn load(
        &self,
        session_id: &str,
        sender_id: &str,
    ) -> anyhow::Result<Option<OrderAggregate>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .get(session_id)
            .filter(|o| o.sender_id == sender_id)
            .cloned())
    }

    async fn save(&self, order: &OrderAggregate) -> anyhow::Result<()> {
        self.orders
            .lock()
            .unwrap()
            .insert(order.order_id.clone(), order.clone());
        Ok(())
    }
}

// --- Static catalog ---

pub struct StaticCatalog(pub Vec<Product>);

#[async_trait]
impl CatalogProvider for StaticCatalog {
    async fn list_available(&self) -> anyhow::Result<Vec<Product>> {
        Ok(self.0.iter().filter(|p| p.available).cloned().collect())
    }

    async fn validate(&self, product_id: &str) -> anyhow::Result<CatalogCheck> {
        let product = self
            .0
            .iter()
            .find(|p| p.id == product_id && p.available)
            .cloned();
        Ok(CatalogCheck {
            valid: product.is_some(),
            product,
        })
    }
}

pub fn product(id: &str, name: &str, price: f64) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        price: Some(price),
        image_url: Some(format!("https://cdn.example/{id}.jpg")),
        description: None,
        available: true,
    }
}

// --- Staff notifications ---

#[derive(Default)]
pub struct RecordingNotifier {
    pub pushes: Mutex<Vec<String>>,
}

#[async_trait]
impl NotificationChannel for RecordingNotifier {
    async fn push(&self, text: &str) -> Result<(), AurabotError> {
        self.pushes.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// --- World builder ---

pub struct TestWorld {
    pub engine: ConversationOrchestrator,
    pub llm: Arc<MockLlm>,
    pub gateway: Arc<MockGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<MemoryStore>,
}

pub fn world(replies: &[&str], products: Vec<Product>) -> TestWorld {
    world_with(Config::default(), replies, products)
}

pub fn world_with(config: Config, replies: &[&str], products: Vec<Product>) -> TestWorld {
    world_over(Arc::new(MemoryStore::new()), config, replies, products)
}

/// Build an engine over an existing store, as a restarted process would.
pub fn world_over(
    store: Arc<MemoryStore>,
    config: Config,
    replies: &[&str],
    products: Vec<Product>,
) -> TestWorld {
    let llm = Arc::new(MockLlm::scripted(replies));
    let gateway = Arc::new(MockGateway::new());
    let notifier = Arc::new(RecordingNotifier::default());

    let engine = ConversationOrchestrator::new(
        &config,
        store.clone(),
        store.clone(),
        Arc::new(StaticCatalog(products)),
        gateway.clone(),
        notifier.clone(),
        llm.clone(),
    );

    TestWorld {
        engine,
        llm,
        gateway,
        notifier,
        store,
    }
}

/// Same wiring as [`world`] but persisted through [`FileStore`] under a
/// temp directory, so a second engine over the same directory sees the
/// first one's state.
pub struct FileWorld {
    pub engine: ConversationOrchestrator,
    pub llm: Arc<MockLlm>,
    pub gateway: Arc<MockGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<FileStore>,
}

pub fn file_world(dir: &tempfile::TempDir, replies: &[&str], products: Vec<Product>) -> FileWorld {
    let config = Config::default();
    let llm = Arc::new(MockLlm::scripted(replies));
    let gateway = Arc::new(MockGateway::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let store = Arc::new(FileStore::new(dir.path()).expect("create file store"));

    let engine = ConversationOrchestrator::new(
        &config,
        store.clone(),
        store.clone(),
        Arc::new(StaticCatalog(products)),
        gateway.clone(),
        notifier.clone(),
        llm.clone(),
    );

    FileWorld {
        engine,
        llm,
        gateway,
        notifier,
        store,
    }
}

pub fn inbound(sender: &str, text: &str, wa_message_id: Option<&str>) -> InboundMessage {
    InboundMessage {
        sender_id: sender.to_string(),
        text: text.to_string(),
        wa_message_id: wa_message_id.map(str::to_string),
    }
}

pub async fn current_session_id(world: &TestWorld, sender: &str) -> String {
    world
        .store
        .get_session_meta(sender)
        .await
        .unwrap()
        .expect("session meta recorded")
        .session_id
}
