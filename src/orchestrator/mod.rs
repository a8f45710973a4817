use crate::catalog::CatalogProvider;
use crate::config::Config;
use crate::dispatch::{self, CommandDispatcher, DispatchReport};
use crate::errors::AurabotError;
use crate::gateway::{MAX_TEXT_LEN, MessageGateway, split_message};
use crate::lang;
use crate::llm::LlmClient;
use crate::notify::NotificationChannel;
use crate::prompt::PromptBuilder;
use crate::reply::ParsedReply;
use crate::reply::repair::ReplyRepairCoordinator;
use crate::session::SessionManager;
use crate::store::{ConversationStore, OrderStore};
use crate::transcript::{ConversationLog, Message, Turn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Typed by the user to abandon the current conversation and order draft.
const RESET_COMMAND: &str = "/newses";

const RESET_CONFIRMATION: &str =
    "New session started. The previous conversation is closed and you can begin a new order.";

/// One inbound chat message, as the embedding transport hands it over.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub sender_id: String,
    pub text: String,
    pub wa_message_id: Option<String>,
}

/// Runs the full per-message pipeline: session resolution, language
/// detection, transcript append, prompt assembly, the repair loop, command
/// dispatch, and reply delivery.
///
/// Messages from one sender are serialized on a per-sender lock, so session
/// resolution cannot race and no two commands touch one order concurrently.
/// Different senders proceed in parallel.
pub struct ConversationOrchestrator {
    sessions: Arc<SessionManager>,
    log: ConversationLog,
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn CatalogProvider>,
    gateway: Arc<dyn MessageGateway>,
    llm: Arc<dyn LlmClient>,
    dispatcher: CommandDispatcher,
    prompts: PromptBuilder,
    repair: ReplyRepairCoordinator,
    history_window: usize,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationOrchestrator {
    pub fn new(
        config: &Config,
        store: Arc<dyn ConversationStore>,
        orders: Arc<dyn OrderStore>,
        catalog: Arc<dyn CatalogProvider>,
        gateway: Arc<dyn MessageGateway>,
        notifier: Arc<dyn NotificationChannel>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(store.clone(), config.sessions.ttl_days));
        let log = ConversationLog::new(store);
        let dispatcher = CommandDispatcher::new(
            orders.clone(),
            catalog.clone(),
            gateway.clone(),
            notifier,
            sessions.clone(),
        );

        Self {
            sessions,
            log,
            orders,
            catalog,
            gateway,
            llm,
            dispatcher,
            prompts: PromptBuilder::new(&config.shop),
            repair: ReplyRepairCoordinator::new(),
            history_window: config.sessions.history_window,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Process one inbound message end to end.
    ///
    /// `Err` means infrastructure failed mid-pipeline (store write, outbound
    /// send). A model that never produced an acceptable reply is `Ok`: the
    /// failure is logged and the user hears nothing, which beats sending
    /// words the model never said.
    pub async fn handle_message(&self, inbound: InboundMessage) -> Result<(), AurabotError> {
        let lock = self.sender_lock(&inbound.sender_id).await;
        let _guard = lock.lock().await;

        self.acknowledge(&inbound).await;

        let text = inbound.text.trim();
        if text.is_empty() {
            debug!(sender_id = %inbound.sender_id, "ignoring empty message body");
            return Ok(());
        }
        if text.eq_ignore_ascii_case(RESET_COMMAND) {
            return self.reset_session(&inbound.sender_id).await;
        }

        let session_id = self.sessions.resolve(&inbound.sender_id).await?;

        let language = match self.sessions.language(&inbound.sender_id).await {
            Some(known) => Some(known),
            None => {
                let detected = lang::detect(text);
                info!(sender_id = %inbound.sender_id, language = %detected, "language detected");
                self.sessions.set_language(&inbound.sender_id, detected).await;
                Some(detected)
            }
        };

        let appended = self
            .log
            .append(Message::user(
                &inbound.sender_id,
                &session_id,
                text,
                inbound.wa_message_id.clone(),
            ))
            .await?;
        if !appended {
            info!(
                sender_id = %inbound.sender_id,
                wa_message_id = ?inbound.wa_message_id,
                "redelivered message, already processed"
            );
            return Ok(());
        }

        let mut turns = self
            .log
            .window_for_model(&session_id, self.history_window)
            .await?;
        if turns.is_empty() {
            turns.push(Turn::user(text));
        }

        let instruction = self
            .build_instruction(&session_id, &inbound.sender_id, language)
            .await;

        let reply = match self
            .repair
            .obtain(self.llm.as_ref(), &turns, &instruction, |reply| {
                match &reply.command {
                    Some(raw) => dispatch::decode(raw).map(|_| ()),
                    None => Ok(()),
                }
            })
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    sender_id = %inbound.sender_id,
                    session_id = %session_id,
                    error = %e,
                    "no usable reply after all attempts, staying silent"
                );
                self.sessions.touch(&inbound.sender_id).await;
                return Ok(());
            }
        };

        // Text goes out before the command runs, so the user reads what is
        // about to happen even when the command itself is slow.
        self.deliver_reply(&inbound.sender_id, &session_id, &reply)
            .await?;

        if let Some(raw) = &reply.command {
            match dispatch::decode(raw) {
                Ok(command) => {
                    match self
                        .dispatcher
                        .dispatch(&command, &session_id, &inbound.sender_id)
                        .await
                    {
                        Ok(report) => {
                            self.record_report(&inbound.sender_id, &session_id, &report)
                                .await;
                        }
                        Err(e) => {
                            error!(
                                sender_id = %inbound.sender_id,
                                session_id = %session_id,
                                kind = %raw.kind,
                                error = %e,
                                "command dispatch failed"
                            );
                        }
                    }
                }
                // The accept closure already decoded this; a failure here
                // would mean decode stopped being deterministic.
                Err(e) => warn!(kind = %raw.kind, "accepted command no longer decodes: {e}"),
            }
        }

        self.sessions.touch(&inbound.sender_id).await;
        Ok(())
    }

    /// Read receipt and typing indicator, both advisory. Neither failure
    /// stops the message.
    async fn acknowledge(&self, inbound: &InboundMessage) {
        if let Some(id) = inbound.wa_message_id.as_deref() {
            if let Err(e) = self.gateway.mark_read(id).await {
                warn!(sender_id = %inbound.sender_id, "mark-read failed: {e}");
            }
        }
        if let Err(e) = self.gateway.send_typing_indicator(&inbound.sender_id).await {
            debug!(sender_id = %inbound.sender_id, "typing indicator failed: {e}");
        }
    }

    async fn build_instruction(
        &self,
        session_id: &str,
        sender_id: &str,
        language: Option<lang::Language>,
    ) -> String {
        let products = match self.catalog.list_available().await {
            Ok(products) => products,
            Err(e) => {
                warn!("catalog unavailable for prompt: {e:#}");
                Vec::new()
            }
        };
        let summary = match self.orders.load(session_id, sender_id).await {
            Ok(order) => order.map(|o| o.summary()),
            Err(e) => {
                warn!(session_id, "order lookup for prompt failed: {e:#}");
                None
            }
        };
        self.prompts
            .system_instruction(language, &products, summary.as_deref())
    }

    /// Send the reply text in gateway-sized chunks, then record the
    /// assistant row with its translations. A failed send aborts before
    /// anything is recorded; the transcript never claims text the user did
    /// not receive.
    async fn deliver_reply(
        &self,
        sender_id: &str,
        session_id: &str,
        reply: &ParsedReply,
    ) -> Result<(), AurabotError> {
        for chunk in split_message(&reply.text, MAX_TEXT_LEN) {
            self.gateway.send_text(sender_id, &chunk).await?;
        }

        let mut message = Message::assistant(sender_id, session_id, reply.text.clone());
        message.content_en = reply.text_en.clone();
        message.content_th = reply.text_th.clone();
        if let Err(e) = self.log.append(message).await {
            warn!(session_id, "failed to record assistant reply: {e:#}");
        }
        Ok(())
    }

    /// Serialize the dispatch outcome into a `system` transcript row. The
    /// next completion reads the conversation with this row absent (system
    /// rows never reach the model directly) but the order summary it caused
    /// present, which is the state that actually matters.
    async fn record_report(&self, sender_id: &str, session_id: &str, report: &DispatchReport) {
        match serde_json::to_string(report) {
            Ok(payload) => {
                if let Err(e) = self
                    .log
                    .append(Message::system(sender_id, session_id, payload))
                    .await
                {
                    warn!(session_id, "failed to record dispatch report: {e:#}");
                }
            }
            Err(e) => warn!("dispatch report did not serialize: {e}"),
        }
    }

    /// `/newses`: abandon the current session without involving the model.
    async fn reset_session(&self, sender_id: &str) -> Result<(), AurabotError> {
        let new_session_id = self.sessions.renew_after_order(sender_id).await?;
        info!(sender_id, session_id = %new_session_id, "session reset on user request");

        self.gateway.send_text(sender_id, RESET_CONFIRMATION).await?;

        if let Err(e) = self
            .log
            .append(Message::assistant(
                sender_id,
                &new_session_id,
                RESET_CONFIRMATION,
            ))
            .await
        {
            warn!(session_id = %new_session_id, "failed to record reset confirmation: {e:#}");
        }
        let row = serde_json::json!({"action": "session_reset"}).to_string();
        if let Err(e) = self
            .log
            .append(Message::system(sender_id, &new_session_id, row))
            .await
        {
            warn!(session_id = %new_session_id, "failed to record reset marker: {e:#}");
        }
        Ok(())
    }

    async fn sender_lock(&self, sender_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(sender_id.to_string()).or_default().clone()
    }
}
