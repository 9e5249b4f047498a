// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-session [`vigil_actor::Handler`] wrapping a [`vigil_core::Agent`].
//!
//! One `SessionHandler` is created per session by the `ActorSystem`'s
//! factory and lives for as long as the actor does (until idle-TTL
//! eviction). It owns the durability and budget-enforcement steps around
//! the Agent's in-memory turn loop: seeding prior turns from the Store on
//! first use, persisting every turn and tool event as they occur, and
//! wrapping each provider call in a `BudgetGuard` preflight/commit.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use vigil_budget::{BudgetGuard, Usage};
use vigil_config::AgentMode;
use vigil_core::{Agent, AgentEvent};
use vigil_model::Message;
use vigil_store::{Store, ToolEvent as StoreToolEvent, Turn};
use vigil_telemetry::Telemetry;

use crate::error::EngineError;
use crate::messages::{InboundMessage, OutboundMessage};
use crate::settings::EngineSettings;

const HISTORY_WINDOW: usize = 50;

/// What a turn request wants back.
pub enum EngineRequest {
    /// Fire-and-forget: the final reply (if any) is pushed onto `outbound`
    /// rather than returned through the actor's reply channel.
    Submit(InboundMessage),
    /// Blocks for the final assistant text.
    Ask(InboundMessage),
    /// Streaming: every [`AgentEvent`] is forwarded to `sink` as it's produced,
    /// in addition to the final text being returned.
    AskStream(InboundMessage, mpsc::Sender<AgentEvent>),
}

pub struct SessionHandler {
    pub(crate) session_id: String,
    pub(crate) agent: Agent,
    pub(crate) store: Store,
    pub(crate) budget: Arc<BudgetGuard>,
    pub(crate) settings: EngineSettings,
    pub(crate) telemetry: Arc<Telemetry>,
    pub(crate) outbound_tx: mpsc::Sender<OutboundMessage>,
    pub(crate) seeded: bool,
}

#[async_trait]
impl vigil_actor::Handler for SessionHandler {
    type Payload = EngineRequest;
    type Reply = crate::error::Result<String>;

    async fn handle(&mut self, payload: Self::Payload) -> Self::Reply {
        self.ensure_seeded().await;

        let (inbound, forward): (InboundMessage, Option<mpsc::Sender<AgentEvent>>) = match payload {
            EngineRequest::Submit(m) => (m, None),
            EngineRequest::Ask(m) => (m, None),
            EngineRequest::AskStream(m, sink) => (m, Some(sink)),
        };

        let result = self.run_turn(&inbound, forward.as_ref()).await;

        match &result {
            Ok(_) => self.telemetry.turns_succeeded(),
            Err(_) => self.telemetry.turns_failed(),
        }

        if let Ok(text) = &result {
            let _ = self
                .outbound_tx
                .try_send(OutboundMessage {
                    channel: inbound.channel.clone(),
                    chat_id: inbound.chat_id.clone(),
                    content: text.clone(),
                    metadata: serde_json::json!({"request_id": inbound.request_id, "session_id": self.session_id}),
                });
        }

        result
    }
}

impl SessionHandler {
    async fn ensure_seeded(&mut self) {
        if self.seeded {
            return;
        }
        self.seeded = true;
        match self.store.window_turns(&self.session_id, HISTORY_WINDOW).await {
            Ok(turns) => {
                let messages: Vec<Message> = turns
                    .iter()
                    .filter_map(turn_to_message)
                    .collect();
                if !messages.is_empty() {
                    self.agent.seed_history(messages).await;
                }
            }
            Err(e) => warn!(session_id = %self.session_id, error = %e, "failed to load turn history"),
        }
    }

    async fn run_turn(
        &mut self,
        inbound: &InboundMessage,
        forward: Option<&mpsc::Sender<AgentEvent>>,
    ) -> crate::error::Result<String> {
        self.telemetry.turns_submitted();

        self.persist_turn("user", &inbound.content).await?;

        let scopes = vec!["global".to_string(), format!("session:{}", self.session_id)];
        let planned = self.settings.planned_max_tokens;
        let preflight = self.budget.preflight(&self.settings.budget, &scopes, planned).await?;

        let (tx, mut rx) = mpsc::channel::<AgentEvent>(256);
        let submit_fut = self.agent.submit(&inbound.content, tx);
        tokio::pin!(submit_fut);

        let mut final_text = String::new();
        let mut output_chars = 0usize;
        let mut total_tokens: Option<u64> = None;
        let mut aborted = false;

        loop {
            tokio::select! {
                res = &mut submit_fut => {
                    if let Err(e) = res {
                        self.budget.abort(&preflight).await;
                        return Err(EngineError::ProviderError(e.to_string()));
                    }
                    break;
                }
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            self.observe_event(event.clone(), &mut final_text, &mut output_chars, &mut total_tokens, &mut aborted).await;
                            if let Some(sink) = forward {
                                let _ = sink.send(event).await;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
        while let Ok(event) = rx.try_recv() {
            self.observe_event(event.clone(), &mut final_text, &mut output_chars, &mut total_tokens, &mut aborted).await;
            if let Some(sink) = forward {
                let _ = sink.send(event).await;
            }
        }

        let usage = Usage {
            total_tokens,
            output_chars,
        };
        let _ = self.budget.commit(&self.settings.budget, &preflight, usage).await;

        if aborted {
            return Err(EngineError::Cancelled);
        }

        if !final_text.is_empty() {
            self.persist_turn("assistant", &final_text).await?;
        }

        Ok(final_text)
    }

    async fn observe_event(
        &mut self,
        event: AgentEvent,
        final_text: &mut String,
        output_chars: &mut usize,
        total_tokens: &mut Option<u64>,
        aborted: &mut bool,
    ) {
        match event {
            AgentEvent::TextComplete(text) => {
                *output_chars += text.len();
                *final_text = text;
            }
            AgentEvent::ToolCallFinished { call_id, tool_name, output, is_error } => {
                self.telemetry.tool_calls();
                if is_error {
                    self.telemetry.tool_errors();
                }
                let _ = self
                    .store
                    .put_tool_event(StoreToolEvent {
                        id: self.store.next_id(),
                        session_id: self.session_id.clone(),
                        turn_id: call_id,
                        tool_name,
                        arguments: serde_json::Value::Null,
                        result: Some(serde_json::Value::String(output)),
                        is_error,
                        started_at: Store::now(),
                        finished_at: Some(Store::now()),
                    })
                    .await;
            }
            AgentEvent::TokenUsage { input, output, .. } => {
                *total_tokens = Some((input + output) as u64);
            }
            AgentEvent::Aborted { partial_text } => {
                *aborted = true;
                *final_text = partial_text;
            }
            AgentEvent::Error(msg) => {
                warn!(session_id = %self.session_id, error = %msg, "agent reported a recoverable error");
            }
            _ => {}
        }
    }

    async fn persist_turn(&self, role: &str, content: &str) -> crate::error::Result<()> {
        self.store
            .append_turn(Turn {
                id: self.store.next_id(),
                session_id: self.session_id.clone(),
                seq: 0,
                role: role.to_string(),
                content: content.to_string(),
                token_count: None,
                created_at: Store::now(),
            })
            .await?;
        Ok(())
    }
}

fn turn_to_message(turn: &Turn) -> Option<Message> {
    match turn.role.as_str() {
        "user" => Some(Message::user(turn.content.clone())),
        "assistant" => Some(Message::assistant(turn.content.clone())),
        _ => None,
    }
}

/// Mode lock + tool-event channel a fresh [`Agent`] needs; bundled here so
/// the factory closure in [`crate::Engine::new`] stays a one-liner. No
/// built-in tool currently writes to the todo/mode-change channel, so the
/// sender is simply dropped.
pub(crate) fn fresh_mode_state() -> (Arc<Mutex<AgentMode>>, mpsc::Receiver<vigil_tools::events::ToolEvent>) {
    let (_tx, rx) = mpsc::channel(1);
    (Arc::new(Mutex::new(AgentMode::default())), rx)
}
