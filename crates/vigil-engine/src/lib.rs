// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Turn-loop orchestrator. `Engine` composes `vigil-actor` + `vigil-core::Agent`
//! the same way a coding agent's `TaskTool` composes a nested `Agent`: one
//! session's mailbox gets its own long-lived `Agent`, fed strictly in order,
//! with every turn wrapped in store persistence and budget enforcement.

mod error;
mod handler;
mod messages;
mod settings;

pub use error::{EngineError, Result};
pub use handler::EngineRequest;
pub use messages::{InboundMessage, OutboundMessage};
pub use settings::EngineSettings;
pub use vigil_core::AgentEvent;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use vigil_actor::ActorSystem;
use vigil_budget::BudgetGuard;
use vigil_config::AgentConfig;
use vigil_core::AgentRuntimeContext;
use vigil_model::ModelProvider;
use vigil_store::Store;
use vigil_telemetry::Telemetry;
use vigil_tools::ToolRegistry;

use handler::SessionHandler;

const OUTBOUND_CAPACITY: usize = 1024;

/// Shared state every freshly-constructed [`SessionHandler`] needs; captured
/// by the `ActorSystem`'s factory closure.
struct Shared {
    model: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    agent_config: Arc<AgentConfig>,
    runtime: AgentRuntimeContext,
    max_context_tokens: usize,
    store: Store,
    budget: Arc<BudgetGuard>,
    settings: EngineSettings,
    telemetry: Arc<Telemetry>,
    outbound_tx: mpsc::Sender<OutboundMessage>,
}

/// The runtime's turn-loop front door: every channel adapter, the
/// scheduler's cron/heartbeat ticks, and the management API all route
/// conversation turns through one `Engine`.
pub struct Engine {
    actors: Arc<ActorSystem<SessionHandler>>,
    store: Store,
    budget: Arc<BudgetGuard>,
    telemetry: Arc<Telemetry>,
    outbound_tx: mpsc::Sender<OutboundMessage>,
    outbound_rx: Mutex<Option<mpsc::Receiver<OutboundMessage>>>,
}

impl Engine {
    pub fn new(
        model: Arc<dyn ModelProvider>,
        tools: Arc<ToolRegistry>,
        agent_config: Arc<AgentConfig>,
        runtime: AgentRuntimeContext,
        max_context_tokens: usize,
        config: &vigil_config::Config,
        store: Store,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        let settings = EngineSettings::from_config(config);
        let budget = Arc::new(BudgetGuard::new(store.clone(), telemetry.clone()));
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);

        let shared = Arc::new(Shared {
            model,
            tools,
            agent_config,
            runtime,
            max_context_tokens,
            store: store.clone(),
            budget: budget.clone(),
            settings: settings.clone(),
            telemetry: telemetry.clone(),
            outbound_tx: outbound_tx.clone(),
        });

        let mailbox_capacity = settings.mailbox_capacity;
        let idle_ttl = Duration::from_secs(settings.idle_ttl_secs);

        let actors = ActorSystem::with_config(
            move |session_id: &str| shared.new_handler(session_id),
            mailbox_capacity,
            idle_ttl,
        );

        Self {
            actors: Arc::new(actors),
            store,
            budget,
            telemetry,
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
        }
    }

    /// Fire-and-forget: enqueue `message` on its session's mailbox. The
    /// reply, if any, is delivered through [`Engine::outbound`] instead of
    /// being returned here.
    pub async fn submit(&self, message: InboundMessage) -> Result<()> {
        let session_id = message.session_id.clone();
        self.actors
            .submit(&session_id, EngineRequest::Submit(message), false)
            .await?;
        Ok(())
    }

    /// Enqueue `message` and block for the final assistant text.
    pub async fn ask(&self, message: InboundMessage) -> Result<String> {
        let session_id = message.session_id.clone();
        let reply = self
            .actors
            .submit(&session_id, EngineRequest::Ask(message), true)
            .await?;
        match reply {
            Some(result) => result,
            None => Err(EngineError::Internal(anyhow::anyhow!("actor produced no reply for a waited submit"))),
        }
    }

    /// Like [`Engine::ask`] but also streams every [`AgentEvent`] produced
    /// during the turn to `sink` as it happens.
    pub async fn ask_stream(&self, message: InboundMessage, sink: mpsc::Sender<AgentEvent>) -> Result<String> {
        let session_id = message.session_id.clone();
        let reply = self
            .actors
            .submit(&session_id, EngineRequest::AskStream(message, sink), true)
            .await?;
        match reply {
            Some(result) => result,
            None => Err(EngineError::Internal(anyhow::anyhow!("actor produced no reply for a waited submit"))),
        }
    }

    /// Take the outbound-delivery channel. Exactly one dispatch task should
    /// hold this at a time; a second call returns `None`.
    pub async fn outbound(&self) -> Option<mpsc::Receiver<OutboundMessage>> {
        self.outbound_rx.lock().await.take()
    }

    /// Push a message onto the outbound channel directly, bypassing the
    /// turn loop. Used by the scheduler (cron/heartbeat notes) and the
    /// subagent manager (completion notifications) to reach a channel
    /// adapter without going through an `Agent`.
    pub async fn emit_outbound(&self, message: OutboundMessage) -> Result<()> {
        self.outbound_tx
            .send(message)
            .await
            .map_err(|e| EngineError::Internal(anyhow::anyhow!("outbound channel closed: {e}")))
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn budget(&self) -> &Arc<BudgetGuard> {
        &self.budget
    }
}

impl Shared {
    fn new_handler(&self, session_id: &str) -> SessionHandler {
        let (mode_lock, tool_event_rx) = handler::fresh_mode_state();
        let agent = vigil_core::Agent::new(
            self.model.clone(),
            self.tools.clone(),
            self.agent_config.clone(),
            self.runtime.clone(),
            mode_lock,
            tool_event_rx,
            self.max_context_tokens,
        );
        SessionHandler {
            session_id: session_id.to_string(),
            agent,
            store: self.store.clone(),
            budget: self.budget.clone(),
            settings: self.settings.clone(),
            telemetry: self.telemetry.clone(),
            outbound_tx: self.outbound_tx.clone(),
            seeded: false,
        }
    }
}
