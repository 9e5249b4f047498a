// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Shared handler state: the runtime components the management API fronts,
//! plus the in-memory setup-token/session-cookie bookkeeping.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use vigil_channels::ChannelRegistry;
use vigil_config::GatewayConfig;
use vigil_engine::Engine;
use vigil_memory::MemoryStore;
use vigil_scheduler::{CronService, HeartbeatService};
use vigil_store::Store;
use vigil_subagent::SubagentManager;
use vigil_telemetry::Telemetry;

#[derive(Clone)]
pub struct AppState(pub Arc<Inner>);

pub struct Inner {
    pub store: Store,
    pub engine: Arc<Engine>,
    pub subagents: Arc<SubagentManager>,
    pub cron: Arc<CronService>,
    pub heartbeat: Arc<HeartbeatService>,
    pub memory: Arc<MemoryStore>,
    pub telemetry: Arc<Telemetry>,
    pub channels: Arc<ChannelRegistry>,
    pub config: GatewayConfig,
    pub workspace_root: PathBuf,
    pub auth: Mutex<AuthState>,
}

/// Onboarding/session bookkeeping. There is at most one password and one
/// live setup token at a time; sessions are an in-memory map of opaque
/// cookie values to expiry, mirroring the actor map's
/// "mutex around insert/lookup" pattern rather than persisting them —
/// a restart simply requires operators to log back in.
pub struct AuthState {
    pub password_hash: Option<String>,
    pub pending_setup_token: Option<PendingToken>,
    pub sessions: HashMap<String, DateTime<Utc>>,
}

pub struct PendingToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        engine: Arc<Engine>,
        subagents: Arc<SubagentManager>,
        cron: Arc<CronService>,
        heartbeat: Arc<HeartbeatService>,
        memory: Arc<MemoryStore>,
        telemetry: Arc<Telemetry>,
        channels: Arc<ChannelRegistry>,
        config: GatewayConfig,
        workspace_root: PathBuf,
    ) -> Self {
        Self(Arc::new(Inner {
            store,
            engine,
            subagents,
            cron,
            heartbeat,
            memory,
            telemetry,
            channels,
            config,
            workspace_root,
            auth: Mutex::new(AuthState { password_hash: None, pending_setup_token: None, sessions: HashMap::new() }),
        }))
    }
}

impl std::ops::Deref for AppState {
    type Target = Inner;
    fn deref(&self) -> &Inner {
        &self.0
    }
}
