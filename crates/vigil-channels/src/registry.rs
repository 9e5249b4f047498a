// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Maps channel id → adapter, starts every adapter's ingress loop, and
//! drains `Engine::outbound()` on a single dispatch task that fans each
//! reply to the right adapter's `Send`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};
use vigil_engine::{Engine, OutboundMessage};
use vigil_telemetry::Telemetry;

use crate::channel::Channel;
use crate::error::{ChannelError, Result};

/// What to do with an outbound message whose `channel` field names no
/// registered adapter (§4.9: "unknown channels are either webhook-posted or
/// silently dropped based on configuration").
#[derive(Clone)]
pub enum UnknownChannelPolicy {
    Drop,
    Webhook(Arc<dyn Channel>),
}

pub struct ChannelRegistry {
    channels: HashMap<String, Arc<dyn Channel>>,
    unknown: UnknownChannelPolicy,
}

impl ChannelRegistry {
    pub fn new(unknown: UnknownChannelPolicy) -> Self {
        Self { channels: HashMap::new(), unknown }
    }

    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        self.channels.insert(channel.id().to_string(), channel);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Channel>> {
        self.channels.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Start every registered adapter's ingress loop as its own task. One
    /// ingress task per channel adapter, per §5's resource model.
    pub fn start_all(self: &Arc<Self>, engine: Arc<Engine>) -> Vec<tokio::task::JoinHandle<()>> {
        self.channels
            .values()
            .cloned()
            .map(|channel| {
                let engine = engine.clone();
                let id = channel.id().to_string();
                tokio::spawn(async move {
                    if let Err(e) = channel.start(engine).await {
                        warn!(channel = %id, error = %e, "channel adapter ingress loop exited with an error");
                    }
                })
            })
            .collect()
    }

    /// Deliver one outbound message to the adapter named by
    /// `message.channel`, applying the unknown-channel policy when no
    /// adapter is registered under that name.
    pub async fn dispatch(&self, message: OutboundMessage) -> Result<()> {
        match self.channels.get(&message.channel) {
            Some(channel) => channel.send(message).await.map_err(ChannelError::Internal),
            None => match &self.unknown {
                UnknownChannelPolicy::Drop => {
                    debug!(channel = %message.channel, "dropping outbound message for unregistered channel");
                    Ok(())
                }
                UnknownChannelPolicy::Webhook(fallback) => {
                    fallback.send(message).await.map_err(ChannelError::Internal)
                }
            },
        }
    }

    /// The outbound-dispatch task named in §5: drains `Engine::outbound()`
    /// for the lifetime of the process and calls `dispatch` for each
    /// message. `Engine::outbound()` only yields a receiver once, so this
    /// must be called exactly once per `Engine`.
    pub fn run_outbound_dispatch(
        self: Arc<Self>,
        engine: Arc<Engine>,
        telemetry: Arc<Telemetry>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let Some(mut rx) = engine.outbound().await else {
                warn!("outbound dispatch task started but Engine::outbound() was already taken");
                return;
            };
            while let Some(message) = rx.recv().await {
                telemetry.turns_submitted();
                if let Err(e) = self.dispatch(message).await {
                    warn!(error = %e, "failed to dispatch outbound message");
                }
            }
        })
    }
}
