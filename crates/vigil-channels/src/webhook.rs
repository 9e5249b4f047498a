// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! A generic webhook adapter: inbound deliveries arrive through whatever
//! HTTP surface the gateway exposes and are handed to [`WebhookChannel::receive`];
//! outbound replies are POSTed as JSON to the configured URL. The HTTP
//! listener itself is the gateway's concern — this adapter only owns the
//! ingress/egress contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vigil_engine::{Engine, InboundMessage, OutboundMessage};

use crate::channel::Channel;
use crate::error::{ChannelError, Result};

/// The JSON body a webhook caller posts to deliver an inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub session_id: Option<String>,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

fn validate_payload(payload: &WebhookPayload) -> Result<()> {
    if payload.content.trim().is_empty() {
        return Err(ChannelError::InvalidArgument("webhook payload content must not be empty".into()));
    }
    if payload.chat_id.trim().is_empty() {
        return Err(ChannelError::InvalidArgument("webhook payload chat_id must not be empty".into()));
    }
    Ok(())
}

pub struct WebhookChannel {
    id: String,
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self { id: id.into(), url: url.into(), client: reqwest::Client::new() }
    }

    /// Called by the gateway's inbound HTTP handler for this webhook id.
    pub async fn receive(&self, engine: &Engine, payload: WebhookPayload) -> Result<()> {
        validate_payload(&payload)?;
        let session_id = payload.session_id.unwrap_or_else(|| format!("webhook:{}:{}", self.id, payload.chat_id));
        let message = InboundMessage {
            session_id,
            request_id: engine.store().next_id(),
            channel: self.id.clone(),
            chat_id: payload.chat_id,
            sender_id: payload.sender_id,
            content: payload.content,
            media: Vec::new(),
            metadata: payload.metadata,
            created_at: vigil_store::Store::now(),
        };
        engine.submit(message).await.map_err(|e| ChannelError::Internal(e.into()))
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn id(&self) -> &str {
        &self.id
    }

    /// Webhook ingress arrives via an externally-owned HTTP listener
    /// calling [`WebhookChannel::receive`] directly, not a loop this
    /// adapter drives itself, so there is nothing to run here.
    async fn start(self: Arc<Self>, _engine: Arc<Engine>) -> anyhow::Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "chat_id": message.chat_id,
            "content": message.content,
            "metadata": message.metadata,
        });
        let response = self.client.post(&self.url).json(&body).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("webhook {} POST to {} failed with status {}", self.id, self.url, response.status());
        }
        Ok(())
    }
}
