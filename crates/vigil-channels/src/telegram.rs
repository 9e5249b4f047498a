// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! A minimal long-polling Telegram adapter. Deliberately light: the
//! channel contract (ingest a message, deliver a reply) is what this
//! workspace is responsible for, not a feature-complete Bot API client.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::UpdateKind;
use tracing::{debug, warn};
use vigil_engine::{Engine, InboundMessage, OutboundMessage};

use crate::channel::Channel;

pub struct TelegramChannel {
    bot: Bot,
    allowed_chat_ids: Vec<i64>,
}

impl TelegramChannel {
    /// `bot_token_env` names the environment variable holding the bot
    /// token, per [`vigil_config::TelegramConfig::bot_token_env`] — the
    /// token itself never lives in config on disk.
    pub fn from_env(bot_token_env: &str, allowed_chat_ids: Vec<i64>) -> anyhow::Result<Self> {
        let token = std::env::var(bot_token_env)
            .map_err(|_| anyhow::anyhow!("telegram bot token env var {bot_token_env:?} is not set"))?;
        Ok(Self { bot: Bot::new(token), allowed_chat_ids })
    }

    fn is_allowed(&self, chat_id: i64) -> bool {
        self.allowed_chat_ids.is_empty() || self.allowed_chat_ids.contains(&chat_id)
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn id(&self) -> &str {
        "telegram"
    }

    /// Long-polls `getUpdates`, forwarding each allowed text message as a
    /// turn on session `telegram:<chat_id>`.
    async fn start(self: Arc<Self>, engine: Arc<Engine>) -> anyhow::Result<()> {
        let mut offset = 0i32;
        loop {
            let updates = match self.bot.get_updates().offset(offset).timeout(30).send().await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "telegram getUpdates failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.id.0 as i32 + 1);
                let UpdateKind::Message(msg) = update.kind else {
                    continue;
                };
                let chat_id = msg.chat.id.0;
                if !self.is_allowed(chat_id) {
                    debug!(chat_id, "dropping message from disallowed telegram chat");
                    continue;
                }
                let Some(text) = msg.text() else {
                    continue;
                };
                let sender_id = msg.from().map(|u| u.id.0.to_string()).unwrap_or_else(|| "unknown".to_string());

                let inbound = InboundMessage {
                    session_id: format!("telegram:{chat_id}"),
                    request_id: engine.store().next_id(),
                    channel: self.id().to_string(),
                    chat_id: chat_id.to_string(),
                    sender_id,
                    content: text.to_string(),
                    media: Vec::new(),
                    metadata: serde_json::Value::Null,
                    created_at: vigil_store::Store::now(),
                };
                if let Err(e) = engine.submit(inbound).await {
                    warn!(error = %e, "failed to submit telegram message");
                }
            }
        }
    }

    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()> {
        let chat_id: i64 = message
            .chat_id
            .parse()
            .map_err(|_| anyhow::anyhow!("telegram chat_id {:?} is not a valid integer", message.chat_id))?;
        self.bot.send_message(ChatId(chat_id), message.content).send().await?;
        Ok(())
    }
}
