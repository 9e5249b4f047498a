// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The always-present interface: a stdin/stdout loop against a single
//! fixed session, `cli:default`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::error;
use vigil_engine::{Engine, InboundMessage, OutboundMessage};

use crate::channel::Channel;

pub const CLI_SESSION_ID: &str = "cli:default";

pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn id(&self) -> &str {
        "cli"
    }

    /// Reads one line at a time from stdin, submits it as a turn, and
    /// prints the assistant's reply before reading the next line. Runs
    /// until stdin is closed (EOF).
    async fn start(self: Arc<Self>, engine: Arc<Engine>) -> anyhow::Result<()> {
        let mut lines = BufReader::new(io::stdin()).lines();
        loop {
            let mut stdout = io::stdout();
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;

            let line = match lines.next_line().await? {
                Some(line) => line,
                None => return Ok(()),
            };
            if line.trim().is_empty() {
                continue;
            }

            let message = InboundMessage {
                session_id: CLI_SESSION_ID.to_string(),
                request_id: engine.store().next_id(),
                channel: self.id().to_string(),
                chat_id: "default".to_string(),
                sender_id: "local".to_string(),
                content: line,
                media: Vec::new(),
                metadata: serde_json::Value::Null,
                created_at: vigil_store::Store::now(),
            };

            match engine.ask(message).await {
                Ok(reply) => {
                    let mut stdout = io::stdout();
                    stdout.write_all(reply.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await?;
                }
                Err(e) => error!(error = %e, "turn failed"),
            }
        }
    }

    /// Unsolicited pushes (cron fires, subagent completions) print directly
    /// to stdout, prefixed so they're distinguishable from a turn reply.
    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(b"\n[vigil] ").await?;
        stdout.write_all(message.content.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        Ok(())
    }
}
