// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The ingress/egress contract every adapter implements.

use async_trait::async_trait;
use std::sync::Arc;

use vigil_engine::{Engine, OutboundMessage};

/// One messaging surface (CLI stdin/stdout, Telegram, a webhook URL). The
/// registry owns starting every adapter's ingress loop and dispatching
/// outbound replies by `OutboundMessage::channel`.
#[async_trait]
pub trait Channel: Send + Sync {
    fn id(&self) -> &str;

    /// Ingress loop: read messages from the wire and call
    /// `engine.submit`/`engine.ask` for each one. Runs for the lifetime of
    /// the process; returning ends the adapter.
    async fn start(self: Arc<Self>, engine: Arc<Engine>) -> anyhow::Result<()>;

    /// Deliver a reply or unsolicited push to this adapter's wire.
    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()>;
}
