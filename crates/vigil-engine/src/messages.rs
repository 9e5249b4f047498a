// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

/// A message arriving from any channel adapter, addressed to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub session_id: String,
    pub request_id: String,
    pub channel: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    /// Local file paths to images attached to this message (data URLs are
    /// resolved lazily by [`vigil_image::load_image`] at submit time).
    #[serde(default)]
    pub media: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: String,
}

/// A message the Engine wants delivered out-of-band: the reply to an
/// [`InboundMessage`], or an unsolicited push (cron fire, subagent
/// completion, heartbeat note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: String,
    pub chat_id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}
