// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

/// One durable memory snippet: a fact, preference, or summary the agent
/// chose to retain across sessions (e.g. via an `update_memory`-style tool
/// call), or a note an operator added through the management API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryNote {
    pub id: String,
    /// The session the note was written from, if any; `None` for
    /// operator-authored or global notes.
    pub session_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: String,
}

/// A search result: the matched note plus its BM25 rank (lower is more
/// relevant — SQLite FTS5's native ordering, passed through unchanged so
/// callers can tell a strong match from a weak one rather than just
/// receiving a pre-sorted list).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryHit {
    pub note: MemoryNote,
    pub rank: f64,
}
