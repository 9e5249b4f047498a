// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use vigil_config::AgentMode;
use vigil_tools::{events::TodoItem, ToolCall};

/// Which compaction strategy actually ran for a given [`AgentEvent::ContextCompacted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionStrategyUsed {
    Structured,
    Narrative,
    /// The session was too large even for a compaction prompt; old messages
    /// were dropped without a model call.
    Emergency,
}

/// Events emitted by the agent during a single turn.
/// Consumers (Engine, management API, CLI) subscribe to these to drive output.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A text chunk streamed from the model
    TextDelta(String),
    /// A complete text response from the model (after streaming finishes)
    TextComplete(String),
    /// A thinking/reasoning chunk from the model (extended thinking API).
    /// Consumers should accumulate deltas and finalise them into a Thinking
    /// segment when the model signals the end of the reasoning block.
    ThinkingDelta(String),
    /// A complete thinking/reasoning block (accumulated from ThinkingDelta events).
    ThinkingComplete(String),
    /// The model has requested a tool call
    ToolCallStarted(ToolCall),
    /// A tool call finished
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        output: String,
        is_error: bool,
    },
    /// Context was compacted; statistics for observers.
    ContextCompacted {
        tokens_before: usize,
        tokens_after: usize,
        strategy: CompactionStrategyUsed,
        turn: u32,
    },
    /// Current token usage update.
    TokenUsage {
        input: u32,
        output: u32,
        /// Tokens served from the provider's prompt cache this turn.
        cache_read: u32,
        /// Tokens written into the provider's prompt cache this turn.
        cache_write: u32,
        cache_read_total: u64,
        cache_write_total: u64,
        max_tokens: usize,
    },
    /// The agent has finished processing the current user turn.
    TurnComplete,
    /// The turn was cancelled. Any text already streamed is included so the
    /// caller can decide whether to keep it.
    Aborted { partial_text: String },
    /// A recoverable error occurred.
    Error(String),
    /// The todo list was updated.
    TodoUpdate(Vec<TodoItem>),
    /// The agent mode was changed.
    ModeChanged(AgentMode),
    /// The agent is asking the user a question (id links to QuestionAnswer).
    Question { id: String, questions: Vec<String> },
    /// Answer to a previous Question event.
    QuestionAnswer { id: String, answer: String },
}
