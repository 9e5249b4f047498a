// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActorError {
    #[error("mailbox full for session {0}")]
    MailboxFull(String),
    #[error("actor for session {0} is shutting down")]
    Closed(String),
    #[error("actor handler panicked: {0}")]
    HandlerPanicked(String),
    #[error("submission cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ActorError>;
