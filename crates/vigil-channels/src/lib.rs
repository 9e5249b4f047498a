// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Channel adapters and the registry that fans outbound messages to the
//! right one. Concrete wire protocols (Telegram's Bot API, webhook HTTP
//! glue) are external collaborators per the component design — only their
//! `Channel` contract is load-bearing here, so the adapters in this crate
//! are illustrative rather than exhaustive, the same way `vigil-tools`
//! ships a demonstrative handful of tools rather than a full coding-agent
//! tool surface.

mod channel;
mod error;
mod registry;

pub mod cli;
pub mod webhook;

#[cfg(feature = "telegram")]
pub mod telegram;

pub use channel::Channel;
pub use error::{ChannelError, Result};
pub use registry::{ChannelRegistry, UnknownChannelPolicy};
