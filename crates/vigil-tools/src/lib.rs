// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod events;
pub mod policy;
pub mod registry;
pub mod tool;

pub use events::{TodoItem, ToolEvent};
pub use policy::{ApprovalPolicy, ToolPolicy};
pub use registry::{ToolRegistry, ToolSchema};
pub use tool::{OutputCategory, Tool, ToolCall, ToolOutput, ToolOutputPart};

// Illustrative built-in tools: enough to exercise the registry, the
// approval-policy model, and output-category-aware truncation without
// shipping a full coding-agent tool surface.
pub use builtin::fs::FsTool;
pub use builtin::read_image::ReadImageTool;
pub use builtin::shell::ShellTool;
