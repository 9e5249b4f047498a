// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Provider-agnostic model types plus a small driver registry.
//!
//! This build ships a single real driver: [`MockProvider`] (and its
//! scripted sibling, [`ScriptedMockProvider`]), used by tests and by
//! `vigil-runtime` when no external model endpoint is configured. The
//! types and traits here (`ModelProvider`, `CompletionRequest`,
//! `ResponseEvent`, the catalog) are vendor-agnostic so a real HTTP driver
//! can be added later without touching call sites.

pub mod catalog;
pub mod registry;
pub mod sanitize;
mod mock;
mod provider;
mod types;

pub use catalog::{InputModality, ModelCatalogEntry};
pub use mock::{MockProvider, ScriptedMockProvider};
pub use provider::ModelProvider;
pub use registry::{get_driver, list_drivers, DriverMeta};
pub use types::*;

use vigil_config::ModelConfig;

/// Construct a boxed [`ModelProvider`] from configuration.
///
/// Run `vigil list-providers` to see all recognised provider ids. Only
/// `"mock"` is backed by a real driver in this build; anything else is
/// rejected with the list of known drivers.
pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Box<dyn ModelProvider>> {
    match cfg.provider.as_str() {
        "mock" => Ok(Box::new(MockProvider)),
        other => {
            let known: Vec<&str> = list_drivers().iter().map(|d| d.id).collect();
            anyhow::bail!(
                "unknown model provider {other:?} (known drivers: {})",
                known.join(", ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_builds_mock_provider() {
        let cfg = ModelConfig {
            provider: "mock".into(),
            ..ModelConfig::default()
        };
        let provider = from_config(&cfg).unwrap();
        assert_eq!(provider.name(), "mock");
    }

    #[test]
    fn from_config_rejects_unknown_provider() {
        let cfg = ModelConfig {
            provider: "openai".into(),
            ..ModelConfig::default()
        };
        let err = from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("mock"));
    }
}
