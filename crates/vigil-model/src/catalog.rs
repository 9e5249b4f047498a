// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Model catalog: static metadata for known models.

use serde::{Deserialize, Serialize};

/// Input modalities supported by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputModality {
    Text,
    Image,
}

fn default_input_modalities() -> Vec<InputModality> {
    vec![InputModality::Text]
}

/// Metadata for a single model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelCatalogEntry {
    /// Provider-scoped model identifier.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Provider identifier (e.g. `"mock"`; a real deployment's concrete
    /// provider crate registers its own catalog entries through the same
    /// shape).
    pub provider: String,
    /// Total context window in tokens (input + output).
    pub context_window: u32,
    /// Maximum output tokens per completion.
    pub max_output_tokens: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_input_modalities")]
    pub input_modalities: Vec<InputModality>,
}

impl ModelCatalogEntry {
    pub fn supports_images(&self) -> bool {
        self.input_modalities.contains(&InputModality::Image)
    }
}

/// The bundled catalog: entries for the `mock` provider used by tests and
/// local development. A real deployment plugs its own vendor adapter and
/// catalog entries in behind the same [`crate::ModelProvider`] trait.
pub fn static_catalog() -> Vec<ModelCatalogEntry> {
    vec![
        ModelCatalogEntry {
            id: "mock-model".into(),
            name: "mock-model".into(),
            provider: "mock".into(),
            context_window: 128_000,
            max_output_tokens: 8_192,
            description: "deterministic mock model for tests and local development".into(),
            input_modalities: vec![InputModality::Text],
        },
        ModelCatalogEntry {
            id: "scripted-mock-model".into(),
            name: "scripted-mock-model".into(),
            provider: "scripted-mock".into(),
            context_window: 128_000,
            max_output_tokens: 8_192,
            description: "scripted mock model for deterministic test sequences".into(),
            input_modalities: vec![InputModality::Text, InputModality::Image],
        },
    ]
}

pub fn lookup(provider: &str, model_id: &str) -> Option<ModelCatalogEntry> {
    static_catalog()
        .into_iter()
        .find(|e| e.provider == provider && (e.id == model_id || e.name == model_id))
}

pub fn lookup_by_model_name(model_name: &str) -> Option<ModelCatalogEntry> {
    static_catalog()
        .into_iter()
        .find(|e| e.id == model_name || e.name == model_name)
}

pub fn supports_images(provider: &str, model_id: &str) -> bool {
    lookup(provider, model_id).map(|e| e.supports_images()).unwrap_or(false)
}

pub fn context_window(provider: &str, model_id: &str, default: u32) -> u32 {
    lookup(provider, model_id).map(|e| e.context_window).unwrap_or(default)
}

pub fn max_output_tokens(provider: &str, model_id: &str, default: u32) -> u32 {
    lookup(provider, model_id).map(|e| e.max_output_tokens).unwrap_or(default)
}
