//! Config Catalog: declarative enumeration of providers and models a
//! client may choose from. Purely data; no network calls.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub model_id: String,
    pub display_name: String,
    pub context_window: u32,
    pub max_output_tokens: u32,
    pub recommended: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub provider_id: String,
    pub display_name: String,
    pub api_key_env: Option<String>,
    pub api_base: String,
    pub documentation_url: String,
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Catalog {
    pub providers: Vec<ProviderEntry>,
}

impl Catalog {
    pub fn provider(&self, provider_id: &str) -> Option<&ProviderEntry> {
        self.providers.iter().find(|p| p.provider_id == provider_id)
    }

    pub fn is_known_binding(&self, provider_id: &str, model_id: &str) -> bool {
        self.provider(provider_id)
            .map(|provider| provider.models.iter().any(|m| m.model_id == model_id))
            .unwrap_or(false)
    }
}

/// The catalog bundled with this build: one cloud provider reachable via
/// the OpenAI-compatible API, and a local Ollama-style entry with no
/// credential requirement.
pub fn default_catalog() -> Catalog {
    Catalog {
        providers: vec![
            ProviderEntry {
                provider_id: "openai".to_string(),
                display_name: "OpenAI".to_string(),
                api_key_env: Some("OPENAI_API_KEY".to_string()),
                api_base: "https://api.openai.com/v1".to_string(),
                documentation_url: "https://platform.openai.com/docs".to_string(),
                models: vec![
                    ModelEntry {
                        model_id: "gpt-4o".to_string(),
                        display_name: "GPT-4o".to_string(),
                        context_window: 128_000,
                        max_output_tokens: 16_384,
                        recommended: true,
                    },
                    ModelEntry {
                        model_id: "gpt-4o-mini".to_string(),
                        display_name: "GPT-4o mini".to_string(),
                        context_window: 128_000,
                        max_output_tokens: 16_384,
                        recommended: true,
                    },
                ],
            },
            ProviderEntry {
                provider_id: "ollama".to_string(),
                display_name: "Ollama (local)".to_string(),
                api_key_env: None,
                api_base: "http://localhost:11434/v1".to_string(),
                documentation_url: "https://github.com/ollama/ollama".to_string(),
                models: vec![ModelEntry {
                    model_id: "llama3:8b".to_string(),
                    display_name: "Llama 3 8B".to_string(),
                    context_window: 8_192,
                    max_output_tokens: 4_096,
                    recommended: false,
                }],
            },
        ],
    }
}
