//! Provider router: selects the correct LLM provider based on config.

use crate::openai_compat::{
    OLLAMA_BASE_URL, OPENAI_BASE_URL, OPENROUTER_BASE_URL, OpenAiCompatProvider,
};
use memir_core::error::ProviderError;
use memir_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Routes LLM requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// The configured default provider.
    pub fn default_provider(&self) -> Result<Arc<dyn Provider>, ProviderError> {
        self.get(&self.default_provider).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "default provider '{}' is not registered",
                self.default_provider
            ))
        })
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration.
///
/// Every `[providers.<name>]` table becomes an OpenAI-compatible provider;
/// the default provider is always registered even when it has no table.
pub fn build_from_config(config: &memir_config::AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let base_url = match provider_config
            .api_url
            .clone()
            .or_else(|| default_base_url(name).map(str::to_string))
        {
            Some(url) => url,
            None => {
                warn!(provider = %name, "Skipping provider without api_url");
                continue;
            }
        };
        let api_key = config.api_key_for(name).unwrap_or_default();
        router.register(
            name.clone(),
            Arc::new(OpenAiCompatProvider::new(name, base_url, api_key)),
        );
    }

    if router.get(&config.default_provider).is_none() {
        let base_url = default_base_url(&config.default_provider).unwrap_or_else(|| {
            warn!(
                provider = %config.default_provider,
                "Unknown default provider, using the OpenRouter endpoint"
            );
            OPENROUTER_BASE_URL
        });
        let api_key = config
            .api_key_for(&config.default_provider)
            .unwrap_or_default();
        router.register(
            config.default_provider.clone(),
            Arc::new(OpenAiCompatProvider::new(
                &config.default_provider,
                base_url,
                api_key,
            )),
        );
    }

    router
}

/// Get the default base URL for well-known OpenAI-compatible providers.
pub fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openrouter" => Some(OPENROUTER_BASE_URL),
        "openai" => Some(OPENAI_BASE_URL),
        "ollama" => Some(OLLAMA_BASE_URL),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "together" => Some("https://api.together.xyz/v1"),
        "vllm" => Some("http://localhost:8000/v1"),
        "llamacpp" | "llama.cpp" => Some("http://localhost:8080/v1"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memir_config::{AppConfig, ProviderConfig};

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("openrouter");
        let provider = Arc::new(OpenAiCompatProvider::openrouter("sk-test"));
        router.register("openrouter", provider);

        assert!(router.get("openrouter").is_some());
        assert!(router.get("nonexistent").is_none());
        assert!(router.default_provider().is_ok());
    }

    #[test]
    fn missing_default_is_not_configured() {
        let router = ProviderRouter::new("openrouter");
        assert!(matches!(
            router.default_provider(),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").unwrap().contains("openrouter.ai"));
        assert!(default_base_url("openai").unwrap().contains("api.openai.com"));
        assert!(default_base_url("ollama").unwrap().contains("localhost:11434"));
        assert!(default_base_url("mystery").is_none());
    }

    #[test]
    fn build_from_default_config() {
        let config = AppConfig::default();
        let router = build_from_config(&config);
        let provider = router.default_provider().unwrap();
        assert_eq!(provider.name(), "openrouter");
    }

    #[test]
    fn build_registers_configured_providers() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "local".into(),
            ProviderConfig {
                api_key: None,
                api_url: Some("http://127.0.0.1:1234/v1".into()),
            },
        );
        config
            .providers
            .insert("unknown".into(), ProviderConfig::default());

        let router = build_from_config(&config);
        assert_eq!(router.list(), vec!["local", "openrouter"]);
    }
}
