//! Provider router: selects the correct language backend based on config.

use std::collections::HashMap;
use std::sync::Arc;
use fractalbot_core::provider::Provider;
use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Routes backend requests to the correct provider.
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

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

fn build_provider(name: &str, base_url: Option<String>, api_key: &str) -> Arc<dyn Provider> {
    if name == "anthropic" {
        let mut p = AnthropicProvider::new(api_key);
        if let Some(url) = base_url {
            p = p.with_base_url(url);
        }
        Arc::new(p)
    } else {
        let url = base_url.unwrap_or_else(|| default_base_url(name));
        Arc::new(OpenAiCompatProvider::new(name, url, api_key))
    }
}

/// Build providers from configuration.
pub fn build_from_config(config: &fractalbot_config::AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        router.register(
            name.clone(),
            build_provider(name, provider_config.api_url.clone(), &api_key),
        );
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        router.register(
            config.default_provider.clone(),
            build_provider(&config.default_provider, None, &api_key),
        );
    }

    router
}

/// Get the default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fractalbot_config::{AppConfig, ProviderConfig};

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("openai");
        router.register("openai", Arc::new(OpenAiCompatProvider::openai("sk-test")));

        assert!(router.get("openai").is_some());
        assert!(router.get("nonexistent").is_none());
        assert!(router.default().is_some());
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_from_default_config_uses_anthropic() {
        let config = AppConfig::default();
        let router = build_from_config(&config);
        let provider = router.default().unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn configured_providers_are_registered() {
        let mut config = AppConfig {
            default_provider: "groq".into(),
            ..AppConfig::default()
        };
        config.providers.insert(
            "groq".into(),
            ProviderConfig {
                api_key: Some("gsk".into()),
                ..ProviderConfig::default()
            },
        );
        let router = build_from_config(&config);
        assert_eq!(router.list().len(), 1);
        assert_eq!(router.default().unwrap().name(), "groq");
    }
}
