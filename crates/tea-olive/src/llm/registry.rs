//! Provider registry mapping provider ids to profiles and adapters.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use tracing::{info, warn};

use super::anthropic::AnthropicProvider;
use super::error::LLMError;
use super::gemini::GeminiProvider;
use super::openai::OpenAIProvider;
use super::provider::{LLMProvider, ProviderId, ProviderProfile};
use crate::config::Settings;

/// A registered provider: its profile, adapter, and whether a key is set.
#[derive(Clone)]
pub struct ProviderEntry {
    pub profile: ProviderProfile,
    pub provider: Arc<dyn LLMProvider>,
    pub configured: bool,
}

/// Registry of LLM providers, keyed by provider id.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderId, ProviderEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every known provider from a settings snapshot.
    ///
    /// Providers without a key are still registered; their calls fail with
    /// `MissingCredential` before any network I/O.
    pub fn from_settings(settings: &Settings, client: Client) -> Self {
        let mut registry = Self::new();

        for id in ProviderId::ALL {
            let provider_settings = settings.provider(id);
            let implementation: Arc<dyn LLMProvider> = match id {
                ProviderId::OpenAI => {
                    Arc::new(OpenAIProvider::new(client.clone(), provider_settings))
                }
                ProviderId::Claude => Arc::new(AnthropicProvider::new(client.clone(), settings)),
                ProviderId::Gemini => {
                    Arc::new(GeminiProvider::new(client.clone(), provider_settings))
                }
            };
            let profile = ProviderProfile {
                id,
                label: id.label(),
                default_model: provider_settings.default_model.clone(),
                env_key: id.env_key(),
            };
            let configured = provider_settings.api_key.is_some();
            if configured {
                info!(provider = %id, model = %profile.default_model, "Registered provider");
            }
            registry.register(profile, implementation, configured);
        }

        if !registry.providers.values().any(|entry| entry.configured) {
            warn!(
                "No LLM provider keys configured. \
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or GEMINI_API_KEY."
            );
        }

        registry
    }

    /// Register a provider implementation.
    pub fn register(
        &mut self,
        profile: ProviderProfile,
        implementation: Arc<dyn LLMProvider>,
        configured: bool,
    ) {
        self.providers.insert(
            profile.id,
            ProviderEntry {
                profile,
                provider: implementation,
                configured,
            },
        );
    }

    /// Look up a provider by id.
    pub fn lookup(&self, id: ProviderId) -> Result<&ProviderEntry, LLMError> {
        self.providers
            .get(&id)
            .ok_or_else(|| LLMError::UnsupportedProvider(id.to_string()))
    }

    /// Registered entries in stable `ProviderId::ALL` order.
    pub fn entries(&self) -> impl Iterator<Item = &ProviderEntry> {
        ProviderId::ALL
            .into_iter()
            .filter_map(|id| self.providers.get(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[test]
    fn registers_all_providers() {
        let registry = ProviderRegistry::from_settings(&settings(&[]), Client::new());
        let ids: Vec<_> = registry.entries().map(|e| e.profile.id).collect();
        assert_eq!(ids, ProviderId::ALL.to_vec());
        assert!(registry.entries().all(|e| !e.configured));
    }

    #[test]
    fn lookup_returns_profile() {
        let registry = ProviderRegistry::from_settings(
            &settings(&[("ANTHROPIC_API_KEY", "k"), ("ANTHROPIC_MODEL", "claude-x")]),
            Client::new(),
        );
        let entry = registry.lookup(ProviderId::Claude).unwrap();
        assert_eq!(entry.profile.label, "Claude");
        assert_eq!(entry.profile.default_model, "claude-x");
        assert_eq!(entry.profile.env_key, "ANTHROPIC_API_KEY");
        assert!(entry.configured);
        assert!(!registry.lookup(ProviderId::OpenAI).unwrap().configured);
    }

    #[test]
    fn lookup_unregistered_provider_fails() {
        let registry = ProviderRegistry::new();
        let err = registry.lookup(ProviderId::Gemini).err().unwrap();
        assert!(matches!(err, LLMError::UnsupportedProvider(_)));
    }
}
