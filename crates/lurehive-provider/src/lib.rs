pub mod openai;
pub mod openai_compat;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openai::OpenAiProvider;
pub use openai_compat::{custom, deepseek, groq, ollama_with_base, openrouter};
pub use types::*;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse>;
}

/// Backend serving the generative persona.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAI,
    Groq,
    DeepSeek,
    OpenRouter,
    Ollama,
    /// Custom OpenAI-compatible endpoint
    Custom,
    /// Canned echo replies, for local runs without network access
    Stub,
}

/// Configuration for the provider backing the generative persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// API key (optional for Ollama and Stub)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Custom base URL (optional, each type has a default)
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new(ProviderType::Groq)
    }
}

impl ProviderConfig {
    pub fn new(provider_type: ProviderType) -> Self {
        Self {
            provider_type,
            api_key: None,
            base_url: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    fn require_key(&self, label: &str) -> Result<String> {
        self.api_key
            .as_ref()
            .filter(|k| !k.trim().is_empty())
            .cloned()
            .ok_or_else(|| anyhow!("{label} requires api_key"))
    }
}

/// Create a provider from configuration. `timeout` bounds every request.
pub fn create_provider(config: &ProviderConfig, timeout: Duration) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.provider_type {
        ProviderType::OpenAI => {
            let key = config.require_key("openai")?;
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or(openai_compat::OPENAI_BASE);
            Arc::new(OpenAiProvider::with_timeout(key, base_url, timeout))
        }
        ProviderType::Groq => {
            let key = config.require_key("groq")?;
            match config.base_url.as_deref() {
                Some(base) => Arc::new(custom(key, base, timeout)),
                None => Arc::new(groq(key, timeout)),
            }
        }
        ProviderType::DeepSeek => Arc::new(deepseek(config.require_key("deepseek")?, timeout)),
        ProviderType::OpenRouter => {
            Arc::new(openrouter(config.require_key("openrouter")?, timeout))
        }
        ProviderType::Ollama => {
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or(openai_compat::OLLAMA_BASE);
            Arc::new(ollama_with_base(base_url, timeout))
        }
        ProviderType::Custom => {
            let key = config.require_key("custom provider")?;
            let base_url = config
                .base_url
                .as_ref()
                .ok_or_else(|| anyhow!("custom provider requires base_url"))?;
            Arc::new(custom(key, base_url.clone(), timeout))
        }
        ProviderType::Stub => Arc::new(StubProvider),
    };
    tracing::info!("Created provider: {:?}", config.provider_type);
    Ok(provider)
}

pub struct StubProvider;

#[async_trait]
impl LlmProvider for StubProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let user_text = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(LlmResponse {
            text: format!("[stub:{}] {}", request.model, user_text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_provider_chat_echoes_last_message() {
        let provider = StubProvider;
        let req = LlmRequest::simple("my-model".into(), None, "ping".into());
        let resp = provider.chat(req).await.unwrap();
        assert_eq!(resp.text, "[stub:my-model] ping");
    }

    #[tokio::test]
    async fn stub_provider_chat_empty_messages() {
        let provider = StubProvider;
        let req = LlmRequest {
            model: "m".into(),
            system: None,
            messages: vec![],
            max_tokens: 100,
            temperature: None,
        };
        let resp = provider.chat(req).await.unwrap();
        assert!(resp.text.contains("stub:m"));
    }

    #[test]
    fn create_provider_requires_key_for_groq() {
        let err = create_provider(&ProviderConfig::new(ProviderType::Groq), Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(err.to_string().contains("groq requires api_key"));
    }

    #[test]
    fn create_provider_rejects_blank_key() {
        let config = ProviderConfig::new(ProviderType::OpenAI).with_api_key("  ");
        assert!(create_provider(&config, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn create_provider_custom_requires_base_url() {
        let config = ProviderConfig::new(ProviderType::Custom).with_api_key("k");
        let err = create_provider(&config, Duration::from_secs(1)).err().unwrap();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn create_provider_ollama_and_stub_need_no_key() {
        assert!(create_provider(&ProviderConfig::new(ProviderType::Ollama), Duration::from_secs(1)).is_ok());
        assert!(create_provider(&ProviderConfig::new(ProviderType::Stub), Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn provider_config_serialize_deserialize() {
        let config = ProviderConfig::new(ProviderType::Custom)
            .with_api_key("sk-test")
            .with_base_url("https://custom.example.com/v1");

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"custom\""));
        let parsed: ProviderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.provider_type, ProviderType::Custom);
        assert_eq!(parsed.api_key.as_deref(), Some("sk-test"));
        assert_eq!(parsed.base_url.as_deref(), Some("https://custom.example.com/v1"));
    }
}
