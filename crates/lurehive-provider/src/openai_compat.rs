//! OpenAI-compatible endpoints (Groq, DeepSeek, Ollama, etc.)
//!
//! These all speak the chat-completions format, only the base URL differs.

use std::time::Duration;

use crate::OpenAiProvider;

pub const OPENAI_BASE: &str = "https://api.openai.com/v1";
pub const GROQ_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEEPSEEK_BASE: &str = "https://api.deepseek.com/v1";
pub const OPENROUTER_BASE: &str = "https://openrouter.ai/api/v1";
pub const OLLAMA_BASE: &str = "http://localhost:11434/v1";

/// Groq API, fast inference for llama-family models
/// https://console.groq.com/docs/api
pub fn groq(api_key: impl Into<String>, timeout: Duration) -> OpenAiProvider {
    OpenAiProvider::with_timeout(api_key, GROQ_BASE, timeout)
}

/// DeepSeek API
/// https://platform.deepseek.com/api-docs
pub fn deepseek(api_key: impl Into<String>, timeout: Duration) -> OpenAiProvider {
    OpenAiProvider::with_timeout(api_key, DEEPSEEK_BASE, timeout)
}

/// OpenRouter multi-model router
/// https://openrouter.ai/docs
pub fn openrouter(api_key: impl Into<String>, timeout: Duration) -> OpenAiProvider {
    OpenAiProvider::with_timeout(api_key, OPENROUTER_BASE, timeout)
}

/// Ollama with custom base URL
pub fn ollama_with_base(base_url: impl Into<String>, timeout: Duration) -> OpenAiProvider {
    // Ollama ignores the key but the header is still sent
    OpenAiProvider::with_timeout("ollama", base_url, timeout)
}

/// Custom OpenAI-compatible endpoint
pub fn custom(
    api_key: impl Into<String>,
    base_url: impl Into<String>,
    timeout: Duration,
) -> OpenAiProvider {
    OpenAiProvider::with_timeout(api_key, base_url, timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groq_builds() {
        let provider = groq("gsk-test", Duration::from_secs(10));
        assert!(std::mem::size_of_val(&provider) > 0);
    }

    #[test]
    fn ollama_no_key_required() {
        let provider = ollama_with_base(OLLAMA_BASE, Duration::from_secs(10));
        assert!(std::mem::size_of_val(&provider) > 0);
    }

    #[test]
    fn custom_accepts_any_base() {
        let provider = custom("key", "https://my-llm.example.com/v1", Duration::from_secs(5));
        assert!(std::mem::size_of_val(&provider) > 0);
    }
}
