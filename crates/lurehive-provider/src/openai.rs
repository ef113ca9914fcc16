use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{LlmMessage, LlmProvider, LlmRequest, LlmResponse};

/// Client for any endpoint speaking the chat-completions protocol.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn with_timeout(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.api_base);
        let payload = ChatRequest::from(request);

        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("chat completion timed out after {:?}", self.timeout)
                } else {
                    anyhow!("chat completion request failed: {e}")
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp
                .json::<ErrorEnvelope>()
                .await
                .map(|env| env.error.message)
                .unwrap_or_default();
            return Err(anyhow!("chat completion failed ({status}) {detail}"));
        }

        let body: ChatResponse = resp.json().await?;
        first_reply(body)
    }
}

fn first_reply(body: ChatResponse) -> Result<LlmResponse> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("chat completion returned no choices"))?;
    Ok(LlmResponse {
        text: choice.message.content.unwrap_or_default(),
    })
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<LlmMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl From<LlmRequest> for ChatRequest {
    fn from(request: LlmRequest) -> Self {
        let system = request
            .system
            .filter(|s| !s.is_empty())
            .map(|s| LlmMessage {
                role: "system".into(),
                content: s,
            });
        let messages = system
            .into_iter()
            .chain(request.messages.into_iter().filter(|m| !m.content.is_empty()))
            .collect();
        Self {
            model: request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
