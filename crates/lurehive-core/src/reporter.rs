//! Delivery of the final result of a conversation to the evaluation endpoint.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use lurehive_schema::FinalResultPayload;

use super::config::ReporterConfig;

#[async_trait]
pub trait Reporter: Send + Sync {
    /// Deliver `payload`. Returns whether the endpoint accepted it.
    async fn send(&self, payload: &FinalResultPayload) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("callback rejected with status {status}")]
    Rejected { status: u16 },
    #[error("callback server error {status}")]
    ServerError { status: u16 },
    #[error("callback timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// POSTs the payload as JSON, retrying transient failures with exponential backoff.
pub struct HttpReporter {
    client: reqwest::Client,
    callback_url: String,
    max_attempts: u32,
    backoff_base: Duration,
}

impl HttpReporter {
    pub fn new(
        callback_url: impl Into<String>,
        max_attempts: u32,
        timeout: Duration,
        backoff_base: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            callback_url: callback_url.into(),
            max_attempts: max_attempts.max(1),
            backoff_base,
        })
    }

    pub fn from_config(config: &ReporterConfig) -> Result<Self> {
        Self::new(
            config.callback_url.clone(),
            config.max_attempts,
            Duration::from_secs(config.timeout_secs),
            Duration::from_secs(config.backoff_base_secs),
        )
    }

    /// Delay before the next attempt after `attempt` (1-based) failed.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.backoff_base
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(Duration::MAX)
    }

    async fn deliver_once(&self, payload: &FinalResultPayload) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(&self.callback_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::Network(e.to_string())
                }
            })?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else if status.is_client_error() {
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
            })
        } else {
            Err(DeliveryError::ServerError {
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl Reporter for HttpReporter {
    async fn send(&self, payload: &FinalResultPayload) -> bool {
        for attempt in 1..=self.max_attempts {
            tracing::info!(
                "Sending final result for {} (attempt {}/{})",
                payload.session_id,
                attempt,
                self.max_attempts
            );
            match self.deliver_once(payload).await {
                Ok(()) => {
                    tracing::info!("Final result delivered for {}", payload.session_id);
                    return true;
                }
                Err(e) if !e.is_retryable() => {
                    tracing::error!("Final result for {} not accepted: {e}", payload.session_id);
                    return false;
                }
                Err(e) => {
                    tracing::warn!("Delivery attempt {attempt} for {} failed: {e}", payload.session_id);
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.backoff_after(attempt)).await;
                    }
                }
            }
        }

        tracing::error!(
            "Giving up on final result for {} after {} attempts",
            payload.session_id,
            self.max_attempts
        );
        false
    }
}

/// Logs the payload instead of sending it.
pub struct NullReporter;

#[async_trait]
impl Reporter for NullReporter {
    async fn send(&self, payload: &FinalResultPayload) -> bool {
        match serde_json::to_string(payload) {
            Ok(json) => tracing::info!("Final result (not sent): {json}"),
            Err(e) => tracing::warn!("Could not serialize final result: {e}"),
        }
        true
    }
}
