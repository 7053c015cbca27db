//! Outbound send with retry/backoff over an injectable transport, plus
//! the inbound event shape ingest consumes.
//!
//! The retry shape mirrors `HorizonClient::retry_request` /
//! `HttpHostAdapter::retry_request`: exponential backoff, bounded
//! attempts, final failure surfaces to the caller.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, Level};

use crate::error::{CoordinatorError, Result};

/// An inbound transport event. The coordinator is agnostic to
/// transport identity apart from `chat_id`/`message_id`, used only for
/// dedup.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub chat_id: Option<String>,
    pub message_id: Option<String>,
    pub text: String,
}

/// Outbound send, injectable so tests can drive the core without a
/// real network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_raw(&self, channel_id: &str, text: &str) -> std::result::Result<(), String>;
}

pub struct TransportFacade {
    inner: Box<dyn Transport>,
    send_retries: u32,
    send_retry_base_ms: u64,
}

impl TransportFacade {
    pub fn new(inner: impl Transport + 'static, send_retries: u32, send_retry_base_ms: u64) -> Self {
        Self {
            inner: Box::new(inner),
            send_retries,
            send_retry_base_ms: send_retry_base_ms.max(50),
        }
    }

    /// `send_retries` additional attempts beyond the first, exponential
    /// backoff from `send_retry_base_ms`. Final failure surfaces as
    /// [`CoordinatorError::Transport`].
    pub async fn send(&self, channel_id: &str, text: &str) -> Result<()> {
        let mut attempt = 0;
        let mut delay_ms = self.send_retry_base_ms;

        loop {
            match self.inner.send_raw(channel_id, text).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if attempt >= self.send_retries {
                        let err = CoordinatorError::Transport(e);
                        match err.log_level() {
                            Level::ERROR => tracing::error!(channel_id, "transport send exhausted retries: {err}"),
                            Level::WARN => tracing::warn!(channel_id, "transport send exhausted retries: {err}"),
                            _ => tracing::info!(channel_id, "transport send exhausted retries: {err}"),
                        }
                        return Err(err);
                    }
                    attempt += 1;
                    debug!(attempt, channel_id, delay_ms, error = %e, "transport send failed, retrying");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms *= 2;
                }
            }
        }
    }
}
