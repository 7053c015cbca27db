//! HTTP-backed [`ReputationBackend`] over a generic JSON-RPC-shaped
//! chain endpoint, with the same retry/backoff shape as the teacher's
//! `HorizonClient::retry_request`.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ReputationError, Result};
use crate::models::{StakeInfo, TransactionRecord, VerifyOutcome, VerifyParams, DEFAULT_LOOKBACK};
use crate::verify::evaluate_verify;
use crate::ReputationBackend;

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

#[derive(Clone)]
pub struct HttpHostAdapter {
    base_url: String,
    http: reqwest::Client,
    retry_config: RetryConfig,
}

impl HttpHostAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_retry_config(base_url, RetryConfig::default())
    }

    pub fn with_retry_config(base_url: impl Into<String>, retry_config: RetryConfig) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            retry_config,
        }
    }

    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        let mut delay_ms = self.retry_config.initial_delay_ms;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;
                    if !e.is_retryable() || attempt >= self.retry_config.max_retries {
                        match e.log_level() {
                            tracing::Level::ERROR => {
                                tracing::error!(attempt, "host adapter request failed, giving up: {e}")
                            }
                            tracing::Level::WARN => {
                                tracing::warn!(attempt, "host adapter request failed, giving up: {e}")
                            }
                            _ => tracing::info!(attempt, "host adapter request failed, giving up: {e}"),
                        }
                        return Err(e);
                    }
                    debug!(
                        attempt,
                        max_retries = self.retry_config.max_retries,
                        delay_ms,
                        "host adapter request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = ((delay_ms as f64) * self.retry_config.backoff_multiplier) as u64;
                    delay_ms = delay_ms.min(self.retry_config.max_delay_ms);
                }
            }
        }
    }
}

#[derive(Serialize)]
struct RegisterAgentBody {
    stake: Decimal,
    now: i64,
}

#[derive(Deserialize)]
struct ReputationResponse {
    reputation: i64,
}

#[derive(Deserialize)]
struct StakeResponse {
    stake: Decimal,
    since: i64,
}

#[derive(Serialize)]
struct RecordOutcomeBody<'a> {
    tx_hash: &'a str,
    rating: i64,
    now: i64,
}

#[derive(Deserialize)]
struct RecordOutcomeResponse {
    score: i64,
}

#[derive(Serialize)]
struct SlashBody<'a> {
    reason: &'a str,
}

#[derive(Deserialize)]
struct WithdrawResponse {
    stake: Decimal,
}

#[derive(Deserialize)]
struct RemoteTransaction {
    hash: String,
    recipient: String,
    sender: String,
    amount: Decimal,
    internal_inbound: bool,
    succeeded: bool,
    timestamp: i64,
}

impl From<RemoteTransaction> for TransactionRecord {
    fn from(remote: RemoteTransaction) -> Self {
        Self {
            hash: remote.hash,
            recipient: remote.recipient,
            sender: remote.sender,
            amount: remote.amount,
            is_internal_inbound: remote.internal_inbound,
            succeeded: remote.succeeded,
            timestamp: remote.timestamp,
        }
    }
}

#[async_trait]
impl ReputationBackend for HttpHostAdapter {
    async fn register_agent(&self, address: &str, stake: Decimal, now: i64) -> Result<()> {
        let url = format!("{}/agents/{address}/register", self.base_url);
        let body = RegisterAgentBody { stake, now };
        let client = self.http.clone();

        self.retry_request(|| async {
            let resp = client.post(&url).json(&body).send().await?;
            ensure_success(&resp).await?;
            Ok(())
        })
        .await
    }

    async fn get_reputation(&self, address: &str) -> Result<i64> {
        let url = format!("{}/agents/{address}/reputation", self.base_url);
        let client = self.http.clone();

        self.retry_request(|| async {
            let resp = client.get(&url).send().await?;
            ensure_success(&resp).await?;
            let parsed: ReputationResponse = resp.json().await?;
            Ok(parsed.reputation)
        })
        .await
    }

    async fn get_stake_info(&self, address: &str, now: i64) -> Result<StakeInfo> {
        let url = format!("{}/agents/{address}/stake", self.base_url);
        let client = self.http.clone();

        self.retry_request(|| async {
            let resp = client.get(&url).send().await?;
            ensure_success(&resp).await?;
            let parsed: StakeResponse = resp.json().await?;
            Ok(StakeInfo {
                stake: parsed.stake,
                since: parsed.since,
                age_seconds: (now - parsed.since).max(0),
            })
        })
        .await
    }

    async fn record_outcome(&self, executor: &str, tx_hash: &str, rating: i64, now: i64) -> Result<i64> {
        let url = format!("{}/agents/{executor}/outcomes", self.base_url);
        let body = RecordOutcomeBody { tx_hash, rating, now };
        let client = self.http.clone();

        self.retry_request(|| async {
            let resp = client.post(&url).json(&body).send().await?;
            ensure_success(&resp).await?;
            let parsed: RecordOutcomeResponse = resp.json().await?;
            Ok(parsed.score)
        })
        .await
    }

    async fn slash(&self, offender: &str, reason: &str) -> Result<()> {
        let url = format!("{}/agents/{offender}/slash", self.base_url);
        let body = SlashBody { reason };
        let client = self.http.clone();

        self.retry_request(|| async {
            let resp = client.post(&url).json(&body).send().await?;
            ensure_success(&resp).await?;
            Ok(())
        })
        .await
    }

    async fn withdraw_stake(&self, address: &str) -> Result<Decimal> {
        let url = format!("{}/agents/{address}/withdraw", self.base_url);
        let client = self.http.clone();

        self.retry_request(|| async {
            let resp = client.post(&url).send().await?;
            ensure_success(&resp).await?;
            let parsed: WithdrawResponse = resp.json().await?;
            Ok(parsed.stake)
        })
        .await
    }

    async fn verify_payment(&self, params: VerifyParams, now: i64) -> Result<VerifyOutcome> {
        let recipient = match &params.expected_recipient {
            Some(r) => r.clone(),
            None => return Ok(evaluate_verify(&params, &[], now)),
        };
        let lookback = params.lookback_limit.unwrap_or(DEFAULT_LOOKBACK);
        let url = format!(
            "{}/accounts/{recipient}/inbound?limit={lookback}",
            self.base_url
        );
        let client = self.http.clone();

        let history: Vec<TransactionRecord> = self
            .retry_request(|| async {
                let resp = client.get(&url).send().await?;
                ensure_success(&resp).await?;
                let parsed: Vec<RemoteTransaction> = resp.json().await?;
                Ok(parsed.into_iter().map(TransactionRecord::from).collect())
            })
            .await?;

        Ok(evaluate_verify(&params, &history, now))
    }
}

async fn ensure_success(resp: &reqwest::Response) -> Result<()> {
    if resp.status().is_success() {
        Ok(())
    } else {
        Err(ReputationError::HostAdapterResponse(format!(
            "{} returned {}",
            resp.url(),
            resp.status()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn get_reputation_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agents/EQA/reputation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "reputation": 120 })))
            .mount(&server)
            .await;

        let adapter = HttpHostAdapter::new(server.uri());
        let reputation = adapter.get_reputation("EQA").await.unwrap();
        assert_eq!(reputation, 120);
    }

    #[tokio::test]
    async fn register_agent_posts_stake_and_now() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agents/EQA/register"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let adapter = HttpHostAdapter::new(server.uri());
        adapter.register_agent("EQA", Decimal::new(10, 0), 1_000).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_surfaces_as_host_adapter_response_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agents/EQA/reputation"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let cfg = RetryConfig {
            max_retries: 0,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
        };
        let adapter = HttpHostAdapter::with_retry_config(server.uri(), cfg);
        let err = adapter.get_reputation("EQA").await.unwrap_err();
        assert!(matches!(err, ReputationError::HostAdapterResponse(_)));
    }

    #[tokio::test]
    async fn verify_payment_evaluates_remote_inbound_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/EQR/inbound"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "hash": "deadbeef",
                    "recipient": "EQR",
                    "sender": "EQS",
                    "amount": "100",
                    "internal_inbound": true,
                    "succeeded": true,
                    "timestamp": 1_000
                }
            ])))
            .mount(&server)
            .await;

        let adapter = HttpHostAdapter::new(server.uri());
        let params = VerifyParams {
            tx_hash: Some("deadbeef".to_string()),
            amount: Decimal::new(100, 0),
            expected_recipient: Some("EQR".to_string()),
            ..VerifyParams::default()
        };
        let outcome = adapter.verify_payment(params, 1_000).await.unwrap();
        assert!(outcome.is_ok());
    }
}
