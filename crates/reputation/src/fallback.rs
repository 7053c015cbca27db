//! In-process simulation of the on-chain reputation registry, used
//! when no host adapter is configured and trust mode permits it.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::warn;

use crate::error::{ReputationError, Result};
use crate::models::{StakeInfo, TransactionRecord, VerifyOutcome, VerifyParams};
use crate::verify::evaluate_verify;
use crate::ReputationBackend;

const MIN_STAKE: Decimal = Decimal::ONE;
const SEED_SCORE: i64 = 100;
const SLASH_STAKE_FRACTION: Decimal = Decimal::from_parts(2, 0, 0, false, 1); // 0.2
const SLASH_REPUTATION_PENALTY: i64 = 50;

#[derive(Default)]
struct State {
    scores: HashMap<String, i64>,
    stakes: HashMap<String, Decimal>,
    stake_since: HashMap<String, i64>,
    seen_tx_hashes: HashMap<String, HashSet<String>>,
    inbound_by_recipient: HashMap<String, Vec<TransactionRecord>>,
}

pub struct LocalFallback {
    state: Mutex<State>,
}

impl Default for LocalFallback {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalFallback {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Seeds a transaction into the simulated chain's recent inbound
    /// history, for tests and for the demo/CLI path to stage a payment
    /// before settle verifies it.
    pub fn seed_inbound_transaction(&self, tx: TransactionRecord) {
        let mut state = self.state.lock().unwrap();
        state
            .inbound_by_recipient
            .entry(tx.recipient.clone())
            .or_default()
            .insert(0, tx);
    }
}

#[async_trait]
impl ReputationBackend for LocalFallback {
    async fn register_agent(&self, address: &str, stake: Decimal, now: i64) -> Result<()> {
        if stake < MIN_STAKE {
            return Err(ReputationError::MinStakeViolation {
                stake: stake.to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        if !state.scores.contains_key(address) {
            state.scores.insert(address.to_string(), SEED_SCORE);
            state.stake_since.insert(address.to_string(), now);
        }
        state.stakes.insert(address.to_string(), stake);
        Ok(())
    }

    async fn get_reputation(&self, address: &str) -> Result<i64> {
        let state = self.state.lock().unwrap();
        Ok(state.scores.get(address).copied().unwrap_or(0))
    }

    async fn get_stake_info(&self, address: &str, now: i64) -> Result<StakeInfo> {
        let state = self.state.lock().unwrap();
        let stake = state.stakes.get(address).copied().unwrap_or(Decimal::ZERO);
        let since = state.stake_since.get(address).copied().unwrap_or(now);
        Ok(StakeInfo {
            stake,
            since,
            age_seconds: (now - since).max(0),
        })
    }

    async fn record_outcome(&self, executor: &str, tx_hash: &str, rating: i64, now: i64) -> Result<i64> {
        let _ = now;
        let mut state = self.state.lock().unwrap();
        let seen = state.seen_tx_hashes.entry(executor.to_string()).or_default();
        if !seen.insert(tx_hash.to_string()) {
            return Err(ReputationError::ReplayedOutcome {
                executor: executor.to_string(),
                tx_hash: tx_hash.to_string(),
            });
        }

        let delta = reputation_delta(rating);
        let score = state.scores.entry(executor.to_string()).or_insert(0);
        *score = (*score + delta).max(0);
        Ok(*score)
    }

    async fn slash(&self, offender: &str, reason: &str) -> Result<()> {
        warn!(offender, reason, "slashing agent stake and reputation");
        let mut state = self.state.lock().unwrap();

        let stake = state.stakes.get(offender).copied().unwrap_or(Decimal::ZERO);
        let slashed = stake * SLASH_STAKE_FRACTION;
        state
            .stakes
            .insert(offender.to_string(), (stake - slashed).max(Decimal::ZERO));

        let reputation = state.scores.get(offender).copied().unwrap_or(0);
        state
            .scores
            .insert(offender.to_string(), (reputation - SLASH_REPUTATION_PENALTY).max(0));

        Ok(())
    }

    async fn withdraw_stake(&self, address: &str) -> Result<Decimal> {
        let mut state = self.state.lock().unwrap();
        let prior = state.stakes.remove(address).unwrap_or(Decimal::ZERO);
        state.scores.remove(address);
        state.stake_since.remove(address);
        Ok(prior)
    }

    async fn verify_payment(&self, params: VerifyParams, now: i64) -> Result<VerifyOutcome> {
        let recipient = params.expected_recipient.clone().unwrap_or_default();
        let state = self.state.lock().unwrap();
        let history = state
            .inbound_by_recipient
            .get(&recipient)
            .cloned()
            .unwrap_or_default();
        drop(state);
        Ok(evaluate_verify(&params, &history, now))
    }
}

fn reputation_delta(rating: i64) -> i64 {
    match rating {
        r if r >= 9 => 15,
        r if r >= 7 => 8,
        r if r >= 5 => 2,
        r if r >= 3 => -10,
        _ => -25,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_agent_rejects_understake() {
        let fallback = LocalFallback::new();
        let err = fallback
            .register_agent("EQA", Decimal::new(5, 1), 1_000)
            .await
            .unwrap_err();
        assert!(matches!(err, ReputationError::MinStakeViolation { .. }));
    }

    #[tokio::test]
    async fn first_registration_seeds_score_and_stake_since() {
        let fallback = LocalFallback::new();
        fallback.register_agent("EQA", Decimal::new(5, 0), 1_000).await.unwrap();
        assert_eq!(fallback.get_reputation("EQA").await.unwrap(), 100);
        let info = fallback.get_stake_info("EQA", 1_500).await.unwrap();
        assert_eq!(info.since, 1_000);
        assert_eq!(info.age_seconds, 500);
    }

    #[tokio::test]
    async fn re_registration_preserves_score_and_stake_since() {
        let fallback = LocalFallback::new();
        fallback.register_agent("EQA", Decimal::new(5, 0), 1_000).await.unwrap();
        fallback
            .record_outcome("EQA", "tx1", 9, 1_100)
            .await
            .unwrap();
        fallback.register_agent("EQA", Decimal::new(10, 0), 2_000).await.unwrap();

        assert_eq!(fallback.get_reputation("EQA").await.unwrap(), 115);
        let info = fallback.get_stake_info("EQA", 2_100).await.unwrap();
        assert_eq!(info.since, 1_000);
        assert_eq!(info.stake, Decimal::new(10, 0));
    }

    #[tokio::test]
    async fn record_outcome_rejects_tx_replay() {
        let fallback = LocalFallback::new();
        fallback.register_agent("EQA", Decimal::ONE, 1_000).await.unwrap();
        fallback.record_outcome("EQA", "tx1", 10, 1_100).await.unwrap();
        let err = fallback.record_outcome("EQA", "tx1", 10, 1_200).await.unwrap_err();
        assert!(matches!(err, ReputationError::ReplayedOutcome { .. }));
    }

    #[tokio::test]
    async fn reputation_delta_table_matches_rating_bands() {
        assert_eq!(reputation_delta(10), 15);
        assert_eq!(reputation_delta(9), 15);
        assert_eq!(reputation_delta(8), 8);
        assert_eq!(reputation_delta(7), 8);
        assert_eq!(reputation_delta(6), 2);
        assert_eq!(reputation_delta(5), 2);
        assert_eq!(reputation_delta(4), -10);
        assert_eq!(reputation_delta(3), -10);
        assert_eq!(reputation_delta(2), -25);
        assert_eq!(reputation_delta(1), -25);
    }

    #[tokio::test]
    async fn score_never_drops_below_zero() {
        let fallback = LocalFallback::new();
        fallback.register_agent("EQA", Decimal::ONE, 1_000).await.unwrap();
        for i in 0..10 {
            fallback
                .record_outcome("EQA", &format!("tx{i}"), 1, 1_000 + i)
                .await
                .unwrap();
        }
        assert_eq!(fallback.get_reputation("EQA").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn slash_reduces_stake_by_20_percent_and_reputation_by_50() {
        let fallback = LocalFallback::new();
        fallback.register_agent("EQA", Decimal::new(100, 0), 1_000).await.unwrap();
        fallback.slash("EQA", "missed_deadline").await.unwrap();

        let info = fallback.get_stake_info("EQA", 1_000).await.unwrap();
        assert_eq!(info.stake, Decimal::new(80, 0));
        assert_eq!(fallback.get_reputation("EQA").await.unwrap(), 50);
    }

    #[tokio::test]
    async fn withdraw_stake_removes_agent_entirely() {
        let fallback = LocalFallback::new();
        fallback.register_agent("EQA", Decimal::new(100, 0), 1_000).await.unwrap();
        let withdrawn = fallback.withdraw_stake("EQA").await.unwrap();
        assert_eq!(withdrawn, Decimal::new(100, 0));
        assert_eq!(fallback.get_reputation("EQA").await.unwrap(), 0);
        let info = fallback.get_stake_info("EQA", 2_000).await.unwrap();
        assert_eq!(info.stake, Decimal::ZERO);
    }

    #[tokio::test]
    async fn verify_payment_uses_seeded_history() {
        let fallback = LocalFallback::new();
        fallback.seed_inbound_transaction(TransactionRecord {
            hash: "deadbeef".to_string(),
            recipient: "EQR".to_string(),
            sender: "EQS".to_string(),
            amount: Decimal::new(100, 0),
            is_internal_inbound: true,
            succeeded: true,
            timestamp: 1_000,
        });

        let params = VerifyParams {
            tx_hash: Some("deadbeef".to_string()),
            amount: Decimal::new(100, 0),
            expected_recipient: Some("EQR".to_string()),
            ..VerifyParams::default()
        };
        let outcome = fallback.verify_payment(params, 1_000).await.unwrap();
        assert!(outcome.is_ok());
    }
}
