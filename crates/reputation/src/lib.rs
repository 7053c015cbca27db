//! Reputation/stake facade: a uniform API over either a real on-chain
//! host adapter or an in-process local simulation, gated by trust
//! mode.

pub mod error;
pub mod fallback;
pub mod host_adapter;
pub mod models;
pub mod verify;

use async_trait::async_trait;
use rust_decimal::Decimal;

pub use error::{ReputationError, Result};
pub use models::{
    StakeInfo, TransactionRecord, VerifyFailureReason, VerifyOutcome, VerifyParams,
    DEFAULT_LOOKBACK,
};

#[cfg(any(test, feature = "test-support"))]
pub use fallback::LocalFallback;

/// Operations common to the host adapter and the local fallback.
#[async_trait]
pub trait ReputationBackend: Send + Sync {
    async fn register_agent(&self, address: &str, stake: Decimal, now: i64) -> Result<()>;
    async fn get_reputation(&self, address: &str) -> Result<i64>;
    async fn get_stake_info(&self, address: &str, now: i64) -> Result<StakeInfo>;
    async fn record_outcome(&self, executor: &str, tx_hash: &str, rating: i64, now: i64) -> Result<i64>;
    async fn slash(&self, offender: &str, reason: &str) -> Result<()>;
    async fn withdraw_stake(&self, address: &str) -> Result<Decimal>;
    async fn verify_payment(&self, params: VerifyParams, now: i64) -> Result<VerifyOutcome>;
}

/// `strictChain` is the single authoritative gate: when set and no
/// host adapter is configured, chain-mutating operations fail rather
/// than silently falling back to the local simulation.
#[derive(Debug, Clone, Copy)]
pub struct TrustMode {
    pub strict_chain: bool,
    pub allow_local_fallback: bool,
}

impl TrustMode {
    pub fn for_environment(mode: &str) -> Self {
        let strict_chain = matches!(mode, "production" | "mainnet");
        Self {
            strict_chain,
            allow_local_fallback: !strict_chain,
        }
    }
}

pub struct ReputationClient {
    host_adapter: Option<Box<dyn ReputationBackend>>,
    local_fallback: fallback::LocalFallback,
    trust_mode: TrustMode,
}

impl ReputationClient {
    pub fn new(host_adapter: Option<Box<dyn ReputationBackend>>, trust_mode: TrustMode) -> Self {
        Self {
            host_adapter,
            local_fallback: fallback::LocalFallback::new(),
            trust_mode,
        }
    }

    /// Resolves the backend for `registerAgent` / `recordOutcome` /
    /// `slash` / `withdrawStake` — the chain-mutating operations
    /// spec.md gates on `strictChain`.
    fn mutation_backend(&self) -> Result<&dyn ReputationBackend> {
        if let Some(adapter) = &self.host_adapter {
            return Ok(adapter.as_ref());
        }
        if self.trust_mode.strict_chain || !self.trust_mode.allow_local_fallback {
            return Err(ReputationError::ChainPathUnavailable);
        }
        Ok(&self.local_fallback)
    }

    /// Read operations are never gated: a read-only lookup against the
    /// local simulation is harmless even in strict mode, and the
    /// ranker needs a reputation source in tests that run without a
    /// configured host adapter.
    fn read_backend(&self) -> &dyn ReputationBackend {
        self.host_adapter.as_deref().unwrap_or(&self.local_fallback)
    }

    pub async fn register_agent(&self, address: &str, stake: Decimal, now: i64) -> Result<()> {
        self.mutation_backend()?.register_agent(address, stake, now).await
    }

    pub async fn get_reputation(&self, address: &str) -> Result<i64> {
        self.read_backend().get_reputation(address).await
    }

    pub async fn get_stake_info(&self, address: &str, now: i64) -> Result<StakeInfo> {
        self.read_backend().get_stake_info(address, now).await
    }

    pub async fn record_outcome(&self, executor: &str, tx_hash: &str, rating: i64, now: i64) -> Result<i64> {
        self.mutation_backend()?
            .record_outcome(executor, tx_hash, rating, now)
            .await
    }

    pub async fn slash(&self, offender: &str, reason: &str) -> Result<()> {
        self.mutation_backend()?.slash(offender, reason).await
    }

    pub async fn withdraw_stake(&self, address: &str) -> Result<Decimal> {
        self.mutation_backend()?.withdraw_stake(address).await
    }

    pub async fn verify_payment(&self, params: VerifyParams, now: i64) -> Result<VerifyOutcome> {
        self.read_backend().verify_payment(params, now).await
    }

    /// Stages a payment in the local simulation ahead of `settle`, so
    /// integration tests (and the demo/CLI path) can drive
    /// `verifyPayment` to a real `Verified` outcome without a host
    /// adapter. No-op if a real host adapter is configured — that
    /// backend's chain state isn't staged this way.
    #[cfg(any(test, feature = "test-support"))]
    pub fn seed_local_inbound_transaction(&self, tx: TransactionRecord) {
        self.local_fallback.seed_inbound_transaction(tx);
    }
}
