//! The coordinator's error taxonomy: the union tool callers see, plus
//! the seven-class model ingest dispatch reasons about internally.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// Malformed tool args: bad rating, non-finite fee, deadline in the
    /// past or beyond the horizon, oversize payload. No state change.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Intent not found, not pending, skill mismatch, reputation too
    /// low, budget too low, replay detected.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// `verifyPayment` returned `ok:false` at settle time. Aborts the
    /// settle flow; no reputation update, no outbound settle message.
    #[error("payment verification failed: {0}")]
    VerificationFailure(String),

    #[error(transparent)]
    Store(#[from] mesh_store::StoreError),

    #[error(transparent)]
    Reputation(#[from] mesh_reputation::ReputationError),

    #[error(transparent)]
    Ranking(#[from] mesh_ranker::RankingError),

    #[error("transport send failed: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl CoordinatorError {
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self {
            Self::Validation(_) => Level::WARN,
            Self::PreconditionFailed(_) => Level::WARN,
            Self::VerificationFailure(_) => Level::WARN,
            Self::Store(e) => e.log_level(),
            Self::Reputation(e) => e.log_level(),
            Self::Ranking(_) => Level::DEBUG,
            Self::Transport(_) => Level::ERROR,
            Self::Config(_) => Level::ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
