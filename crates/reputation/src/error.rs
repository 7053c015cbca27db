//! Error types for the reputation facade.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReputationError {
    #[error("strict chain mode requires a host adapter but none is configured")]
    ChainPathUnavailable,

    #[error("stake {stake} is below the minimum required stake")]
    MinStakeViolation { stake: String },

    #[error("transaction {tx_hash} was already recorded for {executor}")]
    ReplayedOutcome { executor: String, tx_hash: String },

    #[error("host adapter request failed: {0}")]
    HostAdapter(#[from] reqwest::Error),

    #[error("host adapter returned an unexpected response: {0}")]
    HostAdapterResponse(String),
}

impl ReputationError {
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self {
            Self::ChainPathUnavailable => Level::ERROR,
            Self::MinStakeViolation { .. } | Self::ReplayedOutcome { .. } => Level::WARN,
            Self::HostAdapter(_) | Self::HostAdapterResponse(_) => Level::WARN,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::HostAdapter(e) if e.is_timeout() || e.is_connect())
    }
}

pub type Result<T> = std::result::Result<T, ReputationError>;
