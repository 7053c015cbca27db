//! Error types for ranking.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RankingError {
    #[error("cannot rank an empty offer set for intent {0}")]
    EmptyOfferSet(String),

    #[error("invalid scoring weights: {0}")]
    InvalidWeights(String),
}

pub type Result<T> = std::result::Result<T, RankingError>;
