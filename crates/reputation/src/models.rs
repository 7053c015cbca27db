//! Shared types crossing the [`crate::ReputationBackend`] seam.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct StakeInfo {
    pub stake: Decimal,
    pub since: i64,
    pub age_seconds: i64,
}

/// Parameters for `verifyPayment`, as passed by settle.
#[derive(Debug, Clone)]
pub struct VerifyParams {
    pub tx_hash: Option<String>,
    pub amount: Decimal,
    pub expected_recipient: Option<String>,
    pub expected_sender: Option<String>,
    pub intent_id: Option<String>,
    pub max_tx_age_seconds: Option<i64>,
    pub lookback_limit: Option<usize>,
    pub allow_amount_greater_or_equal: bool,
}

impl Default for VerifyParams {
    fn default() -> Self {
        Self {
            tx_hash: None,
            amount: Decimal::ZERO,
            expected_recipient: None,
            expected_sender: None,
            intent_id: None,
            max_tx_age_seconds: None,
            lookback_limit: None,
            allow_amount_greater_or_equal: true,
        }
    }
}

pub const DEFAULT_LOOKBACK: usize = 30;

/// The fixed reason enumeration `verifyPayment` can reject with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyFailureReason {
    MissingTxHash,
    MissingExpectedRecipient,
    InvalidVerifyParams,
    TxLookupFailed,
    TxNotFoundInRecentRecipientHistory,
    TxHasNoInternalInbound,
    RecipientMismatch,
    SenderMismatch,
    AmountMismatch,
    TxTooOld,
    TxFailed,
}

impl VerifyFailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingTxHash => "missing_tx_hash",
            Self::MissingExpectedRecipient => "missing_expected_recipient",
            Self::InvalidVerifyParams => "invalid_verify_params",
            Self::TxLookupFailed => "tx_lookup_failed",
            Self::TxNotFoundInRecentRecipientHistory => "tx_not_found_in_recent_recipient_history",
            Self::TxHasNoInternalInbound => "tx_has_no_internal_inbound",
            Self::RecipientMismatch => "recipient_mismatch",
            Self::SenderMismatch => "sender_mismatch",
            Self::AmountMismatch => "amount_mismatch",
            Self::TxTooOld => "tx_too_old",
            Self::TxFailed => "tx_failed",
        }
    }
}

/// One transaction as the recipient's recent inbound history reports
/// it, already shaped for the matching algorithm in [`crate::verify`].
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub hash: String,
    pub recipient: String,
    pub sender: String,
    pub amount: Decimal,
    pub is_internal_inbound: bool,
    pub succeeded: bool,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub enum VerifyOutcome {
    Verified(TransactionRecord),
    Rejected(VerifyFailureReason),
}

impl VerifyOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Verified(_))
    }
}
