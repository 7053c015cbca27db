//! The shared `verifyPayment` matching algorithm.
//!
//! Both backends fetch a recipient's recent inbound transaction
//! history their own way (local maps vs. a chain RPC call) and then
//! run the exact same evaluation here, so host-adapter and
//! local-fallback semantics can be tested against one reference.

use base64::Engine;

use crate::models::{TransactionRecord, VerifyFailureReason, VerifyOutcome, VerifyParams, DEFAULT_LOOKBACK};

pub fn evaluate_verify(
    params: &VerifyParams,
    recent_inbound: &[TransactionRecord],
    now: i64,
) -> VerifyOutcome {
    let Some(tx_hash) = params.tx_hash.as_deref().filter(|s| !s.is_empty()) else {
        return VerifyOutcome::Rejected(VerifyFailureReason::MissingTxHash);
    };
    let Some(expected_recipient) = params.expected_recipient.as_deref().filter(|s| !s.is_empty())
    else {
        return VerifyOutcome::Rejected(VerifyFailureReason::MissingExpectedRecipient);
    };
    let Some(target) = normalize_hash(tx_hash) else {
        return VerifyOutcome::Rejected(VerifyFailureReason::InvalidVerifyParams);
    };

    let lookback = params.lookback_limit.unwrap_or(DEFAULT_LOOKBACK);
    let matched = recent_inbound
        .iter()
        .take(lookback)
        .find(|tx| normalize_hash(&tx.hash).as_deref() == Some(target.as_slice()));

    let Some(tx) = matched else {
        return VerifyOutcome::Rejected(VerifyFailureReason::TxNotFoundInRecentRecipientHistory);
    };

    if !tx.is_internal_inbound {
        return VerifyOutcome::Rejected(VerifyFailureReason::TxHasNoInternalInbound);
    }
    if tx.recipient != expected_recipient {
        return VerifyOutcome::Rejected(VerifyFailureReason::RecipientMismatch);
    }
    if let Some(expected_sender) = params.expected_sender.as_deref() {
        if tx.sender != expected_sender {
            return VerifyOutcome::Rejected(VerifyFailureReason::SenderMismatch);
        }
    }

    let amount_ok = if params.allow_amount_greater_or_equal {
        tx.amount >= params.amount
    } else {
        tx.amount == params.amount
    };
    if !amount_ok {
        return VerifyOutcome::Rejected(VerifyFailureReason::AmountMismatch);
    }

    if let Some(max_age) = params.max_tx_age_seconds {
        if now.saturating_sub(tx.timestamp) > max_age {
            return VerifyOutcome::Rejected(VerifyFailureReason::TxTooOld);
        }
    }

    if !tx.succeeded {
        return VerifyOutcome::Rejected(VerifyFailureReason::TxFailed);
    }

    VerifyOutcome::Verified(tx.clone())
}

/// Hex or base64, case-insensitive, left-padded to 32 bytes.
pub fn normalize_hash(raw: &str) -> Option<Vec<u8>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let bytes = hex::decode(trimmed.to_ascii_lowercase())
        .ok()
        .or_else(|| base64::engine::general_purpose::STANDARD.decode(trimmed).ok())
        .or_else(|| {
            base64::engine::general_purpose::URL_SAFE_NO_PAD
                .decode(trimmed)
                .ok()
        })?;

    Some(left_pad_32(bytes))
}

fn left_pad_32(bytes: Vec<u8>) -> Vec<u8> {
    if bytes.len() >= 32 {
        return bytes;
    }
    let mut padded = vec![0u8; 32 - bytes.len()];
    padded.extend(bytes);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn tx(hash: &str, recipient: &str, sender: &str, amount: i64, timestamp: i64) -> TransactionRecord {
        TransactionRecord {
            hash: hash.to_string(),
            recipient: recipient.to_string(),
            sender: sender.to_string(),
            amount: Decimal::new(amount, 0),
            is_internal_inbound: true,
            succeeded: true,
            timestamp,
        }
    }

    fn base_params(hash: &str, recipient: &str) -> VerifyParams {
        VerifyParams {
            tx_hash: Some(hash.to_string()),
            amount: Decimal::new(100, 0),
            expected_recipient: Some(recipient.to_string()),
            ..VerifyParams::default()
        }
    }

    #[test]
    fn missing_tx_hash_is_rejected() {
        let params = VerifyParams {
            expected_recipient: Some("EQR".to_string()),
            ..VerifyParams::default()
        };
        let outcome = evaluate_verify(&params, &[], 1_000);
        assert!(matches!(
            outcome,
            VerifyOutcome::Rejected(VerifyFailureReason::MissingTxHash)
        ));
    }

    #[test]
    fn missing_recipient_is_rejected() {
        let params = VerifyParams {
            tx_hash: Some("deadbeef".to_string()),
            ..VerifyParams::default()
        };
        let outcome = evaluate_verify(&params, &[], 1_000);
        assert!(matches!(
            outcome,
            VerifyOutcome::Rejected(VerifyFailureReason::MissingExpectedRecipient)
        ));
    }

    #[test]
    fn unparseable_hash_is_invalid_params() {
        let params = base_params("not hex or base64!!", "EQR");
        let outcome = evaluate_verify(&params, &[], 1_000);
        assert!(matches!(
            outcome,
            VerifyOutcome::Rejected(VerifyFailureReason::InvalidVerifyParams)
        ));
    }

    #[test]
    fn hash_not_in_history_is_rejected() {
        let params = base_params("deadbeef", "EQR");
        let history = vec![tx("cafebabe", "EQR", "EQS", 100, 1_000)];
        let outcome = evaluate_verify(&params, &history, 1_000);
        assert!(matches!(
            outcome,
            VerifyOutcome::Rejected(VerifyFailureReason::TxNotFoundInRecentRecipientHistory)
        ));
    }

    #[test]
    fn hex_and_base64_hashes_of_the_same_bytes_match() {
        let hex_hash = "deadbeef";
        let b64_hash = base64::engine::general_purpose::STANDARD.encode(hex::decode(hex_hash).unwrap());
        let params = base_params(&b64_hash, "EQR");
        let history = vec![tx(hex_hash, "EQR", "EQS", 100, 1_000)];
        let outcome = evaluate_verify(&params, &history, 1_000);
        assert!(outcome.is_ok());
    }

    #[test]
    fn recipient_mismatch_is_rejected() {
        let params = base_params("deadbeef", "EQR");
        let history = vec![tx("deadbeef", "EQ_other", "EQS", 100, 1_000)];
        let outcome = evaluate_verify(&params, &history, 1_000);
        assert!(matches!(
            outcome,
            VerifyOutcome::Rejected(VerifyFailureReason::RecipientMismatch)
        ));
    }

    #[test]
    fn sender_mismatch_is_rejected_when_expected_sender_given() {
        let mut params = base_params("deadbeef", "EQR");
        params.expected_sender = Some("EQ_expected".to_string());
        let history = vec![tx("deadbeef", "EQR", "EQ_actual", 100, 1_000)];
        let outcome = evaluate_verify(&params, &history, 1_000);
        assert!(matches!(
            outcome,
            VerifyOutcome::Rejected(VerifyFailureReason::SenderMismatch)
        ));
    }

    #[test]
    fn amount_greater_than_required_passes_by_default() {
        let mut params = base_params("deadbeef", "EQR");
        params.amount = Decimal::new(50, 0);
        let history = vec![tx("deadbeef", "EQR", "EQS", 100, 1_000)];
        let outcome = evaluate_verify(&params, &history, 1_000);
        assert!(outcome.is_ok());
    }

    #[test]
    fn amount_below_required_is_rejected() {
        let mut params = base_params("deadbeef", "EQR");
        params.amount = Decimal::new(200, 0);
        let history = vec![tx("deadbeef", "EQR", "EQS", 100, 1_000)];
        let outcome = evaluate_verify(&params, &history, 1_000);
        assert!(matches!(
            outcome,
            VerifyOutcome::Rejected(VerifyFailureReason::AmountMismatch)
        ));
    }

    #[test]
    fn exact_amount_required_when_flag_disabled() {
        let mut params = base_params("deadbeef", "EQR");
        params.amount = Decimal::new(50, 0);
        params.allow_amount_greater_or_equal = false;
        let history = vec![tx("deadbeef", "EQR", "EQS", 100, 1_000)];
        let outcome = evaluate_verify(&params, &history, 1_000);
        assert!(matches!(
            outcome,
            VerifyOutcome::Rejected(VerifyFailureReason::AmountMismatch)
        ));
    }

    #[test]
    fn transaction_older_than_max_age_is_rejected() {
        let mut params = base_params("deadbeef", "EQR");
        params.max_tx_age_seconds = Some(60);
        let history = vec![tx("deadbeef", "EQR", "EQS", 100, 0)];
        let outcome = evaluate_verify(&params, &history, 1_000);
        assert!(matches!(
            outcome,
            VerifyOutcome::Rejected(VerifyFailureReason::TxTooOld)
        ));
    }

    #[test]
    fn failed_transaction_is_rejected() {
        let params = base_params("deadbeef", "EQR");
        let mut failing = tx("deadbeef", "EQR", "EQS", 100, 1_000);
        failing.succeeded = false;
        let outcome = evaluate_verify(&params, &[failing], 1_000);
        assert!(matches!(
            outcome,
            VerifyOutcome::Rejected(VerifyFailureReason::TxFailed)
        ));
    }

    #[test]
    fn non_internal_transfer_is_rejected() {
        let params = base_params("deadbeef", "EQR");
        let mut external = tx("deadbeef", "EQR", "EQS", 100, 1_000);
        external.is_internal_inbound = false;
        let outcome = evaluate_verify(&params, &[external], 1_000);
        assert!(matches!(
            outcome,
            VerifyOutcome::Rejected(VerifyFailureReason::TxHasNoInternalInbound)
        ));
    }

    #[test]
    fn valid_transaction_is_verified() {
        let params = base_params("deadbeef", "EQR");
        let history = vec![tx("deadbeef", "EQR", "EQS", 100, 1_000)];
        let outcome = evaluate_verify(&params, &history, 1_000);
        assert!(outcome.is_ok());
    }

    #[test]
    fn lookback_limit_is_honored() {
        let params = VerifyParams {
            lookback_limit: Some(1),
            ..base_params("deadbeef", "EQR")
        };
        let history = vec![
            tx("cafebabe", "EQR", "EQS", 100, 1_000),
            tx("deadbeef", "EQR", "EQS", 100, 1_000),
        ];
        let outcome = evaluate_verify(&params, &history, 1_000);
        assert!(matches!(
            outcome,
            VerifyOutcome::Rejected(VerifyFailureReason::TxNotFoundInRecentRecipientHistory)
        ));
    }
}
