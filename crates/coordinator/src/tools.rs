//! The five external tool operations: `register`, `broadcast`,
//! `offer`, `settle`, `peers`. Each returns `Ok` on success or a typed
//! [`CoordinatorError`] with a human-readable message on
//! validation/precondition failure — tool callers surface the error
//! synchronously, with no partial state change.

use mesh_protocol::{serialize, Message};
use mesh_reputation::VerifyParams;
use mesh_store::{DealOutcome, Intent, IntentStatus, Offer as StoredOffer, Peer, PeerUpsert};
use rust_decimal::Decimal;

use crate::dispatch::select_and_accept;
use crate::engine::EngineHandle;
use crate::error::{CoordinatorError, Result};

fn validate_finite_nonnegative(label: &str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO {
        return Err(CoordinatorError::Validation(format!("{label} must be non-negative")));
    }
    Ok(())
}

/// `register`: calls `reputation.registerAgent`, upserts self-peer,
/// broadcasts a beacon.
pub async fn register(
    engine: &EngineHandle,
    skills: Vec<String>,
    min_fee: Decimal,
    stake: Decimal,
    now: i64,
) -> Result<Peer> {
    validate_finite_nonnegative("minFee", min_fee)?;
    validate_finite_nonnegative("stake", stake)?;

    engine.reputation.register_agent(engine.own_address(), stake, now).await?;
    let stake_info = engine.reputation.get_stake_info(engine.own_address(), now).await?;
    let reputation = engine.reputation.get_reputation(engine.own_address()).await?;

    let peer = engine
        .store
        .upsert_peer(PeerUpsert {
            address: engine.own_address().to_string(),
            skills: skills.into_iter().collect(),
            min_fee,
            response_time: engine.config.response_time.clone(),
            reputation,
            stake: stake_info.stake,
            stake_age_seconds: stake_info.age_seconds,
            reply_chat: engine.config.reply_chat.clone(),
            seen_at: now,
        })
        .await?;

    let beacon = Message::Beacon(mesh_protocol::Beacon {
        v: "1.0".to_string(),
        from: engine.own_address().to_string(),
        skills: peer.skills.iter().cloned().collect(),
        min_fee: Some(peer.min_fee),
        response_time: peer.response_time.clone(),
        stake: Some(peer.stake),
        reply_chat: peer.reply_chat.clone(),
    });
    engine
        .transport
        .send(&engine.config.mesh_group_id, &serialize(&beacon))
        .await?;

    Ok(peer)
}

/// `broadcast`: persists a pending intent and broadcasts it.
pub async fn broadcast(
    engine: &EngineHandle,
    skill: String,
    payload: serde_json::Value,
    budget: Decimal,
    deadline: i64,
    min_reputation: i64,
    now: i64,
) -> Result<Intent> {
    if budget <= Decimal::ZERO {
        return Err(CoordinatorError::Validation("budget must be positive".to_string()));
    }
    if min_reputation < 0 {
        return Err(CoordinatorError::Validation("minReputation must be non-negative".to_string()));
    }
    if deadline <= now {
        return Err(CoordinatorError::Validation("deadline must be in the future".to_string()));
    }
    if deadline - now > engine.config.max_intent_deadline_seconds {
        return Err(CoordinatorError::Validation(format!(
            "deadline exceeds the {}s horizon",
            engine.config.max_intent_deadline_seconds
        )));
    }
    let payload_size = serde_json::to_vec(&payload).map(|v| v.len()).unwrap_or(0);
    if payload_size > engine.config.max_payload_bytes {
        return Err(CoordinatorError::Validation(format!(
            "payload exceeds {} bytes",
            engine.config.max_payload_bytes
        )));
    }

    let intent = Intent {
        id: uuid::Uuid::new_v4().to_string(),
        from_address: engine.own_address().to_string(),
        skill: skill.clone(),
        payload: payload.clone(),
        budget,
        deadline,
        min_reputation,
        status: IntentStatus::Pending,
        accepted_offer_id: None,
        selected_executor: None,
        created_at: now,
        updated_at: now,
    };
    let saved = engine.store.save_intent(intent).await?;

    let msg = Message::Intent(mesh_protocol::Intent {
        v: "1.0".to_string(),
        id: saved.id.clone(),
        from: saved.from_address.clone(),
        skill,
        budget,
        deadline,
        min_reputation,
        payload,
    });
    engine
        .transport
        .send(&engine.config.mesh_group_id, &serialize(&msg))
        .await?;

    Ok(saved)
}

/// `offer`: validates self-skill match, self-rep ≥ minReputation, fee
/// ≤ budget; records the offer; broadcasts it.
pub async fn offer(engine: &EngineHandle, intent_id: &str, fee: Decimal, eta: String, now: i64) -> Result<StoredOffer> {
    validate_finite_nonnegative("fee", fee)?;
    if fee <= Decimal::ZERO {
        return Err(CoordinatorError::Validation("fee must be positive".to_string()));
    }

    let intent = engine
        .store
        .get_intent(intent_id)
        .await?
        .ok_or_else(|| CoordinatorError::PreconditionFailed(format!("intent {intent_id} not found")))?;

    if !engine.config.skills.contains(&intent.skill) {
        return Err(CoordinatorError::PreconditionFailed(format!(
            "self does not have skill {}",
            intent.skill
        )));
    }
    let self_rep = engine.reputation.get_reputation(engine.own_address()).await?;
    if self_rep < intent.min_reputation {
        return Err(CoordinatorError::PreconditionFailed(
            "self reputation below intent.minReputation".to_string(),
        ));
    }
    if fee > intent.budget {
        return Err(CoordinatorError::PreconditionFailed("fee exceeds intent budget".to_string()));
    }

    let stake_info = engine.reputation.get_stake_info(engine.own_address(), now).await?;
    let stored = StoredOffer {
        id: StoredOffer::derive_id(intent_id, engine.own_address(), now),
        intent_id: intent_id.to_string(),
        from_address: engine.own_address().to_string(),
        fee,
        eta: eta.clone(),
        reputation: Some(self_rep),
        stake_age_seconds: Some(stake_info.age_seconds),
        escrow_address: None,
        created_at: now,
    };
    let saved = engine.store.record_offer(stored).await?;

    let msg = Message::Offer(mesh_protocol::Offer {
        v: "1.0".to_string(),
        intent_id: intent_id.to_string(),
        from: engine.own_address().to_string(),
        fee,
        eta,
        reputation: Some(self_rep),
        escrow_address: None,
    });
    engine
        .transport
        .send(&engine.config.mesh_group_id, &serialize(&msg))
        .await?;

    if !engine.config.wait_for_deadline && intent.from_address == engine.own_address() {
        select_and_accept(engine, intent_id, now).await?;
    }

    Ok(saved)
}

/// `settle`: `verifyPayment`, then `recordOutcome`, then broadcasts
/// settle and updates the deal + intent status. Aborts with
/// [`CoordinatorError::VerificationFailure`] on a failed verification —
/// no reputation update, no outbound settle message.
pub async fn settle(
    engine: &EngineHandle,
    intent_id: &str,
    tx_hash: String,
    outcome: DealOutcome,
    rating: i64,
    now: i64,
) -> Result<mesh_store::Deal> {
    if !(1..=10).contains(&rating) {
        return Err(CoordinatorError::Validation("rating must be in 1..10".to_string()));
    }

    let intent = engine
        .store
        .get_intent(intent_id)
        .await?
        .ok_or_else(|| CoordinatorError::PreconditionFailed(format!("intent {intent_id} not found")))?;
    let deal = engine
        .store
        .get_deal(intent_id)
        .await?
        .ok_or_else(|| CoordinatorError::PreconditionFailed(format!("no deal recorded for intent {intent_id}")))?;

    let verify_outcome = engine
        .reputation
        .verify_payment(
            VerifyParams {
                tx_hash: Some(tx_hash.clone()),
                amount: deal.fee,
                expected_recipient: Some(engine.own_address().to_string()),
                expected_sender: Some(intent.from_address.clone()),
                intent_id: Some(intent_id.to_string()),
                ..VerifyParams::default()
            },
            now,
        )
        .await?;

    let mesh_reputation::VerifyOutcome::Verified(_) = verify_outcome else {
        return Err(CoordinatorError::VerificationFailure(format!(
            "verifyPayment rejected settlement for intent {intent_id}"
        )));
    };

    let protocol_outcome = match outcome {
        DealOutcome::Success => mesh_protocol::Outcome::Success,
        DealOutcome::Failure => mesh_protocol::Outcome::Failure,
    };

    engine
        .reputation
        .record_outcome(engine.own_address(), &tx_hash, rating, now)
        .await?;

    let updated_deal = engine
        .store
        .settle_deal(intent_id, &tx_hash, outcome, rating, now)
        .await?
        .ok_or_else(|| CoordinatorError::PreconditionFailed(format!("deal for intent {intent_id} vanished")))?;
    engine
        .store
        .update_intent_status(intent_id, IntentStatus::Settled, now)
        .await?;

    let msg = Message::Settle(mesh_protocol::Settle {
        v: "1.0".to_string(),
        intent_id: intent_id.to_string(),
        from: engine.own_address().to_string(),
        tx_hash,
        outcome: protocol_outcome,
        rating,
    });
    engine
        .transport
        .send(&engine.config.mesh_group_id, &serialize(&msg))
        .await?;

    Ok(updated_deal)
}

/// `peers`: returns `listPeers`.
pub async fn peers(engine: &EngineHandle) -> Result<Vec<Peer>> {
    Ok(engine.store.list_peers().await?)
}
