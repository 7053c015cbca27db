//! Inbound message ingest: dedup, parse, then per-kind handlers.
//!
//! Mirrors the pipeline in spec.md §4.E exactly: derive a dedup key,
//! drop on duplicate, drop on parse failure, dispatch by message kind.
//! `ProtocolReject`-class drops are logged at `debug!` only — the
//! ingest path must tolerate noise from other group-chat traffic.

use mesh_protocol::{parse, serialize, Message};
use mesh_store::{dedup_key, IntentStatus, Offer as StoredOffer, Peer, PeerUpsert, ProcessedMessageMeta};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::engine::EngineHandle;
use crate::error::Result;
use crate::tools;
use crate::transport::InboundEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Duplicate,
    Dropped,
    Processed(&'static str),
}

pub async fn ingest(engine: &EngineHandle, event: &InboundEvent, now: i64) -> Result<IngestOutcome> {
    let key = dedup_key(
        engine.own_address(),
        event.chat_id.as_deref(),
        event.message_id.as_deref(),
        &event.text,
    );

    let payload_hash = {
        let mut hasher = Sha256::new();
        hasher.update(event.text.as_bytes());
        hex::encode(hasher.finalize())
    };

    let Some(message) = parse(&event.text, now) else {
        debug!(chat_id = ?event.chat_id, "protocol reject: unparseable message, dropping");
        return Ok(IngestOutcome::Dropped);
    };

    let inserted = engine
        .store
        .mark_processed_message(ProcessedMessageMeta {
            key,
            message_type: message.kind().to_string(),
            source_chat_id: event.chat_id.clone(),
            source_message_id: event.message_id.clone(),
            payload_hash,
            first_seen_at: now,
        })
        .await?;

    if !inserted {
        debug!(kind = message.kind(), "duplicate message, dropping");
        return Ok(IngestOutcome::Duplicate);
    }

    match &message {
        Message::Beacon(beacon) => handle_beacon(engine, beacon, now).await?,
        Message::Intent(intent) => handle_intent(engine, intent, now).await?,
        Message::Offer(offer) => handle_offer(engine, offer, now).await?,
        Message::Accept(accept) => handle_accept(engine, accept, now).await?,
        Message::Settle(settle) => handle_settle(engine, settle, now).await?,
        Message::Dispute(_) => debug!("dispute message received; no automated handling defined"),
    }

    Ok(IngestOutcome::Processed(message.kind()))
}

async fn handle_beacon(engine: &EngineHandle, beacon: &mesh_protocol::Beacon, now: i64) -> Result<()> {
    let reputation = engine.reputation.get_reputation(&beacon.from).await?;
    if reputation <= 0 {
        debug!(from = %beacon.from, "unstaked_or_unknown_peer beacon ignored");
        return Ok(());
    }

    let stake_info = engine.reputation.get_stake_info(&beacon.from, now).await?;
    let peer: Peer = engine
        .store
        .upsert_peer(PeerUpsert {
            address: beacon.from.clone(),
            skills: beacon.skills.iter().cloned().collect(),
            min_fee: beacon.min_fee.unwrap_or(Decimal::ZERO),
            response_time: beacon.response_time.clone(),
            reputation,
            stake: beacon.stake.unwrap_or(stake_info.stake),
            stake_age_seconds: stake_info.age_seconds,
            reply_chat: beacon.reply_chat.clone(),
            seen_at: now,
        })
        .await?;
    debug!(address = %peer.address, reputation, "peer beacon recorded");
    Ok(())
}

async fn handle_intent(engine: &EngineHandle, intent: &mesh_protocol::Intent, now: i64) -> Result<()> {
    let payload_size = serde_json::to_vec(&intent.payload).map(|v| v.len()).unwrap_or(0);
    if payload_size > engine.config.max_payload_bytes {
        debug!(intent_id = %intent.id, payload_size, "protocol reject: oversize intent payload, dropping");
        return Ok(());
    }

    let stored = mesh_store::Intent {
        id: intent.id.clone(),
        from_address: intent.from.clone(),
        skill: intent.skill.clone(),
        payload: intent.payload.clone(),
        budget: intent.budget,
        deadline: intent.deadline,
        min_reputation: intent.min_reputation,
        status: IntentStatus::Pending,
        accepted_offer_id: None,
        selected_executor: None,
        created_at: now,
        updated_at: now,
    };
    engine.store.save_intent(stored).await?;

    if intent.from == engine.own_address() {
        return Ok(());
    }

    if !engine.config.skills.contains(&intent.skill) {
        return Ok(());
    }
    let self_rep = engine.reputation.get_reputation(engine.own_address()).await?;
    if self_rep < intent.min_reputation {
        return Ok(());
    }

    let suggested_fee = engine
        .config
        .min_fee
        .max(intent.budget * Decimal::new(75, 2))
        .min(intent.budget);
    if suggested_fee > intent.budget {
        return Ok(());
    }

    info!(intent_id = %intent.id, fee = %suggested_fee, "auto-offering on inbound intent");
    tools::offer(engine, &intent.id, suggested_fee, "5s".to_string(), now).await?;
    Ok(())
}

async fn handle_offer(engine: &EngineHandle, offer: &mesh_protocol::Offer, now: i64) -> Result<()> {
    let created_at = now;
    let stored = StoredOffer {
        id: StoredOffer::derive_id(&offer.intent_id, &offer.from, created_at),
        intent_id: offer.intent_id.clone(),
        from_address: offer.from.clone(),
        fee: offer.fee,
        eta: offer.eta.clone(),
        reputation: offer.reputation,
        stake_age_seconds: None,
        escrow_address: offer.escrow_address.clone(),
        created_at,
    };
    engine.store.record_offer(stored).await?;

    let Some(intent) = engine.store.get_intent(&offer.intent_id).await? else {
        return Ok(());
    };
    if intent.from_address != engine.own_address() || intent.status != IntentStatus::Pending {
        return Ok(());
    }
    if engine.config.wait_for_deadline {
        return Ok(());
    }

    select_and_accept(engine, &offer.intent_id, now).await
}

async fn handle_accept(engine: &EngineHandle, accept: &mesh_protocol::Accept, now: i64) -> Result<()> {
    let Some(intent) = engine.store.get_intent(&accept.intent_id).await? else {
        return Ok(());
    };
    if intent.status != IntentStatus::Pending {
        return Ok(());
    }
    engine
        .store
        .update_intent_status(&accept.intent_id, IntentStatus::Accepted, now)
        .await?;

    if accept.to == engine.own_address() {
        info!(intent_id = %accept.intent_id, "selected as executor; notify operator channel");
    }
    Ok(())
}

async fn handle_settle(engine: &EngineHandle, settle: &mesh_protocol::Settle, now: i64) -> Result<()> {
    let outcome = match settle.outcome {
        mesh_protocol::Outcome::Success => mesh_store::DealOutcome::Success,
        mesh_protocol::Outcome::Failure => mesh_store::DealOutcome::Failure,
    };
    engine
        .store
        .settle_deal(&settle.intent_id, &settle.tx_hash, outcome, settle.rating, now)
        .await?;

    if let Err(e) = engine
        .reputation
        .record_outcome(&settle.from, &settle.tx_hash, settle.rating, now)
        .await
    {
        warn!(executor = %settle.from, error = %e, "recordOutcome failed for inbound settle");
    }

    engine
        .store
        .update_intent_status(&settle.intent_id, IntentStatus::Settled, now)
        .await?;
    Ok(())
}

/// Shared by the scheduler's deadline sweep and the offer handler's
/// immediate-selection path: fetch offers, rank, attempt the atomic
/// accept, broadcast on success.
pub async fn select_and_accept(engine: &EngineHandle, intent_id: &str, now: i64) -> Result<()> {
    let offers = engine.store.list_offers_for_intent(intent_id).await?;
    if offers.is_empty() {
        engine
            .store
            .update_intent_status(intent_id, IntentStatus::Expired, now)
            .await?;
        return Ok(());
    }

    let candidates: Vec<mesh_ranker::Candidate> = offers
        .iter()
        .map(|o| mesh_ranker::Candidate {
            from_address: o.from_address.clone(),
            fee: o.fee,
            eta: o.eta.clone(),
            snapshot_reputation: o.reputation.unwrap_or(0),
            stake_age_seconds: o.stake_age_seconds.unwrap_or(0),
            created_at: o.created_at,
        })
        .collect();

    let mut live_reputation = std::collections::HashMap::new();
    for offer in &offers {
        if let Ok(rep) = engine.reputation.get_reputation(&offer.from_address).await {
            live_reputation.insert(offer.from_address.clone(), rep as f64);
        }
    }
    let lookup = move |addr: &str| -> Option<f64> { live_reputation.get(addr).copied() };
    let selection = engine.ranker.rank(intent_id, &candidates, &lookup)?;

    let winner_offer = offers
        .iter()
        .find(|o| o.from_address == selection.winner.from_address)
        .expect("ranker winner must be one of the input offers");

    let outcome = engine
        .store
        .accept_intent_offer(
            intent_id,
            &winner_offer.id,
            &winner_offer.from_address,
            winner_offer.fee,
            now,
        )
        .await?;

    if let mesh_store::AcceptOutcome::Accepted(_) = outcome {
        let accept_msg = Message::Accept(mesh_protocol::Accept {
            v: "1.0".to_string(),
            intent_id: intent_id.to_string(),
            from: engine.own_address().to_string(),
            to: winner_offer.from_address.clone(),
            fee: winner_offer.fee,
            selected_at: Some(now),
        });
        engine
            .transport
            .send(&engine.config.mesh_group_id, &serialize(&accept_msg))
            .await?;
        info!(intent_id, winner = %winner_offer.from_address, "intent accepted");
    }

    Ok(())
}
