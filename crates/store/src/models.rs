//! Durable records owned by the [`crate::Store`].

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq)]
pub struct Peer {
    pub address: String,
    pub skills: HashSet<String>,
    pub min_fee: Decimal,
    pub response_time: Option<String>,
    pub reputation: i64,
    pub stake: Decimal,
    pub stake_age_seconds: i64,
    pub reply_chat: Option<String>,
    pub last_seen: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields a beacon (or the local agent's own register path) refreshes
/// on a peer. Everything else is computed by the store on upsert.
#[derive(Debug, Clone)]
pub struct PeerUpsert {
    pub address: String,
    pub skills: HashSet<String>,
    pub min_fee: Decimal,
    pub response_time: Option<String>,
    pub reputation: i64,
    pub stake: Decimal,
    pub stake_age_seconds: i64,
    pub reply_chat: Option<String>,
    pub seen_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    Pending,
    Accepted,
    Expired,
    Settled,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Pending => "pending",
            IntentStatus::Accepted => "accepted",
            IntentStatus::Expired => "expired",
            IntentStatus::Settled => "settled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "expired" => Some(Self::Expired),
            "settled" => Some(Self::Settled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub id: String,
    pub from_address: String,
    pub skill: String,
    pub payload: serde_json::Value,
    pub budget: Decimal,
    pub deadline: i64,
    pub min_reputation: i64,
    pub status: IntentStatus,
    pub accepted_offer_id: Option<String>,
    pub selected_executor: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub id: String,
    pub intent_id: String,
    pub from_address: String,
    pub fee: Decimal,
    pub eta: String,
    pub reputation: Option<i64>,
    pub stake_age_seconds: Option<i64>,
    pub escrow_address: Option<String>,
    pub created_at: i64,
}

impl Offer {
    /// `intentId:fromAddress:createdAt`, per the data model's derived
    /// offer id.
    pub fn derive_id(intent_id: &str, from_address: &str, created_at: i64) -> String {
        format!("{intent_id}:{from_address}:{created_at}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealOutcome {
    Success,
    Failure,
}

impl DealOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealOutcome::Success => "success",
            DealOutcome::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deal {
    pub intent_id: String,
    pub executor_address: String,
    pub fee: Decimal,
    pub tx_hash: Option<String>,
    pub outcome: Option<DealOutcome>,
    pub rating: Option<i64>,
    pub settled_at: Option<i64>,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct ProcessedMessageMeta {
    pub key: String,
    pub message_type: String,
    pub source_chat_id: Option<String>,
    pub source_message_id: Option<String>,
    pub payload_hash: String,
    pub first_seen_at: i64,
}

/// Derive the dedup key for an inbound transport event.
///
/// `consumer:<ownAddress>:tg:<chatId>:<messageId>` when the transport
/// supplies a message id, else
/// `consumer:<ownAddress>:hash:<sha256(rawText)>`.
pub fn dedup_key(own_address: &str, chat_id: Option<&str>, message_id: Option<&str>, raw_text: &str) -> String {
    match (chat_id, message_id) {
        (Some(chat_id), Some(message_id)) => {
            format!("consumer:{own_address}:tg:{chat_id}:{message_id}")
        }
        _ => {
            let mut hasher = Sha256::new();
            hasher.update(raw_text.as_bytes());
            let hash = hex::encode(hasher.finalize());
            format!("consumer:{own_address}:hash:{hash}")
        }
    }
}

/// The outcome of the one atomic multi-field write in the system.
#[derive(Debug, Clone, PartialEq)]
pub enum AcceptOutcome {
    /// Exactly one concurrent caller observes this per intent.
    Accepted(Intent),
    NotPending,
    NotFound,
}
