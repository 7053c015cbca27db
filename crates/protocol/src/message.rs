//! The six `MESH:` wire message kinds.
//!
//! Every kind carries `v` (protocol version, default `"1.0"`) plus its
//! own required/optional fields. These structs are the serde-level
//! shape; [`crate::codec`] is what adds prefix framing and the
//! type-specific range checks the bare derive can't express.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub(crate) fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beacon {
    #[serde(default = "default_version")]
    pub v: String,
    pub from: String,
    pub skills: Vec<String>,
    #[serde(rename = "minFee", skip_serializing_if = "Option::is_none", default)]
    pub min_fee: Option<Decimal>,
    #[serde(
        rename = "responseTime",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub response_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stake: Option<Decimal>,
    #[serde(rename = "replyChat", skip_serializing_if = "Option::is_none", default)]
    pub reply_chat: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(default = "default_version")]
    pub v: String,
    pub id: String,
    pub from: String,
    pub skill: String,
    pub budget: Decimal,
    pub deadline: i64,
    #[serde(rename = "minReputation")]
    pub min_reputation: i64,
    #[serde(default = "default_payload")]
    pub payload: serde_json::Value,
}

fn default_payload() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    #[serde(default = "default_version")]
    pub v: String,
    #[serde(rename = "intentId")]
    pub intent_id: String,
    pub from: String,
    pub fee: Decimal,
    pub eta: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reputation: Option<i64>,
    #[serde(
        rename = "escrowAddress",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub escrow_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accept {
    #[serde(default = "default_version")]
    pub v: String,
    #[serde(rename = "intentId")]
    pub intent_id: String,
    pub from: String,
    pub to: String,
    pub fee: Decimal,
    #[serde(rename = "selectedAt", skip_serializing_if = "Option::is_none", default)]
    pub selected_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settle {
    #[serde(default = "default_version")]
    pub v: String,
    #[serde(rename = "intentId")]
    pub intent_id: String,
    pub from: String,
    #[serde(rename = "txHash")]
    pub tx_hash: String,
    pub outcome: Outcome,
    pub rating: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    #[serde(default = "default_version")]
    pub v: String,
    #[serde(rename = "intentId")]
    pub intent_id: String,
    pub from: String,
    pub against: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
    #[serde(
        rename = "evidenceTx",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub evidence_tx: Option<String>,
}

/// A validated MESH message, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Beacon(Beacon),
    Intent(Intent),
    Offer(Offer),
    Accept(Accept),
    Settle(Settle),
    Dispute(Dispute),
}

impl Message {
    /// The wire `type` discriminator for this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Beacon(_) => "beacon",
            Message::Intent(_) => "intent",
            Message::Offer(_) => "offer",
            Message::Accept(_) => "accept",
            Message::Settle(_) => "settle",
            Message::Dispute(_) => "dispute",
        }
    }

    /// The sending agent's address, present on every kind.
    pub fn from(&self) -> &str {
        match self {
            Message::Beacon(m) => &m.from,
            Message::Intent(m) => &m.from,
            Message::Offer(m) => &m.from,
            Message::Accept(m) => &m.from,
            Message::Settle(m) => &m.from,
            Message::Dispute(m) => &m.from,
        }
    }

    /// The intent this message refers to, if any.
    pub fn intent_id(&self) -> Option<&str> {
        match self {
            Message::Intent(m) => Some(&m.id),
            Message::Offer(m) => Some(&m.intent_id),
            Message::Accept(m) => Some(&m.intent_id),
            Message::Settle(m) => Some(&m.intent_id),
            Message::Dispute(m) => Some(&m.intent_id),
            Message::Beacon(_) => None,
        }
    }
}
