//! Wire framing and validation for `MESH:` messages.
//!
//! A message is a single text line `MESH: <json>` — the prefix is
//! literal and case-sensitive, with at most one space before the JSON
//! body. `parse` returns `None` rather than an error: the protocol
//! must tolerate noise from other group-chat traffic without the
//! ingest path having to special-case every possible malformed input.

use serde_json::Value;
use tracing::debug;

use crate::message::{Accept, Beacon, Dispute, Intent, Message, Offer, Settle};

const PREFIX: &str = "MESH:";

/// Parse a raw transport line into a validated [`Message`], or `None`
/// if the line isn't a well-formed MESH message of a known kind.
///
/// `now` fills `accept.selectedAt` when the wire message omits it;
/// callers pass the ingest timestamp so parsing stays a pure function
/// of its two inputs.
pub fn parse(text: &str, now: i64) -> Option<Message> {
    let rest = text.strip_prefix(PREFIX)?;
    let json_str = match rest.strip_prefix(' ') {
        Some(after_space) if after_space.starts_with(' ') => return None,
        Some(after_space) => after_space,
        None => rest,
    };

    let value: Value = match serde_json::from_str(json_str) {
        Ok(v) => v,
        Err(e) => {
            debug!("protocol reject: invalid json: {}", e);
            return None;
        }
    };

    let kind = value.as_object()?.get("type")?.as_str()?.to_string();

    match kind.as_str() {
        "beacon" => serde_json::from_value::<Beacon>(value)
            .ok()
            .map(Message::Beacon),
        "intent" => {
            let intent: Intent = serde_json::from_value(value).ok()?;
            if intent.deadline <= 0 || intent.min_reputation < 0 {
                debug!("protocol reject: intent out of range");
                return None;
            }
            Some(Message::Intent(intent))
        }
        "offer" => serde_json::from_value::<Offer>(value)
            .ok()
            .map(Message::Offer),
        "accept" => {
            let mut accept: Accept = serde_json::from_value(value).ok()?;
            if accept.selected_at.is_none() {
                accept.selected_at = Some(now);
            }
            Some(Message::Accept(accept))
        }
        "settle" => {
            let settle: Settle = serde_json::from_value(value).ok()?;
            if !(1..=10).contains(&settle.rating) {
                debug!("protocol reject: settle rating out of range");
                return None;
            }
            Some(Message::Settle(settle))
        }
        "dispute" => serde_json::from_value::<Dispute>(value)
            .ok()
            .map(Message::Dispute),
        other => {
            debug!("protocol reject: unknown message type {}", other);
            None
        }
    }
}

/// Serialize a [`Message`] back onto the wire, injecting the `type`
/// discriminator and the canonical `MESH: ` framing.
pub fn serialize(msg: &Message) -> String {
    let kind = msg.kind();
    let mut value = match msg {
        Message::Beacon(m) => serde_json::to_value(m),
        Message::Intent(m) => serde_json::to_value(m),
        Message::Offer(m) => serde_json::to_value(m),
        Message::Accept(m) => serde_json::to_value(m),
        Message::Settle(m) => serde_json::to_value(m),
        Message::Dispute(m) => serde_json::to_value(m),
    }
    .expect("MESH message structs always serialize to a JSON object");

    value
        .as_object_mut()
        .expect("MESH message structs always serialize to a JSON object")
        .insert("type".to_string(), Value::String(kind.to_string()));

    format!("{PREFIX} {value}")
}
