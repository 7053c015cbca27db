//! MESH wire protocol: parse/validate/serialize the six `MESH:`
//! message kinds exchanged over the group-chat transport.

pub mod codec;
pub mod message;

pub use codec::{parse, serialize};
pub use message::{Accept, Beacon, Dispute, Intent, Message, Offer, Outcome, Settle};
