//! Durable CRUD for peers, intents, offers, deals, and the
//! processed-message dedup table.
//!
//! [`Store`] is the sole persistence authority for the coordination
//! engine; every other component reads and writes only through this
//! trait. Three backends share the same contract: [`memory::MemoryStore`]
//! for tests, [`postgres::PostgresStore`] for production.

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;


use async_trait::async_trait;
use rust_decimal::Decimal;

pub use error::{Result, StoreError};
pub use models::{
    dedup_key, AcceptOutcome, Deal, DealOutcome, Intent, IntentStatus, Offer, Peer, PeerUpsert,
    ProcessedMessageMeta,
};

#[async_trait]
pub trait Store: Send + Sync {
    async fn upsert_peer(&self, upsert: PeerUpsert) -> Result<Peer>;
    async fn get_peer(&self, address: &str) -> Result<Option<Peer>>;
    /// Ordered by `lastSeen` descending.
    async fn list_peers(&self) -> Result<Vec<Peer>>;

    async fn save_intent(&self, intent: Intent) -> Result<Intent>;
    async fn get_intent(&self, id: &str) -> Result<Option<Intent>>;
    async fn list_intents(&self, status: Option<IntentStatus>) -> Result<Vec<Intent>>;
    async fn update_intent_status(
        &self,
        id: &str,
        status: IntentStatus,
        now: i64,
    ) -> Result<Option<Intent>>;

    /// The only atomic multi-field write in the system: conditional
    /// `status='accepted'` update `WHERE id=? AND status='pending'`,
    /// plus the deal row the accepted offer seeds. Exactly one
    /// concurrent caller per intent observes `AcceptOutcome::Accepted`.
    #[allow(clippy::too_many_arguments)]
    async fn accept_intent_offer(
        &self,
        intent_id: &str,
        offer_id: &str,
        executor: &str,
        fee: Decimal,
        now: i64,
    ) -> Result<AcceptOutcome>;

    async fn record_offer(&self, offer: Offer) -> Result<Offer>;
    /// Ordered by `createdAt` ascending.
    async fn list_offers_for_intent(&self, intent_id: &str) -> Result<Vec<Offer>>;

    #[allow(clippy::too_many_arguments)]
    async fn settle_deal(
        &self,
        intent_id: &str,
        tx_hash: &str,
        outcome: DealOutcome,
        rating: i64,
        now: i64,
    ) -> Result<Option<Deal>>;
    async fn get_deal(&self, intent_id: &str) -> Result<Option<Deal>>;
    /// Ordered by `settledAt` descending.
    async fn list_deals(&self) -> Result<Vec<Deal>>;

    /// Conditional batch update: `status='expired' WHERE status='pending'
    /// AND deadline < nowTs`. Returns the updated intents.
    async fn expire_intents(&self, now: i64) -> Result<Vec<Intent>>;

    /// Insert-ignore-on-conflict. Returns whether a row was actually
    /// inserted; callers MUST treat `false` as "already processed, drop".
    async fn mark_processed_message(&self, meta: ProcessedMessageMeta) -> Result<bool>;
}
