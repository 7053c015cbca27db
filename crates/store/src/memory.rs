//! In-memory [`Store`] backend — used by tests and by agents run
//! without a `databaseUrl` configured. Per-map mutexes give the same
//! atomicity guarantees the SQL backend gets from row-level locking.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::models::{
    AcceptOutcome, Deal, DealOutcome, Intent, IntentStatus, Offer, Peer, PeerUpsert,
    ProcessedMessageMeta,
};
use crate::Store;

#[derive(Default)]
pub struct MemoryStore {
    peers: Mutex<HashMap<String, Peer>>,
    intents: Mutex<HashMap<String, Intent>>,
    offers: Mutex<HashMap<String, Vec<Offer>>>,
    deals: Mutex<HashMap<String, Deal>>,
    processed: Mutex<std::collections::HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_peer(&self, upsert: PeerUpsert) -> Result<Peer> {
        let mut peers = self.peers.lock().unwrap();
        let peer = peers
            .entry(upsert.address.clone())
            .and_modify(|p| {
                p.skills = upsert.skills.clone();
                p.min_fee = upsert.min_fee;
                p.response_time = upsert.response_time.clone();
                p.reputation = upsert.reputation;
                p.stake = upsert.stake;
                p.stake_age_seconds = upsert.stake_age_seconds;
                p.reply_chat = upsert.reply_chat.clone();
                p.last_seen = upsert.seen_at;
                p.updated_at = upsert.seen_at;
            })
            .or_insert_with(|| Peer {
                address: upsert.address.clone(),
                skills: upsert.skills.clone(),
                min_fee: upsert.min_fee,
                response_time: upsert.response_time.clone(),
                reputation: upsert.reputation,
                stake: upsert.stake,
                stake_age_seconds: upsert.stake_age_seconds,
                reply_chat: upsert.reply_chat.clone(),
                last_seen: upsert.seen_at,
                created_at: upsert.seen_at,
                updated_at: upsert.seen_at,
            });
        Ok(peer.clone())
    }

    async fn get_peer(&self, address: &str) -> Result<Option<Peer>> {
        Ok(self.peers.lock().unwrap().get(address).cloned())
    }

    async fn list_peers(&self) -> Result<Vec<Peer>> {
        let mut peers: Vec<Peer> = self.peers.lock().unwrap().values().cloned().collect();
        peers.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        Ok(peers)
    }

    async fn save_intent(&self, intent: Intent) -> Result<Intent> {
        let mut intents = self.intents.lock().unwrap();
        intents.insert(intent.id.clone(), intent.clone());
        Ok(intent)
    }

    async fn get_intent(&self, id: &str) -> Result<Option<Intent>> {
        Ok(self.intents.lock().unwrap().get(id).cloned())
    }

    async fn list_intents(&self, status: Option<IntentStatus>) -> Result<Vec<Intent>> {
        let intents = self.intents.lock().unwrap();
        Ok(intents
            .values()
            .filter(|i| status.map_or(true, |s| i.status == s))
            .cloned()
            .collect())
    }

    async fn update_intent_status(
        &self,
        id: &str,
        status: IntentStatus,
        now: i64,
    ) -> Result<Option<Intent>> {
        let mut intents = self.intents.lock().unwrap();
        if let Some(intent) = intents.get_mut(id) {
            intent.status = status;
            intent.updated_at = now;
            Ok(Some(intent.clone()))
        } else {
            Ok(None)
        }
    }

    async fn accept_intent_offer(
        &self,
        intent_id: &str,
        offer_id: &str,
        executor: &str,
        fee: Decimal,
        now: i64,
    ) -> Result<AcceptOutcome> {
        let mut intents = self.intents.lock().unwrap();
        let Some(intent) = intents.get_mut(intent_id) else {
            return Ok(AcceptOutcome::NotFound);
        };
        if intent.status != IntentStatus::Pending {
            return Ok(AcceptOutcome::NotPending);
        }

        intent.status = IntentStatus::Accepted;
        intent.accepted_offer_id = Some(offer_id.to_string());
        intent.selected_executor = Some(executor.to_string());
        intent.updated_at = now;
        let accepted = intent.clone();
        drop(intents);

        let mut deals = self.deals.lock().unwrap();
        deals.insert(
            intent_id.to_string(),
            Deal {
                intent_id: intent_id.to_string(),
                executor_address: executor.to_string(),
                fee,
                tx_hash: None,
                outcome: None,
                rating: None,
                settled_at: None,
                updated_at: now,
            },
        );

        Ok(AcceptOutcome::Accepted(accepted))
    }

    async fn record_offer(&self, offer: Offer) -> Result<Offer> {
        let mut offers = self.offers.lock().unwrap();
        offers
            .entry(offer.intent_id.clone())
            .or_default()
            .push(offer.clone());
        Ok(offer)
    }

    async fn list_offers_for_intent(&self, intent_id: &str) -> Result<Vec<Offer>> {
        let offers = self.offers.lock().unwrap();
        let mut list = offers.get(intent_id).cloned().unwrap_or_default();
        list.sort_by_key(|o| o.created_at);
        Ok(list)
    }

    async fn settle_deal(
        &self,
        intent_id: &str,
        tx_hash: &str,
        outcome: DealOutcome,
        rating: i64,
        now: i64,
    ) -> Result<Option<Deal>> {
        let mut deals = self.deals.lock().unwrap();
        if let Some(deal) = deals.get_mut(intent_id) {
            deal.tx_hash = Some(tx_hash.to_string());
            deal.outcome = Some(outcome);
            deal.rating = Some(rating);
            deal.settled_at = Some(now);
            deal.updated_at = now;
            Ok(Some(deal.clone()))
        } else {
            Ok(None)
        }
    }

    async fn get_deal(&self, intent_id: &str) -> Result<Option<Deal>> {
        Ok(self.deals.lock().unwrap().get(intent_id).cloned())
    }

    async fn list_deals(&self) -> Result<Vec<Deal>> {
        let mut deals: Vec<Deal> = self.deals.lock().unwrap().values().cloned().collect();
        deals.sort_by(|a, b| b.settled_at.cmp(&a.settled_at));
        Ok(deals)
    }

    async fn expire_intents(&self, now: i64) -> Result<Vec<Intent>> {
        let mut intents = self.intents.lock().unwrap();
        let mut expired = Vec::new();
        for intent in intents.values_mut() {
            if intent.status == IntentStatus::Pending && intent.deadline < now {
                intent.status = IntentStatus::Expired;
                intent.updated_at = now;
                expired.push(intent.clone());
            }
        }
        Ok(expired)
    }

    async fn mark_processed_message(&self, meta: ProcessedMessageMeta) -> Result<bool> {
        let mut processed = self.processed.lock().unwrap();
        Ok(processed.insert(meta.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn sample_intent(id: &str, deadline: i64) -> Intent {
        Intent {
            id: id.to_string(),
            from_address: "EQX".to_string(),
            skill: "analytics".to_string(),
            payload: serde_json::json!({}),
            budget: Decimal::new(1, 0),
            deadline,
            min_reputation: 0,
            status: IntentStatus::Pending,
            accepted_offer_id: None,
            selected_executor: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn upsert_peer_creates_then_refreshes() {
        let store = MemoryStore::new();
        let upsert = PeerUpsert {
            address: "EQX".to_string(),
            skills: HashSet::from(["analytics".to_string()]),
            min_fee: Decimal::new(1, 1),
            response_time: None,
            reputation: 100,
            stake: Decimal::new(2, 0),
            stake_age_seconds: 0,
            reply_chat: None,
            seen_at: 10,
        };
        let created = store.upsert_peer(upsert.clone()).await.unwrap();
        assert_eq!(created.created_at, 10);

        let mut second = upsert;
        second.seen_at = 20;
        second.reputation = 150;
        let refreshed = store.upsert_peer(second).await.unwrap();
        assert_eq!(refreshed.created_at, 10, "createdAt must not move");
        assert_eq!(refreshed.last_seen, 20);
        assert_eq!(refreshed.reputation, 150);
    }

    #[tokio::test]
    async fn accept_intent_offer_is_conditional_on_pending() {
        let store = MemoryStore::new();
        store.save_intent(sample_intent("i1", 100)).await.unwrap();

        let first = store
            .accept_intent_offer("i1", "off1", "EQY", Decimal::new(75, 2), 5)
            .await
            .unwrap();
        assert!(matches!(first, AcceptOutcome::Accepted(_)));

        let second = store
            .accept_intent_offer("i1", "off2", "EQZ", Decimal::new(60, 2), 6)
            .await
            .unwrap();
        assert!(matches!(second, AcceptOutcome::NotPending));

        let deal = store.get_deal("i1").await.unwrap().unwrap();
        assert_eq!(deal.executor_address, "EQY");
    }

    #[tokio::test]
    async fn accept_intent_offer_on_unknown_intent_is_not_found() {
        let store = MemoryStore::new();
        let result = store
            .accept_intent_offer("missing", "off1", "EQY", Decimal::ONE, 0)
            .await
            .unwrap();
        assert!(matches!(result, AcceptOutcome::NotFound));
    }

    #[tokio::test]
    async fn concurrent_accept_has_exactly_one_winner() {
        let store = Arc::new(MemoryStore::new());
        store.save_intent(sample_intent("i2", 100)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8u32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .accept_intent_offer(
                        "i2",
                        &format!("off{i}"),
                        &format!("EQ{i}"),
                        Decimal::ONE,
                        i as i64,
                    )
                    .await
                    .unwrap()
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), AcceptOutcome::Accepted(_)) {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn expire_intents_only_touches_pending_past_deadline() {
        let store = MemoryStore::new();
        store.save_intent(sample_intent("expires", 10)).await.unwrap();
        store.save_intent(sample_intent("not-yet", 1000)).await.unwrap();
        store
            .accept_intent_offer("expires", "o", "EQY", Decimal::ONE, 5)
            .await
            .ok();

        let expired = store.expire_intents(500).await.unwrap();
        assert!(expired.is_empty(), "accepted intents never expire");

        store.save_intent(sample_intent("still-pending", 10)).await.unwrap();
        let expired = store.expire_intents(500).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, "still-pending");
        assert_eq!(expired[0].status, IntentStatus::Expired);

        let untouched = store.get_intent("not-yet").await.unwrap().unwrap();
        assert_eq!(untouched.status, IntentStatus::Pending);
    }

    #[tokio::test]
    async fn mark_processed_message_inserts_at_most_once() {
        let store = MemoryStore::new();
        let meta = ProcessedMessageMeta {
            key: "consumer:EQX:tg:c1:1".to_string(),
            message_type: "beacon".to_string(),
            source_chat_id: Some("c1".to_string()),
            source_message_id: Some("1".to_string()),
            payload_hash: "h".to_string(),
            first_seen_at: 0,
        };
        assert!(store.mark_processed_message(meta.clone()).await.unwrap());
        assert!(!store.mark_processed_message(meta).await.unwrap());
    }

    #[tokio::test]
    async fn list_offers_for_intent_is_ordered_by_created_at() {
        let store = MemoryStore::new();
        store
            .record_offer(Offer {
                id: "i1:EQZ:20".to_string(),
                intent_id: "i1".to_string(),
                from_address: "EQZ".to_string(),
                fee: Decimal::new(60, 2),
                eta: "5s".to_string(),
                reputation: Some(70),
                stake_age_seconds: Some(60),
                escrow_address: None,
                created_at: 20,
            })
            .await
            .unwrap();
        store
            .record_offer(Offer {
                id: "i1:EQY:10".to_string(),
                intent_id: "i1".to_string(),
                from_address: "EQY".to_string(),
                fee: Decimal::new(75, 2),
                eta: "5s".to_string(),
                reputation: Some(100),
                stake_age_seconds: Some(3600),
                escrow_address: None,
                created_at: 10,
            })
            .await
            .unwrap();

        let offers = store.list_offers_for_intent("i1").await.unwrap();
        assert_eq!(offers[0].from_address, "EQY");
        assert_eq!(offers[1].from_address, "EQZ");
    }
}
