//! Postgres-backed [`Store`] implementation.
//!
//! Mirrors the teacher's `Database`/`sqlx` conventions: plain
//! `sqlx::query` (no compile-time-checked macros, so this builds
//! without a live `DATABASE_URL`), migrations embedded via
//! `include_str!`, and `acceptIntentOffer` implemented as a
//! transaction with `SELECT … FOR UPDATE` followed by a conditional
//! update.

use std::collections::HashSet;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::{error, info};

use crate::error::{Result, StoreError};
use crate::models::{
    AcceptOutcome, Deal, DealOutcome, Intent, IntentStatus, Offer, Peer, PeerUpsert,
    ProcessedMessageMeta,
};
use crate::Store;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        info!("connecting to mesh registry database");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| {
                error!("failed to connect to database: {}", e);
                StoreError::Connection(e.to_string())
            })?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        let migration_0001 = include_str!("../migrations/0001_init.sql");
        let migration_0002 = include_str!("../migrations/0002_performance_indexes.sql");

        sqlx::query(migration_0001)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(format!("0001_init.sql: {e}")))?;
        sqlx::query(migration_0002)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(format!("0002_performance_indexes.sql: {e}")))?;
        Ok(())
    }
}

fn skills_to_json(skills: &HashSet<String>) -> serde_json::Value {
    serde_json::Value::Array(
        skills
            .iter()
            .cloned()
            .map(serde_json::Value::String)
            .collect(),
    )
}

fn skills_from_json(value: serde_json::Value) -> Result<HashSet<String>> {
    let array = value.as_array().cloned().unwrap_or_default();
    array
        .into_iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| StoreError::InvalidRow {
                    field: "skills".to_string(),
                    reason: "expected array of strings".to_string(),
                })
        })
        .collect()
}

fn row_to_peer(row: &sqlx::postgres::PgRow) -> Result<Peer> {
    Ok(Peer {
        address: row.get("address"),
        skills: skills_from_json(row.get("skills"))?,
        min_fee: row.get("min_fee"),
        response_time: row.get("response_time"),
        reputation: row.get("reputation"),
        stake: row.get("stake"),
        stake_age_seconds: row.get("stake_age_seconds"),
        reply_chat: row.get("reply_chat"),
        last_seen: row.get("last_seen"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_intent(row: &sqlx::postgres::PgRow) -> Result<Intent> {
    let status: String = row.get("status");
    Ok(Intent {
        id: row.get("id"),
        from_address: row.get("from_address"),
        skill: row.get("skill"),
        payload: row.get("payload"),
        budget: row.get("budget"),
        deadline: row.get("deadline"),
        min_reputation: row.get("min_reputation"),
        status: IntentStatus::parse(&status).ok_or_else(|| StoreError::InvalidRow {
            field: "status".to_string(),
            reason: format!("unknown intent status {status}"),
        })?,
        accepted_offer_id: row.get("accepted_offer_id"),
        selected_executor: row.get("selected_executor"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_offer(row: &sqlx::postgres::PgRow) -> Offer {
    Offer {
        id: row.get("id"),
        intent_id: row.get("intent_id"),
        from_address: row.get("from_address"),
        fee: row.get("fee"),
        eta: row.get("eta"),
        reputation: row.get("reputation"),
        stake_age_seconds: row.get("stake_age_seconds"),
        escrow_address: row.get("escrow_address"),
        created_at: row.get("created_at"),
    }
}

fn row_to_deal(row: &sqlx::postgres::PgRow) -> Result<Deal> {
    let outcome: Option<String> = row.get("outcome");
    Ok(Deal {
        intent_id: row.get("intent_id"),
        executor_address: row.get("executor_address"),
        fee: row.get("fee"),
        tx_hash: row.get("tx_hash"),
        outcome: outcome
            .map(|o| {
                DealOutcome::parse(&o).ok_or_else(|| StoreError::InvalidRow {
                    field: "outcome".to_string(),
                    reason: format!("unknown deal outcome {o}"),
                })
            })
            .transpose()?,
        rating: row.get::<Option<i16>, _>("rating").map(i64::from),
        settled_at: row.get("settled_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl Store for PostgresStore {
    async fn upsert_peer(&self, upsert: PeerUpsert) -> Result<Peer> {
        let row = sqlx::query(
            r#"
            insert into peers
                (address, skills, min_fee, response_time, reputation, stake,
                 stake_age_seconds, reply_chat, last_seen, created_at, updated_at)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9, $9)
            on conflict (address) do update set
                skills = excluded.skills,
                min_fee = excluded.min_fee,
                response_time = excluded.response_time,
                reputation = excluded.reputation,
                stake = excluded.stake,
                stake_age_seconds = excluded.stake_age_seconds,
                reply_chat = excluded.reply_chat,
                last_seen = excluded.last_seen,
                updated_at = excluded.last_seen
            returning *
            "#,
        )
        .bind(&upsert.address)
        .bind(skills_to_json(&upsert.skills))
        .bind(upsert.min_fee)
        .bind(&upsert.response_time)
        .bind(upsert.reputation)
        .bind(upsert.stake)
        .bind(upsert.stake_age_seconds)
        .bind(&upsert.reply_chat)
        .bind(upsert.seen_at)
        .fetch_one(&self.pool)
        .await?;

        row_to_peer(&row)
    }

    async fn get_peer(&self, address: &str) -> Result<Option<Peer>> {
        let row = sqlx::query("select * from peers where address = $1")
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_peer).transpose()
    }

    async fn list_peers(&self) -> Result<Vec<Peer>> {
        let rows = sqlx::query("select * from peers order by last_seen desc")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_peer).collect()
    }

    async fn save_intent(&self, intent: Intent) -> Result<Intent> {
        let row = sqlx::query(
            r#"
            insert into intents
                (id, from_address, skill, payload, budget, deadline, min_reputation,
                 status, accepted_offer_id, selected_executor, created_at, updated_at)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            on conflict (id) do update set
                payload = excluded.payload,
                updated_at = excluded.updated_at
            returning *
            "#,
        )
        .bind(&intent.id)
        .bind(&intent.from_address)
        .bind(&intent.skill)
        .bind(&intent.payload)
        .bind(intent.budget)
        .bind(intent.deadline)
        .bind(intent.min_reputation)
        .bind(intent.status.as_str())
        .bind(&intent.accepted_offer_id)
        .bind(&intent.selected_executor)
        .bind(intent.created_at)
        .bind(intent.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row_to_intent(&row)
    }

    async fn get_intent(&self, id: &str) -> Result<Option<Intent>> {
        let row = sqlx::query("select * from intents where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_intent).transpose()
    }

    async fn list_intents(&self, status: Option<IntentStatus>) -> Result<Vec<Intent>> {
        let rows = match status {
            Some(status) => {
                sqlx::query("select * from intents where status = $1")
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("select * from intents")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(row_to_intent).collect()
    }

    async fn update_intent_status(
        &self,
        id: &str,
        status: IntentStatus,
        now: i64,
    ) -> Result<Option<Intent>> {
        let row = sqlx::query(
            "update intents set status = $1, updated_at = $2 where id = $3 returning *",
        )
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_intent).transpose()
    }

    async fn accept_intent_offer(
        &self,
        intent_id: &str,
        offer_id: &str,
        executor: &str,
        fee: Decimal,
        now: i64,
    ) -> Result<AcceptOutcome> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query("select status from intents where id = $1 for update")
            .bind(intent_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(locked) = locked else {
            tx.rollback().await.ok();
            return Ok(AcceptOutcome::NotFound);
        };
        let status: String = locked.get("status");
        if status != IntentStatus::Pending.as_str() {
            tx.rollback().await.ok();
            return Ok(AcceptOutcome::NotPending);
        }

        let row = sqlx::query(
            r#"
            update intents
            set status = 'accepted', accepted_offer_id = $1, selected_executor = $2, updated_at = $3
            where id = $4 and status = 'pending'
            returning *
            "#,
        )
        .bind(offer_id)
        .bind(executor)
        .bind(now)
        .bind(intent_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await.ok();
            return Ok(AcceptOutcome::NotPending);
        };

        sqlx::query(
            r#"
            insert into deals (intent_id, executor_address, fee, updated_at)
            values ($1, $2, $3, $4)
            "#,
        )
        .bind(intent_id)
        .bind(executor)
        .bind(fee)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(AcceptOutcome::Accepted(row_to_intent(&row)?))
    }

    async fn record_offer(&self, offer: Offer) -> Result<Offer> {
        let row = sqlx::query(
            r#"
            insert into offers
                (id, intent_id, from_address, fee, eta, reputation, stake_age_seconds,
                 escrow_address, created_at)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            returning *
            "#,
        )
        .bind(&offer.id)
        .bind(&offer.intent_id)
        .bind(&offer.from_address)
        .bind(offer.fee)
        .bind(&offer.eta)
        .bind(offer.reputation)
        .bind(offer.stake_age_seconds)
        .bind(&offer.escrow_address)
        .bind(offer.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row_to_offer(&row))
    }

    async fn list_offers_for_intent(&self, intent_id: &str) -> Result<Vec<Offer>> {
        let rows = sqlx::query(
            "select * from offers where intent_id = $1 order by created_at asc",
        )
        .bind(intent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_offer).collect())
    }

    async fn settle_deal(
        &self,
        intent_id: &str,
        tx_hash: &str,
        outcome: DealOutcome,
        rating: i64,
        now: i64,
    ) -> Result<Option<Deal>> {
        let row = sqlx::query(
            r#"
            update deals
            set tx_hash = $1, outcome = $2, rating = $3, settled_at = $4, updated_at = $4
            where intent_id = $5
            returning *
            "#,
        )
        .bind(tx_hash)
        .bind(outcome.as_str())
        .bind(rating as i16)
        .bind(now)
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_deal).transpose()
    }

    async fn get_deal(&self, intent_id: &str) -> Result<Option<Deal>> {
        let row = sqlx::query("select * from deals where intent_id = $1")
            .bind(intent_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_deal).transpose()
    }

    async fn list_deals(&self) -> Result<Vec<Deal>> {
        let rows = sqlx::query("select * from deals order by settled_at desc")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_deal).collect()
    }

    async fn expire_intents(&self, now: i64) -> Result<Vec<Intent>> {
        let rows = sqlx::query(
            r#"
            update intents
            set status = 'expired', updated_at = $1
            where status = 'pending' and deadline < $1
            returning *
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_intent).collect()
    }

    async fn mark_processed_message(&self, meta: ProcessedMessageMeta) -> Result<bool> {
        let result = sqlx::query(
            r#"
            insert into processed_messages
                (key, message_type, source_chat_id, source_message_id, payload_hash, first_seen_at)
            values ($1, $2, $3, $4, $5, $6)
            on conflict (key) do nothing
            "#,
        )
        .bind(&meta.key)
        .bind(&meta.message_type)
        .bind(&meta.source_chat_id)
        .bind(&meta.source_message_id)
        .bind(&meta.payload_hash)
        .bind(meta.first_seen_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skills_json_round_trips() {
        let skills: HashSet<String> = ["analytics".to_string(), "translation".to_string()]
            .into_iter()
            .collect();
        let json = skills_to_json(&skills);
        let back = skills_from_json(json).unwrap();
        assert_eq!(skills, back);
    }
}
