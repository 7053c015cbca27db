//! The periodic deadline sweep: `expireIntents`, plus deadline-triggered
//! selection for pending intents that have run out the clock.
//!
//! Optional (`enableScheduler`), idempotent against the tool path —
//! both use the same atomic `acceptIntentOffer`, so a race between the
//! scheduler and an inbound offer handler has exactly one winner.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn, Level};

use crate::dispatch::select_and_accept;
use crate::engine::EngineHandle;

/// Runs one sweep: `expireIntents(now)`, then attempts selection for
/// every still-pending intent whose deadline has passed. Errors are
/// logged and swallowed — the scheduler loop never crashes.
pub async fn tick(engine: &EngineHandle, now: i64) {
    match engine.store.expire_intents(now).await {
        Ok(expired) => {
            for intent in &expired {
                info!(intent_id = %intent.id, "intent expired by scheduler sweep");
            }
        }
        Err(e) => log_at(e.log_level(), &format!("expireIntents failed during scheduler tick: {e}")),
    }

    let pending = match engine.store.list_intents(Some(mesh_store::IntentStatus::Pending)).await {
        Ok(intents) => intents,
        Err(e) => {
            log_at(e.log_level(), &format!("listIntents failed during scheduler tick: {e}"));
            return;
        }
    };

    for intent in pending {
        if intent.deadline > now {
            continue;
        }
        if intent.from_address != engine.own_address() {
            continue;
        }
        if let Err(e) = select_and_accept(engine, &intent.id, now).await {
            log_at(
                e.log_level(),
                &format!("deadline selection failed for intent {}: {e}", intent.id),
            );
        }
    }
}

/// Logs `message` at the severity the originating error enum assigned
/// it, the way `HorizonClient::retry_request` dispatches on
/// `IndexerError::log_level`.
fn log_at(level: Level, message: &str) {
    match level {
        Level::ERROR => error!("{message}"),
        Level::WARN => warn!("{message}"),
        Level::DEBUG => debug!("{message}"),
        _ => info!("{message}"),
    }
}

/// Spawns the periodic task. Stops cooperatively when `shutdown` fires.
pub fn spawn(engine: Arc<EngineHandle>, shutdown: Arc<tokio::sync::Notify>) -> tokio::task::JoinHandle<()> {
    let interval_ms = engine.config.effective_scheduler_interval_ms();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = current_unix_seconds();
                    tick(&engine, now).await;
                }
                _ = shutdown.notified() => {
                    info!("scheduler loop stopping");
                    break;
                }
            }
        }
    })
}

fn current_unix_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
