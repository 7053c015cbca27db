//! Mesh agent binary: wires config, store, reputation client, and
//! transport into an [`EngineHandle`] and runs it until terminated.

use std::process;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use mesh_coordinator::config::{Backend, EngineConfig};
use mesh_coordinator::{lifecycle, telemetry, EngineHandle, Transport, TransportFacade};
use mesh_reputation::{host_adapter::HttpHostAdapter, ReputationClient};
use mesh_store::memory::MemoryStore;
use mesh_store::postgres::PostgresStore;
use mesh_store::Store;

/// Logs outbound sends instead of delivering them. The chat/network
/// transport is an external collaborator outside this workspace;
/// wiring a real one in means implementing [`Transport`] and passing
/// it to [`TransportFacade::new`] in place of this.
struct LoggingTransport;

#[async_trait]
impl Transport for LoggingTransport {
    async fn send_raw(&self, channel_id: &str, text: &str) -> std::result::Result<(), String> {
        info!(channel_id, text, "outbound message (no transport wired in)");
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    telemetry::init();
    info!("starting mesh agent");

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let store: Arc<dyn Store> = match config.backend() {
        Backend::Postgres => {
            let database_url = config.database_url.clone().expect("backend() guarantees database_url is set");
            let pg = match PostgresStore::connect(&database_url, 10).await {
                Ok(pg) => pg,
                Err(e) => {
                    error!("failed to connect to database: {}", e);
                    process::exit(1);
                }
            };
            if let Err(e) = pg.migrate().await {
                error!("failed to run migrations: {}", e);
                process::exit(1);
            }
            Arc::new(pg)
        }
        Backend::Memory => Arc::new(MemoryStore::new()),
    };

    let host_adapter = config
        .contract_address
        .clone()
        .map(|url| Box::new(HttpHostAdapter::new(url)) as Box<dyn mesh_reputation::ReputationBackend>);
    let reputation = Arc::new(ReputationClient::new(host_adapter, config.trust_mode()));

    let transport = Arc::new(TransportFacade::new(
        LoggingTransport,
        config.send_retries,
        config.effective_send_retry_base_ms(),
    ));

    let now = current_unix_seconds();
    let engine = Arc::new(EngineHandle::new(config, store, reputation, transport));

    let running = match lifecycle::start(engine, now).await {
        Ok(running) => running,
        Err(e) => {
            error!("failed to start engine: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
    }
    info!("shutdown signal received");
    running.stop().await;
}

fn current_unix_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
