//! `EngineHandle`: the explicit state object threaded through the call
//! graph, replacing the source's process-wide mutable SDK object.
//! Migration/runtime config and the scheduler handle live on it.

use std::sync::Arc;

use mesh_ranker::{Ranker, Weights};
use mesh_reputation::ReputationClient;
use mesh_store::Store;

use crate::config::EngineConfig;
use crate::transport::TransportFacade;

pub struct EngineHandle {
    pub config: EngineConfig,
    pub store: Arc<dyn Store>,
    pub reputation: Arc<ReputationClient>,
    pub ranker: Ranker,
    pub transport: Arc<TransportFacade>,
}

impl EngineHandle {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn Store>,
        reputation: Arc<ReputationClient>,
        transport: Arc<TransportFacade>,
    ) -> Self {
        let ranker = Ranker::new(Weights::default());
        Self {
            config,
            store,
            reputation,
            ranker,
            transport,
        }
    }

    pub fn own_address(&self) -> &str {
        &self.config.address
    }
}
