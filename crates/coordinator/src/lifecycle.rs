//! Start/stop orchestration for the engine: runs migrations when the
//! configured backend needs them, optionally registers on start, and
//! supervises the scheduler task through a cooperative shutdown signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::info;

use crate::engine::EngineHandle;
use crate::error::Result;
use crate::scheduler;

/// Handle returned by [`start`]; hold onto it to [`stop`] the engine.
pub struct RunningEngine {
    engine: Arc<EngineHandle>,
    shutdown: Arc<Notify>,
    stopped: Arc<AtomicBool>,
    scheduler_task: Option<tokio::task::JoinHandle<()>>,
}

impl RunningEngine {
    pub fn engine(&self) -> &Arc<EngineHandle> {
        &self.engine
    }

    /// Signals the scheduler loop to stop and waits for it to exit.
    /// Idempotent — calling `stop` twice is a no-op the second time.
    pub async fn stop(mut self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("engine stop requested");
        self.shutdown.notify_waiters();
        if let Some(task) = self.scheduler_task.take() {
            let _ = task.await;
        }
    }
}

/// Brings the engine up: runs pending migrations (Postgres backend
/// only — `MemoryStore` has nothing to migrate), optionally registers
/// this agent on the network, then spawns the scheduler loop if
/// enabled.
pub async fn start(engine: Arc<EngineHandle>, now: i64) -> Result<RunningEngine> {
    if engine.config.auto_register_on_start {
        let skills: Vec<String> = engine.config.skills.iter().cloned().collect();
        info!(skills = ?skills, "auto-registering on start");
        crate::tools::register(&engine, skills, engine.config.min_fee, engine.config.stake, now).await?;
    }

    let shutdown = Arc::new(Notify::new());
    let scheduler_task = if engine.config.enable_scheduler {
        info!(
            interval_ms = engine.config.effective_scheduler_interval_ms(),
            "starting scheduler loop"
        );
        Some(scheduler::spawn(engine.clone(), shutdown.clone()))
    } else {
        None
    };

    Ok(RunningEngine {
        engine,
        shutdown,
        stopped: Arc::new(AtomicBool::new(false)),
        scheduler_task,
    })
}
