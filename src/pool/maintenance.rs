//! Periodic maintenance timer.
//!
//! Ticks the pool's `maintain()` sweep at a fixed interval after an initial
//! delay, and stops itself as soon as the shutdown registry reports the
//! process is going down. This is the only caller of `maintain()` in normal
//! operation; tests invoke the sweep directly.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::core::config::PoolConfig;
use crate::pool::manager::BrowserPool;
use crate::pool::shutdown::ShutdownRegistry;

pub struct MaintenanceScheduler {
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl MaintenanceScheduler {
    /// Spawn the timer task: sleep `initial_delay`, then run one maintenance
    /// sweep per `period`. Self-disables when the registry goes inactive.
    pub fn start(
        pool: Arc<BrowserPool>,
        registry: Arc<ShutdownRegistry>,
        initial_delay: Duration,
        period: Duration,
    ) -> Self {
        info!(
            "maintenance: scheduler starting (initial delay {:?}, period {:?})",
            initial_delay, period
        );
        let handle = tokio::spawn(async move {
            tokio::time::sleep(initial_delay).await;
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !registry.is_active() {
                    debug!("maintenance: process shutting down, scheduler stopping");
                    break;
                }
                pool.maintain().await;
            }
        });
        Self {
            handle: std::sync::Mutex::new(Some(handle)),
        }
    }

    /// Start with delays taken from the pool config.
    pub fn from_config(
        pool: Arc<BrowserPool>,
        registry: Arc<ShutdownRegistry>,
        config: &PoolConfig,
    ) -> Self {
        Self::start(
            pool,
            registry,
            Duration::from_secs(config.resolve_maintain_initial_delay_secs()),
            Duration::from_secs(config.resolve_maintain_interval_secs()),
        )
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .expect("scheduler handle poisoned")
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Abort the timer task. Idempotent.
    pub fn stop(&self) {
        if let Some(handle) = self
            .handle
            .lock()
            .expect("scheduler handle poisoned")
            .take()
        {
            handle.abort();
            debug!("maintenance: scheduler stopped");
        }
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
