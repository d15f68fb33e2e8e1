//! One running browser process and its keyed collection of drivers.
//!
//! A `Browser` is owned exclusively by the pool once launched. It exposes
//! graceful close, forced destroy and the ordered maintenance hook; the
//! OS-process/CDP mechanics live behind the [`BrowserConnection`] seam so
//! the pool core stays engine-agnostic (and mockable in tests).

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::types::CloseOutcome;
use crate::pool::driver::WebDriver;
use crate::pool::identity::BrowserIdentity;

/// Process-wide browser instance counter. Every launch gets a fresh id, so
/// reuses of the same identity across launches stay distinguishable in the
/// historical log and the zombie diff.
static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Ordered lifecycle notifications emitted by the maintenance sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserEvent {
    WillMaintain,
    Maintain,
    DidMaintain,
}

/// The OS-process/CDP seam between the pool core and a concrete engine.
///
/// Implemented by [`crate::chromium::ChromiumConnection`] in production and
/// by mocks in tests. `close` and `destroy_forcibly` may fail — callers wrap
/// them into a [`CloseOutcome`] and never let the failure propagate.
#[async_trait]
pub trait BrowserConnection: Send + Sync {
    /// Whether the underlying process/connection still looks alive. Purely
    /// advisory — a browser can die between this check and the next call.
    fn is_connected(&self) -> bool;

    /// Open a new controllable page/tab.
    async fn new_driver(&self) -> anyhow::Result<Arc<dyn WebDriver>>;

    /// Probe the connection (e.g. open and close a blank tab).
    async fn check_health(&self) -> anyhow::Result<()>;

    /// Graceful shutdown of the browser process.
    async fn close(&self) -> anyhow::Result<()>;

    /// Force-kill the browser process and any stragglers it left behind.
    async fn destroy_forcibly(&self) -> anyhow::Result<()>;

    /// Lifecycle notification from the maintenance sweep. Default: ignore.
    fn on_event(&self, _event: BrowserEvent) {}
}

/// One running browser process bound to a privacy context.
pub struct Browser {
    instance_id: u64,
    identity: BrowserIdentity,
    connection: Arc<dyn BrowserConnection>,
    drivers: DashMap<u64, Arc<dyn WebDriver>>,
    next_driver_id: AtomicU64,
    active: AtomicBool,
}

impl Browser {
    pub fn new(identity: BrowserIdentity, connection: Arc<dyn BrowserConnection>) -> Self {
        Self {
            instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            identity,
            connection,
            drivers: DashMap::new(),
            next_driver_id: AtomicU64::new(1),
            active: AtomicBool::new(true),
        }
    }

    /// Unique per-launch id. Distinct from the identity: the same identity
    /// relaunched yields a new instance id.
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    pub fn identity(&self) -> &BrowserIdentity {
        &self.identity
    }

    /// Liveness as the pool sees it: not yet closed/destroyed *and* the
    /// connection still reports connected. A browser present in the active
    /// map but dead underneath answers `false` here — never an error.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && self.connection.is_connected()
    }

    /// Open a new driver in this browser and register it in the keyed
    /// collection. This is the only constructor for drivers — the pool
    /// orchestrates closing them, never creates them.
    pub async fn new_driver(&self) -> anyhow::Result<Arc<dyn WebDriver>> {
        let driver = self.connection.new_driver().await?;
        let id = self.next_driver_id.fetch_add(1, Ordering::Relaxed);
        self.drivers.insert(id, driver.clone());
        debug!("browser #{}: opened driver {}", self.instance_id, id);
        Ok(driver)
    }

    /// Snapshot of the current drivers.
    pub fn drivers(&self) -> Vec<Arc<dyn WebDriver>> {
        self.drivers.iter().map(|e| e.value().clone()).collect()
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    /// Remove `driver` from the keyed collection (matched by pointer
    /// identity) and close it, best-effort.
    pub async fn close_driver(&self, driver: &Arc<dyn WebDriver>) -> CloseOutcome {
        let key = self
            .drivers
            .iter()
            .find(|e| Arc::ptr_eq(e.value(), driver))
            .map(|e| *e.key());
        match key {
            Some(k) => {
                self.drivers.remove(&k);
                debug!("browser #{}: evicting driver {}", self.instance_id, k);
            }
            None => debug!(
                "browser #{}: driver not in collection, closing anyway",
                self.instance_id
            ),
        }
        CloseOutcome::from_result(driver.close().await)
    }

    /// Graceful close: drivers first, then the connection. Never fails
    /// loudly; the returned outcome reflects the connection close so the
    /// pool can log it while its bookkeeping proceeds regardless.
    pub async fn close(&self) -> CloseOutcome {
        for driver in self.drivers() {
            if let Err(e) = driver.close().await {
                warn!(
                    "browser #{} ({}): driver close failed: {:#}",
                    self.instance_id, self.identity, e
                );
            }
        }
        self.drivers.clear();
        let outcome = CloseOutcome::from_result(self.connection.close().await);
        self.active.store(false, Ordering::SeqCst);
        outcome
    }

    /// Force-destroy the underlying process. Used for hung processes and
    /// zombie reconciliation; skips the per-driver goodbyes.
    pub async fn destroy_forcibly(&self) -> CloseOutcome {
        self.drivers.clear();
        let outcome = CloseOutcome::from_result(self.connection.destroy_forcibly().await);
        self.active.store(false, Ordering::SeqCst);
        outcome
    }

    /// Per-browser housekeeping hook driven by the maintenance sweep. The
    /// will → maintain → did order per browser is a contract; the `Maintain`
    /// step runs the connection health probe and flips the browser inactive
    /// when the probe fails, so the pool's crash-detection can pick it up.
    pub async fn emit(&self, event: BrowserEvent) {
        self.connection.on_event(event);
        match event {
            BrowserEvent::WillMaintain => {
                debug!("browser #{} ({}): will-maintain", self.instance_id, self.identity);
            }
            BrowserEvent::Maintain => {
                if !self.active.load(Ordering::SeqCst) {
                    return;
                }
                if let Err(e) = self.connection.check_health().await {
                    warn!(
                        "browser #{} ({}): health check failed, marking inactive: {:#}",
                        self.instance_id, self.identity, e
                    );
                    self.active.store(false, Ordering::SeqCst);
                    self.drivers.clear();
                }
            }
            BrowserEvent::DidMaintain => {
                debug!(
                    "browser #{} ({}): did-maintain ({} drivers)",
                    self.instance_id,
                    self.identity,
                    self.drivers.len()
                );
            }
        }
    }
}

impl std::fmt::Debug for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Browser")
            .field("instance_id", &self.instance_id)
            .field("identity", &self.identity.to_string())
            .field("drivers", &self.drivers.len())
            .field("active", &self.active.load(Ordering::SeqCst))
            .finish()
    }
}
