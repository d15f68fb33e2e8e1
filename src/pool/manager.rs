//! The browser pool — identity-to-instance bookkeeping and lifecycle policy.
//!
//! Three collections, one lock:
//! * `active` — the authoritative live set, one browser per identity. A
//!   concurrent map so pure lookups never block writers.
//! * `historical` — append-only log of every browser ever launched.
//! * `closed` — browsers that went through the graceful close path.
//!
//! `historical − active − closed` is the zombie set: processes the pool lost
//! track of without a graceful goodbye, still holding OS resources.
//!
//! All mutating operations (launch, close, destroy, shutdown) run inside the
//! single `books` mutex so the same identity is never launched twice
//! concurrently, the collections never tear, and the zombie diff always sees
//! a consistent snapshot.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::core::config::PoolConfig;
use crate::core::types::{CloseOutcome, Fingerprint, LaunchSettings};
use crate::pool::browser::{Browser, BrowserEvent};
use crate::pool::driver::{is_evictable, WebDriver};
use crate::pool::identity::BrowserIdentity;
use crate::pool::launcher::{BrowserLauncher, LaunchError, LaunchOptions};
use crate::pool::shutdown::{Closable, ShutdownRegistry, POOL_SHUTDOWN_PRIORITY};

/// The historical and graceful-close logs. Guarded by the pool's only
/// mutation lock; `historical` is append-only and never pruned.
#[derive(Default)]
struct PoolBooks {
    historical: Vec<Arc<Browser>>,
    closed: Vec<Arc<Browser>>,
}

/// Point-in-time collection sizes, for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub active: usize,
    pub historical: usize,
    pub closed: usize,
}

/// The browser instance pool and privacy-context lifecycle manager.
pub struct BrowserPool {
    launcher: Arc<dyn BrowserLauncher>,
    config: Arc<PoolConfig>,
    shutdown: Arc<ShutdownRegistry>,
    active: DashMap<BrowserIdentity, Arc<Browser>>,
    books: Mutex<PoolBooks>,
    /// One-shot pool shutdown guard.
    closed: AtomicBool,
    /// One-shot shutdown-registry registration guard.
    registered: AtomicBool,
    /// Round-robin cursor for `launch_next_sequential`.
    seq: AtomicU64,
}

impl BrowserPool {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        config: Arc<PoolConfig>,
        shutdown: Arc<ShutdownRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            launcher,
            config,
            shutdown,
            active: DashMap::new(),
            books: Mutex::new(PoolBooks::default()),
            closed: AtomicBool::new(false),
            registered: AtomicBool::new(false),
            seq: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Register this pool with the shutdown registry exactly once, at a low
    /// priority so it is torn down near the very end of process shutdown.
    fn ensure_registered(self: &Arc<Self>) {
        if self
            .registered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.shutdown
                .register(POOL_SHUTDOWN_PRIORITY, Arc::clone(self) as Arc<dyn Closable>);
            debug!(
                "pool: registered with shutdown registry at priority {}",
                POOL_SHUTDOWN_PRIORITY
            );
        }
    }

    // ── Launch-or-reuse ──────────────────────────────────────────────────

    /// Return the active browser for `identity`, launching one if absent.
    ///
    /// Double-checked under the books lock: two concurrent calls for the
    /// same identity receive the same browser and spawn exactly one process.
    /// A launch failure propagates to the caller and leaves `active`
    /// untouched.
    pub async fn launch(
        self: &Arc<Self>,
        identity: BrowserIdentity,
        settings: &LaunchSettings,
        capabilities: &Fingerprint,
    ) -> Result<Arc<Browser>, LaunchError> {
        self.ensure_registered();

        if let Some(existing) = self.active.get(&identity) {
            return Ok(existing.clone());
        }

        let mut books = self.books.lock().await;
        // Re-check: another caller may have launched while we waited.
        if let Some(existing) = self.active.get(&identity) {
            return Ok(existing.clone());
        }

        let options = LaunchOptions::compose(&identity, settings, capabilities);
        info!("🚀 pool: launching browser for {}", identity);
        let browser = Arc::new(self.launcher.launch(&identity, options).await?);

        self.active.insert(identity.clone(), browser.clone());
        books.historical.push(browser.clone());
        info!(
            "pool: browser #{} active for {} ({} active total)",
            browser.instance_id(),
            identity,
            self.active.len()
        );
        Ok(browser)
    }

    /// Launch the system's own interactive browser.
    pub async fn launch_system_default(self: &Arc<Self>) -> Result<Arc<Browser>, LaunchError> {
        self.launch_flavored(BrowserIdentity::system_default()).await
    }

    /// Launch the shared default pooled browser.
    pub async fn launch_default(self: &Arc<Self>) -> Result<Arc<Browser>, LaunchError> {
        let base = self.config.resolve_contexts_dir();
        self.launch_flavored(BrowserIdentity::default_pooled(&base)).await
    }

    /// Launch a disposable prototype browser.
    pub async fn launch_prototype(self: &Arc<Self>) -> Result<Arc<Browser>, LaunchError> {
        let base = self.config.resolve_contexts_dir();
        self.launch_flavored(BrowserIdentity::prototype(&base)).await
    }

    /// Launch the next browser in the bounded round-robin context sequence.
    pub async fn launch_next_sequential(self: &Arc<Self>) -> Result<Arc<Browser>, LaunchError> {
        let base = self.config.resolve_contexts_dir();
        let bound = self.config.resolve_max_sequential_contexts();
        let n = self.seq.fetch_add(1, Ordering::Relaxed) % bound;
        self.launch_flavored(BrowserIdentity::sequential(&base, n)).await
    }

    /// Launch a throwaway browser with a random temp context dir.
    pub async fn launch_temp_random(self: &Arc<Self>) -> Result<Arc<Browser>, LaunchError> {
        self.launch_flavored(BrowserIdentity::temp_random()).await
    }

    async fn launch_flavored(
        self: &Arc<Self>,
        identity: BrowserIdentity,
    ) -> Result<Arc<Browser>, LaunchError> {
        let settings = LaunchSettings::from_config(&self.config);
        self.launch(identity, &settings, &Fingerprint::new()).await
    }

    // ── Lookups ──────────────────────────────────────────────────────────

    /// Lock-free lookup against the active set.
    pub fn find_browser(&self, identity: &BrowserIdentity) -> Option<Arc<Browser>> {
        self.active.get(identity).map(|e| e.value().clone())
    }

    /// Whether `identity` has a live browser. A browser present in the map
    /// but dead underneath counts as not active — lookups are total.
    pub fn is_active(&self, identity: &BrowserIdentity) -> bool {
        self.active
            .get(identity)
            .map(|e| e.value().is_active())
            .unwrap_or(false)
    }

    pub async fn status(&self) -> PoolStatus {
        let books = self.books.lock().await;
        PoolStatus {
            active: self.active.len(),
            historical: books.historical.len(),
            closed: books.closed.len(),
        }
    }

    // ── Graceful close ───────────────────────────────────────────────────

    /// Idempotent graceful close: remove from `active` (no-op when absent),
    /// close best-effort, and record in `closed` regardless of whether the
    /// OS-level close succeeded — the accounting never gets stuck on a
    /// misbehaving process.
    pub async fn close_browser(&self, identity: &BrowserIdentity) -> CloseOutcome {
        let mut books = self.books.lock().await;
        let Some((_, browser)) = self.active.remove(identity) else {
            debug!("pool: close for {} — not active, no-op", identity);
            return CloseOutcome::Completed;
        };
        let outcome = browser.close().await;
        if let CloseOutcome::Failed(reason) = &outcome {
            warn!(
                "pool: graceful close of browser #{} ({}) failed: {}",
                browser.instance_id(),
                identity,
                reason
            );
        }
        books.closed.push(browser);
        info!("pool: browser for {} closed", identity);
        outcome
    }

    /// Convenience overload of [`Self::close_browser`] for a held handle.
    pub async fn close_browser_instance(&self, browser: &Browser) -> CloseOutcome {
        self.close_browser(browser.identity()).await
    }

    /// Close a single driver wherever it lives: locate the active browser
    /// owning it (pointer identity over the driver collection) and delegate
    /// to [`Browser::close_driver`]. A driver whose owner is already gone
    /// is closed directly, best-effort.
    pub async fn close_driver(&self, driver: &Arc<dyn WebDriver>) -> CloseOutcome {
        let owner = self.active.iter().find_map(|entry| {
            entry
                .value()
                .drivers()
                .iter()
                .any(|d| Arc::ptr_eq(d, driver))
                .then(|| entry.value().clone())
        });
        match owner {
            Some(browser) => browser.close_driver(driver).await,
            None => {
                debug!("pool: closing driver with no active owner");
                CloseOutcome::from_result(driver.close().await)
            }
        }
    }

    // ── Forced destroy ───────────────────────────────────────────────────

    /// Force-kill **every** historical browser matching `identity` (there
    /// may be several when the identity was reused across launches). Used
    /// for hung processes; bypasses the graceful-close log.
    pub async fn destroy_browser_forcibly(&self, identity: &BrowserIdentity) {
        let books = self.books.lock().await;
        if self.active.remove(identity).is_some() {
            debug!("pool: {} dropped from active for forced destroy", identity);
        }
        for browser in books.historical.iter().filter(|b| b.identity() == identity) {
            info!(
                "pool: 🗑️  force-destroying browser #{} ({})",
                browser.instance_id(),
                identity
            );
            if let CloseOutcome::Failed(reason) = browser.destroy_forcibly().await {
                warn!(
                    "pool: force-destroy of browser #{} failed: {}",
                    browser.instance_id(),
                    reason
                );
            }
        }
    }

    /// Reap every zombie: browsers in the historical log that are in
    /// neither `active` nor `closed` (crashed, or closed out-of-band) and
    /// therefore still hold OS resources. Never touches a browser that is
    /// legitimately active or already gracefully closed. Returns the number
    /// of zombies destroyed.
    pub async fn destroy_zombie_browsers_forcibly(&self) -> usize {
        let books = self.books.lock().await;
        let active_ids: HashSet<u64> =
            self.active.iter().map(|e| e.value().instance_id()).collect();
        let closed_ids: HashSet<u64> =
            books.closed.iter().map(|b| b.instance_id()).collect();

        let mut reaped = 0usize;
        for browser in &books.historical {
            let id = browser.instance_id();
            if active_ids.contains(&id) || closed_ids.contains(&id) {
                continue;
            }
            warn!(
                "pool: 🧟 reaping zombie browser #{} ({})",
                id,
                browser.identity()
            );
            if let CloseOutcome::Failed(reason) = browser.destroy_forcibly().await {
                warn!("pool: zombie destroy of browser #{} failed: {}", id, reason);
            }
            reaped += 1;
        }
        if reaped > 0 {
            info!("pool: reaped {} zombie browser(s)", reaped);
        }
        reaped
    }

    // ── Driver eviction ──────────────────────────────────────────────────

    /// The idle (non-ready, non-working) driver with the oldest last-active
    /// timestamp across all active browsers, or `None` when every driver is
    /// in use.
    pub fn find_least_valuable_driver(&self) -> Option<Arc<dyn WebDriver>> {
        self.locate_least_valuable_driver().map(|(_, driver)| driver)
    }

    fn locate_least_valuable_driver(&self) -> Option<(Arc<Browser>, Arc<dyn WebDriver>)> {
        let mut best: Option<(Arc<Browser>, Arc<dyn WebDriver>)> = None;
        for entry in self.active.iter() {
            for driver in entry.value().drivers() {
                if !is_evictable(driver.as_ref()) {
                    continue;
                }
                let older = match &best {
                    Some((_, current)) => driver.last_active_at() < current.last_active_at(),
                    None => true,
                };
                if older {
                    best = Some((entry.value().clone(), driver));
                }
            }
        }
        best
    }

    /// The pool's memory-relief valve: close the least valuable driver, if
    /// any. Logging, never throwing.
    pub async fn close_least_valuable_driver(&self) -> CloseOutcome {
        let Some((browser, driver)) = self.locate_least_valuable_driver() else {
            debug!("pool: eviction requested but no idle driver qualifies");
            return CloseOutcome::Completed;
        };
        let outcome = browser.close_driver(&driver).await;
        if let CloseOutcome::Failed(reason) = &outcome {
            warn!(
                "pool: eviction close on browser #{} failed: {}",
                browser.instance_id(),
                reason
            );
        }
        outcome
    }

    // ── Maintenance ──────────────────────────────────────────────────────

    /// Periodic housekeeping: emit will-maintain → maintain → did-maintain
    /// on every active browser (order per browser is the contract; browsers
    /// are processed sequentially), then drop browsers whose health probe
    /// failed from the active set so the zombie sweep can reclaim them.
    pub async fn maintain(&self) {
        let snapshot: Vec<Arc<Browser>> = {
            // Holding `books` serializes the snapshot against in-flight
            // launch and close, not against lock-free readers: a browser is
            // either fully registered or absent when the sweep starts.
            let _books = self.books.lock().await;
            self.active.iter().map(|e| e.value().clone()).collect()
        };
        debug!("pool: maintenance sweep over {} browser(s)", snapshot.len());
        for browser in snapshot {
            browser.emit(BrowserEvent::WillMaintain).await;
            browser.emit(BrowserEvent::Maintain).await;
            browser.emit(BrowserEvent::DidMaintain).await;

            if !browser.is_active() {
                // Crash-detection path: drop from active without entering
                // the closed log, leaving it for the zombie sweep.
                let removed = self.active.remove_if(browser.identity(), |_, current| {
                    current.instance_id() == browser.instance_id()
                });
                if removed.is_some() {
                    warn!(
                        "pool: browser #{} ({}) no longer alive — dropped from active set",
                        browser.instance_id(),
                        browser.identity()
                    );
                }
            }
        }
    }

    // ── Pool shutdown ────────────────────────────────────────────────────

    /// One-shot pool-wide shutdown: gracefully close every active browser
    /// (individual failures logged, never fatal) and clear the active set.
    /// Safe to call repeatedly; only the first call does any work.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("pool: close() called again, already shut down");
            return;
        }
        let mut books = self.books.lock().await;
        let identities: Vec<BrowserIdentity> =
            self.active.iter().map(|e| e.key().clone()).collect();
        info!("🛑 pool: shutting down, closing {} browser(s)", identities.len());
        for identity in identities {
            let Some((_, browser)) = self.active.remove(&identity) else {
                continue;
            };
            if let CloseOutcome::Failed(reason) = browser.close().await {
                warn!(
                    "pool: shutdown close of browser #{} ({}) failed: {}",
                    browser.instance_id(),
                    identity,
                    reason
                );
            }
            books.closed.push(browser);
        }
        self.active.clear();
    }
}

#[async_trait::async_trait]
impl Closable for BrowserPool {
    fn name(&self) -> &str {
        "browser-pool"
    }

    async fn close(&self) {
        BrowserPool::close(self).await;
    }
}
