//! Shared test doubles: a launcher/connection/driver stack with settable
//! flags and call counters, so pool behavior is observable without spawning
//! real browser processes.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use renderpool::{
    Browser, BrowserConnection, BrowserEvent, BrowserIdentity, BrowserLauncher, LaunchError,
    LaunchOptions, WebDriver,
};

/// Route pool tracing through the test harness. Safe to call from every
/// test; only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct MockDriver {
    ready: AtomicBool,
    working: AtomicBool,
    last_active_ms: AtomicI64,
    closed: AtomicBool,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            working: AtomicBool::new(false),
            last_active_ms: AtomicI64::new(Utc::now().timestamp_millis()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_working(&self, working: bool) {
        self.working.store(working, Ordering::SeqCst);
    }

    pub fn set_last_active_secs_ago(&self, secs: i64) {
        let ts = (Utc::now() - Duration::seconds(secs)).timestamp_millis();
        self.last_active_ms.store(ts, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebDriver for MockDriver {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn is_working(&self) -> bool {
        self.working.load(Ordering::SeqCst)
    }

    fn last_active_at(&self) -> DateTime<Utc> {
        chrono::TimeZone::timestamp_millis_opt(&Utc, self.last_active_ms.load(Ordering::SeqCst))
            .single()
            .expect("valid mock timestamp")
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockConnection {
    connected: AtomicBool,
    fail_close: AtomicBool,
    pub close_calls: AtomicUsize,
    pub destroy_calls: AtomicUsize,
    pub health_checks: AtomicUsize,
    drivers: Mutex<Vec<Arc<MockDriver>>>,
    events: Mutex<Vec<BrowserEvent>>,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            fail_close: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            destroy_calls: AtomicUsize::new(0),
            health_checks: AtomicUsize::new(0),
            drivers: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        })
    }

    /// Simulate an external crash: the process is gone but the pool has not
    /// noticed yet.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn destroy_count(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }

    pub fn health_check_count(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }

    /// Concrete handles to every driver this connection spawned, in spawn
    /// order — lets tests flip flags the `WebDriver` trait only exposes
    /// read-only.
    pub fn spawned_drivers(&self) -> Vec<Arc<MockDriver>> {
        self.drivers.lock().unwrap().clone()
    }

    /// Lifecycle events seen so far, in emission order.
    pub fn events(&self) -> Vec<BrowserEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserConnection for MockConnection {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn new_driver(&self) -> anyhow::Result<Arc<dyn WebDriver>> {
        if !self.is_connected() {
            anyhow::bail!("mock connection is dead");
        }
        let driver = Arc::new(MockDriver::new());
        self.drivers.lock().unwrap().push(driver.clone());
        Ok(driver)
    }

    async fn check_health(&self) -> anyhow::Result<()> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        if self.is_connected() {
            Ok(())
        } else {
            anyhow::bail!("mock health probe failed")
        }
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            anyhow::bail!("mock close failure");
        }
        Ok(())
    }

    async fn destroy_forcibly(&self) -> anyhow::Result<()> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn on_event(&self, event: BrowserEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct MockLauncher {
    launches: AtomicUsize,
    fail_next: AtomicBool,
    launch_delay: Mutex<Option<std::time::Duration>>,
    connections: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            launches: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
            launch_delay: Mutex::new(None),
            connections: Mutex::new(Vec::new()),
        })
    }

    pub fn set_fail_next(&self, fail: bool) {
        self.fail_next.store(fail, Ordering::SeqCst);
    }

    pub fn set_launch_delay(&self, delay: std::time::Duration) {
        *self.launch_delay.lock().unwrap() = Some(delay);
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Connections in launch order.
    pub fn connections(&self) -> Vec<Arc<MockConnection>> {
        self.connections.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(
        &self,
        identity: &BrowserIdentity,
        _options: LaunchOptions,
    ) -> Result<Browser, LaunchError> {
        if self.fail_next.load(Ordering::SeqCst) {
            return Err(LaunchError::Spawn("mock launch failure".into()));
        }
        let delay = *self.launch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        let connection = MockConnection::new();
        self.connections.lock().unwrap().push(connection.clone());
        Ok(Browser::new(identity.clone(), connection))
    }
}
