//! CDP-backed driver: one Chromium tab with the flags the eviction policy
//! reads. Crawl workers flip `working`/`ready` as they acquire and release
//! the driver; every flag change refreshes the last-active timestamp.

use async_trait::async_trait;
use chromiumoxide::Page;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crate::pool::driver::WebDriver;

pub struct ChromiumDriver {
    page: Page,
    ready: AtomicBool,
    working: AtomicBool,
    last_active_ms: AtomicI64,
}

impl ChromiumDriver {
    pub(crate) fn new(page: Page) -> Self {
        Self {
            page,
            // Fresh tabs are idle: evictable until a worker claims them.
            ready: AtomicBool::new(false),
            working: AtomicBool::new(false),
            last_active_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    /// The underlying CDP page. `Page` is cheaply cloneable; page control
    /// (navigation, DOM) is the crawl pipeline's concern.
    pub fn page(&self) -> Page {
        self.page.clone()
    }

    /// Refresh the last-active timestamp.
    pub fn touch(&self) {
        self.last_active_ms
            .store(Utc::now().timestamp_millis(), Ordering::SeqCst);
    }

    /// Mark content readiness (protects the driver from eviction).
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
        self.touch();
    }

    /// Mark worker occupancy (protects the driver from eviction).
    pub fn set_working(&self, working: bool) {
        self.working.store(working, Ordering::SeqCst);
        self.touch();
    }
}

#[async_trait]
impl WebDriver for ChromiumDriver {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn is_working(&self) -> bool {
        self.working.load(Ordering::SeqCst)
    }

    fn last_active_at(&self) -> DateTime<Utc> {
        let ms = self.last_active_ms.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.ready.store(false, Ordering::SeqCst);
        self.working.store(false, Ordering::SeqCst);
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| anyhow::anyhow!("tab close failed: {}", e))
    }
}
