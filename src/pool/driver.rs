//! The driver seam — one controllable page/tab inside a browser process.
//!
//! The pool only *reads* driver state and *closes* drivers; it never creates
//! them directly (that is the owning browser's job) and never defines page
//! control internals.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A controllable page/tab the pool can observe and, under resource
/// pressure, evict.
///
/// Eviction eligibility: a driver qualifies only when it is **neither ready
/// nor working**; among eligible drivers the one with the oldest
/// `last_active_at` is the least valuable and goes first.
#[async_trait]
pub trait WebDriver: Send + Sync {
    /// Whether the driver is primed with content a worker still cares about.
    fn is_ready(&self) -> bool;

    /// Whether a crawl worker currently holds this driver.
    fn is_working(&self) -> bool;

    /// Timestamp of the last acquire/release/navigation on this driver.
    fn last_active_at(&self) -> DateTime<Utc>;

    /// Close the underlying page/tab. Best-effort at the call sites — the
    /// pool logs a failure and moves on.
    async fn close(&self) -> anyhow::Result<()>;
}

/// Eviction predicate shared by the pool's least-valuable-driver scan.
pub(crate) fn is_evictable(driver: &dyn WebDriver) -> bool {
    !driver.is_ready() && !driver.is_working()
}
