//! Explicit process-shutdown coordination.
//!
//! An explicit registry object passed into the pool at construction time —
//! no hidden process-wide mutable state. Components register a closable at a
//! priority; `shutdown()` flips the process inactive and tears registrants
//! down in descending priority order, so low-priority registrants (the pool)
//! go near the very end, after components that still need live browsers.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Priority the browser pool registers at. Low, so the pool outlives
/// everything that still wants a browser during teardown.
pub const POOL_SHUTDOWN_PRIORITY: i32 = -100;

/// Anything that can be torn down at process shutdown.
#[async_trait]
pub trait Closable: Send + Sync {
    fn name(&self) -> &str;
    async fn close(&self);
}

/// Priority-ordered shutdown coordinator. Higher priority closes first.
pub struct ShutdownRegistry {
    entries: std::sync::Mutex<Vec<(i32, Arc<dyn Closable>)>>,
    active: AtomicBool,
}

impl ShutdownRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: std::sync::Mutex::new(Vec::new()),
            active: AtomicBool::new(true),
        })
    }

    /// Register `closable` to be closed at `priority` during shutdown.
    /// Callers wanting exactly-once registration guard this with their own
    /// atomic flag (see `BrowserPool::ensure_registered`).
    pub fn register(&self, priority: i32, closable: Arc<dyn Closable>) {
        let mut entries = self.entries.lock().expect("shutdown registry poisoned");
        debug!(
            "shutdown: registered '{}' at priority {}",
            closable.name(),
            priority
        );
        entries.push((priority, closable));
    }

    /// Whether the enclosing process is still running normally. Timers and
    /// schedulers poll this to self-disable during shutdown.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn registered_count(&self) -> usize {
        self.entries.lock().expect("shutdown registry poisoned").len()
    }

    /// One-shot teardown: mark the process inactive, then close registrants
    /// in descending priority order. Repeat calls are no-ops.
    pub async fn shutdown(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            debug!("shutdown: already performed");
            return;
        }
        let mut entries = {
            self.entries
                .lock()
                .expect("shutdown registry poisoned")
                .clone()
        };
        entries.sort_by_key(|(priority, _)| std::cmp::Reverse(*priority));
        info!("shutdown: closing {} registrant(s)", entries.len());
        for (priority, closable) in entries {
            info!("shutdown: closing '{}' (priority {})", closable.name(), priority);
            closable.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Recorder {
        label: &'static str,
        order: Arc<std::sync::Mutex<Vec<&'static str>>>,
        closes: AtomicUsize,
    }

    #[async_trait]
    impl Closable for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.order.lock().unwrap().push(self.label);
        }
    }

    #[tokio::test]
    async fn shutdown_closes_in_descending_priority_once() {
        let registry = ShutdownRegistry::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let low = Arc::new(Recorder {
            label: "pool",
            order: order.clone(),
            closes: AtomicUsize::new(0),
        });
        let high = Arc::new(Recorder {
            label: "scheduler",
            order: order.clone(),
            closes: AtomicUsize::new(0),
        });
        registry.register(POOL_SHUTDOWN_PRIORITY, low.clone());
        registry.register(100, high.clone());

        assert!(registry.is_active());
        registry.shutdown().await;
        assert!(!registry.is_active());
        assert_eq!(*order.lock().unwrap(), vec!["scheduler", "pool"]);

        // Second shutdown performs no work.
        registry.shutdown().await;
        assert_eq!(low.closes.load(Ordering::SeqCst), 1);
        assert_eq!(high.closes.load(Ordering::SeqCst), 1);
    }
}
