//! renderpool — browser instance pool and privacy-context lifecycle manager.
//!
//! The runtime core of a headless-browser crawler: launches, multiplexes,
//! monitors and retires browser processes, each bound to one isolated
//! privacy context (user-data dir + optional proxy + optional fingerprint)
//! so concurrent crawl workers never share cookies, caches or egress.

pub mod chromium;
pub mod core;
pub mod pool;

// --- Primary exports ---
pub use core::config::{load_pool_config, PoolConfig};
pub use core::types::{CloseOutcome, Fingerprint, LaunchSettings, ProxyEntry, SupervisorCommand};
pub use pool::browser::{Browser, BrowserConnection, BrowserEvent};
pub use pool::driver::WebDriver;
pub use pool::identity::{BrowserFlavor, BrowserIdentity};
pub use pool::launcher::{BrowserLauncher, LaunchError, LaunchOptions};
pub use pool::maintenance::MaintenanceScheduler;
pub use pool::manager::{BrowserPool, PoolStatus};
pub use pool::shutdown::{Closable, ShutdownRegistry, POOL_SHUTDOWN_PRIORITY};

// --- Concrete engine ---
pub use chromium::{ChromiumDriver, ChromiumLauncher};
