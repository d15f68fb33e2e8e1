pub mod browser;
pub mod driver;
pub mod identity;
pub mod launcher;
pub mod maintenance;
pub mod manager;
pub mod shutdown;

pub use browser::{Browser, BrowserConnection, BrowserEvent};
pub use driver::WebDriver;
pub use identity::{BrowserFlavor, BrowserIdentity};
pub use launcher::{BrowserLauncher, LaunchError, LaunchOptions};
pub use maintenance::MaintenanceScheduler;
pub use manager::{BrowserPool, PoolStatus};
pub use shutdown::{Closable, ShutdownRegistry, POOL_SHUTDOWN_PRIORITY};
