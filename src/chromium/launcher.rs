//! The production launcher: spawns a Chromium-family process per privacy
//! context via `chromiumoxide` and wraps it behind the pool's connection
//! seam.

use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::chromium::driver::ChromiumDriver;
use crate::chromium::{build_browser_config, find_chrome_executable};
use crate::pool::browser::{Browser, BrowserConnection};
use crate::pool::driver::WebDriver;
use crate::pool::identity::{BrowserFlavor, BrowserIdentity};
use crate::pool::launcher::{BrowserLauncher, LaunchError, LaunchOptions};

/// Launches Chromium-family browsers. One instance serves the whole pool;
/// the executable is resolved once up front.
pub struct ChromiumLauncher {
    exe: String,
}

impl ChromiumLauncher {
    pub fn new(exe: impl Into<String>) -> Self {
        Self { exe: exe.into() }
    }

    /// Use the auto-discovered executable; fails when no browser is
    /// installed on this machine.
    pub fn auto() -> Result<Self, LaunchError> {
        find_chrome_executable()
            .map(Self::new)
            .ok_or(LaunchError::ExecutableNotFound)
    }

    /// Start the configured supervisor process (e.g. `Xvfb :99`) that the
    /// browser is meant to run under. A configured-but-unstartable
    /// supervisor is a loud launch failure.
    async fn spawn_supervisor(
        &self,
        options: &LaunchOptions,
    ) -> Result<Option<tokio::process::Child>, LaunchError> {
        let Some(supervisor) = &options.supervisor else {
            return Ok(None);
        };
        info!(
            "chromium: starting supervisor '{} {}'",
            supervisor.program,
            supervisor.args.join(" ")
        );
        let child = tokio::process::Command::new(&supervisor.program)
            .args(&supervisor.args)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                LaunchError::Supervisor(format!("'{}' failed to start: {}", supervisor.program, e))
            })?;
        Ok(Some(child))
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(
        &self,
        identity: &BrowserIdentity,
        options: LaunchOptions,
    ) -> Result<Browser, LaunchError> {
        if identity.flavor() != BrowserFlavor::SystemDefault {
            std::fs::create_dir_all(&options.user_data_dir).map_err(|e| {
                LaunchError::InvalidOptions(format!(
                    "cannot create context dir {}: {}",
                    options.user_data_dir.display(),
                    e
                ))
            })?;
        }

        let supervisor = self.spawn_supervisor(&options).await?;

        let config = build_browser_config(&self.exe, identity.flavor(), &options)?;
        info!("chromium: launching {} for {}", self.exe, identity);
        let (browser, mut handler) = chromiumoxide::Browser::launch(config)
            .await
            .map_err(|e| LaunchError::Spawn(format!("{} ({})", e, self.exe)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("chromium: CDP handler error: {}", e);
                }
            }
        });

        let connection = ChromiumConnection {
            inner: tokio::sync::Mutex::new(Some(browser)),
            handler_task,
            supervisor: tokio::sync::Mutex::new(supervisor),
            user_data_dir: options.user_data_dir.clone(),
            connected: AtomicBool::new(true),
        };
        Ok(Browser::new(identity.clone(), Arc::new(connection)))
    }
}

/// One live CDP connection plus its handler task and optional supervisor
/// child. Implements the pool's engine seam.
pub struct ChromiumConnection {
    inner: tokio::sync::Mutex<Option<chromiumoxide::Browser>>,
    handler_task: JoinHandle<()>,
    supervisor: tokio::sync::Mutex<Option<tokio::process::Child>>,
    user_data_dir: PathBuf,
    connected: AtomicBool,
}

impl ChromiumConnection {
    async fn stop_supervisor(&self) {
        if let Some(mut child) = self.supervisor.lock().await.take() {
            if let Err(e) = child.kill().await {
                warn!("chromium: supervisor kill failed: {}", e);
            }
        }
    }
}

#[async_trait]
impl BrowserConnection for ChromiumConnection {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn new_driver(&self) -> anyhow::Result<Arc<dyn WebDriver>> {
        let guard = self.inner.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("browser connection already closed"))?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow::anyhow!("failed to open tab: {}", e))?;
        Ok(Arc::new(ChromiumDriver::new(page)))
    }

    /// Probe liveness the way the pool's acquire path does: open a blank
    /// tab and close it again.
    async fn check_health(&self) -> anyhow::Result<()> {
        let guard = self.inner.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("browser connection already closed"))?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow::anyhow!("health probe failed: {}", e))?;
        let _ = page.close().await;
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        let mut guard = self.inner.lock().await;
        if let Some(mut browser) = guard.take() {
            browser
                .close()
                .await
                .map_err(|e| anyhow::anyhow!("graceful close failed: {}", e))?;
            let _ = browser.wait().await;
        }
        self.handler_task.abort();
        self.stop_supervisor().await;
        debug!("chromium: connection closed ({})", self.user_data_dir.display());
        Ok(())
    }

    async fn destroy_forcibly(&self) -> anyhow::Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        let mut guard = self.inner.lock().await;
        if let Some(mut browser) = guard.take() {
            // A hung process may ignore this; the sweep below is the backstop.
            let _ = browser.close().await;
            let _ = browser.wait().await;
        }
        drop(guard);
        self.handler_task.abort();
        self.stop_supervisor().await;

        let killed = kill_processes_by_context(&self.user_data_dir);
        if killed > 0 {
            info!(
                "chromium: force-killed {} process(es) for context {}",
                killed,
                self.user_data_dir.display()
            );
        }
        Ok(())
    }
}

/// Kill every OS process whose command line carries this context's
/// `--user-data-dir` marker. Never touches normal user browsers — only
/// processes launched against our context directory match. Cross-platform
/// via sysinfo.
pub fn kill_processes_by_context(user_data_dir: &Path) -> u32 {
    if user_data_dir.as_os_str().is_empty() {
        return 0;
    }
    let marker = format!("--user-data-dir={}", user_data_dir.display());

    let mut sys = sysinfo::System::new();
    sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);

    let mut killed = 0u32;
    for (_pid, proc_) in sys.processes() {
        let cmd_line = proc_
            .cmd()
            .iter()
            .map(|s| s.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        if cmd_line.contains(&marker) {
            proc_.kill();
            killed += 1;
        }
    }
    killed
}
