use std::path::PathBuf;

// ---------------------------------------------------------------------------
// PoolConfig — file-based config loader (renderpool.json) with env-var fallback
// ---------------------------------------------------------------------------

/// Pool configuration, loaded from `~/.renderpool/renderpool.json`.
///
/// Every field is optional in the file; each `resolve_*` accessor falls back
/// to an environment variable and finally to a documented default, so a bare
/// deployment works with zero configuration.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct PoolConfig {
    /// Base directory for per-identity browser context dirs.
    pub contexts_dir: Option<String>,
    /// Run browsers headless. GUI flavors override this per launch.
    pub headless: Option<bool>,
    /// Explicit browser binary. Auto-discovery is used when unset.
    pub chrome_executable: Option<String>,
    /// Default egress proxy URL (per-identity proxies take precedence).
    pub proxy_url: Option<String>,
    /// Size of the round-robin context sequence for `NextSequential` launches.
    pub max_sequential_contexts: Option<u64>,
    /// Seconds before the first maintenance sweep.
    pub maintain_initial_delay_secs: Option<u64>,
    /// Seconds between maintenance sweeps.
    pub maintain_interval_secs: Option<u64>,
    /// External supervisor the browser runs under (e.g. `Xvfb`). Launch fails
    /// loudly when this is configured but cannot be started.
    pub supervisor_command: Option<String>,
    pub supervisor_args: Option<Vec<String>>,
    /// Browser window size, e.g. `"1920x1080"`.
    pub window: Option<String>,
}

impl PoolConfig {
    /// Contexts base dir: JSON field → `RENDERPOOL_CONTEXTS_DIR` → `~/.renderpool/contexts`.
    pub fn resolve_contexts_dir(&self) -> PathBuf {
        if let Some(d) = &self.contexts_dir {
            if !d.trim().is_empty() {
                return PathBuf::from(d);
            }
        }
        if let Ok(d) = std::env::var("RENDERPOOL_CONTEXTS_DIR") {
            if !d.trim().is_empty() {
                return PathBuf::from(d);
            }
        }
        dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(".renderpool")
            .join("contexts")
    }

    /// Headless mode: JSON field → `RENDERPOOL_HEADLESS` ("0"/"false" disable) → `true`.
    pub fn resolve_headless(&self) -> bool {
        if let Some(b) = self.headless {
            return b;
        }
        match std::env::var("RENDERPOOL_HEADLESS") {
            Ok(v) => !matches!(v.trim(), "0" | "false" | "no"),
            Err(_) => true,
        }
    }

    /// Browser binary override: JSON field → `CHROME_EXECUTABLE` → `None` (auto-discovery).
    pub fn resolve_chrome_executable(&self) -> Option<String> {
        if let Some(exe) = &self.chrome_executable {
            if !exe.trim().is_empty() {
                return Some(exe.clone());
            }
        }
        std::env::var("CHROME_EXECUTABLE")
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    /// Default proxy: JSON field → `RENDERPOOL_PROXY` → `None`.
    pub fn resolve_proxy_url(&self) -> Option<String> {
        if let Some(p) = &self.proxy_url {
            if !p.trim().is_empty() {
                return Some(p.clone());
            }
        }
        std::env::var("RENDERPOOL_PROXY")
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    /// Round-robin sequence length: JSON field → `RENDERPOOL_MAX_CONTEXTS` → 8.
    pub fn resolve_max_sequential_contexts(&self) -> u64 {
        if let Some(n) = self.max_sequential_contexts {
            return n.max(1);
        }
        std::env::var("RENDERPOOL_MAX_CONTEXTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(|n: u64| n.max(1))
            .unwrap_or(8)
    }

    /// Initial maintenance delay: JSON field → `RENDERPOOL_MAINTAIN_DELAY` → 30 s.
    pub fn resolve_maintain_initial_delay_secs(&self) -> u64 {
        if let Some(n) = self.maintain_initial_delay_secs {
            return n;
        }
        std::env::var("RENDERPOOL_MAINTAIN_DELAY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30)
    }

    /// Maintenance interval: JSON field → `RENDERPOOL_MAINTAIN_INTERVAL` → 60 s.
    pub fn resolve_maintain_interval_secs(&self) -> u64 {
        if let Some(n) = self.maintain_interval_secs {
            return n.max(1);
        }
        std::env::var("RENDERPOOL_MAINTAIN_INTERVAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(|n: u64| n.max(1))
            .unwrap_or(60)
    }

    /// Supervisor command: JSON fields → `RENDERPOOL_SUPERVISOR` /
    /// `RENDERPOOL_SUPERVISOR_ARGS` (whitespace-separated) → `None`.
    pub fn resolve_supervisor(&self) -> Option<super::types::SupervisorCommand> {
        let program = if let Some(c) = &self.supervisor_command {
            if c.trim().is_empty() {
                return None;
            }
            c.clone()
        } else {
            std::env::var("RENDERPOOL_SUPERVISOR")
                .ok()
                .filter(|v| !v.trim().is_empty())?
        };
        let args = self.supervisor_args.clone().unwrap_or_else(|| {
            std::env::var("RENDERPOOL_SUPERVISOR_ARGS")
                .map(|v| v.split_whitespace().map(String::from).collect())
                .unwrap_or_default()
        });
        Some(super::types::SupervisorCommand { program, args })
    }

    /// Window size: JSON field → `RENDERPOOL_WINDOW` ("WxH") → 1920×1080.
    pub fn resolve_window(&self) -> (u32, u32) {
        let raw = self
            .window
            .clone()
            .or_else(|| std::env::var("RENDERPOOL_WINDOW").ok());
        if let Some(raw) = raw {
            if let Some((w, h)) = raw.split_once('x') {
                if let (Ok(w), Ok(h)) = (w.trim().parse(), h.trim().parse()) {
                    return (w, h);
                }
            }
            tracing::warn!("config: unparseable window size '{}', using 1920x1080", raw);
        }
        (1920, 1080)
    }
}

/// Path to `renderpool.json` (`~/.renderpool/renderpool.json`).
pub fn pool_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".renderpool").join("renderpool.json"))
}

/// Load the pool config file, falling back to defaults (env-var resolution
/// still applies per field) when the file is absent or malformed.
pub fn load_pool_config() -> PoolConfig {
    let Some(path) = pool_config_path() else {
        return PoolConfig::default();
    };
    if !path.exists() {
        tracing::debug!("config: {} not found, using defaults", path.display());
        return PoolConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str::<PoolConfig>(&content) {
            Ok(cfg) => {
                tracing::info!("config: loaded {}", path.display());
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    "config: failed to parse {}: {} — using defaults",
                    path.display(),
                    e
                );
                PoolConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                "config: failed to read {}: {} — using defaults",
                path.display(),
                e
            );
            PoolConfig::default()
        }
    }
}
