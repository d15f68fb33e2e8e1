//! Chromium-family launch mechanics.
//!
//! This module is the single source of truth for:
//! * Finding a usable browser executable (Brave → Chrome → Chromium,
//!   cross-platform).
//! * Building a `chromiumoxide::BrowserConfig` from composed launch options
//!   (per-context user-data dir, proxy, stealth defaults).
//! * [`ChromiumLauncher`] — the production [`BrowserLauncher`] strategy.
//!
//! Stealth model: process-level defaults only (user-agent rotation, browser
//! flags). JS-level stealth injection is the crawl pipeline's concern, not
//! the pool's.

pub mod driver;
pub mod launcher;

pub use driver::ChromiumDriver;
pub use launcher::{ChromiumConnection, ChromiumLauncher};

use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::handler::viewport::Viewport;
use rand::seq::IndexedRandom;
use std::path::Path;

use crate::pool::identity::BrowserFlavor;
use crate::pool::launcher::{LaunchError, LaunchOptions};

// ── Realistic User-Agent pool ────────────────────────────────────────────────

const DESKTOP_USER_AGENTS: &[&str] = &[
    // Chrome 132 – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    // Chrome 132 – macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    // Chrome 131 – Linux
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Edge 132 – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 Edg/132.0.0.0",
];

/// Returns a randomly-chosen realistic desktop User-Agent string.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::rng();
    DESKTOP_USER_AGENTS
        .choose(&mut rng)
        .copied()
        .unwrap_or(DESKTOP_USER_AGENTS[0])
}

// ── Browser executable discovery ─────────────────────────────────────────────

/// Find a usable Chromium-family browser executable.
///
/// Resolution order:
/// 1. `CHROME_EXECUTABLE` env var (explicit override)
/// 2. PATH scan — catches package-manager installs on all platforms.
/// 3. OS-specific well-known install paths.
pub fn find_chrome_executable() -> Option<String> {
    if let Ok(p) = std::env::var("CHROME_EXECUTABLE") {
        if Path::new(&p).exists() {
            return Some(p);
        }
    }

    let names = [
        "brave-browser",
        "brave",
        "google-chrome",
        "chromium",
        "chromium-browser",
        "chrome",
    ];
    if let Ok(path_var) = std::env::var("PATH") {
        for dir in std::env::split_paths(&path_var) {
            for name in names {
                let candidate = dir.join(name);
                if candidate.exists() {
                    return Some(candidate.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "linux")]
    let well_known = [
        "/usr/bin/brave-browser",
        "/usr/bin/brave",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/bin/google-chrome",
        "/usr/local/bin/chromium",
    ];
    #[cfg(target_os = "macos")]
    let well_known = [
        "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];
    #[cfg(target_os = "windows")]
    let well_known = [
        r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe",
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    ];
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    let well_known: [&str; 0] = [];

    for c in well_known {
        if Path::new(c).exists() {
            return Some(c.to_string());
        }
    }
    None
}

/// Returns `true` when a usable browser binary is present on this machine.
pub fn native_browser_available() -> bool {
    find_chrome_executable().is_some()
}

// ── Launch config builder ────────────────────────────────────────────────────

/// Build a `BrowserConfig` from composed launch options.
///
/// Flags chosen for compatibility with CI / restricted environments
/// (`--no-sandbox`, `--disable-dev-shm-usage`) plus
/// `--disable-blink-features=AutomationControlled` to suppress the
/// `navigator.webdriver` fingerprint. Supported capability overrides:
/// `user_agent` (string), `lang` (string); anything else is passed over.
pub fn build_browser_config(
    exe: &str,
    flavor: BrowserFlavor,
    options: &LaunchOptions,
) -> Result<BrowserConfig, LaunchError> {
    let (width, height) = options.window;
    let ua = options
        .capabilities
        .get("user_agent")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| random_user_agent().to_string());

    let mut builder = BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width,
            height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(width, height)
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-setuid-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--disable-crash-reporter")
        .arg("--disable-breakpad")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--hide-scrollbars")
        .arg("--mute-audio")
        .arg("--disable-blink-features=AutomationControlled")
        .arg(format!("--user-agent={}", ua));

    // The system-default flavor runs the user's own profile: no synthetic
    // user-data dir, always with a visible window.
    if flavor != BrowserFlavor::SystemDefault {
        builder = builder.user_data_dir(&options.user_data_dir);
    }
    if !options.headless {
        builder = builder.with_head();
    }
    if let Some(proxy) = &options.proxy {
        url::Url::parse(&proxy.url)
            .map_err(|e| LaunchError::InvalidOptions(format!("bad proxy url '{}': {}", proxy.url, e)))?;
        builder = builder.arg(format!("--proxy-server={}", proxy.url));
    }
    if let Some(lang) = options.capabilities.get("lang").and_then(|v| v.as_str()) {
        builder = builder.arg(format!("--lang={}", lang));
    }

    builder
        .build()
        .map_err(|e| LaunchError::InvalidOptions(format!("browser config rejected: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::identity::BrowserIdentity;
    use crate::pool::launcher::LaunchOptions;

    #[test]
    fn user_agent_pool_yields_known_entries() {
        for _ in 0..16 {
            assert!(DESKTOP_USER_AGENTS.contains(&random_user_agent()));
        }
    }

    #[test]
    fn malformed_proxy_url_is_rejected() {
        let identity = BrowserIdentity::temp_random();
        let mut options = LaunchOptions::compose(
            &identity,
            &crate::core::types::LaunchSettings::default(),
            &crate::core::types::Fingerprint::new(),
        );
        options.proxy = Some(crate::core::types::ProxyEntry::new("not a url"));
        let err = build_browser_config("/usr/bin/chromium", identity.flavor(), &options)
            .expect_err("bad proxy must fail");
        assert!(matches!(err, LaunchError::InvalidOptions(_)));
    }
}
