//! The launcher strategy — the only place a browser OS process is born.
//!
//! The pool delegates process creation here at most once per identity; every
//! other path reuses or destroys. Launch is the single loud failure point in
//! the whole lifecycle: teardown is always best-effort, creation is not.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::types::{Fingerprint, LaunchSettings, ProxyEntry, SupervisorCommand};
use crate::pool::browser::Browser;
use crate::pool::identity::{BrowserFlavor, BrowserIdentity};

/// Why a browser process could not be obtained. Propagated synchronously to
/// the caller of `launch`; the identity stays absent from the active set.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no usable browser executable found (set CHROME_EXECUTABLE or install Chrome/Chromium/Brave)")]
    ExecutableNotFound,

    #[error("invalid launch options: {0}")]
    InvalidOptions(String),

    #[error("supervisor process misconfigured: {0}")]
    Supervisor(String),

    #[error("browser process failed to start: {0}")]
    Spawn(String),
}

/// Fully composed options for one launch: the caller's settings merged with
/// the identity's own overrides.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub user_data_dir: PathBuf,
    pub headless: bool,
    pub window: (u32, u32),
    pub proxy: Option<ProxyEntry>,
    pub supervisor: Option<SupervisorCommand>,
    pub capabilities: Fingerprint,
}

impl LaunchOptions {
    /// Merge `settings` and `capabilities` with the identity's overrides.
    ///
    /// Precedence: the identity's proxy beats the settings proxy (the proxy
    /// is part of the privacy context), the identity's fingerprint entries
    /// beat caller-supplied capabilities, and the `SystemDefault` flavor is
    /// never headless — it is the user's own interactive browser.
    pub fn compose(
        identity: &BrowserIdentity,
        settings: &LaunchSettings,
        capabilities: &Fingerprint,
    ) -> Self {
        let mut caps = capabilities.clone();
        if let Some(fp) = identity.fingerprint() {
            for (key, value) in fp {
                caps.insert(key.clone(), value.clone());
            }
        }
        Self {
            user_data_dir: identity.context_dir().to_path_buf(),
            headless: settings.headless && identity.flavor() != BrowserFlavor::SystemDefault,
            window: settings.window,
            proxy: identity.proxy().cloned().or_else(|| settings.proxy.clone()),
            supervisor: settings.supervisor.clone(),
            capabilities: caps,
        }
    }
}

/// Strategy that turns `(identity, options)` into a connected [`Browser`].
///
/// Implementations own their timeout policy; the pool imposes no timeout or
/// retry of its own and surfaces whatever the launcher reports.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(
        &self,
        identity: &BrowserIdentity,
        options: LaunchOptions,
    ) -> Result<Browser, LaunchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;

    #[test]
    fn identity_proxy_beats_settings_proxy() {
        let identity = BrowserIdentity::default_pooled(Path::new("/tmp/ctx"))
            .with_proxy(ProxyEntry::new("socks5://10.0.0.2:1080"));
        let settings = LaunchSettings {
            proxy: Some(ProxyEntry::new("http://fallback:8080")),
            ..Default::default()
        };
        let opts = LaunchOptions::compose(&identity, &settings, &HashMap::new());
        assert_eq!(opts.proxy.unwrap().url, "socks5://10.0.0.2:1080");
    }

    #[test]
    fn identity_fingerprint_beats_caller_capabilities() {
        let identity = BrowserIdentity::default_pooled(Path::new("/tmp/ctx")).with_fingerprint(
            HashMap::from([("tz".to_string(), serde_json::json!("Europe/Berlin"))]),
        );
        let caps = HashMap::from([
            ("tz".to_string(), serde_json::json!("UTC")),
            ("lang".to_string(), serde_json::json!("en-US")),
        ]);
        let opts = LaunchOptions::compose(&identity, &LaunchSettings::default(), &caps);
        assert_eq!(opts.capabilities["tz"], serde_json::json!("Europe/Berlin"));
        assert_eq!(opts.capabilities["lang"], serde_json::json!("en-US"));
    }

    #[test]
    fn system_default_is_never_headless() {
        let identity = BrowserIdentity::system_default();
        let settings = LaunchSettings {
            headless: true,
            ..Default::default()
        };
        let opts = LaunchOptions::compose(&identity, &settings, &HashMap::new());
        assert!(!opts.headless);
    }
}
