use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque fingerprint / capability overrides forwarded to the launcher
/// (user-agent, language, timezone, WebGL vendor, …). The pool never
/// interprets these — they are part of the privacy context's identity.
pub type Fingerprint = HashMap<String, serde_json::Value>;

/// Immutable egress proxy descriptor bound to a privacy context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ProxyEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }
}

/// External supervisor process the browser runs under (e.g. `Xvfb :99`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Caller-supplied launch settings, independent of any particular identity.
///
/// Identity-level overrides (proxy, fingerprint) are merged on top of these
/// by [`crate::pool::launcher::LaunchOptions::compose`].
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub headless: bool,
    pub window: (u32, u32),
    pub proxy: Option<ProxyEntry>,
    pub supervisor: Option<SupervisorCommand>,
}

impl LaunchSettings {
    pub fn from_config(config: &super::config::PoolConfig) -> Self {
        Self {
            headless: config.resolve_headless(),
            window: config.resolve_window(),
            proxy: config.resolve_proxy_url().map(ProxyEntry::new),
            supervisor: config.resolve_supervisor(),
        }
    }
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window: (1920, 1080),
            proxy: None,
            supervisor: None,
        }
    }
}

/// Result of a best-effort teardown operation (close, force-destroy).
///
/// Teardown never fails loudly: the pool inspects the outcome for logging
/// but lets the surrounding loop continue either way, so shutdown and
/// eviction are never blocked by a single misbehaving process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    Completed,
    Failed(String),
}

impl CloseOutcome {
    pub fn failed(err: impl std::fmt::Display) -> Self {
        Self::Failed(err.to_string())
    }

    pub fn from_result(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => Self::Completed,
            Err(e) => Self::Failed(format!("{:#}", e)),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_outcome_from_result() {
        assert_eq!(CloseOutcome::from_result(Ok(())), CloseOutcome::Completed);
        let failed = CloseOutcome::from_result(Err(anyhow::anyhow!("boom")));
        assert!(failed.is_failed());
    }

    #[test]
    fn settings_default_is_headless() {
        let s = LaunchSettings::default();
        assert!(s.headless);
        assert!(s.proxy.is_none());
    }
}
