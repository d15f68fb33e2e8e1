//! Browser identity — the pool's partition key.
//!
//! An identity names one isolated privacy context: a flavor, a user-data
//! (context) directory, and optional proxy/fingerprint overrides. Two
//! identities are equal iff flavor and context directory match; equality is
//! what enforces **at most one live browser per identity** in the pool.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::core::types::{Fingerprint, ProxyEntry};

/// Which kind of isolated browser instance is wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserFlavor {
    /// The user's own interactive browser profile. Never headless.
    SystemDefault,
    /// The shared default pooled context.
    Default,
    /// A disposable scratch context for experiments.
    Prototype,
    /// The next context in a bounded round-robin sequence.
    NextSequential,
    /// A throwaway context under the OS temp dir.
    TempRandom,
    /// A randomly named context under the contexts base dir.
    Random,
}

impl fmt::Display for BrowserFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SystemDefault => "system-default",
            Self::Default => "default",
            Self::Prototype => "prototype",
            Self::NextSequential => "next-sequential",
            Self::TempRandom => "temp-random",
            Self::Random => "random",
        };
        f.write_str(s)
    }
}

/// Immutable identity of one isolated browser instance.
///
/// Proxy and fingerprint ride along for launch-option composition but do
/// **not** participate in equality or hashing — the pool partitions on
/// `(flavor, context_dir)` alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserIdentity {
    flavor: BrowserFlavor,
    context_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    proxy: Option<ProxyEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fingerprint: Option<Fingerprint>,
}

impl BrowserIdentity {
    pub fn new(flavor: BrowserFlavor, context_dir: impl Into<PathBuf>) -> Self {
        Self {
            flavor,
            context_dir: context_dir.into(),
            proxy: None,
            fingerprint: None,
        }
    }

    /// The system's own interactive browser profile, resolved by the
    /// launcher. The context dir is a symbolic marker, not a real path.
    pub fn system_default() -> Self {
        Self::new(BrowserFlavor::SystemDefault, "system-default")
    }

    /// The shared default pooled context under `base`.
    pub fn default_pooled(base: &Path) -> Self {
        Self::new(BrowserFlavor::Default, base.join("default"))
    }

    /// A disposable scratch context under `base`.
    pub fn prototype(base: &Path) -> Self {
        Self::new(BrowserFlavor::Prototype, base.join("prototype"))
    }

    /// Context `n` of the bounded round-robin sequence under `base`.
    pub fn sequential(base: &Path, n: u64) -> Self {
        Self::new(BrowserFlavor::NextSequential, base.join(format!("ctx_{n}")))
    }

    /// A throwaway context with a random directory under the OS temp dir.
    pub fn temp_random() -> Self {
        let dir = std::env::temp_dir()
            .join("renderpool")
            .join(uuid::Uuid::new_v4().simple().to_string());
        Self::new(BrowserFlavor::TempRandom, dir)
    }

    /// A randomly named context under the contexts base dir.
    pub fn random(base: &Path) -> Self {
        Self::new(
            BrowserFlavor::Random,
            base.join(uuid::Uuid::new_v4().simple().to_string()),
        )
    }

    pub fn with_proxy(mut self, proxy: ProxyEntry) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    pub fn flavor(&self) -> BrowserFlavor {
        self.flavor
    }

    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }

    pub fn proxy(&self) -> Option<&ProxyEntry> {
        self.proxy.as_ref()
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }
}

impl PartialEq for BrowserIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.flavor == other.flavor && self.context_dir == other.context_dir
    }
}

impl Eq for BrowserIdentity {}

impl Hash for BrowserIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.flavor.hash(state);
        self.context_dir.hash(state);
    }
}

impl fmt::Display for BrowserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.flavor, self.context_dir.display())
    }
}
