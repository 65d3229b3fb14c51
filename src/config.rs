//! Server-side configuration consumed by admission.
//!
//! Loads [`ServerConfig`] from a TOML file. Environment variables override
//! file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Env var overriding [`LookupConfig::timeout_secs`].
pub const ENV_LOOKUP_TIMEOUT_SECS: &str = "SECRETS_ADMISSION_LOOKUP_TIMEOUT_SECS";
/// Env var overriding [`LookupConfig::address`].
pub const ENV_LOOKUP_ADDR: &str = "SECRETS_ADMISSION_LOOKUP_ADDR";

// ── Top-level config ────────────────────────────────────────────

/// Process-wide configuration, read-only to admission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Credential lookup settings.
    pub lookup: LookupConfig,
    /// Secrets clusters keyed by cluster name.
    pub clusters: HashMap<String, ClusterConfig>,
    /// Per-scheduler-namespace cluster rules keyed by namespace name.
    pub namespaces: HashMap<String, NamespaceRule>,
    /// Log output.
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("invalid config at {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config at {}: {e}",
                path.display()
            )),
        }
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or has wrongly typed fields.
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }

    /// Apply environment overrides using the given resolver.
    ///
    /// Takes a resolver function so tests need not touch the process env.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env(ENV_LOOKUP_TIMEOUT_SECS) {
            match v.parse() {
                Ok(n) => self.lookup.timeout_secs = n,
                Err(_) => tracing::warn!(
                    var = ENV_LOOKUP_TIMEOUT_SECS,
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env(ENV_LOOKUP_ADDR) {
            self.lookup.address = v;
        }
    }

    /// Settings for the named cluster. An absent entry counts as disabled.
    pub fn cluster(&self, id: &str) -> Option<&ClusterConfig> {
        self.clusters.get(id)
    }

    /// Cluster rules for a scheduler namespace, if any are configured.
    pub fn namespace_rule(&self, namespace: &str) -> Option<&NamespaceRule> {
        self.namespaces.get(namespace)
    }
}

// ── Cluster config ──────────────────────────────────────────────

/// Per-cluster settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Whether workloads may reference this cluster at all.
    pub enabled: bool,
    /// Whether references may be admitted without a credential.
    pub allow_unauthenticated: bool,
    /// Namespace used by blocks that do not name one.
    pub namespace: Option<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_unauthenticated: true,
            namespace: None,
        }
    }
}

impl ClusterConfig {
    /// True when a reference to this cluster requires a credential.
    pub fn requires_auth(&self) -> bool {
        !self.allow_unauthenticated
    }
}

// ── Lookup config ───────────────────────────────────────────────

/// Credential lookup settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Base address of the secrets backend API.
    pub address: String,
    /// Upper bound on a single lookup, in seconds.
    pub timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:8200".to_owned(),
            timeout_secs: 10,
        }
    }
}

impl LookupConfig {
    /// Lookup timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Logging config ──────────────────────────────────────────────

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"secrets_admission=debug"`.
    pub level: String,
    /// Directory for daily-rotated JSON log files. Unset means stderr only.
    pub dir: Option<PathBuf>,
    /// Write stderr output as JSON instead of text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            dir: None,
            json: false,
        }
    }
}

// ── Namespace rules ─────────────────────────────────────────────

/// Which secrets clusters workloads in a scheduler namespace may use.
///
/// Patterns accept `*` wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NamespaceRule {
    /// When non-empty, only matching clusters are permitted.
    pub allowed: Vec<String>,
    /// Matching clusters are always rejected.
    pub denied: Vec<String>,
}
