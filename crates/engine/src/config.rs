//! Engine configuration via `gridtxn.toml`
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration. Values are checked by [`EngineConfig::validate`]
//! when the manager is built.

use gridtxn_core::{Error, ResourceId, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "gridtxn.toml";

/// Which transaction store backs the manager
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Process-local map
    #[default]
    Memory,
    /// Multi-process store (not implemented)
    Shared,
}

/// Engine configuration loaded from `gridtxn.toml`.
///
/// # Example
///
/// ```toml
/// max_requests_per_call = 100
/// max_open_transactions = 100
/// default_ttl_ms = 300000
/// snapshot_resources = ["1AbCdEf"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Requests per remote batch call before the compiler splits
    pub max_requests_per_call: usize,
    /// Open (non-terminal) transactions allowed at once
    pub max_open_transactions: usize,
    /// Transaction lifetime when `begin` does not set one
    pub default_ttl_ms: u64,
    /// Interval between expiry sweeps
    pub sweep_interval_ms: u64,
    /// How long terminal transactions stay visible to `status`
    pub retention_ms: u64,
    /// Aggregate estimated cells above which a plan is high-risk
    pub high_risk_cell_threshold: u64,
    /// `autoRollback` when `begin` does not set it
    pub auto_rollback_default: bool,
    /// Resources whose policy always snapshots at begin
    pub snapshot_resources: Vec<ResourceId>,
    /// Transaction store backend
    pub store: StoreKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_requests_per_call: 100,
            max_open_transactions: 100,
            default_ttl_ms: 300_000,
            sweep_interval_ms: 60_000,
            retention_ms: 600_000,
            high_risk_cell_threshold: 10_000,
            auto_rollback_default: true,
            snapshot_resources: Vec::new(),
            store: StoreKind::Memory,
        }
    }
}

impl EngineConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# gridtxn engine configuration

# Requests per remote batch call; larger commits are split into
# ceil(n / max_requests_per_call) calls, order preserved.
max_requests_per_call = 100

# Concurrent open transactions; further begin calls fail.
max_open_transactions = 100

# Transaction lifetime in milliseconds (default 5 minutes).
default_ttl_ms = 300000

# Expiry sweep interval in milliseconds.
sweep_interval_ms = 60000

# How long finished transactions remain queryable, in milliseconds.
retention_ms = 600000

# Plans estimated to touch more cells than this require a snapshot.
high_risk_cell_threshold = 10000

# Restore the snapshot when a commit call fails.
auto_rollback_default = true

# Resource ids that always snapshot at begin.
snapshot_resources = []

# Transaction store: "memory" (default) or "shared" (not implemented).
store = "memory"
"#
    }

    /// Parse config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| Error::invalid_input(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::internal(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::InvalidInput { reason } => Error::invalid_input(format!(
                "{} (in '{}')",
                reason,
                path.display()
            )),
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::internal(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Reject zero limits and intervals
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("max_requests_per_call", self.max_requests_per_call as u64),
            ("max_open_transactions", self.max_open_transactions as u64),
            ("default_ttl_ms", self.default_ttl_ms),
            ("sweep_interval_ms", self.sweep_interval_ms),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(Error::invalid_input(format!("{} must be greater than zero", name)));
            }
        }
        Ok(())
    }

    /// Whether `resource_id` always snapshots at begin
    pub fn requires_snapshot(&self, resource_id: &ResourceId) -> bool {
        self.snapshot_resources.iter().any(|r| r == resource_id)
    }

    /// Default transaction lifetime
    pub fn default_ttl(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.default_ttl_ms).unwrap_or(i64::MAX))
    }

    /// Sweep interval
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Retention of terminal transactions
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.retention_ms).unwrap_or(i64::MAX))
    }
}
