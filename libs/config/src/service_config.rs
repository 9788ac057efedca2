//! Service Configuration Module
//!
//! Loads [`SyncConfig`] from an optional TOML file with environment
//! overrides (`BALANCE_SYNC_` prefix, e.g. `BALANCE_SYNC_MAX_WORKERS=8`).

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::service::{cache, chain, cycle, retention};

/// Default location of the service configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/balance_sync.toml";

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "BALANCE_SYNC";

/// Balance synchronization settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// JSON-RPC endpoint of the chain oracle
    pub rpc_endpoint: String,

    /// Chain ID (1 for Ethereum mainnet)
    pub chain_id: u64,

    /// Rate limit (requests per second)
    pub rate_limit_per_sec: u32,

    /// Concurrent fetch workers
    pub max_workers: usize,

    /// Task and result queue capacity
    pub queue_capacity: usize,

    /// Global cycle period in seconds
    pub fetch_interval_secs: u64,

    /// Deadline of one global cycle in seconds
    pub cycle_timeout_secs: u64,

    /// Deadline of an on-demand user refresh in seconds
    pub user_fetch_timeout_secs: u64,

    /// Pause after each worker call in milliseconds
    pub worker_delay_ms: u64,

    /// Attempts per balance query, including the first
    pub max_attempts: u32,

    /// First retry backoff in milliseconds
    pub backoff_base_ms: u64,

    /// RPC timeout in milliseconds
    pub rpc_timeout_ms: u64,

    /// Snapshot retention window in days
    pub retention_days: u64,

    /// Sweeper period in seconds
    pub cleanup_interval_secs: u64,

    /// TTL of per-pair balance cache entries in seconds
    pub balance_cache_ttl_secs: u64,

    /// TTL of per-user aggregate balance entries in seconds
    pub user_balances_cache_ttl_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: chain::DEFAULT_RPC_ENDPOINT.to_string(),
            chain_id: chain::DEFAULT_CHAIN_ID,
            rate_limit_per_sec: chain::DEFAULT_RATE_LIMIT_PER_SEC,
            max_workers: cycle::DEFAULT_MAX_WORKERS,
            queue_capacity: cycle::DEFAULT_QUEUE_CAPACITY,
            fetch_interval_secs: cycle::DEFAULT_FETCH_INTERVAL_SECS,
            cycle_timeout_secs: cycle::DEFAULT_CYCLE_TIMEOUT_SECS,
            user_fetch_timeout_secs: cycle::DEFAULT_USER_FETCH_TIMEOUT_SECS,
            worker_delay_ms: cycle::DEFAULT_WORKER_DELAY_MS,
            max_attempts: chain::DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: chain::DEFAULT_BACKOFF_BASE_MS,
            rpc_timeout_ms: chain::DEFAULT_RPC_TIMEOUT_MS,
            retention_days: retention::DEFAULT_RETENTION_DAYS,
            cleanup_interval_secs: retention::DEFAULT_CLEANUP_INTERVAL_SECS,
            balance_cache_ttl_secs: cache::DEFAULT_BALANCE_TTL_SECS,
            user_balances_cache_ttl_secs: cache::DEFAULT_USER_BALANCES_TTL_SECS,
        }
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file with environment overrides
    ///
    /// A missing file is not an error; defaults and environment variables
    /// still apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH));

        if base.exists() {
            info!("Loading configuration from {:?}", base);
        } else {
            debug!("No configuration file at {:?}, using defaults", base);
        }

        let config = Config::builder()
            .add_source(File::from(base).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut config: SyncConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.expand_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text without consulting the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: SyncConfig =
            toml::from_str(content).context("Failed to parse configuration")?;
        config.expand_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Expand environment variables in the RPC endpoint
    pub fn expand_env_vars(&mut self) -> Result<()> {
        let expanded =
            shellexpand::env(&self.rpc_endpoint).context("Failed to expand RPC endpoint")?;
        self.rpc_endpoint = expanded.to_string();
        Ok(())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.rpc_endpoint.trim().is_empty() {
            bail!("rpc_endpoint must not be empty");
        }
        if self.rate_limit_per_sec == 0 {
            bail!("rate_limit_per_sec must be at least 1");
        }
        if self.max_workers == 0 {
            bail!("max_workers must be at least 1");
        }
        if self.queue_capacity == 0 {
            bail!("queue_capacity must be at least 1");
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.fetch_interval_secs == 0 || self.cleanup_interval_secs == 0 {
            bail!("fetch and cleanup intervals must be non-zero");
        }
        if self.cycle_timeout_secs == 0 || self.user_fetch_timeout_secs == 0 {
            bail!("cycle deadlines must be non-zero");
        }
        if self.retention_days == 0 {
            bail!("retention_days must be at least 1");
        }
        Ok(())
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    pub fn user_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.user_fetch_timeout_secs)
    }

    pub fn worker_delay(&self) -> Duration {
        Duration::from_millis(self.worker_delay_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 60 * 60)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn balance_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.balance_cache_ttl_secs)
    }

    pub fn user_balances_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.user_balances_cache_ttl_secs)
    }
}

/// Convenience function to load configuration from the default location
pub fn load_config() -> Result<SyncConfig> {
    SyncConfig::load(None)
}
