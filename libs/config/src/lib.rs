//! # Balance Sync Configuration
//!
//! Centralized configuration and defaults for the balance synchronization
//! service.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sync_config::SyncConfig;
//!
//! let config = SyncConfig::load(None)?;
//! println!("fetching every {:?} with {} workers", config.fetch_interval(), config.max_workers);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod service;
pub mod service_config;

// Re-export commonly used types
pub use service_config::{load_config, SyncConfig, DEFAULT_CONFIG_PATH, ENV_PREFIX};
