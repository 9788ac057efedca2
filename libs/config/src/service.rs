//! Service defaults
//!
//! Default configuration values shared by the sync engine, its tests and the
//! service binary.

/// Chain client defaults
pub mod chain {
    /// Default JSON-RPC endpoint (expanded from the environment)
    pub const DEFAULT_RPC_ENDPOINT: &str = "${WEB3_RPC_ENDPOINT:-http://localhost:8545}";

    /// Ethereum mainnet
    pub const DEFAULT_CHAIN_ID: u64 = 1;

    /// Outbound chain queries per second
    pub const DEFAULT_RATE_LIMIT_PER_SEC: u32 = 10;

    /// Attempts per balance query, including the first
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// First backoff delay; doubles on each retry
    pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;

    /// Upper bound for a single RPC attempt
    pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 10_000;
}

/// Worker pool and cycle defaults
pub mod cycle {
    /// Concurrent fetch workers
    pub const DEFAULT_MAX_WORKERS: usize = 5;

    /// Bounded task and result queue size
    pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

    /// Pause after each worker call
    pub const DEFAULT_WORKER_DELAY_MS: u64 = 100;

    /// Global cycle period (5 minutes)
    pub const DEFAULT_FETCH_INTERVAL_SECS: u64 = 300;

    /// Deadline for one global cycle (10 minutes)
    pub const DEFAULT_CYCLE_TIMEOUT_SECS: u64 = 600;

    /// Deadline for an on-demand user refresh (2 minutes)
    pub const DEFAULT_USER_FETCH_TIMEOUT_SECS: u64 = 120;
}

/// Retention defaults
pub mod retention {
    /// Snapshots older than this are purged
    pub const DEFAULT_RETENTION_DAYS: u64 = 30;

    /// Sweeper period (daily)
    pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 86_400;
}

/// Cache defaults
pub mod cache {
    /// Per-pair balance entries
    pub const DEFAULT_BALANCE_TTL_SECS: u64 = 600;

    /// Aggregate per-user balance lists
    pub const DEFAULT_USER_BALANCES_TTL_SECS: u64 = 300;
}
