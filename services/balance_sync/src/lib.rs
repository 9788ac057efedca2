//! Balance Sync Engine
//!
//! Keeps a time series of on-chain balances for every wallet-token pair
//! users have put on their watchlists.
//!
//! Features:
//! - Periodic global fetch cycles plus on-demand per-user refresh
//! - Shared token bucket limiting outbound chain queries
//! - Retry with exponential backoff for transient RPC failures
//! - Bounded worker pool with cancellation and per-cycle deadlines
//! - Append-only snapshots with retention cleanup
//! - Best-effort cache of latest balances and per-user views

pub mod bridge;
pub mod cache;
pub mod chain_client;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod rate_limit;
pub mod scheduler;
pub mod store;
pub mod sweeper;
pub mod watchlist;
pub mod web3_oracle;
pub mod worker_pool;

pub use bridge::{CachedBalance, PersistenceBridge};
pub use cache::{CacheError, CacheExt, CacheProvider, MemoryCache};
pub use chain_client::{validate_address, ChainClient, ChainOracle, RetryPolicy};
pub use context::CancelScope;
pub use dispatcher::{CycleDispatcher, CycleStats, CycleTarget};
pub use error::{Result, SyncError};
pub use rate_limit::RateLimiter;
pub use scheduler::{BalanceScheduler, ScheduleSettings, SyncTotals};
pub use store::{InMemoryStore, StoreError, WatchlistStore};
pub use sweeper::RetentionSweeper;
pub use watchlist::WatchlistService;
pub use web3_oracle::Web3Oracle;
pub use worker_pool::{FetchResult, FetchTask, WorkerPool};
