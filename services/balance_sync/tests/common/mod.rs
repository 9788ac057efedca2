//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use balance_sync::{
    BalanceScheduler, ChainOracle, InMemoryStore, MemoryCache, Result, SyncError,
    WatchlistService,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sync_config::SyncConfig;
use types::{Balance, ChainAddress, TokenKind, TrackedToken, TrackedWallet, UserId};

pub const ALICE_WALLET: &str = "0x742d35cc6634c0532925a3b844bc454e4438f44e";
pub const BOB_WALLET: &str = "0x8ba1f109551bd432803012645ac136ddd64dba72";
pub const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

/// Oracle answering from a fixed table of balances
#[derive(Default)]
pub struct MockOracle {
    native: Mutex<HashMap<ChainAddress, Balance>>,
    tokens: Mutex<HashMap<(ChainAddress, ChainAddress), Balance>>,
    failing: Mutex<HashSet<ChainAddress>>,
    latency: Mutex<Duration>,
    calls: AtomicUsize,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_native(&self, wallet: &str, balance: Balance) {
        self.native.lock().insert(wallet.parse().unwrap(), balance);
    }

    pub fn set_token(&self, token: &str, wallet: &str, balance: Balance) {
        self.tokens
            .lock()
            .insert((token.parse().unwrap(), wallet.parse().unwrap()), balance);
    }

    /// Every query for `wallet` fails with a transient RPC error
    pub fn fail_wallet(&self, wallet: &str) {
        self.failing.lock().insert(wallet.parse().unwrap());
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn simulate(&self, wallet: ChainAddress) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.failing.lock().contains(&wallet) {
            return Err(SyncError::Rpc("503 service unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainOracle for MockOracle {
    async fn native_balance(&self, address: ChainAddress) -> Result<Balance> {
        self.simulate(address).await?;
        Ok(self.native.lock().get(&address).copied().unwrap_or_default())
    }

    async fn token_balance(&self, token: ChainAddress, wallet: ChainAddress) -> Result<Balance> {
        self.simulate(wallet).await?;
        Ok(self
            .tokens
            .lock()
            .get(&(token, wallet))
            .copied()
            .unwrap_or_default())
    }
}

/// Settings that keep paused-clock tests short
pub fn fast_config() -> SyncConfig {
    SyncConfig {
        rpc_endpoint: "http://localhost:8545".to_string(),
        rate_limit_per_sec: 100,
        max_workers: 3,
        worker_delay_ms: 0,
        fetch_interval_secs: 60,
        cycle_timeout_secs: 30,
        user_fetch_timeout_secs: 20,
        ..SyncConfig::default()
    }
}

pub struct Harness {
    pub config: SyncConfig,
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub oracle: Arc<MockOracle>,
    pub scheduler: Arc<BalanceScheduler>,
    pub service: WatchlistService,
}

impl Harness {
    pub fn new(config: SyncConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let oracle = Arc::new(MockOracle::new());
        let scheduler = Arc::new(
            BalanceScheduler::from_config(&config, store.clone(), cache.clone(), oracle.clone())
                .unwrap(),
        );
        let service =
            WatchlistService::new(Arc::clone(&scheduler), config.user_balances_cache_ttl());
        Self {
            config,
            store,
            cache,
            oracle,
            scheduler,
            service,
        }
    }

    pub async fn wallet(&self, user: u64, address: &str) -> TrackedWallet {
        self.service
            .add_wallet(UserId::new(user), address, None)
            .await
            .unwrap()
    }

    pub async fn native_token(&self, user: u64, symbol: &str) -> TrackedToken {
        self.service
            .add_token(UserId::new(user), None, symbol, symbol)
            .await
            .unwrap()
    }

    pub async fn contract_token(&self, user: u64, address: &str, symbol: &str) -> TrackedToken {
        let token = self
            .service
            .add_token(UserId::new(user), Some(address), symbol, symbol)
            .await
            .unwrap();
        assert!(matches!(token.kind, TokenKind::Contract(_)));
        token
    }
}

/// `amount * 10^exponent` in base units
pub fn units(amount: u64, exponent: usize) -> Balance {
    Balance::from_uint(ethabi::Uint::from(amount) * ethabi::Uint::exp10(exponent))
}
