//! Periodic and on-demand balance cycles
//!
//! [`BalanceScheduler`] owns the background tasks: the cycle driver, which
//! runs a global cycle immediately and then every `fetch_interval`, and the
//! retention sweeper. `stop` cancels both and waits for them, so no
//! snapshot is written after it returns.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use sync_config::SyncConfig;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use types::UserId;

use crate::bridge::PersistenceBridge;
use crate::cache::CacheProvider;
use crate::chain_client::{ChainClient, ChainOracle};
use crate::context::CancelScope;
use crate::dispatcher::{CycleDispatcher, CycleStats, CycleTarget};
use crate::error::{Result, SyncError};
use crate::store::WatchlistStore;
use crate::sweeper::RetentionSweeper;
use crate::worker_pool::WorkerPool;

/// Running totals across all completed cycles
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncTotals {
    pub cycles: u64,
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct CycleLedger {
    last: Option<CycleStats>,
    totals: SyncTotals,
}

impl CycleLedger {
    fn record_global(&mut self, stats: CycleStats) {
        self.last = Some(stats);
        self.record(stats);
    }

    fn record(&mut self, stats: CycleStats) {
        self.totals.cycles += 1;
        self.totals.succeeded += stats.succeeded as u64;
        self.totals.failed += stats.failed as u64;
    }
}

/// Timing of scheduled work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub fetch_interval: Duration,
    pub cycle_timeout: Duration,
    pub user_fetch_timeout: Duration,
}

impl ScheduleSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            fetch_interval: config.fetch_interval(),
            cycle_timeout: config.cycle_timeout(),
            user_fetch_timeout: config.user_fetch_timeout(),
        }
    }

    /// Reject zero periods and deadlines
    pub fn validate(&self) -> Result<()> {
        if self.fetch_interval.is_zero() {
            return Err(SyncError::Configuration(
                "fetch interval must be non-zero".to_string(),
            ));
        }
        if self.cycle_timeout.is_zero() || self.user_fetch_timeout.is_zero() {
            return Err(SyncError::Configuration(
                "cycle deadlines must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

struct Running {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

pub struct BalanceScheduler {
    dispatcher: Arc<CycleDispatcher>,
    sweeper: Arc<RetentionSweeper>,
    settings: ScheduleSettings,
    ledger: Arc<RwLock<CycleLedger>>,
    running: Mutex<Option<Running>>,
}

impl BalanceScheduler {
    pub fn new(
        dispatcher: Arc<CycleDispatcher>,
        sweeper: Arc<RetentionSweeper>,
        settings: ScheduleSettings,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            dispatcher,
            sweeper,
            settings,
            ledger: Arc::new(RwLock::new(CycleLedger::default())),
            running: Mutex::new(None),
        })
    }

    /// Wire the whole engine from configuration
    pub fn from_config(
        config: &SyncConfig,
        store: Arc<dyn WatchlistStore>,
        cache: Arc<dyn CacheProvider>,
        oracle: Arc<dyn ChainOracle>,
    ) -> Result<Self> {
        let client = Arc::new(ChainClient::from_config(oracle, config)?);
        let pool = WorkerPool::new(client, config.max_workers, config.worker_delay());
        let bridge = Arc::new(PersistenceBridge::new(
            Arc::clone(&store),
            cache,
            config.balance_cache_ttl(),
        ));
        let dispatcher = Arc::new(CycleDispatcher::new(
            Arc::clone(&store),
            bridge,
            pool,
            config.queue_capacity,
        ));
        let sweeper = Arc::new(RetentionSweeper::new(
            store,
            config.retention(),
            config.cleanup_interval(),
        )?);
        Self::new(dispatcher, sweeper, ScheduleSettings::from_config(config))
    }

    pub fn bridge(&self) -> &Arc<PersistenceBridge> {
        self.dispatcher.bridge()
    }

    /// Start the cycle driver and the retention sweeper
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(SyncError::AlreadyRunning);
        }

        let shutdown = CancellationToken::new();
        let driver = tokio::spawn(drive_cycles(
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.ledger),
            self.settings,
            shutdown.clone(),
        ));
        let sweeper = Arc::clone(&self.sweeper).spawn(shutdown.clone());

        info!(
            "Balance scheduler started: every {:?}, cycle deadline {:?}",
            self.settings.fetch_interval, self.settings.cycle_timeout
        );
        *running = Some(Running {
            shutdown,
            handles: vec![driver, sweeper],
        });
        Ok(())
    }

    /// Cancel background work and wait for it to finish; no-op when stopped
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        running.shutdown.cancel();
        for handle in running.handles {
            if let Err(e) = handle.await {
                error!("Scheduler task failed: {}", e);
            }
        }
        info!("Balance scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Run one global cycle now, outside the periodic schedule
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<CycleStats> {
        let scope = CancelScope::with_timeout(cancel, self.settings.cycle_timeout);
        let stats = run_global_cycle(&self.dispatcher, &scope).await?;
        self.ledger.write().record_global(stats);
        Ok(stats)
    }

    /// Refresh one user's balances and invalidate their cached views
    ///
    /// The cycle runs under a child of `cancel` bounded by the user fetch
    /// timeout. Snapshots persisted before a cancellation or deadline are
    /// kept, and the user's cache entries are invalidated in every case.
    /// Returns [`SyncError::Cancelled`] when `cancel` fired, and
    /// [`SyncError::DeadlineExceeded`] when the deadline passed before any
    /// balance was stored.
    pub async fn fetch_for_user(
        &self,
        cancel: &CancellationToken,
        user_id: UserId,
    ) -> Result<CycleStats> {
        let scope = CancelScope::with_timeout(cancel, self.settings.user_fetch_timeout);
        let outcome = self
            .dispatcher
            .run_cycle(&scope, CycleTarget::User(user_id))
            .await;
        self.dispatcher.bridge().invalidate_user(user_id).await;

        let stats = outcome?;
        self.ledger.write().record(stats);

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        if scope.is_expired() && stats.succeeded == 0 && stats.pairs > 0 {
            return Err(SyncError::DeadlineExceeded);
        }
        Ok(stats)
    }

    /// Stats of the most recent global cycle
    pub fn last_cycle(&self) -> Option<CycleStats> {
        self.ledger.read().last
    }

    /// Totals over global and per-user cycles
    pub fn totals(&self) -> SyncTotals {
        self.ledger.read().totals
    }
}

async fn run_global_cycle(dispatcher: &CycleDispatcher, scope: &CancelScope) -> Result<CycleStats> {
    let stats = dispatcher.run_cycle(scope, CycleTarget::AllUsers).await?;
    if stats.succeeded > 0 {
        dispatcher.bridge().invalidate_all_user_balances().await;
    }
    Ok(stats)
}

async fn drive_cycles(
    dispatcher: Arc<CycleDispatcher>,
    ledger: Arc<RwLock<CycleLedger>>,
    settings: ScheduleSettings,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(settings.fetch_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let scope = CancelScope::with_timeout(&shutdown, settings.cycle_timeout);
        match run_global_cycle(&dispatcher, &scope).await {
            Ok(stats) => ledger.write().record_global(stats),
            Err(e) if e.is_cancellation() => warn!("Balance cycle interrupted: {}", e),
            Err(e) => error!("Balance cycle failed: {}", e),
        }
    }
    info!("Balance cycle driver stopped");
}
