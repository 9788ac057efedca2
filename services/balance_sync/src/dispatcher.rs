//! One fetch cycle: enumerate, dispatch, collect, persist
//!
//! A cycle pairs each tracked wallet with every token of the same user,
//! feeds the pairs to the [`WorkerPool`] through a bounded queue and
//! persists each successful result as it arrives. Individual fetch or
//! persistence failures are counted and logged. Only a failure to read
//! the watchlist aborts the cycle.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use types::{TrackedToken, TrackedWallet, UserId};

use crate::bridge::PersistenceBridge;
use crate::context::CancelScope;
use crate::error::{Result, SyncError};
use crate::store::{StoreError, WatchlistStore};
use crate::worker_pool::{FetchResult, FetchTask, WorkerPool};

/// Which watchlists a cycle covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleTarget {
    AllUsers,
    User(UserId),
}

impl fmt::Display for CycleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleTarget::AllUsers => write!(f, "all users"),
            CycleTarget::User(user_id) => write!(f, "user {}", user_id),
        }
    }
}

/// Counters for one cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    /// Owner-matched pairs found by enumeration
    pub pairs: usize,
    /// Tasks placed on the queue
    pub dispatched: usize,
    /// Balances fetched and persisted
    pub succeeded: usize,
    /// Fetch or persistence failures
    pub failed: usize,
}

impl CycleStats {
    /// Dispatched tasks with no collected result
    pub fn abandoned(&self) -> usize {
        self.dispatched.saturating_sub(self.succeeded + self.failed)
    }
}

/// Build fetch tasks for every wallet-token pair with the same owner
pub fn pair_by_owner(wallets: &[TrackedWallet], tokens: &[TrackedToken]) -> Vec<FetchTask> {
    let mut tokens_by_user: HashMap<UserId, Vec<&TrackedToken>> = HashMap::new();
    for token in tokens {
        tokens_by_user.entry(token.user_id).or_default().push(token);
    }

    let mut tasks = Vec::new();
    for wallet in wallets {
        let Some(owned) = tokens_by_user.get(&wallet.user_id) else {
            continue;
        };
        for token in owned {
            tasks.push(FetchTask {
                user_id: wallet.user_id,
                wallet_id: wallet.id,
                wallet_address: wallet.address,
                token_id: token.id,
                token: token.kind,
            });
        }
    }
    tasks
}

pub struct CycleDispatcher {
    store: Arc<dyn WatchlistStore>,
    bridge: Arc<PersistenceBridge>,
    pool: WorkerPool,
    queue_capacity: usize,
}

impl CycleDispatcher {
    pub fn new(
        store: Arc<dyn WatchlistStore>,
        bridge: Arc<PersistenceBridge>,
        pool: WorkerPool,
        queue_capacity: usize,
    ) -> Self {
        Self {
            store,
            bridge,
            pool,
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn bridge(&self) -> &Arc<PersistenceBridge> {
        &self.bridge
    }

    /// Run one cycle under `scope`
    ///
    /// Returns once the collector has drained the result queue or the scope
    /// has ended, and every worker has exited. Snapshots persisted before
    /// cancellation stay persisted.
    pub async fn run_cycle(&self, scope: &CancelScope, target: CycleTarget) -> Result<CycleStats> {
        let tasks = self.enumerate(scope, target).await?;
        let mut stats = CycleStats {
            pairs: tasks.len(),
            ..CycleStats::default()
        };
        if tasks.is_empty() {
            debug!("No wallet-token pairs for {}", target);
            return Ok(stats);
        }

        info!(
            "Starting balance cycle for {}: {} pairs, {} workers",
            target,
            tasks.len(),
            self.pool.workers()
        );

        let (task_tx, task_rx) = mpsc::channel(self.queue_capacity);
        let (result_tx, result_rx) = mpsc::channel(self.queue_capacity);

        let mut workers = self.pool.spawn(scope, task_rx, result_tx);
        let producer = tokio::spawn(enqueue(scope.clone(), tasks, task_tx));

        let (succeeded, failed) = self.collect(scope, result_rx).await;
        stats.succeeded = succeeded;
        stats.failed = failed;

        stats.dispatched = match producer.await {
            Ok(dispatched) => dispatched,
            Err(e) => {
                error!("Task producer for {} failed: {}", target, e);
                succeeded + failed
            }
        };
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Fetch worker failed: {}", e);
            }
        }

        if scope.is_done() {
            warn!(
                "Balance cycle for {} ended early: {} succeeded, {} failed, {} abandoned",
                target,
                stats.succeeded,
                stats.failed,
                stats.abandoned()
            );
        } else {
            info!(
                "Balance cycle for {} complete: {} succeeded, {} failed",
                target, stats.succeeded, stats.failed
            );
        }
        Ok(stats)
    }

    async fn enumerate(&self, scope: &CancelScope, target: CycleTarget) -> Result<Vec<FetchTask>> {
        let store = &self.store;
        let listing = scope
            .run(async {
                match target {
                    CycleTarget::AllUsers => {
                        let wallets = store.get_all_wallets().await?;
                        let tokens = store.get_all_tokens().await?;
                        Ok::<_, StoreError>((wallets, tokens))
                    }
                    CycleTarget::User(user_id) => {
                        let wallets = store.get_wallets_by_user(user_id).await?;
                        let tokens = store.get_tokens_by_user(user_id).await?;
                        Ok::<_, StoreError>((wallets, tokens))
                    }
                }
            })
            .await?;

        let (wallets, tokens) = listing.map_err(|source| {
            error!("Failed to enumerate watchlist for {}: {}", target, source);
            SyncError::WatchlistUnavailable {
                scope: target.to_string(),
                source,
            }
        })?;
        Ok(pair_by_owner(&wallets, &tokens))
    }

    /// Persist results until every worker is done or the scope ends
    async fn collect(
        &self,
        scope: &CancelScope,
        mut results: mpsc::Receiver<FetchResult>,
    ) -> (usize, usize) {
        let mut succeeded = 0;
        let mut failed = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = scope.done() => break,
                next = results.recv() => next,
            };
            let Some(FetchResult { task, outcome }) = next else {
                break;
            };

            match outcome {
                Ok(balance) => {
                    match self.bridge.persist(task.wallet_id, task.token_id, balance).await {
                        Ok(snapshot) => {
                            succeeded += 1;
                            debug!(
                                "Stored balance {} for wallet {} token {} (user {})",
                                snapshot.balance, task.wallet_id, task.token_id, task.user_id
                            );
                        }
                        Err(e) => {
                            failed += 1;
                            error!(
                                "Failed to persist balance of wallet {} token {}: {}",
                                task.wallet_id, task.token_id, e
                            );
                        }
                    }
                }
                Err(e) if e.is_cancellation() => {
                    failed += 1;
                    debug!(
                        "Fetch of wallet {} token {} abandoned: {}",
                        task.wallet_id, task.token_id, e
                    );
                }
                Err(e) => {
                    failed += 1;
                    warn!(
                        "Failed to fetch balance of wallet {} ({}) token {}: {}",
                        task.wallet_id, task.wallet_address, task.token_id, e
                    );
                }
            }
        }
        (succeeded, failed)
    }
}

/// Feed tasks to the queue until done or the scope ends
async fn enqueue(scope: CancelScope, tasks: Vec<FetchTask>, queue: mpsc::Sender<FetchTask>) -> usize {
    let mut dispatched = 0;
    for task in tasks {
        tokio::select! {
            biased;
            _ = scope.done() => break,
            sent = queue.send(task) => {
                if sent.is_err() {
                    break;
                }
                dispatched += 1;
            }
        }
    }
    dispatched
}
