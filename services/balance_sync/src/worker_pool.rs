//! Fixed-size pool of fetch workers
//!
//! Workers share one bounded task queue and report every task they take
//! off it on the result queue, exactly once, tagged with the task.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, trace};
use types::{Balance, ChainAddress, TokenId, TokenKind, UserId, WalletId};

use crate::chain_client::ChainClient;
use crate::context::CancelScope;
use crate::error::Result;

/// One wallet-token pair to query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub user_id: UserId,
    pub wallet_id: WalletId,
    pub wallet_address: ChainAddress,
    pub token_id: TokenId,
    pub token: TokenKind,
}

/// Outcome of one [`FetchTask`]
#[derive(Debug)]
pub struct FetchResult {
    pub task: FetchTask,
    pub outcome: Result<Balance>,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Clone)]
pub struct WorkerPool {
    client: Arc<ChainClient>,
    workers: usize,
    worker_delay: Duration,
}

impl WorkerPool {
    pub fn new(client: Arc<ChainClient>, workers: usize, worker_delay: Duration) -> Self {
        Self {
            client,
            workers: workers.max(1),
            worker_delay,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Start the workers; each returns how many tasks it processed
    ///
    /// Workers exit when the task queue is closed and drained, when the
    /// result queue is closed, or when `scope` ends. The pool holds no
    /// sender of its own, so `results` closes once every worker is gone.
    pub fn spawn(
        &self,
        scope: &CancelScope,
        tasks: mpsc::Receiver<FetchTask>,
        results: mpsc::Sender<FetchResult>,
    ) -> JoinSet<usize> {
        let tasks = Arc::new(Mutex::new(tasks));
        let mut set = JoinSet::new();
        for worker_id in 0..self.workers {
            set.spawn(run_worker(
                worker_id,
                Arc::clone(&self.client),
                self.worker_delay,
                scope.clone(),
                Arc::clone(&tasks),
                results.clone(),
            ));
        }
        set
    }
}

async fn run_worker(
    worker_id: usize,
    client: Arc<ChainClient>,
    delay: Duration,
    scope: CancelScope,
    tasks: Arc<Mutex<mpsc::Receiver<FetchTask>>>,
    results: mpsc::Sender<FetchResult>,
) -> usize {
    let mut processed = 0;
    loop {
        let next = {
            let mut queue = tasks.lock().await;
            tokio::select! {
                biased;
                _ = scope.done() => None,
                task = queue.recv() => task,
            }
        };
        let Some(task) = next else { break };

        trace!(
            "worker {} fetching wallet {} token {}",
            worker_id,
            task.wallet_id,
            task.token_id
        );
        let outcome = client
            .balance_of(&scope, &task.token, task.wallet_address)
            .await;
        processed += 1;

        if results.send(FetchResult { task, outcome }).await.is_err() {
            break;
        }

        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = scope.done() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
    debug!("worker {} exiting after {} tasks", worker_id, processed);
    processed
}
