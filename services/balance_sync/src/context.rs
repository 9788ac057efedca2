//! Cancellation plus deadline for one unit of sync work
//!
//! Every cycle runs under a [`CancelScope`]: a cancellation token derived
//! from its caller (or the scheduler's shutdown token) and an optional
//! deadline. Suspension points race against [`CancelScope::done`].

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SyncError};

#[derive(Debug, Clone)]
pub struct CancelScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelScope {
    /// Scope that ends only when `token` is cancelled
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Child of `parent` that additionally expires after `timeout`
    pub fn with_timeout(parent: &CancellationToken, timeout: Duration) -> Self {
        Self {
            token: parent.child_token(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Narrow this scope with an extra timeout; the earlier deadline wins
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        Self {
            token: self.token.child_token(),
            deadline: Some(match self.deadline {
                Some(existing) => existing.min(candidate),
                None => candidate,
            }),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this scope and every scope derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    /// Why the scope ended, if it has
    pub fn error(&self) -> Option<SyncError> {
        if self.is_cancelled() {
            Some(SyncError::Cancelled)
        } else if self.is_expired() {
            Some(SyncError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// `Ok` while the scope is live
    pub fn check(&self) -> Result<()> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Resolve once the scope is cancelled or its deadline passes
    pub async fn done(&self) -> SyncError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => SyncError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => SyncError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                SyncError::Cancelled
            }
        }
    }

    /// Run `fut` unless the scope ends first
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            output = fut => Ok(output),
        }
    }
}
