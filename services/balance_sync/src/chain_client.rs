//! Rate-limited, retrying balance queries against a chain oracle
//!
//! [`ChainClient`] validates addresses locally, spends one rate limiter
//! token per query and then makes up to `max_attempts` calls to the
//! [`ChainOracle`], backing off exponentially between failures. Any oracle
//! failure is retried; malformed addresses and cancellation are not.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use sync_config::SyncConfig;
use tracing::{debug, warn};
use types::{Balance, ChainAddress, TokenKind};

use crate::context::CancelScope;
use crate::error::{Result, SyncError};
use crate::rate_limit::RateLimiter;

/// Source of on-chain balances
///
/// Implementations make exactly one network round trip per call and report
/// transient failures as [`SyncError::Rpc`].
#[async_trait]
pub trait ChainOracle: Send + Sync {
    /// Native currency balance of `address` in the chain's smallest unit
    async fn native_balance(&self, address: ChainAddress) -> Result<Balance>;

    /// `balanceOf(wallet)` on the token contract at `token`
    async fn token_balance(&self, token: ChainAddress, wallet: ChainAddress) -> Result<Balance>;
}

/// Retry schedule for balance queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first; at least one
    pub max_attempts: u32,
    /// Delay after the first failure, doubled for each later one
    pub backoff_base: Duration,
    /// Upper bound on one oracle call
    pub rpc_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            rpc_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: config.backoff_base(),
            rpc_timeout: config.rpc_timeout(),
        }
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << exponent)
    }
}

/// Check that `address` is `0x` followed by 40 hex digits
pub fn validate_address(address: &str) -> bool {
    types::is_valid_address(address)
}

pub struct ChainClient {
    oracle: Arc<dyn ChainOracle>,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl ChainClient {
    pub fn new(oracle: Arc<dyn ChainOracle>, limiter: RateLimiter, retry: RetryPolicy) -> Self {
        Self {
            oracle,
            limiter,
            retry,
        }
    }

    pub fn from_config(oracle: Arc<dyn ChainOracle>, config: &SyncConfig) -> Result<Self> {
        Ok(Self::new(
            oracle,
            RateLimiter::new(config.rate_limit_per_sec)?,
            RetryPolicy::from_config(config),
        ))
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Native balance of a textual address
    ///
    /// Malformed addresses fail with [`SyncError::InvalidAddress`] before
    /// any token is spent or call made.
    pub async fn get_native_balance(&self, scope: &CancelScope, address: &str) -> Result<Balance> {
        let address: ChainAddress = address.parse()?;
        self.native_balance(scope, address).await
    }

    /// Token balance of a textual wallet address at a textual contract address
    pub async fn get_token_balance(
        &self,
        scope: &CancelScope,
        token: &str,
        wallet: &str,
    ) -> Result<Balance> {
        let token: ChainAddress = token.parse()?;
        let wallet: ChainAddress = wallet.parse()?;
        self.token_balance(scope, token, wallet).await
    }

    pub async fn native_balance(&self, scope: &CancelScope, address: ChainAddress) -> Result<Balance> {
        let oracle = &*self.oracle;
        self.with_retry(scope, "native_balance", move || oracle.native_balance(address))
            .await
    }

    pub async fn token_balance(
        &self,
        scope: &CancelScope,
        token: ChainAddress,
        wallet: ChainAddress,
    ) -> Result<Balance> {
        let oracle = &*self.oracle;
        self.with_retry(scope, "token_balance", move || oracle.token_balance(token, wallet))
            .await
    }

    /// Balance of `wallet` for either kind of tracked asset
    pub async fn balance_of(
        &self,
        scope: &CancelScope,
        kind: &TokenKind,
        wallet: ChainAddress,
    ) -> Result<Balance> {
        match kind {
            TokenKind::Native => self.native_balance(scope, wallet).await,
            TokenKind::Contract(token) => self.token_balance(scope, *token, wallet).await,
        }
    }

    async fn with_retry<F, Fut>(&self, scope: &CancelScope, operation: &str, call: F) -> Result<Balance>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Balance>>,
    {
        self.limiter.acquire(scope).await?;

        let timeout_ms = u64::try_from(self.retry.rpc_timeout.as_millis()).unwrap_or(u64::MAX);
        let mut last_error = SyncError::Internal(format!("{} made no attempts", operation));

        for attempt in 1..=self.retry.max_attempts {
            let outcome = tokio::select! {
                biased;
                err = scope.done() => return Err(err),
                outcome = tokio::time::timeout(self.retry.rpc_timeout, call()) => {
                    outcome.unwrap_or(Err(SyncError::RpcTimeout { timeout_ms }))
                }
            };

            let err = match outcome {
                Ok(balance) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", operation, attempt);
                    }
                    return Ok(balance);
                }
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            warn!(
                "{} attempt {}/{} failed: {}",
                operation, attempt, self.retry.max_attempts, err
            );
            last_error = err;

            if attempt < self.retry.max_attempts {
                let delay = self.retry.backoff(attempt);
                tokio::select! {
                    biased;
                    err = scope.done() => return Err(err),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        Err(SyncError::RetriesExhausted {
            attempts: self.retry.max_attempts,
            last: Box::new(last_error),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("0x742d35Cc6634C0532925a3b844Bc454e4438f44e"));
        assert!(!validate_address("742d35Cc6634C0532925a3b844Bc454e4438f44e"));
        assert!(!validate_address("0x742d35Cc6634C0532925a3b844Bc454e4438f44"));
        assert!(!validate_address("0xZZ2d35Cc6634C0532925a3b844Bc454e4438f44e"));
        assert!(!validate_address(""));
    }

    #[test]
    fn test_policy_from_config() {
        let config = SyncConfig {
            max_attempts: 5,
            backoff_base_ms: 250,
            rpc_timeout_ms: 1_500,
            ..SyncConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff(3), Duration::from_secs(1));
        assert_eq!(policy.rpc_timeout, Duration::from_millis(1_500));
    }
}
