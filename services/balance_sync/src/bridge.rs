//! Persistence of fetched balances and cache invalidation
//!
//! The store write decides success. Cache writes and deletes that follow
//! are best effort and only logged when they fail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use types::{Balance, BalanceSnapshot, NewSnapshot, TokenId, UserId, WalletId};

use crate::cache::{keys, CacheExt, CacheProvider};
use crate::error::Result;
use crate::store::WatchlistStore;

/// Payload stored under `balance:{wallet}:{token}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedBalance {
    pub balance: Balance,
    pub fetched_at: DateTime<Utc>,
}

pub struct PersistenceBridge {
    store: Arc<dyn WatchlistStore>,
    cache: Arc<dyn CacheProvider>,
    balance_ttl: Duration,
}

impl PersistenceBridge {
    pub fn new(
        store: Arc<dyn WatchlistStore>,
        cache: Arc<dyn CacheProvider>,
        balance_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            balance_ttl,
        }
    }

    pub fn store(&self) -> &Arc<dyn WatchlistStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<dyn CacheProvider> {
        &self.cache
    }

    /// Record a fetched balance as a new snapshot and refresh its cache entry
    pub async fn persist(
        &self,
        wallet_id: WalletId,
        token_id: TokenId,
        balance: Balance,
    ) -> Result<BalanceSnapshot> {
        let snapshot = self
            .store
            .create_balance_snapshot(NewSnapshot::now(wallet_id, token_id, balance))
            .await?;

        let cached = CachedBalance {
            balance: snapshot.balance,
            fetched_at: snapshot.fetched_at,
        };
        let key = keys::balance(wallet_id, token_id);
        if let Err(e) = self.cache.set_json(&key, &cached, self.balance_ttl).await {
            warn!("Failed to cache balance {}: {}", key, e);
        }
        Ok(snapshot)
    }

    /// Drop every cached view of one user's watchlist
    pub async fn invalidate_user(&self, user_id: UserId) {
        for key in [
            keys::user_balances(user_id),
            keys::user_wallets(user_id),
            keys::user_tokens(user_id),
        ] {
            if let Err(e) = self.cache.delete(&key).await {
                warn!("Failed to invalidate {}: {}", key, e);
            }
        }
    }

    /// Drop the aggregate balances of every user
    pub async fn invalidate_all_user_balances(&self) {
        match self.cache.delete_pattern(keys::ALL_USER_BALANCES).await {
            Ok(removed) => debug!("Invalidated {} user balance lists", removed),
            Err(e) => warn!("Failed to invalidate user balance lists: {}", e),
        }
    }
}
