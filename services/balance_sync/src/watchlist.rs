//! User-facing watchlist operations
//!
//! Mutations go to the store and then invalidate the user's cached views.
//! Reads are cache-aside; a cache failure is treated as a miss.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use types::{
    BalanceSnapshot, ChainAddress, LatestBalance, TokenId, TokenKind, TrackedToken,
    TrackedWallet, UserId, WalletId,
};

use crate::bridge::PersistenceBridge;
use crate::cache::{keys, CacheError, CacheExt, CacheProvider};
use crate::dispatcher::CycleStats;
use crate::error::{Result, SyncError};
use crate::scheduler::BalanceScheduler;
use crate::store::{StoreError, WatchlistStore};

pub struct WatchlistService {
    store: Arc<dyn WatchlistStore>,
    cache: Arc<dyn CacheProvider>,
    bridge: Arc<PersistenceBridge>,
    scheduler: Arc<BalanceScheduler>,
    cache_ttl: Duration,
}

impl WatchlistService {
    pub fn new(scheduler: Arc<BalanceScheduler>, cache_ttl: Duration) -> Self {
        let bridge = Arc::clone(scheduler.bridge());
        Self {
            store: Arc::clone(bridge.store()),
            cache: Arc::clone(bridge.cache()),
            bridge,
            scheduler,
            cache_ttl,
        }
    }

    pub async fn add_wallet(
        &self,
        user_id: UserId,
        address: &str,
        label: Option<String>,
    ) -> Result<TrackedWallet> {
        let address: ChainAddress = address.parse()?;
        let wallet = self
            .store
            .create_wallet(user_id, address, label)
            .await
            .map_err(|e| match e {
                StoreError::Conflict { .. } => SyncError::WalletAlreadyTracked {
                    address: address.to_string(),
                },
                other => other.into(),
            })?;
        self.bridge.invalidate_user(user_id).await;
        info!("User {} now tracks wallet {}", user_id, wallet.address);
        Ok(wallet)
    }

    pub async fn remove_wallet(&self, user_id: UserId, wallet_id: WalletId) -> Result<()> {
        self.store
            .delete_wallet(wallet_id, user_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => SyncError::WalletNotFound { user_id, wallet_id },
                other => other.into(),
            })?;
        self.bridge.invalidate_user(user_id).await;
        Ok(())
    }

    /// Track a token; `contract` is `None` for the chain's native currency
    pub async fn add_token(
        &self,
        user_id: UserId,
        contract: Option<&str>,
        symbol: &str,
        name: &str,
    ) -> Result<TrackedToken> {
        let kind = match contract {
            Some(address) => TokenKind::Contract(address.parse()?),
            None => TokenKind::Native,
        };
        let token = self
            .store
            .create_token(user_id, kind, symbol.to_string(), name.to_string())
            .await
            .map_err(|e| match e {
                StoreError::Conflict { .. } => SyncError::TokenAlreadyTracked {
                    symbol: symbol.to_string(),
                },
                other => other.into(),
            })?;
        self.bridge.invalidate_user(user_id).await;
        info!("User {} now tracks token {} ({})", user_id, token.symbol, token.kind);
        Ok(token)
    }

    pub async fn remove_token(&self, user_id: UserId, token_id: TokenId) -> Result<()> {
        self.store
            .delete_token(token_id, user_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => SyncError::TokenNotFound { user_id, token_id },
                other => other.into(),
            })?;
        self.bridge.invalidate_user(user_id).await;
        Ok(())
    }

    pub async fn wallets(&self, user_id: UserId) -> Result<Vec<TrackedWallet>> {
        let key = keys::user_wallets(user_id);
        if let Some(wallets) = self.cached(&key).await {
            return Ok(wallets);
        }
        let wallets = self.store.get_wallets_by_user(user_id).await?;
        self.populate(&key, &wallets).await;
        Ok(wallets)
    }

    pub async fn tokens(&self, user_id: UserId) -> Result<Vec<TrackedToken>> {
        let key = keys::user_tokens(user_id);
        if let Some(tokens) = self.cached(&key).await {
            return Ok(tokens);
        }
        let tokens = self.store.get_tokens_by_user(user_id).await?;
        self.populate(&key, &tokens).await;
        Ok(tokens)
    }

    /// Current balance of every tracked pair
    pub async fn balances(&self, user_id: UserId) -> Result<Vec<LatestBalance>> {
        let key = keys::user_balances(user_id);
        if let Some(balances) = self.cached(&key).await {
            return Ok(balances);
        }
        let balances = self.store.get_latest_balances(user_id).await?;
        self.populate(&key, &balances).await;
        Ok(balances)
    }

    /// Up to `limit` snapshots of a pair, newest first
    pub async fn balance_history(
        &self,
        user_id: UserId,
        wallet_id: WalletId,
        token_id: TokenId,
        limit: usize,
    ) -> Result<Vec<BalanceSnapshot>> {
        let owned = match self.store.get_wallet(wallet_id).await {
            Ok(wallet) => wallet.user_id == user_id,
            Err(StoreError::NotFound { .. }) => false,
            Err(e) => return Err(e.into()),
        };
        if !owned {
            return Err(SyncError::WalletNotFound { user_id, wallet_id });
        }
        Ok(self
            .store
            .get_balance_history(wallet_id, token_id, limit)
            .await?)
    }

    /// Fetch fresh balances for one user now
    pub async fn refresh_balances(
        &self,
        cancel: &CancellationToken,
        user_id: UserId,
    ) -> Result<CycleStats> {
        self.bridge.invalidate_user(user_id).await;
        self.scheduler.fetch_for_user(cancel, user_id).await
    }

    async fn cached<T>(&self, key: &str) -> Option<T>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        match self.cache.get_json(key).await {
            Ok(value) => {
                debug!("Cache hit for {}", key);
                Some(value)
            }
            Err(CacheError::Miss) => None,
            Err(e) => {
                warn!("Cache read of {} failed: {}", key, e);
                None
            }
        }
    }

    async fn populate<T>(&self, key: &str, value: &T)
    where
        T: serde::Serialize + Sync,
    {
        if let Err(e) = self.cache.set_json(key, value, self.cache_ttl).await {
            warn!("Failed to cache {}: {}", key, e);
        }
    }
}
