//! Best-effort key/value cache in front of the store
//!
//! Values are JSON strings with a TTL. Callers treat every cache failure as
//! a miss; nothing the engine does depends on the cache being reachable.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use types::{TokenId, UserId, WalletId};

/// Cache key scheme shared by the engine and its readers
pub mod keys {
    use super::*;

    /// Latest balance of one wallet-token pair
    pub fn balance(wallet_id: WalletId, token_id: TokenId) -> String {
        format!("balance:{}:{}", wallet_id, token_id)
    }

    /// Aggregate latest balances of one user
    pub fn user_balances(user_id: UserId) -> String {
        format!("user_balances:{}", user_id)
    }

    pub fn user_wallets(user_id: UserId) -> String {
        format!("user_wallets:{}", user_id)
    }

    pub fn user_tokens(user_id: UserId) -> String {
        format!("user_tokens:{}", user_id)
    }

    /// Glob matching every user's aggregate balances
    pub const ALL_USER_BALANCES: &str = "user_balances:*";
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache miss")]
    Miss,

    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid key pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Cache payload error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Fetch a live value; expired and absent keys are [`CacheError::Miss`]
    async fn get(&self, key: &str) -> CacheResult<String>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Delete every key matching a glob, returning how many were removed
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<usize>;
}

/// JSON helpers over any [`CacheProvider`]
#[async_trait]
pub trait CacheExt: CacheProvider {
    async fn get_json<T>(&self, key: &str) -> CacheResult<T>
    where
        T: DeserializeOwned + Send,
    {
        let raw = self.get(key).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn set_json<T>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.set(key, raw, ttl).await
    }
}

impl<C: CacheProvider + ?Sized> CacheExt for C {}

#[derive(Debug)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-process [`CacheProvider`] with lazy expiry
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    unavailable: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every operation fails while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Whether a live entry exists for `key`
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_available(&self) -> CacheResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("memory cache offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheProvider for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<String> {
        self.check_available()?;
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Err(CacheError::Miss)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        self.check_available()?;
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.check_available()?;
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<usize> {
        self.check_available()?;
        let matcher = glob::Pattern::new(pattern).map_err(|e| CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let before = self.entries.len();
        self.entries.retain(|key, _| !matcher.matches(key));
        Ok(before.saturating_sub(self.entries.len()))
    }
}
