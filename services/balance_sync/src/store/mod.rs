//! Durable storage of watchlists and balance snapshots
//!
//! The engine only talks to storage through [`WatchlistStore`]. The
//! in-process [`InMemoryStore`] backs tests and the standalone service.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use types::{
    BalanceSnapshot, ChainAddress, LatestBalance, NewSnapshot, TokenId, TokenKind, TrackedToken,
    TrackedWallet, UserId, WalletId,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    /// Uniqueness constraint violated
    #[error("{entity} {key} already exists")]
    Conflict { entity: &'static str, key: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait WatchlistStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] if the user already tracks `address`
    async fn create_wallet(
        &self,
        user_id: UserId,
        address: ChainAddress,
        label: Option<String>,
    ) -> StoreResult<TrackedWallet>;

    /// Fails with [`StoreError::Conflict`] if the user already tracks `symbol`
    async fn create_token(
        &self,
        user_id: UserId,
        kind: TokenKind,
        symbol: String,
        name: String,
    ) -> StoreResult<TrackedToken>;

    async fn get_wallet(&self, wallet_id: WalletId) -> StoreResult<TrackedWallet>;

    async fn get_token(&self, token_id: TokenId) -> StoreResult<TrackedToken>;

    /// Delete a wallet owned by `user_id` together with its snapshots
    async fn delete_wallet(&self, wallet_id: WalletId, user_id: UserId) -> StoreResult<()>;

    /// Delete a token owned by `user_id` together with its snapshots
    async fn delete_token(&self, token_id: TokenId, user_id: UserId) -> StoreResult<()>;

    async fn get_all_wallets(&self) -> StoreResult<Vec<TrackedWallet>>;

    async fn get_all_tokens(&self) -> StoreResult<Vec<TrackedToken>>;

    async fn get_wallets_by_user(&self, user_id: UserId) -> StoreResult<Vec<TrackedWallet>>;

    async fn get_tokens_by_user(&self, user_id: UserId) -> StoreResult<Vec<TrackedToken>>;

    /// Append a snapshot; the referenced wallet and token must exist
    async fn create_balance_snapshot(&self, snapshot: NewSnapshot) -> StoreResult<BalanceSnapshot>;

    /// Remove snapshots fetched more than `age` ago, returning how many
    async fn delete_snapshots_older_than(&self, age: Duration) -> StoreResult<usize>;

    /// Newest snapshot of every pair owned by `user_id`
    async fn get_latest_balances(&self, user_id: UserId) -> StoreResult<Vec<LatestBalance>>;

    /// Up to `limit` snapshots of one pair, newest first
    async fn get_balance_history(
        &self,
        wallet_id: WalletId,
        token_id: TokenId,
        limit: usize,
    ) -> StoreResult<Vec<BalanceSnapshot>>;
}
