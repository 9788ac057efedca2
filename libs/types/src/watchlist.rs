//! Watchlist records: tracked wallets, tracked tokens, balance snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::address::ChainAddress;
use crate::common::balance::Balance;
use crate::common::identifiers::{SnapshotId, TokenId, UserId, WalletId};

/// Identity of a tracked asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "address", rename_all = "snake_case")]
pub enum TokenKind {
    /// The chain's base currency (ETH, MATIC, ...)
    Native,
    /// Contract-issued token at the given address
    Contract(ChainAddress),
}

impl TokenKind {
    pub fn is_native(&self) -> bool {
        matches!(self, TokenKind::Native)
    }

    /// Contract address, `None` for the native asset
    pub fn contract(&self) -> Option<ChainAddress> {
        match self {
            TokenKind::Native => None,
            TokenKind::Contract(address) => Some(*address),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Native => write!(f, "native"),
            TokenKind::Contract(address) => write!(f, "{}", address),
        }
    }
}

/// Wallet a user asked to track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedWallet {
    pub id: WalletId,
    pub user_id: UserId,
    /// Immutable once created
    pub address: ChainAddress,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Token a user asked to track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedToken {
    pub id: TokenId,
    pub user_id: UserId,
    pub kind: TokenKind,
    pub symbol: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One immutable balance observation for a wallet-token pair
///
/// Snapshots are append-only. The current balance of a pair is the snapshot
/// with the greatest `fetched_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub id: SnapshotId,
    pub wallet_id: WalletId,
    pub token_id: TokenId,
    pub balance: Balance,
    pub balance_usd: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// Snapshot contents before the store assigns an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSnapshot {
    pub wallet_id: WalletId,
    pub token_id: TokenId,
    pub balance: Balance,
    pub balance_usd: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl NewSnapshot {
    /// Snapshot stamped with the current time and no USD valuation
    pub fn now(wallet_id: WalletId, token_id: TokenId, balance: Balance) -> Self {
        Self {
            wallet_id,
            token_id,
            balance,
            balance_usd: None,
            fetched_at: Utc::now(),
        }
    }
}

/// Current balance of one pair, joined with display fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestBalance {
    pub wallet_id: WalletId,
    pub wallet_address: ChainAddress,
    pub token_id: TokenId,
    pub token_symbol: String,
    pub balance: Balance,
    pub balance_usd: Option<String>,
    pub fetched_at: DateTime<Utc>,
}
