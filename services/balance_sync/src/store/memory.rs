use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use types::{
    BalanceSnapshot, ChainAddress, LatestBalance, NewSnapshot, SnapshotId, TokenId, TokenKind,
    TrackedToken, TrackedWallet, UserId, WalletId,
};

use super::{StoreError, StoreResult, WatchlistStore};

#[derive(Debug, Default)]
struct Tables {
    wallets: BTreeMap<WalletId, TrackedWallet>,
    tokens: BTreeMap<TokenId, TrackedToken>,
    snapshots: BTreeMap<SnapshotId, BalanceSnapshot>,
    next_wallet: u64,
    next_token: u64,
    next_snapshot: u64,
}

/// Process-local [`WatchlistStore`]
///
/// Reads and writes can be switched to fail independently so callers can
/// exercise outage handling.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read fail with [`StoreError::Unavailable`]
    pub fn set_reads_failing(&self, failing: bool) {
        self.fail_reads.store(failing, Ordering::SeqCst);
    }

    /// Make every write fail with [`StoreError::Unavailable`]
    pub fn set_writes_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    /// All snapshots in insertion order
    pub fn snapshots(&self) -> Vec<BalanceSnapshot> {
        self.tables.read().snapshots.values().cloned().collect()
    }

    pub fn snapshot_count(&self) -> usize {
        self.tables.read().snapshots.len()
    }

    fn check_reads(&self) -> StoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".to_string()));
        }
        Ok(())
    }

    fn check_writes(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl WatchlistStore for InMemoryStore {
    async fn create_wallet(
        &self,
        user_id: UserId,
        address: ChainAddress,
        label: Option<String>,
    ) -> StoreResult<TrackedWallet> {
        self.check_writes()?;
        let mut tables = self.tables.write();
        let duplicate = tables
            .wallets
            .values()
            .any(|wallet| wallet.user_id == user_id && wallet.address == address);
        if duplicate {
            return Err(StoreError::Conflict {
                entity: "wallet",
                key: address.to_string(),
            });
        }
        tables.next_wallet += 1;
        let wallet = TrackedWallet {
            id: WalletId::new(tables.next_wallet),
            user_id,
            address,
            label,
            created_at: Utc::now(),
        };
        tables.wallets.insert(wallet.id, wallet.clone());
        Ok(wallet)
    }

    async fn create_token(
        &self,
        user_id: UserId,
        kind: TokenKind,
        symbol: String,
        name: String,
    ) -> StoreResult<TrackedToken> {
        self.check_writes()?;
        let mut tables = self.tables.write();
        let duplicate = tables
            .tokens
            .values()
            .any(|token| token.user_id == user_id && token.symbol == symbol);
        if duplicate {
            return Err(StoreError::Conflict {
                entity: "token",
                key: symbol,
            });
        }
        tables.next_token += 1;
        let token = TrackedToken {
            id: TokenId::new(tables.next_token),
            user_id,
            kind,
            symbol,
            name,
            created_at: Utc::now(),
        };
        tables.tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn get_wallet(&self, wallet_id: WalletId) -> StoreResult<TrackedWallet> {
        self.check_reads()?;
        self.tables
            .read()
            .wallets
            .get(&wallet_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "wallet",
                id: wallet_id.inner(),
            })
    }

    async fn get_token(&self, token_id: TokenId) -> StoreResult<TrackedToken> {
        self.check_reads()?;
        self.tables
            .read()
            .tokens
            .get(&token_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "token",
                id: token_id.inner(),
            })
    }

    async fn delete_wallet(&self, wallet_id: WalletId, user_id: UserId) -> StoreResult<()> {
        self.check_writes()?;
        let mut tables = self.tables.write();
        let owned = tables
            .wallets
            .get(&wallet_id)
            .is_some_and(|wallet| wallet.user_id == user_id);
        if !owned {
            return Err(StoreError::NotFound {
                entity: "wallet",
                id: wallet_id.inner(),
            });
        }
        tables.wallets.remove(&wallet_id);
        tables
            .snapshots
            .retain(|_, snapshot| snapshot.wallet_id != wallet_id);
        Ok(())
    }

    async fn delete_token(&self, token_id: TokenId, user_id: UserId) -> StoreResult<()> {
        self.check_writes()?;
        let mut tables = self.tables.write();
        let owned = tables
            .tokens
            .get(&token_id)
            .is_some_and(|token| token.user_id == user_id);
        if !owned {
            return Err(StoreError::NotFound {
                entity: "token",
                id: token_id.inner(),
            });
        }
        tables.tokens.remove(&token_id);
        tables
            .snapshots
            .retain(|_, snapshot| snapshot.token_id != token_id);
        Ok(())
    }

    async fn get_all_wallets(&self) -> StoreResult<Vec<TrackedWallet>> {
        self.check_reads()?;
        Ok(self.tables.read().wallets.values().cloned().collect())
    }

    async fn get_all_tokens(&self) -> StoreResult<Vec<TrackedToken>> {
        self.check_reads()?;
        Ok(self.tables.read().tokens.values().cloned().collect())
    }

    async fn get_wallets_by_user(&self, user_id: UserId) -> StoreResult<Vec<TrackedWallet>> {
        self.check_reads()?;
        Ok(self
            .tables
            .read()
            .wallets
            .values()
            .filter(|wallet| wallet.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_tokens_by_user(&self, user_id: UserId) -> StoreResult<Vec<TrackedToken>> {
        self.check_reads()?;
        Ok(self
            .tables
            .read()
            .tokens
            .values()
            .filter(|token| token.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_balance_snapshot(&self, snapshot: NewSnapshot) -> StoreResult<BalanceSnapshot> {
        self.check_writes()?;
        let mut tables = self.tables.write();
        if !tables.wallets.contains_key(&snapshot.wallet_id) {
            return Err(StoreError::NotFound {
                entity: "wallet",
                id: snapshot.wallet_id.inner(),
            });
        }
        if !tables.tokens.contains_key(&snapshot.token_id) {
            return Err(StoreError::NotFound {
                entity: "token",
                id: snapshot.token_id.inner(),
            });
        }

        tables.next_snapshot += 1;
        let stored = BalanceSnapshot {
            id: SnapshotId::new(tables.next_snapshot),
            wallet_id: snapshot.wallet_id,
            token_id: snapshot.token_id,
            balance: snapshot.balance,
            balance_usd: snapshot.balance_usd,
            fetched_at: snapshot.fetched_at,
        };
        tables.snapshots.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn delete_snapshots_older_than(&self, age: Duration) -> StoreResult<usize> {
        self.check_writes()?;
        let age = chrono::Duration::from_std(age)
            .map_err(|e| StoreError::InvalidArgument(format!("retention out of range: {}", e)))?;
        let cutoff = Utc::now().checked_sub_signed(age).ok_or_else(|| {
            StoreError::InvalidArgument("retention reaches before the earliest timestamp".to_string())
        })?;

        let mut tables = self.tables.write();
        let before = tables.snapshots.len();
        tables
            .snapshots
            .retain(|_, snapshot| snapshot.fetched_at >= cutoff);
        Ok(before - tables.snapshots.len())
    }

    async fn get_latest_balances(&self, user_id: UserId) -> StoreResult<Vec<LatestBalance>> {
        self.check_reads()?;
        let tables = self.tables.read();

        // Newest per pair; equal timestamps resolve to the later insert
        let mut newest: HashMap<(WalletId, TokenId), &BalanceSnapshot> = HashMap::new();
        for snapshot in tables.snapshots.values() {
            let key = (snapshot.wallet_id, snapshot.token_id);
            match newest.get(&key) {
                Some(current) if current.fetched_at > snapshot.fetched_at => {}
                _ => {
                    newest.insert(key, snapshot);
                }
            }
        }

        let mut latest: Vec<LatestBalance> = newest
            .into_values()
            .filter_map(|snapshot| {
                let wallet = tables.wallets.get(&snapshot.wallet_id)?;
                let token = tables.tokens.get(&snapshot.token_id)?;
                (wallet.user_id == user_id).then(|| LatestBalance {
                    wallet_id: wallet.id,
                    wallet_address: wallet.address,
                    token_id: token.id,
                    token_symbol: token.symbol.clone(),
                    balance: snapshot.balance,
                    balance_usd: snapshot.balance_usd.clone(),
                    fetched_at: snapshot.fetched_at,
                })
            })
            .collect();
        latest.sort_by_key(|entry| (entry.wallet_id, entry.token_id));
        Ok(latest)
    }

    async fn get_balance_history(
        &self,
        wallet_id: WalletId,
        token_id: TokenId,
        limit: usize,
    ) -> StoreResult<Vec<BalanceSnapshot>> {
        self.check_reads()?;
        let tables = self.tables.read();
        let mut history: Vec<BalanceSnapshot> = tables
            .snapshots
            .values()
            .filter(|snapshot| snapshot.wallet_id == wallet_id && snapshot.token_id == token_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at).then(b.id.cmp(&a.id)));
        history.truncate(limit);
        Ok(history)
    }
}
