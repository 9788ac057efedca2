//! Scheduler and fetch cycle integration tests
//!
//! All tests run on a paused clock, so backoffs, cycle periods and
//! deadlines elapse instantly and deterministically.

mod common;

use balance_sync::cache::keys;
use balance_sync::{
    BalanceScheduler, CacheProvider, InMemoryStore, MemoryCache, SyncError, WatchlistStore,
};
use common::*;
use std::sync::Arc;
use std::time::Duration;
use sync_config::SyncConfig;
use tokio_util::sync::CancellationToken;
use types::{Balance, NewSnapshot, UserId};

#[tokio::test(start_paused = true)]
async fn test_user_refresh_persists_and_invalidates() {
    let harness = Harness::new(fast_config());
    let user = UserId::new(42);
    let wallet = harness.wallet(42, ALICE_WALLET).await;
    let eth = harness.native_token(42, "ETH").await;
    let usdc = harness.contract_token(42, USDC, "USDC").await;

    harness.oracle.set_native(ALICE_WALLET, units(15, 17));
    harness
        .oracle
        .set_token(USDC, ALICE_WALLET, Balance::from(2_500_000_000u64));

    // a stale aggregate view is cached before the refresh
    let stale = harness.service.balances(user).await.unwrap();
    assert!(stale.is_empty());
    assert!(harness.cache.contains(&keys::user_balances(user)));

    let stats = harness
        .scheduler
        .fetch_for_user(&CancellationToken::new(), user)
        .await
        .unwrap();
    assert_eq!(stats.pairs, 2);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.failed, 0);

    let snapshots = harness.store.snapshots();
    assert_eq!(snapshots.len(), 2);
    assert!(snapshots.iter().all(|s| s.wallet_id == wallet.id));
    assert!(!harness.cache.contains(&keys::user_balances(user)));
    assert!(harness.cache.contains(&keys::balance(wallet.id, eth.id)));
    assert!(harness.cache.contains(&keys::balance(wallet.id, usdc.id)));

    let balances = harness.service.balances(user).await.unwrap();
    assert_eq!(balances.len(), 2);
    let eth_balance = balances.iter().find(|b| b.token_id == eth.id).unwrap();
    assert_eq!(eth_balance.balance, units(15, 17));
    assert_eq!(eth_balance.balance.to_string(), "1500000000000000000");
    let usdc_balance = balances.iter().find(|b| b.token_id == usdc.id).unwrap();
    assert_eq!(usdc_balance.balance, Balance::from(2_500_000_000u64));
    assert!(harness.cache.contains(&keys::user_balances(user)));

    // per-user refreshes count towards totals only
    assert_eq!(harness.scheduler.last_cycle(), None);
    assert_eq!(harness.scheduler.totals().cycles, 1);
    assert_eq!(harness.scheduler.totals().succeeded, 2);
}

#[tokio::test(start_paused = true)]
async fn test_two_periodic_cycles_write_two_snapshots() {
    let harness = Harness::new(fast_config());
    let wallet = harness.wallet(1, ALICE_WALLET).await;
    let token = harness.native_token(1, "ETH").await;
    harness.oracle.set_native(ALICE_WALLET, Balance::from(10u64));

    harness.scheduler.start().await.unwrap();
    assert!(matches!(
        harness.scheduler.start().await,
        Err(SyncError::AlreadyRunning)
    ));

    // first cycle runs at start, the second one period later
    tokio::time::sleep(Duration::from_secs(1)).await;
    let first = harness.store.snapshots();
    assert_eq!(first.len(), 1);
    harness.oracle.set_native(ALICE_WALLET, Balance::from(20u64));

    tokio::time::sleep(Duration::from_secs(60)).await;
    harness.scheduler.stop().await;
    assert!(!harness.scheduler.is_running().await);

    let history = harness
        .store
        .get_balance_history(wallet.id, token.id, 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    let (newer, older) = (&history[0], &history[1]);
    assert_ne!(newer.id, older.id);
    assert!(newer.fetched_at > older.fetched_at);
    assert_eq!(newer.balance, Balance::from(20u64));
    // the first snapshot is untouched by the second cycle
    assert_eq!(older, &first[0]);
    let totals = harness.scheduler.totals();
    assert_eq!(totals.cycles, 2);
    assert_eq!(totals.succeeded, 2);
    let last = harness.scheduler.last_cycle().unwrap();
    assert_eq!(last.succeeded, 1);
}

#[tokio::test]
async fn test_zero_periods_rejected_at_construction() {
    for config in [
        SyncConfig {
            fetch_interval_secs: 0,
            ..fast_config()
        },
        SyncConfig {
            cleanup_interval_secs: 0,
            ..fast_config()
        },
        SyncConfig {
            user_fetch_timeout_secs: 0,
            ..fast_config()
        },
    ] {
        let built = BalanceScheduler::from_config(
            &config,
            Arc::new(InMemoryStore::new()),
            Arc::new(MemoryCache::new()),
            Arc::new(MockOracle::new()),
        );
        assert!(matches!(built, Err(SyncError::Configuration(_))));
    }
}

#[tokio::test(start_paused = true)]
async fn test_no_snapshots_after_stop() {
    let harness = Harness::new(fast_config());
    harness.wallet(1, ALICE_WALLET).await;
    harness.native_token(1, "ETH").await;
    harness.contract_token(1, USDC, "USDC").await;

    harness.scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    harness.scheduler.stop().await;
    let stopped_at = chrono::Utc::now();
    let written = harness.store.snapshot_count();
    assert_eq!(written, 2);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(harness.store.snapshot_count(), written);
    assert!(harness
        .store
        .snapshots()
        .iter()
        .all(|s| s.fetched_at <= stopped_at));

    // stopping twice is harmless
    harness.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_running_cycle() {
    let harness = Harness::new(SyncConfig {
        max_workers: 1,
        ..fast_config()
    });
    harness.wallet(1, ALICE_WALLET).await;
    harness.wallet(1, BOB_WALLET).await;
    harness.native_token(1, "ETH").await;
    harness.contract_token(1, USDC, "USDC").await;
    harness.oracle.set_latency(Duration::from_secs(4));

    harness.scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    harness.scheduler.stop().await;

    let written = harness.store.snapshot_count();
    assert_eq!(written, 1);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.store.snapshot_count(), written);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_refresh_keeps_persisted_snapshots() {
    let harness = Harness::new(SyncConfig {
        max_workers: 1,
        ..fast_config()
    });
    let user = UserId::new(7);
    harness.wallet(7, ALICE_WALLET).await;
    harness.wallet(7, BOB_WALLET).await;
    harness.native_token(7, "ETH").await;
    harness.contract_token(7, USDC, "USDC").await;
    harness.oracle.set_latency(Duration::from_secs(1));

    harness
        .cache
        .set(&keys::user_balances(user), "[]".into(), Duration::from_secs(300))
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let refresh = {
        let scheduler = harness.scheduler.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.fetch_for_user(&cancel, user).await })
    };

    // two of four pairs finish before the caller gives up
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    cancel.cancel();

    let result = refresh.await.unwrap();
    assert!(matches!(result, Err(SyncError::Cancelled)));
    assert_eq!(harness.store.snapshot_count(), 2);
    assert!(!harness.cache.contains(&keys::user_balances(user)));

    let balances = harness.service.balances(user).await.unwrap();
    assert_eq!(balances.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_deadline_without_progress() {
    let harness = Harness::new(SyncConfig {
        user_fetch_timeout_secs: 2,
        ..fast_config()
    });
    harness.wallet(3, ALICE_WALLET).await;
    harness.native_token(3, "ETH").await;
    harness.oracle.set_latency(Duration::from_secs(5));

    let err = harness
        .scheduler
        .fetch_for_user(&CancellationToken::new(), UserId::new(3))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::DeadlineExceeded));
    assert_eq!(harness.store.snapshot_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_for_user_without_pairs() {
    let harness = Harness::new(fast_config());
    harness.wallet(5, ALICE_WALLET).await;

    let stats = harness
        .scheduler
        .fetch_for_user(&CancellationToken::new(), UserId::new(5))
        .await
        .unwrap();
    assert_eq!(stats.pairs, 0);
    assert_eq!(harness.oracle.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pairs_never_cross_users() {
    let harness = Harness::new(fast_config());
    harness.wallet(1, ALICE_WALLET).await;
    harness.native_token(1, "ETH").await;
    harness.wallet(2, BOB_WALLET).await;
    harness.contract_token(2, USDC, "USDC").await;

    let stats = harness
        .scheduler
        .run_once(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.pairs, 2);

    for snapshot in harness.store.snapshots() {
        let wallet = harness.store.get_wallet(snapshot.wallet_id).await.unwrap();
        let token = harness.store.get_token(snapshot.token_id).await.unwrap();
        assert_eq!(wallet.user_id, token.user_id);
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_pair_does_not_abort_cycle() {
    let harness = Harness::new(fast_config());
    harness.wallet(1, ALICE_WALLET).await;
    harness.wallet(1, BOB_WALLET).await;
    harness.native_token(1, "ETH").await;
    harness.oracle.fail_wallet(BOB_WALLET);

    let stats = harness
        .scheduler
        .run_once(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.dispatched, 2);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(harness.store.snapshot_count(), 1);
    // one call for Alice, three attempts for Bob
    assert_eq!(harness.oracle.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_persist_failure_counts_as_failed() {
    let harness = Harness::new(fast_config());
    harness.wallet(1, ALICE_WALLET).await;
    harness.native_token(1, "ETH").await;
    harness.store.set_writes_failing(true);

    let stats = harness
        .scheduler
        .run_once(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.succeeded, 0);
    assert_eq!(stats.failed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_enumeration_failure_aborts_cycle() {
    let harness = Harness::new(fast_config());
    harness.wallet(1, ALICE_WALLET).await;
    harness.native_token(1, "ETH").await;
    harness.store.set_reads_failing(true);

    let err = harness
        .scheduler
        .run_once(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::WatchlistUnavailable { .. }));
    assert_eq!(harness.oracle.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_global_cycle_invalidates_user_balance_lists() {
    let harness = Harness::new(fast_config());
    harness.wallet(1, ALICE_WALLET).await;
    harness.native_token(1, "ETH").await;

    let ttl = Duration::from_secs(300);
    for key in ["user_balances:1", "user_balances:2", "user_wallets:1"] {
        harness.cache.set(key, "[]".into(), ttl).await.unwrap();
    }

    harness
        .scheduler
        .run_once(&CancellationToken::new())
        .await
        .unwrap();
    assert!(!harness.cache.contains("user_balances:1"));
    assert!(!harness.cache.contains("user_balances:2"));
    assert!(harness.cache.contains("user_wallets:1"));
}

#[tokio::test(start_paused = true)]
async fn test_cycle_survives_cache_outage() {
    let harness = Harness::new(fast_config());
    harness.wallet(1, ALICE_WALLET).await;
    harness.native_token(1, "ETH").await;
    harness.cache.set_unavailable(true);

    let stats = harness
        .scheduler
        .run_once(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.succeeded, 1);
    assert_eq!(harness.store.snapshot_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_sweep_removes_expired_snapshots() {
    let harness = Harness::new(SyncConfig {
        fetch_interval_secs: 100_000,
        cleanup_interval_secs: 3_600,
        ..fast_config()
    });
    let wallet = harness.wallet(1, ALICE_WALLET).await;
    let token = harness.native_token(1, "ETH").await;

    for age_days in [40, 31] {
        harness
            .store
            .create_balance_snapshot(NewSnapshot {
                fetched_at: chrono::Utc::now() - chrono::Duration::days(age_days),
                ..NewSnapshot::now(wallet.id, token.id, Balance::from(1u64))
            })
            .await
            .unwrap();
    }
    assert_eq!(harness.store.snapshot_count(), 2);

    harness.scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3_601)).await;
    harness.scheduler.stop().await;

    let remaining = harness.store.snapshots();
    assert_eq!(remaining.len(), 1);
    let cutoff = chrono::Utc::now() - chrono::Duration::days(30);
    assert!(remaining.iter().all(|s| s.fetched_at >= cutoff));
}
