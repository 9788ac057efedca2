//! Balance Sync Service
//!
//! Runs the periodic balance scheduler against a JSON-RPC endpoint until
//! Ctrl+C. Usage: `balance_sync_service [config.toml] [--once]`.

use anyhow::{Context, Result};
use balance_sync::{BalanceScheduler, InMemoryStore, MemoryCache, Web3Oracle};
use std::path::PathBuf;
use std::sync::Arc;
use sync_config::SyncConfig;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("balance_sync=info".parse()?),
        )
        .init();

    let mut config_path: Option<PathBuf> = None;
    let mut once = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--once" => once = true,
            path => config_path = Some(PathBuf::from(path)),
        }
    }

    let config = SyncConfig::load(config_path.as_deref())?;
    info!("Starting Balance Sync Service against {}", config.rpc_endpoint);

    let oracle = Arc::new(Web3Oracle::new(&config.rpc_endpoint)?);
    match oracle.chain_id().await {
        Ok(chain_id) if chain_id != config.chain_id => warn!(
            "Endpoint reports chain {} but chain_id is configured as {}",
            chain_id, config.chain_id
        ),
        Ok(chain_id) => info!("Connected to chain {}", chain_id),
        Err(e) => warn!("Could not query chain id: {}", e),
    }

    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(MemoryCache::new());
    let scheduler = BalanceScheduler::from_config(&config, store, cache, oracle)
        .context("Failed to build scheduler")?;

    if once {
        let stats = scheduler.run_once(&CancellationToken::new()).await?;
        info!(
            "Cycle finished: {} pairs, {} succeeded, {} failed",
            stats.pairs, stats.succeeded, stats.failed
        );
        return Ok(());
    }

    scheduler.start().await?;
    info!("Service running. Press Ctrl+C to stop.");
    signal::ctrl_c().await?;

    info!("Shutting down Balance Sync Service");
    scheduler.stop().await;

    if let Some(last) = scheduler.last_cycle() {
        info!(
            "Last cycle: {} pairs, {} succeeded, {} failed",
            last.pairs, last.succeeded, last.failed
        );
    }
    let totals = scheduler.totals();
    info!(
        "Service stopped after {} cycles ({} balances stored, {} failures)",
        totals.cycles, totals.succeeded, totals.failed
    );
    Ok(())
}
