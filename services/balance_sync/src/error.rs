//! Error types for the balance synchronization engine

use thiserror::Error;
use types::{AddressError, TokenId, UserId, WalletId};

use crate::cache::CacheError;
use crate::store::StoreError;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for sync operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed chain address, never retried
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// Caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Operation deadline elapsed
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// Transient failure reported by the chain oracle
    #[error("RPC error: {0}")]
    Rpc(String),

    /// A single RPC attempt took too long
    #[error("RPC call timed out after {timeout_ms}ms")]
    RpcTimeout {
        /// Per-attempt timeout in milliseconds
        timeout_ms: u64,
    },

    /// Oracle answered with data that cannot be decoded as a balance
    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    /// All attempts failed; wraps the last cause
    #[error("Balance query failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made, including the first
        attempts: u32,
        /// Failure of the final attempt
        #[source]
        last: Box<SyncError>,
    },

    /// Wallet/token enumeration failed; aborts the whole cycle
    #[error("Failed to read watchlist for {scope}: {source}")]
    WatchlistUnavailable {
        /// Human readable cycle scope
        scope: String,
        /// Store failure
        #[source]
        source: StoreError,
    },

    /// Durable store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Cache failure
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Wallet does not exist or belongs to another user
    #[error("Wallet {wallet_id} not found for user {user_id}")]
    WalletNotFound {
        /// Requesting user
        user_id: UserId,
        /// Requested wallet
        wallet_id: WalletId,
    },

    /// Token does not exist or belongs to another user
    #[error("Token {token_id} not found for user {user_id}")]
    TokenNotFound {
        /// Requesting user
        user_id: UserId,
        /// Requested token
        token_id: TokenId,
    },

    /// Address already on the user's watchlist
    #[error("Wallet {address} is already tracked")]
    WalletAlreadyTracked {
        /// Duplicate address
        address: String,
    },

    /// Symbol already on the user's watchlist
    #[error("Token {symbol} is already tracked")]
    TokenAlreadyTracked {
        /// Duplicate symbol
        symbol: String,
    },

    /// Scheduler started twice
    #[error("Scheduler is already running")]
    AlreadyRunning,

    /// Configuration error in engine settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Check if a failed chain query may succeed on another attempt
    ///
    /// Every oracle failure is retried except malformed input and
    /// cancellation.
    pub fn is_retryable(&self) -> bool {
        !self.is_validation() && !self.is_cancellation()
    }

    /// Check if this error is a cancellation or deadline outcome
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SyncError::Cancelled | SyncError::DeadlineExceeded)
    }

    /// Check if this error is a validation failure
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::InvalidAddress(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(SyncError::Rpc("connection reset".into()).is_retryable());
        assert!(SyncError::RpcTimeout { timeout_ms: 10 }.is_retryable());
        assert!(SyncError::InvalidResponse("short".into()).is_retryable());
        assert!(!SyncError::Cancelled.is_retryable());
        assert!(SyncError::DeadlineExceeded.is_cancellation());

        let invalid: SyncError = "nope".parse::<types::ChainAddress>().unwrap_err().into();
        assert!(invalid.is_validation());
        assert!(!invalid.is_retryable());
    }

    #[test]
    fn test_retries_exhausted_wraps_last_cause() {
        let err = SyncError::RetriesExhausted {
            attempts: 3,
            last: Box::new(SyncError::Rpc("503".into())),
        };
        assert_eq!(
            err.to_string(),
            "Balance query failed after 3 attempts: RPC error: 503"
        );
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "RPC error: 503");
    }
}
