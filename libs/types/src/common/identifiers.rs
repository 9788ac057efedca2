//! Typed ID wrappers for store-assigned identifiers
//!
//! Zero-cost wrappers around `u64` so that a wallet id can never be passed
//! where a token id is expected:
//!
//! ```rust
//! use types::{TokenId, WalletId};
//!
//! fn pair(wallet: WalletId, token: TokenId) -> (u64, u64) {
//!     (wallet.inner(), token.inner())
//! }
//!
//! assert_eq!(pair(WalletId::new(7), TokenId::new(9)), (7, 9));
//! // pair(TokenId::new(9), WalletId::new(7)); // compile error
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_typed_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize
        )]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create a new typed ID
            #[inline(always)]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Extract the inner u64 value
            #[inline(always)]
            pub const fn inner(&self) -> u64 {
                self.0
            }

            /// Generate next sequential ID
            #[inline(always)]
            pub fn next(&self) -> Self {
                Self(self.0.wrapping_add(1))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            #[inline(always)]
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            #[inline(always)]
            fn from(id: $name) -> u64 {
                id.0
            }
        }
    };
}

define_typed_id!(
    /// Owner of a watchlist
    UserId
);

define_typed_id!(
    /// Tracked wallet record
    WalletId
);

define_typed_id!(
    /// Tracked token record
    TokenId
);

define_typed_id!(
    /// Persisted balance snapshot
    SnapshotId
);
