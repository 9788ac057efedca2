//! # Watchlist Types
//!
//! Domain types shared by the balance synchronization engine and its
//! collaborators.
//!
//! ## Design Philosophy
//!
//! - **No Precision Loss**: balances are 256-bit unsigned integers and travel
//!   as decimal strings, never as floats
//! - **Type Safety**: distinct ID wrappers for users, wallets, tokens and
//!   snapshots prevent mixing them up at call sites
//! - **Explicit Token Identity**: [`TokenKind`] distinguishes the native
//!   chain asset from contract-issued tokens instead of a nullable address
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{ChainAddress, TokenKind, Balance};
//!
//! let wallet: ChainAddress = "0x45dda9cb7c25131df268515131f647d726f50608".parse().unwrap();
//! let usdc = TokenKind::Contract("0x2791bca1f2de4661ed88a30c99a7a9449aa84174".parse().unwrap());
//! assert!(!usdc.is_native());
//!
//! let balance: Balance = "1000000000000000000".parse().unwrap();
//! assert_eq!(balance.to_string(), "1000000000000000000");
//! # let _ = wallet;
//! ```

pub mod common;
pub mod watchlist;

pub use common::address::{is_valid_address, ChainAddress};
pub use common::balance::Balance;
pub use common::errors::{AddressError, BalanceParseError};
pub use common::identifiers::{SnapshotId, TokenId, UserId, WalletId};
pub use watchlist::{
    BalanceSnapshot, LatestBalance, NewSnapshot, TokenKind, TrackedToken, TrackedWallet,
};
