//! Building blocks: typed identifiers, chain addresses and balances

pub mod address;
pub mod balance;
pub mod errors;
pub mod identifiers;
