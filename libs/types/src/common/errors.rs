//! Error types for address and balance parsing

use thiserror::Error;

/// Errors raised while parsing a chain address
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Address does not start with the `0x` prefix
    #[error("address '{input}' is missing the 0x prefix")]
    MissingPrefix { input: String },

    /// Address body is not exactly 40 characters long
    #[error("address '{input}' has {len} hex characters, expected 40")]
    InvalidLength { input: String, len: usize },

    /// Address body contains a non-hexadecimal character
    #[error("address '{input}' contains non-hex characters")]
    InvalidHex { input: String },
}

/// Errors raised while parsing a decimal balance string
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BalanceParseError {
    /// Input is empty or contains characters other than ASCII digits
    #[error("invalid balance '{input}': expected a non-negative decimal integer")]
    InvalidDecimal { input: String },

    /// Input does not fit into 256 bits
    #[error("balance '{input}' exceeds 256 bits")]
    Overflow { input: String },
}
