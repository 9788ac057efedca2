//! Token balances as exact 256-bit unsigned integers
//!
//! The chain reports balances in base units (wei for the native asset), so
//! values routinely exceed `u64`. Balances never pass through floating
//! point; they serialize as decimal strings.

use ethabi::Uint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::errors::BalanceParseError;

/// Non-negative balance in base units
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Balance(Uint);

impl Balance {
    /// Zero balance
    pub fn zero() -> Self {
        Self(Uint::zero())
    }

    /// Wrap a raw 256-bit value
    pub fn from_uint(value: Uint) -> Self {
        Self(value)
    }

    /// Raw 256-bit value
    pub fn as_uint(&self) -> Uint {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<u64> for Balance {
    fn from(value: u64) -> Self {
        Self(Uint::from(value))
    }
}

impl From<Uint> for Balance {
    fn from(value: Uint) -> Self {
        Self(value)
    }
}

impl FromStr for Balance {
    type Err = BalanceParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BalanceParseError::InvalidDecimal {
                input: input.to_string(),
            });
        }

        Uint::from_dec_str(input)
            .map(Self)
            .map_err(|_| BalanceParseError::Overflow {
                input: input.to_string(),
            })
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Balance({})", self.0)
    }
}

impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Balance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
