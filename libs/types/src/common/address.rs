//! 20-byte chain addresses in `0x`-prefixed hex form

use ethabi::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::errors::AddressError;

const ADDRESS_HEX_LEN: usize = 40;

/// Check the textual address format without allocating
///
/// Accepts exactly `0x` followed by 40 hexadecimal characters (either case).
pub fn is_valid_address(input: &str) -> bool {
    match input.strip_prefix("0x") {
        Some(body) => body.len() == ADDRESS_HEX_LEN && body.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// Validated chain address
///
/// Displays and serializes as lowercase `0x` hex. Two addresses that differ
/// only in letter case compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainAddress(Address);

impl ChainAddress {
    /// Wrap raw 20 address bytes
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(Address::from(bytes))
    }

    /// Underlying ABI address
    pub fn as_address(&self) -> Address {
        self.0
    }

    /// Raw address bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl FromStr for ChainAddress {
    type Err = AddressError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let body = input.strip_prefix("0x").ok_or_else(|| AddressError::MissingPrefix {
            input: input.to_string(),
        })?;

        if body.len() != ADDRESS_HEX_LEN {
            return Err(AddressError::InvalidLength {
                input: input.to_string(),
                len: body.len(),
            });
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(body, &mut bytes).map_err(|_| AddressError::InvalidHex {
            input: input.to_string(),
        })?;

        Ok(Self::from_bytes(bytes))
    }
}

impl From<Address> for ChainAddress {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_bytes()))
    }
}

impl fmt::Debug for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainAddress({})", self)
    }
}

impl Serialize for ChainAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChainAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
