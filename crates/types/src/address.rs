use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur when parsing a Meridian address string.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AddressError {
    #[error("address must start with '{expected}'")]
    InvalidPrefix { expected: &'static str },
    #[error("address must be {expected} characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("address payload is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("address payload must be exactly 20 bytes")]
    InvalidPayloadLength,
}

/// Number of raw bytes contained in an address.
pub const ADDRESS_BYTES: usize = 20;

/// Human readable prefix of account addresses.
pub const ACCOUNT_PREFIX: &str = "mer";
/// Human readable prefix of validator operator addresses.
pub const VALIDATOR_PREFIX: &str = "mervaloper";
/// Human readable prefix of validator consensus addresses.
pub const CONSENSUS_PREFIX: &str = "mervalcons";

/// Encode raw address bytes behind a human readable prefix.
pub fn encode_address(prefix: &str, bytes: &[u8; ADDRESS_BYTES]) -> String {
    let mut encoded = String::with_capacity(prefix.len() + ADDRESS_BYTES * 2);
    encoded.push_str(prefix);
    encoded.push_str(&hex::encode(bytes));
    encoded
}

/// Decode a prefixed address string into the raw bytes.
pub fn decode_address(
    prefix: &'static str,
    address: &str,
) -> Result<[u8; ADDRESS_BYTES], AddressError> {
    let payload = address
        .strip_prefix(prefix)
        .ok_or(AddressError::InvalidPrefix { expected: prefix })?;

    let expected = prefix.len() + ADDRESS_BYTES * 2;
    if address.len() != expected {
        return Err(AddressError::InvalidLength {
            expected,
            actual: address.len(),
        });
    }

    let decoded = hex::decode(payload)?;
    decoded
        .try_into()
        .map_err(|_| AddressError::InvalidPayloadLength)
}

macro_rules! address_type {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(pub [u8; ADDRESS_BYTES]);

        impl $name {
            pub const fn new(bytes: [u8; ADDRESS_BYTES]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
                &self.0
            }

            /// Rebuild an address from a store key fragment.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
                let raw: [u8; ADDRESS_BYTES] = bytes
                    .try_into()
                    .map_err(|_| AddressError::InvalidPayloadLength)?;
                Ok(Self(raw))
            }

            pub fn is_empty(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&encode_address($prefix, &self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = AddressError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_address($prefix, s).map($name)
            }
        }

        impl From<[u8; ADDRESS_BYTES]> for $name {
            fn from(value: [u8; ADDRESS_BYTES]) -> Self {
                $name(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }

        impl TryFrom<String> for $name {
            type Error = AddressError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

address_type!(
    /// Account address: delegators, withdraw targets and module accounts.
    AccAddress,
    ACCOUNT_PREFIX
);
address_type!(
    /// Validator operator address.
    ValAddress,
    VALIDATOR_PREFIX
);
address_type!(
    /// Validator consensus address, as reported in block votes.
    ConsAddress,
    CONSENSUS_PREFIX
);

impl From<ValAddress> for AccAddress {
    fn from(value: ValAddress) -> Self {
        AccAddress(value.0)
    }
}

impl From<AccAddress> for ValAddress {
    fn from(value: AccAddress) -> Self {
        ValAddress(value.0)
    }
}

/// Deterministic address of a module account (no private key exists for it).
pub fn module_address(name: &str) -> AccAddress {
    let hash = blake3::hash(format!("module/{name}").as_bytes());
    let mut bytes = [0u8; ADDRESS_BYTES];
    bytes.copy_from_slice(&hash.as_bytes()[..ADDRESS_BYTES]);
    AccAddress(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let addr = AccAddress([0xAB; ADDRESS_BYTES]);
        let encoded = addr.to_string();
        assert!(encoded.starts_with(ACCOUNT_PREFIX));
        assert_eq!(encoded.parse::<AccAddress>().unwrap(), addr);
    }

    #[test]
    fn validator_prefix_not_accepted_as_account() {
        let val = ValAddress([1; ADDRESS_BYTES]).to_string();
        let err = val.parse::<AccAddress>().unwrap_err();
        assert!(matches!(err, AddressError::InvalidLength { .. }));
    }

    #[test]
    fn invalid_prefix_rejected() {
        let bad = format!("xyz{}", "00".repeat(ADDRESS_BYTES));
        let err = bad.parse::<ValAddress>().unwrap_err();
        assert!(matches!(err, AddressError::InvalidPrefix { .. }));
    }

    #[test]
    fn invalid_hex_rejected() {
        let bad = format!("{ACCOUNT_PREFIX}{}", "gg".repeat(ADDRESS_BYTES));
        let err = bad.parse::<AccAddress>().unwrap_err();
        assert!(matches!(err, AddressError::InvalidHex(_)));
    }

    #[test]
    fn parse_errors_compare_by_value() {
        let bad = format!("{ACCOUNT_PREFIX}{}", "gg".repeat(ADDRESS_BYTES));
        let err = bad.parse::<AccAddress>().unwrap_err();
        assert_eq!(err.clone(), bad.parse::<AccAddress>().unwrap_err());
        assert_ne!(err, AddressError::InvalidPayloadLength);
    }

    #[test]
    fn module_addresses_are_stable_and_distinct() {
        assert_eq!(module_address("distribution"), module_address("distribution"));
        assert_ne!(module_address("distribution"), module_address("fee_collector"));
    }

    #[test]
    fn json_uses_prefixed_strings() {
        let addr = ConsAddress([7; ADDRESS_BYTES]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));
        let back: ConsAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
