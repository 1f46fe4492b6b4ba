//! On-chain value types.
//!
//! Addresses and 256-bit words are the `alloy-primitives` types. This module
//! adds the parsing rules the SDK applies at its edges and the few word
//! operations the encrypt and decrypt paths need.

use std::fmt;

use crate::error::{CoreError, Result};

pub use alloy_primitives::{Address, B256, U256};

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parse a `0x`-prefixed, 40-hex-digit address.
///
/// All-lowercase and all-uppercase input is accepted as is. Mixed case must
/// be a valid EIP-55 checksum.
pub fn parse_address(s: &str) -> Result<Address> {
    let invalid = || CoreError::InvalidAddress(s.to_string());

    let digits = s.strip_prefix("0x").ok_or_else(invalid)?;
    if digits.len() != 40 {
        return Err(invalid());
    }

    let has_lower = digits.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = digits.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        Address::parse_checksummed(s, None).map_err(|_| invalid())
    } else {
        s.parse::<Address>().map_err(|_| invalid())
    }
}

/// Parse a decimal or `0x`-hex unsigned integer.
pub fn parse_u256(s: &str) -> Result<U256> {
    let (digits, radix) = match s.strip_prefix("0x") {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(CoreError::InvalidInteger(s.to_string()));
    }
    U256::from_str_radix(digits, u64::from(radix)).map_err(|_| CoreError::Overflow { bits: 256 })
}

/// The address as a left-padded word.
pub fn address_to_u256(address: &Address) -> U256 {
    U256::from_be_bytes(address.into_word().0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Word helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Operations on 256-bit words used by the encrypt and decrypt paths.
pub trait U256Ext {
    /// True if the value is representable in `bits` bits.
    fn fits_in_bits(&self, bits: u32) -> bool;

    /// The low 160 bits as an address.
    fn low_address(&self) -> Address;

    /// 64 lowercase hex digits, no prefix.
    fn to_padded_hex(&self) -> String;
}

impl U256Ext for U256 {
    fn fits_in_bits(&self, bits: u32) -> bool {
        self.bit_len() <= bits as usize
    }

    fn low_address(&self) -> Address {
        Address::from_word(B256::from(self.to_be_bytes::<32>()))
    }

    fn to_padded_hex(&self) -> String {
        hex::encode(self.to_be_bytes::<32>())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serde
// ─────────────────────────────────────────────────────────────────────────────

/// JSON form of a word: written as a decimal string, read from a number, a
/// decimal string, or a `0x`-hex string.
///
/// ```rust
/// use cofhe_core::types::{u256_dec, U256};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Handle {
///     #[serde(with = "u256_dec")]
///     ct_hash: U256,
/// }
///
/// let h: Handle = serde_json::from_str(r#"{"ct_hash":"0x2a"}"#).unwrap();
/// assert_eq!(serde_json::to_string(&h).unwrap(), r#"{"ct_hash":"42"}"#);
/// ```
pub mod u256_dec {
    use super::*;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &U256,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<U256, D::Error> {
        struct WordVisitor;

        impl<'de> Visitor<'de> for WordVisitor {
            type Value = U256;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal or 0x-hex string, or an unsigned integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<U256, E> {
                Ok(U256::from(v))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> std::result::Result<U256, E> {
                Ok(U256::from(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<U256, E> {
                parse_u256(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(WordVisitor)
    }
}
