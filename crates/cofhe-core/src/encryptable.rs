//! Plaintext inputs to the encrypt pipeline and the verified handles it produces.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::{address_to_u256, parse_u256, u256_dec, Address, U256Ext, U256};
use crate::utype::FheType;

/// A plaintext value tagged with the FHE type it should be encrypted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptableItem {
    #[serde(with = "u256_dec")]
    pub data: U256,
    pub utype: FheType,
    pub security_zone: u8,
}

impl EncryptableItem {
    /// Create an item, checking that `data` fits the type's bit width.
    pub fn new(data: U256, utype: FheType, security_zone: u8) -> Result<Self> {
        if !utype.is_encryptable() {
            return Err(CoreError::InvalidUtype(utype.as_u8().to_string()));
        }
        if !data.fits_in_bits(utype.bit_width()) {
            return Err(CoreError::OutOfRange {
                utype: utype.to_string(),
                value: data.to_string(),
            });
        }
        Ok(Self {
            data,
            utype,
            security_zone,
        })
    }

    /// Re-check the range invariant (items can be built by struct literal).
    pub fn validate(&self) -> Result<()> {
        Self::new(self.data, self.utype, self.security_zone).map(|_| ())
    }

    /// Move this item to a different security zone.
    pub fn in_zone(mut self, security_zone: u8) -> Self {
        self.security_zone = security_zone;
        self
    }
}

/// Constructors for [`EncryptableItem`]s. All default to security zone 0.
pub struct Encryptable;

impl Encryptable {
    pub fn bool(value: bool) -> EncryptableItem {
        Self::unchecked(U256::from(u8::from(value)), FheType::Bool)
    }

    pub fn uint8(value: u8) -> EncryptableItem {
        Self::unchecked(U256::from(value), FheType::Uint8)
    }

    pub fn uint16(value: u16) -> EncryptableItem {
        Self::unchecked(U256::from(value), FheType::Uint16)
    }

    pub fn uint32(value: u32) -> EncryptableItem {
        Self::unchecked(U256::from(value), FheType::Uint32)
    }

    pub fn uint64(value: u64) -> EncryptableItem {
        Self::unchecked(U256::from(value), FheType::Uint64)
    }

    pub fn uint128(value: u128) -> EncryptableItem {
        Self::unchecked(U256::from(value), FheType::Uint128)
    }

    pub fn uint256(value: U256) -> EncryptableItem {
        Self::unchecked(value, FheType::Uint256)
    }

    pub fn address(value: Address) -> EncryptableItem {
        Self::unchecked(address_to_u256(&value), FheType::Uint160)
    }

    /// Build from a parsed string value (decimal or `0x` hex), range-checked.
    pub fn parse(value: &str, utype: FheType) -> Result<EncryptableItem> {
        EncryptableItem::new(parse_u256(value)?, utype, 0)
    }

    // The native argument type already bounds the value.
    fn unchecked(data: U256, utype: FheType) -> EncryptableItem {
        EncryptableItem {
            data,
            utype,
            security_zone: 0,
        }
    }
}

/// A verified ciphertext handle, ready to be passed to a contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoFheInItem {
    #[serde(with = "u256_dec")]
    pub ct_hash: U256,
    pub security_zone: u8,
    pub utype: FheType,
    /// `0x`-prefixed verifier signature (65 bytes, recovery byte last).
    pub signature: String,
}
