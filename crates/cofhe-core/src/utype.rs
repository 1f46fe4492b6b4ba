//! FHE type tags ("utypes") and conversion of raw decrypted integers.
//!
//! Every operation that branches on the encrypted type matches exhaustively
//! on [`FheType`], so adding a tag forces every call site to handle it.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::types::{Address, U256Ext, U256};

/// The encrypted type of a ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FheType {
    Bool = 0,
    Uint4 = 1,
    Uint8 = 2,
    Uint16 = 3,
    Uint32 = 4,
    Uint64 = 5,
    Uint128 = 6,
    Uint160 = 7,
    Uint256 = 8,
}

impl FheType {
    /// Convert to the on-wire numeric tag.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Width of the plaintext domain in bits.
    pub fn bit_width(self) -> u32 {
        match self {
            FheType::Bool => 1,
            FheType::Uint4 => 4,
            FheType::Uint8 => 8,
            FheType::Uint16 => 16,
            FheType::Uint32 => 32,
            FheType::Uint64 => 64,
            FheType::Uint128 => 128,
            FheType::Uint160 => 160,
            FheType::Uint256 => 256,
        }
    }

    /// Whether values of this type can be produced by the encrypt pipeline.
    pub fn is_encryptable(self) -> bool {
        !matches!(self, FheType::Uint4)
    }

    /// Human-readable name, as used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            FheType::Bool => "bool",
            FheType::Uint4 => "uint4",
            FheType::Uint8 => "uint8",
            FheType::Uint16 => "uint16",
            FheType::Uint32 => "uint32",
            FheType::Uint64 => "uint64",
            FheType::Uint128 => "uint128",
            FheType::Uint160 => "address",
            FheType::Uint256 => "uint256",
        }
    }
}

impl fmt::Display for FheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for FheType {
    type Error = CoreError;

    fn try_from(v: u8) -> Result<Self> {
        Ok(match v {
            0 => FheType::Bool,
            1 => FheType::Uint4,
            2 => FheType::Uint8,
            3 => FheType::Uint16,
            4 => FheType::Uint32,
            5 => FheType::Uint64,
            6 => FheType::Uint128,
            7 => FheType::Uint160,
            8 => FheType::Uint256,
            other => return Err(CoreError::InvalidUtype(other.to_string())),
        })
    }
}

impl Serialize for FheType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for FheType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        FheType::try_from(v).map_err(de::Error::custom)
    }
}

/// A decrypted value in the shape the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsealedValue {
    Bool(bool),
    Uint(U256),
    Address(Address),
}

impl UnsealedValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            UnsealedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            UnsealedValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            UnsealedValue::Address(a) => Some(*a),
            _ => None,
        }
    }
}

impl fmt::Display for UnsealedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsealedValue::Bool(b) => write!(f, "{}", b),
            UnsealedValue::Uint(v) => write!(f, "{}", v),
            UnsealedValue::Address(a) => write!(f, "{}", a),
        }
    }
}

/// Convert a raw decrypted integer into the requested output type.
///
/// `Bool` is a nonzero test, `Uint160` renders the low 160 bits as an
/// address, and the other encryptable integer types pass through.
pub fn convert_via_utype(utype: FheType, value: U256) -> Result<UnsealedValue> {
    match utype {
        FheType::Bool => Ok(UnsealedValue::Bool(!value.is_zero())),
        FheType::Uint160 => Ok(UnsealedValue::Address(value.low_address())),
        FheType::Uint8
        | FheType::Uint16
        | FheType::Uint32
        | FheType::Uint64
        | FheType::Uint128
        | FheType::Uint256 => Ok(UnsealedValue::Uint(value)),
        FheType::Uint4 => Err(CoreError::InvalidUtype(utype.as_u8().to_string())),
    }
}
