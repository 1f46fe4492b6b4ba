//! The wire-level projection of a permit.

use serde::{Deserialize, Serialize};

use cofhe_core::Address;

use crate::error::{PermsError, Result};

/// What decrypt and sealoutput requests carry instead of the full permit.
///
/// Drops the name, type, and sealing private key; carries the sealing public
/// key as a `0x`-prefixed 32-byte hex string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub issuer: Address,
    pub expiration: u64,
    pub recipient: Address,
    pub validator_id: u64,
    pub validator_contract: Address,
    pub sealing_key: String,
    pub issuer_signature: String,
    pub recipient_signature: String,
}

impl Permission {
    /// The sealing public key as raw bytes.
    pub fn sealing_key_bytes(&self) -> Result<[u8; 32]> {
        let bytes = decode_hex(&self.sealing_key)?;
        bytes.try_into().map_err(|_| {
            PermsError::KeyLength("sealing key must be 32 bytes".to_string())
        })
    }
}

/// Decode a `0x`-prefixed hex string (`"0x"` decodes to empty).
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let body = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(body).map_err(|e| PermsError::InvalidHex(format!("{}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Permission {
        Permission {
            issuer: Address::repeat_byte(0x11),
            expiration: 1_000,
            recipient: Address::ZERO,
            validator_id: 0,
            validator_contract: Address::ZERO,
            sealing_key: format!("0x{}", "ab".repeat(32)),
            issuer_signature: "0x1234".into(),
            recipient_signature: "0x".into(),
        }
    }

    #[test]
    fn test_serde_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("validatorContract").is_some());
        assert!(json.get("sealingKey").is_some());
        assert!(json.get("issuerSignature").is_some());
        assert_eq!(json["expiration"], 1000);
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("0x").unwrap(), Vec::<u8>::new());
        assert_eq!(decode_hex("0x1234").unwrap(), vec![0x12, 0x34]);
        assert!(decode_hex("0xabc").is_err());
    }

    #[test]
    fn test_bad_sealing_key() {
        let mut p = sample();
        p.sealing_key = "0x1234".into();
        assert!(p.sealing_key_bytes().is_err());
    }
}
