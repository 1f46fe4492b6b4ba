//! ZkPoK metadata codec.
//!
//! The proof of correct encryption is bound to the (account, security zone,
//! chain) triple it was produced for. The proof-verification backend rebuilds
//! the same 53 bytes independently, so this layout must match byte-for-byte:
//!
//! ```text
//! [ security_zone: 1 ][ address: 20 ][ chain_id: 32, big-endian ]
//! ```

use crate::error::{CoreError, Result};
use crate::types::{Address, U256};

/// Highest secp256k1 recovery id.
pub const MAX_RECOVERY_ID: u8 = 3;

/// Length of the encoded metadata.
pub const ZKPOK_METADATA_LEN: usize = 53;

/// Encode the metadata bound into a proof.
pub fn construct_zkpok_metadata(
    address: &Address,
    security_zone: u8,
    chain_id: u64,
) -> [u8; ZKPOK_METADATA_LEN] {
    let mut out = [0u8; ZKPOK_METADATA_LEN];
    out[0] = security_zone;
    out[1..21].copy_from_slice(address.as_slice());
    out[21..].copy_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
    out
}

/// Decode metadata produced by [`construct_zkpok_metadata`].
pub fn parse_zkpok_metadata(bytes: &[u8]) -> Result<(Address, u8, U256)> {
    if bytes.len() != ZKPOK_METADATA_LEN {
        return Err(CoreError::InvalidMetadata(format!(
            "zkpok metadata must be {} bytes, got {}",
            ZKPOK_METADATA_LEN,
            bytes.len()
        )));
    }
    let address = Address::from_slice(&bytes[1..21]);
    let chain_id = U256::from_be_slice(&bytes[21..]);
    Ok((address, bytes[0], chain_id))
}

/// Append an Ethereum-style recovery byte (`recid + 27`) to a hex signature.
///
/// Recovery ids above [`MAX_RECOVERY_ID`] are rejected.
pub fn concat_sig_recid(signature: &str, recid: u8) -> Result<String> {
    if recid > MAX_RECOVERY_ID {
        return Err(CoreError::InvalidRecoveryId(recid));
    }
    Ok(format!("{}{:02x}", signature, recid + 27))
}
