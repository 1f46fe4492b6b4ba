//! Mock verifier and decrypter for chains with the CoFHE mock contracts.
//!
//! On a local chain the ZK verifier and threshold network are simulated by
//! two contracts at fixed addresses. The mock encrypt pipeline asks the mock
//! verifier to compute ciphertext hashes, registers them with a transaction,
//! and signs each item with a well-known verifier key. Mock decrypts are plain
//! contract reads.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{address, eip191_hash_message, keccak256, Bytes};
use alloy_sol_types::sol;
use k256::ecdsa::SigningKey;
use tracing::debug;

use cofhe_core::{convert_via_utype, Address, EncryptableItem, FheType, UnsealedValue, B256, U256};
use cofhe_perms::{call_and_decode, decode_hex, Permit, Provider, Signer, TransactionRequest};

use crate::error::{CofheError, Result};
use crate::zk::VerifyResult;

/// The mock ZK verifier contract.
pub const MOCK_ZK_VERIFIER_ADDRESS: Address = address!("0000000000000000000000000000000000000100");

/// The mock query decrypter contract.
pub const MOCK_QUERY_DECRYPTER_ADDRESS: Address =
    address!("0000000000000000000000000000000000000200");

/// Private key the mock verifier contract accepts signatures from.
pub const MOCK_ZK_VERIFIER_SIGNER_KEY: &str =
    "0x6c8d7f768a6bb4aafe85e8a2f5a9680355239c7e14646ed62b044e39de154512";

sol! {
    /// The permission tuple the mock decrypter checks.
    #[derive(Debug, PartialEq, Eq)]
    struct Permission {
        address issuer;
        uint64 expiration;
        address recipient;
        uint256 validatorId;
        address validatorContract;
        bytes32 sealingKey;
        bytes issuerSignature;
        bytes recipientSignature;
    }

    interface IMockZkVerifier {
        function exists() external view returns (bool);

        function zkVerifyCalcCtHashesPacked(
            uint256[] values,
            uint8[] utypes,
            address user,
            uint8 securityZone,
            uint256 chainId
        ) external view returns (uint256[] ctHashes);

        function insertPackedCtHashes(uint256[] ctHashes, uint256[] values) external;
    }

    interface IMockQueryDecrypter {
        function exists() external view returns (bool);

        function querySealOutput(uint256 ctHash, uint256 utype, Permission permission)
            external view returns (bool allowed, string reason, bytes32 result);

        function queryDecrypt(uint256 ctHash, uint256 utype, Permission permission)
            external view returns (bool allowed, string reason, uint256 result);
    }
}

impl TryFrom<&cofhe_perms::Permission> for Permission {
    type Error = CofheError;

    fn try_from(p: &cofhe_perms::Permission) -> Result<Self> {
        Ok(Self {
            issuer: p.issuer,
            expiration: p.expiration,
            recipient: p.recipient,
            validatorId: U256::from(p.validator_id),
            validatorContract: p.validator_contract,
            sealingKey: B256::from(p.sealing_key_bytes()?),
            issuerSignature: Bytes::from(decode_hex(&p.issuer_signature)?),
            recipientSignature: Bytes::from(decode_hex(&p.recipient_signature)?),
        })
    }
}

/// True if both mock contracts answer `exists()` with `true`.
///
/// Any failure (no code at the address, a revert, garbage return data) means
/// this is not a mock chain.
pub async fn check_is_mock_chain(provider: &dyn Provider) -> bool {
    async fn exists(provider: &dyn Provider, at: Address) -> bool {
        match call_and_decode(provider, at, &IMockZkVerifier::existsCall {}).await {
            Ok(ret) => ret._0,
            Err(e) => {
                debug!(address = %at, error = %e, "mock contract exists() call failed");
                false
            }
        }
    }

    exists(provider, MOCK_ZK_VERIFIER_ADDRESS).await
        && exists(provider, MOCK_QUERY_DECRYPTER_ADDRESS).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock ZK verifier
// ─────────────────────────────────────────────────────────────────────────────

/// Stands in for pack/prove/verify on a mock chain.
#[derive(Clone)]
pub struct MockZkVerifier {
    provider: Arc<dyn Provider>,
    /// Sends `insertPackedCtHashes`.
    signer: Arc<dyn Signer>,
}

impl MockZkVerifier {
    pub fn new(provider: Arc<dyn Provider>, signer: Arc<dyn Signer>) -> Self {
        Self { provider, signer }
    }

    /// Compute, register and sign a ciphertext hash for every item.
    pub async fn zk_verify_sign(
        &self,
        user: &Address,
        items: &[EncryptableItem],
        security_zone: u8,
    ) -> Result<Vec<VerifyResult>> {
        let chain_id = self
            .provider
            .chain_id()
            .await
            .map_err(|e| CofheError::internal("failed to read chain id", e))?;

        let ct_hashes = self.calc_ct_hashes(user, items, security_zone, chain_id).await?;
        if ct_hashes.len() != items.len() {
            return Err(CofheError::ZkVerifyFailed(format!(
                "mock verifier returned {} ct hashes for {} items",
                ct_hashes.len(),
                items.len()
            )));
        }

        self.insert_packed_ct_hashes(&ct_hashes, items).await?;

        items
            .iter()
            .zip(ct_hashes)
            .map(|(item, ct_hash)| {
                Ok(VerifyResult {
                    ct_hash,
                    signature: sign_item(&item.data, security_zone, item.utype)?,
                })
            })
            .collect()
    }

    async fn calc_ct_hashes(
        &self,
        user: &Address,
        items: &[EncryptableItem],
        security_zone: u8,
        chain_id: u64,
    ) -> Result<Vec<U256>> {
        let call = IMockZkVerifier::zkVerifyCalcCtHashesPackedCall {
            values: items.iter().map(|i| i.data).collect(),
            utypes: items.iter().map(|i| i.utype.as_u8()).collect(),
            user: *user,
            securityZone: security_zone,
            chainId: U256::from(chain_id),
        };

        Ok(
            call_and_decode(self.provider.as_ref(), MOCK_ZK_VERIFIER_ADDRESS, &call)
                .await?
                .ctHashes,
        )
    }

    async fn insert_packed_ct_hashes(
        &self,
        ct_hashes: &[U256],
        items: &[EncryptableItem],
    ) -> Result<()> {
        let tx = TransactionRequest::new(
            MOCK_ZK_VERIFIER_ADDRESS,
            &IMockZkVerifier::insertPackedCtHashesCall {
                ctHashes: ct_hashes.to_vec(),
                values: items.iter().map(|i| i.data).collect(),
            },
        );

        let hash = self.signer.send_transaction(&tx).await.map_err(|e| {
            CofheError::ZkVerifyInsertPackedCtHashesFailed(format!(
                "mockZkVerifySign insertPackedCtHashes failed: {e}"
            ))
        })?;
        debug!(tx = %hash, count = ct_hashes.len(), "registered mock ct hashes");
        Ok(())
    }
}

/// Sign `(value, zone, utype)` the way the mock verifier contract checks it.
///
/// The digest is `keccak256(abi.encodePacked(uint256, int32, uint8))`, wrapped
/// twice with the Ethereum signed-message prefix. Output is `0x` ‖ r ‖ s ‖ v
/// with `v = 27 + recid`.
pub fn sign_item(value: &U256, security_zone: u8, utype: FheType) -> Result<String> {
    let digest = item_digest(value, security_zone, utype);

    let key_bytes =
        hex::decode(MOCK_ZK_VERIFIER_SIGNER_KEY.trim_start_matches("0x")).map_err(sign_failed)?;
    let key = SigningKey::from_slice(&key_bytes).map_err(sign_failed)?;
    let (signature, recid) = key
        .sign_prehash_recoverable(digest.as_slice())
        .map_err(sign_failed)?;

    Ok(format!(
        "0x{}{:02x}",
        hex::encode(signature.to_bytes()),
        recid.to_byte() + 27
    ))
}

fn item_digest(value: &U256, security_zone: u8, utype: FheType) -> B256 {
    let mut packed = Vec::with_capacity(37);
    packed.extend_from_slice(&value.to_be_bytes::<32>());
    packed.extend_from_slice(&i32::from(security_zone).to_be_bytes());
    packed.push(utype.as_u8());

    let eth_signed = eip191_hash_message(keccak256(&packed));
    eip191_hash_message(eth_signed)
}

fn sign_failed(e: impl std::fmt::Display) -> CofheError {
    CofheError::ZkVerifySignFailed(format!("mockZkVerifySign sign failed: {e}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock query decrypter
// ─────────────────────────────────────────────────────────────────────────────

/// Turn the decrypter's `(allowed, reason)` pair into an error of kind `fail`.
fn check_query(allowed: bool, reason: &str, fail: fn(String) -> CofheError) -> Result<()> {
    if !reason.is_empty() {
        return Err(fail(format!("On-chain reversion: {}", reason)));
    }
    if !allowed {
        return Err(fail("ACL Access Denied (NotAllowed)".to_string()));
    }
    Ok(())
}

async fn ensure_domain_valid(provider: &dyn Provider, permit: &Permit) -> Result<()> {
    if !permit.check_signed_domain_valid(provider).await? {
        return Err(CofheError::InvalidPermitDomain(
            "permit domain invalid".to_string(),
        ));
    }
    Ok(())
}

/// Read a sealed value from the mock decrypter and unmask it.
///
/// The mock "seals" by XOR with the permit's sealing public key.
pub async fn mock_seal_output(
    provider: &dyn Provider,
    ct_hash: U256,
    utype: FheType,
    permit: &Permit,
    decrypt_delay: Duration,
) -> Result<UnsealedValue> {
    tokio::time::sleep(decrypt_delay).await;
    ensure_domain_valid(provider, permit).await?;

    let permission = permit.get_permission(false)?;
    let call = IMockQueryDecrypter::querySealOutputCall {
        ctHash: ct_hash,
        utype: U256::from(utype.as_u8()),
        permission: Permission::try_from(&permission)?,
    };
    let outcome = call_and_decode(provider, MOCK_QUERY_DECRYPTER_ADDRESS, &call).await?;
    check_query(outcome.allowed, &outcome.reason, CofheError::SealOutputFailed)?;

    let sealed = U256::from_be_bytes(outcome.result.0);
    let sealing_key = U256::from_be_bytes(permission.sealing_key_bytes()?);
    Ok(convert_via_utype(utype, sealed ^ sealing_key)?)
}

/// Read a decrypted value from the mock decrypter.
pub async fn mock_decrypt(
    provider: &dyn Provider,
    ct_hash: U256,
    utype: FheType,
    permit: &Permit,
    decrypt_delay: Duration,
) -> Result<UnsealedValue> {
    tokio::time::sleep(decrypt_delay).await;
    ensure_domain_valid(provider, permit).await?;

    let call = IMockQueryDecrypter::queryDecryptCall {
        ctHash: ct_hash,
        utype: U256::from(utype.as_u8()),
        permission: Permission::try_from(&permit.get_permission(false)?)?,
    };
    let outcome = call_and_decode(provider, MOCK_QUERY_DECRYPTER_ADDRESS, &call).await?;
    check_query(outcome.allowed, &outcome.reason, CofheError::DecryptFailed)?;

    Ok(convert_via_utype(utype, outcome.result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    #[test]
    fn test_mock_addresses() {
        assert_eq!(
            MOCK_ZK_VERIFIER_ADDRESS.to_string(),
            "0x0000000000000000000000000000000000000100"
        );
        assert_eq!(
            MOCK_QUERY_DECRYPTER_ADDRESS.to_string(),
            "0x0000000000000000000000000000000000000200"
        );
    }

    #[test]
    fn test_sign_item_recovers_to_mock_key() {
        let value = U256::from(100u8);
        let sig = sign_item(&value, 0, FheType::Uint128).unwrap();
        assert!(sig.starts_with("0x"));
        assert_eq!(sig.len(), 2 + 130);

        let bytes = hex::decode(&sig[2..]).unwrap();
        let v = bytes[64];
        assert!(v == 27 || v == 28);

        let mut packed = value.to_be_bytes::<32>().to_vec();
        packed.extend_from_slice(&0i32.to_be_bytes());
        packed.push(FheType::Uint128.as_u8());
        let digest = eip191_hash_message(eip191_hash_message(keccak256(&packed)));

        let signature = Signature::from_slice(&bytes[..64]).unwrap();
        let recid = RecoveryId::from_byte(v - 27).unwrap();
        let recovered =
            VerifyingKey::recover_from_prehash(digest.as_slice(), &signature, recid).unwrap();

        let key = hex::decode(&MOCK_ZK_VERIFIER_SIGNER_KEY[2..]).unwrap();
        let expected = *SigningKey::from_slice(&key).unwrap().verifying_key();
        assert_eq!(recovered, expected);
    }

    #[test]
    fn test_sign_item_binds_zone_and_utype() {
        let value = U256::from(7u8);
        let base = sign_item(&value, 0, FheType::Uint8).unwrap();
        assert_eq!(base, sign_item(&value, 0, FheType::Uint8).unwrap());
        assert_ne!(base, sign_item(&value, 1, FheType::Uint8).unwrap());
        assert_ne!(base, sign_item(&value, 0, FheType::Uint16).unwrap());
    }

    #[test]
    fn test_permission_tuple_conversion() {
        let permission = cofhe_perms::Permission {
            issuer: Address::repeat_byte(0x11),
            expiration: 1_000,
            recipient: Address::ZERO,
            validator_id: 3,
            validator_contract: Address::repeat_byte(0x22),
            sealing_key: format!("0x{}", "ab".repeat(32)),
            issuer_signature: "0x1234".into(),
            recipient_signature: "0x".into(),
        };
        let tuple = Permission::try_from(&permission).unwrap();
        assert_eq!(tuple.validatorId, U256::from(3u8));
        assert_eq!(tuple.sealingKey, B256::repeat_byte(0xab));
        assert_eq!(tuple.issuerSignature.to_vec(), vec![0x12, 0x34]);
        assert!(tuple.recipientSignature.is_empty());

        let mut bad = permission;
        bad.recipient_signature = "0xzz".into();
        assert!(Permission::try_from(&bad).is_err());
    }

    #[test]
    fn test_query_outcome_errors() {
        assert!(check_query(true, "", CofheError::DecryptFailed).is_ok());
        assert!(matches!(
            check_query(false, "", CofheError::DecryptFailed),
            Err(CofheError::DecryptFailed(msg)) if msg.contains("NotAllowed")
        ));
        assert!(matches!(
            check_query(true, "boom", CofheError::SealOutputFailed),
            Err(CofheError::SealOutputFailed(msg)) if msg == "On-chain reversion: boom"
        ));
    }
}
