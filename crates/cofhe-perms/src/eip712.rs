//! EIP-712 typed data for permit signatures.
//!
//! These types MUST match the contract-side definitions exactly: any change to
//! a type name, field name, field type, or field order changes the digest and
//! breaks signature verification on-chain.
//!
//! ## Signature shapes
//!
//! | Primary type                 | Fields                                                                          |
//! |------------------------------|---------------------------------------------------------------------------------|
//! | `PermissionedV2IssuerSelf`   | issuer, expiration, recipient, validatorId, validatorContract, sealingKey       |
//! | `PermissionedV2IssuerShared` | issuer, expiration, recipient, validatorId, validatorContract                   |
//! | `PermissionedV2Recipient`    | sealingKey, issuerSignature                                                     |
//!
//! The domain is not a constant: it is read per chain from the ACL contract,
//! whose address is itself read from the task manager.

use alloy_primitives::{address, Bytes};
use alloy_sol_types::{sol, SolStruct};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use cofhe_core::{Address, B256, U256};

use crate::chain::{call_and_decode, Provider};
use crate::error::{PermsError, Result};
use crate::permission::{decode_hex, Permission};

/// Task manager contract, the entry point for ACL discovery.
pub const TASK_MANAGER_ADDRESS: Address = address!("eA30c4B8b44078Bbf8a6ef5b9f1eC1626C7848D9");

sol! {
    interface ITaskManager {
        function acl() external view returns (address);
    }

    /// The ERC-5267 domain getter on the ACL contract.
    interface IAcl {
        function eip712Domain() external view returns (
            bytes1 fields,
            string name,
            string version,
            uint256 chainId,
            address verifyingContract,
            bytes32 salt,
            uint256[] extensions
        );
    }

    #[derive(Debug, PartialEq, Eq)]
    struct PermissionedV2IssuerSelf {
        address issuer;
        uint64 expiration;
        address recipient;
        uint256 validatorId;
        address validatorContract;
        bytes32 sealingKey;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct PermissionedV2IssuerShared {
        address issuer;
        uint64 expiration;
        address recipient;
        uint256 validatorId;
        address validatorContract;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct PermissionedV2Recipient {
        bytes32 sealingKey;
        bytes issuerSignature;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Domain
// ─────────────────────────────────────────────────────────────────────────────

/// An EIP-712 domain as declared by the ACL contract.
///
/// Stored on signed permits, so it keeps its own serde form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    /// The `alloy-sol-types` domain used for hashing.
    pub fn to_sol_domain(&self) -> alloy_sol_types::Eip712Domain {
        alloy_sol_types::Eip712Domain::new(
            Some(self.name.clone().into()),
            Some(self.version.clone().into()),
            Some(U256::from(self.chain_id)),
            Some(self.verifying_contract),
            None,
        )
    }

    /// The domain separator hash.
    pub fn separator(&self) -> B256 {
        self.to_sol_domain().separator()
    }
}

/// Read the ACL address from the task manager, then the ACL's own domain.
pub async fn fetch_eip712_domain(provider: &dyn Provider) -> Result<Eip712Domain> {
    let acl = call_and_decode(provider, TASK_MANAGER_ADDRESS, &ITaskManager::aclCall {})
        .await?
        ._0;

    let domain = call_and_decode(provider, acl, &IAcl::eip712DomainCall {}).await?;
    let chain_id = u64::try_from(domain.chainId).map_err(|_| {
        PermsError::Serialization(format!(
            "eip712Domain() chain id {} does not fit in 64 bits",
            domain.chainId
        ))
    })?;

    tracing::debug!(
        %acl,
        name = %domain.name,
        version = %domain.version,
        chain_id,
        "resolved EIP-712 domain"
    );

    Ok(Eip712Domain {
        name: domain.name,
        version: domain.version,
        chain_id,
        verifying_contract: domain.verifyingContract,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Primary types
// ─────────────────────────────────────────────────────────────────────────────

/// The three permit signature shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignaturePrimaryType {
    IssuerSelf,
    IssuerShared,
    Recipient,
}

/// One field of a typed struct, as listed in `eth_signTypedData_v4` payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedField {
    pub name: &'static str,
    pub kind: &'static str,
}

const fn field(name: &'static str, kind: &'static str) -> TypedField {
    TypedField { name, kind }
}

const DOMAIN_FIELDS: [TypedField; 4] = [
    field("name", "string"),
    field("version", "string"),
    field("chainId", "uint256"),
    field("verifyingContract", "address"),
];

const ISSUER_SELF_FIELDS: [TypedField; 6] = [
    field("issuer", "address"),
    field("expiration", "uint64"),
    field("recipient", "address"),
    field("validatorId", "uint256"),
    field("validatorContract", "address"),
    field("sealingKey", "bytes32"),
];

const ISSUER_SHARED_FIELDS: [TypedField; 5] = [
    field("issuer", "address"),
    field("expiration", "uint64"),
    field("recipient", "address"),
    field("validatorId", "uint256"),
    field("validatorContract", "address"),
];

const RECIPIENT_FIELDS: [TypedField; 2] = [
    field("sealingKey", "bytes32"),
    field("issuerSignature", "bytes"),
];

impl SignaturePrimaryType {
    pub fn name(self) -> &'static str {
        match self {
            SignaturePrimaryType::IssuerSelf => PermissionedV2IssuerSelf::NAME,
            SignaturePrimaryType::IssuerShared => PermissionedV2IssuerShared::NAME,
            SignaturePrimaryType::Recipient => PermissionedV2Recipient::NAME,
        }
    }

    /// Field list, in signing order.
    pub fn fields(self) -> &'static [TypedField] {
        match self {
            SignaturePrimaryType::IssuerSelf => &ISSUER_SELF_FIELDS,
            SignaturePrimaryType::IssuerShared => &ISSUER_SHARED_FIELDS,
            SignaturePrimaryType::Recipient => &RECIPIENT_FIELDS,
        }
    }

    /// `Name(type1 field1,type2 field2,...)`.
    pub fn encode_type(self) -> String {
        match self {
            SignaturePrimaryType::IssuerSelf => PermissionedV2IssuerSelf::eip712_encode_type(),
            SignaturePrimaryType::IssuerShared => PermissionedV2IssuerShared::eip712_encode_type(),
            SignaturePrimaryType::Recipient => PermissionedV2Recipient::eip712_encode_type(),
        }
        .into_owned()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// A permit signature message, one variant per primary type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermitMessage {
    IssuerSelf(PermissionedV2IssuerSelf),
    IssuerShared(PermissionedV2IssuerShared),
    Recipient(PermissionedV2Recipient),
}

impl PermitMessage {
    /// Project the fields `primary_type` signs out of a permission.
    pub fn from_permission(
        primary_type: SignaturePrimaryType,
        permission: &Permission,
    ) -> Result<Self> {
        Ok(match primary_type {
            SignaturePrimaryType::IssuerSelf => Self::IssuerSelf(PermissionedV2IssuerSelf {
                issuer: permission.issuer,
                expiration: permission.expiration,
                recipient: permission.recipient,
                validatorId: U256::from(permission.validator_id),
                validatorContract: permission.validator_contract,
                sealingKey: B256::from(permission.sealing_key_bytes()?),
            }),
            SignaturePrimaryType::IssuerShared => Self::IssuerShared(PermissionedV2IssuerShared {
                issuer: permission.issuer,
                expiration: permission.expiration,
                recipient: permission.recipient,
                validatorId: U256::from(permission.validator_id),
                validatorContract: permission.validator_contract,
            }),
            SignaturePrimaryType::Recipient => Self::Recipient(PermissionedV2Recipient {
                sealingKey: B256::from(permission.sealing_key_bytes()?),
                issuerSignature: Bytes::from(decode_hex(&permission.issuer_signature)?),
            }),
        })
    }

    pub fn primary_type(&self) -> SignaturePrimaryType {
        match self {
            PermitMessage::IssuerSelf(_) => SignaturePrimaryType::IssuerSelf,
            PermitMessage::IssuerShared(_) => SignaturePrimaryType::IssuerShared,
            PermitMessage::Recipient(_) => SignaturePrimaryType::Recipient,
        }
    }

    /// `hashStruct(message)`.
    pub fn struct_hash(&self) -> B256 {
        match self {
            PermitMessage::IssuerSelf(m) => m.eip712_hash_struct(),
            PermitMessage::IssuerShared(m) => m.eip712_hash_struct(),
            PermitMessage::Recipient(m) => m.eip712_hash_struct(),
        }
    }

    /// `keccak256(0x1901 ++ domainSeparator ++ hashStruct)`.
    pub fn signing_hash(&self, domain: &alloy_sol_types::Eip712Domain) -> B256 {
        match self {
            PermitMessage::IssuerSelf(m) => m.eip712_signing_hash(domain),
            PermitMessage::IssuerShared(m) => m.eip712_signing_hash(domain),
            PermitMessage::Recipient(m) => m.eip712_signing_hash(domain),
        }
    }

    fn to_json(&self) -> Value {
        let mut out = Map::new();
        match self {
            PermitMessage::IssuerSelf(m) => {
                issuer_fields(
                    &mut out,
                    m.issuer,
                    m.expiration,
                    m.recipient,
                    m.validatorId,
                    m.validatorContract,
                );
                out.insert("sealingKey".into(), json!(bytes_hex(m.sealingKey.as_slice())));
            }
            PermitMessage::IssuerShared(m) => issuer_fields(
                &mut out,
                m.issuer,
                m.expiration,
                m.recipient,
                m.validatorId,
                m.validatorContract,
            ),
            PermitMessage::Recipient(m) => {
                out.insert("sealingKey".into(), json!(bytes_hex(m.sealingKey.as_slice())));
                out.insert("issuerSignature".into(), json!(bytes_hex(&m.issuerSignature)));
            }
        }
        Value::Object(out)
    }
}

fn issuer_fields(
    out: &mut Map<String, Value>,
    issuer: Address,
    expiration: u64,
    recipient: Address,
    validator_id: U256,
    validator_contract: Address,
) {
    out.insert("issuer".into(), json!(issuer.to_string()));
    out.insert("expiration".into(), json!(expiration));
    out.insert("recipient".into(), json!(recipient.to_string()));
    let validator_id = match u64::try_from(validator_id) {
        Ok(n) => json!(n),
        Err(_) => json!(validator_id.to_string()),
    };
    out.insert("validatorId".into(), validator_id);
    out.insert("validatorContract".into(), json!(validator_contract.to_string()));
}

fn bytes_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn field_list(fields: &[TypedField]) -> Value {
    Value::Array(
        fields
            .iter()
            .map(|f| json!({ "name": f.name, "type": f.kind }))
            .collect(),
    )
}

/// A complete typed-data signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedData {
    pub domain: Eip712Domain,
    pub message: PermitMessage,
}

impl TypedData {
    /// Build the message for `primary_type` from a permission.
    pub fn for_permission(
        domain: Eip712Domain,
        primary_type: SignaturePrimaryType,
        permission: &Permission,
    ) -> Result<Self> {
        Ok(Self {
            domain,
            message: PermitMessage::from_permission(primary_type, permission)?,
        })
    }

    pub fn primary_type(&self) -> SignaturePrimaryType {
        self.message.primary_type()
    }

    pub fn struct_hash(&self) -> B256 {
        self.message.struct_hash()
    }

    /// The digest actually signed.
    pub fn signing_hash(&self) -> B256 {
        self.message.signing_hash(&self.domain.to_sol_domain())
    }

    /// The `eth_signTypedData_v4` JSON payload.
    pub fn to_json(&self) -> Value {
        let primary_type = self.primary_type();

        let mut types = Map::new();
        types.insert("EIP712Domain".into(), field_list(&DOMAIN_FIELDS));
        types.insert(primary_type.name().into(), field_list(primary_type.fields()));

        json!({
            "types": types,
            "primaryType": primary_type.name(),
            "domain": {
                "name": self.domain.name,
                "version": self.domain.version,
                "chainId": self.domain.chain_id,
                "verifyingContract": self.domain.verifying_contract.to_string(),
            },
            "message": self.message.to_json(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> Eip712Domain {
        Eip712Domain {
            name: "ACL".into(),
            version: "1".into(),
            chain_id: 31337,
            verifying_contract: Address::repeat_byte(0x44),
        }
    }

    fn permission() -> Permission {
        Permission {
            issuer: Address::repeat_byte(0x11),
            expiration: 1_000_000_000_000,
            recipient: Address::ZERO,
            validator_id: 0,
            validator_contract: Address::ZERO,
            sealing_key: format!("0x{}", "cd".repeat(32)),
            issuer_signature: "0xbeef".into(),
            recipient_signature: "0x".into(),
        }
    }

    #[test]
    fn test_task_manager_address() {
        assert_eq!(
            TASK_MANAGER_ADDRESS.to_string(),
            "0xeA30c4B8b44078Bbf8a6ef5b9f1eC1626C7848D9"
        );
    }

    #[test]
    fn test_encode_type_orderings() {
        assert_eq!(
            SignaturePrimaryType::IssuerSelf.encode_type(),
            "PermissionedV2IssuerSelf(address issuer,uint64 expiration,address recipient,uint256 validatorId,address validatorContract,bytes32 sealingKey)"
        );
        assert_eq!(
            SignaturePrimaryType::IssuerShared.encode_type(),
            "PermissionedV2IssuerShared(address issuer,uint64 expiration,address recipient,uint256 validatorId,address validatorContract)"
        );
        assert_eq!(
            SignaturePrimaryType::Recipient.encode_type(),
            "PermissionedV2Recipient(bytes32 sealingKey,bytes issuerSignature)"
        );
    }

    #[test]
    fn test_json_field_tables_match_struct_types() {
        for primary_type in [
            SignaturePrimaryType::IssuerSelf,
            SignaturePrimaryType::IssuerShared,
            SignaturePrimaryType::Recipient,
        ] {
            let fields: Vec<String> = primary_type
                .fields()
                .iter()
                .map(|f| format!("{} {}", f.kind, f.name))
                .collect();
            assert_eq!(
                format!("{}({})", primary_type.name(), fields.join(",")),
                primary_type.encode_type()
            );
        }
    }

    #[test]
    fn test_recipient_message_carries_issuer_signature() {
        let data =
            TypedData::for_permission(domain(), SignaturePrimaryType::Recipient, &permission())
                .unwrap();
        let PermitMessage::Recipient(message) = &data.message else {
            panic!("expected recipient message");
        };
        assert_eq!(message.issuerSignature.to_vec(), vec![0xbe, 0xef]);
        assert_eq!(message.sealingKey, B256::repeat_byte(0xcd));
    }

    #[test]
    fn test_malformed_issuer_signature_fails_projection() {
        let mut p = permission();
        p.issuer_signature = "abcz".into();
        assert!(matches!(
            TypedData::for_permission(domain(), SignaturePrimaryType::Recipient, &p),
            Err(PermsError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_signing_hash_depends_on_domain() {
        let a = TypedData::for_permission(domain(), SignaturePrimaryType::IssuerSelf, &permission())
            .unwrap();
        let mut other = domain();
        other.chain_id = 1;
        let b = TypedData::for_permission(other, SignaturePrimaryType::IssuerSelf, &permission())
            .unwrap();
        assert_eq!(a.struct_hash(), b.struct_hash());
        assert_ne!(a.signing_hash(), b.signing_hash());
    }

    #[test]
    fn test_json_payload() {
        let data =
            TypedData::for_permission(domain(), SignaturePrimaryType::IssuerShared, &permission())
                .unwrap();
        let json = data.to_json();
        assert_eq!(json["primaryType"], "PermissionedV2IssuerShared");
        assert_eq!(json["domain"]["chainId"], 31337);
        assert_eq!(json["types"]["PermissionedV2IssuerShared"].as_array().unwrap().len(), 5);
        assert!(json["message"].get("sealingKey").is_none());
        assert_eq!(json["message"]["expiration"], 1_000_000_000_000u64);
        assert_eq!(json["message"]["validatorId"], 0);
    }
}
