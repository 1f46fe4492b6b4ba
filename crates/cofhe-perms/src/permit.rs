//! Permits: signed authorizations to decrypt or reseal an account's data.
//!
//! ## Overview
//!
//! A [`Permit`] is created from [`PermitOptions`] (defaults applied, creation
//! rules checked, a sealing keypair generated if none was supplied), signed
//! once with EIP-712, and then stored under its [`Permit::get_hash`]. The hash
//! covers only the fields that define what is being authorized, so renaming or
//! re-signing a permit does not move it.
//!
//! ## Permit types
//!
//! - `self`: the issuer authorizes themselves. Signed by the issuer.
//! - `sharing`: the issuer authorizes a recipient. Signed by the issuer, then
//!   exported and handed to the recipient.
//! - `recipient`: an imported sharing permit, countersigned by the recipient.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use alloy_primitives::keccak256;

use cofhe_core::{Address, U256};

use crate::chain::{Provider, Signer};
use crate::eip712::{fetch_eip712_domain, Eip712Domain, SignaturePrimaryType, TypedData};
use crate::error::{PermsError, Result};
use crate::permission::Permission;
use crate::sealing::{EthEncryptedData, SealingKey};
use crate::validation::{
    validate_fully_formed_permit, validate_permit_params, PermitOptions, ValidationErrors,
    EMPTY_SIGNATURE,
};

/// Who the permit is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermitType {
    /// Serialized as `self`.
    #[serde(rename = "self")]
    Own,
    Sharing,
    Recipient,
}

impl PermitType {
    pub fn as_str(self) -> &'static str {
        match self {
            PermitType::Own => "self",
            PermitType::Sharing => "sharing",
            PermitType::Recipient => "recipient",
        }
    }

    /// The EIP-712 shape signed for this permit type.
    pub fn primary_type(self) -> SignaturePrimaryType {
        match self {
            PermitType::Own => SignaturePrimaryType::IssuerSelf,
            PermitType::Sharing => SignaturePrimaryType::IssuerShared,
            PermitType::Recipient => SignaturePrimaryType::Recipient,
        }
    }
}

impl fmt::Display for PermitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermitType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s {
            "self" => Ok(PermitType::Own),
            "sharing" => Ok(PermitType::Sharing),
            "recipient" => Ok(PermitType::Recipient),
            other => Err(format!("unknown permit type: {}", other)),
        }
    }
}

/// Result of [`Permit::is_valid`]. Expiry is checked before signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermitValidity {
    Valid,
    Expired,
    NotSigned,
}

impl PermitValidity {
    pub fn is_valid(self) -> bool {
        matches!(self, PermitValidity::Valid)
    }

    /// `"expired"` / `"not-signed"`, or `None` when valid.
    pub fn reason(self) -> Option<&'static str> {
        match self {
            PermitValidity::Valid => None,
            PermitValidity::Expired => Some("expired"),
            PermitValidity::NotSigned => Some("not-signed"),
        }
    }
}

/// Persisted form of a permit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedPermit {
    pub name: String,
    #[serde(rename = "type")]
    pub permit_type: PermitType,
    pub issuer: Address,
    pub expiration: u64,
    pub recipient: Address,
    pub validator_id: u64,
    pub validator_contract: Address,
    pub sealing_pair: SealingKey,
    pub issuer_signature: String,
    pub recipient_signature: String,
    #[serde(rename = "_signedDomain", default, skip_serializing_if = "Option::is_none")]
    pub signed_domain: Option<Eip712Domain>,
}

/// A permit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permit {
    /// Display name. Not signed, not hashed.
    pub name: String,
    pub permit_type: PermitType,
    pub issuer: Address,
    /// Unix seconds.
    pub expiration: u64,
    /// Zero address when unused.
    pub recipient: Address,
    /// Zero when no external validator.
    pub validator_id: u64,
    /// Zero address when no external validator.
    pub validator_contract: Address,
    pub sealing_pair: SealingKey,
    /// `"0x"` when unsigned.
    pub issuer_signature: String,
    /// `"0x"` when unsigned.
    pub recipient_signature: String,
    /// The domain the active signature was produced under.
    pub signed_domain: Option<Eip712Domain>,
}

impl Permit {
    /// Validate creation params and build a permit.
    pub fn create(options: &PermitOptions) -> Result<Self> {
        let params = validate_permit_params(options)?;
        Ok(Self {
            name: params.name,
            permit_type: params.permit_type,
            issuer: params.issuer,
            expiration: params.expiration,
            recipient: params.recipient,
            validator_id: params.validator_id,
            validator_contract: params.validator_contract,
            sealing_pair: params.sealing_pair.unwrap_or_else(SealingKey::generate),
            issuer_signature: params.issuer_signature,
            recipient_signature: params.recipient_signature,
            signed_domain: None,
        })
    }

    /// [`Permit::create`] followed by [`Permit::sign`].
    pub async fn create_and_sign(
        options: &PermitOptions,
        provider: &dyn Provider,
        signer: Option<&dyn Signer>,
    ) -> Result<Self> {
        let mut permit = Self::create(options)?;
        permit.sign(provider, signer).await?;
        Ok(permit)
    }

    pub fn update_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn serialize(&self) -> SerializedPermit {
        SerializedPermit {
            name: self.name.clone(),
            permit_type: self.permit_type,
            issuer: self.issuer,
            expiration: self.expiration,
            recipient: self.recipient,
            validator_id: self.validator_id,
            validator_contract: self.validator_contract,
            sealing_pair: self.sealing_pair.clone(),
            issuer_signature: self.issuer_signature.clone(),
            recipient_signature: self.recipient_signature.clone(),
            signed_domain: self.signed_domain.clone(),
        }
    }

    pub fn deserialize(serialized: SerializedPermit) -> Self {
        Self {
            name: serialized.name,
            permit_type: serialized.permit_type,
            issuer: serialized.issuer,
            expiration: serialized.expiration,
            recipient: serialized.recipient,
            validator_id: serialized.validator_id,
            validator_contract: serialized.validator_contract,
            sealing_pair: serialized.sealing_pair,
            issuer_signature: serialized.issuer_signature,
            recipient_signature: serialized.recipient_signature,
            signed_domain: serialized.signed_domain,
        }
    }

    /// This permit's fields as validator input.
    pub fn to_options(&self) -> PermitOptions {
        PermitOptions {
            permit_type: Some(self.permit_type.to_string()),
            issuer: Some(self.issuer.to_string()),
            name: Some(self.name.clone()),
            expiration: Some(self.expiration),
            recipient: Some(self.recipient.to_string()),
            validator_id: Some(self.validator_id),
            validator_contract: Some(self.validator_contract.to_string()),
            sealing_pair: Some(self.sealing_pair.clone()),
            issuer_signature: Some(self.issuer_signature.clone()),
            recipient_signature: Some(self.recipient_signature.clone()),
        }
    }

    /// Run fully-formed validation.
    pub fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        validate_fully_formed_permit(&self.to_options()).map(|_| ())
    }

    /// Pretty JSON of the fields a recipient needs to import this permit.
    ///
    /// Unset optional fields are omitted; the issuer signature is included
    /// only for signed sharing permits. The sealing pair is never exported.
    pub fn export(&self) -> Result<String> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Exported<'a> {
            name: &'a str,
            #[serde(rename = "type")]
            permit_type: PermitType,
            issuer: Address,
            expiration: u64,
            #[serde(skip_serializing_if = "Option::is_none")]
            recipient: Option<Address>,
            #[serde(skip_serializing_if = "Option::is_none")]
            validator_id: Option<u64>,
            #[serde(skip_serializing_if = "Option::is_none")]
            validator_contract: Option<Address>,
            #[serde(skip_serializing_if = "Option::is_none")]
            issuer_signature: Option<&'a str>,
        }

        let exported = Exported {
            name: &self.name,
            permit_type: self.permit_type,
            issuer: self.issuer,
            expiration: self.expiration,
            recipient: (!self.recipient.is_zero()).then_some(self.recipient),
            validator_id: (self.validator_id != 0).then_some(self.validator_id),
            validator_contract: (!self.validator_contract.is_zero())
                .then_some(self.validator_contract),
            issuer_signature: (self.permit_type == PermitType::Sharing
                && self.issuer_signature != EMPTY_SIGNATURE)
                .then_some(self.issuer_signature.as_str()),
        };

        serde_json::to_string_pretty(&exported).map_err(|e| PermsError::Serialization(e.to_string()))
    }

    /// Project to the wire [`Permission`], validating first unless skipped.
    pub fn get_permission(&self, skip_validation: bool) -> Result<Permission> {
        if !skip_validation {
            self.validate()?;
        }
        Ok(Permission {
            issuer: self.issuer,
            expiration: self.expiration,
            recipient: self.recipient,
            validator_id: self.validator_id,
            validator_contract: self.validator_contract,
            sealing_key: format!("0x{}", self.sealing_pair.public_key()),
            issuer_signature: self.issuer_signature.clone(),
            recipient_signature: self.recipient_signature.clone(),
        })
    }

    /// Stable content hash over type, issuer, expiration, recipient,
    /// validatorId, and validatorContract (`0x`-prefixed).
    pub fn get_hash(&self) -> String {
        let core = format!(
            r#"{{"type":"{}","issuer":"{}","expiration":{},"recipient":"{}","validatorId":{},"validatorContract":"{}"}}"#,
            self.permit_type,
            self.issuer,
            self.expiration,
            self.recipient,
            self.validator_id,
            self.validator_contract,
        );
        let inner = keccak256(core.as_bytes());
        format!("0x{}", hex::encode(keccak256(inner)))
    }

    /// The EIP-712 shape this permit is signed with.
    pub fn primary_type(&self) -> SignaturePrimaryType {
        self.permit_type.primary_type()
    }

    /// Typed data for `primary_type` under `domain`, built from the
    /// unvalidated permission.
    pub fn signature_params(
        &self,
        domain: Eip712Domain,
        primary_type: SignaturePrimaryType,
    ) -> Result<TypedData> {
        TypedData::for_permission(domain, primary_type, &self.get_permission(true)?)
    }

    /// True if `domain` is the one this permit was signed under.
    pub fn matches_domain(&self, domain: &Eip712Domain) -> bool {
        self.signed_domain.as_ref().is_some_and(|signed| {
            signed.name == domain.name
                && signed.version == domain.version
                && signed.verifying_contract == domain.verifying_contract
                && signed.chain_id == domain.chain_id
        })
    }

    /// Re-read the on-chain domain and compare. False if never signed.
    pub async fn check_signed_domain_valid(&self, provider: &dyn Provider) -> Result<bool> {
        if self.signed_domain.is_none() {
            return Ok(false);
        }
        let domain = fetch_eip712_domain(provider).await?;
        Ok(self.matches_domain(&domain))
    }

    /// Sign as the party this permit type expects and stamp the domain.
    pub async fn sign(&mut self, provider: &dyn Provider, signer: Option<&dyn Signer>) -> Result<()> {
        let signer = signer.ok_or_else(|| {
            PermsError::MissingSigner("Permit :: sign - signer undefined".to_string())
        })?;

        let domain = fetch_eip712_domain(provider).await?;
        let typed = self.signature_params(domain.clone(), self.primary_type())?;
        let signature = signer
            .sign_typed_data(&typed)
            .await
            .map_err(PermsError::Chain)?;

        match self.permit_type {
            PermitType::Own | PermitType::Sharing => self.issuer_signature = signature,
            PermitType::Recipient => self.recipient_signature = signature,
        }
        self.signed_domain = Some(domain);

        tracing::debug!(hash = %self.get_hash(), permit_type = %self.permit_type, "signed permit");
        Ok(())
    }

    /// Open a value sealed to this permit's sealing key.
    pub fn unseal(&self, sealed: &EthEncryptedData) -> Result<U256> {
        self.sealing_pair.unseal(sealed)
    }

    /// True if the active party's signature is present.
    pub fn is_signed(&self) -> bool {
        match self.permit_type {
            PermitType::Own | PermitType::Sharing => self.issuer_signature != EMPTY_SIGNATURE,
            PermitType::Recipient => self.recipient_signature != EMPTY_SIGNATURE,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_secs())
    }

    pub fn is_expired_at(&self, now_secs: u64) -> bool {
        self.expiration < now_secs
    }

    pub fn is_valid(&self) -> PermitValidity {
        self.is_valid_at(now_secs())
    }

    pub fn is_valid_at(&self, now_secs: u64) -> PermitValidity {
        if self.is_expired_at(now_secs) {
            PermitValidity::Expired
        } else if !self.is_signed() {
            PermitValidity::NotSigned
        } else {
            PermitValidity::Valid
        }
    }
}

impl From<SerializedPermit> for Permit {
    fn from(serialized: SerializedPermit) -> Self {
        Permit::deserialize(serialized)
    }
}

fn now_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{CallRequest, TransactionRequest};
    use async_trait::async_trait;
    use crate::eip712::{IAcl, ITaskManager};
    use alloy_primitives::FixedBytes;
    use alloy_sol_types::SolCall;
    use cofhe_core::B256;

    const ACL: Address = Address::new([0x77; 20]);

    struct DomainProvider {
        chain_id: u64,
    }

    #[async_trait]
    impl Provider for DomainProvider {
        async fn chain_id(&self) -> anyhow::Result<u64> {
            Ok(self.chain_id)
        }

        async fn call(&self, request: &CallRequest) -> anyhow::Result<Vec<u8>> {
            if request.data.starts_with(&ITaskManager::aclCall::SELECTOR) {
                return Ok(ITaskManager::aclCall::abi_encode_returns(&(ACL,)));
            }
            if request.to == ACL && request.data.starts_with(&IAcl::eip712DomainCall::SELECTOR) {
                return Ok(IAcl::eip712DomainCall::abi_encode_returns(&(
                    FixedBytes([0x0f]),
                    "ACL".to_string(),
                    "1".to_string(),
                    U256::from(self.chain_id),
                    ACL,
                    B256::ZERO,
                    Vec::<U256>::new(),
                )));
            }
            anyhow::bail!("unexpected call")
        }

        async fn send(
            &self,
            _method: &str,
            _params: serde_json::Value,
        ) -> anyhow::Result<serde_json::Value> {
            anyhow::bail!("not supported")
        }
    }

    struct FixedSigner;

    #[async_trait]
    impl Signer for FixedSigner {
        async fn address(&self) -> anyhow::Result<Address> {
            Ok(issuer())
        }

        async fn sign_typed_data(&self, _data: &TypedData) -> anyhow::Result<String> {
            Ok(format!("0x{}", "11".repeat(65)))
        }

        async fn send_transaction(&self, _tx: &TransactionRequest) -> anyhow::Result<String> {
            anyhow::bail!("not supported")
        }
    }

    fn issuer() -> Address {
        Address::repeat_byte(0x11)
    }

    fn recipient() -> Address {
        Address::repeat_byte(0x22)
    }

    #[test]
    fn test_create_applies_defaults_and_generates_key() {
        let permit = Permit::create(&PermitOptions::own(issuer())).unwrap();
        assert_eq!(permit.name, "Unnamed Permit");
        assert_eq!(permit.expiration, 1_000_000_000_000);
        assert_eq!(permit.sealing_pair.public_key().len(), 64);
        assert!(!permit.is_signed());
        assert!(permit.signed_domain.is_none());
    }

    #[test]
    fn test_create_rejects_invalid() {
        let result = Permit::create(&PermitOptions::own(issuer()).with_recipient(recipient()));
        assert!(matches!(result, Err(PermsError::InvalidPermitData(_))));
    }

    #[test]
    fn test_hash_ignores_name_and_signatures() {
        let mut a = Permit::create(&PermitOptions::own(issuer())).unwrap();
        let b = a.clone();
        a.update_name("renamed");
        a.issuer_signature = "0xabcd".into();
        a.sealing_pair = SealingKey::generate();
        assert_eq!(a.get_hash(), b.get_hash());
    }

    #[test]
    fn test_hash_changes_with_core_fields() {
        let base = Permit::create(&PermitOptions::sharing(issuer(), recipient())).unwrap();
        let hash = base.get_hash();

        let mut p = base.clone();
        p.expiration += 1;
        assert_ne!(p.get_hash(), hash);

        let mut p = base.clone();
        p.recipient = Address::repeat_byte(0x33);
        assert_ne!(p.get_hash(), hash);

        let mut p = base.clone();
        p.validator_id = 9;
        assert_ne!(p.get_hash(), hash);

        let mut p = base.clone();
        p.validator_contract = Address::repeat_byte(0x44);
        assert_ne!(p.get_hash(), hash);

        let mut p = base;
        p.issuer = Address::repeat_byte(0x55);
        assert_ne!(p.get_hash(), hash);
    }

    #[test]
    fn test_hash_format() {
        let permit = Permit::create(&PermitOptions::own(issuer())).unwrap();
        let hash = permit.get_hash();
        assert!(hash.starts_with("0x"));
        assert_eq!(hash.len(), 66);
    }

    #[test]
    fn test_is_valid_reasons() {
        let mut permit = Permit::create(&PermitOptions::own(issuer())).unwrap();
        assert_eq!(permit.is_valid_at(100), PermitValidity::NotSigned);
        assert_eq!(permit.is_valid_at(100).reason(), Some("not-signed"));

        permit.expiration = 50;
        assert_eq!(permit.is_valid_at(100), PermitValidity::Expired);
        assert_eq!(permit.is_valid_at(100).reason(), Some("expired"));

        permit.issuer_signature = "0x1234".into();
        assert_eq!(permit.is_valid_at(100), PermitValidity::Expired);
        assert_eq!(permit.is_valid_at(10), PermitValidity::Valid);
    }

    #[test]
    fn test_get_permission_requires_signature() {
        let permit = Permit::create(&PermitOptions::own(issuer())).unwrap();
        assert!(matches!(
            permit.get_permission(false),
            Err(PermsError::InvalidPermitData(_))
        ));

        let permission = permit.get_permission(true).unwrap();
        assert_eq!(
            permission.sealing_key,
            format!("0x{}", permit.sealing_pair.public_key())
        );
    }

    #[test]
    fn test_export_omits_unset_fields() {
        let mut sharing = Permit::create(&PermitOptions::sharing(issuer(), recipient())).unwrap();
        let json: serde_json::Value = serde_json::from_str(&sharing.export().unwrap()).unwrap();
        assert_eq!(json["type"], "sharing");
        assert!(json.get("recipient").is_some());
        assert!(json.get("validatorId").is_none());
        assert!(json.get("issuerSignature").is_none());
        assert!(json.get("sealingPair").is_none());

        sharing.issuer_signature = "0xabcd".into();
        let json: serde_json::Value = serde_json::from_str(&sharing.export().unwrap()).unwrap();
        assert_eq!(json["issuerSignature"], "0xabcd");

        let own = Permit::create(&PermitOptions::own(issuer())).unwrap();
        let json: serde_json::Value = serde_json::from_str(&own.export().unwrap()).unwrap();
        assert!(json.get("recipient").is_none());
    }

    #[test]
    fn test_serialize_json_uses_signed_domain_key() {
        let mut permit = Permit::create(&PermitOptions::own(issuer())).unwrap();
        permit.signed_domain = Some(Eip712Domain {
            name: "ACL".into(),
            version: "1".into(),
            chain_id: 1,
            verifying_contract: ACL,
        });
        let json = serde_json::to_value(permit.serialize()).unwrap();
        assert_eq!(json["_signedDomain"]["chainId"], 1);
        assert_eq!(json["type"], "self");

        let back: SerializedPermit = serde_json::from_value(json).unwrap();
        assert_eq!(Permit::from(back), permit);
    }

    #[tokio::test]
    async fn test_sign_without_signer_fails() {
        let mut permit = Permit::create(&PermitOptions::own(issuer())).unwrap();
        let provider = DomainProvider { chain_id: 31337 };
        let result = permit.sign(&provider, None).await;
        assert!(matches!(result, Err(PermsError::MissingSigner(_))));
    }

    #[tokio::test]
    async fn test_sign_sets_issuer_signature_and_domain() {
        let provider = DomainProvider { chain_id: 31337 };
        let permit =
            Permit::create_and_sign(&PermitOptions::own(issuer()), &provider, Some(&FixedSigner))
                .await
                .unwrap();

        assert!(permit.is_signed());
        assert_eq!(permit.recipient_signature, "0x");
        assert_eq!(permit.signed_domain.as_ref().unwrap().chain_id, 31337);
        assert!(permit.validate().is_ok());
        assert!(permit.check_signed_domain_valid(&provider).await.unwrap());

        let redeployed = DomainProvider { chain_id: 1 };
        assert!(!permit.check_signed_domain_valid(&redeployed).await.unwrap());
    }

    #[tokio::test]
    async fn test_recipient_signs_recipient_signature() {
        let provider = DomainProvider { chain_id: 31337 };
        let options = PermitOptions::new(PermitType::Recipient, issuer())
            .with_recipient(recipient())
            .with_issuer_signature("0xabcd");
        let mut permit = Permit::create(&options).unwrap();
        permit.sign(&provider, Some(&FixedSigner)).await.unwrap();

        assert_eq!(permit.issuer_signature, "0xabcd");
        assert_ne!(permit.recipient_signature, "0x");
        assert_eq!(permit.primary_type(), SignaturePrimaryType::Recipient);
    }

    #[tokio::test]
    async fn test_recipient_sign_rejects_non_hex_issuer_signature() {
        let provider = DomainProvider { chain_id: 31337 };
        let options = PermitOptions::new(PermitType::Recipient, issuer())
            .with_recipient(recipient())
            .with_issuer_signature("not-hex");
        let mut permit = Permit::create(&options).unwrap();

        let result = permit.sign(&provider, Some(&FixedSigner)).await;
        assert!(matches!(result, Err(PermsError::InvalidHex(_))));
        assert_eq!(permit.recipient_signature, "0x");
    }

    #[tokio::test]
    async fn test_unsigned_domain_check_is_false() {
        let permit = Permit::create(&PermitOptions::own(issuer())).unwrap();
        let provider = DomainProvider { chain_id: 31337 };
        assert!(!permit.check_signed_domain_valid(&provider).await.unwrap());
    }

    #[test]
    fn test_unseal_with_own_key() {
        let permit = Permit::create(&PermitOptions::own(issuer())).unwrap();
        let sealed =
            SealingKey::seal(U256::from(99u8), permit.sealing_pair.public_key()).unwrap();
        assert_eq!(permit.unseal(&sealed).unwrap(), U256::from(99u8));
    }
}
