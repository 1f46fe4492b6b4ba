//! Golden test vectors for byte-exact encodings.
//!
//! The ZkPoK metadata is rebuilt independently by the proof verifier,
//! function selectors are matched by contracts, and permit digests are
//! recovered by the ACL. All of them must agree with every other
//! implementation bit for bit. The permit digests were computed outside this
//! workspace.

use alloy_primitives::keccak256;

use cofhe_core::{construct_zkpok_metadata, Address};
use cofhe_perms::{Eip712Domain, Permission, SignaturePrimaryType, TypedData};

/// A metadata golden vector.
#[derive(Debug, Clone)]
pub struct MetadataVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub address: Address,
    pub security_zone: u8,
    pub chain_id: u64,
    /// Expected 53-byte encoding (hex).
    pub expected: &'static str,
}

/// Get all metadata vectors.
pub fn metadata_vectors() -> Vec<MetadataVector> {
    vec![
        MetadataVector {
            name: "zone 0, zero address, chain 1",
            address: Address::ZERO,
            security_zone: 0,
            chain_id: 1,
            expected: "00\
                0000000000000000000000000000000000000000\
                0000000000000000000000000000000000000000000000000000000000000001",
        },
        MetadataVector {
            name: "zone 3, arbitrum sepolia",
            address: Address::repeat_byte(0xaa),
            security_zone: 3,
            chain_id: 421614,
            expected: "03\
                aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\
                0000000000000000000000000000000000000000000000000000000000066eee",
        },
        MetadataVector {
            name: "zone 255, max chain id",
            address: Address::new([
                0xf3, 0x9f, 0xd6, 0xe5, 0x1a, 0xad, 0x88, 0xf6, 0xf4, 0xce, 0x6a, 0xb8, 0x82,
                0x72, 0x79, 0xcf, 0xff, 0xb9, 0x22, 0x66,
            ]),
            security_zone: 255,
            chain_id: u64::MAX,
            expected: "ff\
                f39fd6e51aad88f6f4ce6ab8827279cfffb92266\
                000000000000000000000000000000000000000000000000ffffffffffffffff",
        },
    ]
}

/// Known 4-byte function selectors.
pub fn selector_vectors() -> Vec<(&'static str, &'static str)> {
    vec![
        ("transfer(address,uint256)", "a9059cbb"),
        ("balanceOf(address)", "70a08231"),
        ("approve(address,uint256)", "095ea7b3"),
    ]
}

/// An EIP-712 permit golden vector.
#[derive(Debug, Clone)]
pub struct PermitVector {
    pub primary_type: SignaturePrimaryType,
    /// Expected `hashStruct(message)` (hex).
    pub struct_hash: &'static str,
    /// Expected signing digest (hex).
    pub signing_hash: &'static str,
}

/// Domain shared by every permit vector.
pub fn permit_vector_domain() -> Eip712Domain {
    Eip712Domain {
        name: "ACL".into(),
        version: "1".into(),
        chain_id: 421614,
        verifying_contract: Address::repeat_byte(0x44),
    }
}

/// Permission shared by every permit vector.
pub fn permit_vector_permission() -> Permission {
    Permission {
        issuer: Address::repeat_byte(0x11),
        expiration: 1_700_000_000,
        recipient: Address::repeat_byte(0x22),
        validator_id: 7,
        validator_contract: Address::repeat_byte(0x33),
        sealing_key: format!("0x{}", "cd".repeat(32)),
        issuer_signature: format!("0x{}", "ab".repeat(65)),
        recipient_signature: "0x".into(),
    }
}

/// Separator of [`permit_vector_domain`] (hex).
pub const PERMIT_VECTOR_DOMAIN_SEPARATOR: &str =
    "502099e0c8bfe18fbd2994f690be1a57563a5e98399e9cff9af728261a3070dc";

/// One vector per permit primary type.
pub fn permit_vectors() -> Vec<PermitVector> {
    vec![
        PermitVector {
            primary_type: SignaturePrimaryType::IssuerSelf,
            struct_hash: "d2a3290f76a962818dd6ec131a53aee8be9f7f3a51096bda06d2e42baccd2132",
            signing_hash: "b19d8c0753a5b509d90534aab10150ed65941070b186ef62d268b79f8ab3a759",
        },
        PermitVector {
            primary_type: SignaturePrimaryType::IssuerShared,
            struct_hash: "d2e8c7ab979b3748159aec9253ea5190cc2e08f1e90f6d01191c05bc154847f5",
            signing_hash: "9ec46bad5060e87a2564887f6c24e10df7176046208383ffbdc0107ec1d587d3",
        },
        PermitVector {
            primary_type: SignaturePrimaryType::Recipient,
            struct_hash: "c7ae93ff840f1120a8ae93328a21022dd6aad4cad55a0ba84f59a9ee32526a2f",
            signing_hash: "1a1a438e44c858149e2ed0925ab5540a1d45575dc054be89a79fe659b7024da2",
        },
    ]
}

/// Check every vector, returning `(name, matches, actual_hex)`.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    let metadata = metadata_vectors().into_iter().map(|v| {
        let actual = hex::encode(construct_zkpok_metadata(
            &v.address,
            v.security_zone,
            v.chain_id,
        ));
        (v.name.to_string(), actual == v.expected, actual)
    });

    let selectors = selector_vectors().into_iter().map(|(signature, expected)| {
        let actual = hex::encode(&keccak256(signature)[..4]);
        (signature.to_string(), actual == expected, actual)
    });

    let separator = {
        let actual = hex::encode(permit_vector_domain().separator());
        let matches = actual == PERMIT_VECTOR_DOMAIN_SEPARATOR;
        std::iter::once(("EIP712Domain separator".to_string(), matches, actual))
    };

    let permits = permit_vectors().into_iter().map(|v| {
        let name = v.primary_type.name().to_string();
        match TypedData::for_permission(
            permit_vector_domain(),
            v.primary_type,
            &permit_vector_permission(),
        ) {
            Ok(data) => {
                let struct_hash = hex::encode(data.struct_hash());
                let signing_hash = hex::encode(data.signing_hash());
                let matches = struct_hash == v.struct_hash && signing_hash == v.signing_hash;
                (name, matches, format!("{} {}", struct_hash, signing_hash))
            }
            Err(e) => (name, false, e.to_string()),
        }
    });

    metadata.chain(selectors).chain(separator).chain(permits).collect()
}
