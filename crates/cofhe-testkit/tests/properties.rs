//! Property tests across the core and perms crates.

use proptest::prelude::*;

use cofhe_core::{
    encrypt_extract, encrypt_replace, Address, CoFheInItem, EncryptInput, EncryptOutput,
    InputLeaf, OutputLeaf, Shape, U256,
};
use cofhe_perms::{
    validate_fully_formed_permit, validate_permit_params, Permit, PermitOptions, SealingKey,
};
use cofhe_testkit::generators::{address, nonzero_address, u256};
use cofhe_testkit::{encrypt_input, PermitCoreParams};

fn in_items(n: usize) -> Vec<CoFheInItem> {
    (0..n)
        .map(|i| CoFheInItem {
            ct_hash: U256::from(i as u64 + 1),
            security_zone: 0,
            utype: cofhe_core::FheType::Uint8,
            signature: format!("0x{:02x}", i),
        })
        .collect()
}

/// Walk input and output together; every encryptable leaf must hold the next
/// handle and every other node must match.
fn check_replaced(
    input: &EncryptInput,
    output: &EncryptOutput,
    handles: &[CoFheInItem],
    next: &mut usize,
) -> Result<(), TestCaseError> {
    match (input, output) {
        (Shape::Leaf(InputLeaf::Encryptable(_)), Shape::Leaf(OutputLeaf::Encrypted(item))) => {
            prop_assert_eq!(item, &handles[*next]);
            *next += 1;
        }
        (Shape::Leaf(InputLeaf::Plain(a)), Shape::Leaf(OutputLeaf::Plain(b))) => {
            prop_assert_eq!(a, b);
        }
        (Shape::Sequence(a), Shape::Sequence(b)) => {
            prop_assert_eq!(a.len(), b.len());
            for (x, y) in a.iter().zip(b) {
                check_replaced(x, y, handles, next)?;
            }
        }
        (Shape::Record(a), Shape::Record(b)) => {
            prop_assert_eq!(a.len(), b.len());
            for ((ka, x), (kb, y)) in a.iter().zip(b) {
                prop_assert_eq!(ka, kb);
                check_replaced(x, y, handles, next)?;
            }
        }
        _ => prop_assert!(false, "shape mismatch"),
    }
    Ok(())
}

fn signed_sharing(params: &PermitCoreParams) -> Permit {
    let mut permit = Permit::create(&params.sharing_options()).unwrap();
    permit.issuer_signature = format!("0x{}", "11".repeat(65));
    permit
}

proptest! {
    #[test]
    fn extract_then_replace_preserves_shape(input in encrypt_input()) {
        let items = encrypt_extract(&input);
        let handles = in_items(items.len());

        let (output, remaining) = encrypt_replace(&input, handles.clone()).unwrap();
        prop_assert!(remaining.is_empty());

        let mut next = 0;
        check_replaced(&input, &output, &handles, &mut next)?;
        prop_assert_eq!(next, items.len());
    }

    #[test]
    fn replace_reports_surplus_handles(input in encrypt_input(), extra in 1usize..4) {
        let n = encrypt_extract(&input).len();
        let (_, remaining) = encrypt_replace(&input, in_items(n + extra)).unwrap();
        prop_assert_eq!(remaining.len(), extra);
    }

    #[test]
    fn permit_hash_ignores_name_and_signatures(params: PermitCoreParams, name in "[a-zA-Z ]{0,20}") {
        let permit = signed_sharing(&params);
        let mut renamed = permit.clone();
        renamed.update_name(name);
        renamed.issuer_signature = "0x".to_string();
        renamed.recipient_signature = format!("0x{}", "22".repeat(65));

        prop_assert_eq!(permit.get_hash(), renamed.get_hash());
    }

    #[test]
    fn permit_hash_tracks_core_fields(params: PermitCoreParams, other in nonzero_address()) {
        let permit = signed_sharing(&params);

        let mut changed = permit.clone();
        changed.expiration = permit.expiration.wrapping_add(1);
        prop_assert_ne!(permit.get_hash(), changed.get_hash());

        prop_assume!(other != permit.recipient);
        let mut changed = permit.clone();
        changed.recipient = other;
        prop_assert_ne!(permit.get_hash(), changed.get_hash());
    }

    #[test]
    fn half_set_validator_is_rejected(
        issuer in nonzero_address(),
        id in 0u64..1000,
        contract in address(),
    ) {
        let half_set = (id != 0) != !contract.is_zero();
        let options = PermitOptions::own(issuer).with_validator(id, contract);

        prop_assert_eq!(validate_permit_params(&options).is_err(), half_set);

        let full = options
            .with_name("p")
            .with_expiration(1)
            .with_recipient(Address::ZERO)
            .with_sealing_pair(SealingKey::generate())
            .with_issuer_signature("0x11")
            .with_recipient_signature("0x");
        if half_set {
            prop_assert!(validate_fully_formed_permit(&full).is_err());
        }
    }

    #[test]
    fn recipient_presence_follows_type(issuer in nonzero_address(), recipient in nonzero_address()) {
        let own_with_recipient = PermitOptions::own(issuer).with_recipient(recipient);
        prop_assert!(validate_permit_params(&own_with_recipient).is_err());

        let sharing_without_recipient = PermitOptions::sharing(issuer, Address::ZERO);
        prop_assert!(validate_permit_params(&sharing_without_recipient).is_err());

        prop_assert!(validate_permit_params(&PermitOptions::sharing(issuer, recipient)).is_ok());
    }

    #[test]
    fn seal_then_unseal_returns_value(value in u256()) {
        let key = SealingKey::generate();
        let sealed = SealingKey::seal(value, key.public_key()).unwrap();
        prop_assert_eq!(key.unseal(&sealed).unwrap(), value);
    }
}
