//! Proptest generators for property-based testing.

use proptest::prelude::*;

use cofhe_core::{Address, EncryptInput, EncryptableItem, FheType, U256};
use cofhe_perms::PermitOptions;

/// Generate a random address.
pub fn address() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>().prop_map(Address::new)
}

/// Generate a random non-zero address.
pub fn nonzero_address() -> impl Strategy<Value = Address> {
    address().prop_filter("non-zero", |a| !a.is_zero())
}

/// Generate a random 256-bit value.
pub fn u256() -> impl Strategy<Value = U256> {
    any::<[u8; 32]>().prop_map(U256::from_be_bytes)
}

/// Generate a utype that can be encrypted.
pub fn encryptable_utype() -> impl Strategy<Value = FheType> {
    prop_oneof![
        Just(FheType::Bool),
        Just(FheType::Uint8),
        Just(FheType::Uint16),
        Just(FheType::Uint32),
        Just(FheType::Uint64),
        Just(FheType::Uint128),
        Just(FheType::Uint160),
        Just(FheType::Uint256),
    ]
}

/// A value that fits `utype`'s bit width.
pub fn value_for(utype: FheType) -> impl Strategy<Value = U256> {
    let bits = utype.bit_width();
    any::<[u8; 32]>().prop_map(move |mut bytes| {
        let keep = bits as usize / 8;
        let clear = 32 - keep.max(1);
        for b in bytes.iter_mut().take(clear) {
            *b = 0;
        }
        if bits == 1 {
            bytes[31] &= 1;
        }
        U256::from_be_bytes(bytes)
    })
}

/// Generate an in-range encryptable item.
pub fn encryptable_item() -> impl Strategy<Value = EncryptableItem> {
    (encryptable_utype(), any::<u8>())
        .prop_flat_map(|(utype, zone)| {
            value_for(utype).prop_map(move |data| EncryptableItem {
                data,
                utype,
                security_zone: zone,
            })
        })
}

/// Generate a pass-through leaf.
pub fn plain_leaf() -> impl Strategy<Value = EncryptInput> {
    prop_oneof![
        any::<i64>().prop_map(EncryptInput::plain),
        "[a-z]{0,12}".prop_map(EncryptInput::plain),
        any::<bool>().prop_map(EncryptInput::plain),
    ]
}

/// Generate a nested input of bounded depth mixing encryptable and plain leaves.
pub fn encrypt_input() -> impl Strategy<Value = EncryptInput> {
    let leaf = prop_oneof![
        encryptable_item().prop_map(EncryptInput::from),
        plain_leaf(),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(EncryptInput::sequence),
            prop::collection::vec(("[a-z]{1,8}", inner), 0..6).prop_map(|fields| {
                // Record keys are unique, as in any object literal.
                let mut seen = std::collections::HashSet::new();
                EncryptInput::record(fields.into_iter().filter(|(k, _)| seen.insert(k.clone())))
            }),
        ]
    })
}

/// The hashed fields of a permit.
#[derive(Debug, Clone)]
pub struct PermitCoreParams {
    pub issuer: Address,
    pub expiration: u64,
    pub recipient: Address,
    pub validator: Option<(u64, Address)>,
}

impl Arbitrary for PermitCoreParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            nonzero_address(),
            1u64..=u64::MAX / 2,
            nonzero_address(),
            prop::option::of((1u64..=u64::MAX / 2, nonzero_address())),
        )
            .prop_map(|(issuer, expiration, recipient, validator)| PermitCoreParams {
                issuer,
                expiration,
                recipient,
                validator,
            })
            .boxed()
    }
}

impl PermitCoreParams {
    /// Options for a sharing permit with these fields.
    pub fn sharing_options(&self) -> PermitOptions {
        let options = PermitOptions::sharing(self.issuer, self.recipient)
            .with_expiration(self.expiration);
        match self.validator {
            Some((id, contract)) => options.with_validator(id, contract),
            None => options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_generated_items_are_in_range(item in encryptable_item()) {
            prop_assert!(item.validate().is_ok());
        }
    }
}
