//! # CoFHE Core
//!
//! Pure primitives for the CoFHE client SDK: on-chain value types, FHE type
//! tags, encryptable inputs, the nested-input walks used by the encrypt
//! pipeline, and the ZkPoK metadata codec.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Address`] / [`U256`] - 20-byte addresses and 256-bit words (`alloy-primitives`)
//! - [`FheType`] - The encrypted type tag ("utype")
//! - [`EncryptableItem`] - A plaintext value tagged for encryption
//! - [`CoFheInItem`] - A verified ciphertext handle
//! - [`Shape`] - A nested input/output tree (leaf, sequence, record)
//!
//! ## Encrypt walks
//!
//! ```rust
//! use cofhe_core::{encrypt_extract, Encryptable, EncryptInput, Shape};
//!
//! let input: EncryptInput = Shape::sequence([
//!     Encryptable::uint128(100).into(),
//!     Shape::plain("memo"),
//! ]);
//! let items = encrypt_extract(&input);
//! assert_eq!(items.len(), 1);
//! ```

pub mod encryptable;
pub mod error;
pub mod shape;
pub mod types;
pub mod utype;
pub mod zkpok;

pub use encryptable::{CoFheInItem, Encryptable, EncryptableItem};
pub use error::{CoreError, Result};
pub use shape::{
    encrypt_extract, encrypt_replace, EncryptInput, EncryptOutput, InputLeaf, OutputLeaf, Shape,
};
pub use types::{
    address_to_u256, parse_address, parse_u256, u256_dec, Address, U256Ext, B256, U256,
};
pub use utype::{convert_via_utype, FheType, UnsealedValue};
pub use zkpok::{
    concat_sig_recid, construct_zkpok_metadata, parse_zkpok_metadata, MAX_RECOVERY_ID,
};
