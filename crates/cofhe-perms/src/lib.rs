//! # CoFHE Permits
//!
//! Permits, their EIP-712 signatures, and the sealing keys that results are
//! resealed to.
//!
//! ## Overview
//!
//! Reading an encrypted value requires proving to the network that the
//! reader is allowed to. That proof is a [`Permit`]: a small signed record
//! naming an issuer, an optional recipient, an expiration, and an optional
//! external validator. Each permit carries a [`SealingKey`]; the network
//! reseals plaintexts to its public half so only the permit holder can read
//! them.
//!
//! ## Key Types
//!
//! - [`Permit`] - A permit with its sealing pair and signatures
//! - [`PermitOptions`] - Loose creation/import input, validated field by field
//! - [`Permission`] - The wire projection sent with decrypt requests
//! - [`SealingKey`] - NaCl box keypair for resealed results
//! - [`TypedData`] - EIP-712 signing payload
//! - [`Provider`] / [`Signer`] - Injected chain collaborators
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cofhe_perms::{Permit, PermitOptions, Provider, Signer};
//! use cofhe_core::Address;
//!
//! async fn example(provider: &dyn Provider, signer: &dyn Signer, me: Address) {
//!     let options = PermitOptions::own(me).with_name("dashboard");
//!     let permit = Permit::create_and_sign(&options, provider, Some(signer))
//!         .await
//!         .unwrap();
//!
//!     let permission = permit.get_permission(false).unwrap();
//!     println!("{} -> {}", permit.get_hash(), permission.sealing_key);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Hash stability**: [`Permit::get_hash`] excludes the name, signatures,
//!   and sealing pair, so a permit keeps its identity through signing.
//! - **Domain binding**: the signing domain is stamped on the permit; a later
//!   ACL redeployment makes [`Permit::check_signed_domain_valid`] fail.

pub mod chain;
pub mod eip712;
pub mod error;
pub mod permission;
pub mod permit;
pub mod sealing;
pub mod validation;

pub use chain::{call_and_decode, CallRequest, Provider, Signer, TransactionRequest};
pub use eip712::{
    fetch_eip712_domain, Eip712Domain, PermitMessage, SignaturePrimaryType, TypedData, TypedField,
    TASK_MANAGER_ADDRESS,
};
pub use error::{PermsError, Result};
pub use permission::{decode_hex, Permission};
pub use permit::{Permit, PermitType, PermitValidity, SerializedPermit};
pub use sealing::{EthEncryptedData, SealingKey};
pub use validation::{
    validate_fully_formed_permit, validate_permit, validate_permit_params, PermitOptions,
    PermitParams, ValidationErrors, ValidationIssue, ValidationRules, DEFAULT_EXPIRATION,
    DEFAULT_PERMIT_NAME, EMPTY_SIGNATURE,
};
