//! # CoFHE Testkit
//!
//! Testing utilities for the CoFHE SDK.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: An in-process [`MockChain`], a [`LocalSigner`] producing
//!   real secp256k1 signatures, and a [`RecordingZk`] strategy
//! - **Generators**: Proptest strategies for items, nested inputs, and permits
//! - **Golden vectors**: Byte-exact ZkPoK metadata, function selectors, and
//!   EIP-712 permit digests
//!
//! ## Golden Vectors
//!
//! ```rust
//! use cofhe_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, actual) in verify_all_vectors() {
//!     assert!(matches, "{}: {}", name, actual);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use cofhe_testkit::generators::encrypt_input;
//! use cofhe_sdk::core::encrypt_extract;
//!
//! proptest! {
//!     #[test]
//!     fn extract_is_deterministic(input in encrypt_input()) {
//!         prop_assert_eq!(encrypt_extract(&input), encrypt_extract(&input));
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cofhe_sdk::{Cofhe, CofheConfig, Environment, InitializationParams};
//! use cofhe_sdk::store::MemoryStore;
//! use cofhe_testkit::{LocalSigner, MockChain};
//!
//! async fn example() {
//!     let chain = Arc::new(MockChain::new(31337));
//!     let signer = Arc::new(LocalSigner::random().connect(chain.clone()));
//!
//!     let mut client = Cofhe::new(
//!         MemoryStore::new(),
//!         CofheConfig::for_environment(Environment::Mock),
//!     )
//!     .unwrap();
//!     client
//!         .initialize(InitializationParams::new(chain).with_signer(signer))
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{LocalSigner, MockChain, RecordingZk, ZkCall, ZkStage, MOCK_ACL_ADDRESS};
pub use generators::{encrypt_input, encryptable_item, PermitCoreParams};
pub use vectors::{
    metadata_vectors, permit_vectors, selector_vectors, verify_all_vectors, MetadataVector,
    PermitVector,
};
