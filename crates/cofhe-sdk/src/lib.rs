//! # CoFHE SDK
//!
//! The unified client for CoFHE: encrypted inputs, permits, and decryption of
//! confidential on-chain values.
//!
//! ## Overview
//!
//! The SDK provides:
//!
//! - **Encrypt**: Extract the encryptable leaves of a nested input, pack and
//!   prove them, get them signed by the verifier, and put the verified handles
//!   back in place
//! - **Permits**: Create, sign, import, select and remove the permits that
//!   authorize reading encrypted values
//! - **Decrypt**: Reseal a ciphertext to a permit's sealing key, or have the
//!   threshold network decrypt it outright
//! - **Mock chains**: The same operations against in-chain mock contracts,
//!   detected automatically on initialize
//! - **Lux FHE**: A standalone client for Lux FHE servers with threshold
//!   decryption ([`LuxFheClient`])
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cofhe_sdk::{Cofhe, CofheConfig, Environment, InitializationParams};
//! use cofhe_sdk::core::FheType;
//! use cofhe_sdk::perms::{Provider, Signer};
//! use cofhe_sdk::store::SqliteStore;
//!
//! async fn example(provider: Arc<dyn Provider>, signer: Arc<dyn Signer>) {
//!     let store = SqliteStore::open("cofhe.db").unwrap();
//!     let mut client =
//!         Cofhe::new(store, CofheConfig::for_environment(Environment::Testnet)).unwrap();
//!
//!     // Fetches FHE keys and creates a self permit if none is active
//!     let permit = client
//!         .initialize(InitializationParams::new(provider).with_signer(signer))
//!         .await
//!         .unwrap();
//!
//!     // Read an encrypted balance
//!     // let value = client.unseal(ct_hash, FheType::Uint64, None, None).await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `cofhe_sdk::core` - Primitives, utypes, input shapes, ZkPoK metadata
//! - `cofhe_sdk::perms` - Sealing keys, permits, EIP-712, chain traits
//! - `cofhe_sdk::store` - Permit and key stores

pub mod client;
pub mod config;
pub mod encrypt;
pub mod error;
pub mod luxd;
pub mod mock;
pub mod network;
pub mod verifier;
pub mod zk;

// Re-export component crates
pub use cofhe_core as core;
pub use cofhe_perms as perms;
pub use cofhe_store as store;

// Re-export main types for convenience
pub use client::{Cofhe, EncryptKeys, InitializationParams};
pub use config::{CofheConfig, Environment, MockConfig};
pub use encrypt::{EncryptInputsBuilder, EncryptStep, StepCallback};
pub use error::{CofheError, ErrorCode, Result};
pub use luxd::{LuxFheClient, LuxFheConfig};
pub use mock::MockZkVerifier;
pub use network::{Decrypted, KeyServerClient, NetworkKeys, ThresholdNetworkClient};
pub use verifier::ZkVerifierClient;
pub use zk::{CompactListStrategy, VerifyResult, ZkStrategy};

// Re-export commonly used core types
pub use cofhe_core::{
    Address, CoFheInItem, Encryptable, EncryptableItem, EncryptInput, EncryptOutput, FheType,
    Shape, U256Ext, UnsealedValue, U256,
};
pub use cofhe_perms::{Permission, Permit, PermitOptions, PermitType, SealingKey};
