//! # CoFHE Store
//!
//! Storage for permits and FHE network material. Provides trait-based
//! interfaces with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The client never holds permits or keys in globals; it is handed a store
//! that implements both [`PermitStore`] and [`KeyStore`]. [`SqliteStore`]
//! persists across restarts, [`MemoryStore`] lives as long as the client.
//!
//! ## Key Types
//!
//! - [`PermitStore`] - Permits and the active permit per (chain, account)
//! - [`KeyStore`] - FHE public keys per (chain, zone) and CRS per chain
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cofhe_store::{PermitStore, SqliteStore};
//! use cofhe_core::Address;
//!
//! async fn example(account: Address) {
//!     let store = SqliteStore::open("cofhe.db").unwrap();
//!
//!     if let Some(permit) = store.get_active_permit(1, &account).await.unwrap() {
//!         println!("active permit {}", permit.get_hash());
//!     }
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Content addressed**: permits are keyed by [`cofhe_perms::Permit::get_hash`]
//! - **Active promotion**: removing the active permit selects another one
//! - **CBOR on disk**: SQLite rows hold `SerializedPermit` as CBOR

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{KeyStore, PermitStore};
