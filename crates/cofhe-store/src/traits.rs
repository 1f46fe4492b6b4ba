//! Store traits: the abstract interface for permit and key persistence.
//!
//! Stores are explicit handles passed to the client, never globals, so
//! independent clients (and tests) never share state by accident.

use std::collections::BTreeMap;

use async_trait::async_trait;
use cofhe_core::Address;
use cofhe_perms::Permit;

use crate::error::{Result, StoreError};

/// Permits keyed by (chain id, account, permit hash), plus one active
/// permit hash per (chain id, account).
///
/// # Design Notes
///
/// - **Hash keyed**: permits are stored under [`Permit::get_hash`]; storing a
///   permit with the same hash replaces the previous one.
/// - **Active promotion**: removing the active permit makes another stored
///   permit active. Removing the only remaining active permit requires `force`.
/// - **Last writer wins**: concurrent `set_active_permit_hash` calls for the
///   same pair are not merged.
#[async_trait]
pub trait PermitStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Permits
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a stored permit by hash.
    async fn get_permit(
        &self,
        chain_id: u64,
        account: &Address,
        hash: &str,
    ) -> Result<Option<Permit>>;

    /// All permits stored for an account, keyed by hash.
    async fn get_permits(&self, chain_id: u64, account: &Address)
        -> Result<BTreeMap<String, Permit>>;

    /// Store a permit under its hash.
    async fn set_permit(&self, chain_id: u64, account: &Address, permit: &Permit) -> Result<()>;

    /// Remove a permit.
    ///
    /// # Errors
    /// - `CannotRemoveLastPermit` if `hash` is active, no other permit exists,
    ///   and `force` is false.
    async fn remove_permit(
        &self,
        chain_id: u64,
        account: &Address,
        hash: &str,
        force: bool,
    ) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Active Permit
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_active_permit_hash(&self, chain_id: u64, account: &Address)
        -> Result<Option<String>>;

    async fn set_active_permit_hash(&self, chain_id: u64, account: &Address, hash: &str)
        -> Result<()>;

    async fn remove_active_permit_hash(&self, chain_id: u64, account: &Address) -> Result<()>;

    /// The active permit, if one is selected and still stored.
    async fn get_active_permit(&self, chain_id: u64, account: &Address) -> Result<Option<Permit>> {
        match self.get_active_permit_hash(chain_id, account).await? {
            Some(hash) => self.get_permit(chain_id, account, &hash).await,
            None => Ok(None),
        }
    }
}

/// FHE network material: public keys per (chain id, security zone) and one
/// CRS per chain. Values are the hex strings the network returns.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn get_fhe_key(&self, chain_id: u64, security_zone: u8) -> Result<Option<String>>;

    async fn set_fhe_key(&self, chain_id: u64, security_zone: u8, key: &str) -> Result<()>;

    async fn get_crs(&self, chain_id: u64) -> Result<Option<String>>;

    async fn set_crs(&self, chain_id: u64, crs: &str) -> Result<()>;
}

/// What the active hash becomes when `removing` is deleted.
///
/// Returns `Ok(Some(next))` to promote another permit, `Ok(None)` to clear
/// the active hash (forced removal of the last permit).
pub(crate) fn active_after_removal<'a>(
    removing: &str,
    mut stored: impl Iterator<Item = &'a String>,
    force: bool,
) -> Result<Option<String>> {
    match stored.find(|h| h.as_str() != removing) {
        Some(next) => Ok(Some(next.clone())),
        None if force => Ok(None),
        None => Err(StoreError::CannotRemoveLastPermit {
            hash: removing.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_after_removal() {
        let hashes = vec!["0xa".to_string(), "0xb".to_string()];

        let next = active_after_removal("0xa", hashes.iter(), false).unwrap();
        assert_eq!(next.as_deref(), Some("0xb"));

        let only = vec!["0xa".to_string()];
        assert!(matches!(
            active_after_removal("0xa", only.iter(), false),
            Err(StoreError::CannotRemoveLastPermit { .. })
        ));
        assert_eq!(active_after_removal("0xa", only.iter(), true).unwrap(), None);
    }
}
