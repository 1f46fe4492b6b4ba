//! In-memory implementation of the store traits.
//!
//! Same semantics as SQLite but nothing is persisted. The default store for
//! short-lived clients and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use cofhe_core::Address;
use cofhe_perms::Permit;

use crate::error::{Result, StoreError};
use crate::traits::{active_after_removal, KeyStore, PermitStore};

type AccountKey = (u64, Address);

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Permits per account, keyed by hash.
    permits: HashMap<AccountKey, BTreeMap<String, Permit>>,

    /// Active permit hash per account.
    active: HashMap<AccountKey, String>,

    /// FHE public keys by (chain id, security zone).
    fhe_keys: HashMap<(u64, u8), String>,

    /// CRS by chain id.
    crs: HashMap<u64, String>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PermitStore for MemoryStore {
    async fn get_permit(
        &self,
        chain_id: u64,
        account: &Address,
        hash: &str,
    ) -> Result<Option<Permit>> {
        let inner = self.read()?;
        Ok(inner
            .permits
            .get(&(chain_id, *account))
            .and_then(|permits| permits.get(hash))
            .cloned())
    }

    async fn get_permits(
        &self,
        chain_id: u64,
        account: &Address,
    ) -> Result<BTreeMap<String, Permit>> {
        let inner = self.read()?;
        Ok(inner
            .permits
            .get(&(chain_id, *account))
            .cloned()
            .unwrap_or_default())
    }

    async fn set_permit(&self, chain_id: u64, account: &Address, permit: &Permit) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .permits
            .entry((chain_id, *account))
            .or_default()
            .insert(permit.get_hash(), permit.clone());
        Ok(())
    }

    async fn remove_permit(
        &self,
        chain_id: u64,
        account: &Address,
        hash: &str,
        force: bool,
    ) -> Result<()> {
        let mut inner = self.write()?;
        let key = (chain_id, *account);

        let Some(permits) = inner.permits.get(&key).filter(|p| !p.is_empty()) else {
            return Ok(());
        };

        if inner.active.get(&key).map(String::as_str) == Some(hash) {
            match active_after_removal(hash, permits.keys(), force)? {
                Some(next) => {
                    inner.active.insert(key, next);
                }
                None => {
                    inner.active.remove(&key);
                }
            }
        }

        if let Some(permits) = inner.permits.get_mut(&key) {
            permits.remove(hash);
        }
        Ok(())
    }

    async fn get_active_permit_hash(
        &self,
        chain_id: u64,
        account: &Address,
    ) -> Result<Option<String>> {
        let inner = self.read()?;
        Ok(inner.active.get(&(chain_id, *account)).cloned())
    }

    async fn set_active_permit_hash(
        &self,
        chain_id: u64,
        account: &Address,
        hash: &str,
    ) -> Result<()> {
        let mut inner = self.write()?;
        inner.active.insert((chain_id, *account), hash.to_string());
        Ok(())
    }

    async fn remove_active_permit_hash(&self, chain_id: u64, account: &Address) -> Result<()> {
        let mut inner = self.write()?;
        inner.active.remove(&(chain_id, *account));
        Ok(())
    }
}

#[async_trait]
impl KeyStore for MemoryStore {
    async fn get_fhe_key(&self, chain_id: u64, security_zone: u8) -> Result<Option<String>> {
        let inner = self.read()?;
        Ok(inner.fhe_keys.get(&(chain_id, security_zone)).cloned())
    }

    async fn set_fhe_key(&self, chain_id: u64, security_zone: u8, key: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .fhe_keys
            .insert((chain_id, security_zone), key.to_string());
        Ok(())
    }

    async fn get_crs(&self, chain_id: u64) -> Result<Option<String>> {
        let inner = self.read()?;
        Ok(inner.crs.get(&chain_id).cloned())
    }

    async fn set_crs(&self, chain_id: u64, crs: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner.crs.insert(chain_id, crs.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cofhe_perms::PermitOptions;

    fn account() -> Address {
        Address::repeat_byte(0x11)
    }

    fn permit(name: &str, expiration: u64) -> Permit {
        Permit::create(
            &PermitOptions::own(account())
                .with_name(name)
                .with_expiration(expiration),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();
        let p = permit("a", 10);
        let hash = p.get_hash();

        store.set_permit(1, &account(), &p).await.unwrap();

        let retrieved = store.get_permit(1, &account(), &hash).await.unwrap().unwrap();
        assert_eq!(retrieved, p);

        // Scoped by chain and account
        assert!(store.get_permit(2, &account(), &hash).await.unwrap().is_none());
        assert!(store
            .get_permit(1, &Address::repeat_byte(0x22), &hash)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_memory_store_active_permit() {
        let store = MemoryStore::new();
        let p = permit("a", 10);

        store.set_permit(1, &account(), &p).await.unwrap();
        assert!(store.get_active_permit(1, &account()).await.unwrap().is_none());

        store
            .set_active_permit_hash(1, &account(), &p.get_hash())
            .await
            .unwrap();
        assert_eq!(store.get_active_permit(1, &account()).await.unwrap(), Some(p));

        store.remove_active_permit_hash(1, &account()).await.unwrap();
        assert!(store.get_active_permit_hash(1, &account()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_remove_promotes_other() {
        let store = MemoryStore::new();
        let a = permit("a", 10);
        let b = permit("b", 20);

        store.set_permit(1, &account(), &a).await.unwrap();
        store.set_permit(1, &account(), &b).await.unwrap();
        store
            .set_active_permit_hash(1, &account(), &a.get_hash())
            .await
            .unwrap();

        store
            .remove_permit(1, &account(), &a.get_hash(), false)
            .await
            .unwrap();

        assert_eq!(
            store.get_active_permit_hash(1, &account()).await.unwrap(),
            Some(b.get_hash())
        );
        assert_eq!(store.get_permits(1, &account()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_remove_last_requires_force() {
        let store = MemoryStore::new();
        let a = permit("a", 10);
        let hash = a.get_hash();

        store.set_permit(1, &account(), &a).await.unwrap();
        store.set_active_permit_hash(1, &account(), &hash).await.unwrap();

        let err = store.remove_permit(1, &account(), &hash, false).await.unwrap_err();
        assert!(matches!(err, StoreError::CannotRemoveLastPermit { .. }));
        assert!(store.get_permit(1, &account(), &hash).await.unwrap().is_some());

        store.remove_permit(1, &account(), &hash, true).await.unwrap();
        assert!(store.get_permit(1, &account(), &hash).await.unwrap().is_none());
        assert!(store.get_active_permit_hash(1, &account()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_remove_inactive() {
        let store = MemoryStore::new();
        let a = permit("a", 10);

        store.set_permit(1, &account(), &a).await.unwrap();
        store
            .remove_permit(1, &account(), &a.get_hash(), false)
            .await
            .unwrap();
        assert!(store.get_permits(1, &account()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_keys() {
        let store = MemoryStore::new();
        assert!(store.get_fhe_key(1, 0).await.unwrap().is_none());

        store.set_fhe_key(1, 0, "0xaa").await.unwrap();
        store.set_fhe_key(1, 1, "0xbb").await.unwrap();
        store.set_crs(1, "0xcc").await.unwrap();

        assert_eq!(store.get_fhe_key(1, 0).await.unwrap().as_deref(), Some("0xaa"));
        assert_eq!(store.get_fhe_key(1, 1).await.unwrap().as_deref(), Some("0xbb"));
        assert_eq!(store.get_crs(1).await.unwrap().as_deref(), Some("0xcc"));
        assert!(store.get_crs(2).await.unwrap().is_none());
    }
}
