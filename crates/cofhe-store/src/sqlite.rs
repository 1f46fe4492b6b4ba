//! SQLite implementation of the store traits.
//!
//! The persistent backend. Uses rusqlite with bundled SQLite, wrapped in async
//! via tokio::spawn_blocking. Permits are stored as CBOR-encoded
//! [`SerializedPermit`] blobs.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use cofhe_core::Address;
use cofhe_perms::{Permit, SerializedPermit};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{active_after_removal, KeyStore, PermitStore};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path, creating and migrating it
    /// if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` on the connection from the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            f(&mut *conn)
        })
        .await
        .map_err(|e| StoreError::InvalidData(format!("task join error: {}", e)))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|e| {
        StoreError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            Some(format!("mutex poisoned: {}", e)),
        ))
    })
}

// Chain ids are stored in SQLite's signed 64-bit integer column.
fn chain_key(chain_id: u64) -> i64 {
    chain_id as i64
}

fn account_key(account: &Address) -> String {
    account.to_string().to_ascii_lowercase()
}

fn encode_permit(permit: &Permit) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(&permit.serialize(), &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_permit(bytes: &[u8]) -> Result<Permit> {
    let serialized: SerializedPermit =
        ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(Permit::from(serialized))
}

fn stored_hashes(conn: &Connection, chain_id: i64, account: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT hash FROM permits WHERE chain_id = ?1 AND account = ?2 ORDER BY hash")?;
    let hashes = stmt
        .query_map(params![chain_id, account], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(hashes)
}

#[async_trait]
impl PermitStore for SqliteStore {
    async fn get_permit(
        &self,
        chain_id: u64,
        account: &Address,
        hash: &str,
    ) -> Result<Option<Permit>> {
        let account = account_key(account);
        let hash = hash.to_string();

        self.blocking(move |conn| {
            let blob: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT permit FROM permits WHERE chain_id = ?1 AND account = ?2 AND hash = ?3",
                    params![chain_key(chain_id), account, hash],
                    |row| row.get(0),
                )
                .optional()?;
            blob.map(|b| decode_permit(&b)).transpose()
        })
        .await
    }

    async fn get_permits(
        &self,
        chain_id: u64,
        account: &Address,
    ) -> Result<BTreeMap<String, Permit>> {
        let account = account_key(account);

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT hash, permit FROM permits WHERE chain_id = ?1 AND account = ?2",
            )?;
            let rows = stmt
                .query_map(params![chain_key(chain_id), account], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(hash, blob)| -> Result<(String, Permit)> { Ok((hash, decode_permit(&blob)?)) })
                .collect()
        })
        .await
    }

    async fn set_permit(&self, chain_id: u64, account: &Address, permit: &Permit) -> Result<()> {
        let account = account_key(account);
        let hash = permit.get_hash();
        let blob = encode_permit(permit)?;

        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO permits (chain_id, account, hash, permit, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![chain_key(chain_id), account, hash, blob, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove_permit(
        &self,
        chain_id: u64,
        account: &Address,
        hash: &str,
        force: bool,
    ) -> Result<()> {
        let account = account_key(account);
        let hash = hash.to_string();
        let chain = chain_key(chain_id);

        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            let hashes = stored_hashes(&tx, chain, &account)?;
            if hashes.is_empty() {
                return Ok(());
            }

            let active: Option<String> = tx
                .query_row(
                    "SELECT hash FROM active_permits WHERE chain_id = ?1 AND account = ?2",
                    params![chain, account],
                    |row| row.get(0),
                )
                .optional()?;

            if active.as_deref() == Some(hash.as_str()) {
                match active_after_removal(&hash, hashes.iter(), force)? {
                    Some(next) => {
                        tx.execute(
                            "UPDATE active_permits SET hash = ?3 WHERE chain_id = ?1 AND account = ?2",
                            params![chain, account, next],
                        )?;
                    }
                    None => {
                        tx.execute(
                            "DELETE FROM active_permits WHERE chain_id = ?1 AND account = ?2",
                            params![chain, account],
                        )?;
                    }
                }
            }

            tx.execute(
                "DELETE FROM permits WHERE chain_id = ?1 AND account = ?2 AND hash = ?3",
                params![chain, account, hash],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_active_permit_hash(
        &self,
        chain_id: u64,
        account: &Address,
    ) -> Result<Option<String>> {
        let account = account_key(account);

        self.blocking(move |conn| {
            let hash = conn
                .query_row(
                    "SELECT hash FROM active_permits WHERE chain_id = ?1 AND account = ?2",
                    params![chain_key(chain_id), account],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(hash)
        })
        .await
    }

    async fn set_active_permit_hash(
        &self,
        chain_id: u64,
        account: &Address,
        hash: &str,
    ) -> Result<()> {
        let account = account_key(account);
        let hash = hash.to_string();

        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO active_permits (chain_id, account, hash) VALUES (?1, ?2, ?3)",
                params![chain_key(chain_id), account, hash],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove_active_permit_hash(&self, chain_id: u64, account: &Address) -> Result<()> {
        let account = account_key(account);

        self.blocking(move |conn| {
            conn.execute(
                "DELETE FROM active_permits WHERE chain_id = ?1 AND account = ?2",
                params![chain_key(chain_id), account],
            )?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl KeyStore for SqliteStore {
    async fn get_fhe_key(&self, chain_id: u64, security_zone: u8) -> Result<Option<String>> {
        self.blocking(move |conn| {
            let key = conn
                .query_row(
                    "SELECT public_key FROM fhe_keys WHERE chain_id = ?1 AND security_zone = ?2",
                    params![chain_key(chain_id), security_zone],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(key)
        })
        .await
    }

    async fn set_fhe_key(&self, chain_id: u64, security_zone: u8, key: &str) -> Result<()> {
        let key = key.to_string();

        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO fhe_keys (chain_id, security_zone, public_key) VALUES (?1, ?2, ?3)",
                params![chain_key(chain_id), security_zone, key],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_crs(&self, chain_id: u64) -> Result<Option<String>> {
        self.blocking(move |conn| {
            let crs = conn
                .query_row(
                    "SELECT crs FROM crs WHERE chain_id = ?1",
                    params![chain_key(chain_id)],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(crs)
        })
        .await
    }

    async fn set_crs(&self, chain_id: u64, crs: &str) -> Result<()> {
        let crs = crs.to_string();

        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO crs (chain_id, crs) VALUES (?1, ?2)",
                params![chain_key(chain_id), crs],
            )?;
            Ok(())
        })
        .await
    }
}
