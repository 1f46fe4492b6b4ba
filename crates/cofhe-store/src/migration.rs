//! Database schema migrations for SQLite.
//!
//! Versioned: each migration transforms the schema from version N to N+1 and
//! is recorded in `schema_migrations`.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema. Idempotent.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "migrated store schema");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Permits, CBOR-encoded, keyed by content hash
        CREATE TABLE permits (
            chain_id INTEGER NOT NULL,
            account TEXT NOT NULL,            -- lowercase 0x address
            hash TEXT NOT NULL,               -- Permit::get_hash
            permit BLOB NOT NULL,             -- CBOR SerializedPermit
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (chain_id, account, hash)
        );

        -- One active permit per (chain, account)
        CREATE TABLE active_permits (
            chain_id INTEGER NOT NULL,
            account TEXT NOT NULL,
            hash TEXT NOT NULL,
            PRIMARY KEY (chain_id, account)
        );

        -- FHE network public keys
        CREATE TABLE fhe_keys (
            chain_id INTEGER NOT NULL,
            security_zone INTEGER NOT NULL,
            public_key TEXT NOT NULL,
            PRIMARY KEY (chain_id, security_zone)
        );

        -- Compact reference strings
        CREATE TABLE crs (
            chain_id INTEGER PRIMARY KEY,
            crs TEXT NOT NULL
        );
        "#,
    )?;

    Ok(())
}

/// Current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
