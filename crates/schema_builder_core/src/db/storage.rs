//! Key-value storage layout.
//!
//! # Responsibility
//! - Create the `kv_entries` table on fresh databases.
//! - Answer whether a connection carries the layout stores expect.
//!
//! # Invariants
//! - `PRAGMA user_version` equals `STORAGE_VERSION` once the table exists.
//! - Databases stamped with a newer version are never modified.

use super::{DbError, DbResult};
use log::info;
use rusqlite::Connection;
use std::cmp::Ordering;

/// Layout version written to `PRAGMA user_version`.
pub const STORAGE_VERSION: u32 = 1;

/// Table holding one JSON value per key.
pub const KV_TABLE: &str = "kv_entries";

const CREATE_KV_TABLE: &str = include_str!("kv_entries.sql");

/// Reads the layout version stamped on `conn`.
pub fn storage_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Returns whether the key-value table exists on `conn`.
pub fn kv_table_exists(conn: &Connection) -> DbResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
        [KV_TABLE],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Brings an unversioned database to `STORAGE_VERSION`.
///
/// # Errors
/// - `UnsupportedStorageVersion` when the file was written by a newer build.
pub(crate) fn prepare_storage(conn: &mut Connection) -> DbResult<()> {
    let found = storage_version(conn)?;
    match found.cmp(&STORAGE_VERSION) {
        Ordering::Greater => Err(DbError::UnsupportedStorageVersion {
            found,
            supported: STORAGE_VERSION,
        }),
        Ordering::Equal => Ok(()),
        Ordering::Less => {
            let tx = conn.transaction()?;
            tx.execute_batch(CREATE_KV_TABLE)?;
            tx.pragma_update(None, "user_version", STORAGE_VERSION)?;
            tx.commit()?;
            info!(
                "event=storage_prepare module=db status=ok from_version={found} to_version={STORAGE_VERSION}"
            );
            Ok(())
        }
    }
}
