//! Snapshot store contract and implementations.
//!
//! # Responsibility
//! - Persist the whole snapshot collection under one key as a JSON array.
//! - Keep encoding and SQL details behind the `SchemaStore` boundary.
//!
//! # Invariants
//! - `save_all` replaces the whole collection; there is no incremental write.
//! - A missing key or undecodable value reads back as an empty collection.
//! - Stored values are the JSON array text, identical across backends.
//! - Tree depth is unbounded; a value is only written after it decodes back.

use crate::db::storage::{kv_table_exists, storage_version, KV_TABLE, STORAGE_VERSION};
use crate::db::DbError;
use crate::model::snapshot::SchemaSnapshot;
use log::{error, info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use std::cell::RefCell;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Key the snapshot collection is stored under unless configured otherwise.
pub const DEFAULT_STORE_KEY: &str = "jsonSchemas";

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from snapshot store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Collection could not be encoded to JSON.
    Encode(serde_json::Error),
    /// Encoded collection does not decode back; nothing was written.
    Unreadable(serde_json::Error),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Store key is blank.
    InvalidKey,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "failed to encode snapshots: {err}"),
            Self::Unreadable(err) => {
                write!(f, "encoded snapshots cannot be read back: {err}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "schema store requires storage version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "schema store requires table `{table}`")
            }
            Self::InvalidKey => write!(f, "schema store key must not be blank"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::Unreadable(err) => Some(err),
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::InvalidKey => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable collection of saved snapshots.
pub trait SchemaStore {
    /// Loads the persisted collection, empty when absent or corrupt.
    fn load_all(&self) -> StoreResult<Vec<SchemaSnapshot>>;
    /// Overwrites the persisted collection.
    fn save_all(&self, snapshots: &[SchemaSnapshot]) -> StoreResult<()>;
}

impl<S: SchemaStore + ?Sized> SchemaStore for &S {
    fn load_all(&self) -> StoreResult<Vec<SchemaSnapshot>> {
        (**self).load_all()
    }

    fn save_all(&self, snapshots: &[SchemaSnapshot]) -> StoreResult<()> {
        (**self).save_all(snapshots)
    }
}

/// Encodes a collection as the stored JSON array text.
///
/// # Errors
/// - `Unreadable` when the text would not decode back into `snapshots`, so
///   a stored collection is never replaced by one that reads as empty.
pub fn encode_snapshots(snapshots: &[SchemaSnapshot]) -> StoreResult<String> {
    let encoded = serde_json::to_string(snapshots).map_err(StoreError::Encode)?;
    if let Err(err) = read_snapshots(&encoded) {
        error!(
            "event=store_encode module=store status=error reason=unreadable count={} bytes={}",
            snapshots.len(),
            encoded.len()
        );
        return Err(StoreError::Unreadable(err));
    }
    Ok(encoded)
}

/// Decodes stored JSON array text.
///
/// Absent or malformed input degrades to an empty collection.
pub fn decode_snapshots(raw: Option<&str>) -> Vec<SchemaSnapshot> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match read_snapshots(raw) {
        Ok(snapshots) => snapshots,
        Err(err) => {
            warn!(
                "event=store_decode module=store status=degraded reason=malformed_value bytes={} line={} column={}",
                raw.len(),
                err.line(),
                err.column()
            );
            Vec::new()
        }
    }
}

/// Parses stored text with serde_json's nesting limit disabled.
fn read_snapshots(raw: &str) -> serde_json::Result<Vec<SchemaSnapshot>> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    deserializer.disable_recursion_limit();
    let snapshots = Vec::<SchemaSnapshot>::deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(snapshots)
}

/// SQLite-backed store keeping the collection in one `kv_entries` row.
pub struct SqliteSchemaStore<'conn> {
    conn: &'conn Connection,
    key: String,
}

impl<'conn> SqliteSchemaStore<'conn> {
    /// Creates a store over a migrated connection using `DEFAULT_STORE_KEY`.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        Self::try_with_key(conn, DEFAULT_STORE_KEY)
    }

    /// Creates a store over a migrated connection using a custom key.
    pub fn try_with_key(conn: &'conn Connection, key: impl Into<String>) -> StoreResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(StoreError::InvalidKey);
        }
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn, key })
    }

    pub fn key(&self) -> &str {
        self.key.as_str()
    }
}

impl SchemaStore for SqliteSchemaStore<'_> {
    fn load_all(&self) -> StoreResult<Vec<SchemaSnapshot>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [self.key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let snapshots = decode_snapshots(raw.as_deref());
        info!(
            "event=store_load module=store status=ok backend=sqlite count={}",
            snapshots.len()
        );
        Ok(snapshots)
    }

    fn save_all(&self, snapshots: &[SchemaSnapshot]) -> StoreResult<()> {
        let encoded = encode_snapshots(snapshots)?;
        self.conn.execute(
            "INSERT INTO kv_entries (key, value)
             VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![self.key.as_str(), encoded],
        )?;
        info!(
            "event=store_save module=store status=ok backend=sqlite count={} bytes={}",
            snapshots.len(),
            encoded.len()
        );
        Ok(())
    }
}

/// In-process store holding the encoded collection text.
///
/// Shares the encode/decode path with durable backends, so it doubles as the
/// test fake and can be seeded with arbitrary stored text.
#[derive(Debug, Default)]
pub struct InMemorySchemaStore {
    raw: RefCell<Option<String>>,
}

impl InMemorySchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose persisted value is `raw`, valid or not.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: RefCell::new(Some(raw.into())),
        }
    }

    /// Returns the persisted value, if any.
    pub fn raw(&self) -> Option<String> {
        self.raw.borrow().clone()
    }
}

impl SchemaStore for InMemorySchemaStore {
    fn load_all(&self) -> StoreResult<Vec<SchemaSnapshot>> {
        Ok(decode_snapshots(self.raw.borrow().as_deref()))
    }

    fn save_all(&self, snapshots: &[SchemaSnapshot]) -> StoreResult<()> {
        let encoded = encode_snapshots(snapshots)?;
        self.raw.replace(Some(encoded));
        Ok(())
    }
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let actual_version = storage_version(conn)?;
    if actual_version != STORAGE_VERSION {
        return Err(StoreError::UninitializedConnection {
            expected_version: STORAGE_VERSION,
            actual_version,
        });
    }
    if !kv_table_exists(conn)? {
        return Err(StoreError::MissingRequiredTable(KV_TABLE));
    }
    Ok(())
}
