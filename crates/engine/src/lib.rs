//! # Engine - FlatDB Table Engine
//!
//! The central orchestrator that ties together the [`schema`], [`codec`],
//! [`blob`] and [`predicate`] crates into a small relational-style store on
//! flat files.
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!   |
//!   v
//! ┌──────────────────────────────────────────────────┐
//! │                    ENGINE                        │
//! │                                                  │
//! │ lock table (in-process mutex + .lock flock)      │
//! │   |                                              │
//! │   v                                              │
//! │ Catalog::load(definition)  (fresh every call)    │
//! │   |                                              │
//! │   +-- read.rs    scan data -> decode -> resolve  │
//! │   |              blobs -> filter -> QueryResult  │
//! │   |                                              │
//! │   +-- write.rs   blobs -> encode -> append       │
//! │   |              truncate data + blobs/          │
//! │   |                                              │
//! │   +-- rewrite.rs scan -> filter/merge -> data.tmp│
//! │                  -> fsync -> rename over data    │
//! │                  -> evict stale blobs            │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module       | Purpose                                                |
//! |--------------|--------------------------------------------------------|
//! | [`lib.rs`]   | `Engine` struct, constructor, shared helpers, `Debug`  |
//! | [`read`]     | `select()`, `select_range()`, blob resolution          |
//! | [`write`]    | `insert()` with auto-increment, `truncate()`           |
//! | [`rewrite`]  | `delete()`, `update()`, atomic data-file replacement   |
//! | [`lock`]     | Per-table exclusive lock guard                         |
//! | [`result`]   | `QueryResult` rows/count/cursor/autos                  |
//! | [`error`]    | `Error` taxonomy                                       |
//!
//! ## On-Disk Table
//!
//! The engine never creates tables: `<table>.table/definition`, `data` and
//! `blobs/` must already exist. See [`config`] for the layout.
//!
//! ## Crash Safety
//!
//! Inserts append one whole record with a single `write_all`. Deletes and
//! updates write the new table to `data.tmp`, fsync it and rename it over
//! `data`; blob files are unlinked only after that rename, so a crash can
//! leak a blob file but never leaves a record pointing at a missing one.
mod error;
mod lock;
mod read;
mod result;
mod rewrite;
mod write;

use std::fs::File;
use std::path::Path;

use codec::{CodecError, RecordReader, Row, Value};
use lock::{TableGuard, TableLocks};
use schema::{Catalog, Column, Schema, Type};
use tracing::{error, warn};

pub use blob::{BlobError, BlobStore};
pub use codec::row;
pub use config::StorageConfig;
pub use error::{Error, Result};
pub use predicate::{Predicate, RowFilter};
pub use result::QueryResult;
pub use schema::SchemaError;

/// Re-exported value types so callers need only depend on `engine`.
pub mod types {
    pub use codec::{Row, Value};
    pub use schema::{Column, Schema, Type};
}

/// The table engine. Cheap to share: every method takes `&self` and
/// serializes per table internally.
pub struct Engine {
    pub(crate) config: StorageConfig,
    pub(crate) catalog: Catalog,
    pub(crate) blobs: BlobStore,
    locks: TableLocks,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("data_root", &self.config.data_root())
            .field("sync", &self.config.sync())
            .finish()
    }
}

impl Engine {
    /// Creates an engine over `config.data_root()`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileNotFound`] if the data root is not a directory.
    pub fn new(config: StorageConfig) -> Result<Self> {
        let root = config.data_root();
        if !root.is_dir() {
            return Err(Error::FileNotFound(root.to_path_buf()));
        }
        Ok(Self {
            catalog: Catalog::new(config.clone()),
            blobs: BlobStore::new(config.clone()),
            config,
            locks: TableLocks::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Loads the current schema of `table`.
    pub fn schema(&self, table: &str) -> Result<Schema> {
        let (_guard, schema) = self.open_table(table)?;
        Ok(schema)
    }

    /// Locks `table` and loads its schema under the lock.
    ///
    /// Every operation starts here, so a missing table directory or a bad
    /// definition fails the operation before anything is touched.
    pub(crate) fn open_table(&self, table: &str) -> Result<(TableGuard, Schema)> {
        let dir = self.config.table_dir(table)?;
        if !dir.is_dir() {
            return Err(Error::FileNotFound(dir));
        }
        let guard = self.locks.acquire(table, &self.config.lock_path(table)?)?;
        let schema = self.catalog.load(table)?;
        Ok((guard, schema))
    }

    /// Rejects keys that are not columns of `schema`.
    pub(crate) fn check_columns<'a, I>(&self, schema: &Schema, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a String>,
    {
        for key in keys {
            if schema.column(key).is_none() {
                return Err(Error::UnknownColumn {
                    table: schema.table().to_string(),
                    column: key.clone(),
                });
            }
        }
        Ok(())
    }

    /// Stores `value` as a new blob for `col` and returns its token, or
    /// `None` for a null value.
    pub(crate) fn store_blob(&self, table: &str, col: &Column, value: &Value) -> Result<Option<String>> {
        let payload: &[u8] = match value {
            Value::Null => return Ok(None),
            Value::Blob(bytes) => bytes,
            Value::Text(text) => text.as_bytes(),
            other => {
                return Err(Error::Codec(CodecError::TypeMismatch {
                    column: col.name.clone(),
                    ty: Type::Blob,
                    found: other.kind(),
                }))
            }
        };
        Ok(Some(self.blobs.put(table, payload)?))
    }

    /// Unlinks blobs whose records are gone. Already-missing files are
    /// logged and skipped.
    pub(crate) fn evict_blobs(&self, table: &str, tokens: &[String]) {
        for token in tokens {
            match self.blobs.delete(table, token) {
                Ok(()) => {}
                Err(BlobError::NotFound { .. }) => {
                    warn!(table, token = %token, "stale blob already missing");
                }
                Err(e) => {
                    error!(table, token = %token, error = %e, "failed to evict blob");
                }
            }
        }
    }
}

/// Blob tokens held by a stored (undecoded-blob) row.
pub(crate) fn blob_tokens(schema: &Schema, stored: &Row) -> Vec<String> {
    schema
        .blob_columns()
        .filter_map(|col| match stored.get(&col.name) {
            Some(Value::Text(token)) => Some(token.clone()),
            _ => None,
        })
        .collect()
}

/// Opens the data file for a scan.
pub(crate) fn open_reader(path: &Path, schema: &Schema) -> Result<RecordReader<File>> {
    RecordReader::open(path, schema.record_width()).map_err(|e| Error::io(path, e))
}

/// Reads the next whole record, treating a partial tail as end of scan.
pub(crate) fn next_record<'r>(
    reader: &'r mut RecordReader<File>,
    table: &str,
    path: &Path,
) -> Result<Option<&'r [u8]>> {
    match reader.next_record() {
        Ok(record) => Ok(record),
        Err(CodecError::TruncatedRecord {
            offset,
            got,
            expected,
        }) => {
            warn!(
                table,
                path = %path.display(),
                offset,
                got,
                expected,
                "data file ends with a partial record; stopping scan"
            );
            Ok(None)
        }
        Err(CodecError::Io(e)) => Err(Error::io(path, e)),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests;
