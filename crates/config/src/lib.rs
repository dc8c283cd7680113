//! # Config - FlatDB Storage Configuration
//!
//! Holds the explicit [`StorageConfig`] that every component receives at
//! construction time, and owns the on-disk layout of a table:
//!
//! ```text
//! <data_root>/
//!   <table>.table/
//!     definition     one column declaration per line
//!     data           fixed-width records, back-to-back
//!     data.tmp       scratch file used while rewriting `data`
//!     .lock          advisory lock held for the duration of an operation
//!     blobs/         one file per stored blob, named by its token
//! ```
//!
//! ## Environment
//!
//! ```text
//! FLATDB_DATA_ROOT   root directory holding `<table>.table` dirs  (default: "db")
//! FLATDB_SYNC        fsync appends and blob writes               (default: "true")
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Default data root used when `FLATDB_DATA_ROOT` is unset.
pub const DEFAULT_DATA_ROOT: &str = "db";

/// Suffix appended to a table name to form its directory name.
pub const TABLE_DIR_SUFFIX: &str = ".table";

const DEFINITION_FILENAME: &str = "definition";
const DATA_FILENAME: &str = "data";
const DATA_TMP_FILENAME: &str = "data.tmp";
const LOCK_FILENAME: &str = ".lock";
const BLOB_DIRNAME: &str = "blobs";

/// Errors produced while building a configuration or resolving table paths.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable expected to hold a boolean held something else.
    #[error("invalid boolean for {var}: {value:?} (expected true or false)")]
    InvalidBool { var: String, value: String },

    /// A table name that cannot be mapped safely onto a directory.
    #[error("invalid table name {0:?}")]
    InvalidTableName(String),
}

/// Storage settings shared by every engine component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    data_root: PathBuf,
    sync: bool,
}

impl StorageConfig {
    /// Creates a configuration rooted at `data_root` with `sync` enabled.
    pub fn new<P: AsRef<Path>>(data_root: P) -> Self {
        Self {
            data_root: data_root.as_ref().to_path_buf(),
            sync: true,
        }
    }

    /// Enables or disables `fsync` after appends and blob writes.
    #[must_use]
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Builds a configuration from `FLATDB_DATA_ROOT` and `FLATDB_SYNC`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup. `from_env` is this
    /// with the process environment plugged in.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_root = lookup("FLATDB_DATA_ROOT").unwrap_or_else(|| DEFAULT_DATA_ROOT.to_string());
        let sync = match lookup("FLATDB_SYNC") {
            Some(raw) => parse_bool("FLATDB_SYNC", &raw)?,
            None => true,
        };
        Ok(Self::new(data_root).with_sync(sync))
    }

    #[must_use]
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    #[must_use]
    pub fn sync(&self) -> bool {
        self.sync
    }

    /// Resolves the directory of `table`, rejecting names that would escape
    /// the data root.
    pub fn table_dir(&self, table: &str) -> Result<PathBuf, ConfigError> {
        validate_table_name(table)?;
        Ok(self.data_root.join(format!("{table}{TABLE_DIR_SUFFIX}")))
    }

    pub fn definition_path(&self, table: &str) -> Result<PathBuf, ConfigError> {
        Ok(self.table_dir(table)?.join(DEFINITION_FILENAME))
    }

    pub fn data_path(&self, table: &str) -> Result<PathBuf, ConfigError> {
        Ok(self.table_dir(table)?.join(DATA_FILENAME))
    }

    /// Scratch file a rewrite fills before renaming it over the data file.
    pub fn data_tmp_path(&self, table: &str) -> Result<PathBuf, ConfigError> {
        Ok(self.table_dir(table)?.join(DATA_TMP_FILENAME))
    }

    pub fn lock_path(&self, table: &str) -> Result<PathBuf, ConfigError> {
        Ok(self.table_dir(table)?.join(LOCK_FILENAME))
    }

    pub fn blob_dir(&self, table: &str) -> Result<PathBuf, ConfigError> {
        Ok(self.table_dir(table)?.join(BLOB_DIRNAME))
    }
}

/// Table names are limited to ASCII alphanumerics, `_` and `-`.
pub fn validate_table_name(table: &str) -> Result<(), ConfigError> {
    let ok = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidTableName(table.to_string()))
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var: var.to_string(),
            value: raw.to_string(),
        }),
    }
}
