//! # Blob - Out-of-Line Value Storage
//!
//! Large values do not fit in a fixed-width record, so each one lives in its
//! own file under the table's `blobs/` directory and the record stores only
//! the file's name (the *token*) in a 32-byte blob segment.
//!
//! ## Tokens
//!
//! A token is [`TOKEN_LEN`] lowercase hex characters drawn at random. Every
//! path built from a token is validated first, so a corrupted record can
//! never point the store outside its directory.
//!
//! ## File Contents
//!
//! The raw payload, with no header or envelope.
//!
//! ## Example
//!
//! ```rust,no_run
//! use blob::BlobStore;
//! use config::StorageConfig;
//!
//! let store = BlobStore::new(StorageConfig::new("db"));
//! let token = store.put("if_posts", b"hello world").unwrap();
//! assert_eq!(store.get("if_posts", &token).unwrap(), b"hello world");
//! store.delete("if_posts", &token).unwrap();
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use config::{ConfigError, StorageConfig};
use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

/// Number of hex characters in a blob token.
pub const TOKEN_LEN: usize = 16;

/// Upper bound on token draws before `put` gives up. Hitting it means the
/// directory is effectively full or something is badly wrong.
const MAX_TOKEN_ATTEMPTS: usize = 64;

/// Errors that can occur during blob operations.
#[derive(Debug, Error)]
pub enum BlobError {
    /// No blob file exists for the token.
    #[error("blob {token} not found in {}", dir.display())]
    NotFound { dir: PathBuf, token: String },

    /// The token is not `TOKEN_LEN` lowercase hex characters.
    #[error("invalid blob token {0:?}")]
    InvalidToken(String),

    #[error("invalid table: {0}")]
    Table(#[from] ConfigError),

    #[error("blob io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BlobError {
    fn io(path: &Path, source: io::Error) -> Self {
        BlobError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Stores, reads and removes blob files for every table under a data root.
#[derive(Debug, Clone)]
pub struct BlobStore {
    config: StorageConfig,
}

impl BlobStore {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Writes `payload` to a new blob file and returns its token.
    ///
    /// Candidate tokens are redrawn while a file of that name exists. The
    /// file is opened with `create_new`, so the existence check and the
    /// creation are a single atomic step.
    pub fn put(&self, table: &str, payload: &[u8]) -> Result<String, BlobError> {
        let dir = self.config.blob_dir(table)?;

        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token = generate_token();
            let path = dir.join(&token);

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(f) => f,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(table, token = %token, "blob token collision, redrawing");
                    continue;
                }
                Err(e) => return Err(BlobError::io(&path, e)),
            };

            let written = file.write_all(payload).and_then(|()| {
                if self.config.sync() {
                    file.sync_all()
                } else {
                    Ok(())
                }
            });
            if let Err(e) = written {
                drop(file);
                let _ = fs::remove_file(&path);
                return Err(BlobError::io(&path, e));
            }

            debug!(table, token = %token, bytes = payload.len(), "stored blob");
            return Ok(token);
        }

        Err(BlobError::io(
            &dir,
            io::Error::new(
                io::ErrorKind::Other,
                format!("no free blob token after {MAX_TOKEN_ATTEMPTS} attempts"),
            ),
        ))
    }

    /// Reads the payload stored under `token`.
    pub fn get(&self, table: &str, token: &str) -> Result<Vec<u8>, BlobError> {
        let (dir, path) = self.locate(table, token)?;
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BlobError::NotFound {
                dir,
                token: token.to_string(),
            },
            _ => BlobError::io(&path, e),
        })
    }

    /// Removes the blob file for `token`.
    ///
    /// Returns [`BlobError::NotFound`] when the file is already gone; callers
    /// evicting stale blobs treat that as a warning, not a failure.
    pub fn delete(&self, table: &str, token: &str) -> Result<(), BlobError> {
        let (dir, path) = self.locate(table, token)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(table, token, "deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BlobError::NotFound {
                dir,
                token: token.to_string(),
            }),
            Err(e) => Err(BlobError::io(&path, e)),
        }
    }

    /// Removes every file in the table's blob directory and returns how many
    /// were removed. Subdirectories are left alone.
    pub fn truncate(&self, table: &str) -> Result<usize, BlobError> {
        let dir = self.config.blob_dir(table)?;
        let entries = fs::read_dir(&dir).map_err(|e| BlobError::io(&dir, e))?;

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| BlobError::io(&dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| BlobError::io(&path, e))?;
            if file_type.is_dir() {
                warn!(table, path = %path.display(), "skipping directory inside blob dir");
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                // Raced with another remover; the end state is the same.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(BlobError::io(&path, e)),
            }
        }

        debug!(table, removed, "truncated blob directory");
        Ok(removed)
    }

    /// Returns whether a blob file exists for `token`.
    pub fn exists(&self, table: &str, token: &str) -> Result<bool, BlobError> {
        let (_, path) = self.locate(table, token)?;
        Ok(path.is_file())
    }

    fn locate(&self, table: &str, token: &str) -> Result<(PathBuf, PathBuf), BlobError> {
        if !is_valid_token(token) {
            return Err(BlobError::InvalidToken(token.to_string()));
        }
        let dir = self.config.blob_dir(table)?;
        let path = dir.join(token);
        Ok((dir, path))
    }
}

/// Draws a fresh random token.
#[must_use]
pub fn generate_token() -> String {
    let n: u64 = rand::thread_rng().gen();
    format!("{n:0width$x}", width = TOKEN_LEN)
}

/// True if `token` is exactly [`TOKEN_LEN`] lowercase hex characters.
#[must_use]
pub fn is_valid_token(token: &str) -> bool {
    token.len() == TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests;
