use std::io;
use std::path::{Path, PathBuf};

use blob::BlobError;
use codec::CodecError;
use config::ConfigError;
use schema::SchemaError;
use thiserror::Error;

/// Errors surfaced by [`Engine`](crate::Engine) operations.
///
/// File-access problems are classified into [`Error::FileNotFound`],
/// [`Error::PermissionDenied`] and [`Error::Io`], each carrying the path
/// that failed, whichever component hit them.
#[derive(Debug, Error)]
pub enum Error {
    /// The table definition is invalid. Never retried.
    #[error(transparent)]
    Schema(SchemaError),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Codec(CodecError),

    #[error(transparent)]
    Blob(BlobError),

    /// A row or changeset names a column the table does not have.
    #[error("table {table}: unknown column {column:?}")]
    UnknownColumn { table: String, column: String },

    /// The next auto-increment value would overflow `i64`.
    #[error("table {table}: auto-increment exhausted for column {column:?}")]
    AutoIncrementExhausted { table: String, column: String },

    #[error(transparent)]
    InvalidTable(#[from] ConfigError),
}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classifies an I/O failure on `path`.
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Error::PermissionDenied(path.to_path_buf()),
            _ => Error::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// True for the file-access family (`FileNotFound`, `PermissionDenied`, `Io`).
    #[must_use]
    pub fn is_file_access(&self) -> bool {
        matches!(
            self,
            Error::FileNotFound(_) | Error::PermissionDenied(_) | Error::Io { .. }
        )
    }
}

impl From<SchemaError> for Error {
    fn from(e: SchemaError) -> Self {
        match e {
            SchemaError::Io { path, source } => Error::io(&path, source),
            SchemaError::Table(c) => Error::InvalidTable(c),
            other => Error::Schema(other),
        }
    }
}

impl From<BlobError> for Error {
    fn from(e: BlobError) -> Self {
        match e {
            BlobError::Io { path, source } => Error::io(&path, source),
            BlobError::Table(c) => Error::InvalidTable(c),
            other => Error::Blob(other),
        }
    }
}

/// Codec I/O errors lack a path; call sites that read files map those
/// themselves with [`Error::io`].
impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}
