//! Per-table exclusive locking.
//!
//! Two layers, both held for the whole of one engine operation:
//!
//! 1. an in-process [`parking_lot::Mutex`] per table name, so threads sharing
//!    one `Engine` queue up without touching the filesystem;
//! 2. an OS advisory lock (`flock` / `LockFileEx` through `fs2`) on the
//!    table's `.lock` file, so separate processes exclude each other.
//!
//! The lock file lives next to `data` rather than being `data` itself:
//! rewrites rename a new file over `data`, and a lock on the old inode would
//! not exclude anyone opening the new one.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use tracing::{debug, error};

use crate::error::{Error, Result};

/// Registry of in-process table mutexes.
#[derive(Debug, Default)]
pub(crate) struct TableLocks {
    tables: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TableLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Blocks until this thread holds both the in-process and the file lock
    /// for `table`.
    pub(crate) fn acquire(&self, table: &str, lock_path: &Path) -> Result<TableGuard> {
        let local = {
            let mut tables = self.tables.lock();
            Arc::clone(tables.entry(table.to_string()).or_default())
        };
        let local = local.lock_arc();

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(lock_path)
            .map_err(|e| Error::io(lock_path, e))?;
        file.lock_exclusive().map_err(|e| Error::io(lock_path, e))?;

        debug!(table, "acquired table lock");
        Ok(TableGuard {
            file,
            path: lock_path.to_path_buf(),
            _local: local,
        })
    }
}

/// Held for the duration of one operation; releases both locks on drop.
pub(crate) struct TableGuard {
    file: File,
    path: PathBuf,
    _local: ArcMutexGuard<RawMutex, ()>,
}

impl Drop for TableGuard {
    fn drop(&mut self) {
        // Closing the handle releases the lock too; unlocking explicitly
        // lets a failure show up in the logs.
        if let Err(e) = FileExt::unlock(&self.file) {
            error!(path = %self.path.display(), error = %e, "failed to release table lock");
        }
    }
}
