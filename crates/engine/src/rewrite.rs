/// Rewrite path: `delete()` and `update()`.
///
/// Both stream the data file record by record into `data.tmp`, dropping or
/// re-encoding the rows the filter matches and copying the rest byte for
/// byte. The temp file is flushed, fsynced and renamed over `data`, and
/// only then are stale blob files unlinked. A failure before the rename
/// leaves `data` untouched.
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use blob::BlobError;
use codec::{Row, Value};
use predicate::RowFilter;
use schema::{Schema, Type};
use tracing::{debug, info, warn};

use crate::{blob_tokens, next_record, open_reader, Engine, Error, Result};

/// A replacement data file being written next to the live one.
struct DataRewrite {
    tmp_path: PathBuf,
    final_path: PathBuf,
    writer: BufWriter<File>,
    sync: bool,
}

impl DataRewrite {
    fn begin(tmp_path: PathBuf, final_path: PathBuf, sync: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|e| Error::io(&tmp_path, e))?;
        Ok(Self {
            tmp_path,
            final_path,
            writer: BufWriter::new(file),
            sync,
        })
    }

    fn push(&mut self, record: &[u8]) -> Result<()> {
        self.writer
            .write_all(record)
            .map_err(|e| Error::io(&self.tmp_path, e))
    }

    /// Makes the temp file durable and swaps it in for `data`.
    fn commit(mut self) -> Result<()> {
        let tmp_path = self.tmp_path.clone();
        let finished = self.finish();
        if let Err(e) = finished {
            remove_tmp(&tmp_path);
            return Err(e);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| Error::io(&self.tmp_path, e))?;
        if self.sync {
            self.writer
                .get_ref()
                .sync_all()
                .map_err(|e| Error::io(&self.tmp_path, e))?;
        }
        fs::rename(&self.tmp_path, &self.final_path).map_err(|e| Error::io(&self.final_path, e))?;

        // Persist the rename itself. `data` is already replaced at this
        // point, so a failure here is reported but does not fail the rewrite.
        if self.sync {
            if let Some(parent) = self.final_path.parent() {
                if let Err(e) = sync_dir(parent) {
                    warn!(path = %parent.display(), error = %e, "failed to sync table directory after rename");
                }
            }
        }
        Ok(())
    }

    /// Throws the temp file away; `data` is left as it was.
    fn abort(self) {
        let Self { tmp_path, writer, .. } = self;
        drop(writer);
        remove_tmp(&tmp_path);
    }
}

pub(crate) fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

fn remove_tmp(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove temp data file");
        }
    }
}

impl Engine {
    /// Removes every row of `table` accepted by `filter` (every row when
    /// `filter` is `None`) and unlinks the blobs those rows referenced.
    ///
    /// Returns the number of rows removed. When nothing matches, the data
    /// file is not rewritten.
    ///
    /// # Errors
    ///
    /// Same file-access and schema errors as [`select`](Engine::select),
    /// plus any failure writing or renaming the replacement data file.
    pub fn delete(&self, table: &str, filter: Option<&dyn RowFilter>) -> Result<usize> {
        let (_guard, schema) = self.open_table(table)?;
        let path = self.config.data_path(table)?;
        let mut reader = open_reader(&path, &schema)?;
        let mut out = DataRewrite::begin(self.config.data_tmp_path(table)?, path.clone(), self.config.sync())?;

        let mut removed = 0usize;
        let mut stale = Vec::new();
        let scanned = (|| -> Result<()> {
            while let Some(record) = next_record(&mut reader, table, &path)? {
                let stored = codec::decode(&schema, record)?;
                let hit = match filter {
                    None => true,
                    Some(_) => {
                        let row = self.filter_view(table, &schema, stored.clone())?;
                        predicate::matches(filter, &row)
                    }
                };
                if hit {
                    removed += 1;
                    stale.extend(blob_tokens(&schema, &stored));
                } else {
                    out.push(record)?;
                }
            }
            Ok(())
        })();

        if let Err(e) = scanned {
            out.abort();
            return Err(e);
        }
        if removed == 0 {
            out.abort();
            debug!(table, "delete matched no rows");
            return Ok(0);
        }

        out.commit()?;
        self.evict_blobs(table, &stale);
        info!(table, removed, blobs_removed = stale.len(), "deleted rows");
        Ok(removed)
    }

    /// Applies `changes` to every row of `table` accepted by `filter` (every
    /// row when `filter` is `None`). Columns not named in `changes` keep
    /// their stored bytes untouched.
    ///
    /// A changed blob column gets a fresh blob file; the old one is unlinked
    /// once the new data file is in place. Returns the number of rows
    /// updated.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownColumn`] if `changes` names a column the table lacks.
    /// - [`Error::Codec`] if a new value does not fit its column.
    /// - The file-access errors of [`delete`](Engine::delete).
    ///
    /// On error the data file is unchanged and any blobs written for the
    /// new values are removed again.
    pub fn update(&self, table: &str, changes: &Row, filter: Option<&dyn RowFilter>) -> Result<usize> {
        let (_guard, schema) = self.open_table(table)?;
        self.check_columns(&schema, changes.keys())?;

        let path = self.config.data_path(table)?;
        let mut reader = open_reader(&path, &schema)?;
        let mut out = DataRewrite::begin(self.config.data_tmp_path(table)?, path.clone(), self.config.sync())?;

        let mut updated = 0usize;
        let mut stale = Vec::new();
        let mut new_tokens = Vec::new();
        let scanned = (|| -> Result<()> {
            while let Some(record) = next_record(&mut reader, table, &path)? {
                let stored = codec::decode(&schema, record)?;
                let hit = match filter {
                    None => true,
                    Some(_) => {
                        let row = self.filter_view(table, &schema, stored.clone())?;
                        predicate::matches(filter, &row)
                    }
                };
                if !hit {
                    out.push(record)?;
                    continue;
                }

                // Only the changed segments are re-encoded; the rest of the
                // record is copied as stored.
                let mut patched = record.to_vec();
                for (name, value) in changes {
                    let (Some(col), Some(offset)) = (schema.column(name), schema.offset_of(name)) else {
                        continue;
                    };
                    let segment = if col.ty == Type::Blob {
                        if let Some(Value::Text(old)) = stored.get(name) {
                            stale.push(old.clone());
                        }
                        let next = match self.store_blob(table, col, value)? {
                            Some(token) => {
                                new_tokens.push(token.clone());
                                Value::Text(token)
                            }
                            None => Value::Null,
                        };
                        codec::encode_segment(col, &next)?
                    } else {
                        codec::encode_segment(col, value)?
                    };
                    patched[offset..offset + col.width()].copy_from_slice(&segment);
                }
                out.push(&patched)?;
                updated += 1;
            }
            Ok(())
        })();

        if let Err(e) = scanned {
            out.abort();
            self.discard_blobs(table, &new_tokens);
            return Err(e);
        }
        if updated == 0 {
            out.abort();
            debug!(table, "update matched no rows");
            return Ok(0);
        }

        if let Err(e) = out.commit() {
            self.discard_blobs(table, &new_tokens);
            return Err(e);
        }
        self.evict_blobs(table, &stale);
        info!(table, updated, blobs_replaced = stale.len(), "updated rows");
        Ok(updated)
    }

    /// The row a rewrite's filter is evaluated against. Unlike a select, a
    /// blob whose file has gone missing reads as `Null` instead of failing,
    /// so the rewrite can still drop or replace the record pointing at it.
    fn filter_view(&self, table: &str, schema: &Schema, mut row: Row) -> Result<Row> {
        for col in schema.blob_columns() {
            if let Some(Value::Text(token)) = row.get(&col.name) {
                let value = match self.blobs.get(table, token) {
                    Ok(payload) => Value::Blob(payload),
                    Err(BlobError::NotFound { .. }) => {
                        warn!(table, column = %col.name, token = %token, "blob file missing, treating as null");
                        Value::Null
                    }
                    Err(e) => return Err(e.into()),
                };
                row.insert(col.name.clone(), value);
            }
        }
        Ok(row)
    }
}
