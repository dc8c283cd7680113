/// Write path: `insert()` and `truncate()`.
///
/// An insert stores blob payloads first, then appends the whole encoded
/// record with one `write_all`. If anything fails after a blob was stored,
/// those blobs are removed again so a failed insert leaves no trace.
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use codec::{Row, Value};
use schema::{Schema, Type};
use tracing::{debug, info, warn};

use crate::{next_record, open_reader, Engine, Error, QueryResult, Result};

impl Engine {
    /// Appends one row to `table`.
    ///
    /// Columns missing from `values` are stored as zero segments, except
    /// primary-key `int` columns, which are auto-assigned `max + 1` (1 for an
    /// empty table) and reported through [`QueryResult::autos`]. Blob columns
    /// take their payload from `values` and store it out of line.
    ///
    /// The returned result holds the row as a later `select` would see it.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownColumn`] if `values` names a column the table lacks.
    /// - [`Error::Codec`] if a value does not fit its column's type.
    /// - File-access errors if the data file or blob directory is unusable;
    ///   these are checked before anything is written.
    pub fn insert(&self, table: &str, values: Row) -> Result<QueryResult> {
        let (_guard, schema) = self.open_table(table)?;
        self.check_columns(&schema, values.keys())?;

        let path = self.config.data_path(table)?;
        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;

        let mut values = values;
        let autos = self.assign_autos(table, &schema, &path, &mut values)?;

        let mut new_tokens = Vec::new();
        let written = self.append_row(table, &schema, &values, &mut file, &path, &mut new_tokens);
        let record = match written {
            Ok(record) => record,
            Err(e) => {
                self.discard_blobs(table, &new_tokens);
                return Err(e);
            }
        };

        let mut row = codec::decode(&schema, &record)?;
        for col in schema.blob_columns() {
            match values.get(&col.name) {
                Some(Value::Blob(bytes)) => {
                    row.insert(col.name.clone(), Value::Blob(bytes.clone()));
                }
                Some(Value::Text(text)) => {
                    row.insert(col.name.clone(), Value::Blob(text.clone().into_bytes()));
                }
                _ => {}
            }
        }

        debug!(table, blobs = new_tokens.len(), autos = autos.len(), "inserted row");
        Ok(QueryResult::with_autos(vec![row], autos))
    }

    /// Empties `table`: the data file is cut to zero length and every file
    /// in its blob directory is removed. Running it twice is the same as
    /// running it once.
    pub fn truncate(&self, table: &str) -> Result<()> {
        let (_guard, _schema) = self.open_table(table)?;

        let path = self.config.data_path(table)?;
        let blob_dir = self.config.blob_dir(table)?;
        if !blob_dir.is_dir() {
            return Err(Error::FileNotFound(blob_dir));
        }

        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;
        file.set_len(0).map_err(|e| Error::io(&path, e))?;
        if self.config.sync() {
            file.sync_all().map_err(|e| Error::io(&path, e))?;
        }
        drop(file);

        let removed = self.blobs.truncate(table)?;
        info!(table, blobs_removed = removed, "truncated table");
        Ok(())
    }

    /// Stores blobs, encodes and appends. Tokens created along the way are
    /// pushed to `new_tokens` so the caller can undo them on failure; a
    /// failed append is cut back off the data file.
    fn append_row(
        &self,
        table: &str,
        schema: &Schema,
        values: &Row,
        file: &mut File,
        path: &Path,
        new_tokens: &mut Vec<String>,
    ) -> Result<Vec<u8>> {
        let mut stored = values.clone();
        for col in schema.blob_columns() {
            let Some(value) = values.get(&col.name) else {
                continue;
            };
            match self.store_blob(table, col, value)? {
                Some(token) => {
                    new_tokens.push(token.clone());
                    stored.insert(col.name.clone(), Value::Text(token));
                }
                None => {
                    stored.insert(col.name.clone(), Value::Null);
                }
            }
        }

        let record = codec::encode(schema, &stored)?;

        // A partial tail is invisible to scans; appending after it would
        // shift every later record, so cut it off first.
        let len = file.metadata().map_err(|e| Error::io(path, e))?.len();
        let aligned = len - len % schema.record_width() as u64;
        if aligned != len {
            warn!(table, len, aligned, "dropping partial record before append");
            file.set_len(aligned).map_err(|e| Error::io(path, e))?;
        }

        let appended = file.write_all(&record).and_then(|()| {
            if self.config.sync() {
                file.sync_all()
            } else {
                Ok(())
            }
        });
        if let Err(e) = appended {
            let _ = file.set_len(aligned);
            return Err(Error::io(path, e));
        }
        Ok(record)
    }

    /// Fills in primary `int` columns that were left out (or `Null`).
    fn assign_autos(
        &self,
        table: &str,
        schema: &Schema,
        path: &Path,
        values: &mut Row,
    ) -> Result<BTreeMap<String, Value>> {
        let missing: Vec<&str> = schema
            .primary_columns()
            .filter(|c| c.ty == Type::Int)
            .filter(|c| values.get(&c.name).map_or(true, Value::is_null))
            .map(|c| c.name.as_str())
            .collect();

        let mut autos = BTreeMap::new();
        if missing.is_empty() {
            return Ok(autos);
        }

        let maxima = self.column_maxima(table, schema, path, &missing)?;
        for (name, max) in missing.iter().zip(maxima) {
            let next = max
                .unwrap_or(0)
                .checked_add(1)
                .ok_or_else(|| Error::AutoIncrementExhausted {
                    table: table.to_string(),
                    column: name.to_string(),
                })?;
            values.insert(name.to_string(), Value::Int(next));
            autos.insert(name.to_string(), Value::Int(next));
        }
        Ok(autos)
    }

    /// Largest stored value of each `int` column in `columns`, `None` for an
    /// empty table.
    fn column_maxima(
        &self,
        table: &str,
        schema: &Schema,
        path: &Path,
        columns: &[&str],
    ) -> Result<Vec<Option<i64>>> {
        let slots: Vec<(usize, usize)> = columns
            .iter()
            .filter_map(|name| Some((schema.offset_of(name)?, schema.column(name)?.width())))
            .collect();

        let mut maxima: Vec<Option<i64>> = vec![None; columns.len()];
        let mut reader = open_reader(path, schema)?;
        while let Some(record) = next_record(&mut reader, table, path)? {
            for (slot, (offset, width)) in slots.iter().enumerate() {
                let value = codec::decode_segment(Type::Int, &record[*offset..offset + width])?;
                if let Value::Int(n) = value {
                    maxima[slot] = Some(maxima[slot].map_or(n, |m| m.max(n)));
                }
            }
        }
        Ok(maxima)
    }

    /// Best-effort removal of blobs written by an operation that failed.
    pub(crate) fn discard_blobs(&self, table: &str, tokens: &[String]) {
        for token in tokens {
            if let Err(e) = self.blobs.delete(table, token) {
                warn!(table, token = %token, error = %e, "failed to discard blob from failed write");
            }
        }
    }
}
