/// Read path: `select()` and `select_range()`.
///
/// A scan walks the data file record by record from the requested start,
/// decodes each record, swaps blob tokens for their payloads, and keeps the
/// rows the filter accepts. A partial record at the end of the file ends
/// the scan; everything before it is returned.
use blob::BlobError;
use codec::{Row, Value};
use predicate::RowFilter;
use schema::Schema;
use tracing::debug;

use crate::{next_record, open_reader, Engine, Error, QueryResult, Result};

impl Engine {
    /// Returns every row of `table` accepted by `filter` (all rows when
    /// `filter` is `None`), in storage order.
    ///
    /// # Errors
    ///
    /// - [`Error::Schema`] if the definition is invalid.
    /// - [`Error::FileNotFound`] / [`Error::PermissionDenied`] / [`Error::Io`]
    ///   if the table, its data file or a referenced blob cannot be read.
    pub fn select(&self, table: &str, filter: Option<&dyn RowFilter>) -> Result<QueryResult> {
        self.select_range(table, 0, None, filter)
    }

    /// Like [`select`](Engine::select) but only examines the records in
    /// `[start, start + count)` (to the end of the file when `count` is
    /// `None`). The window is positioned by seeking straight to byte
    /// `start * record_width`; the filter applies within the window.
    pub fn select_range(
        &self,
        table: &str,
        start: u64,
        count: Option<u64>,
        filter: Option<&dyn RowFilter>,
    ) -> Result<QueryResult> {
        let (_guard, schema) = self.open_table(table)?;
        let path = self.config.data_path(table)?;
        let mut reader = open_reader(&path, &schema)?;
        if start > 0 {
            reader.seek_to_record(start).map_err(|e| match e {
                codec::CodecError::Io(io) => Error::io(&path, io),
                other => other.into(),
            })?;
        }

        let mut rows = Vec::new();
        let mut examined = 0u64;
        while count.map_or(true, |limit| examined < limit) {
            let Some(record) = next_record(&mut reader, table, &path)? else {
                break;
            };
            examined += 1;

            let stored = codec::decode(&schema, record)?;
            let row = self.resolve_blobs(table, &schema, stored)?;
            if predicate::matches(filter, &row) {
                rows.push(row);
            }
        }

        debug!(table, start, examined, matched = rows.len(), "select");
        Ok(QueryResult::new(rows))
    }

    /// Replaces each blob column's token with the payload it names.
    /// Columns without a blob stay `Null`. A record pointing at a missing
    /// blob file is a file-access error like a missing data file.
    pub(crate) fn resolve_blobs(&self, table: &str, schema: &Schema, mut row: Row) -> Result<Row> {
        for col in schema.blob_columns() {
            if let Some(Value::Text(token)) = row.get(&col.name) {
                let payload = match self.blobs.get(table, token) {
                    Ok(payload) => payload,
                    Err(BlobError::NotFound { dir, token }) => {
                        return Err(Error::FileNotFound(dir.join(token)))
                    }
                    Err(e) => return Err(e.into()),
                };
                row.insert(col.name.clone(), Value::Blob(payload));
            }
        }
        Ok(row)
    }
}
