use std::collections::BTreeMap;

use codec::{Row, Value};

/// Output of [`Engine::select`](crate::Engine::select) and
/// [`Engine::insert`](crate::Engine::insert).
///
/// Rows are held in scan order. The result is also a forward-only cursor:
/// each call to [`QueryResult::next`] yields the following row until the
/// result is exhausted, after which it returns `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    rows: Vec<Row>,
    cursor: usize,
    autos: BTreeMap<String, Value>,
}

impl QueryResult {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            cursor: 0,
            autos: BTreeMap::new(),
        }
    }

    /// A result carrying the values the engine assigned on insert.
    pub fn with_autos(rows: Vec<Row>, autos: BTreeMap<String, Value>) -> Self {
        Self {
            rows,
            cursor: 0,
            autos,
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Auto-assigned column values. Empty unless an insert assigned a key.
    #[must_use]
    pub fn autos(&self) -> &BTreeMap<String, Value> {
        &self.autos
    }

    /// Convenience for the common single-key case.
    #[must_use]
    pub fn auto(&self, column: &str) -> Option<&Value> {
        self.autos.get(column)
    }

    /// Moves the cursor back to the first row.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl QueryResult {
    /// Advances the cursor, returning `None` once every row has been seen.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&Row> {
        let row = self.rows.get(self.cursor)?;
        self.cursor += 1;
        Some(row)
    }

    /// Iterates over all rows without moving the cursor.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
