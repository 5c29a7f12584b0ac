//! Cursor feeder: pulls rows from the source cursor exactly once, in order.

use super::rows::{RowId, RowStore};
use crate::constants::ROW_LOCATOR_ALIAS;
use crate::schema::Column;
use crate::store::RowCursor;
use crate::value::Value;
use tracing::{debug, warn};

/// Maps cursor positions onto grid column positions.
#[derive(Debug, Clone)]
pub(crate) struct ColumnMap {
    /// For each grid column, the cursor position holding its value.
    sources: Vec<Option<usize>>,
    locator: Option<usize>,
}

impl ColumnMap {
    /// Match cursor columns to grid columns by name; duplicate names are
    /// matched left to right.
    pub(crate) fn new(cursor_columns: &[String], columns: &[Column]) -> Self {
        let locator = cursor_columns
            .iter()
            .position(|name| name == ROW_LOCATOR_ALIAS);
        let mut taken = vec![false; cursor_columns.len()];
        if let Some(index) = locator {
            taken[index] = true;
        }
        let sources = columns
            .iter()
            .map(|column| {
                let found = cursor_columns
                    .iter()
                    .enumerate()
                    .position(|(index, name)| !taken[index] && *name == column.name);
                if let Some(index) = found {
                    taken[index] = true;
                }
                found
            })
            .collect();
        Self { sources, locator }
    }

    /// Split a cursor row into grid values and the optional row locator.
    pub(crate) fn split(&self, mut raw: Vec<Value>) -> (Vec<Value>, Option<Value>) {
        let locator = self
            .locator
            .and_then(|index| raw.get_mut(index).map(std::mem::take));
        let values = self
            .sources
            .iter()
            .map(|source| {
                source
                    .and_then(|index| raw.get_mut(index))
                    .map(std::mem::take)
                    .unwrap_or(Value::Null)
            })
            .collect();
        (values, locator.filter(|value| !value.is_null()))
    }
}

pub(crate) struct CursorFeeder {
    cursor: Option<Box<dyn RowCursor>>,
    map: ColumnMap,
    read: u64,
}

impl CursorFeeder {
    pub(crate) fn new(cursor: Box<dyn RowCursor>, columns: &[Column]) -> Self {
        let map = ColumnMap::new(cursor.columns(), columns);
        Self {
            cursor: Some(cursor),
            map,
            read: 0,
        }
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.cursor.is_none()
    }

    /// Rows read from the cursor so far.
    pub(crate) fn read_count(&self) -> u64 {
        self.read
    }

    /// Pull up to `limit` rows into `rows`.
    ///
    /// A cursor error ends the source: rows read so far stay valid and the
    /// feeder reports itself exhausted from then on.
    ///
    /// # Returns
    /// Ids of the newly materialized rows, in read order.
    pub(crate) fn pull(&mut self, limit: u64, rows: &mut RowStore) -> Vec<RowId> {
        let mut fresh = Vec::new();
        while (fresh.len() as u64) < limit {
            let Some(cursor) = self.cursor.as_mut() else {
                break;
            };
            match cursor.next_row() {
                Ok(Some(raw)) => {
                    let (values, locator) = self.map.split(raw);
                    fresh.push(rows.push_materialized(values, locator));
                    self.read += 1;
                }
                Ok(None) => {
                    debug!(rows_read = self.read, "source cursor exhausted");
                    self.cursor = None;
                }
                Err(err) => {
                    warn!(rows_read = self.read, error = %err, "source cursor failed; treating as end of rows");
                    self.cursor = None;
                }
            }
        }
        fresh
    }
}
