//! Full-result iteration for exporters.

use super::feeder::ColumnMap;
use super::rows::RowId;
use super::{GridModel, GridSource};
use crate::error::GridError;
use crate::store::RowCursor;
use crate::value::Value;
use tracing::warn;

enum Inner<'a> {
    /// Materialized rows of a query grid, in intake order.
    Cached {
        grid: &'a GridModel,
        ids: Vec<RowId>,
        next: usize,
    },
    /// A fresh filtered and sorted statement against the store.
    Streamed {
        cursor: Box<dyn RowCursor>,
        map: ColumnMap,
        done: bool,
    },
}

/// Rows to export, produced by [`GridModel::export_rows`].
pub struct ExportRows<'a> {
    inner: Inner<'a>,
}

impl Iterator for ExportRows<'_> {
    type Item = Result<Vec<Value>, GridError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Inner::Cached { grid, ids, next } => {
                let id = *ids.get(*next)?;
                *next += 1;
                grid.rows.get(id).map(|entry| Ok(entry.values.clone()))
            }
            Inner::Streamed { cursor, map, done } => {
                if *done {
                    return None;
                }
                match cursor.next_row() {
                    Ok(Some(raw)) => Some(Ok(map.split(raw).0)),
                    Ok(None) => {
                        *done = true;
                        None
                    }
                    Err(err) => {
                        warn!(error = %err, "export cursor failed");
                        *done = true;
                        Some(Err(err.into()))
                    }
                }
            }
        }
    }
}

impl GridModel {
    /// Iterate every row for export.
    ///
    /// Query grids read their source to the end and yield it in read order,
    /// ignoring filter and sort. Table and view grids run a fresh statement
    /// with the current filter and sort, so they reflect saved data only.
    ///
    /// # Errors
    /// Returns an error when the export statement cannot be executed.
    pub fn export_rows(&mut self) -> Result<ExportRows<'_>, GridError> {
        if let GridSource::Query(_) = self.source {
            self.seek_to_end();
            let ids = self.rows.intake().to_vec();
            return Ok(ExportRows {
                inner: Inner::Cached {
                    grid: self,
                    ids,
                    next: 0,
                },
            });
        }
        let statement = self.select_sql();
        let cursor = self.store.execute(&statement.sql, &statement.params)?;
        let map = ColumnMap::new(cursor.columns(), &self.columns);
        Ok(ExportRows {
            inner: Inner::Streamed {
                cursor,
                map,
                done: false,
            },
        })
    }
}
