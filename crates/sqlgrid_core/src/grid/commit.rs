//! Write-back of pending changes.

use super::rows::{RowId, RowState, Tracked};
use super::{GridModel, GridSource};
use crate::error::{GridError, StoreError};
use crate::schema::Affinity;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Rows written by one successful save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    pub updated: usize,
    pub inserted: usize,
    pub deleted: usize,
}

impl SaveReport {
    pub fn total(&self) -> usize {
        self.updated + self.inserted + self.deleted
    }
}

fn commit_failure(table: &str, row: RowId, source: StoreError) -> GridError {
    error!(table, row = row.get(), error = %source, "saving row failed");
    GridError::CommitFailure { row, source }
}

impl GridModel {
    /// Write every pending change to the store.
    ///
    /// The source is read to the end first. Edited rows are written, then
    /// inserts oldest first, then deletes. Each row's pending state is
    /// cleared as soon as its statement succeeds, so after a failure exactly
    /// the rows not yet written remain pending.
    ///
    /// # Errors
    /// Returns [`GridError::ReadOnlyTarget`] for view and query grids and
    /// [`GridError::CommitFailure`] naming the first row the store rejected.
    pub fn save(&mut self) -> Result<SaveReport, GridError> {
        let GridSource::Table(table) = &self.source else {
            return Err(GridError::ReadOnlyTarget);
        };
        let table = table.clone();
        self.seek_to_end();

        let mut report = SaveReport::default();
        let result = self.write_pending(&table, &mut report);
        self.view.recompute(&self.rows);
        result?;
        info!(
            table = table.as_str(),
            updated = report.updated,
            inserted = report.inserted,
            deleted = report.deleted,
            "saved changes"
        );
        Ok(report)
    }

    fn write_pending(&mut self, table: &str, report: &mut SaveReport) -> Result<(), GridError> {
        for id in self.rows.ids_in_state(RowState::Modified) {
            let Some(entry) = self.rows.get(id) else {
                continue;
            };
            let Some(backup) = entry.backup() else {
                continue;
            };
            self.store
                .update_row(
                    table,
                    &self.columns,
                    &entry.values,
                    backup,
                    entry.source_row_id.as_ref(),
                )
                .map_err(|source| commit_failure(table, id, source))?;
            if let Some(entry) = self.rows.get_mut(id) {
                entry.tracked = Tracked::Unmodified;
            }
            report.updated += 1;
        }

        let key_column = self.autoincrement_key();
        let mut inserted = self.rows.ids_in_state(RowState::Inserted);
        inserted.reverse();
        for id in inserted {
            let Some(entry) = self.rows.get(id) else {
                continue;
            };
            let assigned = self
                .store
                .insert_row(table, &self.columns, &entry.values)
                .map_err(|source| commit_failure(table, id, source))?;
            let row_locator = self.row_locator;
            if let Some(entry) = self.rows.get_mut(id) {
                if let (Some(column), Some(Value::Integer(key))) = (key_column, assigned.as_ref()) {
                    if entry.values.get(column).map(Value::is_empty).unwrap_or(false) {
                        entry.values[column] = Value::Integer(*key);
                    }
                }
                if row_locator {
                    entry.source_row_id = assigned;
                }
                entry.tracked = Tracked::Unmodified;
            }
            report.inserted += 1;
        }

        for id in self.rows.ids_in_state(RowState::Deleted) {
            let Some(entry) = self.rows.get(id) else {
                continue;
            };
            self.store
                .delete_row(
                    table,
                    &self.columns,
                    &entry.values,
                    entry.source_row_id.as_ref(),
                )
                .map_err(|source| commit_failure(table, id, source))?;
            self.rows.remove(id);
            report.deleted += 1;
        }
        Ok(())
    }

    /// The single INTEGER primary-key column, if the table has exactly one.
    fn autoincrement_key(&self) -> Option<usize> {
        let mut keys = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.primary_key);
        match (keys.next(), keys.next()) {
            (Some((index, column)), None) if column.affinity == Affinity::Integer => Some(index),
            _ => None,
        }
    }
}
