//! Pending-change bundles, used to rebuild a grid without losing edits.

use super::rows::{RowId, RowState};
use super::GridModel;
use crate::error::GridError;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A source row edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifiedRow {
    /// Read position in the source cursor.
    pub ordinal: Option<u64>,
    pub source_row_id: Option<Value>,
    pub values: Vec<Value>,
    /// Values before the first edit.
    pub original: Vec<Value>,
}

/// A source row marked for deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedRow {
    pub ordinal: Option<u64>,
    pub source_row_id: Option<Value>,
    pub values: Vec<Value>,
}

/// Every pending change of a grid, detached from its row ids.
///
/// Rows are keyed by read position and locator so a grid rebuilt over the
/// same source can find them again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeBundle {
    pub columns: Vec<String>,
    /// Pending inserts, oldest first.
    pub inserted: Vec<Vec<Value>>,
    pub modified: Vec<ModifiedRow>,
    pub deleted: Vec<DeletedRow>,
}

impl ChangeBundle {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Encode to an opaque byte blob.
    ///
    /// # Errors
    /// Returns an error when serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, GridError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a blob produced by [`ChangeBundle::encode`].
    ///
    /// # Errors
    /// Returns an error when the bytes are not a bundle.
    pub fn decode(bytes: &[u8]) -> Result<Self, GridError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl GridModel {
    /// Snapshot of all pending changes.
    pub fn export_changes(&self) -> ChangeBundle {
        let mut bundle = ChangeBundle {
            columns: self.columns.iter().map(|column| column.name.clone()).collect(),
            ..ChangeBundle::default()
        };
        for entry in self.rows.entries_in_intake_order() {
            match entry.state() {
                RowState::Unmodified => {}
                RowState::Inserted => bundle.inserted.push(entry.values.clone()),
                RowState::Modified => bundle.modified.push(ModifiedRow {
                    ordinal: entry.ordinal,
                    source_row_id: entry.source_row_id.clone(),
                    values: entry.values.clone(),
                    original: entry.backup().map(<[Value]>::to_vec).unwrap_or_default(),
                }),
                RowState::Deleted => bundle.deleted.push(DeletedRow {
                    ordinal: entry.ordinal,
                    source_row_id: entry.source_row_id.clone(),
                    values: entry.values.clone(),
                }),
            }
        }
        // Intake order holds the newest insert first.
        bundle.inserted.reverse();
        bundle
    }

    /// Replace pending changes with those of `bundle`.
    ///
    /// Current pending changes are discarded first. Edited and deleted rows
    /// are matched by read position when the row there still holds the saved
    /// values, otherwise by locator or by values; rows that cannot be found
    /// are skipped.
    ///
    /// # Returns
    /// Number of bundle entries applied.
    ///
    /// # Errors
    /// Returns [`GridError::IncompatibleBundle`] when the bundle was taken
    /// from a grid with different columns, and
    /// [`GridError::ReadOnlyTarget`] when a non-empty bundle targets a view
    /// or query grid.
    pub fn import_changes(&mut self, bundle: &ChangeBundle) -> Result<usize, GridError> {
        let names: Vec<&str> = self.columns.iter().map(|column| column.name.as_str()).collect();
        if bundle.columns.len() != names.len()
            || bundle.columns.iter().zip(&names).any(|(a, b)| a != b)
        {
            return Err(GridError::IncompatibleBundle(format!(
                "expected columns [{}], bundle has [{}]",
                names.join(", "),
                bundle.columns.join(", ")
            )));
        }
        if bundle.is_empty() {
            self.undo_all();
            return Ok(0);
        }
        self.ensure_writable()?;
        self.undo_all();

        let mut applied = 0;
        for row in &bundle.modified {
            let Some(id) = self.locate(row.ordinal, row.source_row_id.as_ref(), &row.original)
            else {
                warn!(ordinal = ?row.ordinal, "edited row from bundle not found; skipping");
                continue;
            };
            if let Some(entry) = self.rows.get_mut(id) {
                for (column, value) in row.values.iter().enumerate() {
                    entry.apply_edit(column, value.clone());
                }
                applied += 1;
            }
        }
        for row in &bundle.deleted {
            let Some(id) = self.locate(row.ordinal, row.source_row_id.as_ref(), &row.values)
            else {
                warn!(ordinal = ?row.ordinal, "deleted row from bundle not found; skipping");
                continue;
            };
            if let Some(entry) = self.rows.get_mut(id) {
                entry.mark_deleted();
                applied += 1;
            }
        }
        for values in &bundle.inserted {
            let mut values = values.clone();
            values.resize(self.columns.len(), Value::Null);
            self.rows.push_inserted(values);
            applied += 1;
        }
        self.view.recompute(&self.rows);
        debug!(applied, "imported pending changes");
        Ok(applied)
    }

    /// Find an unmodified row holding `expected`.
    fn locate(
        &mut self,
        ordinal: Option<u64>,
        source_row_id: Option<&Value>,
        expected: &[Value],
    ) -> Option<RowId> {
        if let Some(ordinal) = ordinal {
            self.advance_to(ordinal);
            let hit = self.rows.id_at_ordinal(ordinal).filter(|id| {
                self.rows
                    .get(*id)
                    .map(|entry| entry.state() == RowState::Unmodified && entry.values == expected)
                    .unwrap_or(false)
            });
            if hit.is_some() {
                return hit;
            }
        }
        self.seek_to_end();
        self.rows
            .entries_in_intake_order()
            .filter(|entry| entry.state() == RowState::Unmodified)
            .find(|entry| match source_row_id {
                Some(locator) => entry.source_row_id.as_ref() == Some(locator),
                None => entry.values == expected,
            })
            .map(|entry| entry.id)
    }
}
