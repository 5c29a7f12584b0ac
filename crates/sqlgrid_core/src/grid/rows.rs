//! Row store: every materialized or locally inserted row, keyed by a
//! synthetic id that never depends on storage position.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Synthetic row identifier, unique and never reused within one grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(u64);

impl RowId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Change state of a row relative to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowState {
    Unmodified,
    Modified,
    Inserted,
    Deleted,
}

/// Tracked state; the pre-edit backup lives inside `Modified` so a backup
/// exists exactly when the row is modified.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tracked {
    Unmodified,
    Modified { backup: Vec<Value> },
    Inserted,
    Deleted,
}

#[derive(Debug, Clone)]
pub(crate) struct RowEntry {
    pub(crate) id: RowId,
    pub(crate) values: Vec<Value>,
    pub(crate) tracked: Tracked,
    pub(crate) source_row_id: Option<Value>,
    /// Position in the source cursor, for rows that came from it.
    pub(crate) ordinal: Option<u64>,
}

impl RowEntry {
    pub(crate) fn state(&self) -> RowState {
        match self.tracked {
            Tracked::Unmodified => RowState::Unmodified,
            Tracked::Modified { .. } => RowState::Modified,
            Tracked::Inserted => RowState::Inserted,
            Tracked::Deleted => RowState::Deleted,
        }
    }

    pub(crate) fn backup(&self) -> Option<&[Value]> {
        match &self.tracked {
            Tracked::Modified { backup } => Some(backup),
            _ => None,
        }
    }

    /// Apply a cell edit.
    ///
    /// # Returns
    /// `true` when the stored value changed.
    pub(crate) fn apply_edit(&mut self, column: usize, value: Value) -> bool {
        if matches!(self.tracked, Tracked::Deleted) || column >= self.values.len() {
            return false;
        }
        if self.values[column] == value {
            return false;
        }
        if matches!(self.tracked, Tracked::Unmodified) {
            self.tracked = Tracked::Modified {
                backup: self.values.clone(),
            };
        }
        self.values[column] = value;
        if let Tracked::Modified { backup } = &self.tracked {
            if *backup == self.values {
                self.tracked = Tracked::Unmodified;
            }
        }
        true
    }

    /// Mark the row deleted; a modified row falls back to its backup values.
    pub(crate) fn mark_deleted(&mut self) {
        let previous = std::mem::replace(&mut self.tracked, Tracked::Deleted);
        if let Tracked::Modified { backup } = previous {
            self.values = backup;
        }
    }

    /// Drop pending state after undo: backups are restored, deletions revived.
    pub(crate) fn revert(&mut self) {
        let previous = std::mem::replace(&mut self.tracked, Tracked::Unmodified);
        if let Tracked::Modified { backup } = previous {
            self.values = backup;
        }
    }

    pub(crate) fn snapshot(&self) -> RowSnapshot {
        RowSnapshot {
            id: self.id,
            state: self.state(),
            values: self.values.clone(),
            source_row_id: self.source_row_id.clone(),
        }
    }
}

/// Owned copy of one row, for callers that need the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSnapshot {
    pub id: RowId,
    pub state: RowState,
    pub values: Vec<Value>,
    pub source_row_id: Option<Value>,
}

#[derive(Debug, Default)]
pub(crate) struct RowStore {
    entries: HashMap<RowId, RowEntry>,
    /// Local inserts first (newest first), then source rows in read order.
    intake: Vec<RowId>,
    /// Source rows by read position.
    by_ordinal: Vec<RowId>,
    last_id: u64,
}

impl RowStore {
    fn allocate_id(&mut self) -> RowId {
        self.last_id += 1;
        RowId(self.last_id)
    }

    /// Store a row pulled from the source cursor.
    pub(crate) fn push_materialized(
        &mut self,
        values: Vec<Value>,
        source_row_id: Option<Value>,
    ) -> RowId {
        let id = self.allocate_id();
        let ordinal = self.by_ordinal.len() as u64;
        self.entries.insert(
            id,
            RowEntry {
                id,
                values,
                tracked: Tracked::Unmodified,
                source_row_id,
                ordinal: Some(ordinal),
            },
        );
        self.intake.push(id);
        self.by_ordinal.push(id);
        id
    }

    /// Store a locally created row ahead of every existing row.
    pub(crate) fn push_inserted(&mut self, values: Vec<Value>) -> RowId {
        let id = self.allocate_id();
        self.entries.insert(
            id,
            RowEntry {
                id,
                values,
                tracked: Tracked::Inserted,
                source_row_id: None,
                ordinal: None,
            },
        );
        self.intake.insert(0, id);
        id
    }

    pub(crate) fn get(&self, id: RowId) -> Option<&RowEntry> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: RowId) -> Option<&mut RowEntry> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: RowId) -> Option<RowEntry> {
        let entry = self.entries.remove(&id)?;
        self.intake.retain(|existing| *existing != id);
        Some(entry)
    }

    pub(crate) fn intake(&self) -> &[RowId] {
        &self.intake
    }

    pub(crate) fn entries_in_intake_order(&self) -> impl Iterator<Item = &RowEntry> {
        self.intake.iter().filter_map(|id| self.entries.get(id))
    }

    /// Ids in `state`, in intake order.
    pub(crate) fn ids_in_state(&self, state: RowState) -> Vec<RowId> {
        self.entries_in_intake_order()
            .filter(|entry| entry.state() == state)
            .map(|entry| entry.id)
            .collect()
    }

    pub(crate) fn id_at_ordinal(&self, ordinal: u64) -> Option<RowId> {
        let id = *self.by_ordinal.get(usize::try_from(ordinal).ok()?)?;
        self.entries.contains_key(&id).then_some(id)
    }

    /// Number of rows pulled from the source so far.
    pub(crate) fn materialized(&self) -> u64 {
        self.by_ordinal.len() as u64
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
