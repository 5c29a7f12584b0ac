//! Result grid model: a lazily materialized, locally editable view over the
//! rows of a table, view or query.
//!
//! Rows are pulled from the source cursor only as the caller asks for them.
//! Edits, inserts and deletes stay pending in the model until [`GridModel::save`]
//! writes them back or [`GridModel::undo_all`] discards them.

mod changes;
mod commit;
mod export;
mod feeder;
mod rows;
mod view;

pub use changes::{ChangeBundle, DeletedRow, ModifiedRow};
pub use commit::SaveReport;
pub use export::ExportRows;
pub use rows::{RowId, RowSnapshot, RowState};
pub use view::{sort_order, FilterCriterion, FilterSortState, SortDirection, SortKey};

use crate::config::GridConfig;
use crate::error::GridError;
use crate::schema::{Affinity, Column};
use crate::sql::{filtered_select, object_scan, Statement};
use crate::store::{RowCursor, Store};
use crate::value::Value;
use feeder::CursorFeeder;
use rows::RowStore;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use view::ViewState;

/// What a grid reads its rows from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridSource {
    Table(String),
    View(String),
    Query(String),
}

impl GridSource {
    /// Views and queries can be browsed but not edited.
    pub fn is_read_only(&self) -> bool {
        !matches!(self, GridSource::Table(_))
    }

    /// Name of the table or view, `None` for queries.
    pub fn object_name(&self) -> Option<&str> {
        match self {
            GridSource::Table(name) | GridSource::View(name) => Some(name),
            GridSource::Query(_) => None,
        }
    }
}

impl fmt::Display for GridSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridSource::Table(name) => write!(f, "table {}", name),
            GridSource::View(name) => write!(f, "view {}", name),
            GridSource::Query(sql) => write!(f, "query {}", sql),
        }
    }
}

/// Highlight state of one cell, for the widget painting the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Default,
    Inserted,
    /// The row has pending edits but this cell still holds its saved value.
    RowChanged,
    CellChanged,
}

/// Grid over one table, view or query.
pub struct GridModel {
    store: Arc<dyn Store>,
    source: GridSource,
    columns: Vec<Column>,
    column_index: HashMap<String, usize>,
    config: GridConfig,
    rows: RowStore,
    feeder: CursorFeeder,
    view: ViewState,
    row_locator: bool,
    /// Upfront row count for tables and views.
    total: Option<u64>,
    infer_affinity: bool,
}

impl fmt::Debug for GridModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridModel")
            .field("source", &self.source)
            .field("columns", &self.columns)
            .field("materialized", &self.rows.materialized())
            .field("visible", &self.view.visible().len())
            .field("complete", &self.feeder.is_exhausted())
            .finish()
    }
}

impl GridModel {
    /// Open a grid over a table, introspecting its columns.
    ///
    /// # Errors
    /// Returns an error when introspection, the row count or the scan fails.
    pub fn for_table(
        store: Arc<dyn Store>,
        table: &str,
        config: GridConfig,
    ) -> Result<Self, GridError> {
        let columns = store.table_columns(table)?;
        Self::new(store, GridSource::Table(table.to_string()), columns, config)
    }

    /// Open a read-only grid over a view, introspecting its columns.
    ///
    /// # Errors
    /// Returns an error when introspection, the row count or the scan fails.
    pub fn for_view(
        store: Arc<dyn Store>,
        view: &str,
        config: GridConfig,
    ) -> Result<Self, GridError> {
        let columns = store.table_columns(view)?;
        Self::new(store, GridSource::View(view.to_string()), columns, config)
    }

    /// Open a read-only grid over an arbitrary query.
    ///
    /// Columns come from the cursor; their affinities are inferred from the
    /// first row read.
    ///
    /// # Errors
    /// Returns an error when the query cannot be executed.
    pub fn for_query(
        store: Arc<dyn Store>,
        sql: &str,
        config: GridConfig,
    ) -> Result<Self, GridError> {
        let cursor = store.execute(sql, &[])?;
        let columns = cursor
            .columns()
            .iter()
            .map(|name| Column::new(name.clone(), Affinity::Unknown))
            .collect();
        let mut grid = Self::assemble(
            store,
            GridSource::Query(sql.to_string()),
            columns,
            cursor,
            false,
            None,
            config,
        );
        grid.infer_affinity = true;
        grid.prefetch();
        Ok(grid)
    }

    /// Open a grid with caller-supplied columns.
    ///
    /// Table sources are scanned with a row locator when the store has one
    /// for them; tables and views are counted once upfront.
    ///
    /// # Errors
    /// Returns an error when the locator check, the row count or the scan
    /// fails.
    pub fn new(
        store: Arc<dyn Store>,
        source: GridSource,
        columns: Vec<Column>,
        config: GridConfig,
    ) -> Result<Self, GridError> {
        let (sql, row_locator, total) = match &source {
            GridSource::Table(name) => {
                let row_locator = store.has_row_locator(name)?;
                (
                    object_scan(name, row_locator),
                    row_locator,
                    Some(store.scalar_count(name)?),
                )
            }
            GridSource::View(name) => (object_scan(name, false), false, Some(store.scalar_count(name)?)),
            GridSource::Query(sql) => (sql.clone(), false, None),
        };
        let cursor = store.execute(&sql, &[])?;
        let mut grid = Self::assemble(store, source, columns, cursor, row_locator, total, config);
        grid.prefetch();
        Ok(grid)
    }

    fn assemble(
        store: Arc<dyn Store>,
        source: GridSource,
        columns: Vec<Column>,
        cursor: Box<dyn RowCursor>,
        row_locator: bool,
        total: Option<u64>,
        config: GridConfig,
    ) -> Self {
        let column_index = columns
            .iter()
            .enumerate()
            .rev()
            .map(|(index, column)| (column.name.clone(), index))
            .collect();
        let feeder = CursorFeeder::new(cursor, &columns);
        debug!(source = %source, columns = columns.len(), total = ?total, "opened grid");
        Self {
            store,
            source,
            columns,
            column_index,
            config,
            rows: RowStore::default(),
            feeder,
            view: ViewState::default(),
            row_locator,
            total,
            infer_affinity: false,
        }
    }

    fn prefetch(&mut self) {
        if self.config.prefetch {
            self.seek_ahead();
        }
    }

    pub fn source(&self) -> &GridSource {
        &self.source
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Index of the first column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_index.get(name).copied()
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn is_read_only(&self) -> bool {
        self.source.is_read_only()
    }

    /// Whether source rows carry a physical locator for write-back.
    pub fn has_row_locator(&self) -> bool {
        self.row_locator
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    // ----- materialization -------------------------------------------------

    fn pull(&mut self, limit: u64) -> usize {
        let fresh = self.feeder.pull(limit, &mut self.rows);
        if self.infer_affinity {
            if let Some(first) = fresh.first().and_then(|id| self.rows.get(*id)) {
                for (column, value) in self.columns.iter_mut().zip(&first.values) {
                    if column.affinity == Affinity::Unknown {
                        column.affinity = match value {
                            Value::Integer(_) => Affinity::Integer,
                            Value::Real(_) => Affinity::Real,
                            _ => Affinity::Unknown,
                        };
                    }
                }
                self.infer_affinity = false;
            }
        }
        self.view.admit_new(&fresh, &self.rows);
        if !fresh.is_empty() {
            debug!(
                read = fresh.len(),
                materialized = self.rows.materialized(),
                "materialized rows"
            );
        }
        fresh.len()
    }

    /// Materialize source rows until `target_index + 1` rows have been read
    /// or the source is exhausted. Rows already read are never re-read.
    pub fn advance_to(&mut self, target_index: u64) {
        let wanted = target_index.saturating_add(1);
        let read = self.rows.materialized();
        if wanted > read && !self.feeder.is_exhausted() {
            self.pull(wanted - read);
        }
    }

    /// Read one more chunk from the source.
    ///
    /// # Returns
    /// Number of rows read.
    pub fn seek_ahead(&mut self) -> usize {
        if self.feeder.is_exhausted() {
            return 0;
        }
        self.pull(self.config.seek_chunk.max(1) as u64)
    }

    /// Drain the source cursor.
    pub fn seek_to_end(&mut self) {
        while !self.feeder.is_exhausted() {
            self.pull(self.config.seek_chunk.max(1) as u64);
        }
    }

    /// Whether every source row has been read.
    pub fn is_complete(&self) -> bool {
        self.feeder.is_exhausted()
    }

    /// Number of source rows read so far.
    pub fn materialized_count(&self) -> u64 {
        self.rows.materialized()
    }

    /// Rows the widget should show.
    ///
    /// Visible rows, plus the rows of a table or view not yet read while no
    /// filter is active. Query grids count only what has been read.
    pub fn row_count(&self) -> u64 {
        let visible = self.view.visible().len() as u64;
        let unread = match self.total {
            Some(total) if !self.view.has_filters() && !self.feeder.is_exhausted() => {
                total.saturating_sub(self.feeder.read_count())
            }
            _ => 0,
        };
        visible + unread
    }

    fn ensure_visible(&mut self, index: usize) -> bool {
        while self.view.visible().len() <= index && !self.feeder.is_exhausted() {
            self.pull(self.config.seek_chunk.max(1) as u64);
        }
        index < self.view.visible().len()
    }

    /// Id of the row at `index` in visible order, reading ahead as needed.
    pub fn row_id_at(&mut self, index: usize) -> Option<RowId> {
        if self.ensure_visible(index) {
            self.view.visible().get(index).copied()
        } else {
            None
        }
    }

    /// Ids in visible order, without reading ahead.
    pub fn visible_ids(&self) -> &[RowId] {
        self.view.visible()
    }

    /// Cell at `index` in visible order, reading ahead as needed.
    pub fn value_at(&mut self, index: usize, column: usize) -> Option<&Value> {
        let id = self.row_id_at(index)?;
        self.value(id, column)
    }

    pub fn value(&self, row: RowId, column: usize) -> Option<&Value> {
        self.rows.get(row)?.values.get(column)
    }

    pub fn row_state(&self, row: RowId) -> Option<RowState> {
        self.rows.get(row).map(|entry| entry.state())
    }

    /// Copy of the row at `index` in visible order.
    pub fn row_snapshot(&mut self, index: usize) -> Option<RowSnapshot> {
        let id = self.row_id_at(index)?;
        self.rows.get(id).map(|entry| entry.snapshot())
    }

    /// Copy of a row by id, including deleted rows still pending.
    pub fn snapshot(&self, row: RowId) -> Option<RowSnapshot> {
        self.rows.get(row).map(|entry| entry.snapshot())
    }

    // ----- change tracking -------------------------------------------------

    fn ensure_writable(&self) -> Result<(), GridError> {
        if self.is_read_only() {
            Err(GridError::ReadOnlyTarget)
        } else {
            Ok(())
        }
    }

    /// Set one cell of a row.
    ///
    /// The first edit of a row keeps a copy of its values; editing the row
    /// back to that copy returns it to unmodified.
    ///
    /// # Returns
    /// `true` when the cell changed; unknown rows and deleted rows are left
    /// alone.
    ///
    /// # Errors
    /// Returns [`GridError::ReadOnlyTarget`] for view and query grids.
    pub fn set_value(&mut self, row: RowId, column: usize, value: Value) -> Result<bool, GridError> {
        self.ensure_writable()?;
        Ok(self
            .rows
            .get_mut(row)
            .map(|entry| entry.apply_edit(column, value))
            .unwrap_or(false))
    }

    /// Set one cell by visible index.
    ///
    /// # Errors
    /// Returns [`GridError::ReadOnlyTarget`] for view and query grids.
    pub fn set_value_at(
        &mut self,
        index: usize,
        column: usize,
        value: Value,
    ) -> Result<bool, GridError> {
        self.ensure_writable()?;
        match self.row_id_at(index) {
            Some(id) => self.set_value(id, column, value),
            None => Ok(false),
        }
    }

    /// Set one cell from editor text, coerced to the column's affinity.
    ///
    /// Text that does not fit a numeric column is rejected without change.
    ///
    /// # Errors
    /// Returns [`GridError::ReadOnlyTarget`] for view and query grids.
    pub fn set_text_at(&mut self, index: usize, column: usize, text: &str) -> Result<bool, GridError> {
        self.ensure_writable()?;
        let Some(affinity) = self.columns.get(column).map(|column| column.affinity) else {
            return Ok(false);
        };
        match Value::parse_input(text, affinity) {
            Some(value) => self.set_value_at(index, column, value),
            None => {
                debug!(column, input = text, "rejected cell input");
                Ok(false)
            }
        }
    }

    /// Add an empty row at the top of the grid.
    ///
    /// # Errors
    /// Returns [`GridError::ReadOnlyTarget`] for view and query grids.
    pub fn insert_row(&mut self) -> Result<RowId, GridError> {
        self.insert_row_with(Vec::new())
    }

    /// Add a row with initial values at the top of the grid. Missing values
    /// are NULL; extra values are dropped.
    ///
    /// # Errors
    /// Returns [`GridError::ReadOnlyTarget`] for view and query grids.
    pub fn insert_row_with(&mut self, mut values: Vec<Value>) -> Result<RowId, GridError> {
        self.ensure_writable()?;
        values.resize(self.columns.len(), Value::Null);
        let id = self.rows.push_inserted(values);
        self.view.prepend(id);
        Ok(id)
    }

    /// Delete a row. Pending inserts are discarded outright; other rows are
    /// hidden and kept until save or undo.
    ///
    /// # Returns
    /// `true` when the row was removed from view.
    ///
    /// # Errors
    /// Returns [`GridError::ReadOnlyTarget`] for view and query grids.
    pub fn delete_row(&mut self, row: RowId) -> Result<bool, GridError> {
        self.ensure_writable()?;
        let Some(state) = self.row_state(row) else {
            return Ok(false);
        };
        match state {
            RowState::Deleted => return Ok(false),
            RowState::Inserted => {
                self.rows.remove(row);
            }
            RowState::Unmodified | RowState::Modified => {
                if let Some(entry) = self.rows.get_mut(row) {
                    entry.mark_deleted();
                }
            }
        }
        self.view.remove(row);
        Ok(true)
    }

    /// Delete rows by visible index.
    ///
    /// # Returns
    /// Number of rows deleted.
    ///
    /// # Errors
    /// Returns [`GridError::ReadOnlyTarget`] for view and query grids.
    pub fn delete_rows(&mut self, indices: &[usize]) -> Result<usize, GridError> {
        self.ensure_writable()?;
        let ids: Vec<RowId> = indices
            .iter()
            .filter_map(|index| self.row_id_at(*index))
            .collect();
        let mut deleted = 0;
        for id in ids {
            if self.delete_row(id)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Discard every pending change.
    ///
    /// Edited rows get their saved values back, inserted rows disappear and
    /// deleted rows return, subject to the active filter.
    pub fn undo_all(&mut self) {
        for id in self.rows.ids_in_state(RowState::Inserted) {
            self.rows.remove(id);
        }
        for state in [RowState::Modified, RowState::Deleted] {
            for id in self.rows.ids_in_state(state) {
                if let Some(entry) = self.rows.get_mut(id) {
                    entry.revert();
                }
            }
        }
        self.view.recompute(&self.rows);
    }

    pub fn has_changes(&self) -> bool {
        self.rows
            .entries_in_intake_order()
            .any(|entry| entry.state() != RowState::Unmodified)
    }

    /// Pending rows as `(inserted, modified, deleted)`.
    pub fn pending_counts(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for entry in self.rows.entries_in_intake_order() {
            match entry.state() {
                RowState::Inserted => counts.0 += 1,
                RowState::Modified => counts.1 += 1,
                RowState::Deleted => counts.2 += 1,
                RowState::Unmodified => {}
            }
        }
        counts
    }

    /// Human-readable summary of pending changes, such as
    /// `"1 new row, 2 changed rows"`. Empty when nothing is pending.
    pub fn change_summary(&self) -> String {
        let (inserted, modified, deleted) = self.pending_counts();
        [(inserted, "new"), (modified, "changed"), (deleted, "deleted")]
            .iter()
            .filter(|(count, _)| *count > 0)
            .map(|(count, label)| {
                format!("{} {} row{}", count, label, if *count == 1 { "" } else { "s" })
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Highlight state of a cell, reading ahead as needed.
    pub fn cell_state(&mut self, index: usize, column: usize) -> CellState {
        let Some(id) = self.row_id_at(index) else {
            return CellState::Default;
        };
        let Some(entry) = self.rows.get(id) else {
            return CellState::Default;
        };
        match entry.state() {
            RowState::Inserted => CellState::Inserted,
            RowState::Modified => {
                let changed = entry
                    .backup()
                    .and_then(|backup| backup.get(column))
                    .map(|saved| entry.values.get(column) != Some(saved))
                    .unwrap_or(false);
                if changed {
                    CellState::CellChanged
                } else {
                    CellState::RowChanged
                }
            }
            RowState::Unmodified | RowState::Deleted => CellState::Default,
        }
    }

    // ----- filter and sort -------------------------------------------------

    /// Filter `column` by `literal`.
    ///
    /// Numeric columns match the literal exactly after numeric coercion;
    /// other columns match it as a case-sensitive substring.
    ///
    /// # Returns
    /// `false` when the column is unknown or the literal does not fit a
    /// numeric column; the filter is then left unchanged.
    pub fn add_filter(&mut self, column: usize, literal: &str) -> bool {
        let Some(affinity) = self.columns.get(column).map(|column| column.affinity) else {
            return false;
        };
        match FilterCriterion::parse(literal, affinity) {
            Some(criterion) => {
                debug!(column, criterion = ?criterion, "applying filter");
                self.view.set_filter(column, criterion);
                self.view.recompute(&self.rows);
                self.fill_filtered_page();
                true
            }
            None => {
                warn!(column, literal, %affinity, "ignoring filter value not valid for column");
                false
            }
        }
    }

    pub fn remove_filter(&mut self, column: usize) {
        if self.view.remove_filter(column) {
            self.view.recompute(&self.rows);
        }
    }

    pub fn clear_filter(&mut self) {
        if self.view.clear_filters() {
            self.view.recompute(&self.rows);
        }
    }

    pub fn filters(&self) -> impl Iterator<Item = (usize, &FilterCriterion)> {
        self.view.filters().iter().map(|(column, criterion)| (*column, criterion))
    }

    /// Cycle the sort on `column`: ascending, descending, then intake order.
    pub fn sort_by_column(&mut self, column: usize) {
        if column >= self.columns.len() {
            return;
        }
        self.view.cycle_sort(column);
        self.view.recompute(&self.rows);
    }

    pub fn clear_sort(&mut self) {
        if self.view.sort().is_some() {
            self.view.set_sort(None);
            self.view.recompute(&self.rows);
        }
    }

    pub fn sort(&self) -> Option<SortKey> {
        self.view.sort()
    }

    /// Current filter and sort settings, to carry over to a rebuilt grid.
    pub fn filter_sort_state(&self) -> FilterSortState {
        FilterSortState {
            filters: self
                .view
                .filters()
                .iter()
                .map(|(column, criterion)| (*column, criterion.literal()))
                .collect(),
            sort: self.view.sort(),
        }
    }

    /// Replace the filter and sort settings.
    ///
    /// Entries naming unknown columns or carrying literals the column cannot
    /// take are skipped.
    pub fn set_filter_sort_state(&mut self, state: &FilterSortState) {
        self.view.clear_filters();
        for (column, literal) in &state.filters {
            let criterion = self
                .columns
                .get(*column)
                .and_then(|entry| FilterCriterion::parse(literal, entry.affinity));
            match criterion {
                Some(criterion) => self.view.set_filter(*column, criterion),
                None => warn!(column, literal = literal.as_str(), "skipping restored filter"),
            }
        }
        self.view
            .set_sort(state.sort.filter(|key| key.column < self.columns.len()));
        self.view.recompute(&self.rows);
        self.fill_filtered_page();
    }

    /// With a filter active, read ahead until a chunk's worth of rows is
    /// visible or the source ends.
    fn fill_filtered_page(&mut self) {
        let page = self.config.seek_chunk.max(1);
        while self.view.has_filters()
            && self.view.visible().len() < page
            && !self.feeder.is_exhausted()
        {
            self.pull(page as u64);
        }
    }

    /// Header text for `column`, with the sort arrow and filter criterion.
    pub fn column_label(&self, column: usize) -> Option<String> {
        let entry = self.columns.get(column)?;
        let mut label = entry.name.clone();
        if let Some(key) = self.view.sort().filter(|key| key.column == column) {
            label.push_str(match key.direction {
                SortDirection::Ascending => " ↓",
                SortDirection::Descending => " ↑",
            });
        }
        if let Some(criterion) = self.view.filters().get(&column) {
            match criterion {
                FilterCriterion::Equals(_) => label.push_str(&format!("\n= {}", criterion.literal())),
                FilterCriterion::Contains(needle) => label.push_str(&format!("\nlike \"{}\"", needle)),
            }
        }
        Some(label)
    }

    /// SELECT equivalent to the grid's source with the current filter and
    /// sort applied.
    ///
    /// Tables with a rowid break sort ties by rowid, matching the grid's read
    /// order. Views and queries have no such key.
    pub fn select_sql(&self) -> Statement {
        let base = match &self.source {
            GridSource::Table(name) | GridSource::View(name) => object_scan(name, false),
            GridSource::Query(sql) => format!("SELECT * FROM ({})", sql.trim().trim_end_matches(';')),
        };
        let tie_break = match self.source {
            GridSource::Table(_) if self.row_locator => Some("_rowid_"),
            _ => None,
        };
        filtered_select(
            &base,
            &self.columns,
            self.view.filters(),
            self.view.sort(),
            tie_break,
        )
    }
}

#[cfg(test)]
mod tests;
