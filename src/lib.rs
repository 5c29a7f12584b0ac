//! Root crate facade for sqlgrid.
//!
//! Re-exports the grid model and SQLite store from `sqlgrid_core`.

pub use sqlgrid_core::{
    config, constants, error, grid, schema, sql, store, value, Affinity, CellState,
    ChangeBundle, Column, ExportRows, FilterCriterion, FilterSortState, GridConfig, GridError,
    GridModel, GridSource, ObjectKind, RowCursor, RowId, RowSnapshot, RowState, SaveReport,
    SortDirection, SortKey, SqliteStore, Store, StoreError, Value,
};
