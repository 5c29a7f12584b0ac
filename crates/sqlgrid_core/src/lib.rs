//! Core library for sqlgrid (grid model, store contract, SQLite store).

/// Configuration loading and defaults.
pub mod config;
/// Shared constants.
pub mod constants;
/// Error types for stores and grid models.
pub mod error;
/// Lazily materialized, editable result grid.
pub mod grid;
/// Column descriptions and affinity.
pub mod schema;
/// SQL text generation.
pub mod sql;
/// Store contract and the SQLite implementation.
pub mod store;
/// Cell values and ordering.
pub mod value;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::GridConfig;
pub use error::{GridError, StoreError};
pub use grid::{
    CellState, ChangeBundle, ExportRows, FilterCriterion, FilterSortState, GridModel, GridSource,
    RowId, RowSnapshot, RowState, SaveReport, SortDirection, SortKey,
};
pub use schema::{Affinity, Column};
pub use store::{ObjectKind, RowCursor, SqliteStore, Store};
pub use value::Value;
