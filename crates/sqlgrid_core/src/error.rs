//! Error types for store access and grid model operations.
use crate::grid::RowId;
use thiserror::Error;

/// Failure reported by a [`crate::store::Store`] implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cursor reader stopped: {0}")]
    CursorClosed(String),

    #[error("Store error: {0}")]
    Message(String),
}

/// Errors surfaced by a grid model to its caller.
///
/// Cursor exhaustion and rejected filter literals are handled inside the
/// model and never appear here.
#[derive(Error, Debug)]
pub enum GridError {
    #[error("Grid is backed by a view or query and cannot be edited")]
    ReadOnlyTarget,

    #[error("Saving row {row} failed: {source}")]
    CommitFailure {
        row: RowId,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Change bundle does not match this grid: {0}")]
    IncompatibleBundle(String),

    #[error("Change bundle encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

impl From<rusqlite::Error> for GridError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(value.into())
    }
}
