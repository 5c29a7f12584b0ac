//! Store collaborator contract consumed by grid models.
//!
//! A grid never talks to a database directly: it issues statements through a
//! [`Store`] and pulls rows through the [`RowCursor`] the store hands back.

/// SQLite-backed store implementation.
pub mod sqlite;

pub use sqlite::{ObjectKind, SqliteStore};

use crate::error::StoreError;
use crate::schema::{Affinity, Column};
use crate::value::Value;

/// Forward-only row source produced by [`Store::execute`].
pub trait RowCursor {
    /// Column names in the order values are yielded.
    fn columns(&self) -> &[String];

    /// Pull the next row.
    ///
    /// # Returns
    /// `Ok(Some(values))` for a row, `Ok(None)` once the source is exhausted.
    ///
    /// # Errors
    /// Returns an error when the underlying statement fails mid-read.
    fn next_row(&mut self) -> Result<Option<Vec<Value>>, StoreError>;
}

/// Database access needed by grid models.
///
/// Write operations receive the grid's column list so implementations can
/// build statements without their own schema lookups.
pub trait Store {
    /// Run a query and return a cursor over its rows.
    ///
    /// # Errors
    /// Returns an error when the statement cannot be prepared or bound.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<Box<dyn RowCursor>, StoreError>;

    /// Count all rows in `table`.
    ///
    /// # Errors
    /// Returns an error when the count query fails.
    fn scalar_count(&self, table: &str) -> Result<u64, StoreError>;

    /// Update one row, located by `source_row_id` when present, otherwise by
    /// matching `original_values`.
    ///
    /// # Errors
    /// Returns an error when the statement fails.
    fn update_row(
        &self,
        table: &str,
        columns: &[Column],
        new_values: &[Value],
        original_values: &[Value],
        source_row_id: Option<&Value>,
    ) -> Result<(), StoreError>;

    /// Insert one row.
    ///
    /// # Returns
    /// The store-assigned row identifier, when the table has one.
    ///
    /// # Errors
    /// Returns an error when the statement fails.
    fn insert_row(
        &self,
        table: &str,
        columns: &[Column],
        values: &[Value],
    ) -> Result<Option<Value>, StoreError>;

    /// Delete one row, located the same way as [`Store::update_row`].
    ///
    /// # Errors
    /// Returns an error when the statement fails.
    fn delete_row(
        &self,
        table: &str,
        columns: &[Column],
        values: &[Value],
        source_row_id: Option<&Value>,
    ) -> Result<(), StoreError>;

    /// Resolve the affinity of a declared column type.
    fn column_affinity(&self, declared_type: &str) -> Affinity {
        Affinity::from_declared(declared_type)
    }

    /// Describe the columns of a table or view.
    ///
    /// # Errors
    /// Returns an error when introspection fails.
    fn table_columns(&self, name: &str) -> Result<Vec<Column>, StoreError>;

    /// Whether rows of `table` can be addressed by a physical locator.
    ///
    /// # Errors
    /// Returns an error when introspection fails.
    fn has_row_locator(&self, table: &str) -> Result<bool, StoreError>;
}
