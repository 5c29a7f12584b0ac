//! SQLite store backed by rusqlite.
//!
//! Writes run on the store's own connection, one autocommitted statement per
//! row. Queries stream from a reader thread that opens its own read-only
//! connection and feeds rows through a bounded channel, so a cursor can
//! outlive the call that created it without borrowing the connection.
//!
//! The file is switched to WAL journaling on open. A reader parked on a full
//! channel keeps its read transaction open, and only WAL lets the write
//! connection commit underneath it.

use super::{RowCursor, Store};
use crate::config::GridConfig;
use crate::error::StoreError;
use crate::schema::Column;
use crate::sql::quote_identifier;
use crate::value::Value;
use crossbeam_channel::{Receiver, Sender};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, ToSql};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Kind of schema object a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    View,
}

/// Store over one SQLite database file.
pub struct SqliteStore {
    path: PathBuf,
    conn: Connection,
    config: GridConfig,
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(value) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*value)),
            Value::Real(value) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*value)),
            Value::Text(text) => ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes())),
            Value::Blob(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes)),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(value) => Value::Integer(value),
            ValueRef::Real(value) => Value::Real(value),
            ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
        }
    }
}

enum ReaderMsg {
    Columns(Vec<String>),
    Row(Vec<Value>),
    Failed(rusqlite::Error),
}

struct SqliteCursor {
    columns: Vec<String>,
    rx: Receiver<ReaderMsg>,
    finished: bool,
}

impl RowCursor for SqliteCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>, StoreError> {
        if self.finished {
            return Ok(None);
        }
        match self.rx.recv() {
            Ok(ReaderMsg::Row(values)) => Ok(Some(values)),
            Ok(ReaderMsg::Failed(err)) => {
                self.finished = true;
                Err(err.into())
            }
            Ok(ReaderMsg::Columns(_)) => {
                self.finished = true;
                Err(StoreError::CursorClosed(
                    "reader sent a second column header".to_string(),
                ))
            }
            // Sender dropped: statement stepped past its last row.
            Err(_) => {
                self.finished = true;
                Ok(None)
            }
        }
    }
}

fn stream_rows(
    path: &Path,
    sql: &str,
    params: &[Value],
    tx: &Sender<ReaderMsg>,
) -> rusqlite::Result<()> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let width = columns.len();
    if tx.send(ReaderMsg::Columns(columns)).is_err() {
        return Ok(());
    }

    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    while let Some(row) = rows.next()? {
        let values = (0..width)
            .map(|index| row.get_ref(index).map(Value::from))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if tx.send(ReaderMsg::Row(values)).is_err() {
            // Cursor dropped before exhaustion.
            return Ok(());
        }
    }
    Ok(())
}

fn key_predicate(
    columns: &[Column],
    values: &[Value],
    source_row_id: Option<&Value>,
) -> (String, Vec<Value>) {
    if let Some(locator) = source_row_id {
        return ("_rowid_ IS ?".to_string(), vec![locator.clone()]);
    }
    let has_pk = columns.iter().any(|column| column.primary_key);
    let mut parts = Vec::new();
    let mut params = Vec::new();
    for (column, value) in columns.iter().zip(values) {
        if has_pk && !column.primary_key {
            continue;
        }
        parts.push(format!("{} IS ?", quote_identifier(&column.name)));
        params.push(value.clone());
    }
    (parts.join(" AND "), params)
}

fn is_without_rowid(create_sql: &str) -> bool {
    let tail = create_sql
        .rfind(')')
        .map(|pos| &create_sql[pos + 1..])
        .unwrap_or("");
    tail.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
        .contains("WITHOUT ROWID")
}

impl SqliteStore {
    /// Open a database file, creating it when missing.
    ///
    /// Query cursors reopen the same path read-only, so in-memory databases
    /// are not supported. The journal mode is set to WAL, which persists in
    /// the file.
    ///
    /// # Errors
    /// Returns an error when SQLite cannot open the file or set the journal
    /// mode.
    pub fn open(path: impl AsRef<Path>, config: GridConfig) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            warn!(
                path = %path.display(),
                mode = mode.as_str(),
                "database stayed out of WAL mode; saves wait on open cursors"
            );
        }
        Ok(Self { path, conn, config })
    }

    /// Journal mode currently in effect on the write connection.
    ///
    /// # Errors
    /// Returns an error when the pragma query fails.
    pub fn journal_mode(&self) -> Result<String, StoreError> {
        Ok(self
            .conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))?)
    }

    /// Underlying write connection, for schema setup and direct statements.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Look up whether `name` is a table or a view.
    ///
    /// # Errors
    /// Returns an error when the schema query fails.
    pub fn object_kind(&self, name: &str) -> Result<Option<ObjectKind>, StoreError> {
        let kind: Option<String> = self
            .conn
            .query_row(
                "SELECT type FROM sqlite_master WHERE name = ?1 COLLATE NOCASE \
                 AND type IN ('table', 'view')",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(kind.map(|kind| {
            if kind == "view" {
                ObjectKind::View
            } else {
                ObjectKind::Table
            }
        }))
    }

    fn log_statement(&self, sql: &str, params: &[Value]) {
        if self.config.log_sql {
            debug!(target: "sqlgrid::sql", sql = sql, params = ?params, "executing statement");
        }
    }

    fn run_write(&self, sql: &str, params: &[Value]) -> Result<usize, StoreError> {
        self.log_statement(sql, params);
        Ok(self.conn.execute(sql, params_from_iter(params.iter()))?)
    }
}

impl Store for SqliteStore {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<Box<dyn RowCursor>, StoreError> {
        self.log_statement(sql, params);
        let (tx, rx) = crossbeam_channel::bounded(self.config.cursor_buffer.max(1));
        let path = self.path.clone();
        let sql = sql.to_string();
        let params = params.to_vec();
        thread::Builder::new()
            .name("sqlgrid-reader".to_string())
            .spawn(move || {
                if let Err(err) = stream_rows(&path, &sql, &params, &tx) {
                    let _ = tx.send(ReaderMsg::Failed(err));
                }
            })
            .map_err(|err| StoreError::Message(format!("failed to spawn reader: {}", err)))?;

        match rx.recv() {
            Ok(ReaderMsg::Columns(columns)) => Ok(Box::new(SqliteCursor {
                columns,
                rx,
                finished: false,
            })),
            Ok(ReaderMsg::Failed(err)) => Err(err.into()),
            Ok(ReaderMsg::Row(_)) => Err(StoreError::CursorClosed(
                "reader sent rows before the column header".to_string(),
            )),
            Err(_) => Err(StoreError::CursorClosed(
                "reader exited before preparing the statement".to_string(),
            )),
        }
    }

    fn scalar_count(&self, table: &str) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
        self.log_statement(&sql, &[]);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn update_row(
        &self,
        table: &str,
        columns: &[Column],
        new_values: &[Value],
        original_values: &[Value],
        source_row_id: Option<&Value>,
    ) -> Result<(), StoreError> {
        let assignments = columns
            .iter()
            .map(|column| format!("{} = ?", quote_identifier(&column.name)))
            .collect::<Vec<_>>()
            .join(", ");
        let (predicate, key_params) = key_predicate(columns, original_values, source_row_id);
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_identifier(table),
            assignments,
            predicate
        );
        let mut params = new_values.to_vec();
        params.extend(key_params);
        let affected = self.run_write(&sql, &params)?;
        if affected == 0 {
            warn!(table = table, "update matched no rows");
        }
        Ok(())
    }

    fn insert_row(
        &self,
        table: &str,
        columns: &[Column],
        values: &[Value],
    ) -> Result<Option<Value>, StoreError> {
        let names = columns
            .iter()
            .map(|column| quote_identifier(&column.name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            names,
            placeholders
        );
        self.run_write(&sql, values)?;
        if self.has_row_locator(table)? {
            Ok(Some(Value::Integer(self.conn.last_insert_rowid())))
        } else {
            Ok(None)
        }
    }

    fn delete_row(
        &self,
        table: &str,
        columns: &[Column],
        values: &[Value],
        source_row_id: Option<&Value>,
    ) -> Result<(), StoreError> {
        let (predicate, params) = key_predicate(columns, values, source_row_id);
        let sql = format!("DELETE FROM {} WHERE {}", quote_identifier(table), predicate);
        let affected = self.run_write(&sql, &params)?;
        if affected == 0 {
            warn!(table = table, "delete matched no rows");
        }
        Ok(())
    }

    fn table_columns(&self, name: &str) -> Result<Vec<Column>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid")?;
        let rows = stmt.query_map(params![name], |row| {
            let name: String = row.get(0)?;
            let declared: Option<String> = row.get(1)?;
            let pk: i64 = row.get(2)?;
            Ok((name, declared.unwrap_or_default(), pk > 0))
        })?;

        let mut columns = Vec::new();
        for row in rows {
            let (name, declared, primary_key) = row?;
            columns.push(Column {
                name,
                affinity: self.column_affinity(&declared),
                primary_key,
            });
        }
        Ok(columns)
    }

    fn has_row_locator(&self, table: &str) -> Result<bool, StoreError> {
        let entry: Option<(String, Option<String>)> = self
            .conn
            .query_row(
                "SELECT type, sql FROM sqlite_master WHERE name = ?1 COLLATE NOCASE \
                 AND type IN ('table', 'view')",
                params![table],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(match entry {
            Some((kind, sql)) if kind == "table" => {
                !sql.as_deref().map(is_without_rowid).unwrap_or(false)
            }
            _ => false,
        })
    }
}
