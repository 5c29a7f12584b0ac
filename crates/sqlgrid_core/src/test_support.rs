//! Shared test-only helpers for sqlgrid_core.

use crate::config::GridConfig;
use crate::constants::ROW_LOCATOR_ALIAS;
use crate::error::StoreError;
use crate::schema::Column;
use crate::store::{RowCursor, SqliteStore, Store};
use crate::value::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tempfile::TempDir;

/// A write recorded by [`ScriptedStore`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Recorded {
    Update {
        values: Vec<Value>,
        original: Vec<Value>,
        locator: Option<Value>,
    },
    Insert {
        values: Vec<Value>,
    },
    Delete {
        values: Vec<Value>,
        locator: Option<Value>,
    },
}

/// In-memory store serving canned rows, counting reads and recording writes.
///
/// Row locators, when enabled, are the 1-based source position.
pub(crate) struct ScriptedStore {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
    locators: bool,
    cursor_fails_after: Option<usize>,
    writes_fail_after: Option<usize>,
    reads: Arc<AtomicUsize>,
    executed: Mutex<Vec<String>>,
    writes: Mutex<Vec<Recorded>>,
    next_locator: AtomicUsize,
}

impl ScriptedStore {
    pub(crate) fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        let next_locator = AtomicUsize::new(rows.len() + 1);
        Self {
            columns,
            rows,
            locators: false,
            cursor_fails_after: None,
            writes_fail_after: None,
            reads: Arc::new(AtomicUsize::new(0)),
            executed: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            next_locator,
        }
    }

    /// Serve rowid-style locators with table scans.
    pub(crate) fn with_locators(mut self) -> Self {
        self.locators = true;
        self
    }

    /// Make cursors fail once `rows` rows have been served.
    pub(crate) fn cursor_fails_after(mut self, rows: usize) -> Self {
        self.cursor_fails_after = Some(rows);
        self
    }

    /// Make writes fail once `writes` writes have succeeded.
    pub(crate) fn writes_fail_after(mut self, writes: usize) -> Self {
        self.writes_fail_after = Some(writes);
        self
    }

    pub(crate) fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Rows served by all cursors so far.
    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub(crate) fn executed(&self) -> Vec<String> {
        self.executed.lock().expect("executed lock").clone()
    }

    pub(crate) fn writes(&self) -> Vec<Recorded> {
        self.writes.lock().expect("writes lock").clone()
    }

    fn record(&self, write: Recorded) -> Result<(), StoreError> {
        let mut writes = self.writes.lock().expect("writes lock");
        if let Some(limit) = self.writes_fail_after {
            if writes.len() >= limit {
                return Err(StoreError::Message("injected write failure".to_string()));
            }
        }
        writes.push(write);
        Ok(())
    }
}

struct ScriptedCursor {
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
    served: usize,
    fails_after: Option<usize>,
    reads: Arc<AtomicUsize>,
}

impl RowCursor for ScriptedCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>, StoreError> {
        if self.fails_after == Some(self.served) {
            return Err(StoreError::CursorClosed("injected cursor failure".to_string()));
        }
        let row = self.rows.pop_front();
        if row.is_some() {
            self.served += 1;
            self.reads.fetch_add(1, Ordering::SeqCst);
        }
        Ok(row)
    }
}

impl Store for ScriptedStore {
    fn execute(&self, sql: &str, _params: &[Value]) -> Result<Box<dyn RowCursor>, StoreError> {
        self.executed
            .lock()
            .expect("executed lock")
            .push(sql.to_string());
        let with_locator = self.locators && sql.contains(ROW_LOCATOR_ALIAS);
        let mut columns: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        let mut rows: VecDeque<Vec<Value>> = self.rows.iter().cloned().collect();
        if with_locator {
            columns.insert(0, ROW_LOCATOR_ALIAS.to_string());
            for (index, row) in rows.iter_mut().enumerate() {
                row.insert(0, Value::Integer(index as i64 + 1));
            }
        }
        Ok(Box::new(ScriptedCursor {
            columns,
            rows,
            served: 0,
            fails_after: self.cursor_fails_after,
            reads: Arc::clone(&self.reads),
        }))
    }

    fn scalar_count(&self, _table: &str) -> Result<u64, StoreError> {
        Ok(self.rows.len() as u64)
    }

    fn update_row(
        &self,
        _table: &str,
        _columns: &[Column],
        new_values: &[Value],
        original_values: &[Value],
        source_row_id: Option<&Value>,
    ) -> Result<(), StoreError> {
        self.record(Recorded::Update {
            values: new_values.to_vec(),
            original: original_values.to_vec(),
            locator: source_row_id.cloned(),
        })
    }

    fn insert_row(
        &self,
        _table: &str,
        _columns: &[Column],
        values: &[Value],
    ) -> Result<Option<Value>, StoreError> {
        self.record(Recorded::Insert {
            values: values.to_vec(),
        })?;
        if self.locators {
            let locator = self.next_locator.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Value::Integer(locator as i64)))
        } else {
            Ok(None)
        }
    }

    fn delete_row(
        &self,
        _table: &str,
        _columns: &[Column],
        values: &[Value],
        source_row_id: Option<&Value>,
    ) -> Result<(), StoreError> {
        self.record(Recorded::Delete {
            values: values.to_vec(),
            locator: source_row_id.cloned(),
        })
    }

    fn table_columns(&self, _name: &str) -> Result<Vec<Column>, StoreError> {
        Ok(self.columns.clone())
    }

    fn has_row_locator(&self, _table: &str) -> Result<bool, StoreError> {
        Ok(self.locators)
    }
}

/// Grid config that reads nothing until asked.
pub(crate) fn lazy_config() -> GridConfig {
    GridConfig::default().with_prefetch(false)
}

/// Creates a temporary SQLite database initialized with `schema`.
///
/// Keep the [`TempDir`] alive for the full test to preserve the backing file.
///
/// # Panics
/// Panics if temp-dir creation, opening, or schema setup fails.
pub(crate) fn setup_temp_sqlite(schema: &str) -> (Arc<SqliteStore>, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let store = SqliteStore::open(temp_dir.path().join("grid.db"), GridConfig::default())
        .expect("open sqlite");
    store
        .connection()
        .execute_batch(schema)
        .expect("schema setup");
    (Arc::new(store), temp_dir)
}

/// Environment overrides for one test, restored on drop.
///
/// Holds a process-wide lock for its whole life, so tests touching the
/// environment run one at a time.
pub(crate) struct ScopedEnv {
    saved: Vec<(String, Option<String>)>,
    _lock: MutexGuard<'static, ()>,
}

impl ScopedEnv {
    pub(crate) fn lock() -> Self {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        let guard = LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Self {
            saved: Vec::new(),
            _lock: guard,
        }
    }

    pub(crate) fn set(&mut self, key: &str, value: &str) -> &mut Self {
        self.save(key);
        std::env::set_var(key, value);
        self
    }

    pub(crate) fn remove(&mut self, key: &str) -> &mut Self {
        self.save(key);
        std::env::remove_var(key);
        self
    }

    fn save(&mut self, key: &str) {
        if !self.saved.iter().any(|(saved, _)| saved == key) {
            self.saved.push((key.to_string(), std::env::var(key).ok()));
        }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (key, previous) in self.saved.drain(..).rev() {
            match previous {
                Some(value) => std::env::set_var(&key, value),
                None => std::env::remove_var(&key),
            }
        }
    }
}
