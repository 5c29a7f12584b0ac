//! Shared constants used across sqlgrid crates.

/// Default number of rows materialized per cooperative seek step.
pub const DEFAULT_SEEK_CHUNK_LENGTH: usize = 100;

/// Default capacity of the channel between a SQLite reader thread and its cursor.
pub const DEFAULT_CURSOR_BUFFER: usize = 256;

/// Column alias used to carry the SQLite rowid alongside table columns.
pub const ROW_LOCATOR_ALIAS: &str = "__sqlgrid_rowid__";

/// Environment variable overriding the seek chunk length.
pub const ENV_SEEK_CHUNK: &str = "SQLGRID_SEEK_CHUNK";
/// Environment variable overriding the reader channel capacity.
pub const ENV_CURSOR_BUFFER: &str = "SQLGRID_CURSOR_BUFFER";
/// Environment flag enabling statement logging.
pub const ENV_LOG_SQL: &str = "SQLGRID_LOG_SQL";
