//! Grid configuration loaded from environment variables.

use crate::constants::{
    DEFAULT_CURSOR_BUFFER, DEFAULT_SEEK_CHUNK_LENGTH, ENV_CURSOR_BUFFER, ENV_LOG_SQL,
    ENV_SEEK_CHUNK,
};
use serde::{Deserialize, Serialize};
use std::env;

/// Runtime configuration shared by grid models and the SQLite store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Rows materialized per cooperative seek step.
    pub seek_chunk: usize,
    /// Capacity of the reader-thread channel behind a SQLite cursor.
    pub cursor_buffer: usize,
    /// Log every executed statement at debug level.
    pub log_sql: bool,
    /// Read one chunk as soon as a grid is constructed.
    pub prefetch: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            seek_chunk: DEFAULT_SEEK_CHUNK_LENGTH,
            cursor_buffer: DEFAULT_CURSOR_BUFFER,
            log_sql: false,
            prefetch: true,
        }
    }
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Returns
/// `Some(bool)` when the value is recognized, otherwise `None`.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean flag from the environment.
///
/// Missing or unrecognized values are treated as `false`.
pub fn env_flag_enabled(name: &str) -> bool {
    env::var(name)
        .ok()
        .and_then(|value| parse_env_flag(&value))
        .unwrap_or(false)
}

fn env_positive_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

impl GridConfig {
    /// Load configuration from environment variables.
    ///
    /// # Returns
    /// A populated [`GridConfig`] with defaults applied when env vars are
    /// missing, unparsable, or zero.
    pub fn from_env() -> Self {
        Self {
            seek_chunk: env_positive_usize(ENV_SEEK_CHUNK, DEFAULT_SEEK_CHUNK_LENGTH),
            cursor_buffer: env_positive_usize(ENV_CURSOR_BUFFER, DEFAULT_CURSOR_BUFFER),
            log_sql: env_flag_enabled(ENV_LOG_SQL),
            prefetch: true,
        }
    }

    /// Override the seek chunk length, clamped to at least one row.
    pub fn with_seek_chunk(mut self, seek_chunk: usize) -> Self {
        self.seek_chunk = seek_chunk.max(1);
        self
    }

    /// Enable or disable the initial chunk read on construction.
    pub fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_env_flag, GridConfig};
    use crate::constants::{ENV_CURSOR_BUFFER, ENV_LOG_SQL, ENV_SEEK_CHUNK};
    use crate::test_support::ScopedEnv;

    #[test]
    fn parse_env_flag_accepts_truthy_values() {
        for value in ["1", "true", "TRUE", " yes ", "on"] {
            assert_eq!(parse_env_flag(value), Some(true), "value: {}", value);
        }
    }

    #[test]
    fn parse_env_flag_accepts_falsy_values() {
        for value in ["", "0", "false", "FALSE", " no ", "off"] {
            assert_eq!(parse_env_flag(value), Some(false), "value: {}", value);
        }
    }

    #[test]
    fn parse_env_flag_rejects_unknown_values() {
        assert_eq!(parse_env_flag("maybe"), None);
        assert_eq!(parse_env_flag("enabled"), None);
    }

    #[test]
    fn from_env_reads_overrides() {
        let mut env = ScopedEnv::lock();
        env.set(ENV_SEEK_CHUNK, "25")
            .set(ENV_CURSOR_BUFFER, "8")
            .set(ENV_LOG_SQL, "yes");

        let config = GridConfig::from_env();
        assert_eq!(config.seek_chunk, 25);
        assert_eq!(config.cursor_buffer, 8);
        assert!(config.log_sql);
    }

    #[test]
    fn from_env_falls_back_on_zero_or_garbage() {
        let mut env = ScopedEnv::lock();
        env.set(ENV_SEEK_CHUNK, "0")
            .set(ENV_CURSOR_BUFFER, "lots")
            .remove(ENV_LOG_SQL);

        assert_eq!(GridConfig::from_env(), GridConfig::default());
    }

    #[test]
    fn overrides_are_restored_after_the_test_scope() {
        let before = {
            let _env = ScopedEnv::lock();
            std::env::var(ENV_SEEK_CHUNK).ok()
        };
        {
            let mut env = ScopedEnv::lock();
            env.set(ENV_SEEK_CHUNK, "7").set(ENV_SEEK_CHUNK, "9");
            assert_eq!(GridConfig::from_env().seek_chunk, 9);
        }
        let _env = ScopedEnv::lock();
        assert_eq!(std::env::var(ENV_SEEK_CHUNK).ok(), before);
    }

    #[test]
    fn with_seek_chunk_never_drops_to_zero() {
        assert_eq!(GridConfig::default().with_seek_chunk(0).seek_chunk, 1);
    }
}
