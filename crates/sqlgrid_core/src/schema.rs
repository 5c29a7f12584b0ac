//! Column descriptions and declared-type affinity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage type category of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Affinity {
    Integer,
    Real,
    Text,
    Blob,
    Unknown,
}

impl Affinity {
    /// Resolve the affinity of a declared column type.
    ///
    /// Follows SQLite's rules in order: `INT` → integer, `CHAR`/`CLOB`/`TEXT`
    /// → text, `BLOB` or no type → blob, `REAL`/`FLOA`/`DOUB` → real. Anything
    /// else (numeric, dates, booleans) has no fixed category here.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.trim().to_ascii_uppercase();
        if upper.contains("INT") {
            Affinity::Integer
        } else if ["CHAR", "CLOB", "TEXT"].iter().any(|t| upper.contains(t)) {
            Affinity::Text
        } else if upper.is_empty() || upper.contains("BLOB") {
            Affinity::Blob
        } else if ["REAL", "FLOA", "DOUB"].iter().any(|t| upper.contains(t)) {
            Affinity::Real
        } else {
            Affinity::Unknown
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Affinity::Integer | Affinity::Real)
    }
}

impl fmt::Display for Affinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Affinity::Integer => "INTEGER",
            Affinity::Real => "REAL",
            Affinity::Text => "TEXT",
            Affinity::Blob => "BLOB",
            Affinity::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// One column of a grid, fixed for the lifetime of the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub affinity: Affinity,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, affinity: Affinity) -> Self {
        Self {
            name: name.into(),
            affinity,
            primary_key: false,
        }
    }

    /// Mark this column as part of the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
}
