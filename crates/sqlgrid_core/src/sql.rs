//! SQL text generation for grid sources and filtered/sorted exports.

use crate::constants::ROW_LOCATOR_ALIAS;
use crate::grid::{FilterCriterion, SortDirection, SortKey};
use crate::schema::Column;
use crate::value::{Number, Value};
use std::collections::BTreeMap;

/// A statement plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Quote an identifier for use in SQL text.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Full scan of a table or view, optionally prefixed with the rowid locator.
pub fn object_scan(name: &str, with_locator: bool) -> String {
    if with_locator {
        format!(
            "SELECT _rowid_ AS {}, * FROM {}",
            quote_identifier(ROW_LOCATOR_ALIAS),
            quote_identifier(name)
        )
    } else {
        format!("SELECT * FROM {}", quote_identifier(name))
    }
}

/// Wrap `base` with WHERE/ORDER BY clauses equivalent to the in-memory
/// filter and sort.
///
/// Numeric criteria compare with `=`, text criteria use a case-sensitive
/// `instr` over the text rendering of the cell. Ordering puts NULL first in
/// both directions and compares text without regard to case.
///
/// `NOCASE` folds ASCII letters only, so non-ASCII text that differs only in
/// case may order differently than in the grid. Equal sort keys fall back to
/// `tie_break`, which should follow the source's read order.
pub fn filtered_select(
    base: &str,
    columns: &[Column],
    filters: &BTreeMap<usize, FilterCriterion>,
    sort: Option<SortKey>,
    tie_break: Option<&str>,
) -> Statement {
    let mut sql = base.to_string();
    let mut params = Vec::new();
    let mut predicates = Vec::new();

    for (index, criterion) in filters {
        let Some(column) = columns.get(*index) else {
            continue;
        };
        let name = quote_identifier(&column.name);
        match criterion {
            FilterCriterion::Equals(number) => {
                predicates.push(format!("{} = ?", name));
                params.push(match number {
                    Number::Integer(value) => Value::Integer(*value),
                    Number::Real(value) => Value::Real(*value),
                });
            }
            FilterCriterion::Contains(needle) => {
                predicates.push(format!(
                    "instr(COALESCE(CAST({} AS TEXT), ''), ?) > 0",
                    name
                ));
                params.push(Value::Text(needle.clone()));
            }
        }
    }
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    if let Some(key) = sort {
        if let Some(column) = columns.get(key.column) {
            let name = quote_identifier(&column.name);
            let direction = match key.direction {
                SortDirection::Ascending => "",
                SortDirection::Descending => " DESC",
            };
            sql.push_str(&format!(
                " ORDER BY ({} IS NULL) DESC, {} COLLATE NOCASE{}",
                name, name, direction
            ));
            if let Some(tie_break) = tie_break {
                sql.push_str(&format!(", {}", tie_break));
            }
        }
    }

    Statement { sql, params }
}
