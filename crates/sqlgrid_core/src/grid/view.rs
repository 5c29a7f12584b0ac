//! Filter/sort engine producing the visible order of rows.

use super::rows::{RowEntry, RowId, RowState, RowStore};
use crate::schema::Affinity;
use crate::value::{compare_values, parse_number, Number, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Criterion for one filtered column.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCriterion {
    /// Numeric columns: exact equality after numeric coercion.
    Equals(Number),
    /// Other columns: case-sensitive substring of the cell text.
    Contains(String),
}

impl FilterCriterion {
    /// Build a criterion for a column of `affinity`.
    ///
    /// # Returns
    /// `None` when `literal` does not coerce to a number on a numeric column.
    pub fn parse(literal: &str, affinity: Affinity) -> Option<Self> {
        if affinity.is_numeric() {
            parse_number(literal).map(FilterCriterion::Equals)
        } else {
            Some(FilterCriterion::Contains(literal.to_string()))
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FilterCriterion::Equals(expected) => value
                .as_number()
                .map(|actual| actual.equals(*expected))
                .unwrap_or(false),
            FilterCriterion::Contains(needle) => value.to_text().contains(needle.as_str()),
        }
    }

    /// Literal form, accepted back by [`FilterCriterion::parse`].
    pub fn literal(&self) -> String {
        match self {
            FilterCriterion::Equals(Number::Integer(value)) => value.to_string(),
            FilterCriterion::Equals(Number::Real(value)) => value.to_string(),
            FilterCriterion::Contains(needle) => needle.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Active sort: one column and a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: usize,
    pub direction: SortDirection,
}

/// Filter and sort settings in a form that survives a grid rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSortState {
    /// Column index to filter literal.
    pub filters: BTreeMap<usize, String>,
    pub sort: Option<SortKey>,
}

/// Order two cells under `direction`; NULL leads in both directions.
pub fn sort_order(a: &Value, b: &Value, direction: SortDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => {
            let ordering = compare_values(a, b);
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ViewState {
    filters: BTreeMap<usize, FilterCriterion>,
    sort: Option<SortKey>,
    visible: Vec<RowId>,
}

impl ViewState {
    pub(crate) fn visible(&self) -> &[RowId] {
        &self.visible
    }

    pub(crate) fn filters(&self) -> &BTreeMap<usize, FilterCriterion> {
        &self.filters
    }

    pub(crate) fn sort(&self) -> Option<SortKey> {
        self.sort
    }

    pub(crate) fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    pub(crate) fn set_filter(&mut self, column: usize, criterion: FilterCriterion) {
        self.filters.insert(column, criterion);
    }

    pub(crate) fn remove_filter(&mut self, column: usize) -> bool {
        self.filters.remove(&column).is_some()
    }

    pub(crate) fn clear_filters(&mut self) -> bool {
        let had = !self.filters.is_empty();
        self.filters.clear();
        had
    }

    pub(crate) fn set_sort(&mut self, sort: Option<SortKey>) {
        self.sort = sort;
    }

    /// Advance the sort cycle for `column`: ascending, then descending, then
    /// back to intake order.
    pub(crate) fn cycle_sort(&mut self, column: usize) {
        self.sort = match self.sort {
            Some(SortKey {
                column: current,
                direction: SortDirection::Ascending,
            }) if current == column => Some(SortKey {
                column,
                direction: SortDirection::Descending,
            }),
            Some(SortKey {
                column: current,
                direction: SortDirection::Descending,
            }) if current == column => None,
            _ => Some(SortKey {
                column,
                direction: SortDirection::Ascending,
            }),
        };
    }

    /// Whether a row belongs in the visible order.
    ///
    /// Local inserts bypass filters so they stay editable.
    pub(crate) fn admits(&self, entry: &RowEntry) -> bool {
        match entry.state() {
            RowState::Deleted => false,
            RowState::Inserted => true,
            RowState::Unmodified | RowState::Modified => {
                self.filters.iter().all(|(column, criterion)| {
                    entry
                        .values
                        .get(*column)
                        .map(|value| criterion.matches(value))
                        .unwrap_or(false)
                })
            }
        }
    }

    /// Rebuild the visible order from intake order.
    ///
    /// Pending inserts stay pinned at the top; the remaining rows are
    /// filtered and stably sorted, so ties keep intake order.
    pub(crate) fn recompute(&mut self, rows: &RowStore) {
        let mut pinned = Vec::new();
        let mut rest = Vec::new();
        for entry in rows.entries_in_intake_order() {
            if entry.state() == RowState::Inserted {
                pinned.push(entry.id);
            } else if self.admits(entry) {
                rest.push(entry.id);
            }
        }
        if let Some(key) = self.sort {
            rest.sort_by(|a, b| {
                let left = rows.get(*a).and_then(|entry| entry.values.get(key.column));
                let right = rows.get(*b).and_then(|entry| entry.values.get(key.column));
                match (left, right) {
                    (Some(left), Some(right)) => sort_order(left, right, key.direction),
                    _ => Ordering::Equal,
                }
            });
        }
        pinned.extend(rest);
        self.visible = pinned;
    }

    /// Take newly materialized rows into the visible order.
    pub(crate) fn admit_new(&mut self, fresh: &[RowId], rows: &RowStore) {
        if fresh.is_empty() {
            return;
        }
        if self.sort.is_some() {
            self.recompute(rows);
            return;
        }
        for id in fresh {
            if rows.get(*id).map(|entry| self.admits(entry)).unwrap_or(false) {
                self.visible.push(*id);
            }
        }
    }

    pub(crate) fn prepend(&mut self, id: RowId) {
        self.visible.insert(0, id);
    }

    pub(crate) fn remove(&mut self, id: RowId) {
        self.visible.retain(|existing| *existing != id);
    }
}
