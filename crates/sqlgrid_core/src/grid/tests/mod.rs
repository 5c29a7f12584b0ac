//! Grid model tests.

use super::*;
use crate::test_support::{lazy_config, Recorded, ScriptedStore};

fn people_columns() -> Vec<Column> {
    vec![
        Column::new("id", Affinity::Integer).primary_key(),
        Column::new("name", Affinity::Text),
        Column::new("score", Affinity::Real),
    ]
}

fn person(id: i64, name: &str, score: Option<f64>) -> Vec<Value> {
    vec![Value::Integer(id), Value::from(name), Value::from(score)]
}

fn people_rows() -> Vec<Vec<Value>> {
    vec![
        person(1, "Alice", Some(3.5)),
        person(2, "bob", None),
        person(3, "Carol", Some(1.0)),
        person(4, "dave", Some(2.0)),
        person(5, "Eve", None),
    ]
}

fn people_store() -> Arc<ScriptedStore> {
    ScriptedStore::new(people_columns(), people_rows())
        .with_locators()
        .into_arc()
}

fn table_grid(store: &Arc<ScriptedStore>) -> GridModel {
    GridModel::for_table(store.clone(), "people", lazy_config()).expect("table grid")
}

/// Names of every visible row, reading the source as needed.
fn all_names(grid: &mut GridModel) -> Vec<String> {
    let mut names = Vec::new();
    let mut index = 0;
    while let Some(value) = grid.value_at(index, 1) {
        names.push(value.to_text().into_owned());
        index += 1;
    }
    names
}

/// Names of the rows visible right now, without reading ahead.
fn visible_names(grid: &GridModel) -> Vec<String> {
    grid.visible_ids()
        .iter()
        .filter_map(|id| grid.value(*id, 1))
        .map(|value| value.to_text().into_owned())
        .collect()
}

mod basic_ops;
