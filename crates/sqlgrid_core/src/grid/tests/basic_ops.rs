//! Materialization and change-tracking tests.

use super::*;

#[test]
fn construction_prefetches_one_chunk() {
    let store = people_store();
    let grid = GridModel::for_table(
        store.clone(),
        "people",
        GridConfig::default().with_seek_chunk(2),
    )
    .expect("grid");

    assert_eq!(store.reads(), 2);
    assert_eq!(grid.materialized_count(), 2);
    assert_eq!(grid.row_count(), 5);
    assert!(!grid.is_complete());
}

#[test]
fn table_row_count_is_known_before_reading() {
    let store = people_store();
    let mut grid = table_grid(&store);
    assert_eq!(store.reads(), 0);
    assert_eq!(grid.row_count(), 5);

    grid.advance_to(1);
    assert_eq!(grid.materialized_count(), 2);
    assert_eq!(grid.row_count(), 5);
}

#[test]
fn query_grid_counts_only_rows_read() {
    let store = people_store();
    let mut grid = GridModel::for_query(store.clone(), "SELECT * FROM people", lazy_config())
        .expect("query grid");
    assert_eq!(grid.row_count(), 0);

    grid.advance_to(1);
    assert_eq!(grid.row_count(), 2);

    grid.advance_to(99);
    assert_eq!(grid.row_count(), 5);
    assert!(grid.is_complete());

    grid.advance_to(99);
    grid.advance_to(3);
    assert_eq!(store.reads(), 5);
    assert_eq!(grid.row_count(), 5);
}

#[test]
fn value_at_reads_ahead_in_chunks() {
    let store = people_store();
    let mut grid = GridModel::for_table(store.clone(), "people", lazy_config().with_seek_chunk(2))
        .expect("grid");

    assert_eq!(grid.value_at(2, 1), Some(&Value::from("Carol")));
    assert_eq!(store.reads(), 4);

    assert_eq!(grid.value_at(9, 1), None);
    assert!(grid.is_complete());
    assert_eq!(grid.row_count(), 5);
    assert_eq!(store.reads(), 5);
}

#[test]
fn table_scan_carries_row_locators() {
    let store = people_store();
    let mut grid = table_grid(&store);
    let snapshot = grid.row_snapshot(2).expect("row");
    assert_eq!(snapshot.values, person(3, "Carol", Some(1.0)));
    assert_eq!(snapshot.source_row_id, Some(Value::Integer(3)));
    assert!(grid.has_row_locator());
    assert!(store.executed()[0].contains(crate::constants::ROW_LOCATOR_ALIAS));
}

#[test]
fn cursor_failure_ends_source_and_keeps_rows() {
    let store = ScriptedStore::new(people_columns(), people_rows())
        .cursor_fails_after(3)
        .into_arc();
    let mut grid = table_grid(&store);

    grid.seek_to_end();
    assert!(grid.is_complete());
    assert_eq!(grid.materialized_count(), 3);
    assert_eq!(grid.row_count(), 3);
    assert_eq!(all_names(&mut grid), ["Alice", "bob", "Carol"]);
}

#[test]
fn edit_back_to_original_leaves_no_changes() {
    let store = people_store();
    let mut grid = table_grid(&store);
    let id = grid.row_id_at(0).expect("row");

    assert!(grid.set_value(id, 1, Value::from("Alicia")).expect("edit"));
    assert_eq!(grid.row_state(id), Some(RowState::Modified));
    assert!(grid.has_changes());

    assert!(grid.set_value(id, 1, Value::from("Alice")).expect("edit back"));
    assert_eq!(grid.row_state(id), Some(RowState::Unmodified));
    assert!(!grid.has_changes());

    assert!(!grid.set_value(id, 1, Value::from("Alice")).expect("same value"));
}

#[test]
fn read_only_grids_reject_edits() {
    let store = people_store();
    let mut view =
        GridModel::for_view(store.clone(), "people_view", lazy_config()).expect("view grid");
    let id = view.row_id_at(0).expect("row");
    assert!(matches!(
        view.set_value(id, 1, Value::Null),
        Err(GridError::ReadOnlyTarget)
    ));
    assert!(matches!(view.insert_row(), Err(GridError::ReadOnlyTarget)));
    assert!(matches!(view.delete_rows(&[0]), Err(GridError::ReadOnlyTarget)));
    assert!(!view.has_changes());
    assert!(!view.has_row_locator());

    let mut query = GridModel::for_query(store.clone(), "SELECT * FROM people", lazy_config())
        .expect("query grid");
    assert!(matches!(
        query.set_text_at(0, 1, "x"),
        Err(GridError::ReadOnlyTarget)
    ));
}

#[test]
fn unknown_rows_are_ignored() {
    let store = people_store();
    let mut grid = table_grid(&store);
    let id = grid.insert_row().expect("insert");
    assert!(grid.delete_row(id).expect("discard"));

    assert!(!grid.set_value(id, 0, Value::Integer(9)).expect("unknown row"));
    assert!(!grid.delete_row(id).expect("unknown row"));
    assert!(!grid.has_changes());
}

#[test]
fn insert_delete_undo_scenario() {
    let store = ScriptedStore::new(
        people_columns(),
        vec![
            person(1, "A", None),
            person(2, "B", None),
            person(3, "C", None),
        ],
    )
    .into_arc();
    let mut grid = table_grid(&store);
    grid.seek_to_end();

    let d = grid.insert_row().expect("insert");
    grid.set_value(d, 1, Value::from("D")).expect("name");
    assert_eq!(grid.row_state(d), Some(RowState::Inserted));
    assert_eq!(visible_names(&grid), ["D", "A", "B", "C"]);

    assert_eq!(grid.delete_rows(&[2]).expect("delete B"), 1);
    assert_eq!(visible_names(&grid), ["D", "A", "C"]);

    grid.undo_all();
    assert_eq!(visible_names(&grid), ["A", "B", "C"]);
    assert_eq!(grid.row_state(d), None);
}

#[test]
fn undo_restores_every_kind_of_change() {
    let store = people_store();
    let mut grid = table_grid(&store);
    grid.seek_to_end();
    let alice = grid.row_id_at(0).expect("alice");
    let bob = grid.row_id_at(1).expect("bob");

    grid.set_value(alice, 2, Value::Real(9.0)).expect("edit");
    grid.delete_row(bob).expect("delete");
    let fresh = grid.insert_row().expect("insert");
    assert_eq!(
        grid.change_summary(),
        "1 new row, 1 changed row, 1 deleted row"
    );

    grid.undo_all();
    assert!(!grid.has_changes());
    assert_eq!(grid.change_summary(), "");
    assert_eq!(grid.value(alice, 2), Some(&Value::Real(3.5)));
    assert_eq!(grid.row_state(bob), Some(RowState::Unmodified));
    assert_eq!(grid.row_state(fresh), None);
    assert_eq!(
        all_names(&mut grid),
        ["Alice", "bob", "Carol", "dave", "Eve"]
    );
}

#[test]
fn deleting_edited_row_keeps_saved_values() {
    let store = people_store();
    let mut grid = table_grid(&store);
    let id = grid.row_id_at(0).expect("row");
    grid.set_value(id, 1, Value::from("Alicia")).expect("edit");
    grid.delete_row(id).expect("delete");

    let snapshot = grid.snapshot(id).expect("pending delete");
    assert_eq!(snapshot.state, RowState::Deleted);
    assert_eq!(snapshot.values, person(1, "Alice", Some(3.5)));
    assert_eq!(grid.change_summary(), "1 deleted row");
}

#[test]
fn text_input_is_coerced_to_column_affinity() {
    let store = people_store();
    let mut grid = table_grid(&store);

    assert!(grid.set_text_at(0, 2, "2,5").expect("decimal comma"));
    assert_eq!(grid.value_at(0, 2), Some(&Value::Real(2.5)));

    assert!(!grid.set_text_at(0, 2, "lots").expect("rejected"));
    assert_eq!(grid.value_at(0, 2), Some(&Value::Real(2.5)));

    assert!(grid.set_text_at(0, 2, "").expect("empty to null"));
    assert_eq!(grid.value_at(0, 2), Some(&Value::Null));

    assert!(grid.set_text_at(0, 0, "7").expect("integer"));
    assert_eq!(grid.value_at(0, 0), Some(&Value::Integer(7)));

    assert!(grid.set_text_at(0, 1, "").expect("empty text"));
    assert_eq!(grid.value_at(0, 1), Some(&Value::from("")));
}

#[test]
fn cell_state_tracks_edits() {
    let store = people_store();
    let mut grid = table_grid(&store);
    grid.set_value_at(0, 1, Value::from("Alicia")).expect("edit");
    grid.insert_row().expect("insert");

    assert_eq!(grid.cell_state(0, 0), CellState::Inserted);
    assert_eq!(grid.cell_state(1, 1), CellState::CellChanged);
    assert_eq!(grid.cell_state(1, 2), CellState::RowChanged);
    assert_eq!(grid.cell_state(2, 1), CellState::Default);
    assert_eq!(grid.cell_state(50, 1), CellState::Default);
    assert_eq!(grid.change_summary(), "1 new row, 1 changed row");
}

#[test]
fn query_columns_take_affinity_from_first_row() {
    let store = people_store();
    let grid = GridModel::for_query(store.clone(), "SELECT * FROM people", GridConfig::default())
        .expect("query grid");
    let affinities: Vec<Affinity> = grid.columns().iter().map(|column| column.affinity).collect();
    assert_eq!(
        affinities,
        vec![Affinity::Integer, Affinity::Unknown, Affinity::Real]
    );
}

#[test]
fn duplicate_column_names_map_left_to_right() {
    let store = ScriptedStore::new(
        vec![
            Column::new("x", Affinity::Integer),
            Column::new("x", Affinity::Text),
        ],
        vec![vec![Value::Integer(1), Value::from("one")]],
    )
    .into_arc();
    let mut grid = GridModel::for_query(store.clone(), "SELECT 1 AS x, 'one' AS x", lazy_config())
        .expect("query grid");

    assert_eq!(grid.column_index("x"), Some(0));
    assert_eq!(grid.column_index("y"), None);
    assert_eq!(grid.value_at(0, 0), Some(&Value::Integer(1)));
    assert_eq!(grid.value_at(0, 1), Some(&Value::from("one")));
}
