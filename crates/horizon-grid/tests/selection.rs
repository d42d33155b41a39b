//! Integration tests for selection policies and navigation.

use std::sync::Arc;

use horizon_grid::prelude::*;
use parking_lot::Mutex;

fn manager(count: usize, mode: SelectionMode) -> RowManager<MemorySource> {
    let mut source = MemorySource::new(1);
    for i in 0..count {
        source.push_row(None, [(i as i64).into()]).unwrap();
    }
    let config = GridConfig::builder().selection_mode(mode).build().unwrap();
    RowManager::new(source, config).unwrap()
}

fn selected_indices(rows: &RowManager<MemorySource>) -> Vec<usize> {
    rows.selected_rows()
        .iter()
        .filter_map(|&id| rows.raw_index(id))
        .collect()
}

#[test]
fn test_single_replaces() {
    let mut rows = manager(4, SelectionMode::Single);
    rows.select(rows.row_at(1).unwrap()).unwrap();
    rows.select(rows.row_at(3).unwrap()).unwrap();
    assert_eq!(selected_indices(&rows), [3]);
    assert_eq!(rows.current_index(), Some(3));

    rows.select_all();
    assert_eq!(selected_indices(&rows), [3]);
}

#[test]
fn test_multiple_toggles() {
    let mut rows = manager(4, SelectionMode::Multiple);
    let r1 = rows.row_at(1).unwrap();
    let r2 = rows.row_at(2).unwrap();
    rows.select(r2).unwrap();
    rows.select(r1).unwrap();
    assert_eq!(selected_indices(&rows), [1, 2]);
    rows.select(r2).unwrap();
    assert_eq!(selected_indices(&rows), [1]);
    assert!(!rows.is_selected(r2));

    rows.select_all();
    assert_eq!(selected_indices(&rows), [0, 1, 2, 3]);
    rows.clear_selection();
    assert!(!rows.has_selection());
}

#[test]
fn test_extended_range_keeps_anchor() {
    let mut rows = manager(6, SelectionMode::Extended);
    let r2 = rows.row_at(2).unwrap();
    rows.select_with(r2, SelectionMode::Single).unwrap();
    assert_eq!(rows.anchor(), Some(r2));

    rows.select(rows.row_at(4).unwrap()).unwrap();
    assert_eq!(selected_indices(&rows), [2, 3, 4]);
    rows.select(rows.row_at(0).unwrap()).unwrap();
    assert_eq!(selected_indices(&rows), [0, 1, 2]);
    assert_eq!(rows.anchor(), Some(r2));

    // a non-extended action moves the anchor
    let r5 = rows.row_at(5).unwrap();
    rows.select_with(r5, SelectionMode::Multiple).unwrap();
    rows.select(rows.row_at(3).unwrap()).unwrap();
    assert_eq!(selected_indices(&rows), [3, 4, 5]);
}

#[test]
fn test_extended_without_anchor_starts_at_current() {
    let mut rows = manager(5, SelectionMode::Extended);
    rows.set_current_row(rows.row_at(1).unwrap()).unwrap();
    rows.select(rows.row_at(3).unwrap()).unwrap();
    assert_eq!(selected_indices(&rows), [1, 2, 3]);
}

#[test]
fn test_selection_signal_reports_difference() {
    let mut rows = manager(3, SelectionMode::Multiple);
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    rows.selection_changed
        .connect(move |(selected, deselected)| sink.lock().push((selected.len(), deselected.len())));

    let r0 = rows.row_at(0).unwrap();
    rows.select(r0).unwrap();
    rows.select(rows.row_at(1).unwrap()).unwrap();
    rows.select_with(r0, SelectionMode::Single).unwrap();
    assert_eq!(*log.lock(), vec![(1, 0), (1, 0), (0, 1)]);
}

#[test]
fn test_removed_rows_leave_selection() {
    let mut rows = manager(3, SelectionMode::Multiple);
    let r1 = rows.row_at(1).unwrap();
    rows.select(rows.row_at(0).unwrap()).unwrap();
    rows.select(r1).unwrap();

    let data_row = rows.mapper().row_of(r1).unwrap();
    rows.mutate(|source| source.remove_row(data_row)).unwrap();
    assert_eq!(selected_indices(&rows), [0]);
    assert_eq!(rows.anchor(), None);
}

#[test]
fn test_selecting_hidden_row_fails() {
    let mut source = MemorySource::hierarchical(1);
    let root = source.push_row(None, ["root".into()]).unwrap();
    let leaf = source.push_row(Some(root), ["leaf".into()]).unwrap();
    let mut rows = RowManager::new(source, GridConfig::default()).unwrap();
    let leaf_id = rows.presenter_of(leaf).unwrap();
    assert_eq!(rows.select(leaf_id).unwrap_err(), GridError::NotPlaced(leaf_id));
    assert_eq!(rows.set_current_row(leaf_id).unwrap_err(), GridError::NotPlaced(leaf_id));
}

#[test]
fn test_navigation_in_tree() {
    let mut source = MemorySource::hierarchical(1);
    let root = source.push_row(None, ["root".into()]).unwrap();
    let leaf = source.push_row(Some(root), ["leaf".into()]).unwrap();
    source.push_row(None, ["other".into()]).unwrap();
    let mut rows = RowManager::new(source, GridConfig::default()).unwrap();
    assert_eq!(rows.row_count(), 2);

    let leaf_id = rows.presenter_of(leaf).unwrap();
    rows.focus_requested(leaf_id).unwrap();
    assert_eq!(rows.current_index(), Some(1));
    assert_eq!(rows.parent_of_current(), rows.row_at(0));

    rows.move_to_parent();
    assert_eq!(rows.current_index(), Some(0));
    rows.move_current(2);
    assert_eq!(rows.current_index(), Some(2));
    rows.move_to_first();
    assert_eq!(rows.current_index(), Some(0));
}
