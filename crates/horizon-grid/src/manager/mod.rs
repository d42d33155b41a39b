//! Row management: current row, selection, expansion and transactions.
//!
//! [`RowManager`] owns the whole presenter pipeline (source, mapper and
//! normalizer) and layers the interactive state a grid needs on top of it.
//! Every structural change goes through the manager so it can keep that
//! state consistent:
//!
//! - the current row is always a placed row, or `None` when nothing is shown
//! - selected presenters are always mapped; the selection follows rows
//!   across filter, sort and reload
//! - an open insertion keeps a valid parent and position even when the rows
//!   it was anchored to are removed
//!
//! Changes are announced through public [`Signal`] fields, the same way the
//! rest of the toolkit reports state.
//!
//! # Example
//!
//! ```
//! use horizon_grid::config::GridConfig;
//! use horizon_grid::manager::RowManager;
//! use horizon_grid::source::{ColumnId, MemorySource};
//!
//! let mut source = MemorySource::new(1);
//! source.push_row(None, ["a".into()]).unwrap();
//! source.push_row(None, ["b".into()]).unwrap();
//!
//! let mut rows = RowManager::new(source, GridConfig::default()).unwrap();
//! assert_eq!(rows.row_count(), 2);
//!
//! let b = rows.row_at(1).unwrap();
//! let added = rows.begin_insert_after(None, Some(b)).unwrap();
//! rows.set_value(added, ColumnId(0), "c").unwrap();
//! rows.end_edit().unwrap();
//!
//! let values: Vec<String> = rows
//!     .rows()
//!     .iter()
//!     .map(|&id| rows.value(id, ColumnId(0)).to_string())
//!     .collect();
//! assert_eq!(values, ["a", "b", "c"]);
//! ```

mod edit;
mod selection;

use std::collections::HashSet;

use horizon_grid_core::logging::targets;
use horizon_grid_core::{InvalidationBatch, Signal};

use crate::config::GridConfig;
use crate::error::{GridError, Result};
use crate::mapper::{CompareFn, FilterFn, RowChange, RowMapper, SortKey, sort_by_columns};
use crate::matching::{MatchIndex, RowMatch};
use crate::normalizer::RowNormalizer;
use crate::presenter::{PresenterId, RowPresenter};
use crate::source::{CellValue, ColumnId, DataSource, RowId, SourceEvent};

pub use edit::{EditState, InsertScope, Reference};
pub use selection::SelectionMode;

use edit::Transaction;

/// Interactive row state over a data source.
pub struct RowManager<S> {
    normalizer: RowNormalizer<S>,
    config: GridConfig,
    current: Option<PresenterId>,
    selected: Vec<PresenterId>,
    anchor: Option<PresenterId>,
    editing: Option<Transaction>,
    current_row_suspended: usize,
    /// Set while a committed insertion is being mapped.
    committing: bool,
    batch: InvalidationBatch,

    /// Emitted when the current row changes, as `(new, old)`.
    pub current_row_changed: Signal<(Option<PresenterId>, Option<PresenterId>)>,
    /// Emitted when the selection changes, as `(selected, deselected)`.
    pub selection_changed: Signal<(Vec<PresenterId>, Vec<PresenterId>)>,
    /// Emitted with the visible row count after structural changes.
    pub rows_changed: Signal<usize>,
    /// Emitted when a transaction opens or closes.
    pub edit_state_changed: Signal<EditState>,
    /// Emitted when views should refresh. Deferred while invalidation is
    /// suspended.
    pub invalidated: Signal<()>,
}

/// Interactive state keyed by something that survives a presenter rebuild.
struct Snapshot<K> {
    current: Option<K>,
    anchor: Option<K>,
    selected: Vec<K>,
    expanded: Vec<K>,
    old_selected: Vec<PresenterId>,
}

impl<S: DataSource> RowManager<S> {
    /// Map `source` and make the first row current.
    pub fn new(mut source: S, config: GridConfig) -> Result<Self> {
        config.validate()?;
        let column_count = source.column_count();
        if let Some(&column) = config
            .match_columns
            .iter()
            .find(|column| column.index() >= column_count)
        {
            return Err(GridError::UnknownColumn(column));
        }
        source.drain_events();

        let mapper = RowMapper::with_match_columns(source, config.match_columns.clone());
        let normalizer = RowNormalizer::new(mapper, config.initial_expand_depth);
        let mut manager = Self {
            normalizer,
            config,
            current: None,
            selected: Vec::new(),
            anchor: None,
            editing: None,
            current_row_suspended: 0,
            committing: false,
            batch: InvalidationBatch::new(),
            current_row_changed: Signal::new(),
            selection_changed: Signal::new(),
            rows_changed: Signal::new(),
            edit_state_changed: Signal::new(),
            invalidated: Signal::new(),
        };
        manager.ensure_current_row();
        tracing::debug!(target: targets::MANAGER, rows = manager.row_count(), "row manager created");
        Ok(manager)
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &RowNormalizer<S> {
        &self.normalizer
    }

    pub fn mapper(&self) -> &RowMapper<S> {
        self.normalizer.mapper()
    }

    pub fn source(&self) -> &S {
        self.mapper().source()
    }

    fn source_mut(&mut self) -> &mut S {
        self.normalizer.mapper_mut().source_mut()
    }

    /// Visible rows in display order.
    pub fn rows(&self) -> &[PresenterId] {
        self.normalizer.rows()
    }

    pub fn row_count(&self) -> usize {
        self.normalizer.len()
    }

    pub fn row_at(&self, index: usize) -> Option<PresenterId> {
        self.normalizer.row_at(index)
    }

    pub fn raw_index(&self, id: PresenterId) -> Option<usize> {
        self.normalizer.raw_index(id)
    }

    pub fn presenter(&self, id: PresenterId) -> Option<&RowPresenter> {
        self.mapper().presenter(id)
    }

    /// The presenter mapping a data row, if the row is mapped.
    pub fn presenter_of(&self, row: RowId) -> Option<PresenterId> {
        self.mapper().presenter_of(row)
    }

    /// Cell value shown by a presenter.
    pub fn value(&self, id: PresenterId, column: ColumnId) -> CellValue {
        self.mapper().value(id, column)
    }

    // =========================================================================
    // Current row
    // =========================================================================

    pub fn current_row(&self) -> Option<PresenterId> {
        self.current
    }

    /// Raw index of the current row.
    pub fn current_index(&self) -> Option<usize> {
        self.current.and_then(|id| self.normalizer.raw_index(id))
    }

    /// Make a placed row current.
    pub fn set_current_row(&mut self, row: PresenterId) -> Result<()> {
        self.check_placed(row)?;
        self.set_current_internal(Some(row));
        Ok(())
    }

    /// Make `row` current, expanding its ancestors first if it is hidden.
    pub fn focus_requested(&mut self, row: PresenterId) -> Result<()> {
        if !self.mapper().contains(row) {
            return Err(GridError::InvalidPresenter(row));
        }
        if !self.is_placed(row) {
            self.normalizer.expand_to(row)?;
            self.rows_updated();
        }
        self.set_current_internal(Some(row));
        Ok(())
    }

    /// Move the current row by `delta` visible rows, clamped to the ends.
    pub fn move_current(&mut self, delta: isize) -> Option<PresenterId> {
        let last = self.row_count().checked_sub(1)?;
        let from = self.current_index().unwrap_or(0);
        let to = from.saturating_add_signed(delta).min(last);
        let target = self.normalizer.row_at(to);
        self.set_current_internal(target);
        target
    }

    pub fn move_to_first(&mut self) -> Option<PresenterId> {
        let target = self.normalizer.row_at(0)?;
        self.set_current_internal(Some(target));
        Some(target)
    }

    pub fn move_to_last(&mut self) -> Option<PresenterId> {
        let last = self.row_count().checked_sub(1)?;
        let target = self.normalizer.row_at(last)?;
        self.set_current_internal(Some(target));
        Some(target)
    }

    pub fn parent_of_current(&self) -> Option<PresenterId> {
        self.current.and_then(|id| self.presenter(id)?.parent())
    }

    /// Make the parent of the current row current.
    pub fn move_to_parent(&mut self) -> Option<PresenterId> {
        let parent = self.parent_of_current()?;
        self.set_current_internal(Some(parent));
        Some(parent)
    }

    /// Stop insertions and commits from moving the current row. Nests.
    pub fn suspend_current_row_change(&mut self) {
        self.current_row_suspended += 1;
    }

    pub fn resume_current_row_change(&mut self) {
        if self.current_row_suspended == 0 {
            tracing::warn!(target: targets::MANAGER, "resume_current_row_change without matching suspend");
            return;
        }
        self.current_row_suspended -= 1;
    }

    pub fn current_row_change_suspended(&self) -> bool {
        self.current_row_suspended > 0
    }

    /// Defer `invalidated` until the matching resume. Nests.
    pub fn suspend_invalidation(&mut self) {
        self.batch.suspend();
    }

    /// Leave one level of suspension, emitting one deferred `invalidated`
    /// if anything changed meanwhile.
    pub fn resume_invalidation(&mut self) {
        if self.batch.resume() {
            self.invalidated.emit(());
        }
    }

    // =========================================================================
    // Expansion
    // =========================================================================

    pub fn expand(&mut self, row: PresenterId) -> Result<bool> {
        let changed = self.normalizer.expand(row)?;
        if changed {
            self.rows_updated();
        }
        Ok(changed)
    }

    /// Collapse a row. A current row hidden by the collapse moves to it.
    pub fn collapse(&mut self, row: PresenterId) -> Result<bool> {
        let changed = self.normalizer.collapse(row)?;
        if changed {
            self.ensure_current_row();
            self.rows_updated();
        }
        Ok(changed)
    }

    pub fn toggle_expanded(&mut self, row: PresenterId) -> Result<bool> {
        let expanded = self.normalizer.toggle_expanded(row)?;
        if !expanded {
            self.ensure_current_row();
        }
        self.rows_updated();
        Ok(expanded)
    }

    pub fn expand_all(&mut self) {
        self.normalizer.expand_all();
        self.rows_updated();
    }

    pub fn collapse_all(&mut self) {
        self.normalizer.collapse_all();
        self.ensure_current_row();
        self.rows_updated();
    }

    /// Expand the ancestors of `row` so it becomes visible.
    pub fn expand_to(&mut self, row: PresenterId) -> Result<()> {
        self.normalizer.expand_to(row)?;
        self.rows_updated();
        Ok(())
    }

    // =========================================================================
    // Source changes
    // =========================================================================

    /// Change the source, then process the events it raised.
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut S) -> R) -> R {
        let result = f(self.source_mut());
        self.process_events();
        result
    }

    /// Process every event the source has queued.
    pub fn process_events(&mut self) {
        let events = self.source_mut().drain_events();
        if events.is_empty() {
            return;
        }
        tracing::trace!(target: targets::MANAGER, count = events.len(), "processing source events");
        for event in events {
            self.apply_event(event);
        }
        self.finish_changes();
    }

    /// Process one source event delivered out of band.
    pub fn handle_event(&mut self, event: SourceEvent) {
        self.apply_event(event);
        self.finish_changes();
    }

    fn apply_event(&mut self, event: SourceEvent) {
        for change in self.normalizer.handle_event(event) {
            if let RowChange::Removed {
                presenter,
                parent,
                index,
                ordinal,
            } = change
            {
                self.on_presenter_removed(presenter, parent, index, ordinal);
            }
        }
    }

    fn finish_changes(&mut self) {
        self.forget_selected(|manager, id| !manager.mapper().contains(id));
        let purged = self.normalizer.purge();
        if self.anchor.is_some_and(|anchor| purged.contains(&anchor)) {
            self.anchor = None;
        }
        if !self.committing {
            self.ensure_current_row();
        }
        self.rows_updated();
    }

    fn on_presenter_removed(
        &mut self,
        removed: PresenterId,
        parent: Option<PresenterId>,
        index: usize,
        ordinal: Option<usize>,
    ) {
        self.reanchor_transaction(removed, parent, index, ordinal);
        self.forget_selected(|manager, id| manager.mapper().is_ancestor_or_self(removed, id));
        if self
            .anchor
            .is_some_and(|anchor| self.mapper().is_ancestor_or_self(removed, anchor))
        {
            self.anchor = None;
        }
        if let Some(current) = self.current
            && self.mapper().is_ancestor_or_self(removed, current)
        {
            let fallback = self.sibling_fallback(parent, index);
            tracing::debug!(target: targets::MANAGER, ?current, ?fallback, "current row removed");
            self.set_current_internal(fallback);
        }
    }

    // =========================================================================
    // Filter, sort and reload
    // =========================================================================

    /// Replace filter and sort. Selection, expansion and the current row
    /// follow their data rows.
    pub fn apply(&mut self, filter: Option<FilterFn<S>>, sort: Option<CompareFn<S>>) -> Result<()> {
        self.ensure_idle()?;
        let snapshot = self.snapshot(|manager, id| manager.mapper().row_of(id));
        self.normalizer.apply(filter, sort);
        self.restore(snapshot, |manager, row| manager.mapper().presenter_of(*row));
        Ok(())
    }

    /// Replace the filter, keeping the sort.
    pub fn set_filter(&mut self, filter: Option<FilterFn<S>>) -> Result<()> {
        let sort = self.mapper().sort().cloned();
        self.apply(filter, sort)
    }

    /// Replace the sort, keeping the filter.
    pub fn set_sort(&mut self, sort: Option<CompareFn<S>>) -> Result<()> {
        let filter = self.mapper().filter().cloned();
        self.apply(filter, sort)
    }

    /// Sort by columns in turn. An empty list removes the sort.
    pub fn sort_by(&mut self, keys: &[SortKey]) -> Result<()> {
        let column_count = self.source().column_count();
        if let Some(key) = keys.iter().find(|key| key.column.index() >= column_count) {
            return Err(GridError::UnknownColumn(key.column));
        }
        let sort = (!keys.is_empty()).then(|| sort_by_columns(keys.iter().copied()));
        self.set_sort(sort)
    }

    /// Rebuild every presenter from the current source.
    pub fn refresh(&mut self) -> Result<()> {
        self.ensure_idle()?;
        let snapshot = self.snapshot(|manager, id| manager.mapper().row_of(id));
        self.normalizer.reload();
        self.restore(snapshot, |manager, row| manager.mapper().presenter_of(*row));
        Ok(())
    }

    /// Swap in a new source and return the old one.
    ///
    /// Rows are matched across the swap by the configured match columns;
    /// without match columns the interactive state starts over.
    pub fn reload(&mut self, mut source: S) -> Result<S> {
        self.ensure_idle()?;
        source.drain_events();
        let snapshot = self.snapshot(|manager, id| RowMatch::capture(manager.mapper(), id));
        let old = self.normalizer.mapper_mut().replace_source(source);
        self.normalizer.rebuild();
        let index = MatchIndex::build(self.mapper());
        self.restore(snapshot, |_, key| index.find(key));
        Ok(old)
    }

    fn snapshot<K>(&self, key: impl Fn(&Self, PresenterId) -> Option<K>) -> Snapshot<K> {
        let expanded = self
            .mapper()
            .rows()
            .into_iter()
            .filter(|&id| self.presenter(id).is_some_and(RowPresenter::is_expanded))
            .filter_map(|id| key(self, id))
            .collect();
        Snapshot {
            current: self.current.and_then(|id| key(self, id)),
            anchor: self.anchor.and_then(|id| key(self, id)),
            selected: self.selected.iter().filter_map(|&id| key(self, id)).collect(),
            expanded,
            old_selected: self.selected.clone(),
        }
    }

    fn restore<K>(&mut self, snapshot: Snapshot<K>, resolve: impl Fn(&Self, &K) -> Option<PresenterId>) {
        let expanded: HashSet<PresenterId> = snapshot
            .expanded
            .iter()
            .filter_map(|key| resolve(self, key))
            .collect();
        for id in self.mapper().rows() {
            if let Some(p) = self.normalizer.mapper_mut().presenter_mut(id) {
                p.set_expanded(expanded.contains(&id));
            }
        }
        self.normalizer.reflatten();

        let mut selected: Vec<PresenterId> = Vec::with_capacity(snapshot.selected.len());
        for key in &snapshot.selected {
            if let Some(id) = resolve(self, key)
                && !selected.contains(&id)
            {
                selected.push(id);
            }
        }
        for &id in &selected {
            if let Some(p) = self.normalizer.mapper_mut().presenter_mut(id) {
                p.set_selected(true);
            }
        }
        self.selected = selected.clone();
        if !selected.is_empty() || !snapshot.old_selected.is_empty() {
            self.selection_changed.emit((selected, snapshot.old_selected));
        }

        self.anchor = snapshot.anchor.and_then(|key| resolve(self, &key));
        let current = snapshot.current.and_then(|key| resolve(self, &key));
        let current = match current {
            Some(id) if self.is_placed(id) => Some(id),
            Some(id) => self.placed_ancestor(id),
            None => None,
        };
        self.set_current_internal(current.or_else(|| self.normalizer.row_at(0)));
        tracing::debug!(
            target: targets::MANAGER,
            rows = self.row_count(),
            selected = self.selected.len(),
            "interactive state restored"
        );
        self.rows_updated();
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn is_placed(&self, id: PresenterId) -> bool {
        self.normalizer.raw_index(id).is_some()
    }

    /// Raw index of `id`, or why it has none.
    fn check_placed(&self, id: PresenterId) -> Result<usize> {
        if !self.mapper().contains(id) {
            return Err(GridError::InvalidPresenter(id));
        }
        self.normalizer
            .raw_index(id)
            .ok_or(GridError::NotPlaced(id))
    }

    /// Set the current row, emitting on change. Returns whether it changed.
    fn set_current_internal(&mut self, row: Option<PresenterId>) -> bool {
        if self.current == row {
            return false;
        }
        let old = std::mem::replace(&mut self.current, row);
        tracing::trace!(target: targets::MANAGER, new = ?row, ?old, "current row changed");
        self.current_row_changed.emit((row, old));
        true
    }

    /// Keep the current row on a placed row: a hidden current row moves to
    /// its nearest visible ancestor, a missing one to the first row.
    fn ensure_current_row(&mut self) {
        if self.current.is_some_and(|id| self.is_placed(id)) {
            return;
        }
        let target = self
            .current
            .and_then(|id| self.placed_ancestor(id))
            .or_else(|| self.normalizer.row_at(0));
        self.set_current_internal(target);
    }

    fn placed_ancestor(&self, id: PresenterId) -> Option<PresenterId> {
        let mut cursor = self.presenter(id)?.parent();
        while let Some(ancestor) = cursor {
            if self.is_placed(ancestor) {
                return Some(ancestor);
            }
            cursor = self.presenter(ancestor)?.parent();
        }
        None
    }

    /// The placed sibling at or after `position` under `parent`, else the
    /// last placed one before it, else the parent.
    fn sibling_fallback(&self, parent: Option<PresenterId>, position: usize) -> Option<PresenterId> {
        let siblings = self.mapper().siblings(parent);
        let position = position.min(siblings.len());
        siblings[position..]
            .iter()
            .find(|&&id| self.is_placed(id))
            .or_else(|| siblings[..position].iter().rev().find(|&&id| self.is_placed(id)))
            .copied()
            .or_else(|| parent.filter(|&p| self.is_placed(p)))
    }

    fn invalidate(&mut self) {
        if self.batch.invalidate() {
            self.invalidated.emit(());
        }
    }

    fn rows_updated(&mut self) {
        self.rows_changed.emit(self.normalizer.len());
        self.invalidate();
    }
}

impl<S> std::fmt::Debug for RowManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowManager")
            .field("config", &self.config)
            .field("current", &self.current)
            .field("selected", &self.selected.len())
            .field("editing", &self.editing)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::mapper::column_equals;
    use crate::source::MemorySource;

    fn letters(names: &[&str]) -> MemorySource {
        let mut source = MemorySource::new(1);
        for name in names {
            source.push_row(None, [(*name).into()]).unwrap();
        }
        source
    }

    fn names(rows: &RowManager<MemorySource>) -> Vec<String> {
        rows.rows()
            .iter()
            .map(|&id| rows.value(id, ColumnId(0)).to_string())
            .collect()
    }

    fn manager(names: &[&str]) -> RowManager<MemorySource> {
        RowManager::new(letters(names), GridConfig::default()).unwrap()
    }

    fn current_name(rows: &RowManager<MemorySource>) -> Option<String> {
        rows.current_row().map(|id| rows.value(id, ColumnId(0)).to_string())
    }

    #[test]
    fn test_first_row_is_current() {
        let rows = manager(&["a", "b"]);
        assert_eq!(rows.current_index(), Some(0));
        assert_eq!(manager(&[]).current_row(), None);
    }

    #[test]
    fn test_unknown_match_column_rejected() {
        let config = GridConfig::builder().match_columns([ColumnId(3)]).build().unwrap();
        let err = RowManager::new(letters(&["a"]), config).unwrap_err();
        assert_eq!(err, GridError::UnknownColumn(ColumnId(3)));
    }

    #[test]
    fn test_move_current_clamps() {
        let mut rows = manager(&["a", "b", "c"]);
        rows.move_current(5);
        assert_eq!(rows.current_index(), Some(2));
        rows.move_current(-1);
        assert_eq!(rows.current_index(), Some(1));
        rows.move_current(-10);
        assert_eq!(rows.current_index(), Some(0));
        rows.move_to_last();
        assert_eq!(current_name(&rows).as_deref(), Some("c"));
    }

    #[test]
    fn test_current_row_signal() {
        let mut rows = manager(&["a", "b"]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        rows.current_row_changed.connect(move |&(new, old)| sink.lock().push((new, old)));

        let a = rows.row_at(0).unwrap();
        let b = rows.row_at(1).unwrap();
        rows.set_current_row(b).unwrap();
        rows.set_current_row(b).unwrap();
        assert_eq!(*seen.lock(), vec![(Some(b), Some(a))]);
    }

    #[test]
    fn test_removing_current_row_moves_to_next_sibling() {
        let mut rows = manager(&["a", "b", "c"]);
        let b = rows.row_at(1).unwrap();
        rows.set_current_row(b).unwrap();
        let b_row = rows.mapper().row_of(b).unwrap();
        rows.mutate(|source| source.remove_row(b_row)).unwrap();
        assert_eq!(names(&rows), ["a", "c"]);
        assert_eq!(current_name(&rows).as_deref(), Some("c"));
    }

    #[test]
    fn test_removing_last_row_moves_back() {
        let mut rows = manager(&["a", "b"]);
        rows.move_to_last();
        let b_row = rows.mapper().row_of(rows.row_at(1).unwrap()).unwrap();
        rows.mutate(|source| source.remove_row(b_row)).unwrap();
        assert_eq!(current_name(&rows).as_deref(), Some("a"));

        let a_row = rows.mapper().row_of(rows.row_at(0).unwrap()).unwrap();
        rows.mutate(|source| source.remove_row(a_row)).unwrap();
        assert_eq!(rows.current_row(), None);
    }

    #[test]
    fn test_collapse_moves_hidden_current_to_parent() {
        let mut source = MemorySource::hierarchical(1);
        let root = source.push_row(None, ["root".into()]).unwrap();
        source.push_row(Some(root), ["leaf".into()]).unwrap();
        let config = GridConfig::builder().initial_expand_depth(1).build().unwrap();
        let mut rows = RowManager::new(source, config).unwrap();
        assert_eq!(rows.row_count(), 2);

        let root_id = rows.row_at(0).unwrap();
        let leaf_id = rows.row_at(1).unwrap();
        rows.set_current_row(leaf_id).unwrap();
        assert!(rows.collapse(root_id).unwrap());
        assert_eq!(rows.current_row(), Some(root_id));

        rows.focus_requested(leaf_id).unwrap();
        assert_eq!(rows.current_row(), Some(leaf_id));
        assert_eq!(rows.row_count(), 2);
    }

    #[test]
    fn test_filter_keeps_selection_and_current() {
        let mut rows = manager(&["a", "b", "a"]);
        let last = rows.row_at(2).unwrap();
        rows.select(last).unwrap();

        rows.set_filter(Some(column_equals(ColumnId(0), "a"))).unwrap();
        assert_eq!(names(&rows), ["a", "a"]);
        let current = rows.current_row().unwrap();
        assert_eq!(rows.current_index(), Some(1));
        assert_eq!(rows.selected_rows(), vec![current]);
        assert!(rows.presenter(current).unwrap().is_selected());

        rows.set_filter(None).unwrap();
        assert_eq!(rows.current_index(), Some(2));
        assert_eq!(rows.selected_rows().len(), 1);
    }

    #[test]
    fn test_sort_by_rejects_unknown_column() {
        let mut rows = manager(&["b", "a"]);
        let err = rows.sort_by(&[SortKey::ascending(ColumnId(4))]).unwrap_err();
        assert_eq!(err, GridError::UnknownColumn(ColumnId(4)));

        rows.sort_by(&[SortKey::ascending(ColumnId(0))]).unwrap();
        assert_eq!(names(&rows), ["a", "b"]);
        rows.sort_by(&[]).unwrap();
        assert_eq!(names(&rows), ["b", "a"]);
    }

    #[test]
    fn test_reload_matches_rows_by_value() {
        let config = GridConfig::builder().match_columns([ColumnId(0)]).build().unwrap();
        let mut rows = RowManager::new(letters(&["a", "b", "c"]), config).unwrap();
        let b = rows.row_at(1).unwrap();
        rows.select(b).unwrap();

        let old = rows.reload(letters(&["c", "b"])).unwrap();
        assert_eq!(old.len(), 3);
        assert_eq!(names(&rows), ["c", "b"]);
        assert_eq!(current_name(&rows).as_deref(), Some("b"));
        assert_eq!(rows.selected_rows(), vec![rows.row_at(1).unwrap()]);
    }

    #[test]
    fn test_reload_without_match_columns_starts_over() {
        let mut rows = manager(&["a", "b"]);
        rows.move_to_last();
        rows.reload(letters(&["x", "y"])).unwrap();
        assert_eq!(rows.current_index(), Some(0));
        assert!(!rows.has_selection());
    }

    #[test]
    fn test_invalidation_is_batched() {
        let mut rows = manager(&["a"]);
        let count = Arc::new(Mutex::new(0));
        let sink = count.clone();
        rows.invalidated.connect(move |_| *sink.lock() += 1);

        rows.suspend_invalidation();
        rows.mutate(|source| source.push_row(None, ["b".into()])).unwrap();
        rows.mutate(|source| source.push_row(None, ["c".into()])).unwrap();
        assert_eq!(*count.lock(), 0);
        rows.resume_invalidation();
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_filter_rejected_while_editing() {
        let mut rows = manager(&["a"]);
        rows.begin_edit().unwrap();
        let err = rows.set_filter(None).unwrap_err();
        assert_eq!(err, GridError::edit_in_progress(EditState::EditingExisting));
    }
}
